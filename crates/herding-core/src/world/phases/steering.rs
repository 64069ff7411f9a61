use super::super::World;
use crate::steering::SteeringContext;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

impl World {
    /// Compute every agent's next kinematic state into the shadow buffer.
    ///
    /// Reads only `agents` and the index built from it, so agents may be
    /// updated in any order or concurrently.
    pub(in crate::world) fn step_steering_phase(&mut self, dt: f64) {
        self.next.clear();
        self.next.extend_from_slice(&self.agents);

        let ctx = SteeringContext::new(&self.config, &self.agents, &*self.index);
        let next = &mut self.next;

        #[cfg(feature = "parallel")]
        next.par_iter_mut().for_each(|agent| agent.update(&ctx, dt));

        #[cfg(not(feature = "parallel"))]
        next.iter_mut().for_each(|agent| agent.update(&ctx, dt));
    }
}
