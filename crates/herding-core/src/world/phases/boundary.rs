use super::super::World;
use crate::config::BoundaryPolicy;
use crate::kinematics;
use glam::DVec2;
use std::f64::consts::PI;

/// Bring `position` back inside `[0, width] x [0, height]`.
///
/// Under `Reflect` the heading component normal to each wall that was hit is
/// mirrored.
pub fn apply_boundary(
    position: DVec2,
    heading: f64,
    width: f64,
    height: f64,
    policy: BoundaryPolicy,
) -> (DVec2, f64) {
    let clamped = DVec2::new(position.x.clamp(0.0, width), position.y.clamp(0.0, height));
    match policy {
        BoundaryPolicy::Clamp => (clamped, heading),
        BoundaryPolicy::Reflect => {
            let mut heading = heading;
            if clamped.x != position.x {
                heading = PI - heading;
            }
            if clamped.y != position.y {
                heading = -heading;
            }
            (clamped, kinematics::normalize_angle(heading))
        }
    }
}

impl World {
    pub(in crate::world) fn step_boundary_phase(&mut self) {
        let width = self.config.world_width;
        let height = self.config.world_height;
        let policy = self.config.boundary_policy;
        for agent in &mut self.next {
            let (position, heading) =
                apply_boundary(agent.position, agent.heading, width, height, policy);
            agent.position = position;
            agent.heading = heading;
        }
    }
}
