use super::super::World;

impl World {
    /// Rebuild the neighbor index over last tick's committed positions.
    pub(in crate::world) fn step_index_phase(&mut self) {
        self.index.rebuild(&self.agents);
    }
}
