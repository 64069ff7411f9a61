use crate::agent::{Agent, Role};
use crate::config::SimConfig;
use crate::rng;
use glam::DVec2;
use rand::Rng;
use std::f64::consts::TAU;

/// Scatter `count` agents of `role` uniformly over the world, numbering them
/// from `first_id`.
pub fn spawn_role<R: Rng>(
    rng: &mut R,
    config: &SimConfig,
    role: Role,
    first_id: u32,
    count: usize,
) -> Vec<Agent> {
    let params = config.role_params(role);
    (0..count)
        .map(|offset| {
            let position = DVec2::new(
                rng.random_range(0.0..=config.world_width),
                rng.random_range(0.0..=config.world_height),
            );
            let heading = rng.random_range(0.0..TAU);
            let speed = rng.random_range(params.speed_min..=params.speed_max);
            Agent::new(first_id + offset as u32, role, position, heading, speed)
        })
        .collect()
}

/// Herd first, then shepherds; each role draws from its own seeded stream.
pub fn spawn_population(config: &SimConfig) -> Vec<Agent> {
    let mut agents = Vec::with_capacity(config.total_agents());
    for role in Role::ALL {
        let mut role_rng = rng::derive_role_rng(config.seed, role);
        let first_id = agents.len() as u32;
        agents.extend(spawn_role(
            &mut role_rng,
            config,
            role,
            first_id,
            config.population(role),
        ));
    }
    agents
}
