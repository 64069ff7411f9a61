use crate::agent::{Agent, AgentView, Role};
use crate::kinematics;
use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Immutable copy of every agent's renderable state at one committed tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    /// Simulated seconds since the world entered `Running`.
    pub time: f64,
    /// Ordered by agent id.
    pub agents: Vec<AgentView>,
}

impl Snapshot {
    pub fn iter_role(&self, role: Role) -> impl Iterator<Item = &AgentView> {
        self.agents.iter().filter(move |a| a.role == role)
    }
}

/// Aggregate herd/shepherd statistics sampled during a run.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TickMetrics {
    pub tick: u64,
    pub time: f64,
    pub herd_count: usize,
    pub shepherd_count: usize,
    pub herd_centroid: Option<DVec2>,
    /// Mean distance of herd agents from their centroid.
    pub herd_spread: f64,
    pub herd_mean_speed: f64,
    /// Length of the mean herd heading vector: 1 when all agents face the same
    /// way, near 0 when headings cancel.
    pub herd_polarization: f64,
    /// Distance from the herd centroid to the closest shepherd.
    pub nearest_shepherd_distance: Option<f64>,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub ticks: usize,
    pub sample_every: usize,
    pub dt: f64,
    pub samples: Vec<TickMetrics>,
}

pub fn collect_tick_metrics(tick: u64, time: f64, agents: &[Agent]) -> TickMetrics {
    let mut herd_count = 0usize;
    let mut shepherd_count = 0usize;
    let mut position_sum = DVec2::ZERO;
    let mut heading_sum = DVec2::ZERO;
    let mut speed_sum = 0.0;
    for agent in agents {
        match agent.role {
            Role::Herd => {
                herd_count += 1;
                position_sum += agent.position;
                heading_sum += kinematics::unit(agent.heading);
                speed_sum += agent.speed;
            }
            Role::Shepherd => shepherd_count += 1,
        }
    }

    let mut metrics = TickMetrics {
        tick,
        time,
        herd_count,
        shepherd_count,
        ..TickMetrics::default()
    };
    if herd_count == 0 {
        return metrics;
    }

    let n = herd_count as f64;
    let centroid = position_sum / n;
    metrics.herd_centroid = Some(centroid);
    metrics.herd_mean_speed = speed_sum / n;
    metrics.herd_polarization = (heading_sum / n).length();
    metrics.herd_spread = agents
        .iter()
        .filter(|a| a.role == Role::Herd)
        .map(|a| a.position.distance(centroid))
        .sum::<f64>()
        / n;
    metrics.nearest_shepherd_distance = agents
        .iter()
        .filter(|a| a.role == Role::Shepherd)
        .map(|a| a.position.distance(centroid))
        .min_by(f64::total_cmp);
    metrics
}
