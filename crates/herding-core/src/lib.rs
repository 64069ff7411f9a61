pub mod agent;
pub mod clock;
pub mod config;
pub mod constants;
pub mod kinematics;
pub mod metrics;
pub mod rng;
pub mod spatial;
pub mod steering;
pub mod world;

pub use agent::{Agent, AgentView, Role};
pub use config::{BoundaryPolicy, ConfigError, IndexKind, RoleParams, ShepherdPolicy, SimConfig};
pub use constants::MAX_WORLD_SIZE;
pub use metrics::{RunSummary, Snapshot, TickMetrics};
pub use world::{RunError, StepTimings, World, WorldInitError, WorldState};
