use crate::agent::{Agent, Role};
use crate::config::{ConfigError, SimConfig};
use crate::metrics::{self, RunSummary, Snapshot, TickMetrics};
use crate::spatial::{self, NeighborIndex};
use std::time::Instant;
use std::{error::Error, fmt};
use tracing::{debug, info, warn};

/// Lifecycle of a world. `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldState {
    /// Configured but not yet populated.
    Uninitialized,
    /// Populated, no tick taken yet.
    Ready,
    Running,
    Stopped,
}

#[derive(Clone, Debug, Default)]
pub struct StepTimings {
    pub index_build_us: u64,
    pub steering_us: u64,
    pub commit_us: u64,
    pub total_us: u64,
}

pub struct World {
    /// Committed state of the last completed tick, ordered by id.
    agents: Vec<Agent>,
    /// Shadow buffer written during a tick, swapped in at commit.
    next: Vec<Agent>,
    index: Box<dyn NeighborIndex>,
    // Keep config private to preserve constructor invariants.
    config: SimConfig,
    state: WorldState,
    tick: u64,
    elapsed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldInitError {
    Config(ConfigError),
    PopulationMismatch {
        role: Role,
        expected: usize,
        actual: usize,
    },
    NonSequentialId { index: usize, id: u32 },
    OutOfBounds { id: u32 },
    NonFiniteState { id: u32 },
    AlreadyPopulated,
}

impl fmt::Display for WorldInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldInitError::Config(e) => write!(f, "{}", e),
            WorldInitError::PopulationMismatch {
                role,
                expected,
                actual,
            } => write!(
                f,
                "{role} population ({actual}) must match configured count ({expected})"
            ),
            WorldInitError::NonSequentialId { index, id } => {
                write!(f, "agent at slot {index} has id {id}; ids must equal slot order")
            }
            WorldInitError::OutOfBounds { id } => {
                write!(f, "agent {id} starts outside the world bounds")
            }
            WorldInitError::NonFiniteState { id } => {
                write!(f, "agent {id} has a non-finite position, heading, or speed")
            }
            WorldInitError::AlreadyPopulated => write!(f, "world is already populated"),
        }
    }
}

impl From<ConfigError> for WorldInitError {
    fn from(err: ConfigError) -> Self {
        WorldInitError::Config(err)
    }
}

impl Error for WorldInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorldInitError::Config(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    InvalidSampleEvery,
    TooManyTicks { max: usize, actual: usize },
    NotRunnable(WorldState),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::InvalidSampleEvery => write!(f, "sample_every must be positive"),
            RunError::TooManyTicks { max, actual } => {
                write!(f, "ticks ({actual}) exceed supported maximum ({max})")
            }
            RunError::NotRunnable(state) => write!(f, "world cannot run from state {state:?}"),
        }
    }
}

impl Error for RunError {}

impl World {
    pub const MAX_RUN_TICKS: usize = 10_000_000;

    /// Validate `config` and spawn its population from `config.seed`.
    pub fn new(config: SimConfig) -> Result<Self, WorldInitError> {
        let mut world = Self::uninitialized(config)?;
        world.populate()?;
        Ok(world)
    }

    /// Validate `config` without spawning anyone.
    pub fn uninitialized(config: SimConfig) -> Result<Self, WorldInitError> {
        config.validate()?;
        let index = spatial::build(&config);
        Ok(Self {
            agents: Vec::new(),
            next: Vec::new(),
            index,
            config,
            state: WorldState::Uninitialized,
            tick: 0,
            elapsed: 0.0,
        })
    }

    /// Scatter the configured population and move to `Ready`.
    pub fn populate(&mut self) -> Result<(), WorldInitError> {
        if self.state != WorldState::Uninitialized {
            return Err(WorldInitError::AlreadyPopulated);
        }
        let agents = spawn_population(&self.config);
        self.commit_population(agents);
        Ok(())
    }

    /// Build a world around a caller-supplied population.
    ///
    /// Ids must equal slot order, counts must match the config, and every agent
    /// must start inside the bounds with finite state. Headings are normalized
    /// and negative speeds raised to zero.
    pub fn with_agents(config: SimConfig, agents: Vec<Agent>) -> Result<Self, WorldInitError> {
        let mut world = Self::uninitialized(config)?;
        world.check_population(&agents)?;
        // Fields are public; route through the constructor so heading and
        // speed start in range.
        let agents = agents
            .into_iter()
            .map(|a| Agent::new(a.id, a.role, a.position, a.heading, a.speed))
            .collect();
        world.commit_population(agents);
        Ok(world)
    }

    fn check_population(&self, agents: &[Agent]) -> Result<(), WorldInitError> {
        for role in Role::ALL {
            let actual = agents.iter().filter(|a| a.role == role).count();
            let expected = self.config.population(role);
            if actual != expected {
                return Err(WorldInitError::PopulationMismatch {
                    role,
                    expected,
                    actual,
                });
            }
        }
        for (index, agent) in agents.iter().enumerate() {
            if agent.id as usize != index {
                return Err(WorldInitError::NonSequentialId {
                    index,
                    id: agent.id,
                });
            }
            if !(agent.position.is_finite() && agent.heading.is_finite() && agent.speed.is_finite())
            {
                return Err(WorldInitError::NonFiniteState { id: agent.id });
            }
            if !self.in_bounds(agent) {
                return Err(WorldInitError::OutOfBounds { id: agent.id });
            }
        }
        Ok(())
    }

    fn in_bounds(&self, agent: &Agent) -> bool {
        (0.0..=self.config.world_width).contains(&agent.position.x)
            && (0.0..=self.config.world_height).contains(&agent.position.y)
    }

    fn commit_population(&mut self, agents: Vec<Agent>) {
        info!(
            herd = self.config.herd_count,
            shepherds = self.config.shepherd_count,
            width = self.config.world_width,
            height = self.config.world_height,
            index = ?self.config.index,
            "world ready"
        );
        self.next = Vec::with_capacity(agents.len());
        self.agents = agents;
        self.state = WorldState::Ready;
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> WorldState {
        self.state
    }

    /// Committed agents of the last completed tick.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds advanced so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Renderable copy of the committed tick. Repeated calls between ticks
    /// return equal values.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            time: self.elapsed,
            agents: self.agents.iter().map(Agent::snapshot).collect(),
        }
    }

    pub fn metrics(&self) -> TickMetrics {
        metrics::collect_tick_metrics(self.tick, self.elapsed, &self.agents)
    }

    /// Enter the terminal `Stopped` state. Later steps are ignored.
    pub fn stop(&mut self) {
        if self.state != WorldState::Stopped {
            info!(tick = self.tick, "world stopped");
            self.state = WorldState::Stopped;
        }
    }

    /// Advance by the configured fixed tick.
    pub fn tick(&mut self) -> StepTimings {
        self.step(self.config.dt())
    }

    /// Advance the simulation by exactly `dt` seconds.
    ///
    /// Ignored (zeroed timings) before population, after `stop`, or when `dt`
    /// is not positive and finite.
    pub fn step(&mut self, dt: f64) -> StepTimings {
        if matches!(self.state, WorldState::Uninitialized | WorldState::Stopped) {
            warn!(state = ?self.state, "step ignored");
            return StepTimings::default();
        }
        if !(dt.is_finite() && dt > 0.0) {
            warn!(dt, "step ignored: dt must be positive and finite");
            return StepTimings::default();
        }
        self.state = WorldState::Running;
        let total_start = Instant::now();

        let t0 = Instant::now();
        self.step_index_phase();
        let index_build_us = t0.elapsed().as_micros() as u64;

        let t1 = Instant::now();
        self.step_steering_phase(dt);
        let steering_us = t1.elapsed().as_micros() as u64;

        let t2 = Instant::now();
        self.step_boundary_phase();
        std::mem::swap(&mut self.agents, &mut self.next);
        self.tick += 1;
        self.elapsed += dt;
        let commit_us = t2.elapsed().as_micros() as u64;

        StepTimings {
            index_build_us,
            steering_us,
            commit_us,
            total_us: total_start.elapsed().as_micros() as u64,
        }
    }

    /// Run `ticks` fixed ticks, sampling metrics every `sample_every` ticks
    /// and after the last one.
    pub fn run(&mut self, ticks: usize, sample_every: usize) -> Result<RunSummary, RunError> {
        if sample_every == 0 {
            return Err(RunError::InvalidSampleEvery);
        }
        if ticks > Self::MAX_RUN_TICKS {
            return Err(RunError::TooManyTicks {
                max: Self::MAX_RUN_TICKS,
                actual: ticks,
            });
        }
        if matches!(self.state, WorldState::Uninitialized | WorldState::Stopped) {
            return Err(RunError::NotRunnable(self.state));
        }

        let estimated_samples = if ticks == 0 {
            0
        } else {
            ((ticks - 1) / sample_every) + 1
        };
        let mut samples = Vec::with_capacity(estimated_samples);
        for t in 1..=ticks {
            self.tick();
            if t % sample_every == 0 || t == ticks {
                samples.push(self.metrics());
            }
        }
        debug!(ticks, samples = samples.len(), "run complete");
        Ok(RunSummary {
            schema_version: 1,
            ticks,
            sample_every,
            dt: self.config.dt(),
            samples,
        })
    }
}

mod phases;

pub use phases::boundary::apply_boundary;
pub use phases::spawn::{spawn_population, spawn_role};
