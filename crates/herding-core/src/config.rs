use crate::agent::Role;
use serde::{Deserialize, Deserializer, Serialize};

/// What happens to an agent whose integrated position leaves the world.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Clamp the position onto the wall; heading is untouched.
    Clamp,
    /// Clamp, then mirror the heading component normal to the wall.
    #[default]
    Reflect,
}

/// Neighbor index implementation rebuilt each tick.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    #[default]
    Grid,
    #[serde(rename = "rtree")]
    RTree,
    BruteForce,
}

/// Control input for shepherd agents.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ShepherdPolicy {
    /// Seek the herd centroid; hold position while the herd is empty.
    #[default]
    HerdCentroid,
    /// Seek a fixed point and hold once there.
    Waypoint { x: f64, y: f64 },
    /// Get behind the herd relative to `goal` and push it there.
    Drive {
        goal_x: f64,
        goal_y: f64,
        /// Meters behind the herd centroid the shepherd aims for.
        standoff: f64,
    },
    /// Brake to a standstill.
    Hold,
}

/// Per-rule multipliers applied during weighted summation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuleWeights {
    pub separation: f64,
    pub cohesion: f64,
    pub alignment: f64,
    pub flee: f64,
    pub control: f64,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            separation: 1.5,
            cohesion: 0.6,
            alignment: 0.4,
            flee: 4.0,
            control: 1.0,
        }
    }
}

/// Kinematic limits and interaction radii for one role.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoleParams {
    /// Lower bound of the spawn speed range and of the runtime speed clamp (m/s).
    pub speed_min: f64,
    /// Upper bound of the spawn speed range and of the runtime speed clamp (m/s).
    pub speed_max: f64,
    /// Maximum heading change rate (rad/s).
    pub max_turn_rate: f64,
    /// Maximum speed change rate (m/s²).
    pub max_acceleration: f64,
    /// Neighbors closer than this push the agent away.
    pub separation_distance: f64,
    /// Same-role neighbors within this radius pull the agent toward their centroid.
    pub cohesion_radius: f64,
    /// Same-role neighbors within this radius contribute to heading alignment.
    pub alignment_radius: f64,
    /// Shepherds beyond this radius have no effect on herd agents.
    pub flee_radius: f64,
    pub weights: RuleWeights,
}

impl RoleParams {
    pub fn herd_defaults() -> Self {
        Self {
            speed_min: 0.0,
            speed_max: 2.0,
            max_turn_rate: 3.0,
            max_acceleration: 2.0,
            separation_distance: 1.0,
            cohesion_radius: 6.0,
            alignment_radius: 4.0,
            flee_radius: 8.0,
            weights: RuleWeights::default(),
        }
    }

    pub fn shepherd_defaults() -> Self {
        Self {
            speed_min: 0.0,
            speed_max: 2.0,
            max_turn_rate: 4.0,
            max_acceleration: 3.0,
            separation_distance: 1.5,
            cohesion_radius: 0.0,
            alignment_radius: 0.0,
            flee_radius: 0.0,
            weights: RuleWeights {
                separation: 1.0,
                cohesion: 0.0,
                alignment: 0.0,
                flee: 0.0,
                control: 2.0,
            },
        }
    }

    /// Largest radius any rule of this role queries.
    pub fn max_interaction_radius(&self) -> f64 {
        self.separation_distance
            .max(self.cohesion_radius)
            .max(self.alignment_radius)
            .max(self.flee_radius)
    }
}

impl Default for RoleParams {
    fn default() -> Self {
        Self::herd_defaults()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed for initial population scatter.
    pub seed: u64,
    /// World extent along x in meters.
    pub world_width: f64,
    /// World extent along y in meters.
    pub world_height: f64,
    /// Number of herd agents spawned at construction.
    pub herd_count: usize,
    /// Number of shepherd agents spawned at construction.
    pub shepherd_count: usize,
    /// Fixed tick rate; `dt()` is its reciprocal.
    pub tick_rate_hz: f64,
    pub boundary_policy: BoundaryPolicy,
    pub index: IndexKind,
    pub herd: RoleParams,
    /// A partially specified block fills missing fields from
    /// [`RoleParams::shepherd_defaults`].
    #[serde(deserialize_with = "deserialize_shepherd_params")]
    pub shepherd: RoleParams,
    pub shepherd_policy: ShepherdPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            world_width: 64.0,
            world_height: 48.0,
            herd_count: 100,
            shepherd_count: 1,
            tick_rate_hz: 120.0,
            boundary_policy: BoundaryPolicy::Reflect,
            index: IndexKind::Grid,
            herd: RoleParams::herd_defaults(),
            shepherd: RoleParams::shepherd_defaults(),
            shepherd_policy: ShepherdPolicy::HerdCentroid,
        }
    }
}

/// Fields present in a JSON role block; absent ones fall back to a base.
#[derive(Deserialize, Default)]
struct RoleParamsOverrides {
    speed_min: Option<f64>,
    speed_max: Option<f64>,
    max_turn_rate: Option<f64>,
    max_acceleration: Option<f64>,
    separation_distance: Option<f64>,
    cohesion_radius: Option<f64>,
    alignment_radius: Option<f64>,
    flee_radius: Option<f64>,
    weights: Option<RuleWeightsOverrides>,
}

#[derive(Deserialize, Default)]
struct RuleWeightsOverrides {
    separation: Option<f64>,
    cohesion: Option<f64>,
    alignment: Option<f64>,
    flee: Option<f64>,
    control: Option<f64>,
}

impl RuleWeightsOverrides {
    fn over(self, base: RuleWeights) -> RuleWeights {
        RuleWeights {
            separation: self.separation.unwrap_or(base.separation),
            cohesion: self.cohesion.unwrap_or(base.cohesion),
            alignment: self.alignment.unwrap_or(base.alignment),
            flee: self.flee.unwrap_or(base.flee),
            control: self.control.unwrap_or(base.control),
        }
    }
}

impl RoleParamsOverrides {
    fn over(self, base: RoleParams) -> RoleParams {
        RoleParams {
            speed_min: self.speed_min.unwrap_or(base.speed_min),
            speed_max: self.speed_max.unwrap_or(base.speed_max),
            max_turn_rate: self.max_turn_rate.unwrap_or(base.max_turn_rate),
            max_acceleration: self.max_acceleration.unwrap_or(base.max_acceleration),
            separation_distance: self.separation_distance.unwrap_or(base.separation_distance),
            cohesion_radius: self.cohesion_radius.unwrap_or(base.cohesion_radius),
            alignment_radius: self.alignment_radius.unwrap_or(base.alignment_radius),
            flee_radius: self.flee_radius.unwrap_or(base.flee_radius),
            weights: match self.weights {
                Some(weights) => weights.over(base.weights),
                None => base.weights,
            },
        }
    }
}

fn deserialize_shepherd_params<'de, D>(deserializer: D) -> Result<RoleParams, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = RoleParamsOverrides::deserialize(deserializer)?;
    Ok(overrides.over(RoleParams::shepherd_defaults()))
}

macro_rules! define_config_error {
    (
        $(
            $variant:ident $( { $($field:ident : $type:ty),* } )? => $fmt:literal $(, $arg:expr)*
        );* $(;)?
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum ConfigError {
            $(
                $variant $( { $($field : $type),* } )?,
            )*
        }

        impl std::fmt::Display for ConfigError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant $( { $($field),* } )? => write!(f, $fmt $(, $arg)*),
                    )*
                }
            }
        }
    };
}

define_config_error! {
    InvalidWorldWidth => "world_width must be positive and finite";
    InvalidWorldHeight => "world_height must be positive and finite";
    WorldTooLarge { max: f64, actual: f64 } => "world dimension ({actual}) exceeds supported maximum ({max})";
    AgentCountOverflow => "herd_count + shepherd_count overflows usize";
    TooManyAgents { max: usize, actual: usize } => "Too many agents: {} > max {}", actual, max;
    InvalidTickRate => "tick_rate_hz must be positive and finite";
    InvalidSpeedRange { role: Role } => "{role}: speed_min/speed_max must be finite, non-negative, and ordered";
    InvalidTurnRate { role: Role } => "{role}: max_turn_rate must be finite and non-negative";
    InvalidAcceleration { role: Role } => "{role}: max_acceleration must be finite and non-negative";
    InvalidRadius { role: Role, name: &'static str } => "{role}: {name} must be finite and non-negative";
    InvalidWeight { role: Role, name: &'static str } => "{role}: weight {name} must be finite";
    InvalidPolicyTarget => "shepherd_policy coordinates must be finite";
    InvalidStandoff => "shepherd_policy standoff must be finite and non-negative";
}

impl std::error::Error for ConfigError {}

impl SimConfig {
    pub const MAX_WORLD_SIZE: f64 = crate::constants::MAX_WORLD_SIZE;

    pub const MAX_TOTAL_AGENTS: usize = crate::constants::MAX_TOTAL_AGENTS;

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_world()?;
        self.validate_population()?;
        self.validate_timing()?;
        for role in Role::ALL {
            Self::validate_role(role, self.role_params(role))?;
        }
        self.validate_policy()?;
        Ok(())
    }

    /// Fixed tick duration in seconds.
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate_hz
    }

    pub fn total_agents(&self) -> usize {
        self.herd_count.saturating_add(self.shepherd_count)
    }

    pub fn role_params(&self, role: Role) -> &RoleParams {
        match role {
            Role::Herd => &self.herd,
            Role::Shepherd => &self.shepherd,
        }
    }

    pub fn population(&self, role: Role) -> usize {
        match role {
            Role::Herd => self.herd_count,
            Role::Shepherd => self.shepherd_count,
        }
    }

    /// Largest radius queried by any rule of any role; sizes grid cells.
    pub fn max_interaction_radius(&self) -> f64 {
        self.herd
            .max_interaction_radius()
            .max(self.shepherd.max_interaction_radius())
    }

    fn validate_world(&self) -> Result<(), ConfigError> {
        if !(self.world_width.is_finite() && self.world_width > 0.0) {
            return Err(ConfigError::InvalidWorldWidth);
        }
        if !(self.world_height.is_finite() && self.world_height > 0.0) {
            return Err(ConfigError::InvalidWorldHeight);
        }
        let largest = self.world_width.max(self.world_height);
        if largest > Self::MAX_WORLD_SIZE {
            return Err(ConfigError::WorldTooLarge {
                max: Self::MAX_WORLD_SIZE,
                actual: largest,
            });
        }
        Ok(())
    }

    fn validate_population(&self) -> Result<(), ConfigError> {
        let total = self
            .herd_count
            .checked_add(self.shepherd_count)
            .ok_or(ConfigError::AgentCountOverflow)?;
        if total > Self::MAX_TOTAL_AGENTS {
            return Err(ConfigError::TooManyAgents {
                max: Self::MAX_TOTAL_AGENTS,
                actual: total,
            });
        }
        Ok(())
    }

    fn validate_timing(&self) -> Result<(), ConfigError> {
        if !(self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0) {
            return Err(ConfigError::InvalidTickRate);
        }
        Ok(())
    }

    fn validate_role(role: Role, params: &RoleParams) -> Result<(), ConfigError> {
        if !(params.speed_min.is_finite()
            && params.speed_max.is_finite()
            && params.speed_min >= 0.0
            && params.speed_min <= params.speed_max)
        {
            return Err(ConfigError::InvalidSpeedRange { role });
        }
        if !(params.max_turn_rate.is_finite() && params.max_turn_rate >= 0.0) {
            return Err(ConfigError::InvalidTurnRate { role });
        }
        if !(params.max_acceleration.is_finite() && params.max_acceleration >= 0.0) {
            return Err(ConfigError::InvalidAcceleration { role });
        }
        let radii = [
            ("separation_distance", params.separation_distance),
            ("cohesion_radius", params.cohesion_radius),
            ("alignment_radius", params.alignment_radius),
            ("flee_radius", params.flee_radius),
        ];
        for (name, value) in radii {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidRadius { role, name });
            }
        }
        let w = &params.weights;
        let weights = [
            ("separation", w.separation),
            ("cohesion", w.cohesion),
            ("alignment", w.alignment),
            ("flee", w.flee),
            ("control", w.control),
        ];
        for (name, value) in weights {
            if !value.is_finite() {
                return Err(ConfigError::InvalidWeight { role, name });
            }
        }
        Ok(())
    }

    fn validate_policy(&self) -> Result<(), ConfigError> {
        match self.shepherd_policy {
            ShepherdPolicy::HerdCentroid | ShepherdPolicy::Hold => Ok(()),
            ShepherdPolicy::Waypoint { x, y } => {
                if x.is_finite() && y.is_finite() {
                    Ok(())
                } else {
                    Err(ConfigError::InvalidPolicyTarget)
                }
            }
            ShepherdPolicy::Drive {
                goal_x,
                goal_y,
                standoff,
            } => {
                if !(goal_x.is_finite() && goal_y.is_finite()) {
                    return Err(ConfigError::InvalidPolicyTarget);
                }
                if !(standoff.is_finite() && standoff >= 0.0) {
                    return Err(ConfigError::InvalidStandoff);
                }
                Ok(())
            }
        }
    }
}
