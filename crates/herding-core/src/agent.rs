use crate::kinematics;
use crate::steering::{self, SteeringContext};
use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which rule table drives an agent and how a renderer should draw it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Herd,
    Shepherd,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Herd, Role::Shepherd];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Herd => write!(f, "herd"),
            Role::Shepherd => write!(f, "shepherd"),
        }
    }
}

/// Kinematic body of one simulated animal or shepherd.
///
/// Agents are identified by `id` (spawn order), never by value: two agents may
/// share position, heading and speed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agent {
    pub id: u32,
    pub role: Role,
    /// Meters, inside the world bounds once committed.
    pub position: DVec2,
    /// Radians in `[0, 2π)`.
    pub heading: f64,
    /// Meters per second, never negative.
    pub speed: f64,
}

/// Read-only view handed to renderers and serialized into snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentView {
    pub id: u32,
    pub role: Role,
    pub position: DVec2,
    pub heading: f64,
    pub speed: f64,
}

impl Agent {
    pub fn new(id: u32, role: Role, position: DVec2, heading: f64, speed: f64) -> Self {
        Self {
            id,
            role,
            position,
            heading: kinematics::normalize_angle(heading),
            speed: if speed.is_finite() { speed.max(0.0) } else { 0.0 },
        }
    }

    pub fn herd(id: u32, position: DVec2, heading: f64, speed: f64) -> Self {
        Self::new(id, Role::Herd, position, heading, speed)
    }

    pub fn shepherd(id: u32, position: DVec2, heading: f64, speed: f64) -> Self {
        Self::new(id, Role::Shepherd, position, heading, speed)
    }

    /// Velocity vector implied by heading and speed.
    pub fn velocity(&self) -> DVec2 {
        kinematics::unit(self.heading) * self.speed
    }

    /// Advance this agent by `dt` against the frozen neighborhood in `ctx`.
    ///
    /// `self` must be this tick's private copy; `ctx` only exposes last tick's
    /// committed state, so updates commute across agents. Boundary handling is
    /// left to the world.
    pub fn update(&mut self, ctx: &SteeringContext<'_>, dt: f64) {
        let params = ctx.config.role_params(self.role);
        let steering = steering::evaluate(self, ctx);
        let (heading, speed) = steering::steer(self.heading, self.speed, steering, params, dt);
        self.heading = heading;
        self.speed = speed;
        self.position = kinematics::integrate(self.position, heading, speed, dt);
    }

    pub fn snapshot(&self) -> AgentView {
        AgentView {
            id: self.id,
            role: self.role,
            position: self.position,
            heading: self.heading,
            speed: self.speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    #[test]
    fn new_normalizes_heading_and_speed() {
        let a = Agent::herd(0, DVec2::new(1.0, 1.0), -0.5, -3.0);
        assert!((a.heading - (TAU - 0.5)).abs() < 1e-12);
        assert_eq!(a.speed, 0.0);
    }

    #[test]
    fn snapshot_copies_renderable_state() {
        let a = Agent::shepherd(3, DVec2::new(2.0, 5.0), 1.0, 0.75);
        let view = a.snapshot();
        assert_eq!(view.id, 3);
        assert_eq!(view.role, Role::Shepherd);
        assert_eq!(view.position, a.position);
        assert_eq!(view.heading, a.heading);
        assert_eq!(view.speed, a.speed);
    }

    #[test]
    fn role_serializes_snake_case() {
        let json = serde_json::to_string(&Role::Shepherd).unwrap();
        assert_eq!(json, "\"shepherd\"");
    }
}
