//! Steering rules and the heading/speed response to their combined force.
//!
//! Rules are plain functions of one agent and the frozen tick context. Each
//! role owns a static table of rules; the agent sums the weighted outputs and
//! turns toward the result at a bounded rate. Summation is commutative, so the
//! order in which neighbors or agents are visited only affects rounding.

use crate::agent::{Agent, Role};
use crate::config::{RoleParams, RuleWeights, ShepherdPolicy, SimConfig};
use crate::constants::{ARRIVE_DISTANCE, EPSILON};
use crate::kinematics;
use crate::spatial::{NeighborIndex, RoleFilter};
use glam::DVec2;

/// Frozen view of the previous tick shared by every agent update.
///
/// `agents[i].id == i` for every slot; rules rely on it to skip the querying
/// agent itself.
pub struct SteeringContext<'a> {
    pub config: &'a SimConfig,
    pub agents: &'a [Agent],
    pub index: &'a dyn NeighborIndex,
    /// Mean committed position of all herd agents; `None` when there are none.
    pub herd_centroid: Option<DVec2>,
}

impl<'a> SteeringContext<'a> {
    /// `index` must already be rebuilt from `agents`.
    pub fn new(config: &'a SimConfig, agents: &'a [Agent], index: &'a dyn NeighborIndex) -> Self {
        Self {
            config,
            agents,
            index,
            herd_centroid: herd_centroid(agents),
        }
    }

    fn params(&self, role: Role) -> &RoleParams {
        self.config.role_params(role)
    }

    /// Visit every neighbor of `agent` within `radius`, excluding the agent itself.
    fn for_each_neighbor(
        &self,
        agent: &Agent,
        radius: f64,
        filter: RoleFilter,
        mut visitor: impl FnMut(&Agent),
    ) {
        if radius <= 0.0 {
            return;
        }
        let self_idx = agent.id as usize;
        self.index
            .for_each_within(agent.position, radius, filter, &mut |idx| {
                if idx != self_idx {
                    visitor(&self.agents[idx]);
                }
            });
    }
}

/// Mean position of the herd, if any.
pub fn herd_centroid(agents: &[Agent]) -> Option<DVec2> {
    let (sum, count) = agents
        .iter()
        .filter(|a| a.role == Role::Herd)
        .fold((DVec2::ZERO, 0usize), |(sum, n), a| (sum + a.position, n + 1));
    (count > 0).then(|| sum / count as f64)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleKind {
    Separation,
    Cohesion,
    Alignment,
    Flee,
    Control,
}

impl RuleWeights {
    pub fn get(&self, kind: RuleKind) -> f64 {
        match kind {
            RuleKind::Separation => self.separation,
            RuleKind::Cohesion => self.cohesion,
            RuleKind::Alignment => self.alignment,
            RuleKind::Flee => self.flee,
            RuleKind::Control => self.control,
        }
    }
}

/// Unweighted force contributed by one rule.
pub type SteeringRule = fn(&Agent, &SteeringContext<'_>) -> DVec2;

#[derive(Clone, Copy)]
pub struct RuleEntry {
    pub kind: RuleKind,
    pub apply: SteeringRule,
}

const HERD_RULES: &[RuleEntry] = &[
    RuleEntry {
        kind: RuleKind::Separation,
        apply: separation,
    },
    RuleEntry {
        kind: RuleKind::Cohesion,
        apply: cohesion,
    },
    RuleEntry {
        kind: RuleKind::Alignment,
        apply: alignment,
    },
    RuleEntry {
        kind: RuleKind::Flee,
        apply: flee,
    },
];

const SHEPHERD_RULES: &[RuleEntry] = &[
    RuleEntry {
        kind: RuleKind::Separation,
        apply: separation,
    },
    RuleEntry {
        kind: RuleKind::Control,
        apply: control,
    },
];

/// Rule table for a role.
pub fn rules_for(role: Role) -> &'static [RuleEntry] {
    match role {
        Role::Herd => HERD_RULES,
        Role::Shepherd => SHEPHERD_RULES,
    }
}

/// Push away from anything closer than `separation_distance`, with magnitude
/// `1 / d` per neighbor. Coincident neighbors have no defined direction and
/// contribute nothing.
pub fn separation(agent: &Agent, ctx: &SteeringContext<'_>) -> DVec2 {
    let radius = ctx.params(agent.role).separation_distance;
    let mut force = DVec2::ZERO;
    ctx.for_each_neighbor(agent, radius, RoleFilter::Any, |other| {
        let d = kinematics::distance(agent.position, other.position);
        // The index query is inclusive; separation only pushes strictly inside.
        if d > EPSILON && d < radius {
            force += kinematics::direction(other.position, agent.position) / d;
        }
    });
    force
}

/// Pull toward the centroid of same-role neighbors, scaled to `[0, 1]` by the
/// cohesion radius.
pub fn cohesion(agent: &Agent, ctx: &SteeringContext<'_>) -> DVec2 {
    let radius = ctx.params(agent.role).cohesion_radius;
    let mut sum = DVec2::ZERO;
    let mut count = 0usize;
    ctx.for_each_neighbor(agent, radius, RoleFilter::Only(agent.role), |other| {
        sum += other.position;
        count += 1;
    });
    if count == 0 {
        return DVec2::ZERO;
    }
    let centroid = sum / count as f64;
    (centroid - agent.position) / radius
}

/// Steer toward the mean heading of same-role neighbors.
pub fn alignment(agent: &Agent, ctx: &SteeringContext<'_>) -> DVec2 {
    let radius = ctx.params(agent.role).alignment_radius;
    let mut sum = DVec2::ZERO;
    let mut count = 0usize;
    ctx.for_each_neighbor(agent, radius, RoleFilter::Only(agent.role), |other| {
        sum += kinematics::unit(other.heading);
        count += 1;
    });
    if count == 0 {
        return DVec2::ZERO;
    }
    sum / count as f64 - kinematics::unit(agent.heading)
}

/// Run directly away from every shepherd inside `flee_radius`, harder the
/// closer it is. Shepherds at or beyond the radius have no effect.
pub fn flee(agent: &Agent, ctx: &SteeringContext<'_>) -> DVec2 {
    let radius = ctx.params(agent.role).flee_radius;
    let mut force = DVec2::ZERO;
    ctx.for_each_neighbor(agent, radius, RoleFilter::Only(Role::Shepherd), |shepherd| {
        let d = kinematics::distance(agent.position, shepherd.position);
        let strength = (1.0 - d / radius).max(0.0);
        force += kinematics::direction(shepherd.position, agent.position) * strength;
    });
    force
}

/// What the shepherd policy asks for this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Directive {
    Seek(DVec2),
    Hold,
}

/// Evaluate the configured shepherd policy for `agent`.
pub fn shepherd_directive(agent: &Agent, ctx: &SteeringContext<'_>) -> Directive {
    let target = match ctx.config.shepherd_policy {
        ShepherdPolicy::Hold => None,
        ShepherdPolicy::HerdCentroid => ctx.herd_centroid,
        ShepherdPolicy::Waypoint { x, y } => Some(DVec2::new(x, y)),
        ShepherdPolicy::Drive {
            goal_x,
            goal_y,
            standoff,
        } => ctx.herd_centroid.and_then(|centroid| {
            let away_from_goal = kinematics::direction(DVec2::new(goal_x, goal_y), centroid);
            // Herd already sitting on the goal: nothing to drive.
            (away_from_goal != DVec2::ZERO).then(|| centroid + away_from_goal * standoff)
        }),
    };
    match target {
        Some(t) if kinematics::distance(agent.position, t) > ARRIVE_DISTANCE => Directive::Seek(t),
        _ => Directive::Hold,
    }
}

/// Unit pull toward the policy target; zero while holding.
pub fn control(agent: &Agent, ctx: &SteeringContext<'_>) -> DVec2 {
    match shepherd_directive(agent, ctx) {
        Directive::Seek(target) => kinematics::direction(agent.position, target),
        Directive::Hold => DVec2::ZERO,
    }
}

/// Combined output of an agent's rule table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Steering {
    pub force: DVec2,
    /// Decelerate at the role's maximum rate regardless of `force`.
    pub brake: bool,
}

/// Weighted sum of the role's rules. Zero-weight rules are skipped entirely.
pub fn steering_force(agent: &Agent, ctx: &SteeringContext<'_>) -> DVec2 {
    let weights = &ctx.params(agent.role).weights;
    rules_for(agent.role)
        .iter()
        .fold(DVec2::ZERO, |acc, rule| {
            let weight = weights.get(rule.kind);
            if weight == 0.0 {
                acc
            } else {
                acc + (rule.apply)(agent, ctx) * weight
            }
        })
}

pub fn evaluate(agent: &Agent, ctx: &SteeringContext<'_>) -> Steering {
    let brake = agent.role == Role::Shepherd
        && shepherd_directive(agent, ctx) == Directive::Hold;
    Steering {
        force: steering_force(agent, ctx),
        brake,
    }
}

/// Turn toward the force at no more than `max_turn_rate · dt`, then change
/// speed by the force component along the new heading.
///
/// A negligible force leaves heading and speed unchanged apart from the
/// speed-range clamp.
pub fn steer(
    heading: f64,
    speed: f64,
    steering: Steering,
    params: &RoleParams,
    dt: f64,
) -> (f64, f64) {
    let force = steering.force;
    let active = force.is_finite() && force.length_squared() >= EPSILON * EPSILON;
    let mut next_heading = heading;
    if active {
        let desired = kinematics::heading_of(force);
        let max_turn = params.max_turn_rate * dt;
        let delta = kinematics::angle_delta(heading, desired).clamp(-max_turn, max_turn);
        next_heading = kinematics::normalize_angle(heading + delta);
    }

    let max_accel = params.max_acceleration;
    let accel = if steering.brake {
        -max_accel
    } else if active {
        force
            .dot(kinematics::unit(next_heading))
            .clamp(-max_accel, max_accel)
    } else {
        0.0
    };
    let next_speed = (speed + accel * dt).clamp(params.speed_min, params.speed_max);
    (next_heading, next_speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::BruteForce;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn config() -> SimConfig {
        SimConfig {
            world_width: 100.0,
            world_height: 100.0,
            ..SimConfig::default()
        }
    }

    fn with_ctx<R>(
        config: &SimConfig,
        agents: &[Agent],
        f: impl FnOnce(&SteeringContext<'_>) -> R,
    ) -> R {
        let mut index = BruteForce::default();
        index.rebuild(agents);
        let ctx = SteeringContext::new(config, agents, &index);
        f(&ctx)
    }

    fn params(max_turn_rate: f64) -> RoleParams {
        RoleParams {
            max_turn_rate,
            ..RoleParams::herd_defaults()
        }
    }

    #[test]
    fn separation_points_away_from_close_neighbor() {
        let cfg = config();
        let agents = vec![
            Agent::herd(0, DVec2::new(10.0, 10.0), 0.0, 0.0),
            Agent::herd(1, DVec2::new(10.5, 10.0), 0.0, 0.0),
        ];
        let f = with_ctx(&cfg, &agents, |ctx| separation(&agents[0], ctx));
        assert!(f.x < 0.0);
        assert!(f.y.abs() < 1e-12);
        assert!((f.length() - 2.0).abs() < 1e-9, "magnitude is 1/d");
    }

    #[test]
    fn separation_ignores_far_and_coincident_neighbors() {
        let cfg = config();
        let agents = vec![
            Agent::herd(0, DVec2::new(10.0, 10.0), 0.0, 0.0),
            Agent::herd(1, DVec2::new(10.0, 10.0), 0.0, 0.0),
            Agent::herd(2, DVec2::new(15.0, 10.0), 0.0, 0.0),
        ];
        let f = with_ctx(&cfg, &agents, |ctx| separation(&agents[0], ctx));
        assert_eq!(f, DVec2::ZERO);
    }

    #[test]
    fn separation_ignores_neighbor_exactly_at_distance() {
        let cfg = config();
        let reach = cfg.herd.separation_distance;
        let agents = vec![
            Agent::herd(0, DVec2::new(10.0, 10.0), 0.0, 0.0),
            Agent::herd(1, DVec2::new(10.0 + reach, 10.0), 0.0, 0.0),
        ];
        let f = with_ctx(&cfg, &agents, |ctx| separation(&agents[0], ctx));
        assert_eq!(f, DVec2::ZERO);
    }

    #[test]
    fn cohesion_pulls_toward_herd_neighbors_only() {
        let cfg = config();
        let agents = vec![
            Agent::herd(0, DVec2::new(10.0, 10.0), 0.0, 0.0),
            Agent::herd(1, DVec2::new(13.0, 10.0), 0.0, 0.0),
            Agent::shepherd(2, DVec2::new(10.0, 7.0), 0.0, 0.0),
        ];
        let f = with_ctx(&cfg, &agents, |ctx| cohesion(&agents[0], ctx));
        assert!((f.x - 3.0 / cfg.herd.cohesion_radius).abs() < 1e-12);
        assert_eq!(f.y, 0.0);
    }

    #[test]
    fn alignment_matches_neighbor_heading() {
        let cfg = config();
        let agents = vec![
            Agent::herd(0, DVec2::new(10.0, 10.0), 0.0, 1.0),
            Agent::herd(1, DVec2::new(11.0, 10.0), FRAC_PI_2, 1.0),
        ];
        let f = with_ctx(&cfg, &agents, |ctx| alignment(&agents[0], ctx));
        assert!((f.x + 1.0).abs() < 1e-12);
        assert!((f.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn flee_grows_as_shepherd_approaches_and_vanishes_outside_radius() {
        let mut cfg = config();
        cfg.herd.flee_radius = 2.0;
        let near = vec![
            Agent::herd(0, DVec2::new(10.0, 10.0), 0.0, 0.0),
            Agent::shepherd(1, DVec2::new(10.5, 10.0), 0.0, 0.0),
        ];
        let mid = vec![
            Agent::herd(0, DVec2::new(10.0, 10.0), 0.0, 0.0),
            Agent::shepherd(1, DVec2::new(11.5, 10.0), 0.0, 0.0),
        ];
        let far = vec![
            Agent::herd(0, DVec2::new(10.0, 10.0), 0.0, 0.0),
            Agent::shepherd(1, DVec2::new(12.5, 10.0), 0.0, 0.0),
        ];
        let f_near = with_ctx(&cfg, &near, |ctx| flee(&near[0], ctx));
        let f_mid = with_ctx(&cfg, &mid, |ctx| flee(&mid[0], ctx));
        let f_far = with_ctx(&cfg, &far, |ctx| flee(&far[0], ctx));
        assert!(f_near.x < f_mid.x && f_mid.x < 0.0);
        assert_eq!(f_far, DVec2::ZERO);
    }

    #[test]
    fn flee_ignores_herd_neighbors() {
        let cfg = config();
        let agents = vec![
            Agent::herd(0, DVec2::new(10.0, 10.0), 0.0, 0.0),
            Agent::herd(1, DVec2::new(10.5, 10.0), 0.0, 0.0),
        ];
        let f = with_ctx(&cfg, &agents, |ctx| flee(&agents[0], ctx));
        assert_eq!(f, DVec2::ZERO);
    }

    #[test]
    fn shepherd_seeks_herd_centroid_by_default() {
        let cfg = config();
        let agents = vec![
            Agent::herd(0, DVec2::new(20.0, 10.0), 0.0, 0.0),
            Agent::herd(1, DVec2::new(20.0, 30.0), 0.0, 0.0),
            Agent::shepherd(2, DVec2::new(0.0, 20.0), 0.0, 0.0),
        ];
        let (directive, f) = with_ctx(&cfg, &agents, |ctx| {
            (shepherd_directive(&agents[2], ctx), control(&agents[2], ctx))
        });
        assert_eq!(directive, Directive::Seek(DVec2::new(20.0, 20.0)));
        assert!((f - DVec2::X).length() < 1e-12);
    }

    #[test]
    fn shepherd_holds_without_herd() {
        let cfg = config();
        let agents = vec![Agent::shepherd(0, DVec2::new(5.0, 5.0), 0.0, 1.0)];
        let steering = with_ctx(&cfg, &agents, |ctx| evaluate(&agents[0], ctx));
        assert!(steering.brake);
        assert_eq!(steering.force, DVec2::ZERO);
    }

    #[test]
    fn waypoint_policy_holds_on_arrival() {
        let cfg = SimConfig {
            shepherd_policy: ShepherdPolicy::Waypoint { x: 30.0, y: 30.0 },
            ..config()
        };
        let away = vec![Agent::shepherd(0, DVec2::new(10.0, 30.0), 0.0, 1.0)];
        let there = vec![Agent::shepherd(0, DVec2::new(30.2, 30.0), 0.0, 1.0)];
        let d_away = with_ctx(&cfg, &away, |ctx| shepherd_directive(&away[0], ctx));
        let d_there = with_ctx(&cfg, &there, |ctx| shepherd_directive(&there[0], ctx));
        assert_eq!(d_away, Directive::Seek(DVec2::new(30.0, 30.0)));
        assert_eq!(d_there, Directive::Hold);
    }

    #[test]
    fn drive_policy_targets_point_behind_herd() {
        let cfg = SimConfig {
            shepherd_policy: ShepherdPolicy::Drive {
                goal_x: 90.0,
                goal_y: 50.0,
                standoff: 5.0,
            },
            ..config()
        };
        let agents = vec![
            Agent::herd(0, DVec2::new(50.0, 48.0), 0.0, 0.0),
            Agent::herd(1, DVec2::new(50.0, 52.0), 0.0, 0.0),
            Agent::shepherd(2, DVec2::new(10.0, 10.0), 0.0, 0.0),
        ];
        let directive = with_ctx(&cfg, &agents, |ctx| shepherd_directive(&agents[2], ctx));
        match directive {
            Directive::Seek(t) => assert!((t - DVec2::new(45.0, 50.0)).length() < 1e-9),
            Directive::Hold => panic!("expected the shepherd to reposition"),
        }
    }

    #[test]
    fn rule_tables_are_role_specific() {
        let herd: Vec<RuleKind> = rules_for(Role::Herd).iter().map(|r| r.kind).collect();
        let shepherd: Vec<RuleKind> = rules_for(Role::Shepherd).iter().map(|r| r.kind).collect();
        assert_eq!(
            herd,
            vec![
                RuleKind::Separation,
                RuleKind::Cohesion,
                RuleKind::Alignment,
                RuleKind::Flee
            ]
        );
        assert_eq!(shepherd, vec![RuleKind::Separation, RuleKind::Control]);
    }

    #[test]
    fn zero_weights_silence_rules() {
        let mut cfg = config();
        cfg.herd.weights = RuleWeights {
            separation: 0.0,
            cohesion: 0.0,
            alignment: 0.0,
            flee: 0.0,
            control: 0.0,
        };
        let agents = vec![
            Agent::herd(0, DVec2::new(10.0, 10.0), 0.0, 0.0),
            Agent::herd(1, DVec2::new(10.5, 10.0), 1.0, 0.0),
            Agent::shepherd(2, DVec2::new(9.5, 10.0), 0.0, 0.0),
        ];
        let f = with_ctx(&cfg, &agents, |ctx| steering_force(&agents[0], ctx));
        assert_eq!(f, DVec2::ZERO);
    }

    #[test]
    fn steer_clamps_turn_to_max_rate() {
        let p = params(1.0);
        let steering = Steering {
            force: DVec2::new(0.0, 1.0),
            brake: false,
        };
        let (heading, _) = steer(0.0, 1.0, steering, &p, 0.1);
        assert!((heading - 0.1).abs() < 1e-12);

        let steering = Steering {
            force: DVec2::new(0.0, -1.0),
            brake: false,
        };
        let (heading, _) = steer(0.0, 1.0, steering, &p, 0.1);
        assert!((heading - (2.0 * PI - 0.1)).abs() < 1e-12);
    }

    #[test]
    fn steer_applies_small_turn_fully() {
        let p = params(10.0);
        let steering = Steering {
            force: kinematics::unit(0.3),
            brake: false,
        };
        let (heading, _) = steer(0.0, 1.0, steering, &p, 0.1);
        assert!((heading - 0.3).abs() < 1e-12);
    }

    #[test]
    fn steer_without_force_keeps_state() {
        let p = params(1.0);
        let steering = Steering {
            force: DVec2::ZERO,
            brake: false,
        };
        assert_eq!(steer(1.25, 1.5, steering, &p, 0.1), (1.25, 1.5));
    }

    #[test]
    fn steer_clamps_speed_and_brakes() {
        let p = params(1.0);
        let push = Steering {
            force: DVec2::new(100.0, 0.0),
            brake: false,
        };
        let (_, speed) = steer(0.0, 1.9, push, &p, 1.0);
        assert_eq!(speed, p.speed_max);

        let brake = Steering {
            force: DVec2::ZERO,
            brake: true,
        };
        let (heading, speed) = steer(0.5, 1.0, brake, &p, 0.1);
        assert_eq!(heading, 0.5);
        assert!((speed - (1.0 - p.max_acceleration * 0.1)).abs() < 1e-12);
        let (_, speed) = steer(0.5, 0.01, brake, &p, 0.1);
        assert_eq!(speed, p.speed_min);
    }
}
