//! Wall-clock pacing for interactive runs.
//!
//! The world itself only ever advances by fixed ticks; this module decides how
//! many ticks a frame of real time is worth and when to give up on a backlog.

use crate::metrics::Snapshot;
use crate::world::World;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Fixed-timestep accumulator.
#[derive(Clone, Debug)]
pub struct FixedTimestep {
    dt: f64,
    max_ticks_per_frame: u32,
    accumulator: f64,
    dropped_ticks: u64,
}

/// Outcome of feeding one frame of wall time into a [`FixedTimestep`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameTicks {
    /// Ticks to run this frame.
    pub ticks: u32,
    /// Whole ticks of backlog discarded because the frame cap was hit.
    pub dropped: u64,
}

impl FixedTimestep {
    /// `dt` must be positive and finite; `max_ticks_per_frame` of zero is
    /// treated as one.
    pub fn new(dt: f64, max_ticks_per_frame: u32) -> Self {
        Self {
            dt,
            max_ticks_per_frame: max_ticks_per_frame.max(1),
            accumulator: 0.0,
            dropped_ticks: 0,
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Total ticks dropped since construction.
    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks
    }

    /// Fraction of a tick left in the accumulator, in `[0, 1)`.
    pub fn alpha(&self) -> f64 {
        if self.dt > 0.0 {
            self.accumulator / self.dt
        } else {
            0.0
        }
    }

    /// Add `elapsed` seconds of wall time and return the ticks owed.
    pub fn advance(&mut self, elapsed: f64) -> FrameTicks {
        if !(elapsed.is_finite() && elapsed > 0.0) || !(self.dt.is_finite() && self.dt > 0.0) {
            return FrameTicks::default();
        }
        self.accumulator += elapsed;
        let owed = (self.accumulator / self.dt).floor();
        self.accumulator -= owed * self.dt;
        // Guard against the subtraction landing a hair below zero.
        self.accumulator = self.accumulator.max(0.0);

        let owed = owed as u64;
        let cap = u64::from(self.max_ticks_per_frame);
        let ticks = owed.min(cap);
        let dropped = owed - ticks;
        self.dropped_ticks += dropped;
        FrameTicks {
            ticks: ticks as u32,
            dropped,
        }
    }

    pub fn advance_duration(&mut self, elapsed: Duration) -> FrameTicks {
        self.advance(elapsed.as_secs_f64())
    }
}

/// Cooperative stop flag shared between the realtime driver and its caller.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counters from a finished [`run_realtime`] loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RealtimeReport {
    pub frames: u64,
    pub ticks: u64,
    pub dropped_ticks: u64,
}

/// Tick `world` in step with wall time until `stop` fires.
///
/// Each frame sleeps for `frame_budget`, runs the fixed ticks the elapsed time
/// is worth (at most `max_ticks_per_frame`), then hands the committed snapshot
/// to `on_frame`. The signal is only checked between frames, so the world is
/// stopped on a tick boundary.
pub fn run_realtime<F>(
    world: &mut World,
    stop: &StopSignal,
    frame_budget: Duration,
    max_ticks_per_frame: u32,
    mut on_frame: F,
) -> RealtimeReport
where
    F: FnMut(&Snapshot),
{
    let mut timestep = FixedTimestep::new(world.config().dt(), max_ticks_per_frame);
    let mut report = RealtimeReport::default();
    let mut last = Instant::now();

    while !stop.is_stopped() {
        std::thread::sleep(frame_budget);
        let now = Instant::now();
        let frame = timestep.advance_duration(now.duration_since(last));
        last = now;

        if frame.dropped > 0 {
            warn!(dropped = frame.dropped, "frame overran; dropping tick backlog");
        }
        for _ in 0..frame.ticks {
            world.tick();
        }
        report.frames += 1;
        report.ticks += u64::from(frame.ticks);
        on_frame(&world.snapshot());
    }

    report.dropped_ticks = timestep.dropped_ticks();
    world.stop();
    debug!(
        frames = report.frames,
        ticks = report.ticks,
        dropped = report.dropped_ticks,
        "realtime loop finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::world::WorldState;

    #[test]
    fn accumulates_partial_frames() {
        let mut ts = FixedTimestep::new(0.1, 8);
        assert_eq!(ts.advance(0.05).ticks, 0);
        assert_eq!(ts.advance(0.06).ticks, 1);
        assert!(ts.alpha() < 0.2);
    }

    #[test]
    fn caps_ticks_and_reports_dropped_backlog() {
        let mut ts = FixedTimestep::new(0.01, 4);
        let frame = ts.advance(0.105);
        assert_eq!(frame.ticks, 4);
        assert_eq!(frame.dropped, 6);
        assert_eq!(ts.dropped_ticks(), 6);
        // Backlog is gone, only the remainder carries over.
        assert_eq!(ts.advance(0.006).ticks, 1);
    }

    #[test]
    fn ignores_invalid_elapsed() {
        let mut ts = FixedTimestep::new(0.1, 4);
        assert_eq!(ts.advance(-1.0), FrameTicks::default());
        assert_eq!(ts.advance(f64::NAN), FrameTicks::default());
        assert_eq!(ts.alpha(), 0.0);
    }

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let other = signal.clone();
        assert!(!other.is_stopped());
        signal.stop();
        assert!(other.is_stopped());
    }

    #[test]
    fn realtime_loop_stops_world_when_signalled() {
        let config = SimConfig {
            herd_count: 8,
            shepherd_count: 1,
            tick_rate_hz: 1000.0,
            ..SimConfig::default()
        };
        let mut world = World::new(config).expect("default config should be valid");
        let stop = StopSignal::new();
        let handle = stop.clone();
        let mut frames = 0;
        let report = run_realtime(&mut world, &stop, Duration::from_millis(2), 64, |snap| {
            frames += 1;
            assert_eq!(snap.agents.len(), 9);
            if frames == 3 {
                handle.stop();
            }
        });
        assert_eq!(report.frames, 3);
        assert_eq!(world.state(), WorldState::Stopped);
        assert_eq!(world.tick_count(), report.ticks);
    }
}
