use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glam::DVec2;
use herding_core::agent::Role;
use herding_core::clock::{self, StopSignal};
use herding_core::config::{IndexKind, SimConfig};
use herding_core::world::World;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const WORLD_WIDTH: f64 = 256.0;
const WORLD_HEIGHT: f64 = 192.0;
const WARMUP_TICKS: usize = 10;
const BENCHMARK_TICKS: usize = 200;
const TARGET_TPS: f64 = 120.0;
const MAX_TICKS_PER_FRAME: u32 = 8;

#[derive(Parser)]
#[command(name = "herding")]
#[command(about = "Herd and shepherd steering simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a headless simulation from a config file
    Run {
        /// Path to config file (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Number of fixed ticks to run
        #[arg(long, default_value_t = 1200)]
        ticks: usize,

        /// Sample herd metrics every N ticks
        #[arg(long, default_value_t = 60)]
        sample_every: usize,

        /// Output directory for summary.json and snapshot.json (optional)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run paced to wall-clock time, printing one status line per frame
    Realtime {
        /// Path to config file (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Wall-clock seconds to run for
        #[arg(long, default_value_t = 5.0)]
        seconds: f64,

        /// Frame interval in milliseconds
        #[arg(long, default_value_t = 33)]
        frame_ms: u64,
    },
    /// Run the tick-throughput benchmark suite
    Benchmark,
    /// Dump the default configuration to stdout
    DumpDefaultConfig,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: &Path) -> Result<SimConfig> {
    let file = File::open(path).context("failed to open config file")?;
    let reader = BufReader::new(file);
    let config: SimConfig = serde_json::from_reader(reader).context("failed to parse config")?;
    config.validate().context("Config validation error")?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

fn run_benchmark(herd_count: usize, index: IndexKind) -> Result<()> {
    let config = SimConfig {
        world_width: WORLD_WIDTH,
        world_height: WORLD_HEIGHT,
        herd_count,
        shepherd_count: (herd_count / 500).max(1),
        index,
        ..SimConfig::default()
    };
    let mut world = World::new(config).context("Benchmark world initialization error")?;

    for _ in 0..WARMUP_TICKS {
        world.tick();
    }

    let mut total_index = 0u64;
    let mut total_steering = 0u64;
    let mut total_commit = 0u64;
    let mut total_time = 0u64;

    for _ in 0..BENCHMARK_TICKS {
        let timings = world.tick();
        total_index += timings.index_build_us;
        total_steering += timings.steering_us;
        total_commit += timings.commit_us;
        total_time += timings.total_us;
    }

    let avg_tick_us = (total_time as f64 / BENCHMARK_TICKS as f64).max(1.0);
    let ticks_per_sec = 1_000_000.0 / avg_tick_us;
    let total_agents = world.agents().len();

    println!("--- {total_agents} agents ({index:?} index) ---");
    println!("  Avg tick:      {avg_tick_us:.0} us ({ticks_per_sec:.1} ticks/sec)");
    println!(
        "  Breakdown:     index={:.0} us, steering={:.0} us, commit={:.0} us",
        total_index as f64 / BENCHMARK_TICKS as f64,
        total_steering as f64 / BENCHMARK_TICKS as f64,
        total_commit as f64 / BENCHMARK_TICKS as f64,
    );
    let verdict = if ticks_per_sec >= TARGET_TPS {
        "GO"
    } else {
        "NO-GO"
    };
    println!("  Verdict:       {verdict} (target: >={TARGET_TPS} ticks/sec)");
    let metrics = world.metrics();
    println!(
        "  Herd spread:   {:.2} m, polarization {:.2}",
        metrics.herd_spread, metrics.herd_polarization
    );
    println!();
    Ok(())
}

fn run_realtime(config: SimConfig, seconds: f64, frame_ms: u64) -> Result<()> {
    if !(seconds.is_finite() && seconds > 0.0) {
        anyhow::bail!("--seconds must be positive and finite");
    }
    let mut world = World::new(config).context("World initialization error")?;
    let stop = StopSignal::new();
    let timer = {
        let stop = stop.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs_f64(seconds));
            stop.stop();
        })
    };

    let report = clock::run_realtime(
        &mut world,
        &stop,
        Duration::from_millis(frame_ms.max(1)),
        MAX_TICKS_PER_FRAME,
        |snapshot| {
            let (sum, count) = snapshot
                .iter_role(Role::Herd)
                .fold((DVec2::ZERO, 0usize), |(sum, n), a| (sum + a.position, n + 1));
            let centroid = if count > 0 { sum / count as f64 } else { DVec2::ZERO };
            println!(
                "tick {:>6}  t={:>7.2}s  herd centroid=({:>6.2}, {:>6.2})",
                snapshot.tick, snapshot.time, centroid.x, centroid.y
            );
        },
    );
    timer
        .join()
        .map_err(|_| anyhow::anyhow!("realtime timer thread panicked"))?;
    println!(
        "Realtime run complete: {} frames, {} ticks, {} dropped",
        report.frames, report.ticks, report.dropped_ticks
    );
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::DumpDefaultConfig => {
            let config = SimConfig::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Benchmark => {
            if cfg!(debug_assertions) {
                eprintln!("WARNING: running in debug mode. Results are not representative.");
                eprintln!("         Use: cargo run -p herding-cli --release -- benchmark");
                eprintln!();
            }
            println!("=== Herding Throughput Benchmark ===");
            println!("Warmup: {WARMUP_TICKS} ticks, Benchmark: {BENCHMARK_TICKS} ticks");
            println!("Target: >={TARGET_TPS} ticks/sec");
            println!();

            let herd_sizes = [100, 1_000, 5_000, 20_000];
            for index in [IndexKind::Grid, IndexKind::RTree, IndexKind::BruteForce] {
                println!("=== Index: {index:?} ===");
                for herd_count in herd_sizes {
                    // Quadratic scan is too slow to be worth timing at the top end.
                    if index == IndexKind::BruteForce && herd_count > 5_000 {
                        continue;
                    }
                    run_benchmark(herd_count, index)?;
                }
            }
        }
        Commands::Realtime {
            config,
            seconds,
            frame_ms,
        } => {
            let sim_config = match config {
                Some(path) => load_config(&path)?,
                None => SimConfig::default(),
            };
            run_realtime(sim_config, seconds, frame_ms)?;
        }
        Commands::Run {
            config,
            ticks,
            sample_every,
            out,
        } => {
            let sim_config = load_config(&config)?;
            println!("Simulating for {} ticks...", ticks);

            let mut world = World::new(sim_config).context("World initialization error")?;
            let summary = world
                .run(ticks, sample_every)
                .context("Run configuration error")?;

            if let Some(out_dir) = out {
                std::fs::create_dir_all(&out_dir).context("failed to create output directory")?;
                let file = File::create(out_dir.join("summary.json"))
                    .context("failed to create summary file")?;
                serde_json::to_writer_pretty(file, &summary).context("failed to write summary")?;
                let file = File::create(out_dir.join("snapshot.json"))
                    .context("failed to create snapshot file")?;
                serde_json::to_writer_pretty(file, &world.snapshot())
                    .context("failed to write snapshot")?;
                println!("Run complete. Results saved to {:?}", out_dir);
            } else if let Some(last) = summary.samples.last() {
                println!(
                    "Run complete. Herd spread {:.2} m, polarization {:.2}, nearest shepherd {}",
                    last.herd_spread,
                    last.herd_polarization,
                    last.nearest_shepherd_distance
                        .map(|d| format!("{d:.2} m"))
                        .unwrap_or_else(|| "n/a".to_string()),
                );
            } else {
                println!("Run complete. No ticks were run.");
            }
        }
    }
    Ok(())
}
