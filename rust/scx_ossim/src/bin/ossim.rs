//! ossim - Run the CPU scheduler against a simulated workload.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use scx_ossim::{Algorithm, SchedConfig, Simulator, Workload, DEFAULT_NR_LEVELS};

/// Run the CPU scheduler against a simulated workload.
#[derive(Parser)]
#[command(name = "ossim")]
struct Cli {
    /// Number of simulated CPUs.
    cpus: u32,

    /// Scheduling algorithm.
    #[arg(short, long, value_enum, default_value_t = Algorithm::Fifo)]
    algorithm: Algorithm,

    /// Timeslice in ticks (rr and mlfq).
    #[arg(short, long, value_name = "TICKS")]
    timeslice: Option<u64>,

    /// Ticks a process may wait in the ready structure before it is
    /// promoted one level (mlfq).
    #[arg(short = 'w', long, value_name = "TICKS")]
    max_wait: Option<u64>,

    /// Number of feedback levels (mlfq).
    #[arg(long, default_value_t = DEFAULT_NR_LEVELS)]
    levels: u8,

    /// Move a process down one level every time it is preempted (mlfq).
    #[arg(long)]
    demote: bool,

    /// Path to a JSON workload file. Uses the built-in mix if omitted.
    #[arg(long, value_name = "PATH", env = "OSSIM_WORKLOAD")]
    workload: Option<PathBuf>,

    /// Stop the simulation at this time (overrides the workload).
    #[arg(long, value_name = "TICKS")]
    end_time: Option<u64>,

    /// Print trace events to stderr.
    #[arg(long)]
    dump_trace: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = SchedConfig {
        nr_cpus: cli.cpus,
        algorithm: cli.algorithm,
        timeslice: cli.timeslice,
        max_wait: cli.max_wait,
        nr_levels: cli.levels,
        demote_on_preempt: cli.demote,
    };
    config.validate().context("invalid scheduler configuration")?;

    match config.timeslice {
        Some(ts) if config.algorithm.is_timesliced() => {
            info!("running with {}, timeslice = {ts}", config.algorithm)
        }
        _ => info!("running with {}", config.algorithm),
    }

    let mut workload = match &cli.workload {
        Some(path) => Workload::load(path)
            .with_context(|| format!("failed to load workload {}", path.display()))?,
        None => Workload::default_mix(),
    };
    if let Some(end_time) = cli.end_time {
        workload.end_time = Some(end_time);
    }

    let trace = Simulator::new(config).run(&workload)?;

    if cli.dump_trace {
        trace.dump();
    }

    let stats = trace.stats();
    println!("# of context switches: {}", stats.context_switches);
    println!("total execution time: {}", stats.total_time);
    println!("total time spent in READY state: {}", stats.ready_time);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .without_time()
        .try_init();
}
