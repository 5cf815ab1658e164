//! scx_ossim - Preemptive multi-CPU process scheduler with a deterministic
//! event-driven simulation harness.
//!
//! The scheduler core decides which ready process runs on which CPU and for
//! how long. It supports four disciplines: FIFO, round robin, static
//! priority and multilevel feedback queues with aging.
//!
//! # Architecture
//!
//! - **Scheduler**: [`CpuScheduler`], the dispatch decision and the five
//!   event handlers (`idle`, `preempt`, `yield_cpu`, `terminate`, `wake_up`)
//! - **Ready queue**: per-algorithm ordering of runnable processes
//! - **Assignment table**: which process each CPU is running
//! - **Harness**: the outbound interface the core drives (context switches,
//!   forced preemptions, simulated time)
//! - **Engine**: a single-threaded [`Harness`] that replays a [`Workload`]
//!
//! # Usage
//!
//! ```rust,no_run
//! use scx_ossim::*;
//!
//! let workload = Workload::builder()
//!     .add_process("editor", 3, 0, vec![Burst::Cpu(2), Burst::Io(10), Burst::Cpu(1)])
//!     .add_process("build", 1, 0, vec![Burst::Cpu(40)])
//!     .build();
//!
//! let trace = Simulator::new(SchedConfig::round_robin(1, 4))
//!     .run(&workload)
//!     .unwrap();
//! trace.dump();
//! ```

pub mod assign;
pub mod config;
pub mod engine;
pub mod harness;
pub mod process;
pub mod queue;
pub mod sched;
pub mod trace;
pub mod types;
pub mod workload;

// Re-export the main public types for convenience.
pub use assign::AssignmentTable;
pub use config::{Algorithm, ConfigError, SchedConfig, DEFAULT_NR_LEVELS};
pub use engine::{SimError, SimHarness, Simulator};
pub use harness::Harness;
pub use process::{Process, ProcessState};
pub use queue::ReadyQueue;
pub use sched::CpuScheduler;
pub use trace::{RunStats, Trace, TraceEvent, TraceKind};
pub use types::{CpuId, Level, Pid, Priority, SimTime};
pub use workload::{Burst, ProcessDef, Workload, WorkloadBuilder, WorkloadError};
