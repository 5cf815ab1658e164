//! Workload definition, builder API and JSON loader.
//!
//! A workload is a set of processes, each with an arrival time and a script
//! of alternating CPU and I/O bursts. A process starts with a CPU burst and
//! terminates when its last CPU burst completes.
//!
//! JSON format:
//!
//! ```json
//! {
//!   "end_time": 500,
//!   "processes": [
//!     { "name": "editor", "pid": 1, "priority": 3, "arrival": 0,
//!       "bursts": [ {"cpu": 2}, {"io": 10}, {"cpu": 1} ] }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{Level, Pid, Priority, SimTime};

/// One step of a process script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Burst {
    /// Compute for the given number of ticks.
    Cpu(SimTime),
    /// Block on I/O for the given number of ticks.
    Io(SimTime),
}

/// Definition of a process for workload creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDef {
    pub name: String,
    pub pid: Pid,
    #[serde(default)]
    pub priority: Priority,
    /// Initial multilevel feedback level.
    #[serde(default)]
    pub level: Level,
    /// When the process first becomes runnable.
    #[serde(default)]
    pub arrival: SimTime,
    pub bursts: Vec<Burst>,
}

impl ProcessDef {
    /// Total CPU ticks the process needs.
    pub fn cpu_demand(&self) -> SimTime {
        self.bursts
            .iter()
            .map(|b| match b {
                Burst::Cpu(t) => *t,
                Burst::Io(_) => 0,
            })
            .sum()
    }
}

/// A complete workload: processes and an optional cut-off time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub processes: Vec<ProcessDef>,
    /// Stop the simulation at this time even if processes remain.
    #[serde(default)]
    pub end_time: Option<SimTime>,
}

/// Errors from loading or validating a workload.
#[derive(Debug)]
pub enum WorkloadError {
    /// JSON parse error.
    Json(serde_json::Error),
    /// File could not be read.
    Io(std::io::Error),
    /// The workload has no processes.
    Empty,
    /// Two processes share a PID.
    DuplicatePid(Pid),
    /// A process script is malformed.
    InvalidBursts { pid: Pid, reason: &'static str },
    /// A process starts outside the configured feedback levels.
    LevelOutOfRange { pid: Pid, level: Level },
}

impl fmt::Display for WorkloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadError::Json(e) => write!(f, "JSON parse error: {e}"),
            WorkloadError::Io(e) => write!(f, "read error: {e}"),
            WorkloadError::Empty => write!(f, "workload has no processes"),
            WorkloadError::DuplicatePid(pid) => write!(f, "duplicate pid {pid}"),
            WorkloadError::InvalidBursts { pid, reason } => {
                write!(f, "invalid bursts for pid {pid}: {reason}")
            }
            WorkloadError::LevelOutOfRange { pid, level } => {
                write!(f, "pid {pid} starts at level {}, outside the feedback levels", level.0)
            }
        }
    }
}

impl std::error::Error for WorkloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkloadError::Json(e) => Some(e),
            WorkloadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for WorkloadError {
    fn from(e: serde_json::Error) -> Self {
        WorkloadError::Json(e)
    }
}

impl From<std::io::Error> for WorkloadError {
    fn from(e: std::io::Error) -> Self {
        WorkloadError::Io(e)
    }
}

/// Builder for constructing workloads.
pub struct WorkloadBuilder {
    processes: Vec<ProcessDef>,
    end_time: Option<SimTime>,
    next_pid: Pid,
}

impl Workload {
    pub fn builder() -> WorkloadBuilder {
        WorkloadBuilder {
            processes: Vec::new(),
            end_time: None,
            next_pid: Pid(1),
        }
    }

    /// Parse and validate a JSON workload.
    pub fn from_json(json: &str) -> Result<Self, WorkloadError> {
        let workload: Workload = serde_json::from_str(json)?;
        workload.validate()?;
        Ok(workload)
    }

    /// Read, parse and validate a JSON workload file.
    pub fn load(path: &Path) -> Result<Self, WorkloadError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), WorkloadError> {
        if self.processes.is_empty() {
            return Err(WorkloadError::Empty);
        }
        let mut seen = HashSet::new();
        for def in &self.processes {
            if !seen.insert(def.pid) {
                return Err(WorkloadError::DuplicatePid(def.pid));
            }
            if def.level < Level::TOP {
                return Err(WorkloadError::LevelOutOfRange {
                    pid: def.pid,
                    level: def.level,
                });
            }
            validate_bursts(def)?;
        }
        Ok(())
    }

    /// Check that every process starts at a level between `Level::TOP` and
    /// `lowest`.
    pub fn validate_levels(&self, lowest: Level) -> Result<(), WorkloadError> {
        match self
            .processes
            .iter()
            .find(|def| def.level < Level::TOP || def.level > lowest)
        {
            Some(def) => Err(WorkloadError::LevelOutOfRange {
                pid: def.pid,
                level: def.level,
            }),
            None => Ok(()),
        }
    }

    /// A mix of interactive (I/O-bound) and batch (CPU-bound) processes
    /// arriving over the first few ticks.
    pub fn default_mix() -> Self {
        let io_bound = |cycles: usize, cpu: SimTime, io: SimTime| -> Vec<Burst> {
            let mut bursts = Vec::with_capacity(cycles * 2 + 1);
            for _ in 0..cycles {
                bursts.push(Burst::Cpu(cpu));
                bursts.push(Burst::Io(io));
            }
            bursts.push(Burst::Cpu(cpu));
            bursts
        };

        Workload::builder()
            .add_process("Iapache", 8, 0, io_bound(6, 1, 8))
            .add_process("Ibash", 7, 1, io_bound(5, 1, 12))
            .add_process("Imozilla", 7, 2, io_bound(5, 2, 6))
            .add_process("Ccpu", 5, 3, io_bound(2, 20, 3))
            .add_process("Cgcc", 1, 5, io_bound(1, 30, 4))
            .add_process("Cspice", 2, 7, vec![Burst::Cpu(45)])
            .add_process("Cmysql", 3, 9, io_bound(3, 10, 2))
            .add_process("Cmake", 4, 12, io_bound(2, 15, 5))
            .build()
    }
}

fn validate_bursts(def: &ProcessDef) -> Result<(), WorkloadError> {
    let invalid = |reason| WorkloadError::InvalidBursts {
        pid: def.pid,
        reason,
    };
    match (def.bursts.first(), def.bursts.last()) {
        (Some(Burst::Cpu(_)), Some(Burst::Cpu(_))) => {}
        (None, _) => return Err(invalid("no bursts")),
        _ => return Err(invalid("must start and end with a CPU burst")),
    }
    for (i, burst) in def.bursts.iter().enumerate() {
        let (is_cpu, ticks) = match burst {
            Burst::Cpu(t) => (true, *t),
            Burst::Io(t) => (false, *t),
        };
        if ticks == 0 {
            return Err(invalid("zero-length burst"));
        }
        if is_cpu != (i % 2 == 0) {
            return Err(invalid("CPU and I/O bursts must alternate"));
        }
    }
    let span = def.bursts.iter().try_fold(def.arrival, |acc, burst| match burst {
        Burst::Cpu(t) | Burst::Io(t) => acc.checked_add(*t),
    });
    if span.is_none() {
        return Err(invalid("arrival plus burst lengths overflows the clock"));
    }
    Ok(())
}

impl WorkloadBuilder {
    /// Add a process with a full ProcessDef.
    pub fn process(mut self, def: ProcessDef) -> Self {
        self.next_pid = Pid(self.next_pid.0.max(def.pid.0 + 1));
        self.processes.push(def);
        self
    }

    /// Convenience: add a process with an auto-assigned PID at level 1.
    pub fn add_process(
        mut self,
        name: &str,
        priority: Priority,
        arrival: SimTime,
        bursts: Vec<Burst>,
    ) -> Self {
        let pid = self.next_pid;
        self.next_pid = Pid(pid.0 + 1);
        self.processes.push(ProcessDef {
            name: name.to_string(),
            pid,
            priority,
            level: Level::TOP,
            arrival,
            bursts,
        });
        self
    }

    /// Stop the simulation at `time`.
    pub fn end_time(mut self, time: SimTime) -> Self {
        self.end_time = Some(time);
        self
    }

    /// Build the workload.
    ///
    /// # Panics
    /// Panics if the workload is invalid.
    pub fn build(self) -> Workload {
        let workload = Workload {
            processes: self.processes,
            end_time: self.end_time,
        };
        if let Err(e) = workload.validate() {
            panic!("invalid workload: {e}");
        }
        workload
    }
}
