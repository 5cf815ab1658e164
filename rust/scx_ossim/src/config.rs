//! Scheduler configuration.
//!
//! The configuration is fixed at startup: it is validated once when the
//! scheduler is built and never changes afterwards.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::types::{Level, SimTime};

/// Default number of multilevel feedback queues.
pub const DEFAULT_NR_LEVELS: u8 = 4;

/// Scheduling algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// First come, first served. Processes run until they block or exit.
    Fifo,
    /// FIFO order with a fixed timeslice.
    #[value(name = "rr")]
    RoundRobin,
    /// Highest static priority first, with wake-up preemption.
    #[value(name = "priority")]
    StaticPriority,
    /// Multilevel feedback queues with aging.
    #[value(name = "mlfq")]
    Multilevel,
}

impl Algorithm {
    /// Whether dispatches under this algorithm arm a timeslice timer.
    pub fn is_timesliced(self) -> bool {
        matches!(self, Algorithm::RoundRobin | Algorithm::Multilevel)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Fifo => "FIFO",
            Algorithm::RoundRobin => "round robin",
            Algorithm::StaticPriority => "static priority",
            Algorithm::Multilevel => "multilevel feedback queues",
        };
        f.write_str(name)
    }
}

/// Errors from validating a [`SchedConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The CPU count was zero.
    NoCpus,
    /// A timesliced algorithm was configured without a timeslice.
    MissingTimeslice(Algorithm),
    /// The timeslice was zero.
    ZeroTimeslice,
    /// Multilevel feedback was configured without a max wait time.
    MissingMaxWait,
    /// Multilevel feedback needs at least two levels.
    TooFewLevels(u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoCpus => write!(f, "CPU count must be at least 1"),
            ConfigError::MissingTimeslice(alg) => {
                write!(f, "{alg} scheduling requires a timeslice")
            }
            ConfigError::ZeroTimeslice => write!(f, "timeslice must be at least 1 tick"),
            ConfigError::MissingMaxWait => {
                write!(f, "multilevel feedback scheduling requires a max wait time")
            }
            ConfigError::TooFewLevels(n) => {
                write!(f, "multilevel feedback needs at least 2 levels, got {n}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Immutable scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedConfig {
    pub nr_cpus: u32,
    pub algorithm: Algorithm,
    /// Timeslice length in ticks (RoundRobin and Multilevel).
    pub timeslice: Option<SimTime>,
    /// Ticks a process may wait in a lower level before it is promoted
    /// (Multilevel only).
    pub max_wait: Option<SimTime>,
    /// Number of multilevel feedback queues.
    #[serde(default = "default_nr_levels")]
    pub nr_levels: u8,
    /// Move a process one level down when its timeslice expires
    /// (Multilevel only). Off by default: preempted processes go back to
    /// the level they were running at.
    #[serde(default)]
    pub demote_on_preempt: bool,
}

fn default_nr_levels() -> u8 {
    DEFAULT_NR_LEVELS
}

impl SchedConfig {
    fn base(nr_cpus: u32, algorithm: Algorithm) -> Self {
        SchedConfig {
            nr_cpus,
            algorithm,
            timeslice: None,
            max_wait: None,
            nr_levels: DEFAULT_NR_LEVELS,
            demote_on_preempt: false,
        }
    }

    pub fn fifo(nr_cpus: u32) -> Self {
        Self::base(nr_cpus, Algorithm::Fifo)
    }

    pub fn round_robin(nr_cpus: u32, timeslice: SimTime) -> Self {
        SchedConfig {
            timeslice: Some(timeslice),
            ..Self::base(nr_cpus, Algorithm::RoundRobin)
        }
    }

    pub fn static_priority(nr_cpus: u32) -> Self {
        Self::base(nr_cpus, Algorithm::StaticPriority)
    }

    pub fn multilevel(nr_cpus: u32, timeslice: SimTime, max_wait: SimTime) -> Self {
        SchedConfig {
            timeslice: Some(timeslice),
            max_wait: Some(max_wait),
            ..Self::base(nr_cpus, Algorithm::Multilevel)
        }
    }

    /// Check that every argument the configured algorithm needs is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nr_cpus == 0 {
            return Err(ConfigError::NoCpus);
        }
        if self.algorithm.is_timesliced() {
            match self.timeslice {
                None => return Err(ConfigError::MissingTimeslice(self.algorithm)),
                Some(0) => return Err(ConfigError::ZeroTimeslice),
                Some(_) => {}
            }
        }
        if self.algorithm == Algorithm::Multilevel {
            if self.max_wait.is_none() {
                return Err(ConfigError::MissingMaxWait);
            }
            if self.nr_levels < 2 {
                return Err(ConfigError::TooFewLevels(self.nr_levels));
            }
        }
        Ok(())
    }

    /// The timer to arm on every dispatch: `None` means run to completion.
    pub fn dispatch_slice(&self) -> Option<SimTime> {
        if self.algorithm.is_timesliced() {
            self.timeslice
        } else {
            None
        }
    }

    /// The lowest multilevel feedback level.
    pub fn lowest_level(&self) -> Level {
        Level(self.nr_levels)
    }
}
