//! Newtype wrappers and type aliases for domain concepts.
//!
//! Newtypes for identifiers (PIDs, CPU IDs, feedback levels) prevent silent
//! type confusion. Simulated time is a plain alias: the core only ever
//! subtracts and compares it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pid(pub u32);

/// CPU (processing unit) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuId(pub u32);

impl CpuId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Multilevel feedback queue level. Level 1 is the highest priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Level(pub u8);

impl Level {
    pub const TOP: Level = Level(1);

    /// The next level towards `TOP`, saturating at `TOP`.
    pub fn raised(self) -> Level {
        if self.0 > Self::TOP.0 {
            Level(self.0 - 1)
        } else {
            Self::TOP
        }
    }

    /// The next level away from `TOP`, saturating at `lowest`.
    pub fn lowered(self, lowest: Level) -> Level {
        if self.0 < lowest.0 {
            Level(self.0 + 1)
        } else {
            lowest
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::TOP
    }
}

/// Simulated time in harness ticks.
pub type SimTime = u64;

/// Static priority. Higher values are more important.
pub type Priority = u32;

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
