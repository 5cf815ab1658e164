//! Ready queue engine.
//!
//! One structure serves all four algorithms. FIFO and round-robin use a
//! single arrival-ordered queue, static priority keeps a single queue sorted
//! by descending priority, and multilevel feedback keeps one FIFO queue per
//! level. The queue owns its `Arc<Process>` references: a process is in the
//! ready structure exactly when one of these queues holds it.
//!
//! The structure itself is not synchronized; the scheduler keeps it behind
//! the ready lock.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::warn;

use crate::config::{Algorithm, SchedConfig};
use crate::process::Process;
use crate::types::{Level, Pid, SimTime};

/// The ordering discipline of a [`ReadyQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discipline {
    /// Arrival order (FIFO and round-robin).
    Fifo,
    /// Descending static priority, arrival order among equals.
    Priority,
    /// Strict priority across levels, arrival order within a level.
    Multilevel,
}

/// The set of runnable processes waiting for a CPU.
#[derive(Debug)]
pub struct ReadyQueue {
    discipline: Discipline,
    /// `levels[0]` is level 1. Single-queue disciplines use only `levels[0]`.
    levels: Vec<VecDeque<Arc<Process>>>,
}

impl ReadyQueue {
    pub fn new(algorithm: Algorithm, nr_levels: u8) -> Self {
        let (discipline, nr_queues) = match algorithm {
            Algorithm::Fifo | Algorithm::RoundRobin => (Discipline::Fifo, 1),
            Algorithm::StaticPriority => (Discipline::Priority, 1),
            Algorithm::Multilevel => (Discipline::Multilevel, nr_levels.max(1) as usize),
        };
        ReadyQueue {
            discipline,
            levels: (0..nr_queues).map(|_| VecDeque::new()).collect(),
        }
    }

    pub fn for_config(config: &SchedConfig) -> Self {
        Self::new(config.algorithm, config.nr_levels)
    }

    /// Insert a process per the active discipline and mark it ready.
    ///
    /// `now` stamps the enqueue time used by aging.
    pub fn enqueue(&mut self, proc: Arc<Process>, now: SimTime) {
        proc.mark_queued(now);
        match self.discipline {
            Discipline::Fifo => self.levels[0].push_back(proc),
            Discipline::Priority => {
                let queue = &mut self.levels[0];
                let prio = proc.static_priority();
                // The queue is sorted, so the first strictly lower entry is
                // right after the last entry with priority >= prio.
                let at = queue
                    .iter()
                    .position(|p| p.static_priority() < prio)
                    .unwrap_or(queue.len());
                queue.insert(at, proc);
            }
            Discipline::Multilevel => {
                let lowest = Level(self.levels.len() as u8);
                let idx = {
                    let mut pcb = proc.pcb();
                    let level = pcb.level.clamp(Level::TOP, lowest);
                    if level != pcb.level {
                        warn!(
                            pid = proc.pid().0,
                            level = pcb.level.0,
                            lowest = lowest.0,
                            "level out of range, clamped"
                        );
                        pcb.level = level;
                    }
                    level.0 as usize - 1
                };
                self.levels[idx].push_back(proc);
            }
        }
    }

    /// Remove and return the next process per the active discipline.
    ///
    /// Returns `None` when nothing is runnable.
    pub fn dequeue(&mut self) -> Option<Arc<Process>> {
        let proc = self.levels.iter_mut().find_map(|q| q.pop_front())?;
        proc.mark_dequeued();
        Some(proc)
    }

    /// Promote processes that waited longer than `max_wait` in levels below
    /// the top one.
    ///
    /// A starved process moves up exactly one level relative to the queue it
    /// waits in, at most once per wait. It stays where it is physically; the
    /// new level takes effect on its next enqueue. Returns the number of
    /// promotions.
    pub fn age(&mut self, now: SimTime, max_wait: SimTime) -> usize {
        if self.discipline != Discipline::Multilevel {
            return 0;
        }
        let mut promoted = 0;
        for (idx, queue) in self.levels.iter().enumerate().skip(1) {
            let queue_level = Level(idx as u8 + 1);
            for proc in queue {
                let mut pcb = proc.pcb();
                if !pcb.promoted && now.saturating_sub(pcb.enqueued_at) > max_wait {
                    pcb.level = queue_level.raised();
                    pcb.promoted = true;
                    promoted += 1;
                }
            }
        }
        promoted
    }

    /// Number of queued processes across all levels.
    pub fn len(&self) -> usize {
        self.levels.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(VecDeque::is_empty)
    }

    /// All queued PIDs in dequeue order, without consuming.
    pub fn pids(&self) -> Vec<Pid> {
        self.levels
            .iter()
            .flat_map(|q| q.iter().map(|p| p.pid()))
            .collect()
    }

    /// Queued PIDs of a single multilevel feedback level.
    pub fn level_pids(&self, level: Level) -> Vec<Pid> {
        self.levels
            .get((level.0 as usize).wrapping_sub(1))
            .map_or_else(Vec::new, |q| q.iter().map(|p| p.pid()).collect())
    }
}
