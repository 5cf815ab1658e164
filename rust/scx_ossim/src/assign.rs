//! Per-CPU assignment table.
//!
//! Records which process, if any, occupies each CPU, and whether a forced
//! preemption has been requested for it but not yet delivered. The table has
//! its own lock, independent of the ready lock, and every method holds it
//! only for a single read or update.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::process::Process;
use crate::types::{CpuId, Priority};

#[derive(Debug, Clone, Default)]
struct Slot {
    proc: Option<Arc<Process>>,
    /// A `force_preempt` was issued for this CPU and its `preempt` has not
    /// run yet.
    kick_pending: bool,
}

/// Which process occupies each CPU.
#[derive(Debug)]
pub struct AssignmentTable {
    slots: Mutex<Vec<Slot>>,
}

impl AssignmentTable {
    pub fn new(nr_cpus: u32) -> Self {
        AssignmentTable {
            slots: Mutex::new(vec![Slot::default(); nr_cpus as usize]),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.slots.lock().unwrap()
    }

    pub fn nr_cpus(&self) -> u32 {
        self.lock().len() as u32
    }

    /// The process on `cpu`, or `None` if the CPU is idle.
    pub fn get(&self, cpu: CpuId) -> Option<Arc<Process>> {
        let mut slots = self.lock();
        slot_mut(&mut slots, cpu).proc.clone()
    }

    /// Put `proc` (or nothing) on `cpu`, returning the previous occupant.
    pub fn set(&self, cpu: CpuId, proc: Option<Arc<Process>>) -> Option<Arc<Process>> {
        let mut slots = self.lock();
        std::mem::replace(&mut slot_mut(&mut slots, cpu).proc, proc)
    }

    /// Clear `cpu`, returning its occupant.
    pub fn take(&self, cpu: CpuId) -> Option<Arc<Process>> {
        self.set(cpu, None)
    }

    /// A consistent copy of every slot, indexed by CPU.
    pub fn snapshot(&self) -> Vec<Option<Arc<Process>>> {
        self.lock().iter().map(|slot| slot.proc.clone()).collect()
    }

    pub fn idle_cpus(&self) -> Vec<CpuId> {
        self.lock()
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.proc.is_none())
            .map(|(i, _)| CpuId(i as u32))
            .collect()
    }

    /// Pick the CPU a waking process of priority `prio` should preempt and
    /// mark it as having a preemption in flight.
    ///
    /// Returns `None` if some CPU is idle, or if no CPU without a pending
    /// preemption runs something strictly less important. Among equally low
    /// CPUs the lowest-numbered wins.
    pub fn claim_victim(&self, prio: Priority) -> Option<CpuId> {
        let mut slots = self.lock();
        let mut lowest: Option<(usize, Priority)> = None;
        for (i, slot) in slots.iter().enumerate() {
            let running = slot.proc.as_ref()?;
            if slot.kick_pending {
                continue;
            }
            let p = running.static_priority();
            if lowest.map_or(true, |(_, low)| p < low) {
                lowest = Some((i, p));
            }
        }
        let (i, _) = lowest.filter(|&(_, low)| low < prio)?;
        slots[i].kick_pending = true;
        Some(CpuId(i as u32))
    }

    /// Whether a forced preemption of `cpu` is still in flight.
    pub fn kick_pending(&self, cpu: CpuId) -> bool {
        let mut slots = self.lock();
        slot_mut(&mut slots, cpu).kick_pending
    }

    /// Mark the forced preemption of `cpu`, if any, as delivered.
    pub fn clear_kick(&self, cpu: CpuId) -> bool {
        let mut slots = self.lock();
        std::mem::take(&mut slot_mut(&mut slots, cpu).kick_pending)
    }
}

fn slot_mut(slots: &mut [Slot], cpu: CpuId) -> &mut Slot {
    let nr = slots.len();
    slots
        .get_mut(cpu.index())
        .unwrap_or_else(|| panic!("cpu={cpu} out of range ({nr} CPUs)"))
}
