//! The scheduler core: dispatch decision and event handlers.
//!
//! [`CpuScheduler`] is the single context object shared by every CPU worker
//! and by the event source. It owns the ready structure (behind the ready
//! lock and its condition variable) and the assignment table (behind its own
//! lock). The two locks are never held at the same time, and neither is held
//! while calling into the [`Harness`].
//!
//! Every handler except [`CpuScheduler::wake_up`] ends with a dispatch on the
//! CPU it was invoked for.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::debug;

use crate::assign::AssignmentTable;
use crate::config::{Algorithm, ConfigError, SchedConfig};
use crate::harness::Harness;
use crate::process::{Process, ProcessState};
use crate::queue::ReadyQueue;
use crate::types::{CpuId, Pid};

/// Preemptive multi-CPU scheduler.
pub struct CpuScheduler<H: Harness> {
    config: SchedConfig,
    ready: Mutex<ReadyQueue>,
    /// Notified on every enqueue and on shutdown.
    ready_cond: Condvar,
    assignments: AssignmentTable,
    harness: H,
    shutdown: AtomicBool,
}

impl<H: Harness> CpuScheduler<H> {
    /// Build a scheduler. Fails if `config` is missing an argument its
    /// algorithm needs.
    pub fn new(config: SchedConfig, harness: H) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            algorithm = %config.algorithm,
            nr_cpus = config.nr_cpus,
            timeslice = ?config.timeslice,
            max_wait = ?config.max_wait,
            "scheduler init"
        );
        Ok(CpuScheduler {
            ready: Mutex::new(ReadyQueue::for_config(&config)),
            ready_cond: Condvar::new(),
            assignments: AssignmentTable::new(config.nr_cpus),
            config,
            harness,
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    pub fn harness(&self) -> &H {
        &self.harness
    }

    pub fn nr_cpus(&self) -> u32 {
        self.config.nr_cpus
    }

    /// The process currently assigned to `cpu`.
    pub fn running(&self, cpu: CpuId) -> Option<Arc<Process>> {
        self.check_cpu(cpu);
        self.assignments.get(cpu)
    }

    /// Whether a forced preemption of `cpu` has been issued and not yet
    /// delivered through [`preempt`](Self::preempt).
    pub fn kick_pending(&self, cpu: CpuId) -> bool {
        self.check_cpu(cpu);
        self.assignments.kick_pending(cpu)
    }

    /// CPUs with no process assigned.
    pub fn idle_cpus(&self) -> Vec<CpuId> {
        self.assignments.idle_cpus()
    }

    pub fn nr_ready(&self) -> usize {
        self.ready().len()
    }

    pub fn has_ready(&self) -> bool {
        !self.ready().is_empty()
    }

    /// Ready PIDs in the order they would be dispatched.
    pub fn ready_pids(&self) -> Vec<Pid> {
        self.ready().pids()
    }

    /// Release every CPU blocked in [`idle`](Self::idle). Blocked and future
    /// `idle` calls return without dispatching.
    pub fn shutdown(&self) {
        // Set under the ready lock so a waiter cannot miss the notification
        // between checking the flag and going to sleep.
        let ready = self.ready();
        self.shutdown.store(true, Ordering::Release);
        drop(ready);
        self.ready_cond.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// The CPU has nothing to run: block until a process is ready, then
    /// dispatch it.
    pub fn idle(&self, cpu: CpuId) {
        self.check_cpu(cpu);
        {
            let mut ready = self.ready();
            while ready.is_empty() {
                if self.is_shut_down() {
                    debug!(cpu = cpu.0, "idle: shutdown");
                    return;
                }
                ready = self.ready_cond.wait(ready).unwrap();
            }
        }
        self.schedule(cpu);
    }

    /// The running process's timeslice expired, or a forced preemption was
    /// delivered: put it back into the ready structure and dispatch.
    pub fn preempt(&self, cpu: CpuId) {
        self.check_cpu(cpu);
        self.assignments.clear_kick(cpu);
        match self.assignments.take(cpu) {
            Some(proc) => {
                proc.mark_off_cpu(cpu, ProcessState::Ready);
                if self.config.algorithm == Algorithm::Multilevel && self.config.demote_on_preempt {
                    let mut pcb = proc.pcb();
                    pcb.level = pcb.level.lowered(self.config.lowest_level());
                }
                debug!(cpu = cpu.0, pid = proc.pid().0, "preempt");
                self.add_ready(proc);
            }
            // A forced preemption can race with the CPU running dry.
            None => debug!(cpu = cpu.0, "preempt: cpu already idle"),
        }
        self.schedule(cpu);
    }

    /// The running process blocks on I/O. It is not runnable again until it
    /// is woken up.
    pub fn yield_cpu(&self, cpu: CpuId) {
        let proc = self.take_running(cpu, "yield");
        proc.mark_off_cpu(cpu, ProcessState::Waiting);
        debug!(cpu = cpu.0, pid = proc.pid().0, "yield");
        self.schedule(cpu);
    }

    /// The running process finished.
    pub fn terminate(&self, cpu: CpuId) {
        let proc = self.take_running(cpu, "terminate");
        proc.mark_off_cpu(cpu, ProcessState::Terminated);
        debug!(cpu = cpu.0, pid = proc.pid().0, "terminate");
        self.schedule(cpu);
    }

    /// A process became runnable: a new arrival or an I/O completion.
    ///
    /// Under static priority, a process that outranks the lowest-priority
    /// running process forces that CPU to preempt, unless some CPU is idle
    /// and can take the process directly. Equal priority never preempts. A
    /// CPU whose forced preemption is still in flight is not chosen again.
    pub fn wake_up(&self, proc: Arc<Process>) {
        proc.wake();
        debug!(pid = proc.pid().0, priority = proc.static_priority(), "wake_up");

        let victim = if self.config.algorithm == Algorithm::StaticPriority {
            self.assignments.claim_victim(proc.static_priority())
        } else {
            None
        };

        self.add_ready(proc);

        if let Some(cpu) = victim {
            debug!(cpu = cpu.0, "wake_up: force preempt");
            self.harness.force_preempt(cpu);
        }
    }

    /// Dispatch the next ready process (or the idle routine) on `cpu`.
    fn schedule(&self, cpu: CpuId) {
        let proc = self.ready().dequeue();

        if let Some(proc) = &proc {
            proc.mark_running(cpu);
        }
        if let Some(prev) = self.assignments.set(cpu, proc.clone()) {
            panic!(
                "cpu={} dispatched while pid={} is still assigned",
                cpu,
                prev.pid()
            );
        }

        if self.config.algorithm == Algorithm::Multilevel {
            self.age();
        }

        let slice = self.config.dispatch_slice();
        match &proc {
            Some(p) => debug!(cpu = cpu.0, pid = p.pid().0, slice = ?slice, "dispatch"),
            None => debug!(cpu = cpu.0, "dispatch idle"),
        }
        self.harness.context_switch(cpu, proc, slice);
    }

    fn age(&self) {
        let max_wait = match self.config.max_wait {
            Some(max_wait) => max_wait,
            None => return,
        };
        let now = self.harness.sim_time();
        let promoted = self.ready().age(now, max_wait);
        if promoted > 0 {
            debug!(now, promoted, "aging");
        }
    }

    fn add_ready(&self, proc: Arc<Process>) {
        let now = self.harness.sim_time();
        self.ready().enqueue(proc, now);
        self.ready_cond.notify_one();
    }

    fn take_running(&self, cpu: CpuId, op: &str) -> Arc<Process> {
        self.check_cpu(cpu);
        self.assignments
            .take(cpu)
            .unwrap_or_else(|| panic!("{op} on cpu={cpu} with no process assigned"))
    }

    fn check_cpu(&self, cpu: CpuId) {
        assert!(
            cpu.0 < self.config.nr_cpus,
            "cpu={} out of range ({} CPUs)",
            cpu,
            self.config.nr_cpus
        );
    }

    fn ready(&self) -> MutexGuard<'_, ReadyQueue> {
        self.ready.lock().unwrap()
    }
}
