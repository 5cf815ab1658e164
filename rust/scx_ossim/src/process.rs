//! Process control blocks.
//!
//! A [`Process`] is created by the harness and shared with the scheduler as
//! an `Arc<Process>`. Identity and static priority are immutable; the
//! scheduling state lives behind a small leaf lock that is only taken for
//! the duration of a single transition.
//!
//! Every process carries a residency marker: detached, queued in the ready
//! structure, or on a CPU. Transitions assert the expected residency, so a
//! process that would end up in two places at once aborts the simulation
//! instead of silently corrupting the schedule.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::types::{CpuId, Level, Pid, Priority, SimTime};

/// The lifecycle state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Created by the harness, not yet handed to the scheduler.
    New,
    /// Runnable and waiting in the ready structure.
    Ready,
    /// Executing on a CPU.
    Running,
    /// Blocked on I/O until the next wake-up.
    Waiting,
    /// Finished. The scheduler never touches the process again.
    Terminated,
}

/// Where the scheduler currently holds a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Residency {
    Detached,
    Queued,
    OnCpu(CpuId),
}

#[derive(Debug)]
pub(crate) struct Pcb {
    pub state: ProcessState,
    /// Current multilevel feedback level.
    pub level: Level,
    /// Simulated time of the last enqueue.
    pub enqueued_at: SimTime,
    /// Whether aging already promoted the process during its current wait.
    pub promoted: bool,
    pub residency: Residency,
}

/// A simulated process.
pub struct Process {
    pid: Pid,
    name: String,
    priority: Priority,
    pcb: Mutex<Pcb>,
}

impl Process {
    pub fn new(pid: Pid, name: impl Into<String>, priority: Priority) -> Self {
        Process {
            pid,
            name: name.into(),
            priority,
            pcb: Mutex::new(Pcb {
                state: ProcessState::New,
                level: Level::TOP,
                enqueued_at: 0,
                promoted: false,
                residency: Residency::Detached,
            }),
        }
    }

    /// Set the initial multilevel feedback level.
    pub fn with_level(self, level: Level) -> Self {
        self.pcb().level = level;
        self
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn static_priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> ProcessState {
        self.pcb().state
    }

    /// Current multilevel feedback level.
    pub fn level(&self) -> Level {
        self.pcb().level
    }

    /// Simulated time of the last enqueue into the ready structure.
    pub fn enqueued_at(&self) -> SimTime {
        self.pcb().enqueued_at
    }

    /// The CPU the process is running on, if any.
    pub fn cpu(&self) -> Option<CpuId> {
        match self.pcb().residency {
            Residency::OnCpu(cpu) => Some(cpu),
            _ => None,
        }
    }

    /// Whether the process currently sits in the ready structure.
    pub fn is_queued(&self) -> bool {
        self.pcb().residency == Residency::Queued
    }

    pub(crate) fn pcb(&self) -> MutexGuard<'_, Pcb> {
        self.pcb.lock().unwrap()
    }

    /// Accept a wake-up from the harness.
    pub(crate) fn wake(&self) {
        let pcb = self.pcb();
        assert!(
            matches!(pcb.state, ProcessState::New | ProcessState::Waiting),
            "wake-up for pid={} in state {:?}",
            self.pid,
            pcb.state
        );
        assert_eq!(
            pcb.residency,
            Residency::Detached,
            "wake-up for pid={} which is still held by the scheduler",
            self.pid
        );
    }

    /// Record entry into the ready structure at `now`.
    pub(crate) fn mark_queued(&self, now: SimTime) {
        let mut pcb = self.pcb();
        assert_eq!(
            pcb.residency,
            Residency::Detached,
            "pid={} enqueued while already held by the scheduler",
            self.pid
        );
        assert_ne!(
            pcb.state,
            ProcessState::Terminated,
            "terminated pid={} enqueued",
            self.pid
        );
        pcb.state = ProcessState::Ready;
        pcb.enqueued_at = now;
        pcb.promoted = false;
        pcb.residency = Residency::Queued;
    }

    /// Record removal from the ready structure.
    pub(crate) fn mark_dequeued(&self) {
        let mut pcb = self.pcb();
        assert_eq!(
            pcb.residency,
            Residency::Queued,
            "pid={} dequeued but was not queued",
            self.pid
        );
        pcb.residency = Residency::Detached;
    }

    /// Record that the process now occupies `cpu`.
    pub(crate) fn mark_running(&self, cpu: CpuId) {
        let mut pcb = self.pcb();
        assert_eq!(
            pcb.residency,
            Residency::Detached,
            "pid={} assigned to cpu={} while already held by the scheduler",
            self.pid,
            cpu
        );
        pcb.state = ProcessState::Running;
        pcb.residency = Residency::OnCpu(cpu);
    }

    /// Record that the process left `cpu` and moved to `state`.
    pub(crate) fn mark_off_cpu(&self, cpu: CpuId, state: ProcessState) {
        let mut pcb = self.pcb();
        assert_eq!(
            pcb.residency,
            Residency::OnCpu(cpu),
            "pid={} removed from cpu={} it does not occupy",
            self.pid,
            cpu
        );
        assert_ne!(
            pcb.state,
            ProcessState::Terminated,
            "pid={} terminated twice",
            self.pid
        );
        pcb.state = state;
        pcb.residency = Residency::Detached;
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pcb = self.pcb();
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("state", &pcb.state)
            .field("level", &pcb.level)
            .finish()
    }
}
