//! Trace event recording for the simulator.
//!
//! Every scheduling action (process dispatched, preempted, blocked, woken,
//! terminated, CPU idle) is recorded as a `TraceEvent` with a simulated
//! timestamp and CPU ID.

use crate::types::{CpuId, Pid, SimTime};

/// A single trace event produced by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Simulated time when this event occurred.
    pub time: SimTime,
    /// The CPU on which this event occurred. `None` for wake-ups, which
    /// come from the event source rather than a CPU.
    pub cpu: Option<CpuId>,
    /// The kind of event.
    pub kind: TraceKind,
}

/// The type of scheduling event recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceKind {
    /// A process was loaded onto this CPU.
    ProcessScheduled { pid: Pid, slice: Option<SimTime> },
    /// A process was taken off this CPU and put back in the ready structure.
    ProcessPreempted { pid: Pid },
    /// A process left this CPU to wait for I/O.
    ProcessYielded { pid: Pid },
    /// A process completed its last burst.
    ProcessTerminated { pid: Pid },
    /// A process became runnable.
    ProcessWoke { pid: Pid },
    /// The scheduler requested an out-of-band preemption of this CPU.
    ForcedPreempt,
    /// The CPU started running the idle routine.
    CpuIdle,
}

/// Aggregate statistics of a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Number of times a process was loaded onto a CPU.
    pub context_switches: u64,
    /// Simulated time at which the last event was processed.
    pub total_time: SimTime,
    /// Total ticks processes spent runnable but not running.
    pub ready_time: SimTime,
}

/// A complete simulation trace, containing all events in chronological order.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    events: Vec<TraceEvent>,
    stats: RunStats,
}

impl Trace {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, time: SimTime, cpu: CpuId, kind: TraceKind) {
        self.push(time, Some(cpu), kind);
    }

    /// Record an event not tied to any CPU.
    pub(crate) fn record_unbound(&mut self, time: SimTime, kind: TraceKind) {
        self.push(time, None, kind);
    }

    fn push(&mut self, time: SimTime, cpu: Option<CpuId>, kind: TraceKind) {
        if matches!(kind, TraceKind::ProcessScheduled { .. }) {
            self.stats.context_switches += 1;
        }
        self.stats.total_time = self.stats.total_time.max(time);
        self.events.push(TraceEvent { time, cpu, kind });
    }

    pub(crate) fn add_ready_time(&mut self, ticks: SimTime) {
        self.stats.ready_time = self.stats.ready_time.saturating_add(ticks);
    }

    /// Get all events in chronological order.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn context_switches(&self) -> u64 {
        self.stats.context_switches
    }

    /// Total ticks `pid` spent on a CPU.
    ///
    /// Sums the intervals between `ProcessScheduled` and the next
    /// preempt/yield/terminate event for that PID.
    pub fn total_runtime(&self, pid: Pid) -> SimTime {
        let mut total: SimTime = 0;
        let mut running_since: Option<SimTime> = None;

        for event in &self.events {
            match &event.kind {
                TraceKind::ProcessScheduled { pid: p, .. } if *p == pid => {
                    running_since = Some(event.time);
                }
                TraceKind::ProcessPreempted { pid: p }
                | TraceKind::ProcessYielded { pid: p }
                | TraceKind::ProcessTerminated { pid: p }
                    if *p == pid =>
                {
                    if let Some(start) = running_since.take() {
                        total += event.time - start;
                    }
                }
                _ => {}
            }
        }

        total
    }

    /// Count the number of times a process was dispatched.
    pub fn schedule_count(&self, pid: Pid) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::ProcessScheduled { pid: p, .. } if p == pid))
            .count()
    }

    /// PIDs in the order they were dispatched, across all CPUs.
    pub fn dispatch_order(&self) -> Vec<Pid> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                TraceKind::ProcessScheduled { pid, .. } => Some(pid),
                _ => None,
            })
            .collect()
    }

    /// Simulated time at which `pid` terminated, if it did.
    pub fn completion_time(&self, pid: Pid) -> Option<SimTime> {
        self.events.iter().find_map(|e| match e.kind {
            TraceKind::ProcessTerminated { pid: p } if p == pid => Some(e.time),
            _ => None,
        })
    }

    /// Count the number of times a CPU went idle.
    pub fn idle_count(&self, cpu: CpuId) -> usize {
        self.cpu_events(cpu)
            .filter(|e| matches!(e.kind, TraceKind::CpuIdle))
            .count()
    }

    /// Events that happened on `cpu`, in order.
    pub fn cpu_events(&self, cpu: CpuId) -> impl Iterator<Item = &TraceEvent> + '_ {
        self.events.iter().filter(move |e| e.cpu == Some(cpu))
    }

    /// Pretty-print the trace for debugging.
    pub fn dump(&self) {
        for event in &self.events {
            let desc = match &event.kind {
                TraceKind::ProcessScheduled { pid, slice } => match slice {
                    Some(slice) => format!("SCHED    pid={} slice={}", pid.0, slice),
                    None => format!("SCHED    pid={}", pid.0),
                },
                TraceKind::ProcessPreempted { pid } => format!("PREEMPT  pid={}", pid.0),
                TraceKind::ProcessYielded { pid } => format!("IO       pid={}", pid.0),
                TraceKind::ProcessTerminated { pid } => format!("EXIT     pid={}", pid.0),
                TraceKind::ProcessWoke { pid } => format!("WAKE     pid={}", pid.0),
                TraceKind::ForcedPreempt => "KICK".to_string(),
                TraceKind::CpuIdle => "IDLE".to_string(),
            };
            match event.cpu {
                Some(cpu) => eprintln!("[{:>8}] cpu={:<3} {}", event.time, cpu.0, desc),
                None => eprintln!("[{:>8}] cpu=-   {}", event.time, desc),
            }
        }
    }
}
