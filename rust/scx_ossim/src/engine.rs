//! Event-driven simulation engine.
//!
//! The engine is a single-threaded [`Harness`] for the scheduler core. It
//! maintains the event queue, the simulated clock and per-CPU/per-process
//! execution state, and turns process scripts into `wake_up`, `preempt`,
//! `yield_cpu` and `terminate` calls.
//!
//! Outbound requests from the core (context switches and forced
//! preemptions) are buffered by [`SimHarness`] and applied after each
//! handler returns, so the core is never re-entered from inside one of its
//! own handlers. Idle CPUs are only handed to [`CpuScheduler::idle`] when
//! the ready structure is non-empty, which keeps the single-threaded engine
//! from ever blocking.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::config::{Algorithm, ConfigError, SchedConfig};
use crate::harness::Harness;
use crate::process::Process;
use crate::sched::CpuScheduler;
use crate::trace::{Trace, TraceKind};
use crate::types::{CpuId, Pid, SimTime};
use crate::workload::{Burst, Workload, WorkloadError};

/// A simulation event, ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Event {
    time: SimTime,
    /// Tiebreaker for events at the same time (lower = earlier).
    seq: u64,
    kind: EventKind,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EventKind {
    /// A process arrives or its I/O completes.
    Wake { pid: Pid },
    /// The running process on `cpu` finishes its CPU burst.
    BurstDone { cpu: CpuId, generation: u64 },
    /// The timeslice armed on `cpu` expires.
    SliceExpired { cpu: CpuId, generation: u64 },
}

/// An outbound call from the scheduler core, waiting to be applied.
#[derive(Debug)]
enum Request {
    Switch {
        cpu: CpuId,
        proc: Option<Arc<Process>>,
        slice: Option<SimTime>,
    },
    Kick {
        cpu: CpuId,
    },
}

/// Harness side of the engine: a clock and a request buffer.
#[derive(Debug, Default)]
pub struct SimHarness {
    clock: AtomicU64,
    requests: Mutex<Vec<Request>>,
}

impl SimHarness {
    fn set_clock(&self, time: SimTime) {
        self.clock.store(time, Ordering::Relaxed);
    }

    fn take_requests(&self) -> Vec<Request> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

impl Harness for SimHarness {
    fn context_switch(&self, cpu: CpuId, proc: Option<Arc<Process>>, slice: Option<SimTime>) {
        self.requests
            .lock()
            .unwrap()
            .push(Request::Switch { cpu, proc, slice });
    }

    fn force_preempt(&self, cpu: CpuId) {
        self.requests.lock().unwrap().push(Request::Kick { cpu });
    }

    fn sim_time(&self) -> SimTime {
        self.clock.load(Ordering::Relaxed)
    }
}

/// Errors that prevent a simulation from starting.
#[derive(Debug)]
pub enum SimError {
    Config(ConfigError),
    Workload(WorkloadError),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config(e) => write!(f, "invalid configuration: {e}"),
            SimError::Workload(e) => write!(f, "invalid workload: {e}"),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Config(e) => Some(e),
            SimError::Workload(e) => Some(e),
        }
    }
}

impl From<ConfigError> for SimError {
    fn from(e: ConfigError) -> Self {
        SimError::Config(e)
    }
}

impl From<WorkloadError> for SimError {
    fn from(e: WorkloadError) -> Self {
        SimError::Workload(e)
    }
}

/// Engine view of a CPU.
#[derive(Debug, Default)]
struct SimCpu {
    /// The running process and when it was loaded.
    running: Option<(Pid, SimTime)>,
    /// Bumped on every context switch so stale timer events are ignored.
    generation: u64,
}

/// Engine view of a process: its script and progress through it.
struct SimProcess {
    proc: Arc<Process>,
    bursts: Vec<Burst>,
    /// Index of the current (or next, while blocked) CPU burst.
    burst_idx: usize,
    /// Ticks left in the current CPU burst.
    remaining: SimTime,
    /// When the process last became runnable without running.
    ready_since: Option<SimTime>,
}

struct SimState {
    cpus: Vec<SimCpu>,
    procs: HashMap<Pid, SimProcess>,
    events: BinaryHeap<Reverse<Event>>,
    seq: u64,
    trace: Trace,
    now: SimTime,
}

impl SimState {
    fn push(&mut self, time: SimTime, kind: EventKind) {
        self.events.push(Reverse(Event {
            time,
            seq: self.seq,
            kind,
        }));
        self.seq += 1;
    }

    fn proc_mut(&mut self, pid: Pid) -> &mut SimProcess {
        self.procs
            .get_mut(&pid)
            .unwrap_or_else(|| panic!("unknown pid={pid}"))
    }

    /// Take the running process off `cpu`, charging it for the time it ran.
    fn stop_current(&mut self, cpu: CpuId) -> Option<Pid> {
        let now = self.now;
        let sim_cpu = &mut self.cpus[cpu.index()];
        let (pid, started_at) = sim_cpu.running.take()?;
        sim_cpu.generation += 1;
        let sp = self.proc_mut(pid);
        sp.remaining = sp.remaining.saturating_sub(now - started_at);
        Some(pid)
    }

    fn is_current(&self, cpu: CpuId, generation: u64) -> bool {
        let sim_cpu = &self.cpus[cpu.index()];
        sim_cpu.running.is_some() && sim_cpu.generation == generation
    }
}

/// The main simulator.
pub struct Simulator {
    config: SchedConfig,
}

impl Simulator {
    pub fn new(config: SchedConfig) -> Self {
        Simulator { config }
    }

    /// Run a workload and return the trace.
    pub fn run(&self, workload: &Workload) -> Result<Trace, SimError> {
        workload.validate()?;
        let sched = CpuScheduler::new(self.config.clone(), SimHarness::default())?;
        if self.config.algorithm == Algorithm::Multilevel {
            workload.validate_levels(self.config.lowest_level())?;
        }

        let mut state = SimState {
            cpus: (0..self.config.nr_cpus).map(|_| SimCpu::default()).collect(),
            procs: HashMap::new(),
            events: BinaryHeap::new(),
            seq: 0,
            trace: Trace::new(),
            now: 0,
        };

        for def in &workload.processes {
            let proc = Process::new(def.pid, def.name.clone(), def.priority).with_level(def.level);
            let remaining = match def.bursts.first() {
                Some(Burst::Cpu(t)) => *t,
                _ => 0,
            };
            state.procs.insert(
                def.pid,
                SimProcess {
                    proc: Arc::new(proc),
                    bursts: def.bursts.clone(),
                    burst_idx: 0,
                    remaining,
                    ready_since: None,
                },
            );
            state.push(def.arrival, EventKind::Wake { pid: def.pid });
        }

        // Main event loop
        while let Some(Reverse(event)) = state.events.pop() {
            if workload.end_time.is_some_and(|end| event.time > end) {
                break;
            }
            state.now = event.time;
            sched.harness().set_clock(event.time);

            match event.kind {
                EventKind::Wake { pid } => self.handle_wake(pid, &sched, &mut state),
                EventKind::BurstDone { cpu, generation } => {
                    if state.is_current(cpu, generation) {
                        self.handle_burst_done(cpu, &sched, &mut state);
                    }
                }
                EventKind::SliceExpired { cpu, generation } => {
                    if state.is_current(cpu, generation) {
                        self.handle_slice_expired(cpu, &sched, &mut state);
                    }
                }
            }

            self.apply_requests(&sched, &mut state);
            self.dispatch_idle_cpus(&sched, &mut state);
        }

        sched.shutdown();
        let stats = state.trace.stats();
        info!(
            context_switches = stats.context_switches,
            total_time = stats.total_time,
            ready_time = stats.ready_time,
            "simulation done"
        );
        Ok(state.trace)
    }

    fn handle_wake(&self, pid: Pid, sched: &CpuScheduler<SimHarness>, state: &mut SimState) {
        let now = state.now;
        let sp = state.proc_mut(pid);
        sp.ready_since = Some(now);
        let proc = Arc::clone(&sp.proc);
        debug!(pid = pid.0, now, "WAKE");
        state
            .trace
            .record_unbound(now, TraceKind::ProcessWoke { pid });
        sched.wake_up(proc);
    }

    /// The running process finished its CPU burst: block on the following
    /// I/O burst, or exit if there is none.
    fn handle_burst_done(&self, cpu: CpuId, sched: &CpuScheduler<SimHarness>, state: &mut SimState) {
        let now = state.now;
        let pid = match state.stop_current(cpu) {
            Some(pid) => pid,
            None => return,
        };

        let sp = state.proc_mut(pid);
        let io = match sp.bursts.get(sp.burst_idx + 1) {
            Some(Burst::Io(io)) => Some(*io),
            _ => None,
        };

        match io {
            Some(io) => {
                sp.burst_idx += 2;
                sp.remaining = match sp.bursts.get(sp.burst_idx) {
                    Some(Burst::Cpu(t)) => *t,
                    _ => 0,
                };
                debug!(cpu = cpu.0, pid = pid.0, io, "IO");
                state
                    .trace
                    .record(now, cpu, TraceKind::ProcessYielded { pid });
                state.push(now.saturating_add(io), EventKind::Wake { pid });
                sched.yield_cpu(cpu);
            }
            None => {
                debug!(cpu = cpu.0, pid = pid.0, "EXIT");
                state
                    .trace
                    .record(now, cpu, TraceKind::ProcessTerminated { pid });
                sched.terminate(cpu);
            }
        }
    }

    fn handle_slice_expired(
        &self,
        cpu: CpuId,
        sched: &CpuScheduler<SimHarness>,
        state: &mut SimState,
    ) {
        if let Some(pid) = state.stop_current(cpu) {
            self.record_preempted(cpu, pid, state);
        }
        sched.preempt(cpu);
    }

    fn record_preempted(&self, cpu: CpuId, pid: Pid, state: &mut SimState) {
        let now = state.now;
        state.proc_mut(pid).ready_since = Some(now);
        debug!(cpu = cpu.0, pid = pid.0, "PREEMPTED");
        state
            .trace
            .record(now, cpu, TraceKind::ProcessPreempted { pid });
    }

    /// Apply buffered context switches and forced preemptions until the
    /// core stops issuing new ones.
    fn apply_requests(&self, sched: &CpuScheduler<SimHarness>, state: &mut SimState) {
        loop {
            let requests = sched.harness().take_requests();
            if requests.is_empty() {
                return;
            }
            for request in requests {
                match request {
                    Request::Switch { cpu, proc, slice } => {
                        self.context_switch(cpu, proc, slice, state);
                    }
                    Request::Kick { cpu } => {
                        state
                            .trace
                            .record(state.now, cpu, TraceKind::ForcedPreempt);
                        if let Some(pid) = state.stop_current(cpu) {
                            self.record_preempted(cpu, pid, state);
                        }
                        sched.preempt(cpu);
                    }
                }
            }
        }
    }

    fn context_switch(
        &self,
        cpu: CpuId,
        proc: Option<Arc<Process>>,
        slice: Option<SimTime>,
        state: &mut SimState,
    ) {
        let now = state.now;
        assert!(
            state.cpus[cpu.index()].running.is_none(),
            "context switch on busy cpu={cpu}"
        );

        let proc = match proc {
            Some(proc) => proc,
            None => {
                state.trace.record(now, cpu, TraceKind::CpuIdle);
                return;
            }
        };

        let pid = proc.pid();
        let sp = state.proc_mut(pid);
        let ready_for = sp.ready_since.take().map(|since| now - since);
        let remaining = sp.remaining;
        if let Some(ticks) = ready_for {
            state.trace.add_ready_time(ticks);
        }

        let sim_cpu = &mut state.cpus[cpu.index()];
        sim_cpu.running = Some((pid, now));
        sim_cpu.generation += 1;
        let generation = sim_cpu.generation;

        match slice {
            Some(slice) if slice < remaining => {
                state.push(now.saturating_add(slice), EventKind::SliceExpired { cpu, generation });
            }
            _ => state.push(
                now.saturating_add(remaining),
                EventKind::BurstDone { cpu, generation },
            ),
        }

        state
            .trace
            .record(now, cpu, TraceKind::ProcessScheduled { pid, slice });
    }

    /// Hand idle CPUs to the core while there is something to run.
    fn dispatch_idle_cpus(&self, sched: &CpuScheduler<SimHarness>, state: &mut SimState) {
        for i in 0..state.cpus.len() {
            if state.cpus[i].running.is_some() || !sched.has_ready() {
                continue;
            }
            sched.idle(CpuId(i as u32));
            self.apply_requests(sched, state);
        }
    }
}
