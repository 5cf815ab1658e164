#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use scx_ossim::*;

/// Initialize tracing from `RUST_LOG`.
///
/// `try_init()` is idempotent: first call in the process succeeds,
/// subsequent calls are silently ignored.
pub fn setup_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Harness that records every outbound call and delivers nothing. Tests
/// drive the clock with [`Recorder::set_time`] and deliver forced
/// preemptions by hand.
#[derive(Default)]
pub struct Recorder {
    now: AtomicU64,
    pub switches: Mutex<Vec<(CpuId, Option<Pid>, Option<SimTime>)>>,
    pub forced: Mutex<Vec<CpuId>>,
}

impl Recorder {
    pub fn set_time(&self, now: SimTime) {
        self.now.store(now, Ordering::Relaxed);
    }

    pub fn forced(&self) -> Vec<CpuId> {
        self.forced.lock().unwrap().clone()
    }

    pub fn take_forced(&self) -> Vec<CpuId> {
        std::mem::take(&mut *self.forced.lock().unwrap())
    }
}

impl Harness for Recorder {
    fn context_switch(&self, cpu: CpuId, proc: Option<Arc<Process>>, slice: Option<SimTime>) {
        self.switches
            .lock()
            .unwrap()
            .push((cpu, proc.map(|p| p.pid()), slice));
    }

    fn force_preempt(&self, cpu: CpuId) {
        self.forced.lock().unwrap().push(cpu);
    }

    fn sim_time(&self) -> SimTime {
        self.now.load(Ordering::Relaxed)
    }
}

pub fn scheduler(config: SchedConfig) -> CpuScheduler<Recorder> {
    CpuScheduler::new(config, Recorder::default()).unwrap()
}

pub fn proc(pid: u32, priority: Priority) -> Arc<Process> {
    Arc::new(Process::new(Pid(pid), format!("p{pid}"), priority))
}

pub fn proc_at_level(pid: u32, level: u8) -> Arc<Process> {
    Arc::new(Process::new(Pid(pid), format!("p{pid}"), 0).with_level(Level(level)))
}

/// Every process in `workload` ran exactly its CPU demand and terminated.
pub fn assert_all_completed(workload: &Workload, trace: &Trace) {
    for def in &workload.processes {
        assert!(
            trace.completion_time(def.pid).is_some(),
            "{} (pid={}) did not complete",
            def.name,
            def.pid
        );
        assert_eq!(
            trace.total_runtime(def.pid),
            def.cpu_demand(),
            "{} (pid={}) runtime mismatch",
            def.name,
            def.pid
        );
    }
}
