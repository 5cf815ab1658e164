use scx_ossim::*;

mod common;

fn forced_preempts(trace: &Trace) -> Vec<(SimTime, CpuId)> {
    trace
        .events()
        .iter()
        .filter(|e| matches!(e.kind, TraceKind::ForcedPreempt))
        .map(|e| (e.time, e.cpu.unwrap()))
        .collect()
}

/// Priorities [3, 1, 5, 1] dequeue as 5, 3, then the two 1s in arrival
/// order.
#[test]
fn test_static_priority_ordering() {
    common::setup_test();
    let s = common::scheduler(SchedConfig::static_priority(1));
    for (pid, prio) in [(1, 3), (2, 1), (3, 5), (4, 1)] {
        s.wake_up(common::proc(pid, prio));
    }
    assert_eq!(s.ready_pids(), vec![Pid(3), Pid(1), Pid(2), Pid(4)]);

    s.idle(CpuId(0));
    let mut order = Vec::new();
    while let Some(p) = s.running(CpuId(0)) {
        order.push(p.pid());
        s.terminate(CpuId(0));
    }
    assert_eq!(order, vec![Pid(3), Pid(1), Pid(2), Pid(4)]);
    assert!(s.harness().forced().is_empty());
}

/// Two CPUs running priority 2, a priority 5 wake-up: exactly one forced
/// preemption, and the woken process ends up on a CPU.
#[test]
fn test_wakeup_preemption() {
    common::setup_test();
    let s = common::scheduler(SchedConfig::static_priority(2));
    s.wake_up(common::proc(1, 2));
    s.idle(CpuId(0));
    s.wake_up(common::proc(2, 2));
    s.idle(CpuId(1));
    assert!(s.idle_cpus().is_empty());

    s.wake_up(common::proc(3, 5));
    let forced = s.harness().take_forced();
    assert_eq!(forced, vec![CpuId(0)]);

    s.preempt(forced[0]);
    assert_eq!(s.running(CpuId(0)).unwrap().pid(), Pid(3));
    assert_eq!(s.running(CpuId(1)).unwrap().pid(), Pid(2));
    assert_eq!(s.ready_pids(), vec![Pid(1)]);
    assert!(s.harness().forced().is_empty());
}

/// Wake-ups that arrive before an earlier forced preemption is delivered
/// must not pick the same CPU again.
#[test]
fn test_wakeups_before_delivery_kick_distinct_cpus() {
    common::setup_test();
    let s = common::scheduler(SchedConfig::static_priority(2));
    s.wake_up(common::proc(1, 1));
    s.idle(CpuId(0));
    s.wake_up(common::proc(2, 1));
    s.idle(CpuId(1));

    s.wake_up(common::proc(3, 9));
    s.wake_up(common::proc(4, 9));
    assert_eq!(s.harness().forced(), vec![CpuId(0), CpuId(1)]);
    assert!(s.kick_pending(CpuId(0)));
    assert!(s.kick_pending(CpuId(1)));

    // Every CPU already has a preemption in flight.
    s.wake_up(common::proc(5, 9));
    assert_eq!(s.harness().forced().len(), 2);

    for cpu in s.harness().take_forced() {
        s.preempt(cpu);
        assert!(!s.kick_pending(cpu));
    }
    assert_eq!(s.running(CpuId(0)).unwrap().pid(), Pid(3));
    assert_eq!(s.running(CpuId(1)).unwrap().pid(), Pid(4));
    assert_eq!(s.ready_pids(), vec![Pid(5), Pid(1), Pid(2)]);
}

/// A wake-up equal to the lowest running priority waits; a strictly higher
/// one preempts and is queued ahead of it.
#[test]
fn test_wakeup_needs_strictly_higher_priority() {
    common::setup_test();
    let s = common::scheduler(SchedConfig::static_priority(2));
    s.wake_up(common::proc(1, 2));
    s.idle(CpuId(0));
    s.wake_up(common::proc(2, 3));
    s.idle(CpuId(1));

    s.wake_up(common::proc(3, 2));
    assert!(s.harness().forced().is_empty());
    assert!(!s.kick_pending(CpuId(0)));

    s.wake_up(common::proc(4, 5));
    assert_eq!(s.harness().forced(), vec![CpuId(0)]);
    assert_eq!(s.ready_pids(), vec![Pid(4), Pid(3)]);
}

#[test]
fn test_wakeup_picks_lowest_priority_victim() {
    common::setup_test();
    let s = common::scheduler(SchedConfig::static_priority(3));
    for (cpu, (pid, prio)) in [(1, 4), (2, 1), (3, 6)].into_iter().enumerate() {
        s.wake_up(common::proc(pid, prio));
        s.idle(CpuId(cpu as u32));
    }
    s.wake_up(common::proc(4, 5));
    assert_eq!(s.harness().forced(), vec![CpuId(1)]);
}

#[test]
fn test_engine_wakeup_preemption() {
    common::setup_test();
    let workload = Workload::builder()
        .add_process("low0", 2, 0, vec![Burst::Cpu(50)])
        .add_process("low1", 2, 0, vec![Burst::Cpu(40)])
        .add_process("urgent", 5, 10, vec![Burst::Cpu(5)])
        .build();
    let trace = Simulator::new(SchedConfig::static_priority(2))
        .run(&workload)
        .unwrap();
    trace.dump();

    assert_eq!(forced_preempts(&trace), vec![(10, CpuId(0))]);
    assert!(trace.events().iter().any(|e| e.time == 10
        && e.cpu == Some(CpuId(0))
        && matches!(e.kind, TraceKind::ProcessScheduled { pid: Pid(3), slice: None })));
    assert_eq!(trace.completion_time(Pid(3)), Some(15));
    assert_eq!(trace.completion_time(Pid(2)), Some(40));
    assert_eq!(trace.completion_time(Pid(1)), Some(55));
    assert_eq!(trace.stats().ready_time, 5);
    common::assert_all_completed(&workload, &trace);
}

#[test]
fn test_equal_priority_does_not_preempt() {
    common::setup_test();
    let workload = Workload::builder()
        .add_process("first", 2, 0, vec![Burst::Cpu(20)])
        .add_process("second", 2, 5, vec![Burst::Cpu(5)])
        .build();
    let trace = Simulator::new(SchedConfig::static_priority(1))
        .run(&workload)
        .unwrap();

    assert!(forced_preempts(&trace).is_empty());
    assert_eq!(trace.completion_time(Pid(1)), Some(20));
    assert_eq!(trace.completion_time(Pid(2)), Some(25));
}

#[test]
fn test_idle_cpu_takes_wakeup_without_preemption() {
    common::setup_test();
    let workload = Workload::builder()
        .add_process("low", 1, 0, vec![Burst::Cpu(20)])
        .add_process("high", 9, 5, vec![Burst::Cpu(5)])
        .build();
    let trace = Simulator::new(SchedConfig::static_priority(2))
        .run(&workload)
        .unwrap();

    assert!(forced_preempts(&trace).is_empty());
    assert_eq!(trace.completion_time(Pid(1)), Some(20));
    assert_eq!(trace.completion_time(Pid(2)), Some(10));
}

#[test]
fn test_preempted_process_resumes_remaining_burst() {
    common::setup_test();
    let workload = Workload::builder()
        .add_process("low", 1, 0, vec![Burst::Cpu(20)])
        .add_process("high", 9, 5, vec![Burst::Cpu(3)])
        .build();
    let trace = Simulator::new(SchedConfig::static_priority(1))
        .run(&workload)
        .unwrap();

    assert_eq!(forced_preempts(&trace), vec![(5, CpuId(0))]);
    assert_eq!(trace.completion_time(Pid(2)), Some(8));
    assert_eq!(trace.completion_time(Pid(1)), Some(23));
    assert_eq!(trace.total_runtime(Pid(1)), 20);
    assert_eq!(trace.schedule_count(Pid(1)), 2);
}
