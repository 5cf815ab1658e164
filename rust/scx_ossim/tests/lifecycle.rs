use std::sync::Arc;

use scx_ossim::*;

mod common;

/// A process is either queued or on exactly one CPU between wake-up and
/// termination, never both and never neither.
#[test]
fn test_exclusivity_through_lifecycle() {
    common::setup_test();
    let s = common::scheduler(SchedConfig::round_robin(2, 3));
    let p = common::proc(1, 0);
    let other = common::proc(2, 0);
    assert_eq!(p.state(), ProcessState::New);

    let held_once = |p: &Arc<Process>| {
        let on_cpu = (0..2).filter(|&c| {
            s.running(CpuId(c)).is_some_and(|r| Arc::ptr_eq(&r, p))
        });
        let queued = s.ready_pids().iter().filter(|&&pid| pid == p.pid()).count();
        on_cpu.count() + queued
    };

    s.wake_up(p.clone());
    assert!(p.is_queued());
    assert_eq!(held_once(&p), 1);

    s.idle(CpuId(1));
    assert_eq!(p.cpu(), Some(CpuId(1)));
    assert!(!p.is_queued());
    assert_eq!(held_once(&p), 1);

    s.wake_up(other.clone());
    s.preempt(CpuId(1));
    assert_eq!(p.cpu(), None);
    assert!(p.is_queued());
    assert_eq!(held_once(&p), 1);
    assert_eq!(held_once(&other), 1);

    s.idle(CpuId(0));
    assert_eq!(p.cpu(), Some(CpuId(0)));
    s.yield_cpu(CpuId(0));
    assert_eq!(p.state(), ProcessState::Waiting);
    assert_eq!(held_once(&p), 0);

    s.wake_up(p.clone());
    assert_eq!(held_once(&p), 1);
}

/// Terminate marks the process terminated once; it never comes back out of
/// the ready structure.
#[test]
fn test_termination_is_final() {
    common::setup_test();
    let s = common::scheduler(SchedConfig::round_robin(1, 2));
    let p = common::proc(1, 0);
    s.wake_up(p.clone());
    s.idle(CpuId(0));
    s.terminate(CpuId(0));
    assert_eq!(p.state(), ProcessState::Terminated);

    for pid in 2..6 {
        s.wake_up(common::proc(pid, 0));
    }
    for _ in 0..20 {
        s.preempt(CpuId(0));
        let running = s.running(CpuId(0)).unwrap();
        assert_ne!(running.pid(), Pid(1));
        assert!(!s.ready_pids().contains(&Pid(1)));
    }
    assert_eq!(p.state(), ProcessState::Terminated);
}

#[test]
#[should_panic(expected = "terminate on cpu=0 with no process assigned")]
fn test_double_terminate_panics() {
    common::setup_test();
    let s = common::scheduler(SchedConfig::fifo(1));
    s.wake_up(common::proc(1, 0));
    s.idle(CpuId(0));
    s.terminate(CpuId(0));
    s.terminate(CpuId(0));
}

#[test]
#[should_panic(expected = "in state Terminated")]
fn test_wake_after_terminate_panics() {
    common::setup_test();
    let s = common::scheduler(SchedConfig::fifo(1));
    let p = common::proc(1, 0);
    s.wake_up(p.clone());
    s.idle(CpuId(0));
    s.terminate(CpuId(0));
    s.wake_up(p);
}

#[test]
#[should_panic(expected = "still held by the scheduler")]
fn test_double_wake_panics() {
    common::setup_test();
    let s = common::scheduler(SchedConfig::fifo(1));
    let p = common::proc(1, 0);
    s.wake_up(p.clone());
    s.wake_up(p);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_unknown_cpu_panics() {
    common::setup_test();
    let s = common::scheduler(SchedConfig::fifo(2));
    s.idle(CpuId(2));
}

#[test]
fn test_invalid_configs_are_rejected() {
    common::setup_test();
    let cases = [
        (SchedConfig::fifo(0), ConfigError::NoCpus),
        (
            SchedConfig {
                timeslice: None,
                ..SchedConfig::round_robin(1, 1)
            },
            ConfigError::MissingTimeslice(Algorithm::RoundRobin),
        ),
        (SchedConfig::round_robin(1, 0), ConfigError::ZeroTimeslice),
        (
            SchedConfig {
                max_wait: None,
                ..SchedConfig::multilevel(1, 2, 3)
            },
            ConfigError::MissingMaxWait,
        ),
        (
            SchedConfig {
                nr_levels: 1,
                ..SchedConfig::multilevel(1, 2, 3)
            },
            ConfigError::TooFewLevels(1),
        ),
    ];
    for (config, expected) in cases {
        match CpuScheduler::new(config, common::Recorder::default()) {
            Err(e) => assert_eq!(e, expected),
            Ok(_) => panic!("expected {expected:?}"),
        }
    }
}
