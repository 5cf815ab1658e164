//! Outbound interface from the scheduler core to the simulation harness.
//!
//! The harness owns simulated time and the mechanism that actually loads a
//! process onto a CPU. The core only ever asks it for three things.

use std::sync::Arc;

use crate::process::Process;
use crate::types::{CpuId, SimTime};

/// Services the scheduler core needs from whoever drives it.
///
/// The core never holds the ready lock while calling into the harness, so an
/// implementation may call back into the scheduler from any of these methods
/// (for example, to deliver a forced preemption synchronously).
pub trait Harness: Send + Sync {
    /// Load `proc` onto `cpu`, or run the idle routine if `None`.
    ///
    /// With `Some(slice)` the harness arms a timer that fires `preempt` on
    /// `cpu` after `slice` ticks; with `None` the process runs until it
    /// yields or terminates.
    fn context_switch(&self, cpu: CpuId, proc: Option<Arc<Process>>, slice: Option<SimTime>);

    /// Fire `preempt` on `cpu` right away, outside its timer cycle.
    fn force_preempt(&self, cpu: CpuId);

    /// Current simulated time.
    fn sim_time(&self) -> SimTime;
}
