//! Counters emitted through the `metrics` facade.
//!
//! Install any `metrics` recorder to collect them; without one they are
//! no-ops.

use metrics::counter;

/// Items pushed onto any queue
pub const ITEMS_PUSHED: &str = "queueweld_items_pushed_total";
/// Items removed from any queue
pub const ITEMS_SHIFTED: &str = "queueweld_items_shifted_total";
/// Parallel visitor invocations that failed or panicked
pub const TASKS_FAILED: &str = "queueweld_tasks_failed_total";

pub(crate) fn record_pushed(count: usize) {
    counter!(ITEMS_PUSHED).increment(count as u64);
}

pub(crate) fn record_shifted() {
    counter!(ITEMS_SHIFTED).increment(1);
}

pub(crate) fn record_task_failed() {
    counter!(TASKS_FAILED).increment(1);
}
