//! Counters exported through the `metrics` facade.

use crate::task::TaskState;

/// Items produced by a stage
pub const STAGE_ITEMS: &str = "pullstage_stage_items_total";
/// Transform failures raised by a stage
pub const STAGE_FAILURES: &str = "pullstage_stage_failures_total";
/// Tasks that reached a terminal state
pub const TASKS_FINISHED: &str = "pullstage_tasks_finished_total";

pub(crate) fn record_stage_item(stage: &str) {
    ::metrics::counter!(STAGE_ITEMS, "stage" => stage.to_string()).increment(1);
}

pub(crate) fn record_stage_failure(stage: &str) {
    ::metrics::counter!(STAGE_FAILURES, "stage" => stage.to_string()).increment(1);
}

pub(crate) fn record_task_finished(state: TaskState) {
    ::metrics::counter!(TASKS_FINISHED, "state" => state.to_string()).increment(1);
}
