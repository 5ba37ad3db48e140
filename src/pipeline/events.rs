use crate::pool::TaskId;
use super::state::{DirectorStats, ProcessState, ProcessingMode};

/// Messages sent from Directors to a progress display.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// A Director left NEW
    ProcessStarted {
        stylesheet: String,
        mode: ProcessingMode,
    },
    /// A Director entered a new state
    StateChanged {
        stylesheet: String,
        from: ProcessState,
        to: ProcessState,
        display_name: String,
    },
    /// A task completed with a failure
    TaskFailed {
        stylesheet: String,
        task_id: TaskId,
        state: ProcessState,
        error: String,
    },
    /// A follow-up XSS check was scheduled
    FollowUpScheduled {
        stylesheet: String,
        open_tasks: usize,
    },
    /// A Director reached DONE
    ProcessCompleted {
        stylesheet: String,
        aborted: bool,
        stats: DirectorStats,
    },
}
