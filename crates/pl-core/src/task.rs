//! Persisted task records and their state machine.
//!
//! A `PasteTask` is a durable, retryable unit of work (icon fetch, file
//! pull, rendering). The engine in `pl-engine` drives it; this module
//! only defines the record, the state transitions and the outcome an
//! executor reports.

use crate::error::ErrorCode;
use crate::ids::{PasteId, PeerId, TaskId};
use serde::{Deserialize, Serialize};

/// Task kinds with a registered executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    PullIcon,
    PullFile,
    Render,
}

impl TaskType {
    /// Engine-observed retry ceiling: a retryable failure with this many
    /// history entries already recorded becomes terminal.
    pub fn retry_ceiling(self) -> usize {
        match self {
            TaskType::PullIcon | TaskType::PullFile | TaskType::Render => 2,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskType::PullIcon => "pull_icon",
            TaskType::PullFile => "pull_file",
            TaskType::Render => "render",
        };
        write!(f, "{name}")
    }
}

/// Task instance state machine
///
/// ```text
/// Pending ──→ Executing ──→ Success
///    ↑             │
///    │ (retryable, └─→ Failed (terminal)
///    │  under ceiling)
///    └─────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Executing,
    Success,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Transition into execution; only a pending task may start.
    pub fn begin(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Executing),
            _ => None,
        }
    }

    /// Transition after an attempt. `retry` sends the task back to the
    /// queue instead of terminating it.
    pub fn finish(self, success: bool, retry: bool) -> Self {
        match self {
            Self::Executing if success => Self::Success,
            Self::Executing if retry => Self::Pending,
            Self::Executing => Self::Failed,
            _ => self,
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

/// One prior failed attempt, appended to the extra-info blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHistory {
    pub started_at_ms: i64,
    pub ended_at_ms: i64,
    pub code: ErrorCode,
    pub message: String,
}

/// Execution history plus per-type extras, persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskExtraInfo {
    #[serde(default)]
    pub execution_histories: Vec<ExecutionHistory>,
    /// Favicon source key for pull-icon tasks, recorded at enqueue time
    /// so the resource key is derivable without a storage read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Durable task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteTask {
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub paste_id: PasteId,
    /// Device that owns the referenced paste entry.
    pub peer_id: PeerId,
    pub created_at_ms: i64,
    pub modified_at_ms: i64,
    pub state: TaskState,
    pub extra: TaskExtraInfo,
}

impl PasteTask {
    pub fn new(task_type: TaskType, peer_id: PeerId, paste_id: PasteId) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            task_id: TaskId::new(),
            task_type,
            paste_id,
            peer_id,
            created_at_ms: now,
            modified_at_ms: now,
            state: TaskState::Pending,
            extra: TaskExtraInfo::default(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.extra.source = Some(source.into());
        self
    }

    pub fn touch(&mut self) {
        self.modified_at_ms = chrono::Utc::now().timestamp_millis();
    }

    pub fn record_failure(&mut self, started_at_ms: i64, code: ErrorCode, message: String) {
        self.extra.execution_histories.push(ExecutionHistory {
            started_at_ms,
            ended_at_ms: chrono::Utc::now().timestamp_millis(),
            code,
            message,
        });
        self.touch();
    }

    pub fn attempts(&self) -> usize {
        self.extra.execution_histories.len()
    }
}

/// What an executor reports back to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Fail {
        code: ErrorCode,
        message: String,
        retryable: bool,
    },
}

impl TaskOutcome {
    /// Failure with retryability taken from the code's taxonomy.
    pub fn fail(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Fail {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    pub fn fail_terminal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Fail {
            code,
            message: message.into(),
            retryable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_only_from_pending() {
        assert_eq!(TaskState::Pending.begin(), Some(TaskState::Executing));
        assert_eq!(TaskState::Executing.begin(), None);
        assert_eq!(TaskState::Success.begin(), None);
        assert_eq!(TaskState::Failed.begin(), None);
    }

    #[test]
    fn test_finish_transitions() {
        assert_eq!(
            TaskState::Executing.finish(true, false),
            TaskState::Success
        );
        assert_eq!(
            TaskState::Executing.finish(false, true),
            TaskState::Pending
        );
        assert_eq!(TaskState::Executing.finish(false, false), TaskState::Failed);
        // Terminal states never move.
        assert_eq!(TaskState::Success.finish(false, true), TaskState::Success);
    }

    #[test]
    fn test_history_appends() {
        let mut task = PasteTask::new(TaskType::PullIcon, PeerId::from("p"), PasteId(1));
        task.record_failure(task.created_at_ms, ErrorCode::SyncTimeout, "t/o".into());
        task.record_failure(task.created_at_ms, ErrorCode::SyncTimeout, "t/o".into());
        assert_eq!(task.attempts(), 2);
        assert!(task.attempts() >= task.task_type.retry_ceiling());
    }

    #[test]
    fn test_task_json_roundtrip() {
        let task = PasteTask::new(TaskType::PullFile, PeerId::from("p"), PasteId(9));
        let json = serde_json::to_string(&task).unwrap();
        let back: PasteTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }
}
