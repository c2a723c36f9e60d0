//! Executor seam between the task engine and concrete task logic.

use async_trait::async_trait;
use pl_core::task::{PasteTask, TaskOutcome, TaskType};

/// One registered task implementation.
///
/// Executors must be idempotent: the engine reruns tasks after crashes
/// and two tasks may target the same resource back to back, so "already
/// done" must map to [`TaskOutcome::Success`] without side effects.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    fn task_type(&self) -> TaskType;

    /// Key the engine serializes executions on. Two tasks with the same
    /// type and resource key never run concurrently.
    fn resource_key(&self, task: &PasteTask) -> String;

    async fn execute(&self, task: &PasteTask) -> TaskOutcome;
}
