//! Persistent task engine.
//!
//! Tasks are saved before they are queued, so a crash between enqueue
//! and completion is recovered by [`TaskEngine::resume`]. Executions of
//! the same (task type, resource key) pair are serialized through a
//! per-key async lock; the lock entry is evicted once no execution or
//! waiter holds it, so the map does not grow with history.
//!
//! Retry policy: a retryable failure sends the task back to the queue
//! with linear backoff until the type's retry ceiling is reached; the
//! attempt after the ceiling is terminal. Terminal failures keep their
//! record (with full execution history) and raise one coalesced
//! notification. Successes stay off the notification pipe and surface
//! through [`TaskEvent::Succeeded`] instead: the pipe carries what the
//! user must see, the event channel carries everything. Abandoned
//! tasks, whose paste entry was deleted before execution, terminate
//! silently.

use crate::executor::TaskExecutor;
use anyhow::Result;
use futures::FutureExt;
use pl_core::config::EngineConfig;
use pl_core::error::ErrorCode;
use pl_core::ids::TaskId;
use pl_core::notify::{NotificationMessage, Severity};
use pl_core::ports::{EntryStorePort, TaskStorePort};
use pl_core::task::{PasteTask, TaskOutcome, TaskType};
use pl_infra::NotificationPipe;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Observable lifecycle events, mainly for the UI layer and tests.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    Started { task_id: TaskId, task_type: TaskType },
    Succeeded { task_id: TaskId },
    Retrying { task_id: TaskId, attempts: usize },
    Failed { task_id: TaskId, code: ErrorCode },
    Abandoned { task_id: TaskId },
}

type LockKey = (TaskType, String);

struct EngineInner {
    config: EngineConfig,
    store: Arc<dyn TaskStorePort>,
    entries: Arc<dyn EntryStorePort>,
    notifications: NotificationPipe,
    executors: RwLock<HashMap<TaskType, Arc<dyn TaskExecutor>>>,
    locks: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
    queue_tx: mpsc::UnboundedSender<PasteTask>,
    semaphore: Arc<Semaphore>,
    events: broadcast::Sender<TaskEvent>,
}

pub struct TaskEngine {
    inner: Arc<EngineInner>,
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<PasteTask>>>,
}

impl TaskEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn TaskStorePort>,
        entries: Arc<dyn EntryStorePort>,
        notifications: NotificationPipe,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(256);
        let semaphore = Arc::new(Semaphore::new(config.worker_count.max(1)));
        Self {
            inner: Arc::new(EngineInner {
                config,
                store,
                entries,
                notifications,
                executors: RwLock::new(HashMap::new()),
                locks: Mutex::new(HashMap::new()),
                queue_tx,
                semaphore,
                events,
            }),
            queue_rx: Mutex::new(Some(queue_rx)),
        }
    }

    /// Register the executor handling one task type. Later registrations
    /// for the same type replace earlier ones.
    pub fn register(&self, executor: Arc<dyn TaskExecutor>) {
        self.inner
            .executors
            .write()
            .expect("executor registry lock")
            .insert(executor.task_type(), executor);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    /// Persist then queue a new task.
    pub async fn submit(&self, task: PasteTask) -> Result<TaskId> {
        let task_id = task.task_id.clone();
        self.inner.store.save(&task).await?;
        if self.inner.queue_tx.send(task).is_err() {
            warn!(%task_id, "engine stopped; task saved but not queued");
        }
        Ok(task_id)
    }

    /// Queue every persisted task that is still due. Called once at
    /// startup after [`TaskEngine::start`].
    pub async fn resume(&self) -> Result<usize> {
        let due = self.inner.store.load_due().await?;
        let count = due.len();
        for task in due {
            if self.inner.queue_tx.send(task).is_err() {
                break;
            }
        }
        debug!(count, "resumed persisted tasks");
        Ok(count)
    }

    /// Spawn the dispatcher. Runs until the returned handle is aborted.
    pub fn start(&self) -> JoinHandle<()> {
        let mut queue_rx = self
            .queue_rx
            .lock()
            .expect("queue receiver lock")
            .take()
            .expect("task engine already started");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            while let Some(task) = queue_rx.recv().await {
                let Ok(permit) = Arc::clone(&inner.semaphore).acquire_owned().await else {
                    break;
                };
                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    run_task(inner, task).await;
                    drop(permit);
                });
            }
        })
    }
}

fn emit(inner: &EngineInner, event: TaskEvent) {
    let _ = inner.events.send(event);
}

/// Drop the lock entry once nothing but the map itself references it.
fn evict_lock(inner: &EngineInner, key: &LockKey) {
    let mut locks = inner.locks.lock().expect("lock map poisoned");
    if let Some(existing) = locks.get(key) {
        if Arc::strong_count(existing) == 1 {
            locks.remove(key);
        }
    }
}

async fn run_task(inner: Arc<EngineInner>, mut task: PasteTask) {
    let executor = {
        let executors = inner.executors.read().expect("executor registry lock");
        executors.get(&task.task_type).cloned()
    };
    let Some(executor) = executor else {
        error!(task_type = %task.task_type, "no executor registered; failing task");
        terminate(&inner, &mut task, ErrorCode::UnknownError, "no executor registered").await;
        return;
    };

    // Entry deleted before we got to run: terminate without noise.
    match inner.entries.get_entry(&task.peer_id, task.paste_id).await {
        Ok(Some(entry)) if entry.deleted => {
            terminate(&inner, &mut task, ErrorCode::TaskAbandoned, "paste entry deleted").await;
            emit(&inner, TaskEvent::Abandoned { task_id: task.task_id });
            return;
        }
        Ok(_) => {}
        Err(err) => {
            warn!(task_id = %task.task_id, %err, "entry lookup failed; executing anyway");
        }
    }

    let key: LockKey = (task.task_type, executor.resource_key(&task));
    let lock = {
        let mut locks = inner.locks.lock().expect("lock map poisoned");
        Arc::clone(
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    };
    let guard = lock.lock().await;

    let Some(executing) = task.state.begin() else {
        warn!(task_id = %task.task_id, state = ?task.state, "task not pending; skipping");
        drop(guard);
        drop(lock);
        evict_lock(&inner, &key);
        return;
    };
    task.state = executing;
    task.touch();
    if let Err(err) = inner.store.update(&task).await {
        warn!(task_id = %task.task_id, %err, "failed to persist executing state");
    }
    emit(
        &inner,
        TaskEvent::Started {
            task_id: task.task_id.clone(),
            task_type: task.task_type,
        },
    );

    let started_at_ms = chrono::Utc::now().timestamp_millis();
    let outcome = match AssertUnwindSafe(executor.execute(&task)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(task_id = %task.task_id, "executor panicked");
            TaskOutcome::fail_terminal(ErrorCode::UnknownError, "executor panicked")
        }
    };

    let requeue = apply_outcome(&inner, &mut task, started_at_ms, outcome).await;

    drop(guard);
    drop(lock);
    evict_lock(&inner, &key);

    if let Some(delay) = requeue {
        let inner = Arc::clone(&inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inner.queue_tx.send(task);
        });
    }
}

/// Record the outcome; returns the backoff delay when the task goes
/// back to the queue.
async fn apply_outcome(
    inner: &EngineInner,
    task: &mut PasteTask,
    started_at_ms: i64,
    outcome: TaskOutcome,
) -> Option<Duration> {
    match outcome {
        // Success is reported on the event channel only; the
        // notification pipe is reserved for terminal failures.
        TaskOutcome::Success => {
            task.state = task.state.finish(true, false);
            if let Err(err) = inner.store.remove(&task.task_id).await {
                warn!(task_id = %task.task_id, %err, "failed to remove finished task");
            }
            emit(
                inner,
                TaskEvent::Succeeded {
                    task_id: task.task_id.clone(),
                },
            );
            None
        }
        TaskOutcome::Fail {
            code,
            message,
            retryable,
        } => {
            task.record_failure(started_at_ms, code, message.clone());
            let retry = retryable && task.attempts() <= task.task_type.retry_ceiling();
            task.state = task.state.finish(false, retry);
            if let Err(err) = inner.store.update(&task).await {
                warn!(task_id = %task.task_id, %err, "failed to persist task failure");
            }

            if retry {
                let attempts = task.attempts();
                debug!(task_id = %task.task_id, attempts, %code, "retrying task");
                emit(
                    inner,
                    TaskEvent::Retrying {
                        task_id: task.task_id.clone(),
                        attempts,
                    },
                );
                Some(Duration::from_millis(
                    inner.config.retry_backoff_ms * attempts as u64,
                ))
            } else {
                warn!(task_id = %task.task_id, %code, %message, "task failed terminally");
                emit(
                    inner,
                    TaskEvent::Failed {
                        task_id: task.task_id.clone(),
                        code,
                    },
                );
                inner.notifications.submit(NotificationMessage::new(
                    Some(format!("{} failed", task.task_type)),
                    message,
                    Severity::Error,
                ));
                None
            }
        }
    }
}

/// Terminal failure outside the normal execute path (no executor, or
/// abandonment); keeps the record, raises no notification.
async fn terminate(inner: &EngineInner, task: &mut PasteTask, code: ErrorCode, message: &str) {
    let now = chrono::Utc::now().timestamp_millis();
    task.record_failure(now, code, message.to_string());
    if let Some(executing) = task.state.begin() {
        task.state = executing;
    }
    task.state = task.state.finish(false, false);
    if let Err(err) = inner.store.update(task).await {
        warn!(task_id = %task.task_id, %err, "failed to persist terminated task");
    }
    if code != ErrorCode::TaskAbandoned {
        emit(
            inner,
            TaskEvent::Failed {
                task_id: task.task_id.clone(),
                code,
            },
        );
    }
}
