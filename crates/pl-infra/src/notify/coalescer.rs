//! Single-consumer notification pipe with equal-content debounce.
//!
//! Producers submit without ever blocking: a full buffer silently drops
//! the oldest queued message. The consumer collapses content-equal
//! messages that arrive within the debounce window, so a burst of tasks
//! failing for the same reason raises one notification, not a storm.

use pl_core::notify::NotificationMessage;
use pl_core::ports::NotificationSinkPort;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::trace;

pub const DEFAULT_CAPACITY: usize = 64;

struct PipeInner {
    queue: Mutex<VecDeque<NotificationMessage>>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct NotificationPipe {
    inner: Arc<PipeInner>,
}

impl NotificationPipe {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PipeInner {
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                capacity: capacity.max(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Enqueue a message; never blocks the caller. Overflow drops the
    /// oldest queued message.
    pub fn submit(&self, message: NotificationMessage) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        {
            let mut queue = self.inner.queue.lock().expect("notification queue lock");
            if queue.len() >= self.inner.capacity {
                queue.pop_front();
                trace!("notification buffer full; dropped oldest");
            }
            queue.push_back(message);
        }
        self.inner.notify.notify_one();
    }

    /// Stop the consumer after the queue drains.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    fn pop(&self) -> Option<NotificationMessage> {
        self.inner
            .queue
            .lock()
            .expect("notification queue lock")
            .pop_front()
    }

    /// Spawn the single consumer delivering to `sink` with the given
    /// debounce window.
    pub fn spawn_consumer(
        &self,
        sink: Arc<dyn NotificationSinkPort>,
        debounce: Duration,
    ) -> JoinHandle<()> {
        let pipe = self.clone();
        tokio::spawn(async move {
            let mut last: Option<(NotificationMessage, Instant)> = None;
            loop {
                let message = loop {
                    if let Some(message) = pipe.pop() {
                        break message;
                    }
                    if pipe.inner.closed.load(Ordering::Acquire) {
                        return;
                    }
                    pipe.inner.notify.notified().await;
                };

                // The window is anchored at the last delivery, not the
                // last submission: a sustained stream of equal messages
                // re-emits once per window rather than staying silent
                // until the stream pauses.
                let now = Instant::now();
                let duplicate = matches!(
                    &last,
                    Some((prev, at))
                        if prev.equal_content(&message) && now.duration_since(*at) < debounce
                );
                if duplicate {
                    trace!("coalesced duplicate notification");
                    continue;
                }
                sink.deliver(message.clone());
                last = Some((message, now));
            }
        })
    }
}

impl Default for NotificationPipe {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
