//! In-memory test doubles shared across integration tests.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use pl_core::ids::{PasteId, PeerId, TaskId};
use pl_core::notify::NotificationMessage;
use pl_core::paste::PasteEntry;
use pl_core::ports::{EntryStorePort, NotificationSinkPort, TaskStorePort};
use pl_core::task::{PasteTask, TaskState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct MemoryEntryStore {
    entries: Mutex<HashMap<(PeerId, PasteId), PasteEntry>>,
}

impl MemoryEntryStore {
    pub fn insert(&self, entry: PasteEntry) {
        self.entries
            .lock()
            .unwrap()
            .insert((entry.peer_id.clone(), entry.paste_id), entry);
    }
}

#[async_trait]
impl EntryStorePort for MemoryEntryStore {
    async fn get_entry(&self, peer_id: &PeerId, paste_id: PasteId) -> Result<Option<PasteEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(peer_id.clone(), paste_id))
            .cloned())
    }

    async fn mark_deleted(&self, paste_id: PasteId) -> Result<()> {
        for entry in self.entries.lock().unwrap().values_mut() {
            if entry.paste_id == paste_id {
                entry.deleted = true;
            }
        }
        Ok(())
    }

    async fn entries_needing_export(
        &self,
        after: PasteId,
        limit: usize,
    ) -> Result<Vec<PasteEntry>> {
        let mut out: Vec<PasteEntry> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.paste_id > after && !e.deleted)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.paste_id);
        out.truncate(limit);
        Ok(out)
    }
}

#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<TaskId, PasteTask>>,
}

impl MemoryTaskStore {
    pub fn get(&self, task_id: &TaskId) -> Option<PasteTask> {
        self.tasks.lock().unwrap().get(task_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

#[async_trait]
impl TaskStorePort for MemoryTaskStore {
    async fn save(&self, task: &PasteTask) -> Result<()> {
        self.tasks
            .lock()
            .unwrap()
            .insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &PasteTask) -> Result<()> {
        self.save(task).await
    }

    async fn load_due(&self) -> Result<Vec<PasteTask>> {
        let mut due: Vec<PasteTask> = self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| matches!(t.state, TaskState::Pending | TaskState::Executing))
            .cloned()
            .map(|mut t| {
                t.state = TaskState::Pending;
                t
            })
            .collect();
        due.sort_by_key(|t| t.created_at_ms);
        Ok(due)
    }

    async fn remove(&self, task_id: &TaskId) -> Result<()> {
        self.tasks.lock().unwrap().remove(task_id);
        Ok(())
    }
}

pub struct RecordingSink {
    pub delivered: Mutex<Vec<NotificationMessage>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            delivered: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

impl NotificationSinkPort for RecordingSink {
    fn deliver(&self, message: NotificationMessage) {
        self.delivered.lock().unwrap().push(message);
    }
}

pub fn entry_of(peer_id: &PeerId, paste_id: i64) -> PasteEntry {
    PasteEntry {
        peer_id: peer_id.clone(),
        paste_id: PasteId(paste_id),
        created_at_ms: chrono::Utc::now().timestamp_millis(),
        source: None,
        files: vec![],
        deleted: false,
    }
}
