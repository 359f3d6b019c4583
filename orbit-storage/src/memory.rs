//! In-memory collaborator implementations.
//!
//! Each store keeps its data in a `HashMap` behind an `RwLock` and is cheap to
//! clone; clones share the same underlying maps. Suitable for tests and for
//! embedding the core in a single process.

use crate::traits::{ActionLogStore, AttachmentResolver, CachedPromptState, PromptStateStore};
use orbit_core::{
    id_for_attachment, ActionLog, ActionLogId, AttachmentId, AttachmentReference, AttachmentType,
    OrbitError, OrbitResult, PromptState, PromptTaskId, StorageError,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

fn poisoned<T>(_: T) -> OrbitError {
    OrbitError::Storage(StorageError::LockPoisoned)
}

// ============================================================================
// ACTION LOGS
// ============================================================================

/// In-memory [`ActionLogStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryActionLogStore {
    logs: Arc<RwLock<HashMap<ActionLogId, ActionLog>>>,
    by_task: Arc<RwLock<HashMap<PromptTaskId, Vec<ActionLogId>>>>,
}

impl InMemoryActionLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct logs stored.
    pub fn len(&self) -> OrbitResult<usize> {
        Ok(self.logs.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> OrbitResult<bool> {
        Ok(self.logs.read().map_err(poisoned)?.is_empty())
    }
}

#[async_trait::async_trait]
impl ActionLogStore for InMemoryActionLogStore {
    async fn append(&self, id: &ActionLogId, log: &ActionLog) -> OrbitResult<bool> {
        let mut logs = self.logs.write().map_err(poisoned)?;
        if logs.contains_key(id) {
            return Ok(false);
        }
        let mut by_task = self.by_task.write().map_err(poisoned)?;
        logs.insert(id.clone(), log.clone());
        by_task
            .entry(log.task_id().clone())
            .or_default()
            .push(id.clone());
        Ok(true)
    }

    async fn contains(&self, id: &ActionLogId) -> OrbitResult<bool> {
        Ok(self.logs.read().map_err(poisoned)?.contains_key(id))
    }

    async fn get(&self, id: &ActionLogId) -> OrbitResult<Option<ActionLog>> {
        Ok(self.logs.read().map_err(poisoned)?.get(id).cloned())
    }

    async fn logs_for_task(&self, task_id: &PromptTaskId) -> OrbitResult<Vec<ActionLog>> {
        let logs = self.logs.read().map_err(poisoned)?;
        let by_task = self.by_task.read().map_err(poisoned)?;
        Ok(by_task
            .get(task_id)
            .map(|ids| ids.iter().filter_map(|id| logs.get(id).cloned()).collect())
            .unwrap_or_default())
    }
}

// ============================================================================
// PROMPT STATES
// ============================================================================

/// In-memory [`PromptStateStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryPromptStateStore {
    states: Arc<RwLock<HashMap<PromptTaskId, CachedPromptState>>>,
}

impl InMemoryPromptStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> OrbitResult<usize> {
        Ok(self.states.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> OrbitResult<bool> {
        Ok(self.states.read().map_err(poisoned)?.is_empty())
    }
}

#[async_trait::async_trait]
impl PromptStateStore for InMemoryPromptStateStore {
    async fn get(&self, task_id: &PromptTaskId) -> OrbitResult<Option<CachedPromptState>> {
        Ok(self.states.read().map_err(poisoned)?.get(task_id).cloned())
    }

    async fn put(&self, task_id: &PromptTaskId, entry: CachedPromptState) -> OrbitResult<()> {
        self.states
            .write()
            .map_err(poisoned)?
            .insert(task_id.clone(), entry);
        Ok(())
    }

    async fn available_states(&self) -> OrbitResult<Vec<(PromptTaskId, PromptState)>> {
        let states = self.states.read().map_err(poisoned)?;
        Ok(states
            .iter()
            .filter_map(|(task_id, entry)| {
                entry
                    .available()
                    .map(|state| (task_id.clone(), state.clone()))
            })
            .collect())
    }
}

// ============================================================================
// ATTACHMENTS
// ============================================================================

/// In-memory [`AttachmentResolver`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryAttachmentStore {
    blobs: Arc<RwLock<HashMap<AttachmentId, Vec<u8>>>>,
}

impl InMemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AttachmentResolver for InMemoryAttachmentStore {
    async fn store(
        &self,
        bytes: Vec<u8>,
        attachment_type: AttachmentType,
    ) -> OrbitResult<AttachmentReference> {
        let id = id_for_attachment(&bytes)?;
        let byte_length = bytes.len() as u64;
        self.blobs
            .write()
            .map_err(poisoned)?
            .entry(id.clone())
            .or_insert(bytes);
        Ok(AttachmentReference {
            id,
            attachment_type,
            byte_length,
        })
    }

    async fn fetch(&self, id: &AttachmentId) -> OrbitResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().map_err(poisoned)?.get(id).cloned())
    }
}
