//! Async collaborator traits.
//!
//! The core never performs I/O itself. These traits describe what it needs
//! from the outside: somewhere to append and list action logs, somewhere to
//! cache derived prompt states, and somewhere to keep attachment bytes.

use ::async_trait::async_trait;
use orbit_core::{
    ActionLog, ActionLogId, AttachmentId, AttachmentReference, AttachmentType, OrbitResult,
    PromptState, PromptTaskId,
};
use serde::{Deserialize, Serialize};

/// Append-only store of action logs, indexed by task.
#[async_trait]
pub trait ActionLogStore: Send + Sync {
    /// Append a log under its ID. Returns `false` if the ID was already
    /// present, in which case nothing changes.
    async fn append(&self, id: &ActionLogId, log: &ActionLog) -> OrbitResult<bool>;

    /// Whether a log with this ID has been appended.
    async fn contains(&self, id: &ActionLogId) -> OrbitResult<bool>;

    /// Get a log by ID.
    async fn get(&self, id: &ActionLogId) -> OrbitResult<Option<ActionLog>>;

    /// All logs recorded for a task, in append order.
    async fn logs_for_task(&self, task_id: &PromptTaskId) -> OrbitResult<Vec<ActionLog>>;
}

/// A cached prompt state, or the reason one couldn't be derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CachedPromptState {
    Available(PromptState),
    /// Reconciliation failed; the task must not be scheduled until rebuilt.
    Unavailable { reason: String },
}

impl CachedPromptState {
    pub fn available(&self) -> Option<&PromptState> {
        match self {
            CachedPromptState::Available(state) => Some(state),
            CachedPromptState::Unavailable { .. } => None,
        }
    }
}

/// Cache of derived prompt states, keyed by task.
#[async_trait]
pub trait PromptStateStore: Send + Sync {
    async fn get(&self, task_id: &PromptTaskId) -> OrbitResult<Option<CachedPromptState>>;

    /// Replace the cached entry for a task.
    async fn put(&self, task_id: &PromptTaskId, entry: CachedPromptState) -> OrbitResult<()>;

    /// Every task with an available state.
    async fn available_states(&self) -> OrbitResult<Vec<(PromptTaskId, PromptState)>>;
}

/// Content-addressed attachment bytes.
#[async_trait]
pub trait AttachmentResolver: Send + Sync {
    /// Store bytes and return the reference a prompt field links to.
    async fn store(
        &self,
        bytes: Vec<u8>,
        attachment_type: AttachmentType,
    ) -> OrbitResult<AttachmentReference>;

    /// Fetch the bytes behind an attachment ID.
    async fn fetch(&self, id: &AttachmentId) -> OrbitResult<Option<Vec<u8>>>;
}
