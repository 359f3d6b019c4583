//! Error types for Orbit operations

use crate::identity::{ActionLogId, PromptTaskId};
use thiserror::Error;

/// Identifier codec errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Identifier {id:?} is not a base58btc multibase string")]
    InvalidMultibase { id: String },

    #[error("Identifier {id:?} does not decode to a CID: {reason}")]
    InvalidCid { id: String, reason: String },

    #[error("Canonical encoding of {field} failed: {reason}")]
    CanonicalEncoding { field: String, reason: String },
}

/// Errors decoding a prompt task ID.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskIdError {
    #[error("Prompt task ID {task_id} must have at least 2 components")]
    TooFewComponents { task_id: String },

    #[error("Prompt task ID {task_id} has too many components")]
    TooManyComponents { task_id: String },

    #[error("Unknown prompt type {prompt_type:?} in task ID {task_id}")]
    UnknownPromptType { task_id: String, prompt_type: String },

    #[error("Invalid cloze index {index:?} in task ID {task_id}")]
    InvalidClozeIndex { task_id: String, index: String },

    #[error("Invalid prompt ID in task ID {task_id}: {source}")]
    InvalidPromptId {
        task_id: String,
        #[source]
        source: CodecError,
    },
}

/// Spaced-repetition schedule errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Interval {interval_millis}ms is smaller than the schedule's first level")]
    IntervalBelowSchedule { interval_millis: i64 },

    #[error("Schedule needs at least 2 levels, got {levels}")]
    TooFewLevels { levels: usize },

    #[error("Schedule intervals must be non-decreasing: level {level} ({interval_millis}ms) is below its predecessor")]
    DecreasingInterval { level: usize, interval_millis: i64 },

    #[error("Schedule level {level} ({interval_millis}ms) is negative")]
    NegativeInterval { level: usize, interval_millis: i64 },
}

/// Errors folding a single action log into a prompt state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Couldn't decode prompt task ID: {0}")]
    TaskId(#[from] TaskIdError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Reconciliation errors. Each carries the log IDs needed for diagnosis.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("Merging requires at least one action log")]
    NoLogs,

    #[error("Base prompt state disconnected; unknown head log IDs {missing:?}")]
    DisconnectedBaseState { missing: Vec<ActionLogId> },

    #[error("Missing internal log IDs {missing:?}")]
    MissingInternalLogs { missing: Vec<ActionLogId> },

    #[error("Invalid log sequence, possible bad clock: log {log_id} does not follow heads {heads:?}")]
    InvalidLogSequence {
        log_id: ActionLogId,
        heads: Vec<ActionLogId>,
    },

    #[error("Trying to merge invalid log {log_id}: {source}")]
    InvalidLog {
        log_id: ActionLogId,
        #[source]
        source: TransitionError,
    },

    #[error("Couldn't compute identifier of log #{index}: {source}")]
    Unidentifiable {
        index: usize,
        #[source]
        source: CodecError,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Storage collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("No prompt state tracked for task {task_id}")]
    TaskNotTracked { task_id: PromptTaskId },

    #[error("Prompt state for task {task_id} is unavailable: {reason}")]
    TaskUnavailable { task_id: PromptTaskId, reason: String },

    #[error("Attachment {id} not found")]
    AttachmentNotFound { id: String },
}

/// Master error type for all Orbit errors.
#[derive(Debug, Clone, Error)]
pub enum OrbitError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Task ID error: {0}")]
    TaskId(#[from] TaskIdError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for Orbit operations.
pub type OrbitResult<T> = Result<T, OrbitError>;

// =============================================================================
// TESTS
// =============================================================================
