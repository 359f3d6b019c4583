//! Orbit Core - Action Logs and Spaced Repetition
//!
//! Pure, synchronous core for a content-addressed spaced-repetition system.
//! A task's review state is never stored authoritatively: it is derived by
//! folding immutable action logs, which any replica may append, and is rebuilt
//! by reconciliation whenever logs arrive out of step.
//!
//! This crate does no I/O. Storage collaborators live in `orbit-storage`.

pub mod codec;
pub mod config;
pub mod due;
pub mod error;
pub mod identity;
pub mod log;
pub mod merge;
pub mod prompt;
pub mod schedule;
pub mod state;

pub use codec::{id_for_action_log, id_for_attachment, id_for_prompt, IdentifierScheme};
pub use config::OrbitConfig;
pub use due::{
    due_tasks, select_due_tasks, DueQuery, SessionLimitPolicy, TieredSessionLimit,
    FUZZY_DUE_LOOKAHEAD_MILLIS,
};
pub use error::{
    CodecError, ConfigError, MergeError, OrbitError, OrbitResult, ScheduleError, StorageError,
    TaskIdError, TransitionError,
};
pub use identity::{
    ActionLogId, AttachmentId, DurationMillis, PromptId, PromptTaskId, TimestampMillis,
};
pub use log::{
    ActionLog, ActionLogType, IngestLog, PromptProvenance, ProvenanceType, RepetitionLog,
    RepetitionOutcome, TaskParameters,
};
pub use merge::merge_action_logs;
pub use prompt::{
    AttachmentReference, AttachmentType, Prompt, PromptField, PromptParameters, PromptTask,
    PromptType, QaPrompt,
};
pub use schedule::{IntervalEntry, Schedule, ScheduleKind, DAY_MILLIS, MINUTE_MILLIS};
pub use state::{
    apply_action_log, apply_action_log_with_id, can_apply_to_state, update_heads, PromptState,
};
