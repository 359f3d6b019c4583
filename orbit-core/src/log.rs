//! Action logs
//!
//! Logs are immutable and append-only. A task's review state is always a
//! function of its logs; nothing else is authoritative.

use crate::codec;
use crate::error::CodecError;
use crate::identity::{ActionLogId, PromptTaskId, TimestampMillis};
use serde::{Deserialize, Serialize};

/// Outcome of one review of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RepetitionOutcome {
    Remembered,
    Forgotten,
}

impl RepetitionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepetitionOutcome::Remembered => "remembered",
            RepetitionOutcome::Forgotten => "forgotten",
        }
    }
}

/// Where an ingested task came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProvenanceType {
    Anki,
    Note,
    Web,
}

/// Origin metadata recorded when a task is first ingested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptProvenance {
    pub provenance_type: ProvenanceType,
    #[serde(rename = "externalID")]
    pub external_id: String,
    pub modification_timestamp_millis: Option<TimestampMillis>,
    pub title: Option<String>,
    pub url: Option<String>,
}

/// State needed to choose what to show on the next review of a task.
///
/// Application prompts record which variant was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskParameters {
    pub variant_index: u32,
}

/// Declares the first exposure to a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestLog {
    pub timestamp_millis: TimestampMillis,
    #[serde(rename = "taskID")]
    pub task_id: PromptTaskId,
    pub provenance: Option<PromptProvenance>,
}

/// Records the outcome of one review.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepetitionLog {
    pub timestamp_millis: TimestampMillis,
    #[serde(rename = "taskID")]
    pub task_id: PromptTaskId,
    pub task_parameters: Option<TaskParameters>,
    pub outcome: RepetitionOutcome,
    /// Review session identifier.
    pub context: Option<String>,
    #[serde(rename = "parentActionLogIDs")]
    pub parent_action_log_ids: Vec<ActionLogId>,
}

/// Discriminator for the closed set of action log kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionLogType {
    Ingest,
    Repetition,
}

/// An immutable record of a user action on a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "actionLogType", rename_all = "camelCase")]
pub enum ActionLog {
    Ingest(IngestLog),
    Repetition(RepetitionLog),
}

impl ActionLog {
    pub fn log_type(&self) -> ActionLogType {
        match self {
            ActionLog::Ingest(_) => ActionLogType::Ingest,
            ActionLog::Repetition(_) => ActionLogType::Repetition,
        }
    }

    pub fn timestamp_millis(&self) -> TimestampMillis {
        match self {
            ActionLog::Ingest(log) => log.timestamp_millis,
            ActionLog::Repetition(log) => log.timestamp_millis,
        }
    }

    pub fn task_id(&self) -> &PromptTaskId {
        match self {
            ActionLog::Ingest(log) => &log.task_id,
            ActionLog::Repetition(log) => &log.task_id,
        }
    }

    /// Causal predecessors. Ingest logs have none.
    pub fn parent_ids(&self) -> &[ActionLogId] {
        match self {
            ActionLog::Ingest(_) => &[],
            ActionLog::Repetition(log) => &log.parent_action_log_ids,
        }
    }

    /// Content-derived identifier of this log.
    pub fn id(&self) -> Result<ActionLogId, CodecError> {
        codec::id_for_action_log(self)
    }
}

impl From<IngestLog> for ActionLog {
    fn from(log: IngestLog) -> Self {
        ActionLog::Ingest(log)
    }
}

impl From<RepetitionLog> for ActionLog {
    fn from(log: RepetitionLog) -> Self {
        ActionLog::Repetition(log)
    }
}
