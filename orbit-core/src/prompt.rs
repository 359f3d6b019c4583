//! Prompts and prompt tasks
//!
//! A *prompt* is immutable review content. A *task* is the unit whose review
//! state is tracked: application prompts share one state across all their
//! variants, while each deletion of a cloze prompt is tracked separately.

use crate::codec;
use crate::error::{CodecError, TaskIdError};
use crate::identity::{AttachmentId, PromptId, PromptTaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ATTACHMENTS
// ============================================================================

/// Kind of media an attachment holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttachmentType {
    Image,
}

impl AttachmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentType::Image => "image",
        }
    }
}

/// Reference to attachment bytes stored elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentReference {
    pub id: AttachmentId,
    #[serde(rename = "type")]
    pub attachment_type: AttachmentType,
    pub byte_length: u64,
}

// ============================================================================
// PROMPTS
// ============================================================================

/// One text field of a prompt plus its ordered attachments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PromptField {
    pub contents: String,
    pub attachments: Vec<AttachmentReference>,
}

impl PromptField {
    pub fn text(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: AttachmentReference) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Question/answer content shared by basic prompts and application variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QaPrompt {
    pub question: PromptField,
    pub answer: PromptField,
    pub explanation: Option<PromptField>,
}

impl QaPrompt {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: PromptField::text(question),
            answer: PromptField::text(answer),
            explanation: None,
        }
    }
}

/// Discriminator for the closed set of prompt kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptType {
    Basic,
    Application,
    Cloze,
}

impl PromptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptType::Basic => "basic",
            PromptType::Application => "application",
            PromptType::Cloze => "cloze",
        }
    }

    /// Whether a forgotten task of this kind is queued for an immediate retry.
    ///
    /// Application prompts rotate their variant on every exposure, so they
    /// never retry and never regress below the first spaced level.
    pub fn supports_retry(&self) -> bool {
        !matches!(self, PromptType::Application)
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable review content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "promptType", rename_all = "camelCase")]
pub enum Prompt {
    Basic(QaPrompt),
    Application { variants: Vec<QaPrompt> },
    Cloze { body: PromptField },
}

impl Prompt {
    pub fn prompt_type(&self) -> PromptType {
        match self {
            Prompt::Basic(_) => PromptType::Basic,
            Prompt::Application { .. } => PromptType::Application,
            Prompt::Cloze { .. } => PromptType::Cloze,
        }
    }

    /// Content-derived identifier of this prompt.
    pub fn id(&self) -> Result<PromptId, CodecError> {
        codec::id_for_prompt(self)
    }
}

// ============================================================================
// PROMPT TASKS
// ============================================================================

/// Selects the independently tracked sub-unit of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "promptType", rename_all = "camelCase")]
pub enum PromptParameters {
    Basic,
    Application,
    #[serde(rename_all = "camelCase")]
    Cloze { cloze_index: u32 },
}

impl PromptParameters {
    pub fn prompt_type(&self) -> PromptType {
        match self {
            PromptParameters::Basic => PromptType::Basic,
            PromptParameters::Application => PromptType::Application,
            PromptParameters::Cloze { .. } => PromptType::Cloze,
        }
    }
}

/// A prompt plus the parameters selecting one tracked task within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTask {
    pub prompt_id: PromptId,
    pub parameters: PromptParameters,
}

impl PromptTask {
    pub fn new(prompt_id: PromptId, parameters: PromptParameters) -> Self {
        Self {
            prompt_id,
            parameters,
        }
    }

    pub fn prompt_type(&self) -> PromptType {
        self.parameters.prompt_type()
    }

    /// Encoded task identity.
    pub fn id(&self) -> PromptTaskId {
        let base = format!("{}/{}", self.prompt_id, self.prompt_type());
        match self.parameters {
            PromptParameters::Basic | PromptParameters::Application => PromptTaskId::new(base),
            PromptParameters::Cloze { cloze_index } => {
                PromptTaskId::new(format!("{}/{}", base, cloze_index))
            }
        }
    }
}

impl PromptTaskId {
    /// Decode the task this ID refers to.
    pub fn decode(&self) -> Result<PromptTask, TaskIdError> {
        let task_id = self.as_str();
        let components: Vec<&str> = task_id.split('/').collect();
        if components.len() < 2 {
            return Err(TaskIdError::TooFewComponents {
                task_id: task_id.to_string(),
            });
        }

        let prompt_id =
            PromptId::parse(components[0]).map_err(|source| TaskIdError::InvalidPromptId {
                task_id: task_id.to_string(),
                source,
            })?;

        let too_many = || TaskIdError::TooManyComponents {
            task_id: task_id.to_string(),
        };
        let parameters = match components[1] {
            "basic" if components.len() == 2 => PromptParameters::Basic,
            "application" if components.len() == 2 => PromptParameters::Application,
            "basic" | "application" => return Err(too_many()),
            "cloze" => match components.len() {
                3 => {
                    let cloze_index = components[2].parse::<u32>().map_err(|_| {
                        TaskIdError::InvalidClozeIndex {
                            task_id: task_id.to_string(),
                            index: components[2].to_string(),
                        }
                    })?;
                    PromptParameters::Cloze { cloze_index }
                }
                2 => {
                    return Err(TaskIdError::TooFewComponents {
                        task_id: task_id.to_string(),
                    })
                }
                _ => return Err(too_many()),
            },
            other => {
                return Err(TaskIdError::UnknownPromptType {
                    task_id: task_id.to_string(),
                    prompt_type: other.to_string(),
                })
            }
        };

        Ok(PromptTask {
            prompt_id,
            parameters,
        })
    }
}
