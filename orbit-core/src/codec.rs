//! Identifier codec
//!
//! Derives stable, content-addressed identifiers for prompts, action logs and
//! attachments. The scheme is fixed and versioned as a whole
//! ([`IdentifierScheme::CURRENT`]):
//!
//! 1. The object's semantic fields are encoded as a protobuf message with
//!    fixed field tags, so encoding never depends on caller key order.
//! 2. That payload becomes the data of a DAG-PB node. Attachments and causal
//!    parents are *links* of the node (target CID bytes, plus name and size
//!    for attachments), never inlined content.
//! 3. The serialized node is hashed with SHA2-256, wrapped in a CIDv1 with the
//!    `dag-pb` codec and rendered as multibase base58btc (`z...`).
//!
//! Attachments are hashed as raw bytes under the `raw` codec.
//!
//! Changing any step changes every existing identifier. Such a change must be
//! introduced as a new [`IdentifierScheme`] variant, never by editing this one.

use crate::error::CodecError;
use crate::identity::{ActionLogId, AttachmentId, PromptId, TimestampMillis};
use crate::log::ActionLog;
use crate::prompt::{Prompt, PromptField, QaPrompt};
use cid::multibase::Base;
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use prost::encoding::{encode_key, encode_varint, WireType};
use prost::Message;

/// Multicodec tag for DAG-PB nodes.
pub const DAG_PB_CODEC: u64 = 0x70;

/// Multicodec tag for raw bytes.
pub const RAW_CODEC: u64 = 0x55;

/// Multibase prefix for base58btc.
pub const BASE58BTC_PREFIX: char = 'z';

/// Versioned identifier scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierScheme {
    /// Protobuf payload in a DAG-PB node, SHA2-256, CIDv1, base58btc.
    DagPbSha256Base58BtcV1,
}

impl IdentifierScheme {
    pub const CURRENT: IdentifierScheme = IdentifierScheme::DagPbSha256Base58BtcV1;

    pub fn cid_version(&self) -> u64 {
        match self {
            IdentifierScheme::DagPbSha256Base58BtcV1 => 1,
        }
    }
}

// ============================================================================
// CANONICAL PROTOBUF PAYLOADS
// ============================================================================

mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct QaPrompt {
        #[prost(string, tag = "1")]
        pub question: String,
        #[prost(string, tag = "2")]
        pub answer: String,
        #[prost(string, optional, tag = "3")]
        pub explanation: Option<String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ApplicationPrompt {
        #[prost(message, repeated, tag = "1")]
        pub variants: Vec<QaPrompt>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ClozePrompt {
        #[prost(string, tag = "1")]
        pub body: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Prompt {
        #[prost(oneof = "prompt::Kind", tags = "1, 2, 3")]
        pub kind: Option<prompt::Kind>,
    }

    pub mod prompt {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Kind {
            #[prost(message, tag = "1")]
            BasicPrompt(super::QaPrompt),
            #[prost(message, tag = "2")]
            ApplicationPrompt(super::ApplicationPrompt),
            #[prost(message, tag = "3")]
            ClozePrompt(super::ClozePrompt),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Timestamp {
        #[prost(int64, tag = "1")]
        pub seconds: i64,
        #[prost(int32, tag = "2")]
        pub nanos: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Ingest {
        #[prost(string, tag = "1")]
        pub task_id: String,
        #[prost(string, optional, tag = "2")]
        pub provenance: Option<String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Repetition {
        #[prost(string, tag = "1")]
        pub task_id: String,
        #[prost(string, optional, tag = "6")]
        pub task_parameters: Option<String>,
        #[prost(string, tag = "7")]
        pub outcome: String,
        #[prost(string, optional, tag = "8")]
        pub context: Option<String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ActionLog {
        #[prost(message, optional, tag = "1")]
        pub timestamp: Option<Timestamp>,
        #[prost(oneof = "action_log::Kind", tags = "2, 3")]
        pub kind: Option<action_log::Kind>,
    }

    pub mod action_log {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Kind {
            #[prost(message, tag = "2")]
            Ingest(super::Ingest),
            #[prost(message, tag = "3")]
            Repetition(super::Repetition),
        }
    }

    /// DAG-PB link.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PbLink {
        #[prost(bytes = "vec", optional, tag = "1")]
        pub hash: Option<Vec<u8>>,
        #[prost(string, optional, tag = "2")]
        pub name: Option<String>,
        #[prost(uint64, optional, tag = "3")]
        pub tsize: Option<u64>,
    }
}

fn qa_payload(qa: &QaPrompt) -> proto::QaPrompt {
    proto::QaPrompt {
        question: qa.question.contents.clone(),
        answer: qa.answer.contents.clone(),
        explanation: qa.explanation.as_ref().map(|field| field.contents.clone()),
    }
}

fn prompt_payload(prompt: &Prompt) -> proto::Prompt {
    let kind = match prompt {
        Prompt::Basic(qa) => proto::prompt::Kind::BasicPrompt(qa_payload(qa)),
        Prompt::Application { variants } => {
            proto::prompt::Kind::ApplicationPrompt(proto::ApplicationPrompt {
                variants: variants.iter().map(qa_payload).collect(),
            })
        }
        Prompt::Cloze { body } => proto::prompt::Kind::ClozePrompt(proto::ClozePrompt {
            body: body.contents.clone(),
        }),
    };
    proto::Prompt { kind: Some(kind) }
}

fn timestamp_payload(millis: TimestampMillis) -> proto::Timestamp {
    proto::Timestamp {
        seconds: millis.div_euclid(1000),
        nanos: (millis.rem_euclid(1000) * 1_000_000) as i32,
    }
}

fn canonical_json<T: serde::Serialize>(field: &str, value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(|e| CodecError::CanonicalEncoding {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

fn action_log_payload(log: &ActionLog) -> Result<proto::ActionLog, CodecError> {
    let kind = match log {
        ActionLog::Ingest(ingest) => proto::action_log::Kind::Ingest(proto::Ingest {
            task_id: ingest.task_id.as_str().to_string(),
            provenance: ingest
                .provenance
                .as_ref()
                .map(|provenance| canonical_json("provenance", provenance))
                .transpose()?,
        }),
        ActionLog::Repetition(repetition) => {
            proto::action_log::Kind::Repetition(proto::Repetition {
                task_id: repetition.task_id.as_str().to_string(),
                task_parameters: repetition
                    .task_parameters
                    .as_ref()
                    .map(|parameters| canonical_json("taskParameters", parameters))
                    .transpose()?,
                outcome: repetition.outcome.as_str().to_string(),
                context: repetition.context.clone(),
            })
        }
    };
    Ok(proto::ActionLog {
        timestamp: Some(timestamp_payload(log.timestamp_millis())),
        kind: Some(kind),
    })
}

// ============================================================================
// DAG LINKS
// ============================================================================

fn field_links(
    field: &PromptField,
    prefix: &str,
    links: &mut Vec<proto::PbLink>,
) -> Result<(), CodecError> {
    for (index, attachment) in field.attachments.iter().enumerate() {
        links.push(proto::PbLink {
            hash: Some(attachment.id.to_cid_bytes()?),
            name: Some(format!(
                "{}/{}/{}",
                prefix,
                index,
                attachment.attachment_type.as_str()
            )),
            tsize: Some(attachment.byte_length),
        });
    }
    Ok(())
}

fn qa_links(qa: &QaPrompt, prefix: &str, links: &mut Vec<proto::PbLink>) -> Result<(), CodecError> {
    field_links(&qa.question, &format!("{}/question", prefix), links)?;
    field_links(&qa.answer, &format!("{}/answer", prefix), links)?;
    if let Some(explanation) = &qa.explanation {
        field_links(explanation, &format!("{}/explanation", prefix), links)?;
    }
    Ok(())
}

fn prompt_links(prompt: &Prompt) -> Result<Vec<proto::PbLink>, CodecError> {
    let mut links = Vec::new();
    match prompt {
        Prompt::Basic(qa) => qa_links(qa, "", &mut links)?,
        Prompt::Application { variants } => {
            for (index, variant) in variants.iter().enumerate() {
                qa_links(variant, &index.to_string(), &mut links)?;
            }
        }
        Prompt::Cloze { body } => field_links(body, "", &mut links)?,
    }
    Ok(links)
}

fn action_log_links(log: &ActionLog) -> Result<Vec<proto::PbLink>, CodecError> {
    log.parent_ids()
        .iter()
        .map(|parent| {
            Ok(proto::PbLink {
                hash: Some(parent.to_cid_bytes()?),
                name: None,
                tsize: None,
            })
        })
        .collect()
}

/// Serialize a DAG-PB node: links (field 2) in order, then data (field 1).
fn encode_dag_node(data: &[u8], links: &[proto::PbLink]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + links.len() * 48 + 8);
    for link in links {
        prost::encoding::message::encode(2, link, &mut buf);
    }
    encode_key(1, WireType::LengthDelimited, &mut buf);
    encode_varint(data.len() as u64, &mut buf);
    buf.extend_from_slice(data);
    buf
}

fn encode_cid(codec: u64, bytes: &[u8]) -> Result<String, CodecError> {
    let hash = Code::Sha2_256.digest(bytes);
    let cid = Cid::new_v1(codec, hash);
    cid.to_string_of_base(Base::Base58Btc)
        .map_err(|e| CodecError::InvalidCid {
            id: cid.to_string(),
            reason: e.to_string(),
        })
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Identifier of a prompt. Sensitive to attachment identity, but computed
/// without the attachment bytes.
pub fn id_for_prompt(prompt: &Prompt) -> Result<PromptId, CodecError> {
    let data = prompt_payload(prompt).encode_to_vec();
    let node = encode_dag_node(&data, &prompt_links(prompt)?);
    Ok(PromptId::from_encoded(encode_cid(DAG_PB_CODEC, &node)?))
}

/// Identifier of an action log, committing to its parent logs.
pub fn id_for_action_log(log: &ActionLog) -> Result<ActionLogId, CodecError> {
    let data = action_log_payload(log)?.encode_to_vec();
    let node = encode_dag_node(&data, &action_log_links(log)?);
    Ok(ActionLogId::from_encoded(encode_cid(DAG_PB_CODEC, &node)?))
}

/// Identifier of raw attachment bytes.
pub fn id_for_attachment(bytes: &[u8]) -> Result<AttachmentId, CodecError> {
    Ok(AttachmentId::from_encoded(encode_cid(RAW_CODEC, bytes)?))
}

pub(crate) fn decode_cid_string(id: &str) -> Result<Vec<u8>, CodecError> {
    // Cid parsing accepts any multibase and bare CIDv0; only base58btc is ours.
    if !id.starts_with(BASE58BTC_PREFIX) {
        return Err(CodecError::InvalidMultibase { id: id.to_string() });
    }
    let cid = Cid::try_from(id).map_err(|e| CodecError::InvalidCid {
        id: id.to_string(),
        reason: e.to_string(),
    })?;
    Ok(cid.to_bytes())
}

pub(crate) fn validate_cid_string(id: &str) -> Result<(), CodecError> {
    decode_cid_string(id).map(|_| ())
}
