//! Reconciliation
//!
//! Rebuilds a task's state from an unordered collection of its action logs.
//! Used whenever a new log can't be folded directly onto the cached state.

use crate::error::MergeError;
use crate::identity::ActionLogId;
use crate::log::ActionLog;
use crate::schedule::Schedule;
use crate::state::{apply_action_log_with_id, can_apply_to_state, PromptState};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Replay `logs` in canonical order and return the resulting state.
///
/// `base` is a cached state the caller already holds; it is only used to
/// check that the supplied logs cover its history. Replay always starts from
/// no state.
///
/// Logs are ordered by timestamp, then ingest before repetition, then log ID.
/// Logs with equal IDs are folded once.
pub fn merge_action_logs(
    logs: &[ActionLog],
    base: Option<&PromptState>,
    schedule: &Schedule,
) -> Result<PromptState, MergeError> {
    if logs.is_empty() {
        return Err(MergeError::NoLogs);
    }

    let mut identified: Vec<(ActionLogId, &ActionLog)> = Vec::with_capacity(logs.len());
    let mut known: HashSet<ActionLogId> = HashSet::with_capacity(logs.len());
    for (index, log) in logs.iter().enumerate() {
        let id = log
            .id()
            .map_err(|source| MergeError::Unidentifiable { index, source })?;
        if known.insert(id.clone()) {
            identified.push((id, log));
        }
    }

    if let Some(base) = base {
        let missing: Vec<ActionLogId> = base
            .head_action_log_ids
            .iter()
            .filter(|head| !known.contains(*head))
            .cloned()
            .collect();
        if !missing.is_empty() {
            debug!(missing = ?missing, "base state heads absent from merged logs");
            return Err(MergeError::DisconnectedBaseState { missing });
        }
    }

    let mut missing: Vec<ActionLogId> = Vec::new();
    for (_, log) in &identified {
        for parent in log.parent_ids() {
            if !known.contains(parent) && !missing.contains(parent) {
                missing.push(parent.clone());
            }
        }
    }
    if !missing.is_empty() {
        debug!(missing = ?missing, "merged logs reference absent parents");
        return Err(MergeError::MissingInternalLogs { missing });
    }

    identified.sort_by(|(a_id, a), (b_id, b)| {
        a.timestamp_millis()
            .cmp(&b.timestamp_millis())
            .then_with(|| a.log_type().cmp(&b.log_type()))
            .then_with(|| a_id.cmp(b_id))
    });

    let mut state: Option<PromptState> = None;
    for (id, log) in &identified {
        if !can_apply_to_state(log, state.as_ref()) {
            let heads = state
                .map(|s| s.head_action_log_ids)
                .unwrap_or_default();
            warn!(
                log_id = %id,
                heads = ?heads,
                "invalid log sequence, possible bad clock"
            );
            return Err(MergeError::InvalidLogSequence {
                log_id: id.clone(),
                heads,
            });
        }
        let next = apply_action_log_with_id(log, id, state.as_ref(), schedule).map_err(|source| {
            MergeError::InvalidLog {
                log_id: id.clone(),
                source,
            }
        })?;
        state = Some(next);
    }

    state.ok_or(MergeError::NoLogs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{PromptTaskId, TimestampMillis};
    use crate::log::{IngestLog, RepetitionLog, RepetitionOutcome};
    use crate::prompt::{Prompt, PromptParameters, PromptTask, QaPrompt};
    use crate::state::apply_action_log;
    use proptest::prelude::*;

    fn task() -> PromptTaskId {
        let prompt = Prompt::Basic(QaPrompt::new("Test question", "Test answer"));
        PromptTask::new(prompt.id().unwrap(), PromptParameters::Basic).id()
    }

    fn ingest(timestamp_millis: TimestampMillis) -> ActionLog {
        ActionLog::Ingest(IngestLog {
            timestamp_millis,
            task_id: task(),
            provenance: None,
        })
    }

    fn repetition(timestamp_millis: TimestampMillis, parents: &[&ActionLog]) -> ActionLog {
        ActionLog::Repetition(RepetitionLog {
            timestamp_millis,
            task_id: task(),
            task_parameters: None,
            outcome: RepetitionOutcome::Remembered,
            context: None,
            parent_action_log_ids: parents.iter().map(|p| p.id().unwrap()).collect(),
        })
    }

    /// ingest(1000) <- rep(2000) <- rep(3000)
    fn chain() -> Vec<ActionLog> {
        let a = ingest(1000);
        let b = repetition(2000, &[&a]);
        let c = repetition(3000, &[&b]);
        vec![a, b, c]
    }

    fn replay(logs: &[ActionLog]) -> PromptState {
        let schedule = Schedule::default();
        let mut state: Option<PromptState> = None;
        for log in logs {
            state = Some(apply_action_log(log, state.as_ref(), &schedule).unwrap());
        }
        state.unwrap()
    }

    #[test]
    fn test_merge_requires_logs() {
        assert_eq!(
            merge_action_logs(&[], None, &Schedule::default()),
            Err(MergeError::NoLogs)
        );
    }

    #[test]
    fn test_merge_matches_sequential_replay() {
        let logs = chain();
        let merged = merge_action_logs(&logs, None, &Schedule::default()).unwrap();
        assert_eq!(merged, replay(&logs));
        assert_eq!(merged.head_action_log_ids, vec![logs[2].id().unwrap()]);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let logs = chain();
        let expected = merge_action_logs(&logs, None, &Schedule::default()).unwrap();
        let shuffled = vec![logs[2].clone(), logs[0].clone(), logs[1].clone()];
        assert_eq!(
            merge_action_logs(&shuffled, None, &Schedule::default()).unwrap(),
            expected
        );
    }

    #[test]
    fn test_merge_folds_duplicates_once() {
        let logs = chain();
        let mut doubled = logs.clone();
        doubled.extend(logs.iter().cloned());
        assert_eq!(
            merge_action_logs(&doubled, None, &Schedule::default()).unwrap(),
            merge_action_logs(&logs, None, &Schedule::default()).unwrap()
        );
    }

    #[test]
    fn test_merge_rejects_missing_parent() {
        let logs = chain();
        let gap = vec![logs[0].clone(), logs[2].clone()];
        assert_eq!(
            merge_action_logs(&gap, None, &Schedule::default()),
            Err(MergeError::MissingInternalLogs {
                missing: vec![logs[1].id().unwrap()]
            })
        );
    }

    #[test]
    fn test_merge_rejects_disconnected_base() {
        let logs = chain();
        let base = replay(&logs);
        let partial = &logs[..2];
        assert_eq!(
            merge_action_logs(partial, Some(&base), &Schedule::default()),
            Err(MergeError::DisconnectedBaseState {
                missing: vec![logs[2].id().unwrap()]
            })
        );
        assert!(merge_action_logs(&logs, Some(&base), &Schedule::default()).is_ok());
    }

    #[test]
    fn test_merge_rejects_concurrent_branches() {
        // Two replicas both reviewed after the same ingest.
        let a = ingest(1000);
        let left = repetition(2000, &[&a]);
        let right = repetition(3000, &[&a]);
        let err = merge_action_logs(&[a, left.clone(), right.clone()], None, &Schedule::default())
            .unwrap_err();
        assert_eq!(
            err,
            MergeError::InvalidLogSequence {
                log_id: right.id().unwrap(),
                heads: vec![left.id().unwrap()],
            }
        );
    }

    #[test]
    fn test_merge_joins_branches_with_merge_log() {
        // A second ingest leaves two heads; a log naming both collapses them.
        let a = ingest(1000);
        let other = ingest(1500);
        let join = repetition(4000, &[&a, &other]);
        let merged =
            merge_action_logs(&[join.clone(), other, a], None, &Schedule::default()).unwrap();
        assert_eq!(merged.head_action_log_ids, vec![join.id().unwrap()]);
    }

    #[test]
    fn test_merge_surfaces_transition_errors() {
        let bad = ActionLog::Repetition(RepetitionLog {
            timestamp_millis: 0,
            task_id: PromptTaskId::new("not-a-task"),
            task_parameters: None,
            outcome: RepetitionOutcome::Forgotten,
            context: None,
            parent_action_log_ids: vec![],
        });
        let err = merge_action_logs(&[bad.clone()], None, &Schedule::default()).unwrap_err();
        assert!(matches!(err, MergeError::InvalidLog { log_id, .. } if log_id == bad.id().unwrap()));
    }

    #[test]
    fn test_ingest_sorts_before_repetition_at_same_timestamp() {
        let a = ingest(1000);
        let b = repetition(1000, &[&a]);
        let merged = merge_action_logs(&[b.clone(), a], None, &Schedule::default()).unwrap();
        assert_eq!(merged.head_action_log_ids, vec![b.id().unwrap()]);
    }

    #[test]
    fn test_equal_timestamp_ingests_order_by_log_id() {
        use crate::log::{PromptProvenance, ProvenanceType};

        let ingest_from = |external_id: &str| {
            ActionLog::Ingest(IngestLog {
                timestamp_millis: 1000,
                task_id: task(),
                provenance: Some(PromptProvenance {
                    provenance_type: ProvenanceType::Note,
                    external_id: external_id.to_string(),
                    modification_timestamp_millis: None,
                    title: None,
                    url: None,
                }),
            })
        };
        let a = ingest_from("note-a");
        let b = ingest_from("note-b");
        let schedule = Schedule::default();

        let forward = merge_action_logs(&[a.clone(), b.clone()], None, &schedule).unwrap();
        let backward = merge_action_logs(&[b.clone(), a.clone()], None, &schedule).unwrap();
        assert_eq!(forward, backward);

        let mut expected = vec![a.id().unwrap(), b.id().unwrap()];
        expected.sort();
        assert_eq!(forward.head_action_log_ids, expected);

        // The lower ID is applied first, so its provenance is the one kept.
        let first = if expected[0] == a.id().unwrap() { "note-a" } else { "note-b" };
        assert_eq!(
            forward.provenance.map(|p| p.external_id),
            Some(first.to_string())
        );
    }

    proptest! {
        #[test]
        fn prop_merge_is_permutation_invariant(order in Just(vec![0usize, 1, 2]).prop_shuffle()) {
            let logs = chain();
            let permuted: Vec<ActionLog> = order.iter().map(|i| logs[*i].clone()).collect();
            prop_assert_eq!(
                merge_action_logs(&permuted, None, &Schedule::default()).unwrap(),
                replay(&logs)
            );
        }
    }
}
