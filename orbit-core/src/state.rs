//! Prompt state and the single-log transition
//!
//! A [`PromptState`] is a cache derived from a task's action logs. It is
//! replaced, never edited in place, and can always be rebuilt by replaying the
//! logs through [`apply_action_log`].

use crate::error::TransitionError;
use crate::identity::{ActionLogId, DurationMillis, TimestampMillis};
use crate::log::{ActionLog, IngestLog, PromptProvenance, RepetitionLog, RepetitionOutcome, TaskParameters};
use crate::schedule::Schedule;
use serde::{Deserialize, Serialize};

/// Delay before a forgotten, retry-capable task is shown again.
pub const RETRY_DELAY_MILLIS: DurationMillis = 300;

/// Jitter added per millisecond-of-second of the review timestamp (up to ~10 minutes).
pub const JITTER_MILLIS_PER_UNIT: DurationMillis = 600;

/// Derived review state of one prompt task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptState {
    /// Causal frontier: log IDs not yet superseded by a known descendant.
    #[serde(rename = "headActionLogIDs")]
    pub head_action_log_ids: Vec<ActionLogId>,
    pub last_review_timestamp_millis: TimestampMillis,
    pub last_review_task_parameters: Option<TaskParameters>,
    pub due_timestamp_millis: TimestampMillis,
    pub needs_retry: bool,
    pub interval_millis: DurationMillis,
    pub best_interval_millis: Option<DurationMillis>,
    pub provenance: Option<PromptProvenance>,
}

/// Advance a frontier past a new log.
///
/// Heads listed among the new log's parents are superseded and dropped; the
/// new log ID is then appended unless it is already a head.
pub fn update_heads(
    old_heads: &[ActionLogId],
    parents: &[ActionLogId],
    new_id: &ActionLogId,
) -> Vec<ActionLogId> {
    let mut heads: Vec<ActionLogId> = old_heads
        .iter()
        .filter(|head| !parents.contains(head))
        .cloned()
        .collect();
    if !old_heads.contains(new_id) {
        heads.push(new_id.clone());
    }
    heads
}

/// Whether `log` can be folded directly onto `state` without reconciliation.
///
/// Ingest logs always apply. A repetition with no base state must have no
/// parents. Otherwise every current head must be among the log's parents; a
/// head the log doesn't know about means another replica appended
/// concurrently.
pub fn can_apply_to_state(log: &ActionLog, state: Option<&PromptState>) -> bool {
    match (log, state) {
        (ActionLog::Ingest(_), _) => true,
        (ActionLog::Repetition(repetition), None) => repetition.parent_action_log_ids.is_empty(),
        (ActionLog::Repetition(repetition), Some(state)) => state
            .head_action_log_ids
            .iter()
            .all(|head| repetition.parent_action_log_ids.contains(head)),
    }
}

/// Fold one log into an optional prior state.
pub fn apply_action_log(
    log: &ActionLog,
    base: Option<&PromptState>,
    schedule: &Schedule,
) -> Result<PromptState, TransitionError> {
    let id = log.id()?;
    apply_action_log_with_id(log, &id, base, schedule)
}

/// [`apply_action_log`] for callers that already hold the log's ID.
pub fn apply_action_log_with_id(
    log: &ActionLog,
    id: &ActionLogId,
    base: Option<&PromptState>,
    schedule: &Schedule,
) -> Result<PromptState, TransitionError> {
    match log {
        ActionLog::Ingest(ingest) => Ok(apply_ingest(ingest, id, base, schedule)),
        ActionLog::Repetition(repetition) => apply_repetition(repetition, id, base, schedule),
    }
}

fn apply_ingest(
    ingest: &IngestLog,
    id: &ActionLogId,
    base: Option<&PromptState>,
    schedule: &Schedule,
) -> PromptState {
    match base {
        // Re-ingesting a tracked task keeps its progress.
        Some(base) => PromptState {
            head_action_log_ids: update_heads(&base.head_action_log_ids, &[], id),
            ..base.clone()
        },
        None => {
            let interval_millis = schedule.initial_interval();
            PromptState {
                head_action_log_ids: vec![id.clone()],
                last_review_timestamp_millis: ingest.timestamp_millis,
                last_review_task_parameters: None,
                due_timestamp_millis: ingest.timestamp_millis.saturating_add(interval_millis),
                needs_retry: false,
                interval_millis,
                best_interval_millis: None,
                provenance: ingest.provenance.clone(),
            }
        }
    }
}

fn apply_repetition(
    repetition: &RepetitionLog,
    id: &ActionLogId,
    base: Option<&PromptState>,
    schedule: &Schedule,
) -> Result<PromptState, TransitionError> {
    let task = repetition.task_id.decode()?;
    let supports_retry = task.prompt_type().supports_retry();
    let timestamp = repetition.timestamp_millis;

    // Clamped so a slightly skewed clock can't produce a negative interval.
    let current_review_interval = base
        .map(|b| timestamp.saturating_sub(b.last_review_timestamp_millis).max(0))
        .unwrap_or(0);
    let currently_needs_retry = base.map(|b| b.needs_retry).unwrap_or(false);
    let previous_best = base.and_then(|b| b.best_interval_millis);

    let level = schedule.level_for_interval(current_review_interval)?;
    let interval_millis = schedule.next_interval(
        level,
        repetition.outcome,
        currently_needs_retry,
        supports_retry,
    );

    let forgotten = repetition.outcome == RepetitionOutcome::Forgotten;
    let jitter = timestamp.rem_euclid(1000) * JITTER_MILLIS_PER_UNIT;
    // Timestamps come from other replicas and may sit at the edge of i64.
    let delay = if supports_retry && forgotten {
        RETRY_DELAY_MILLIS
    } else {
        interval_millis
    };
    let due_timestamp_millis = timestamp.saturating_add(delay).saturating_add(jitter);

    let best_interval_millis = match repetition.outcome {
        RepetitionOutcome::Remembered if !(currently_needs_retry && level > 0) => {
            Some(previous_best.unwrap_or(0).max(current_review_interval))
        }
        _ => previous_best,
    };

    let old_heads = base.map(|b| b.head_action_log_ids.as_slice()).unwrap_or(&[]);
    Ok(PromptState {
        head_action_log_ids: update_heads(old_heads, &repetition.parent_action_log_ids, id),
        last_review_timestamp_millis: timestamp,
        last_review_task_parameters: repetition.task_parameters,
        due_timestamp_millis,
        needs_retry: supports_retry && forgotten,
        interval_millis,
        best_interval_millis,
        provenance: base.and_then(|b| b.provenance.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::id_for_action_log;
    use crate::error::TaskIdError;
    use crate::identity::PromptTaskId;
    use crate::log::ProvenanceType;
    use crate::prompt::{Prompt, PromptParameters, PromptTask, QaPrompt};
    use crate::schedule::DAY_MILLIS;

    fn task_id(parameters: PromptParameters) -> PromptTaskId {
        let prompt = Prompt::Basic(QaPrompt::new("Test question", "Test answer"));
        PromptTask::new(prompt.id().unwrap(), parameters).id()
    }

    fn basic_task() -> PromptTaskId {
        task_id(PromptParameters::Basic)
    }

    fn ingest(timestamp_millis: TimestampMillis) -> ActionLog {
        ActionLog::Ingest(IngestLog {
            timestamp_millis,
            task_id: basic_task(),
            provenance: Some(PromptProvenance {
                provenance_type: ProvenanceType::Note,
                external_id: "note-1".to_string(),
                modification_timestamp_millis: Some(10),
                title: Some("A note".to_string()),
                url: None,
            }),
        })
    }

    fn repetition(
        task_id: PromptTaskId,
        timestamp_millis: TimestampMillis,
        outcome: RepetitionOutcome,
        parents: Vec<ActionLogId>,
    ) -> ActionLog {
        ActionLog::Repetition(RepetitionLog {
            timestamp_millis,
            task_id,
            task_parameters: None,
            outcome,
            context: None,
            parent_action_log_ids: parents,
        })
    }

    fn id(seed: &[u8]) -> ActionLogId {
        id_for_action_log(&ActionLog::Ingest(IngestLog {
            timestamp_millis: seed.len() as i64,
            task_id: PromptTaskId::new(String::from_utf8_lossy(seed).into_owned()),
            provenance: None,
        }))
        .unwrap()
    }

    fn state_reviewed_at(last_review: TimestampMillis, interval: DurationMillis) -> PromptState {
        PromptState {
            head_action_log_ids: vec![id(b"base")],
            last_review_timestamp_millis: last_review,
            last_review_task_parameters: None,
            due_timestamp_millis: last_review + interval,
            needs_retry: false,
            interval_millis: interval,
            best_interval_millis: None,
            provenance: None,
        }
    }

    #[test]
    fn test_ingest_from_empty() {
        let log = ingest(1000);
        let state = apply_action_log(&log, None, &Schedule::default()).unwrap();
        assert_eq!(state.interval_millis, 432_000_000);
        assert_eq!(state.due_timestamp_millis, 432_001_000);
        assert!(!state.needs_retry);
        assert_eq!(state.best_interval_millis, None);
        assert_eq!(state.head_action_log_ids, vec![log.id().unwrap()]);
        assert_eq!(state.last_review_timestamp_millis, 1000);
        assert_eq!(
            state.provenance.as_ref().map(|p| p.external_id.as_str()),
            Some("note-1")
        );
    }

    #[test]
    fn test_reingest_only_advances_heads() {
        let schedule = Schedule::default();
        let base = state_reviewed_at(0, 14 * DAY_MILLIS);
        let log = ingest(5000);
        let state = apply_action_log(&log, Some(&base), &schedule).unwrap();
        assert_eq!(
            state.head_action_log_ids,
            vec![id(b"base"), log.id().unwrap()]
        );
        assert_eq!(
            PromptState {
                head_action_log_ids: base.head_action_log_ids.clone(),
                ..state
            },
            base
        );
    }

    #[test]
    fn test_advance_on_remembered() {
        let base = state_reviewed_at(2000, 0);
        let log = repetition(
            basic_task(),
            2000,
            RepetitionOutcome::Remembered,
            base.head_action_log_ids.clone(),
        );
        let state = apply_action_log(&log, Some(&base), &Schedule::default()).unwrap();
        assert_eq!(state.interval_millis, 432_000_000);
        assert_eq!(state.best_interval_millis, Some(0));
        assert_eq!(state.head_action_log_ids, vec![log.id().unwrap()]);
    }

    #[test]
    fn test_regress_on_forgotten_above_level_one() {
        let two_weeks = 14 * DAY_MILLIS;
        let now = two_weeks + 123;
        let base = state_reviewed_at(123, two_weeks);
        let log = repetition(
            basic_task(),
            now,
            RepetitionOutcome::Forgotten,
            base.head_action_log_ids.clone(),
        );
        let state = apply_action_log(&log, Some(&base), &Schedule::default()).unwrap();
        assert_eq!(state.interval_millis, 432_000_000);
        assert!(state.needs_retry);
        assert_eq!(state.due_timestamp_millis, now + 300 + 123 * 600);
        assert!(state.due_timestamp_millis - now < 10 * 60 * 1000);
        assert_eq!(state.best_interval_millis, None);
    }

    #[test]
    fn test_application_forgotten_floors_at_level_one() {
        let application = task_id(PromptParameters::Application);
        let base = state_reviewed_at(0, 0);
        let log = repetition(
            application,
            1000,
            RepetitionOutcome::Forgotten,
            base.head_action_log_ids.clone(),
        );
        let state = apply_action_log(&log, Some(&base), &Schedule::default()).unwrap();
        assert_eq!(state.interval_millis, 432_000_000);
        assert!(!state.needs_retry);
        assert_eq!(state.due_timestamp_millis, 1000 + 432_000_000);
    }

    #[test]
    fn test_remembered_while_needing_retry_keeps_best() {
        let mut base = state_reviewed_at(0, 5 * DAY_MILLIS);
        base.needs_retry = true;
        base.best_interval_millis = Some(DAY_MILLIS);
        let log = repetition(
            basic_task(),
            6 * DAY_MILLIS,
            RepetitionOutcome::Remembered,
            base.head_action_log_ids.clone(),
        );
        let state = apply_action_log(&log, Some(&base), &Schedule::default()).unwrap();
        assert_eq!(state.interval_millis, 5 * DAY_MILLIS);
        assert_eq!(state.best_interval_millis, Some(DAY_MILLIS));
        assert!(!state.needs_retry);
    }

    #[test]
    fn test_repetition_carries_parameters_and_provenance() {
        let schedule = Schedule::default();
        let ingested = apply_action_log(&ingest(0), None, &schedule).unwrap();
        let log = ActionLog::Repetition(RepetitionLog {
            timestamp_millis: 10,
            task_id: basic_task(),
            task_parameters: Some(TaskParameters { variant_index: 2 }),
            outcome: RepetitionOutcome::Remembered,
            context: Some("session".to_string()),
            parent_action_log_ids: ingested.head_action_log_ids.clone(),
        });
        let state = apply_action_log(&log, Some(&ingested), &schedule).unwrap();
        assert_eq!(
            state.last_review_task_parameters,
            Some(TaskParameters { variant_index: 2 })
        );
        assert_eq!(state.provenance, ingested.provenance);
        assert_eq!(state.last_review_timestamp_millis, 10);
    }

    #[test]
    fn test_undecodable_task_id_is_an_error() {
        let log = repetition(
            PromptTaskId::new("nonsense"),
            0,
            RepetitionOutcome::Remembered,
            vec![],
        );
        let err = apply_action_log(&log, None, &Schedule::default()).unwrap_err();
        assert!(matches!(
            err,
            TransitionError::TaskId(TaskIdError::TooFewComponents { .. })
        ));
    }

    #[test]
    fn test_extreme_timestamps_saturate() {
        let schedule = Schedule::default();
        let late = ingest(i64::MAX - 10);
        let state = apply_action_log(&late, None, &schedule).unwrap();
        assert_eq!(state.due_timestamp_millis, i64::MAX);

        let review = repetition(
            basic_task(),
            i64::MAX - 5,
            RepetitionOutcome::Remembered,
            vec![late.id().unwrap()],
        );
        let reviewed = apply_action_log(&review, Some(&state), &schedule).unwrap();
        assert_eq!(reviewed.due_timestamp_millis, i64::MAX);
        assert_eq!(reviewed.interval_millis, 432_000_000);

        // A review at the far past against a far-future base clamps to zero.
        let early = repetition(
            basic_task(),
            i64::MIN,
            RepetitionOutcome::Forgotten,
            vec![review.id().unwrap()],
        );
        let rewound = apply_action_log(&early, Some(&reviewed), &schedule).unwrap();
        assert!(rewound.needs_retry);
        assert_eq!(rewound.interval_millis, 0);
        assert_eq!(
            rewound.due_timestamp_millis,
            i64::MIN + RETRY_DELAY_MILLIS + 192 * JITTER_MILLIS_PER_UNIT
        );

        // The interval since the previous review overflows i64 and saturates.
        let far = state_reviewed_at(i64::MIN, 0);
        let log = repetition(
            basic_task(),
            i64::MAX,
            RepetitionOutcome::Remembered,
            vec![id(b"base")],
        );
        let advanced = apply_action_log(&log, Some(&far), &schedule).unwrap();
        assert_eq!(advanced.best_interval_millis, Some(i64::MAX));
        assert_eq!(advanced.due_timestamp_millis, i64::MAX);
    }

    #[test]
    fn test_update_heads() {
        let (a, b, c) = (id(b"a"), id(b"bb"), id(b"ccc"));
        assert_eq!(update_heads(&[a.clone()], &[a.clone()], &b), vec![b.clone()]);
        assert_eq!(
            update_heads(&[a.clone(), b.clone()], &[a.clone(), b.clone()], &c),
            vec![c.clone()]
        );
        assert_eq!(
            update_heads(&[a.clone()], &[b.clone()], &c),
            vec![a.clone(), c.clone()]
        );
        assert_eq!(
            update_heads(&[a.clone(), b.clone()], &[a.clone()], &c),
            vec![b.clone(), c.clone()]
        );
        assert_eq!(
            update_heads(&[c.clone(), a.clone()], &[b.clone()], &c),
            vec![c, a]
        );
    }

    #[test]
    fn test_can_apply_to_state() {
        let base = state_reviewed_at(0, 0);
        let heads = base.head_action_log_ids.clone();

        assert!(can_apply_to_state(&ingest(0), None));
        assert!(can_apply_to_state(&ingest(0), Some(&base)));

        let orphan = repetition(basic_task(), 0, RepetitionOutcome::Remembered, vec![]);
        assert!(can_apply_to_state(&orphan, None));
        assert!(!can_apply_to_state(&orphan, Some(&base)));

        let child = repetition(basic_task(), 0, RepetitionOutcome::Remembered, heads.clone());
        assert!(can_apply_to_state(&child, Some(&base)));
        assert!(!can_apply_to_state(&child, None));

        let mut wider = heads;
        wider.push(id(b"other"));
        let merge_child = repetition(basic_task(), 0, RepetitionOutcome::Remembered, wider);
        assert!(can_apply_to_state(&merge_child, Some(&base)));
    }

    #[test]
    fn test_state_serde_field_names() {
        let json = serde_json::to_value(state_reviewed_at(0, 0)).unwrap();
        assert!(json.get("headActionLogIDs").is_some());
        assert!(json.get("dueTimestampMillis").is_some());
        assert!(json.get("bestIntervalMillis").is_some());
    }
}
