//! Due-set selection
//!
//! Picks the tasks to review in a session from a collection of prompt states.

use crate::identity::{DurationMillis, PromptTaskId, TimestampMillis};
use crate::state::PromptState;

/// Tasks due within this window are treated as due today.
pub const FUZZY_DUE_LOOKAHEAD_MILLIS: DurationMillis = 16 * 60 * 60 * 1000;

/// Maximum number of reviews in a session, by session index.
pub trait SessionLimitPolicy {
    fn session_limit(&self, session_index: u32) -> usize;
}

impl<F> SessionLimitPolicy for F
where
    F: Fn(u32) -> usize,
{
    fn session_limit(&self, session_index: u32) -> usize {
        self(session_index)
    }
}

/// Fixed caps per session; sessions past the end reuse the last cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TieredSessionLimit {
    tiers: Vec<usize>,
}

impl TieredSessionLimit {
    /// Returns `None` for an empty tier list.
    pub fn new(tiers: Vec<usize>) -> Option<Self> {
        if tiers.is_empty() {
            None
        } else {
            Some(Self { tiers })
        }
    }

    pub fn tiers(&self) -> &[usize] {
        &self.tiers
    }
}

impl Default for TieredSessionLimit {
    fn default() -> Self {
        Self { tiers: vec![25, 50] }
    }
}

impl SessionLimitPolicy for TieredSessionLimit {
    fn session_limit(&self, session_index: u32) -> usize {
        let index = (session_index as usize).min(self.tiers.len() - 1);
        self.tiers[index]
    }
}

/// Options for [`select_due_tasks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueQuery {
    pub now_millis: TimestampMillis,
    pub session_index: u32,
    pub completed_in_session: usize,
    pub lookahead_millis: DurationMillis,
}

impl DueQuery {
    pub fn new(now_millis: TimestampMillis, session_index: u32, completed_in_session: usize) -> Self {
        Self {
            now_millis,
            session_index,
            completed_in_session,
            lookahead_millis: FUZZY_DUE_LOOKAHEAD_MILLIS,
        }
    }
}

/// Tasks due by `now + lookahead`, lowest interval first, then earliest due,
/// then task ID, capped at what remains of the session's limit.
pub fn select_due_tasks<'a, I, P>(states: I, query: DueQuery, limits: &P) -> Vec<PromptTaskId>
where
    I: IntoIterator<Item = (&'a PromptTaskId, &'a PromptState)>,
    P: SessionLimitPolicy + ?Sized,
{
    let remaining = limits
        .session_limit(query.session_index)
        .saturating_sub(query.completed_in_session);
    if remaining == 0 {
        return Vec::new();
    }

    let threshold = query.now_millis.saturating_add(query.lookahead_millis);
    let mut due: Vec<(&PromptTaskId, &PromptState)> = states
        .into_iter()
        .filter(|(_, state)| state.due_timestamp_millis <= threshold)
        .collect();
    due.sort_by(|(a_id, a), (b_id, b)| {
        a.interval_millis
            .cmp(&b.interval_millis)
            .then_with(|| a.due_timestamp_millis.cmp(&b.due_timestamp_millis))
            .then_with(|| a_id.cmp(b_id))
    });
    due.into_iter()
        .take(remaining)
        .map(|(task_id, _)| task_id.clone())
        .collect()
}

/// [`select_due_tasks`] with the default lookahead.
pub fn due_tasks<'a, I, P>(
    states: I,
    now_millis: TimestampMillis,
    session_index: u32,
    completed_in_session: usize,
    limits: &P,
) -> Vec<PromptTaskId>
where
    I: IntoIterator<Item = (&'a PromptTaskId, &'a PromptState)>,
    P: SessionLimitPolicy + ?Sized,
{
    select_due_tasks(
        states,
        DueQuery::new(now_millis, session_index, completed_in_session),
        limits,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state(due: TimestampMillis, interval: DurationMillis) -> PromptState {
        PromptState {
            head_action_log_ids: Vec::new(),
            last_review_timestamp_millis: 0,
            last_review_task_parameters: None,
            due_timestamp_millis: due,
            needs_retry: false,
            interval_millis: interval,
            best_interval_millis: None,
            provenance: None,
        }
    }

    fn states(count: usize, due_count: usize, now: TimestampMillis) -> Vec<(PromptTaskId, PromptState)> {
        (0..count)
            .map(|i| {
                let due = if i < due_count {
                    now
                } else {
                    now + FUZZY_DUE_LOOKAHEAD_MILLIS + 1
                };
                (PromptTaskId::new(format!("task-{:03}", i)), state(due, 0))
            })
            .collect()
    }

    fn select(
        states: &[(PromptTaskId, PromptState)],
        now: TimestampMillis,
        session: u32,
        completed: usize,
    ) -> Vec<PromptTaskId> {
        due_tasks(
            states.iter().map(|(id, s)| (id, s)),
            now,
            session,
            completed,
            &TieredSessionLimit::default(),
        )
    }

    #[test]
    fn test_session_cap() {
        let all_due = states(100, 100, 1000);
        assert_eq!(select(&all_due, 1000, 0, 0).len(), 25);
        assert_eq!(select(&all_due, 1000, 0, 10).len(), 15);
        assert_eq!(select(&all_due, 1000, 0, 30).len(), 0);
        assert_eq!(select(&all_due, 1000, 1, 0).len(), 50);

        let some_due = states(100, 10, 1000);
        assert_eq!(select(&some_due, 1000, 0, 0).len(), 10);
    }

    #[test]
    fn test_fuzzy_threshold_is_inclusive() {
        let now = 5000;
        let items = vec![
            (PromptTaskId::new("edge"), state(now + FUZZY_DUE_LOOKAHEAD_MILLIS, 0)),
            (PromptTaskId::new("late"), state(now + FUZZY_DUE_LOOKAHEAD_MILLIS + 1, 0)),
        ];
        assert_eq!(select(&items, now, 0, 0), vec![PromptTaskId::new("edge")]);
    }

    #[test]
    fn test_ordering() {
        let items = vec![
            (PromptTaskId::new("b"), state(10, 100)),
            (PromptTaskId::new("c"), state(5, 100)),
            (PromptTaskId::new("a"), state(20, 50)),
            (PromptTaskId::new("d"), state(5, 100)),
        ];
        let ids: Vec<String> = select(&items, 0, 0, 0)
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "c", "d", "b"]);
    }

    #[test]
    fn test_closure_policy() {
        let all_due = states(10, 10, 0);
        let picked = due_tasks(all_due.iter().map(|(id, s)| (id, s)), 0, 3, 1, &|session: u32| {
            session as usize
        });
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_tiered_limit() {
        assert!(TieredSessionLimit::new(vec![]).is_none());
        let limits = TieredSessionLimit::new(vec![5, 10, 20]).unwrap();
        assert_eq!(limits.session_limit(0), 5);
        assert_eq!(limits.session_limit(2), 20);
        assert_eq!(limits.session_limit(99), 20);
    }

    proptest! {
        #[test]
        fn prop_selection_is_bounded_and_due(
            dues in proptest::collection::vec(0i64..(3 * FUZZY_DUE_LOOKAHEAD_MILLIS), 0..80),
            completed in 0usize..40,
        ) {
            let now = FUZZY_DUE_LOOKAHEAD_MILLIS;
            let items: Vec<(PromptTaskId, PromptState)> = dues
                .iter()
                .enumerate()
                .map(|(i, due)| (PromptTaskId::new(format!("t{}", i)), state(*due, 0)))
                .collect();
            let due_count = dues.iter().filter(|d| **d <= now + FUZZY_DUE_LOOKAHEAD_MILLIS).count();
            let picked = select(&items, now, 0, completed);
            prop_assert_eq!(picked.len(), due_count.min(25usize.saturating_sub(completed)));
        }
    }
}
