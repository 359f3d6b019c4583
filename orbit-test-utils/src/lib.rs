//! Orbit Test Utilities
//!
//! Shared test infrastructure for the Orbit workspace:
//! - Proptest generators for prompts, outcomes and log histories
//! - Fixtures for common prompts, tasks and action logs
//! - Assertions for Orbit-specific results

pub use orbit_core::{
    ActionLog, ActionLogId, IngestLog, MergeError, OrbitError, OrbitResult, Prompt, PromptField,
    PromptParameters, PromptProvenance, PromptState, PromptTask, PromptTaskId, ProvenanceType,
    QaPrompt, RepetitionLog, RepetitionOutcome, Schedule, TaskParameters, TimestampMillis,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Orbit types.

    use super::*;
    use crate::fixtures::LogChain;
    use proptest::prelude::*;

    pub fn arb_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ?.,]{0,40}"
    }

    pub fn arb_qa_prompt() -> impl Strategy<Value = QaPrompt> {
        (arb_text(), arb_text(), proptest::option::of(arb_text())).prop_map(
            |(question, answer, explanation)| {
                let mut prompt = QaPrompt::new(question, answer);
                prompt.explanation = explanation.map(PromptField::text);
                prompt
            },
        )
    }

    pub fn arb_prompt() -> impl Strategy<Value = Prompt> {
        prop_oneof![
            arb_qa_prompt().prop_map(Prompt::Basic),
            proptest::collection::vec(arb_qa_prompt(), 1..4)
                .prop_map(|variants| Prompt::Application { variants }),
            arb_text().prop_map(|body| Prompt::Cloze {
                body: PromptField::text(body)
            }),
        ]
    }

    pub fn arb_outcome() -> impl Strategy<Value = RepetitionOutcome> {
        prop_oneof![
            Just(RepetitionOutcome::Remembered),
            Just(RepetitionOutcome::Forgotten),
        ]
    }

    /// Milliseconds between consecutive reviews, up to ~200 days. Never zero:
    /// equal timestamps have no causal order once logs are merged.
    pub fn arb_review_gap() -> impl Strategy<Value = i64> {
        1i64..(200 * orbit_core::DAY_MILLIS)
    }

    /// A linear history: one ingest followed by up to `max_reviews`
    /// repetitions, each naming its predecessor as parent.
    pub fn arb_linear_history(max_reviews: usize) -> impl Strategy<Value = Vec<ActionLog>> {
        (
            0i64..1_000_000_000_000,
            proptest::collection::vec((arb_review_gap(), arb_outcome()), 0..=max_reviews),
        )
            .prop_map(|(start, reviews)| {
                let mut chain = LogChain::new(fixtures::basic_task_id(), start);
                for (gap, outcome) in reviews {
                    chain.review(gap, outcome);
                }
                chain.into_logs()
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures.

    use super::*;

    pub fn basic_prompt() -> Prompt {
        Prompt::Basic(QaPrompt::new("Test question", "Test answer"))
    }

    pub fn application_prompt() -> Prompt {
        Prompt::Application {
            variants: vec![
                QaPrompt::new("What is 2 + 3?", "5"),
                QaPrompt::new("What is 4 + 1?", "5"),
            ],
        }
    }

    pub fn cloze_prompt() -> Prompt {
        Prompt::Cloze {
            body: PromptField::text("The {capital} of France is {Paris}."),
        }
    }

    fn task_id_for(prompt: &Prompt, parameters: PromptParameters) -> PromptTaskId {
        let prompt_id = prompt
            .id()
            .expect("fixture prompts have no attachments to decode");
        PromptTask::new(prompt_id, parameters).id()
    }

    pub fn basic_task_id() -> PromptTaskId {
        task_id_for(&basic_prompt(), PromptParameters::Basic)
    }

    pub fn application_task_id() -> PromptTaskId {
        task_id_for(&application_prompt(), PromptParameters::Application)
    }

    pub fn cloze_task_id(cloze_index: u32) -> PromptTaskId {
        task_id_for(&cloze_prompt(), PromptParameters::Cloze { cloze_index })
    }

    pub fn web_provenance() -> PromptProvenance {
        PromptProvenance {
            provenance_type: ProvenanceType::Web,
            external_id: "https://example.com/essay".to_string(),
            modification_timestamp_millis: None,
            title: Some("An essay".to_string()),
            url: Some("https://example.com/essay".to_string()),
        }
    }

    pub fn ingest_log(task_id: &PromptTaskId, timestamp_millis: TimestampMillis) -> ActionLog {
        ActionLog::Ingest(IngestLog {
            timestamp_millis,
            task_id: task_id.clone(),
            provenance: None,
        })
    }

    pub fn repetition_log(
        task_id: &PromptTaskId,
        timestamp_millis: TimestampMillis,
        outcome: RepetitionOutcome,
        parents: Vec<ActionLogId>,
    ) -> ActionLog {
        ActionLog::Repetition(RepetitionLog {
            timestamp_millis,
            task_id: task_id.clone(),
            task_parameters: None,
            outcome,
            context: Some("test-session".to_string()),
            parent_action_log_ids: parents,
        })
    }

    pub fn log_id(log: &ActionLog) -> ActionLogId {
        log.id().expect("fixture logs reference valid parent IDs")
    }

    /// Builds a single-replica history in which every log names the previous
    /// one as its parent.
    #[derive(Debug, Clone)]
    pub struct LogChain {
        task_id: PromptTaskId,
        now: TimestampMillis,
        logs: Vec<ActionLog>,
    }

    impl LogChain {
        /// Start with an ingest at `start`.
        pub fn new(task_id: PromptTaskId, start: TimestampMillis) -> Self {
            let ingest = ingest_log(&task_id, start);
            Self {
                task_id,
                now: start,
                logs: vec![ingest],
            }
        }

        /// Append a repetition `gap` milliseconds after the previous log.
        pub fn review(&mut self, gap: i64, outcome: RepetitionOutcome) -> &mut Self {
            self.now += gap;
            let parents = self.logs.last().map(log_id).into_iter().collect();
            self.logs
                .push(repetition_log(&self.task_id, self.now, outcome, parents));
            self
        }

        pub fn logs(&self) -> &[ActionLog] {
            &self.logs
        }

        pub fn into_logs(self) -> Vec<ActionLog> {
            self.logs
        }
    }

    /// Fold logs in the given order, panicking on any error.
    pub fn replay(logs: &[ActionLog], schedule: &Schedule) -> PromptState {
        let mut state: Option<PromptState> = None;
        for log in logs {
            state = Some(
                orbit_core::apply_action_log(log, state.as_ref(), schedule)
                    .expect("fixture history applies cleanly"),
            );
        }
        state.expect("replay needs at least one log")
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertions for Orbit results.

    use super::*;

    /// Assert that a merge failed because parents were missing.
    pub fn assert_missing_internal_logs<T: std::fmt::Debug>(result: &Result<T, MergeError>) {
        assert!(
            matches!(result, Err(MergeError::MissingInternalLogs { .. })),
            "Expected MissingInternalLogs, got {:?}",
            result
        );
    }

    /// Assert that a merge failed because the base state is disconnected.
    pub fn assert_disconnected<T: std::fmt::Debug>(result: &Result<T, MergeError>) {
        assert!(
            matches!(result, Err(MergeError::DisconnectedBaseState { .. })),
            "Expected DisconnectedBaseState, got {:?}",
            result
        );
    }

    /// Assert that a task is reported unavailable.
    pub fn assert_unavailable<T: std::fmt::Debug>(result: &OrbitResult<T>) {
        assert!(
            matches!(
                result,
                Err(OrbitError::Storage(orbit_core::StorageError::TaskUnavailable { .. }))
            ),
            "Expected TaskUnavailable, got {:?}",
            result
        );
    }

    /// Assert the frontier of a state is exactly `expected`.
    pub fn assert_heads(state: &PromptState, expected: &[ActionLogId]) {
        assert_eq!(
            state.head_action_log_ids, expected,
            "Unexpected head action log IDs"
        );
    }
}
