//! Review state synchronization.
//!
//! Keeps the prompt state cache consistent with the action log store. A new
//! log is folded directly onto the cached state when it extends that state's
//! heads. Otherwise every log of the task is fetched and reconciled. A task
//! whose logs can't be reconciled is cached as unavailable, never reset.

use crate::traits::{ActionLogStore, CachedPromptState, PromptStateStore};
use orbit_core::{
    apply_action_log_with_id, can_apply_to_state, merge_action_logs, select_due_tasks,
    ActionLog, ActionLogId, DueQuery, DurationMillis, MergeError, OrbitConfig, OrbitError,
    OrbitResult, PromptState, PromptTaskId, Schedule, StorageError, TieredSessionLimit,
    TimestampMillis,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// What [`ReviewStateSynchronizer::record_log`] did with a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The log was already stored; nothing changed.
    Duplicate,
    /// Folded directly onto the cached state.
    FastPath,
    /// Rebuilt from all of the task's logs.
    Reconciled,
    /// Stored, but the task's state couldn't be derived.
    Unavailable { reason: String },
}

/// Applies new action logs to the prompt state cache.
pub struct ReviewStateSynchronizer {
    logs: Arc<dyn ActionLogStore>,
    states: Arc<dyn PromptStateStore>,
    schedule: Schedule,
    due_lookahead_millis: DurationMillis,
    session_limits: TieredSessionLimit,
    /// Serializes read-modify-write cycles on the state cache.
    update_lock: Mutex<()>,
}

impl ReviewStateSynchronizer {
    pub fn new(
        logs: Arc<dyn ActionLogStore>,
        states: Arc<dyn PromptStateStore>,
        config: &OrbitConfig,
    ) -> OrbitResult<Self> {
        config.validate()?;
        Ok(Self {
            logs,
            states,
            schedule: config.schedule(),
            due_lookahead_millis: config.due_lookahead_millis,
            session_limits: config.session_limit_policy()?,
            update_lock: Mutex::new(()),
        })
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Append a log and bring its task's cached state up to date.
    pub async fn record_log(&self, log: &ActionLog) -> OrbitResult<RecordOutcome> {
        let id = log.id()?;
        let task_id = log.task_id().clone();
        let _guard = self.update_lock.lock().await;

        if !self.logs.append(&id, log).await? {
            tracing::debug!(task_id = %task_id, log_id = %id, "log already recorded");
            return Ok(RecordOutcome::Duplicate);
        }

        let cached = self.states.get(&task_id).await?;
        let base = cached.as_ref().and_then(CachedPromptState::available);
        let was_unavailable = matches!(cached, Some(CachedPromptState::Unavailable { .. }));

        if !was_unavailable && can_apply_to_state(log, base) {
            return match apply_action_log_with_id(log, &id, base, &self.schedule) {
                Ok(state) => {
                    tracing::debug!(
                        task_id = %task_id,
                        log_id = %id,
                        due_timestamp_millis = state.due_timestamp_millis,
                        "applied log to cached state"
                    );
                    self.states
                        .put(&task_id, CachedPromptState::Available(state))
                        .await?;
                    Ok(RecordOutcome::FastPath)
                }
                Err(e) => self.mark_unavailable(&task_id, &id, e.to_string()).await,
            };
        }

        tracing::info!(
            task_id = %task_id,
            log_id = %id,
            "log does not apply cleanly, doing full merge"
        );
        let logs = self.logs.logs_for_task(&task_id).await?;
        match self.merge_with_base(&logs, base) {
            Ok(state) => {
                self.states
                    .put(&task_id, CachedPromptState::Available(state))
                    .await?;
                Ok(RecordOutcome::Reconciled)
            }
            Err(e) => self.mark_unavailable(&task_id, &id, e.to_string()).await,
        }
    }

    /// Re-derive a task's state from every stored log, replacing the cache.
    pub async fn rebuild_task(&self, task_id: &PromptTaskId) -> OrbitResult<PromptState> {
        let _guard = self.update_lock.lock().await;
        let logs = self.logs.logs_for_task(task_id).await?;
        if logs.is_empty() {
            return Err(OrbitError::Storage(StorageError::TaskNotTracked {
                task_id: task_id.clone(),
            }));
        }

        match merge_action_logs(&logs, None, &self.schedule) {
            Ok(state) => {
                self.states
                    .put(task_id, CachedPromptState::Available(state.clone()))
                    .await?;
                Ok(state)
            }
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "rebuild failed, task unavailable");
                self.states
                    .put(
                        task_id,
                        CachedPromptState::Unavailable {
                            reason: e.to_string(),
                        },
                    )
                    .await?;
                Err(OrbitError::Merge(e))
            }
        }
    }

    /// Current state of a task.
    pub async fn prompt_state(&self, task_id: &PromptTaskId) -> OrbitResult<PromptState> {
        match self.states.get(task_id).await? {
            Some(CachedPromptState::Available(state)) => Ok(state),
            Some(CachedPromptState::Unavailable { reason }) => {
                Err(OrbitError::Storage(StorageError::TaskUnavailable {
                    task_id: task_id.clone(),
                    reason,
                }))
            }
            None => Err(OrbitError::Storage(StorageError::TaskNotTracked {
                task_id: task_id.clone(),
            })),
        }
    }

    /// Tasks to review in a session. Unavailable tasks are never included.
    pub async fn due_queue(
        &self,
        now_millis: TimestampMillis,
        session_index: u32,
        completed_in_session: usize,
    ) -> OrbitResult<Vec<PromptTaskId>> {
        let states = self.states.available_states().await?;
        let query = DueQuery {
            now_millis,
            session_index,
            completed_in_session,
            lookahead_millis: self.due_lookahead_millis,
        };
        Ok(select_due_tasks(
            states.iter().map(|(task_id, state)| (task_id, state)),
            query,
            &self.session_limits,
        ))
    }

    /// Reconcile, retrying from scratch if the cached heads reference logs the
    /// store no longer has.
    fn merge_with_base(
        &self,
        logs: &[ActionLog],
        base: Option<&PromptState>,
    ) -> Result<PromptState, MergeError> {
        match merge_action_logs(logs, base, &self.schedule) {
            Err(MergeError::DisconnectedBaseState { missing }) => {
                tracing::warn!(
                    missing = ?missing,
                    "cached state is disconnected from stored logs, rebuilding"
                );
                merge_action_logs(logs, None, &self.schedule)
            }
            other => other,
        }
    }

    async fn mark_unavailable(
        &self,
        task_id: &PromptTaskId,
        log_id: &ActionLogId,
        reason: String,
    ) -> OrbitResult<RecordOutcome> {
        tracing::warn!(
            task_id = %task_id,
            log_id = %log_id,
            reason = %reason,
            "couldn't derive prompt state, marking task unavailable"
        );
        self.states
            .put(
                task_id,
                CachedPromptState::Unavailable {
                    reason: reason.clone(),
                },
            )
            .await?;
        Ok(RecordOutcome::Unavailable { reason })
    }
}
