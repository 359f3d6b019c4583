//! Configuration types

use crate::due::{TieredSessionLimit, FUZZY_DUE_LOOKAHEAD_MILLIS};
use crate::error::ConfigError;
use crate::identity::DurationMillis;
use crate::schedule::{Schedule, ScheduleKind};
use serde::{Deserialize, Serialize};

/// Master configuration struct. Defaults are the production values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub schedule: ScheduleKind,
    /// Tasks due within this window of now count as due.
    pub due_lookahead_millis: DurationMillis,
    /// Per-session review caps; session `i` uses entry `min(i, len - 1)`.
    pub session_limits: Vec<usize>,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleKind::Default,
            due_lookahead_millis: FUZZY_DUE_LOOKAHEAD_MILLIS,
            session_limits: TieredSessionLimit::default().tiers().to_vec(),
        }
    }
}

impl OrbitConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: OrbitConfig = toml::from_str(raw).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.due_lookahead_millis < 0 {
            return Err(ConfigError::InvalidValue {
                field: "due_lookahead_millis".to_string(),
                value: self.due_lookahead_millis.to_string(),
                reason: "due_lookahead_millis must be non-negative".to_string(),
            });
        }

        if self.session_limits.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "session_limits".to_string(),
                value: "[]".to_string(),
                reason: "session_limits must not be empty".to_string(),
            });
        }

        if self.session_limits.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(ConfigError::InvalidValue {
                field: "session_limits".to_string(),
                value: format!("{:?}", self.session_limits),
                reason: "session_limits must be non-decreasing".to_string(),
            });
        }

        Ok(())
    }

    pub fn schedule(&self) -> Schedule {
        Schedule::for_kind(self.schedule)
    }

    pub fn session_limit_policy(&self) -> Result<TieredSessionLimit, ConfigError> {
        TieredSessionLimit::new(self.session_limits.clone()).ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "session_limits".to_string(),
                value: "[]".to_string(),
                reason: "session_limits must not be empty".to_string(),
            }
        })
    }
}
