//! Configuration for consumers and the simulated queue.
//!
//! Loaded from TOML, then overridden by `IONIX_*` environment variables.
//!
//! ```toml
//! name = "service-a"
//!
//! [poll]
//! poll_times = 10
//! timeout_ms = 1000
//! on_fatal = "continue"   # or "abort"
//!
//! [simulated]
//! max_delay_ms = 2000
//! seed = 42
//!
//! [simulated.weights]
//! message = 3
//! empty = 1
//! transient = 1
//! fatal = 1
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::impls::simulated_queue::{OutcomeWeights, SimulatedQueue, SimulationError};

/// Path of the config file, if any.
pub const CONFIG_PATH_ENV: &str = "IONIX_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },

    #[error("validation error: {0}")]
    Validation(String),
}

/// What the poll loop does after a `FatalFailure`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalFailurePolicy {
    /// Report and keep polling (reference behaviour).
    #[default]
    Continue,
    /// Report and stop the loop.
    Abort,
}

impl FromStr for FatalFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            other => Err(format!("unknown fatal failure policy '{other}'")),
        }
    }
}

/// Poll-loop parameters used when a consume request does not override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub poll_times: u32,
    pub timeout: Duration,
    pub on_fatal: FatalFailurePolicy,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollConfig::default().into()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub poll_times: u32,
    pub timeout_ms: u64,
    pub on_fatal: FatalFailurePolicy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_times: 10,
            timeout_ms: 1000,
            on_fatal: FatalFailurePolicy::Continue,
        }
    }
}

impl From<PollConfig> for PollSettings {
    fn from(c: PollConfig) -> Self {
        Self {
            poll_times: c.poll_times,
            timeout: Duration::from_millis(c.timeout_ms),
            on_fatal: c.on_fatal,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatedQueueConfig {
    pub max_delay_ms: u64,
    pub seed: Option<u64>,
    pub weights: OutcomeWeights,
}

impl Default for SimulatedQueueConfig {
    fn default() -> Self {
        Self {
            max_delay_ms: 2000,
            seed: None,
            weights: OutcomeWeights::default(),
        }
    }
}

impl SimulatedQueueConfig {
    pub fn build(&self) -> Result<SimulatedQueue, SimulationError> {
        let queue = match self.seed {
            Some(seed) => SimulatedQueue::with_seed(seed),
            None => SimulatedQueue::new(),
        };
        queue
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_weights(self.weights)
    }
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub name: String,
    pub poll: PollConfig,
    pub simulated: SimulatedQueueConfig,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            name: "ionix-consumer".to_string(),
            poll: PollConfig::default(),
            simulated: SimulatedQueueConfig::default(),
        }
    }
}

impl ConsumerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading consumer config");
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// `IONIX_CONFIG` のファイル（無ければデフォルト）+ 環境変数の上書き
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `IONIX_*` overrides read through `lookup`, then re-validate.
    pub fn apply_env_overrides_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(name) = lookup("IONIX_CONSUMER_NAME") {
            self.name = name;
        }
        if let Some(v) = lookup("IONIX_POLL_TIMES") {
            self.poll.poll_times = parse_env("IONIX_POLL_TIMES", &v)?;
        }
        if let Some(v) = lookup("IONIX_POLL_TIMEOUT_MS") {
            self.poll.timeout_ms = parse_env("IONIX_POLL_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("IONIX_ON_FATAL") {
            self.poll.on_fatal = parse_env("IONIX_ON_FATAL", &v)?;
        }
        if let Some(v) = lookup("IONIX_SIM_MAX_DELAY_MS") {
            self.simulated.max_delay_ms = parse_env("IONIX_SIM_MAX_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("IONIX_SIM_SEED") {
            self.simulated.seed = Some(parse_env("IONIX_SIM_SEED", &v)?);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation("name must not be empty".into()));
        }
        let w = self.simulated.weights;
        if w.message == 0 && w.empty == 0 && w.transient == 0 && w.fatal == 0 {
            return Err(ConfigError::Validation(
                "simulated.weights must have at least one non-zero weight".into(),
            ));
        }
        debug!(name = %self.name, "consumer config validated");
        Ok(())
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.poll.clone().into()
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = ConsumerConfig::from_toml_str("").unwrap();
        assert_eq!(config.name, "ionix-consumer");
        assert_eq!(config.poll_settings(), PollSettings::default());
        assert_eq!(config.poll_settings().poll_times, 10);
        assert_eq!(config.poll_settings().timeout, Duration::from_millis(1000));
        assert_eq!(config.simulated.weights, OutcomeWeights::default());
    }

    #[test]
    fn parses_full_document() {
        let config = ConsumerConfig::from_toml_str(
            r#"
            name = "service-b"

            [poll]
            poll_times = 3
            timeout_ms = 250
            on_fatal = "abort"

            [simulated]
            max_delay_ms = 0
            seed = 9

            [simulated.weights]
            message = 5
            fatal = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "service-b");
        let poll = config.poll_settings();
        assert_eq!(poll.poll_times, 3);
        assert_eq!(poll.timeout, Duration::from_millis(250));
        assert_eq!(poll.on_fatal, FatalFailurePolicy::Abort);
        assert_eq!(config.simulated.seed, Some(9));
        assert_eq!(config.simulated.weights.message, 5);
        assert_eq!(config.simulated.weights.empty, 1);
        assert_eq!(config.simulated.weights.fatal, 0);
        assert!(config.simulated.build().is_ok());
    }

    #[test]
    fn rejects_all_zero_weights() {
        let err = ConsumerConfig::from_toml_str(
            "[simulated.weights]\nmessage = 0\nempty = 0\ntransient = 0\nfatal = 0\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = ConsumerConfig::from_toml_str("[poll]\non_fatal = \"explode\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("IONIX_CONSUMER_NAME", "service-a"),
            ("IONIX_POLL_TIMES", "4"),
            ("IONIX_ON_FATAL", "Abort"),
            ("IONIX_SIM_SEED", "77"),
        ]);
        let mut config = ConsumerConfig::default();
        config
            .apply_env_overrides_with(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.name, "service-a");
        assert_eq!(config.poll.poll_times, 4);
        assert_eq!(config.poll.on_fatal, FatalFailurePolicy::Abort);
        assert_eq!(config.simulated.seed, Some(77));
    }

    #[rstest]
    #[case::poll_times("IONIX_POLL_TIMES", "many")]
    #[case::timeout("IONIX_POLL_TIMEOUT_MS", "-1")]
    #[case::policy("IONIX_ON_FATAL", "maybe")]
    fn invalid_env_values_are_rejected(#[case] key: &str, #[case] value: &str) {
        let mut config = ConsumerConfig::default();
        let err = config
            .apply_env_overrides_with(|k| (k == key).then(|| value.to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn blank_name_override_fails_validation() {
        let mut config = ConsumerConfig::default();
        let err = config
            .apply_env_overrides_with(|k| (k == "IONIX_CONSUMER_NAME").then(|| "  ".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
