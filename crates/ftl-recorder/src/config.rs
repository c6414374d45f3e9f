use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ftl_chain::ChainConfig;
use ftl_fabric::BusConfig;

/// What the recorder does when the audit append fails after the token
/// mutation succeeded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditFailurePolicy {
    /// Revert the mutation with its inverse operation and report
    /// [`RecorderError::AuditFailed`](crate::RecorderError::AuditFailed).
    #[default]
    RollBack,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub audit_failure_policy: AuditFailurePolicy,
}

/// Full configuration of a ledger: chain, event bus and recorder.
///
/// Every section is optional in TOML; missing sections and fields take
/// their defaults.
///
/// ```toml
/// [chain]
/// difficulty = 4
/// seal_mode = { kind = "optimistic", max_retries = 16 }
///
/// [bus]
/// max_subscribers = 8
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub chain: ChainConfig,
    pub bus: BusConfig,
    pub recorder: RecorderConfig,
}

impl LedgerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chain
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.bus
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

/// Errors from loading a [`LedgerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use ftl_chain::{Difficulty, SealMode};

    use super::*;

    #[test]
    fn empty_source_gives_defaults() {
        let config = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.chain.difficulty, Difficulty::DEFAULT);
        assert_eq!(config.bus.channel_capacity, 1024);
        assert_eq!(config.bus.max_subscribers, 64);
        assert_eq!(
            config.recorder.audit_failure_policy,
            AuditFailurePolicy::RollBack
        );
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = LedgerConfig::from_toml_str(
            r#"
            [chain]
            difficulty = 2
            seal_mode = { kind = "optimistic", max_retries = 4 }

            [bus]
            max_subscribers = 3

            [recorder]
            audit_failure_policy = "roll_back"
            "#,
        )
        .unwrap();
        assert_eq!(config.chain.difficulty.zeros(), 2);
        assert_eq!(config.chain.seal_mode, SealMode::Optimistic { max_retries: 4 });
        assert_eq!(config.bus.max_subscribers, 3);
        assert_eq!(config.bus.channel_capacity, 1024);
    }

    #[test]
    fn invalid_values_rejected() {
        let err = LedgerConfig::from_toml_str("[chain]\nmax_seal_attempts = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = LedgerConfig::from_toml_str("[bus]\nchannel_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = LedgerConfig::from_toml_str("[chain]\ndifficulty = 99").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chain]\ndifficulty = 1").unwrap();

        let config = LedgerConfig::load(file.path()).unwrap();
        assert_eq!(config.chain.difficulty.zeros(), 1);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LedgerConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
