//! Engine configuration
//!
//! Loaded from the environment (`AWS_MANG_ACC_ROLE`, `AWS_MEMBER_ACC_ROLE_NAME`,
//! `PARAM_SHARE_SESSION_NAME`) or from a YAML file, with environment values
//! taking precedence over the file.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::parameter::DEFAULT_DESCRIPTION;
use crate::target::AccountId;

pub const ENV_MANAGEMENT_ROLE: &str = "AWS_MANG_ACC_ROLE";
pub const ENV_MEMBER_ROLE_NAME: &str = "AWS_MEMBER_ACC_ROLE_NAME";
pub const ENV_SESSION_NAME: &str = "PARAM_SHARE_SESSION_NAME";

const DEFAULT_SESSION_NAME: &str = "secrets-vault";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareConfig {
    /// Role assumed in the management account to list the organization.
    pub management_role_arn: String,
    /// Role name assumed in every target account.
    pub member_role_name: String,
    pub session_name: String,
    pub default_description: String,
}

fn default_session_name() -> String {
    DEFAULT_SESSION_NAME.to_string()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

/// File shape: every field optional so the environment can fill the gaps.
#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    management_role_arn: Option<String>,
    member_role_name: Option<String>,
    session_name: Option<String>,
    default_description: Option<String>,
}

impl ShareConfig {
    pub fn new(management_role_arn: impl Into<String>, member_role_name: impl Into<String>) -> Self {
        Self {
            management_role_arn: management_role_arn.into(),
            member_role_name: member_role_name.into(),
            session_name: default_session_name(),
            default_description: default_description(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(PartialConfig::default(), |key| std::env::var(key).ok())
    }

    /// Load a YAML file, then apply environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_with_env(&content, |key| std::env::var(key).ok())
    }

    fn from_yaml_with_env<F>(yaml: &str, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: PartialConfig = serde_yaml::from_str(yaml)?;
        Self::resolve(file, env)
    }

    fn resolve<F>(file: PartialConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let management_role_arn = non_empty(ENV_MANAGEMENT_ROLE)
            .or(file.management_role_arn)
            .ok_or(ConfigError::Missing(ENV_MANAGEMENT_ROLE))?;
        let member_role_name = non_empty(ENV_MEMBER_ROLE_NAME)
            .or(file.member_role_name)
            .ok_or(ConfigError::Missing(ENV_MEMBER_ROLE_NAME))?;

        if !management_role_arn.starts_with("arn:") {
            return Err(ConfigError::Invalid {
                key: ENV_MANAGEMENT_ROLE,
                reason: format!("expected a role ARN, got {management_role_arn}"),
            });
        }
        if member_role_name.is_empty() || member_role_name.contains(':') {
            return Err(ConfigError::Invalid {
                key: ENV_MEMBER_ROLE_NAME,
                reason: format!("expected a bare role name, got {member_role_name}"),
            });
        }

        Ok(Self {
            management_role_arn,
            member_role_name,
            session_name: non_empty(ENV_SESSION_NAME)
                .or(file.session_name)
                .unwrap_or_else(default_session_name),
            default_description: file.default_description.unwrap_or_else(default_description),
        })
    }

    /// Role to assume in `account` to write replicas.
    pub fn member_role_arn(&self, account: &AccountId) -> String {
        format!("arn:aws:iam::{}:role/{}", account, self.member_role_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_only() {
        let config = ShareConfig::resolve(
            PartialConfig::default(),
            env_from(&[
                (ENV_MANAGEMENT_ROLE, "arn:aws:iam::000000000001:role/org-reader"),
                (ENV_MEMBER_ROLE_NAME, "vault-writer"),
            ]),
        )
        .unwrap();
        assert_eq!(config.session_name, "secrets-vault");
        assert_eq!(config.default_description, DEFAULT_DESCRIPTION);
        let account = AccountId::parse("112233445566").unwrap();
        assert_eq!(
            config.member_role_arn(&account),
            "arn:aws:iam::112233445566:role/vault-writer"
        );
    }

    #[test]
    fn missing_member_role_is_reported() {
        let err = ShareConfig::resolve(
            PartialConfig::default(),
            env_from(&[(ENV_MANAGEMENT_ROLE, "arn:aws:iam::000000000001:role/org-reader")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_MEMBER_ROLE_NAME)));
    }

    #[test]
    fn env_overrides_file() {
        let yaml = r#"
management_role_arn: "arn:aws:iam::000000000001:role/from-file"
member_role_name: file-writer
default_description: Replicated from vault
"#;
        let config = ShareConfig::from_yaml_with_env(
            yaml,
            env_from(&[(ENV_MEMBER_ROLE_NAME, "env-writer")]),
        )
        .unwrap();
        assert_eq!(
            config.management_role_arn,
            "arn:aws:iam::000000000001:role/from-file"
        );
        assert_eq!(config.member_role_name, "env-writer");
        assert_eq!(config.default_description, "Replicated from vault");
    }

    #[test]
    fn rejects_role_arn_as_member_name() {
        let err = ShareConfig::resolve(
            PartialConfig::default(),
            env_from(&[
                (ENV_MANAGEMENT_ROLE, "arn:aws:iam::000000000001:role/org-reader"),
                (ENV_MEMBER_ROLE_NAME, "arn:aws:iam::1:role/x"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: ENV_MEMBER_ROLE_NAME,
                ..
            }
        ));
    }
}
