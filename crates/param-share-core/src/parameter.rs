//! Parameter data model
//!
//! The source parameter as seen through its resource identifier and metadata,
//! plus the provenance tags stamped onto every replica.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ShareError};
use crate::target::AccountId;

/// Tag key/value pairs attached to a parameter.
pub type TagMap = BTreeMap<String, String>;

/// Description written to replicas when the source has none.
pub const DEFAULT_DESCRIPTION: &str = "Shared secret";

/// Timestamp layout used for the `last-modified-at` provenance tag.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ%z";

pub const TAG_SHARED_FROM: &str = "shared-from";
pub const TAG_LAST_MODIFIED_BY: &str = "last-modified-by";
pub const TAG_LAST_MODIFIED_AT: &str = "last-modified-at";

const PARAMETER_MARKER: &str = ":parameter";

/// Resource identifier of the source parameter.
///
/// `arn:aws:ssm:<region>:<account>:parameter/<name>`; the name keeps its
/// leading slash so it can be used verbatim in the target stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterArn {
    raw: String,
    account: AccountId,
    name: String,
}

impl ParameterArn {
    pub fn parse(raw: &str) -> Result<Self, ShareError> {
        let account = raw
            .split(':')
            .nth(4)
            .and_then(AccountId::parse)
            .ok_or_else(|| {
                ShareError::MalformedEvent(format!("no account id in resource {raw}"))
            })?;

        let name = raw
            .rsplit_once(PARAMETER_MARKER)
            .map(|(_, name)| name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                ShareError::MalformedEvent(format!("no parameter name in resource {raw}"))
            })?;

        Ok(Self {
            raw: raw.to_string(),
            account,
            name: name.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ParameterArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    String,
    SecureString,
    StringList,
}

impl ParameterType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::SecureString => "SecureString",
            Self::StringList => "StringList",
        }
    }
}

impl FromStr for ParameterType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "String" => Ok(Self::String),
            "SecureString" => Ok(Self::SecureString),
            "StringList" => Ok(Self::StringList),
            other => Err(ProviderError::unexpected(format!(
                "unknown parameter type {other}"
            ))),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of describing the source parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMetadata {
    pub last_modified_user: String,
    pub last_modified_at: DateTime<Utc>,
    pub parameter_type: ParameterType,
    pub description: Option<String>,
    pub version: i64,
}

impl ParameterMetadata {
    pub fn is_first_version(&self) -> bool {
        self.version == 1
    }
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Tags pointing a replica back at its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceTags {
    pub shared_from: String,
    pub last_modified_by: String,
    pub last_modified_at: String,
}

impl ProvenanceTags {
    pub fn new(arn: &ParameterArn, metadata: &ParameterMetadata) -> Self {
        Self {
            shared_from: arn.as_str().to_string(),
            last_modified_by: metadata.last_modified_user.clone(),
            last_modified_at: format_timestamp(&metadata.last_modified_at),
        }
    }

    pub fn to_tag_map(&self) -> TagMap {
        TagMap::from([
            (TAG_SHARED_FROM.to_string(), self.shared_from.clone()),
            (TAG_LAST_MODIFIED_BY.to_string(), self.last_modified_by.clone()),
            (TAG_LAST_MODIFIED_AT.to_string(), self.last_modified_at.clone()),
        ])
    }
}

/// Everything a replica needs except the secret value, which is fetched
/// only when a write actually happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaTemplate {
    pub name: String,
    pub parameter_type: ParameterType,
    pub description: String,
    pub provenance: ProvenanceTags,
}

impl ReplicaTemplate {
    /// `default_description` stands in when the source has no description.
    pub fn new(arn: &ParameterArn, metadata: &ParameterMetadata, default_description: &str) -> Self {
        Self {
            name: arn.name().to_string(),
            parameter_type: metadata.parameter_type,
            description: metadata
                .description
                .clone()
                .unwrap_or_else(|| default_description.to_string()),
            provenance: ProvenanceTags::new(arn, metadata),
        }
    }
}

/// How `ParameterStore::put` treats an existing parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    CreateOnly,
}

impl WriteMode {
    pub fn overwrite(self) -> bool {
        matches!(self, Self::Overwrite)
    }
}

/// A single parameter write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterWrite {
    pub name: String,
    pub value: String,
    pub parameter_type: ParameterType,
    pub description: String,
    pub mode: WriteMode,
}

impl ParameterWrite {
    pub fn from_template(template: &ReplicaTemplate, value: &str, mode: WriteMode) -> Self {
        Self {
            name: template.name.clone(),
            value: value.to_string(),
            parameter_type: template.parameter_type,
            description: template.description.clone(),
            mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ARN: &str = "arn:aws:ssm:eu-west-2:999999999999:parameter/db/password";

    fn metadata(description: Option<&str>) -> ParameterMetadata {
        ParameterMetadata {
            last_modified_user: "arn:aws:iam::999999999999:user/alice".into(),
            last_modified_at: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
            parameter_type: ParameterType::SecureString,
            description: description.map(str::to_string),
            version: 3,
        }
    }

    #[test]
    fn arn_parses_account_and_name() {
        let arn = ParameterArn::parse(ARN).unwrap();
        assert_eq!(arn.account().as_str(), "999999999999");
        assert_eq!(arn.name(), "/db/password");
        assert_eq!(arn.to_string(), ARN);
    }

    #[test]
    fn arn_without_parameter_marker_is_malformed() {
        let err = ParameterArn::parse("arn:aws:ssm:eu-west-2:999999999999:document/x").unwrap_err();
        assert!(matches!(err, ShareError::MalformedEvent(_)));
    }

    #[test]
    fn arn_without_account_is_malformed() {
        let err = ParameterArn::parse("arn:aws:ssm:eu-west-2::parameter/x").unwrap_err();
        assert!(matches!(err, ShareError::MalformedEvent(_)));
    }

    #[test]
    fn parameter_type_round_trips_wire_names() {
        for ty in [
            ParameterType::String,
            ParameterType::SecureString,
            ParameterType::StringList,
        ] {
            assert_eq!(ty.as_str().parse::<ParameterType>().unwrap(), ty);
        }
        assert!("Binary".parse::<ParameterType>().is_err());
    }

    #[test]
    fn replica_template_keeps_source_description() {
        let arn = ParameterArn::parse(ARN).unwrap();
        let template = ReplicaTemplate::new(&arn, &metadata(Some("db creds")), DEFAULT_DESCRIPTION);
        assert_eq!(template.description, "db creds");
    }

    #[test]
    fn replica_template_uses_configured_default_description() {
        let arn = ParameterArn::parse(ARN).unwrap();
        let template = ReplicaTemplate::new(&arn, &metadata(None), "Replicated from vault");
        assert_eq!(template.description, "Replicated from vault");
    }

    #[test]
    fn provenance_tags_render_timestamp() {
        let arn = ParameterArn::parse(ARN).unwrap();
        let tags = ProvenanceTags::new(&arn, &metadata(None)).to_tag_map();
        assert_eq!(tags[TAG_SHARED_FROM], ARN);
        assert_eq!(
            tags[TAG_LAST_MODIFIED_BY],
            "arn:aws:iam::999999999999:user/alice"
        );
        assert_eq!(tags[TAG_LAST_MODIFIED_AT], "2024-03-09T14-05-07Z+0000");
    }

    #[test]
    fn replica_template_carries_source_shape() {
        let arn = ParameterArn::parse(ARN).unwrap();
        let template =
            ReplicaTemplate::new(&arn, &metadata(Some("db creds")), DEFAULT_DESCRIPTION);
        let write = ParameterWrite::from_template(&template, "s3cr3t", WriteMode::CreateOnly);
        assert_eq!(write.name, "/db/password");
        assert_eq!(write.parameter_type, ParameterType::SecureString);
        assert_eq!(write.description, "db creds");
        assert!(!write.mode.overwrite());
    }
}
