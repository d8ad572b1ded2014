//! Shared fixture: a vault account, a small organization and a dispatcher
//! wired to the in-memory cloud.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use param_share_core::event::{NotificationDetail, DETAIL_TYPE_PARAMETER_CHANGE, DETAIL_TYPE_TAG_CHANGE};
use param_share_core::memory::{MemoryCloud, MemoryOrganization, MemoryParameterStore, StoredParameter};
use param_share_core::{AccountId, EventDispatcher, Notification, ParameterType, ShareConfig, TagMap};

pub const VAULT: &str = "999999999999";
pub const NAME: &str = "/team/db/password";
pub const MANAGEMENT_ROLE: &str = "arn:aws:iam::000000000001:role/org-reader";
pub const MEMBER_ROLE: &str = "vault-writer";

pub const UNIT: &str = "ou-abc123";
pub const NESTED_UNIT: &str = "ou-abc123-nested01";
pub const OTHER_UNIT: &str = "ou-def456";

pub fn acct(id: &str) -> AccountId {
    AccountId::parse(id).unwrap()
}

pub fn arn() -> String {
    format!("arn:aws:ssm:eu-west-2:{VAULT}:parameter{NAME}")
}

pub fn tags(pairs: &[(&str, &str)]) -> TagMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Organization:
/// - `ou-abc123`: 111111111111, 222222222222, vault; nested unit with 333333333333
/// - `ou-def456`: 444444444444, 222222222222
/// - root only: 555555555555
pub fn organization() -> MemoryOrganization {
    MemoryOrganization::new()
        .with_page_size(2)
        .with_unit(UNIT, [acct("111111111111"), acct("222222222222"), acct(VAULT)])
        .with_child_unit(UNIT, NESTED_UNIT, [acct("333333333333")])
        .with_unit(OTHER_UNIT, [acct("444444444444"), acct("222222222222")])
        .with_account(acct("555555555555"))
}

pub fn tag_change(current: TagMap, changed: &[&str]) -> Notification {
    Notification {
        detail_type: DETAIL_TYPE_TAG_CHANGE.to_string(),
        resources: vec![arn()],
        detail: NotificationDetail {
            tags: current,
            changed_tag_keys: changed.iter().map(|k| k.to_string()).collect(),
        },
    }
}

pub fn value_change() -> Notification {
    Notification {
        detail_type: DETAIL_TYPE_PARAMETER_CHANGE.to_string(),
        resources: vec![arn()],
        detail: NotificationDetail::default(),
    }
}

pub struct Fixture {
    pub cloud: Arc<MemoryCloud>,
    pub vault: Arc<MemoryParameterStore>,
    pub dispatcher: EventDispatcher,
}

impl Fixture {
    pub async fn new() -> Self {
        let cloud = Arc::new(MemoryCloud::new(organization()));
        let vault = cloud.store(&acct(VAULT)).await;
        let dispatcher = EventDispatcher::new(
            vault.clone(),
            cloud.clone(),
            ShareConfig::new(MANAGEMENT_ROLE, MEMBER_ROLE),
        );
        Self {
            cloud,
            vault,
            dispatcher,
        }
    }

    /// Seed the vault with the source parameter.
    pub async fn with_source(self, version: i64, source_tags: TagMap) -> Self {
        let mut parameter = StoredParameter::new("s3cr3t", ParameterType::SecureString)
            .with_description("primary db credentials")
            .with_version(version)
            .modified_by(
                "arn:aws:iam::999999999999:user/alice",
                Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
            );
        parameter.tags = source_tags;
        self.vault.insert(NAME, parameter).await;
        self
    }

    pub async fn replica(&self, account: &str) -> Option<StoredParameter> {
        self.cloud.store(&acct(account)).await.get(NAME).await
    }

    pub async fn store(&self, account: &str) -> Arc<MemoryParameterStore> {
        self.cloud.store(&acct(account)).await
    }
}
