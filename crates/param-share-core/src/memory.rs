//! In-memory collaborators
//!
//! A fake multi-account cloud: one [`MemoryParameterStore`] per account, a
//! [`MemoryOrganization`] for hierarchy listing and a [`MemoryCloud`] broker
//! that hands out sessions for any `arn:aws:iam::<account>:role/<name>`.
//! Used by the tests and for local dry runs of recorded notifications.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;

use crate::error::ProviderError;
use crate::parameter::{ParameterMetadata, ParameterType, ParameterWrite, TagMap, WriteMode};
use crate::ports::{
    AccountPages, CredentialBroker, OrgHierarchy, ParameterStore, ProviderResult, ScopedSession,
};
use crate::target::AccountId;

const MEMORY_USER: &str = "arn:aws:iam::000000000000:user/memory";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredParameter {
    pub value: String,
    pub parameter_type: ParameterType,
    pub description: Option<String>,
    pub version: i64,
    pub tags: TagMap,
    pub last_modified_user: String,
    pub last_modified_at: DateTime<Utc>,
}

impl StoredParameter {
    pub fn new(value: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            value: value.into(),
            parameter_type,
            description: None,
            version: 1,
            tags: TagMap::new(),
            last_modified_user: MEMORY_USER.to_string(),
            last_modified_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn modified_by(mut self, user: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.last_modified_user = user.into();
        self.last_modified_at = at;
        self
    }

    fn metadata(&self) -> ParameterMetadata {
        ParameterMetadata {
            last_modified_user: self.last_modified_user.clone(),
            last_modified_at: self.last_modified_at,
            parameter_type: self.parameter_type,
            description: self.description.clone(),
            version: self.version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetValue,
    Describe,
    ListTags,
    Put,
    Delete,
    AddTags,
}

/// A recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub name: String,
    /// Write mode, for `Put` only.
    pub mode: Option<WriteMode>,
}

/// Parameter store of one account.
#[derive(Debug, Default)]
pub struct MemoryParameterStore {
    parameters: RwLock<BTreeMap<String, StoredParameter>>,
    failures: RwLock<HashMap<StoreOp, ProviderError>>,
    calls: RwLock<Vec<StoreCall>>,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, name: impl Into<String>, parameter: StoredParameter) {
        self.parameters.write().await.insert(name.into(), parameter);
    }

    pub async fn remove(&self, name: &str) -> Option<StoredParameter> {
        self.parameters.write().await.remove(name)
    }

    pub async fn get(&self, name: &str) -> Option<StoredParameter> {
        self.parameters.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.parameters.read().await.contains_key(name)
    }

    /// Every subsequent `op` fails with `error`.
    pub async fn fail_on(&self, op: StoreOp, error: ProviderError) {
        self.failures.write().await.insert(op, error);
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().await.clone()
    }

    async fn enter(&self, op: StoreOp, name: &str, mode: Option<WriteMode>) -> ProviderResult<()> {
        self.calls.write().await.push(StoreCall {
            op,
            name: name.to_string(),
            mode,
        });
        match self.failures.read().await.get(&op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn get_value(&self, name: &str) -> ProviderResult<String> {
        self.enter(StoreOp::GetValue, name, None).await?;
        self.parameters
            .read()
            .await
            .get(name)
            .map(|p| p.value.clone())
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))
    }

    async fn describe(&self, name: &str) -> ProviderResult<Option<ParameterMetadata>> {
        self.enter(StoreOp::Describe, name, None).await?;
        Ok(self.parameters.read().await.get(name).map(StoredParameter::metadata))
    }

    async fn list_tags(&self, name: &str) -> ProviderResult<TagMap> {
        self.enter(StoreOp::ListTags, name, None).await?;
        self.parameters
            .read()
            .await
            .get(name)
            .map(|p| p.tags.clone())
            .ok_or_else(|| ProviderError::InvalidResourceId(name.to_string()))
    }

    async fn put(&self, write: &ParameterWrite) -> ProviderResult<()> {
        self.enter(StoreOp::Put, &write.name, Some(write.mode)).await?;
        let mut parameters = self.parameters.write().await;

        match parameters.get_mut(&write.name) {
            Some(_) if !write.mode.overwrite() => {
                Err(ProviderError::AlreadyExists(write.name.clone()))
            }
            Some(existing) => {
                existing.value = write.value.clone();
                existing.parameter_type = write.parameter_type;
                existing.description = Some(write.description.clone());
                existing.version += 1;
                existing.last_modified_user = MEMORY_USER.to_string();
                existing.last_modified_at = Utc::now();
                Ok(())
            }
            None => {
                let parameter = StoredParameter::new(write.value.clone(), write.parameter_type)
                    .with_description(write.description.clone());
                parameters.insert(write.name.clone(), parameter);
                Ok(())
            }
        }
    }

    async fn delete(&self, name: &str) -> ProviderResult<()> {
        self.enter(StoreOp::Delete, name, None).await?;
        self.parameters
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))
    }

    async fn add_tags(&self, name: &str, tags: &TagMap) -> ProviderResult<()> {
        self.enter(StoreOp::AddTags, name, None).await?;
        let mut parameters = self.parameters.write().await;
        let parameter = parameters
            .get_mut(name)
            .ok_or_else(|| ProviderError::InvalidResourceId(name.to_string()))?;
        parameter
            .tags
            .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}

/// Organization with nested units. Listing is served in pages of `page_size`.
#[derive(Debug, Clone)]
pub struct MemoryOrganization {
    accounts: BTreeSet<AccountId>,
    units: BTreeMap<String, MemoryUnit>,
    page_size: usize,
}

#[derive(Debug, Clone, Default)]
struct MemoryUnit {
    accounts: Vec<AccountId>,
    children: Vec<String>,
}

impl Default for MemoryOrganization {
    fn default() -> Self {
        Self {
            accounts: BTreeSet::new(),
            units: BTreeMap::new(),
            page_size: 20,
        }
    }
}

impl MemoryOrganization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Account directly under the root.
    pub fn with_account(mut self, account: AccountId) -> Self {
        self.accounts.insert(account);
        self
    }

    pub fn with_unit<I>(mut self, unit_id: &str, accounts: I) -> Self
    where
        I: IntoIterator<Item = AccountId>,
    {
        let accounts: Vec<AccountId> = accounts.into_iter().collect();
        self.accounts.extend(accounts.iter().cloned());
        self.units
            .entry(unit_id.to_string())
            .or_default()
            .accounts
            .extend(accounts);
        self
    }

    pub fn with_child_unit<I>(self, parent_id: &str, unit_id: &str, accounts: I) -> Self
    where
        I: IntoIterator<Item = AccountId>,
    {
        let mut org = self.with_unit(unit_id, accounts);
        org.units
            .entry(parent_id.to_string())
            .or_default()
            .children
            .push(unit_id.to_string());
        org
    }

    fn collect_unit(&self, unit_id: &str, into: &mut Vec<AccountId>) {
        if let Some(unit) = self.units.get(unit_id) {
            into.extend(unit.accounts.iter().cloned());
            for child in &unit.children {
                self.collect_unit(child, into);
            }
        }
    }

    fn pages(&self, accounts: Vec<AccountId>) -> AccountPages<'_> {
        let pages: Vec<Vec<AccountId>> = accounts
            .chunks(self.page_size)
            .map(<[AccountId]>::to_vec)
            .collect();
        stream::iter(pages.into_iter().map(Ok)).boxed()
    }
}

impl OrgHierarchy for MemoryOrganization {
    fn list_all_accounts(&self) -> AccountPages<'_> {
        self.pages(self.accounts.iter().cloned().collect())
    }

    /// Unknown units are reported as malformed ids.
    fn list_accounts_under_unit<'a>(&'a self, unit_id: &'a str) -> AccountPages<'a> {
        if !self.units.contains_key(unit_id) {
            let error = ProviderError::InvalidInput(format!("invalid parent id {unit_id}"));
            return stream::once(async move { Err(error) }).boxed();
        }
        let mut accounts = Vec::new();
        self.collect_unit(unit_id, &mut accounts);
        self.pages(accounts)
    }
}

struct MemorySession {
    store: Arc<MemoryParameterStore>,
    organization: Arc<MemoryOrganization>,
}

impl ScopedSession for MemorySession {
    fn parameter_store(&self) -> Arc<dyn ParameterStore> {
        self.store.clone()
    }

    fn org_hierarchy(&self) -> Arc<dyn OrgHierarchy> {
        self.organization.clone()
    }
}

/// Credential broker over a set of in-memory accounts. Stores are created on
/// first use, so every well-formed role ARN can be assumed unless denied.
#[derive(Debug)]
pub struct MemoryCloud {
    organization: Arc<MemoryOrganization>,
    stores: RwLock<BTreeMap<AccountId, Arc<MemoryParameterStore>>>,
    denied: RwLock<BTreeSet<AccountId>>,
    assumed: RwLock<Vec<String>>,
}

impl MemoryCloud {
    pub fn new(organization: MemoryOrganization) -> Self {
        Self {
            organization: Arc::new(organization),
            stores: RwLock::new(BTreeMap::new()),
            denied: RwLock::new(BTreeSet::new()),
            assumed: RwLock::new(Vec::new()),
        }
    }

    pub async fn store(&self, account: &AccountId) -> Arc<MemoryParameterStore> {
        self.stores
            .write()
            .await
            .entry(account.clone())
            .or_default()
            .clone()
    }

    /// Role assumption into `account` fails with an access error.
    pub async fn deny(&self, account: &AccountId) {
        self.denied.write().await.insert(account.clone());
    }

    /// Role ARNs assumed so far, in order.
    pub async fn assumed_roles(&self) -> Vec<String> {
        self.assumed.read().await.clone()
    }
}

#[async_trait]
impl CredentialBroker for MemoryCloud {
    async fn assume_role(&self, role_arn: &str) -> ProviderResult<Arc<dyn ScopedSession>> {
        self.assumed.write().await.push(role_arn.to_string());

        let account = role_arn
            .split(':')
            .nth(4)
            .and_then(AccountId::parse)
            .ok_or_else(|| ProviderError::InvalidInput(format!("malformed role arn {role_arn}")))?;

        if self.denied.read().await.contains(&account) {
            return Err(ProviderError::unexpected(format!(
                "AccessDenied: not authorized to assume {role_arn}"
            )));
        }

        Ok(Arc::new(MemorySession {
            store: self.store(&account).await,
            organization: self.organization.clone(),
        }))
    }
}
