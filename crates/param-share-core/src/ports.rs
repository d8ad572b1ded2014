//! Collaborator ports
//!
//! The engine talks to the outside world exclusively through these traits,
//! so the same resolution and dispatch logic runs against the cloud
//! providers (`param-share-aws`) and the in-memory doubles in [`crate::memory`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ProviderError;
use crate::parameter::{ParameterMetadata, ParameterWrite, TagMap};
use crate::target::AccountId;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// One page of account ids from a hierarchy listing.
pub type AccountPage = ProviderResult<Vec<AccountId>>;

/// Lazily produced pages of account ids. Every listing call starts a fresh
/// stream; dropping it stops further page fetches.
pub type AccountPages<'a> = BoxStream<'a, AccountPage>;

/// Parameter store of a single account.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Decrypted value. Fails with `NotFound` if the parameter is gone.
    async fn get_value(&self, name: &str) -> ProviderResult<String>;

    /// Metadata, or `None` if the parameter no longer exists.
    async fn describe(&self, name: &str) -> ProviderResult<Option<ParameterMetadata>>;

    async fn list_tags(&self, name: &str) -> ProviderResult<TagMap>;

    /// Fails with `AlreadyExists` for a create-only write of an existing parameter.
    async fn put(&self, write: &ParameterWrite) -> ProviderResult<()>;

    /// Fails with `NotFound` if there is nothing to delete.
    async fn delete(&self, name: &str) -> ProviderResult<()>;

    /// Adds or overwrites tags. Fails with `InvalidResourceId` if the parameter is absent.
    async fn add_tags(&self, name: &str, tags: &TagMap) -> ProviderResult<()>;
}

/// Organization account listing.
pub trait OrgHierarchy: Send + Sync {
    fn list_all_accounts(&self) -> AccountPages<'_>;

    /// Every account under `unit_id`, nested units included. A malformed id
    /// surfaces as an `InvalidInput` page error.
    fn list_accounts_under_unit<'a>(&'a self, unit_id: &'a str) -> AccountPages<'a>;
}

/// Credentials scoped to one assumed role.
pub trait ScopedSession: Send + Sync {
    fn parameter_store(&self) -> Arc<dyn ParameterStore>;

    fn org_hierarchy(&self) -> Arc<dyn OrgHierarchy>;
}

#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn assume_role(&self, role_arn: &str) -> ProviderResult<Arc<dyn ScopedSession>>;
}
