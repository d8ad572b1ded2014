//! Target resolution
//!
//! Turns a parameter's tag map into the set of accounts that should hold a
//! replica. Enabled direct-account tags short-circuit resolution; otherwise
//! root and unit tags are expanded through the organization hierarchy.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, Result, ShareError};
use crate::flag::ShareFlag;
use crate::parameter::TagMap;
use crate::ports::{AccountPages, CredentialBroker, OrgHierarchy};
use crate::target::{AccountId, TargetSet, TargetSpecifier};

pub struct TargetResolver<'a> {
    broker: &'a dyn CredentialBroker,
    management_role_arn: &'a str,
}

/// Enabled, classified tags of one tag map.
#[derive(Debug, Default, PartialEq, Eq)]
struct Selection {
    accounts: Vec<AccountId>,
    roots: Vec<String>,
    units: Vec<String>,
}

impl Selection {
    fn from_tags(tags: &TagMap) -> Self {
        let mut selection = Self::default();

        for (key, value) in tags {
            if !ShareFlag::parse(value).is_enabled() {
                warn!(tag_key = %key, tag_value = %value, "invalid tag value");
                continue;
            }

            match TargetSpecifier::classify(key) {
                TargetSpecifier::Account(account) => selection.accounts.push(account),
                TargetSpecifier::OrgRoot(root) => selection.roots.push(root),
                TargetSpecifier::OrgUnit(unit) => selection.units.push(unit),
                TargetSpecifier::Invalid(raw) => warn!(tag_key = %raw, "invalid tag key"),
            }
        }

        selection
    }
}

impl<'a> TargetResolver<'a> {
    pub fn new(broker: &'a dyn CredentialBroker, management_role_arn: &'a str) -> Self {
        Self {
            broker,
            management_role_arn,
        }
    }

    /// Resolve `tags` into replication targets, never including `source`.
    ///
    /// An enabled direct-account tag wins outright: the result is that one
    /// account and no root or unit tag is expanded. When several account tags
    /// are enabled, the first in key order is used.
    pub async fn resolve(&self, source: &AccountId, tags: &TagMap) -> Result<TargetSet> {
        let selection = Selection::from_tags(tags);

        if let Some((account, ignored)) = selection.accounts.split_first() {
            if !ignored.is_empty() || !selection.roots.is_empty() || !selection.units.is_empty() {
                warn!(
                    account = %account,
                    ignored_accounts = ignored.len(),
                    ignored_roots = selection.roots.len(),
                    ignored_units = selection.units.len(),
                    "direct account tag present, other targets ignored"
                );
            }
            let targets = TargetSet::new(source, [account.clone()]);
            debug!(%targets, "resolved direct account target");
            return Ok(targets);
        }

        if selection.roots.is_empty() && selection.units.is_empty() {
            return Ok(TargetSet::empty());
        }

        let hierarchy = self.hierarchy().await?;
        let mut accounts = Vec::new();

        // Every root spans the same organization; list it once.
        if let Some(root) = selection.roots.first() {
            info!(root = %root, "expanding organization root");
            let pages = hierarchy.list_all_accounts();
            collect_pages(pages, &mut accounts)
                .await
                .map_err(|e| ShareError::provider(format!("list accounts for {root}"), e))?;
        }

        for unit in &selection.units {
            info!(unit = %unit, "expanding organizational unit");
            let pages = hierarchy.list_accounts_under_unit(unit);
            match collect_pages(pages, &mut accounts).await {
                Ok(()) => {}
                Err(ProviderError::InvalidInput(reason)) => {
                    error!(unit = %unit, %reason, "invalid organizational unit tag");
                    return Err(ShareError::InvalidOrganizationalUnit(unit.clone()));
                }
                Err(e) => {
                    error!(unit = %unit, error = %e, "unexpected error listing unit");
                    return Err(ShareError::provider(format!("list accounts for {unit}"), e));
                }
            }
        }

        let targets = TargetSet::new(source, accounts);
        debug!(%targets, "resolved organization targets");
        Ok(targets)
    }

    async fn hierarchy(&self) -> Result<Arc<dyn OrgHierarchy>> {
        let session = self
            .broker
            .assume_role(self.management_role_arn)
            .await
            .map_err(|e| {
                ShareError::provider(
                    format!("assume management role {}", self.management_role_arn),
                    e,
                )
            })?;
        Ok(session.org_hierarchy())
    }
}

async fn collect_pages(
    mut pages: AccountPages<'_>,
    into: &mut Vec<AccountId>,
) -> std::result::Result<(), ProviderError> {
    while let Some(page) = pages.next().await {
        into.extend(page?);
    }
    Ok(())
}
