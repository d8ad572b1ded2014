//! Replica propagation
//!
//! Applies a desired end state to every account of a [`TargetSet`], one
//! target at a time. Per-target conflicts (replica already present, replica
//! already gone) are logged and skipped; anything else aborts the remaining
//! targets and surfaces to the caller.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::ShareConfig;
use crate::error::{ProviderError, Result, ShareError};
use crate::parameter::{ParameterWrite, ReplicaTemplate, WriteMode};
use crate::ports::{CredentialBroker, ParameterStore};
use crate::target::{AccountId, TargetSet};

/// What happened at one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutcome {
    /// Value written and provenance tags attached.
    Shared,
    /// Provenance tags refreshed on an existing replica.
    TagsUpdated,
    /// Tag refresh found no replica, so one was created.
    Bootstrapped,
    /// Create-only write hit an existing replica; left untouched.
    AlreadyShared,
    Deleted,
    /// Nothing to delete.
    AlreadyGone,
}

impl fmt::Display for TargetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Shared => "shared",
            Self::TagsUpdated => "tags_updated",
            Self::Bootstrapped => "bootstrapped",
            Self::AlreadyShared => "already_shared",
            Self::Deleted => "deleted",
            Self::AlreadyGone => "already_gone",
        };
        f.write_str(label)
    }
}

/// Per-target results of one propagation, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    entries: Vec<(AccountId, TargetOutcome)>,
}

impl PropagationReport {
    fn record(&mut self, account: &AccountId, outcome: TargetOutcome) {
        self.entries.push((account.clone(), outcome));
    }

    pub fn entries(&self) -> &[(AccountId, TargetOutcome)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn outcome_for(&self, account: &AccountId) -> Option<TargetOutcome> {
        self.entries
            .iter()
            .find(|(a, _)| a == account)
            .map(|(_, outcome)| *outcome)
    }

    pub fn count(&self, outcome: TargetOutcome) -> usize {
        self.entries.iter().filter(|(_, o)| *o == outcome).count()
    }
}

/// Source value fetched at most once, on first use.
pub struct SourceValue<'a> {
    store: &'a dyn ParameterStore,
    name: &'a str,
    cached: Option<String>,
}

impl<'a> SourceValue<'a> {
    pub fn lazy(store: &'a dyn ParameterStore, name: &'a str) -> Self {
        Self {
            store,
            name,
            cached: None,
        }
    }

    /// Fetch now. `NotFound` means the parameter was deleted under us and
    /// maps to [`ShareError::ParameterGone`].
    pub async fn get(&mut self) -> Result<&str> {
        if self.cached.is_none() {
            let value = match self.store.get_value(self.name).await {
                Ok(value) => value,
                Err(ProviderError::NotFound(_)) => {
                    warn!(parameter = %self.name, "parameter's likely been deleted, skipping event");
                    return Err(ShareError::ParameterGone(self.name.to_string()));
                }
                Err(e) => {
                    error!(parameter = %self.name, error = %e, "failed to read parameter value");
                    return Err(ShareError::provider(format!("get value of {}", self.name), e));
                }
            };
            debug!(parameter = %self.name, "retrieved parameter value");
            self.cached = Some(value);
        }
        Ok(self.cached.as_deref().unwrap_or_default())
    }
}

pub struct Propagator<'a> {
    broker: &'a dyn CredentialBroker,
    config: &'a ShareConfig,
}

impl<'a> Propagator<'a> {
    pub fn new(broker: &'a dyn CredentialBroker, config: &'a ShareConfig) -> Self {
        Self { broker, config }
    }

    /// Write the replica (overwriting) and attach provenance tags on every target.
    pub async fn create_or_update(
        &self,
        targets: &TargetSet,
        template: &ReplicaTemplate,
        value: &str,
    ) -> Result<PropagationReport> {
        let mut report = PropagationReport::default();

        for target in targets {
            let outcome = async {
                let store = self.store_for(target).await?;
                self.write_replica(store.as_ref(), target, template, value, WriteMode::Overwrite)
                    .await
            }
            .instrument(info_span!("target", account = %target, op = "create_or_update"))
            .await?;
            report.record(target, outcome);
        }

        Ok(report)
    }

    /// Remove the replica from every target.
    pub async fn delete(&self, targets: &TargetSet, name: &str) -> Result<PropagationReport> {
        let mut report = PropagationReport::default();

        for target in targets {
            let outcome = async {
                let store = self.store_for(target).await?;
                match store.delete(name).await {
                    Ok(()) => {
                        info!(account = %target, "deleted from target");
                        Ok(TargetOutcome::Deleted)
                    }
                    Err(ProviderError::NotFound(_)) => {
                        debug!(account = %target, "replica already absent");
                        Ok(TargetOutcome::AlreadyGone)
                    }
                    Err(e) => {
                        error!(account = %target, error = %e, "unexpected error deleting replica");
                        Err(ShareError::provider(format!("delete {name} in {target}"), e))
                    }
                }
            }
            .instrument(info_span!("target", account = %target, op = "delete"))
            .await?;
            report.record(target, outcome);
        }

        Ok(report)
    }

    /// Refresh provenance tags only. A target without a replica was never
    /// shared with, so it gets a full create-only write instead.
    pub async fn update_tags_only(
        &self,
        targets: &TargetSet,
        template: &ReplicaTemplate,
        source: &mut SourceValue<'_>,
    ) -> Result<PropagationReport> {
        let mut report = PropagationReport::default();
        let tags = template.provenance.to_tag_map();

        for target in targets {
            let span = info_span!("target", account = %target, op = "update_tags_only");
            let store = self.store_for(target).instrument(span.clone()).await?;

            let outcome = match store.add_tags(&template.name, &tags).instrument(span.clone()).await {
                Ok(()) => {
                    span.in_scope(|| info!(account = %target, "updated tags in target"));
                    TargetOutcome::TagsUpdated
                }
                Err(ProviderError::InvalidResourceId(_)) => {
                    span.in_scope(|| info!(account = %target, "no replica in target, sharing"));
                    let value = source.get().await?;
                    let written = self
                        .write_replica(store.as_ref(), target, template, value, WriteMode::CreateOnly)
                        .instrument(span.clone())
                        .await?;
                    match written {
                        TargetOutcome::Shared => TargetOutcome::Bootstrapped,
                        other => other,
                    }
                }
                Err(e) => {
                    span.in_scope(|| {
                        error!(account = %target, error = %e, "unexpected error updating tags")
                    });
                    return Err(ShareError::provider(
                        format!("tag {} in {target}", template.name),
                        e,
                    ));
                }
            };
            report.record(target, outcome);
        }

        Ok(report)
    }

    async fn store_for(&self, target: &AccountId) -> Result<Arc<dyn ParameterStore>> {
        let role_arn = self.config.member_role_arn(target);
        let session = self.broker.assume_role(&role_arn).await.map_err(|e| {
            error!(account = %target, role = %role_arn, error = %e, "failed to assume member role");
            ShareError::provider(format!("assume {role_arn}"), e)
        })?;
        debug!(role = %role_arn, "assumed member role");
        Ok(session.parameter_store())
    }

    /// The overwrite write cannot carry tags, so provenance goes on in a second call.
    async fn write_replica(
        &self,
        store: &dyn ParameterStore,
        target: &AccountId,
        template: &ReplicaTemplate,
        value: &str,
        mode: WriteMode,
    ) -> Result<TargetOutcome> {
        let write = ParameterWrite::from_template(template, value, mode);

        match store.put(&write).await {
            Ok(()) => {}
            Err(ProviderError::AlreadyExists(reason)) => {
                error!(account = %target, %reason, "failed to share with target");
                return Ok(TargetOutcome::AlreadyShared);
            }
            Err(e) => {
                error!(account = %target, error = %e, "unexpected error writing replica");
                return Err(ShareError::provider(
                    format!("put {} in {target}", template.name),
                    e,
                ));
            }
        }

        store
            .add_tags(&template.name, &template.provenance.to_tag_map())
            .await
            .map_err(|e| {
                error!(account = %target, error = %e, "unexpected error tagging replica");
                ShareError::provider(format!("tag {} in {target}", template.name), e)
            })?;

        info!(account = %target, "shared with target");
        Ok(TargetOutcome::Shared)
    }
}
