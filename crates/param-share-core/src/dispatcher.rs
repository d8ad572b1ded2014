//! Event dispatch
//!
//! Top-level state machine for one invocation. Each notification is
//! classified, the source parameter is described, the tag delta is turned
//! into target sets and the matching propagation runs. No state survives
//! between invocations.
//!
//! | Event                        | Action                                        |
//! |------------------------------|-----------------------------------------------|
//! | tag change, version 1        | create on targets of the full tag map         |
//! | tag change, no tags left     | delete on targets of the changed keys         |
//! | tag change, otherwise        | tag refresh on added keys, delete on removed  |
//! | parameter value change       | overwrite on targets of the current tags      |

use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use crate::config::ShareConfig;
use crate::error::{ProviderError, Result, ShareError};
use crate::event::{classify_tag_change, Event, EventKind, Notification, TagChange};
use crate::parameter::{ParameterMetadata, ReplicaTemplate, TagMap};
use crate::ports::{CredentialBroker, ParameterStore};
use crate::propagator::{PropagationReport, Propagator, SourceValue};
use crate::resolver::TargetResolver;
use crate::target::TargetSet;

/// Why an invocation ended early without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The source parameter was deleted before the event was processed.
    ParameterGone(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(PropagationReport),
    Deleted(PropagationReport),
    Modified {
        updated: Option<PropagationReport>,
        removed: Option<PropagationReport>,
    },
    Repropagated(PropagationReport),
    Skipped(SkipReason),
    /// Tag change without changed keys.
    Unchanged,
}

pub struct EventDispatcher {
    source: Arc<dyn ParameterStore>,
    broker: Arc<dyn CredentialBroker>,
    config: ShareConfig,
}

impl EventDispatcher {
    /// `source` is the parameter store of the account owning the parameters.
    pub fn new(
        source: Arc<dyn ParameterStore>,
        broker: Arc<dyn CredentialBroker>,
        config: ShareConfig,
    ) -> Self {
        Self {
            source,
            broker,
            config,
        }
    }

    pub async fn handle_json(&self, json: &str) -> Result<Outcome> {
        let event = Event::from_json(json)?;
        self.handle(&event).await
    }

    pub async fn handle_notification(&self, notification: Notification) -> Result<Outcome> {
        let event = Event::try_from(notification)?;
        self.handle(&event).await
    }

    /// Process one event. A parameter deleted mid-flight ends the invocation
    /// successfully with [`Outcome::Skipped`].
    pub async fn handle(&self, event: &Event) -> Result<Outcome> {
        let span = info_span!(
            "invocation",
            event_type = event.kind.as_str(),
            parameter = %event.parameter.name(),
        );

        let result = async {
            info!(
                resource = %event.parameter,
                tags = ?event.tags,
                changed_tag_keys = ?event.changed_tag_keys,
                "received event"
            );
            match event.kind {
                EventKind::TagChange => self.on_tag_change(event).await,
                EventKind::ParameterValueChange => self.on_value_change(event).await,
            }
        }
        .instrument(span)
        .await;

        match result {
            Err(ShareError::ParameterGone(name)) => {
                Ok(Outcome::Skipped(SkipReason::ParameterGone(name)))
            }
            other => other,
        }
    }

    async fn on_tag_change(&self, event: &Event) -> Result<Outcome> {
        let name = event.parameter.name();
        let metadata = self.describe(name).await?;
        let change = classify_tag_change(
            metadata.as_ref().map(ParameterMetadata::is_first_version),
            &event.tags,
            &event.changed_tag_keys,
        );

        match (change, metadata) {
            (TagChange::Created, Some(metadata)) => {
                info!(version = metadata.version, "parameter created");
                let template = self.template(event, &metadata);
                let mut source_value = SourceValue::lazy(self.source.as_ref(), name);
                let value = source_value.get().await?;
                let targets = self.resolve(event, &event.tags).await?;
                let report = self.propagator().create_or_update(&targets, &template, value).await?;
                Ok(Outcome::Created(report))
            }
            (TagChange::Deleted { removed }, _) => {
                info!("parameter deleted or untagged");
                let targets = self.resolve(event, &removed).await?;
                let report = self.propagator().delete(&targets, name).await?;
                Ok(Outcome::Deleted(report))
            }
            (TagChange::Modified { added, removed }, Some(metadata)) => {
                info!(added = ?added, removed = ?removed, "parameter tags modified");
                let template = self.template(event, &metadata);

                let updated = if added.is_empty() {
                    None
                } else {
                    let targets = self.resolve(event, &added).await?;
                    let mut source_value = SourceValue::lazy(self.source.as_ref(), name);
                    Some(
                        self.propagator()
                            .update_tags_only(&targets, &template, &mut source_value)
                            .await?,
                    )
                };

                let removed = if removed.is_empty() {
                    None
                } else {
                    let targets = self.resolve(event, &removed).await?;
                    Some(self.propagator().delete(&targets, name).await?)
                };

                Ok(Outcome::Modified { updated, removed })
            }
            (TagChange::Unchanged, _) => {
                info!("no changed tag keys, nothing to do");
                Ok(Outcome::Unchanged)
            }
            (TagChange::Created | TagChange::Modified { .. }, None) => {
                Err(self.gone(name))
            }
        }
    }

    /// Overwrite converges value and provenance on every currently tagged target.
    async fn on_value_change(&self, event: &Event) -> Result<Outcome> {
        let name = event.parameter.name();
        let Some(metadata) = self.describe(name).await? else {
            return Err(self.gone(name));
        };

        let tags = match self.source.list_tags(name).await {
            Ok(tags) => tags,
            Err(ProviderError::NotFound(_) | ProviderError::InvalidResourceId(_)) => {
                return Err(self.gone(name));
            }
            Err(e) => return Err(ShareError::provider(format!("list tags of {name}"), e)),
        };
        info!(tags = ?tags, "parameter tags");

        let template = self.template(event, &metadata);
        let mut source_value = SourceValue::lazy(self.source.as_ref(), name);
        let value = source_value.get().await?;
        let targets = self.resolve(event, &tags).await?;
        let report = self.propagator().create_or_update(&targets, &template, value).await?;
        Ok(Outcome::Repropagated(report))
    }

    async fn describe(&self, name: &str) -> Result<Option<ParameterMetadata>> {
        let metadata = self
            .source
            .describe(name)
            .await
            .map_err(|e| ShareError::provider(format!("describe {name}"), e))?;
        if let Some(metadata) = &metadata {
            info!(
                last_modified_user = %metadata.last_modified_user,
                last_modified_at = %metadata.last_modified_at,
                parameter_type = %metadata.parameter_type,
                version = metadata.version,
                "described parameter"
            );
        }
        Ok(metadata)
    }

    async fn resolve(&self, event: &Event, tags: &TagMap) -> Result<TargetSet> {
        let targets = TargetResolver::new(self.broker.as_ref(), &self.config.management_role_arn)
            .resolve(event.parameter.account(), tags)
            .await?;
        info!(%targets, "sharing targets");
        Ok(targets)
    }

    fn template(&self, event: &Event, metadata: &ParameterMetadata) -> ReplicaTemplate {
        ReplicaTemplate::new(&event.parameter, metadata, &self.config.default_description)
    }

    fn propagator(&self) -> Propagator<'_> {
        Propagator::new(self.broker.as_ref(), &self.config)
    }

    fn gone(&self, name: &str) -> ShareError {
        warn!(parameter = %name, "parameter no longer exists, skipping event");
        ShareError::ParameterGone(name.to_string())
    }
}
