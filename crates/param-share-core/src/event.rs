//! Change notifications
//!
//! Wire shape of the notifications that drive replication and the
//! classification of tag changes into created / deleted / modified.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ShareError;
use crate::parameter::{ParameterArn, TagMap};

pub const DETAIL_TYPE_TAG_CHANGE: &str = "Tag Change on Resource";
pub const DETAIL_TYPE_PARAMETER_CHANGE: &str = "Parameter Store Change";

/// Notification as delivered by the event bus. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub detail: NotificationDetail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDetail {
    #[serde(default)]
    pub tags: TagMap,
    #[serde(default, rename = "changed-tag-keys")]
    pub changed_tag_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    TagChange,
    ParameterValueChange,
}

impl EventKind {
    pub fn from_detail_type(detail_type: &str) -> Result<Self, ShareError> {
        match detail_type {
            DETAIL_TYPE_TAG_CHANGE => Ok(Self::TagChange),
            DETAIL_TYPE_PARAMETER_CHANGE => Ok(Self::ParameterValueChange),
            other => Err(ShareError::UnknownEventType(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TagChange => DETAIL_TYPE_TAG_CHANGE,
            Self::ParameterValueChange => DETAIL_TYPE_PARAMETER_CHANGE,
        }
    }
}

/// A validated notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub parameter: ParameterArn,
    pub tags: TagMap,
    pub changed_tag_keys: Vec<String>,
}

impl TryFrom<Notification> for Event {
    type Error = ShareError;

    fn try_from(notification: Notification) -> Result<Self, Self::Error> {
        let kind = EventKind::from_detail_type(&notification.detail_type)?;
        let resource = notification
            .resources
            .first()
            .ok_or_else(|| ShareError::MalformedEvent("no resources in event".into()))?;
        let parameter = ParameterArn::parse(resource)?;

        Ok(Self {
            kind,
            parameter,
            tags: notification.detail.tags,
            changed_tag_keys: notification.detail.changed_tag_keys,
        })
    }
}

impl Event {
    pub fn from_json(json: &str) -> Result<Self, ShareError> {
        let notification: Notification = serde_json::from_str(json)
            .map_err(|e| ShareError::MalformedEvent(e.to_string()))?;
        notification.try_into()
    }
}

/// What a tag change means for the replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagChange {
    /// First version of the parameter: share using the full tag map.
    Created,
    /// No tags left: every changed key counts as previously enabled.
    Deleted { removed: TagMap },
    /// Keys still present were added or changed; keys now absent were removed.
    Modified { added: TagMap, removed: TagMap },
    /// Nothing changed.
    Unchanged,
}

/// Classify a tag change. `first_version` is `None` when the parameter no
/// longer exists, which rules out `Created`.
pub fn classify_tag_change(
    first_version: Option<bool>,
    tags: &TagMap,
    changed_tag_keys: &[String],
) -> TagChange {
    if first_version == Some(true) {
        return TagChange::Created;
    }

    if tags.is_empty() {
        return TagChange::Deleted {
            removed: assume_enabled(changed_tag_keys),
        };
    }

    if changed_tag_keys.is_empty() {
        return TagChange::Unchanged;
    }

    let mut added = TagMap::new();
    let mut removed = BTreeSet::new();
    for key in changed_tag_keys {
        match tags.get(key) {
            Some(value) => {
                added.insert(key.clone(), value.clone());
            }
            None => {
                removed.insert(key.clone());
            }
        }
    }

    TagChange::Modified {
        added,
        removed: assume_enabled(removed.iter()),
    }
}

/// Keys that are gone no longer carry a value; treat them as having been shared.
fn assume_enabled<I, S>(keys: I) -> TagMap
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter()
        .map(|key| (key.as_ref().to_string(), "true".to_string()))
        .collect()
}
