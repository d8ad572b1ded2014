//! Param Share - tag-driven cross-account parameter replication
//!
//! A parameter in the vault account is replicated into every account its
//! tags select, and its replicas follow it as its value, tags or existence
//! change. Each change notification is one self-contained invocation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Notification (tag change / parameter value change)          │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       EventDispatcher                        │
//! │      classify → describe source → compute tag delta          │
//! └──────────────────────────────────────────────────────────────┘
//!                  │                               │
//!                  ▼                               ▼
//! ┌──────────────────────────────┐  ┌────────────────────────────┐
//! │        TargetResolver        │  │         Propagator         │
//! │  tags → accounts             │  │  create / delete / retag   │
//! │  (OrgHierarchy)              │  │  per target (broker)       │
//! └──────────────────────────────┘  └────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use param_share_core::{EventDispatcher, ShareConfig};
//!
//! let dispatcher = EventDispatcher::new(source_store, broker, ShareConfig::from_env()?);
//! let outcome = dispatcher.handle_json(&notification_json).await?;
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod flag;
pub mod memory;
pub mod parameter;
pub mod ports;
pub mod propagator;
pub mod resolver;
pub mod target;

pub use config::ShareConfig;
pub use dispatcher::{EventDispatcher, Outcome, SkipReason};
pub use error::{ConfigError, ProviderError, ShareError};
pub use event::{Event, EventKind, Notification, TagChange};
pub use flag::ShareFlag;
pub use parameter::{
    ParameterArn, ParameterMetadata, ParameterType, ParameterWrite, ProvenanceTags,
    ReplicaTemplate, TagMap, WriteMode,
};
pub use ports::{AccountPages, CredentialBroker, OrgHierarchy, ParameterStore, ScopedSession};
pub use propagator::{PropagationReport, Propagator, SourceValue, TargetOutcome};
pub use resolver::TargetResolver;
pub use target::{AccountId, TargetSet, TargetSpecifier};
