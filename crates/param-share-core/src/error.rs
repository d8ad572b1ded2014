use thiserror::Error;

/// Error kinds reported by the collaborators (parameter store, credential
/// broker, organization hierarchy).
///
/// The engine decides per-target versus per-invocation handling by matching
/// on the kind, never on the message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid resource id: {0}")]
    InvalidResourceId(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unexpected provider error: {0}")]
    Unexpected(String),
}

impl ProviderError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

/// Fatal (and internal) failures of one invocation.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("invalid organizational unit tag: {0}")]
    InvalidOrganizationalUnit(String),

    #[error("invalid event type: {0}")]
    UnknownEventType(String),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The source parameter disappeared between notification and processing.
    /// The dispatcher turns this into a successful skip.
    #[error("parameter {0} no longer exists")]
    ParameterGone(String),

    #[error("{context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: ProviderError,
    },
}

impl ShareError {
    pub fn provider(context: impl Into<String>, source: ProviderError) -> Self {
        Self::Provider {
            context: context.into(),
            source,
        }
    }
}

/// Missing or unusable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid configuration value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ShareError>;
