//! AWS collaborators for param-share.
//!
//! - [`SsmParameterStore`] - parameters in Systems Manager Parameter Store
//! - [`StsCredentialBroker`] - role assumption, yielding an [`AwsSession`]
//! - [`OrganizationsHierarchy`] - account listing for roots and units
//!
//! [`ClientOptions`] builds the base SDK configuration the binary hands to
//! each of them.

pub mod organizations;
mod sdk;
pub mod ssm;
pub mod sts;

use aws_config::{BehaviorVersion, Region, SdkConfig};

pub use organizations::OrganizationsHierarchy;
pub use ssm::SsmParameterStore;
pub use sts::{AwsSession, StsCredentialBroker};

/// Overrides applied on top of the ambient AWS configuration chain.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub region: Option<String>,
    /// Alternative service endpoint, e.g. a local emulator.
    pub endpoint_url: Option<String>,
}

impl ClientOptions {
    pub async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint_url) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        loader.load().await
    }
}
