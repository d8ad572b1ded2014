//! Role assumption through AWS STS.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_credential_types::Credentials;
use param_share_core::ports::{
    CredentialBroker, OrgHierarchy, ParameterStore, ProviderResult, ScopedSession,
};
use param_share_core::ProviderError;
use tracing::debug;

use crate::organizations::OrganizationsHierarchy;
use crate::sdk::provider_error;
use crate::ssm::SsmParameterStore;

const PROVIDER_NAME: &str = "param-share-assume-role";

/// Assumes roles from the ambient credentials. Clients built for an assumed
/// role inherit region, endpoint and retry settings of the base config.
#[derive(Debug, Clone)]
pub struct StsCredentialBroker {
    sts: aws_sdk_sts::Client,
    sdk_config: SdkConfig,
    session_name: String,
}

impl StsCredentialBroker {
    pub fn new(sdk_config: &SdkConfig, session_name: impl Into<String>) -> Self {
        Self {
            sts: aws_sdk_sts::Client::new(sdk_config),
            sdk_config: sdk_config.clone(),
            session_name: session_name.into(),
        }
    }
}

#[async_trait]
impl CredentialBroker for StsCredentialBroker {
    async fn assume_role(&self, role_arn: &str) -> ProviderResult<Arc<dyn ScopedSession>> {
        debug!(role_arn, session_name = %self.session_name, "assuming role");

        let output = self
            .sts
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(&self.session_name)
            .send()
            .await
            .map_err(|e| provider_error(format!("assume role {role_arn}"), e, |_| None))?;

        let issued = output.credentials().ok_or_else(|| {
            ProviderError::unexpected(format!("assume role {role_arn} returned no credentials"))
        })?;

        let credentials = Credentials::new(
            issued.access_key_id(),
            issued.secret_access_key(),
            Some(issued.session_token().to_string()),
            SystemTime::try_from(*issued.expiration()).ok(),
            PROVIDER_NAME,
        );

        Ok(Arc::new(AwsSession::new(&self.sdk_config, credentials)))
    }
}

/// SSM and Organizations clients acting as one assumed role.
#[derive(Debug, Clone)]
pub struct AwsSession {
    store: Arc<SsmParameterStore>,
    hierarchy: Arc<OrganizationsHierarchy>,
}

impl AwsSession {
    pub fn new(sdk_config: &SdkConfig, credentials: Credentials) -> Self {
        let ssm = aws_sdk_ssm::config::Builder::from(sdk_config)
            .credentials_provider(credentials.clone())
            .build();
        let organizations = aws_sdk_organizations::config::Builder::from(sdk_config)
            .credentials_provider(credentials)
            .build();

        Self {
            store: Arc::new(SsmParameterStore::new(aws_sdk_ssm::Client::from_conf(ssm))),
            hierarchy: Arc::new(OrganizationsHierarchy::new(
                aws_sdk_organizations::Client::from_conf(organizations),
            )),
        }
    }
}

impl ScopedSession for AwsSession {
    fn parameter_store(&self) -> Arc<dyn ParameterStore> {
        self.store.clone()
    }

    fn org_hierarchy(&self) -> Arc<dyn OrgHierarchy> {
        self.hierarchy.clone()
    }
}
