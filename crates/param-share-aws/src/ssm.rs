//! Parameter store backed by AWS Systems Manager.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ssm::operation::add_tags_to_resource::AddTagsToResourceError;
use aws_sdk_ssm::operation::delete_parameter::DeleteParameterError;
use aws_sdk_ssm::operation::get_parameter::GetParameterError;
use aws_sdk_ssm::operation::list_tags_for_resource::ListTagsForResourceError;
use aws_sdk_ssm::operation::put_parameter::PutParameterError;
use aws_sdk_ssm::primitives::DateTime as AwsDateTime;
use aws_sdk_ssm::types::{
    ParameterStringFilter, ParameterTier, ParameterType as AwsParameterType,
    ResourceTypeForTagging, Tag,
};
use aws_sdk_ssm::Client;
use chrono::{DateTime, Utc};
use param_share_core::ports::{ParameterStore, ProviderResult};
use param_share_core::{ParameterMetadata, ParameterType, ParameterWrite, ProviderError, TagMap};
use tracing::debug;

use crate::sdk::provider_error;

#[derive(Debug, Clone)]
pub struct SsmParameterStore {
    client: Client,
}

impl SsmParameterStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Store acting with the ambient credentials of `sdk_config`.
    pub fn from_sdk_config(sdk_config: &SdkConfig) -> Self {
        Self::new(Client::new(sdk_config))
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    async fn get_value(&self, name: &str) -> ProviderResult<String> {
        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| {
                provider_error(format!("get parameter {name}"), e, |err| {
                    matches!(err, GetParameterError::ParameterNotFound(_))
                        .then(|| ProviderError::NotFound(name.to_string()))
                })
            })?;

        output
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::unexpected(format!("parameter {name} has no value")))
    }

    async fn describe(&self, name: &str) -> ProviderResult<Option<ParameterMetadata>> {
        let filter = ParameterStringFilter::builder()
            .key("Name")
            .option("Equals")
            .values(name)
            .build()
            .map_err(|e| ProviderError::unexpected(format!("describe filter for {name}: {e}")))?;

        let output = self
            .client
            .describe_parameters()
            .parameter_filters(filter)
            .send()
            .await
            .map_err(|e| provider_error(format!("describe parameter {name}"), e, |_| None))?;

        let Some(found) = output.parameters().first() else {
            debug!(parameter = %name, "describe returned no parameters");
            return Ok(None);
        };

        let last_modified_at = found
            .last_modified_date()
            .map(to_utc)
            .transpose()?
            .ok_or_else(|| ProviderError::unexpected(format!("{name} has no modification date")))?;
        let parameter_type = found
            .r#type()
            .ok_or_else(|| ProviderError::unexpected(format!("{name} has no type")))
            .and_then(from_aws_type)?;

        Ok(Some(ParameterMetadata {
            last_modified_user: found.last_modified_user().unwrap_or_default().to_string(),
            last_modified_at,
            parameter_type,
            description: found.description().map(str::to_string),
            version: found.version(),
        }))
    }

    async fn list_tags(&self, name: &str) -> ProviderResult<TagMap> {
        let output = self
            .client
            .list_tags_for_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(name)
            .send()
            .await
            .map_err(|e| {
                provider_error(format!("list tags of {name}"), e, |err| {
                    matches!(err, ListTagsForResourceError::InvalidResourceId(_))
                        .then(|| ProviderError::InvalidResourceId(name.to_string()))
                })
            })?;

        Ok(output
            .tag_list()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect())
    }

    async fn put(&self, write: &ParameterWrite) -> ProviderResult<()> {
        let name = write.name.as_str();
        self.client
            .put_parameter()
            .name(name)
            .value(&write.value)
            .r#type(to_aws_type(write.parameter_type))
            .description(&write.description)
            .tier(ParameterTier::Standard)
            .overwrite(write.mode.overwrite())
            .send()
            .await
            .map_err(|e| {
                provider_error(format!("put parameter {name}"), e, |err| {
                    matches!(err, PutParameterError::ParameterAlreadyExists(_))
                        .then(|| ProviderError::AlreadyExists(name.to_string()))
                })
            })?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> ProviderResult<()> {
        self.client
            .delete_parameter()
            .name(name)
            .send()
            .await
            .map_err(|e| {
                provider_error(format!("delete parameter {name}"), e, |err| {
                    matches!(err, DeleteParameterError::ParameterNotFound(_))
                        .then(|| ProviderError::NotFound(name.to_string()))
                })
            })?;
        Ok(())
    }

    async fn add_tags(&self, name: &str, tags: &TagMap) -> ProviderResult<()> {
        let tags = to_aws_tags(tags)?;
        self.client
            .add_tags_to_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(name)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| {
                provider_error(format!("add tags to {name}"), e, |err| {
                    matches!(err, AddTagsToResourceError::InvalidResourceId(_))
                        .then(|| ProviderError::InvalidResourceId(name.to_string()))
                })
            })?;
        Ok(())
    }
}

fn to_utc(at: &AwsDateTime) -> ProviderResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(at.secs(), at.subsec_nanos())
        .ok_or_else(|| ProviderError::unexpected(format!("timestamp out of range: {at:?}")))
}

fn from_aws_type(kind: &AwsParameterType) -> ProviderResult<ParameterType> {
    kind.as_str().parse()
}

fn to_aws_type(kind: ParameterType) -> AwsParameterType {
    AwsParameterType::from(kind.as_str())
}

fn to_aws_tags(tags: &TagMap) -> ProviderResult<Vec<Tag>> {
    tags.iter()
        .map(|(key, value)| {
            Tag::builder()
                .key(key)
                .value(value)
                .build()
                .map_err(|e| ProviderError::unexpected(format!("tag {key}: {e}")))
        })
        .collect()
}
