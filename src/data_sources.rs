//! Read-only data sources.
//!
//! Namespace, flag, segment and variant lookups reuse the matching resource's
//! read path; an entity that does not exist is an error here rather than a
//! removal. Environments are listed from the server.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::{self, EnvironmentList};
use crate::client::FliptClient;
use crate::config::DEFAULT_ENVIRONMENT;
use crate::error::ProviderError;
use crate::resources::{
    decode, FlagResource, FlagState, NamespaceResource, NamespaceState, Resource,
    SegmentResource, SegmentState, VariantResource, VariantState,
};
use crate::schema::{Attribute, Schema};

/// A data source type with typed state.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Configuration in, full state out.
    type State: Serialize + DeserializeOwned + Send + 'static;

    /// Data source type name.
    const TYPE_NAME: &'static str;

    /// Declarative schema.
    fn schema() -> Schema;

    /// Look the entity up. Missing is [`ProviderError::NotFound`].
    async fn read(&self, config: Self::State) -> Result<Self::State, ProviderError>;
}

/// Type-erased data source handler.
#[async_trait::async_trait]
pub trait DataSourceHandler: Send + Sync {
    /// Data source type name.
    fn type_name(&self) -> &'static str;
    /// Declarative schema.
    fn schema(&self) -> Schema;
    /// See [`DataSource::read`].
    async fn read(&self, config: Value) -> Result<Value, ProviderError>;
}

#[async_trait::async_trait]
impl<D: DataSource> DataSourceHandler for D {
    fn type_name(&self) -> &'static str {
        D::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        <D as DataSource>::schema()
    }

    async fn read(&self, config: Value) -> Result<Value, ProviderError> {
        let state = DataSource::read(self, decode::<D::State>(config)?).await?;
        Ok(serde_json::to_value(state)?)
    }
}

fn environment_attribute() -> Attribute {
    Attribute::optional_computed_string().with_description("Defaults to the provider's environment")
}

/// `flipt_namespace` data source.
pub struct NamespaceDataSource {
    resource: NamespaceResource,
}

impl NamespaceDataSource {
    /// Create a data source backed by the shared client.
    pub fn new(client: Arc<FliptClient>) -> Self {
        Self {
            resource: NamespaceResource::new(client),
        }
    }
}

#[async_trait::async_trait]
impl DataSource for NamespaceDataSource {
    type State = NamespaceState;

    const TYPE_NAME: &'static str = "flipt_namespace";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Look up a namespace")
            .with_attribute("environment_key", environment_attribute())
            .with_attribute("key", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("protected", Attribute::computed_bool())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    async fn read(&self, config: NamespaceState) -> Result<NamespaceState, ProviderError> {
        let key = config.key.clone();
        Resource::read(&self.resource, config)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("namespace '{}'", key)))
    }
}

/// `flipt_flag` data source.
pub struct FlagDataSource {
    resource: FlagResource,
}

impl FlagDataSource {
    /// Create a data source backed by the shared client.
    pub fn new(client: Arc<FliptClient>) -> Self {
        Self {
            resource: FlagResource::new(client),
        }
    }
}

#[async_trait::async_trait]
impl DataSource for FlagDataSource {
    type State = FlagState;

    const TYPE_NAME: &'static str = "flipt_flag";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Look up a flag")
            .with_attribute("environment_key", environment_attribute())
            .with_attribute("namespace_key", Attribute::required_string())
            .with_attribute("key", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("enabled", Attribute::computed_bool())
            .with_attribute("type", Attribute::computed_string())
            .with_attribute("metadata", Attribute::computed_string_map())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    async fn read(&self, config: FlagState) -> Result<FlagState, ProviderError> {
        let what = format!("flag '{}' in namespace '{}'", config.key, config.namespace_key);
        Resource::read(&self.resource, config)
            .await?
            .ok_or(ProviderError::NotFound(what))
    }
}

/// `flipt_segment` data source.
pub struct SegmentDataSource {
    resource: SegmentResource,
}

impl SegmentDataSource {
    /// Create a data source backed by the shared client.
    pub fn new(client: Arc<FliptClient>) -> Self {
        Self {
            resource: SegmentResource::new(client),
        }
    }
}

#[async_trait::async_trait]
impl DataSource for SegmentDataSource {
    type State = SegmentState;

    const TYPE_NAME: &'static str = "flipt_segment";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Look up a segment")
            .with_attribute("environment_key", environment_attribute())
            .with_attribute("namespace_key", Attribute::required_string())
            .with_attribute("key", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("match_type", Attribute::computed_string())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    async fn read(&self, config: SegmentState) -> Result<SegmentState, ProviderError> {
        let what = format!("segment '{}' in namespace '{}'", config.key, config.namespace_key);
        Resource::read(&self.resource, config)
            .await?
            .ok_or(ProviderError::NotFound(what))
    }
}

/// `flipt_variant` data source.
pub struct VariantDataSource {
    resource: VariantResource,
}

impl VariantDataSource {
    /// Create a data source backed by the shared client.
    pub fn new(client: Arc<FliptClient>) -> Self {
        Self {
            resource: VariantResource::new(client),
        }
    }
}

#[async_trait::async_trait]
impl DataSource for VariantDataSource {
    type State = VariantState;

    const TYPE_NAME: &'static str = "flipt_variant";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Look up a variant of a flag")
            .with_attribute("environment_key", environment_attribute())
            .with_attribute("namespace_key", Attribute::required_string())
            .with_attribute("flag_key", Attribute::required_string())
            .with_attribute("key", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("attachment", Attribute::computed_string())
    }

    async fn read(&self, config: VariantState) -> Result<VariantState, ProviderError> {
        let what = format!("variant '{}' in flag '{}'", config.key, config.flag_key);
        Resource::read(&self.resource, config)
            .await?
            .ok_or(ProviderError::NotFound(what))
    }
}

/// State of the `flipt_environment` data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentState {
    /// Environment key.
    pub key: String,
    /// Display name, the key when the server reports none.
    #[serde(default)]
    pub name: Option<String>,
    /// Whether this is the server's default environment.
    #[serde(default)]
    pub default: Option<bool>,
}

/// `flipt_environment` data source.
pub struct EnvironmentDataSource {
    client: Arc<FliptClient>,
}

impl EnvironmentDataSource {
    /// Create a data source backed by the shared client.
    pub fn new(client: Arc<FliptClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl DataSource for EnvironmentDataSource {
    type State = EnvironmentState;

    const TYPE_NAME: &'static str = "flipt_environment";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Look up an environment")
            .with_attribute("key", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("default", Attribute::computed_bool())
    }

    async fn read(&self, config: EnvironmentState) -> Result<EnvironmentState, ProviderError> {
        let url = api::environments_url(&self.client)?;
        let Some(list) = self.client.get::<EnvironmentList>(url).await? else {
            // Servers without the listing endpoint only expose what is configured.
            debug!(key = %config.key, "environment listing unavailable");
            return Ok(EnvironmentState {
                name: Some(config.key.clone()),
                default: Some(config.key == DEFAULT_ENVIRONMENT),
                key: config.key,
            });
        };

        let environment = list
            .environments
            .into_iter()
            .find(|e| e.key == config.key)
            .ok_or_else(|| ProviderError::NotFound(format!("environment '{}'", config.key)))?;

        let name = if environment.name.is_empty() {
            environment.key.clone()
        } else {
            environment.name
        };
        Ok(EnvironmentState {
            key: environment.key,
            name: Some(name),
            default: Some(environment.default),
        })
    }
}
