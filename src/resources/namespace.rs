//! `flipt_namespace` resource.

use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{ImportId, Resource};
use crate::api::{self, read_optional, Namespace, NamespaceRequest, NamespaceResponse};
use crate::client::FliptClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// State of a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceState {
    /// Environment the namespace lives in.
    #[serde(default)]
    pub environment_key: Option<String>,
    /// Namespace key.
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the namespace is protected.
    #[serde(default)]
    pub protected: Option<bool>,
    /// Creation timestamp, when reported.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp, when reported.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl NamespaceState {
    fn request(&self) -> NamespaceRequest<'_> {
        NamespaceRequest {
            key: &self.key,
            name: &self.name,
            description: self.description.as_deref().unwrap_or(""),
            protected: self.protected.unwrap_or(false),
        }
    }

    fn from_remote(current: &NamespaceState, environment: &str, namespace: Namespace) -> Self {
        Self {
            environment_key: Some(environment.to_string()),
            key: namespace.key,
            name: namespace.name,
            description: read_optional(current.description.as_deref(), &namespace.description),
            protected: Some(namespace.protected),
            created_at: namespace.created_at,
            updated_at: namespace.updated_at,
        }
    }
}

/// Handler for `flipt_namespace`.
pub struct NamespaceResource {
    client: Arc<FliptClient>,
}

impl NamespaceResource {
    /// Create a handler backed by the shared client.
    pub fn new(client: Arc<FliptClient>) -> Self {
        Self { client }
    }

    /// Send a namespace write and merge the echoed namespace into `planned`.
    async fn write(
        &self,
        method: Method,
        planned: NamespaceState,
    ) -> Result<NamespaceState, ProviderError> {
        let environment = self
            .client
            .environment(planned.environment_key.as_deref())
            .to_string();
        let url = api::namespaces_url(&self.client, &environment)?;
        let response = self.client.send(method, url, &planned.request()).await?;

        let mut state = planned;
        state.environment_key = Some(environment);
        if let Some(echo) = echoed(response)? {
            state.protected = Some(echo.protected);
            state.created_at = echo.created_at.or(state.created_at);
            state.updated_at = echo.updated_at.or(state.updated_at);
        } else if state.protected.is_none() {
            state.protected = Some(false);
        }
        Ok(state)
    }
}

fn echoed(response: Value) -> Result<Option<Namespace>, ProviderError> {
    if response.is_null() {
        return Ok(None);
    }
    let envelope: NamespaceResponse = serde_json::from_value(response)?;
    Ok(Some(envelope.namespace))
}

#[async_trait::async_trait]
impl Resource for NamespaceResource {
    type State = NamespaceState;

    const TYPE_NAME: &'static str = "flipt_namespace";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A Flipt namespace")
            .with_attribute(
                "environment_key",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_description("Environment, defaults to the provider's"),
            )
            .with_attribute(
                "key",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Unique namespace key"),
            )
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "protected",
                Attribute::optional_computed_bool()
                    .with_description("Protected namespaces cannot be deleted"),
            )
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    fn import_state(id: &str) -> Result<Self::State, ProviderError> {
        let (environment, mut parts) = ImportId::parse(id, &["key"])?.into_parts();
        Ok(NamespaceState {
            environment_key: environment,
            key: parts.remove(0),
            ..Default::default()
        })
    }

    async fn create(&self, planned: Self::State) -> Result<Self::State, ProviderError> {
        let state = self.write(Method::POST, planned).await?;
        info!(
            resource_type = Self::TYPE_NAME,
            environment_key = ?state.environment_key,
            key = %state.key,
            "namespace created"
        );
        Ok(state)
    }

    async fn read(&self, current: Self::State) -> Result<Option<Self::State>, ProviderError> {
        let environment = self.client.environment(current.environment_key.as_deref());
        let url = api::namespace_url(&self.client, environment, &current.key)?;
        let response: Option<NamespaceResponse> = self.client.get(url).await?;
        Ok(response.map(|r| NamespaceState::from_remote(&current, environment, r.namespace)))
    }

    async fn update(
        &self,
        _prior: Self::State,
        planned: Self::State,
    ) -> Result<Self::State, ProviderError> {
        self.write(Method::PUT, planned).await
    }

    async fn delete(&self, current: Self::State) -> Result<(), ProviderError> {
        let environment = self.client.environment(current.environment_key.as_deref());
        let url = api::namespace_url(&self.client, environment, &current.key)?;
        if self.client.delete(url).await? {
            info!(resource_type = Self::TYPE_NAME, key = %current.key, "namespace deleted");
        } else {
            warn!(resource_type = Self::TYPE_NAME, key = %current.key, "namespace already absent");
        }
        Ok(())
    }
}
