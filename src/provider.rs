//! The Flipt provider: configuration, dispatch and lifecycle logging.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::client::FliptClient;
use crate::config::ProviderConfig;
use crate::data_sources::{
    DataSource, DataSourceHandler, EnvironmentDataSource, FlagDataSource, NamespaceDataSource,
    SegmentDataSource, VariantDataSource,
};
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::resources::{
    ConstraintResource, FlagResource, NamespaceResource, Resource, ResourceHandler, RuleResource,
    SegmentResource, VariantResource,
};
use crate::schema::{has_errors, Diagnostic, ProviderSchema, Schema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation;

/// Handlers built by `configure`.
struct Configured {
    config: ProviderConfig,
    resources: BTreeMap<&'static str, Box<dyn ResourceHandler>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSourceHandler>>,
}

impl Configured {
    fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Arc::new(FliptClient::new(&config)?);

        let resources: Vec<Box<dyn ResourceHandler>> = vec![
            Box::new(NamespaceResource::new(client.clone())),
            Box::new(FlagResource::new(client.clone())),
            Box::new(SegmentResource::new(client.clone())),
            Box::new(VariantResource::new(client.clone())),
            Box::new(ConstraintResource::new(client.clone())),
            Box::new(RuleResource::new(client.clone())),
        ];
        let data_sources: Vec<Box<dyn DataSourceHandler>> = vec![
            Box::new(NamespaceDataSource::new(client.clone())),
            Box::new(EnvironmentDataSource::new(client.clone())),
            Box::new(FlagDataSource::new(client.clone())),
            Box::new(SegmentDataSource::new(client.clone())),
            Box::new(VariantDataSource::new(client)),
        ];

        Ok(Self {
            config,
            resources: resources.into_iter().map(|h| (h.type_name(), h)).collect(),
            data_sources: data_sources
                .into_iter()
                .map(|h| (h.type_name(), h))
                .collect(),
        })
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn ResourceHandler, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSourceHandler, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// Provider for the Flipt v2 management API.
///
/// # Example
///
/// ```ignore
/// use flipt_provider::{FliptProvider, ProviderService};
/// use serde_json::json;
///
/// let provider = FliptProvider::new();
/// provider
///     .configure(json!({"endpoint": "http://localhost:8080", "token": "secret"}))
///     .await?;
/// ```
#[derive(Default)]
pub struct FliptProvider {
    state: RwLock<Option<Arc<Configured>>>,
}

impl FliptProvider {
    /// Create an unconfigured provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active configuration, if `configure` has succeeded.
    pub async fn config(&self) -> Option<ProviderConfig> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|configured| configured.config.clone())
    }

    async fn configured(&self) -> Result<Arc<Configured>, ProviderError> {
        self.state.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider used before configure".to_string())
        })
    }

    fn resource_schema(resource_type: &str) -> Result<Schema, ProviderError> {
        Self::provider_schema()
            .resources
            .remove(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn provider_schema() -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        let schema = with_resource::<NamespaceResource>(schema);
        let schema = with_resource::<FlagResource>(schema);
        let schema = with_resource::<SegmentResource>(schema);
        let schema = with_resource::<VariantResource>(schema);
        let schema = with_resource::<ConstraintResource>(schema);
        let schema = with_resource::<RuleResource>(schema);
        let schema = with_data_source::<NamespaceDataSource>(schema);
        let schema = with_data_source::<EnvironmentDataSource>(schema);
        let schema = with_data_source::<FlagDataSource>(schema);
        let schema = with_data_source::<SegmentDataSource>(schema);
        with_data_source::<VariantDataSource>(schema)
    }
}

fn with_resource<R: Resource>(schema: ProviderSchema) -> ProviderSchema {
    schema.with_resource(R::TYPE_NAME, <R as Resource>::schema())
}

fn with_data_source<D: DataSource>(schema: ProviderSchema) -> ProviderSchema {
    schema.with_data_source(D::TYPE_NAME, <D as DataSource>::schema())
}

#[async_trait::async_trait]
impl ProviderService for FliptProvider {
    fn schema(&self) -> ProviderSchema {
        Self::provider_schema()
    }

    #[instrument(skip(self, config), name = "provider.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validation::validate(&ProviderConfig::schema(), &config);
        if !has_errors(&diagnostics) {
            if let Err(e) = ProviderConfig::from_value(config) {
                diagnostics.push(e.into());
            }
        }
        if has_errors(&diagnostics) {
            warn!(diagnostics = diagnostics.len(), "ValidateProviderConfig completed with errors");
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = self.validate_provider_config(config.clone()).await?;
        if has_errors(&diagnostics) {
            warn!(diagnostics = diagnostics.len(), "Configure completed with errors");
            return Ok(diagnostics);
        }

        let config = ProviderConfig::from_value(config)?;
        let configured = Configured::new(config)?;
        info!(
            endpoint = %configured.config.endpoint,
            environment_key = %configured.config.environment(),
            authenticated = configured.config.authorization().is_some(),
            "Configure completed successfully"
        );
        *self.state.write().await = Some(Arc::new(configured));
        Ok(diagnostics)
    }

    #[instrument(skip(self), name = "provider.stop")]
    async fn stop(&self) -> Result<(), ProviderError> {
        self.state.write().await.take();
        info!("Stop completed successfully");
        Ok(())
    }

    #[instrument(skip(self, config), name = "provider.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = Self::resource_schema(resource_type)?;
        let diagnostics = validation::validate(&schema, &config);
        if has_errors(&diagnostics) {
            warn!(
                resource_type = %resource_type,
                diagnostics = diagnostics.len(),
                "ValidateResourceConfig completed with errors"
            );
        } else {
            debug!(resource_type = %resource_type, "ValidateResourceConfig completed successfully");
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state, _config), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = Self::resource_schema(resource_type)?;
        let plan = plan_resource(&schema, prior_state.as_ref(), proposed_state)?;
        info!(
            resource_type = %resource_type,
            changes = plan.changes.len(),
            requires_replace = plan.requires_replace,
            "Plan completed"
        );
        Ok(plan)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        info!(resource_type = %resource_type, "Create called");
        let configured = self.configured().await?;
        match configured.resource(resource_type)?.create(planned_state).await {
            Ok(state) => {
                info!(resource_type = %resource_type, "Create completed successfully");
                Ok(state)
            },
            Err(e) => {
                error!(resource_type = %resource_type, error = %e, "Create failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        debug!(resource_type = %resource_type, "Read called");
        let configured = self.configured().await?;
        match configured.resource(resource_type)?.read(current_state).await {
            Ok(Some(state)) => {
                debug!(resource_type = %resource_type, "Read completed successfully");
                Ok(Some(state))
            },
            Ok(None) => {
                info!(resource_type = %resource_type, "Resource no longer exists");
                Ok(None)
            },
            Err(e) => {
                error!(resource_type = %resource_type, error = %e, "Read failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        info!(resource_type = %resource_type, "Update called");
        let configured = self.configured().await?;
        match configured
            .resource(resource_type)?
            .update(prior_state, planned_state)
            .await
        {
            Ok(state) => {
                info!(resource_type = %resource_type, "Update completed successfully");
                Ok(state)
            },
            Err(e) => {
                error!(resource_type = %resource_type, error = %e, "Update failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        info!(resource_type = %resource_type, "Delete called");
        let configured = self.configured().await?;
        match configured.resource(resource_type)?.delete(current_state).await {
            Ok(()) => {
                info!(resource_type = %resource_type, "Delete completed successfully");
                Ok(())
            },
            Err(e) => {
                error!(resource_type = %resource_type, error = %e, "Delete failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let configured = self.configured().await?;
        let handler = configured.resource(resource_type)?;
        let state = handler.import(id)?;

        // Import yields identity only; a read fills in the rest.
        let Some(state) = handler.read(state).await? else {
            return Err(ProviderError::NotFound(format!(
                "{} with import id '{}'",
                resource_type, id
            )));
        };
        info!(resource_type = %resource_type, id = %id, "ImportResourceState completed");
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    #[instrument(skip(self, config), name = "provider.validate_data_source_config")]
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = Self::provider_schema()
            .data_sources
            .remove(data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))?;
        Ok(validation::validate(&schema, &config))
    }

    #[instrument(skip(self, config), name = "provider.read_data_source")]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        debug!(data_source_type = %data_source_type, "ReadDataSource called");
        let configured = self.configured().await?;
        match configured.data_source(data_source_type)?.read(config).await {
            Ok(state) => {
                debug!(data_source_type = %data_source_type, "ReadDataSource completed");
                Ok(state)
            },
            Err(e) => {
                error!(data_source_type = %data_source_type, error = %e, "ReadDataSource failed");
                Err(e)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_lists_every_type() {
        let provider = FliptProvider::new();
        let metadata = provider.metadata();
        assert_eq!(
            metadata.resources,
            vec![
                "flipt_constraint",
                "flipt_flag",
                "flipt_namespace",
                "flipt_rule",
                "flipt_segment",
                "flipt_variant"
            ]
        );
        assert_eq!(
            metadata.data_sources,
            vec![
                "flipt_environment",
                "flipt_flag",
                "flipt_namespace",
                "flipt_segment",
                "flipt_variant"
            ]
        );
        assert!(provider.schema().provider.attributes["token"].flags.sensitive);
    }

    #[tokio::test]
    async fn test_use_before_configure() {
        let provider = FliptProvider::new();
        let err = provider
            .create("flipt_namespace", json!({"key": "production", "name": "Production"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_configure_rejects_token_and_jwt() {
        let provider = FliptProvider::new();
        let diagnostics = provider
            .configure(json!({"endpoint": "http://localhost:8080", "token": "t", "jwt": "j"}))
            .await
            .unwrap();
        assert!(has_errors(&diagnostics));
        assert!(provider.config().await.is_none());
    }

    #[tokio::test]
    async fn test_configure_missing_endpoint() {
        let provider = FliptProvider::new();
        let diagnostics = provider.configure(json!({})).await.unwrap();
        assert!(has_errors(&diagnostics));
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("endpoint"));
    }

    #[tokio::test]
    async fn test_configure_and_stop() {
        let provider = FliptProvider::new();
        let diagnostics = provider
            .configure(json!({"endpoint": "http://localhost:8080", "environment_key": "staging"}))
            .await
            .unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(provider.config().await.unwrap().environment(), "staging");

        provider.stop().await.unwrap();
        assert!(provider.config().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let provider = FliptProvider::new();
        provider
            .configure(json!({"endpoint": "http://localhost:8080"}))
            .await
            .unwrap();
        let err = provider
            .read("flipt_widget", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_validate_resource_config_uses_schema() {
        let provider = FliptProvider::new();
        let diagnostics = provider
            .validate_resource_config(
                "flipt_flag",
                json!({
                    "namespace_key": "production",
                    "key": "new-feature",
                    "name": "New",
                    "type": "PERCENT"
                }),
            )
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("type"));
    }
}
