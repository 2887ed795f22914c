//! The orchestrator-facing provider interface.
//!
//! Every state and configuration document crosses this seam as a
//! `serde_json::Value`; typed handling starts behind it.
//! [`FliptProvider`](crate::FliptProvider) implements it and
//! [`ProviderTester`](crate::testing::ProviderTester) drives it in tests.

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};

/// Calls an orchestrator makes on a provider.
///
/// Validation calls report problems as diagnostics. Everything else fails
/// with a [`ProviderError`].
///
/// ```ignore
/// use flipt_provider::{FliptProvider, ProviderService};
/// use serde_json::json;
///
/// let provider = FliptProvider::new();
/// provider.configure(json!({"endpoint": "http://localhost:8080"})).await?;
/// let state = provider
///     .create("flipt_namespace", json!({"key": "production", "name": "Production"}))
///     .await?;
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Provider configuration, resource and data source schemas.
    fn schema(&self) -> ProviderSchema;

    /// Sorted type names, derived from [`schema`](Self::schema).
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.into_keys().collect();
        let mut data_sources: Vec<String> = schema.data_sources.into_keys().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
        }
    }

    /// Check a provider configuration without applying it.
    async fn validate_provider_config(
        &self,
        _config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(Vec::new())
    }

    /// Apply a provider configuration. Error diagnostics leave the provider
    /// unconfigured.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Drop the configured client.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Check a resource document against its schema.
    async fn validate_resource_config(
        &self,
        _resource_type: &str,
        _config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(Vec::new())
    }

    /// Diff `prior_state` against `proposed_state`. A null proposal plans a
    /// destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create the object and return its refreshed state.
    async fn create(&self, resource_type: &str, planned_state: Value)
        -> Result<Value, ProviderError>;

    /// Refresh an object. `Ok(None)` means it no longer exists remotely.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Update the object in place.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the object. Deleting something already gone succeeds.
    async fn delete(&self, resource_type: &str, current_state: Value)
        -> Result<(), ProviderError>;

    /// Resolve an import id into state.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "{} does not support import",
            resource_type
        )))
    }

    /// Check a data source document against its schema.
    async fn validate_data_source_config(
        &self,
        _data_source_type: &str,
        _config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(Vec::new())
    }

    /// Look up a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}
