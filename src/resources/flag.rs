//! `flipt_flag` resource.
//!
//! Flags are stored as `flipt.core.Flag` documents that also hold the flag's
//! variants and rules. Updates are read-modify-write so those arrays, managed
//! by their own resources, survive a rename or a toggle.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{ImportId, Resource};
use crate::api::{self, payload_str, payload_timestamp, read_optional, ResourceKind};
use crate::client::FliptClient;
use crate::document::ParentDocument;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Flag type of flags that serve variants.
pub const VARIANT_FLAG_TYPE: &str = "VARIANT_FLAG_TYPE";
/// Flag type of on/off flags.
pub const BOOLEAN_FLAG_TYPE: &str = "BOOLEAN_FLAG_TYPE";

/// State of a flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagState {
    /// Environment the flag lives in.
    #[serde(default)]
    pub environment_key: Option<String>,
    /// Owning namespace.
    pub namespace_key: String,
    /// Flag key.
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the flag is enabled.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// `VARIANT_FLAG_TYPE` or `BOOLEAN_FLAG_TYPE`.
    #[serde(default, rename = "type")]
    pub flag_type: Option<String>,
    /// Free-form string metadata.
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
    /// Creation timestamp, when reported.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp, when reported.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl FlagState {
    /// Overwrite the declared fields of a flag payload.
    fn apply(&self, payload: &mut Map<String, Value>) {
        payload.insert("name".to_string(), Value::from(self.name.as_str()));
        payload.insert(
            "description".to_string(),
            Value::from(self.description.as_deref().unwrap_or("")),
        );
        payload.insert("enabled".to_string(), Value::from(self.enabled.unwrap_or(false)));
        payload.insert(
            "type".to_string(),
            Value::from(self.flag_type.as_deref().unwrap_or(VARIANT_FLAG_TYPE)),
        );
        let metadata: Map<String, Value> = self
            .metadata
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        payload.insert("metadata".to_string(), Value::Object(metadata));
    }

    /// Rebuild state from a stored payload, keeping `current`'s identity.
    fn from_payload(current: &FlagState, environment: &str, payload: &Map<String, Value>) -> Self {
        let metadata: BTreeMap<String, String> = payload
            .get("metadata")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .map(|(k, v)| {
                        let v = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), v)
                    })
                    .collect()
            })
            .unwrap_or_default();

        // An empty map reads back the way it was declared.
        let metadata = if metadata.is_empty() {
            current.metadata.clone().filter(BTreeMap::is_empty)
        } else {
            Some(metadata)
        };

        let flag_type = match payload_str(payload, "type") {
            "" => VARIANT_FLAG_TYPE.to_string(),
            t => t.to_string(),
        };

        Self {
            environment_key: Some(environment.to_string()),
            namespace_key: current.namespace_key.clone(),
            key: current.key.clone(),
            name: payload_str(payload, "name").to_string(),
            description: read_optional(
                current.description.as_deref(),
                payload_str(payload, "description"),
            ),
            enabled: Some(payload.get("enabled").and_then(Value::as_bool).unwrap_or(false)),
            flag_type: Some(flag_type),
            metadata,
            created_at: payload_timestamp(payload, "createdAt")
                .or_else(|| current.created_at.clone()),
            updated_at: payload_timestamp(payload, "updatedAt")
                .or_else(|| current.updated_at.clone()),
        }
    }
}

/// Handler for `flipt_flag`.
pub struct FlagResource {
    client: Arc<FliptClient>,
}

impl FlagResource {
    /// Create a handler backed by the shared client.
    pub fn new(client: Arc<FliptClient>) -> Self {
        Self { client }
    }

    fn environment(&self, state: &FlagState) -> String {
        self.client
            .environment(state.environment_key.as_deref())
            .to_string()
    }
}

#[async_trait::async_trait]
impl Resource for FlagResource {
    type State = FlagState;

    const TYPE_NAME: &'static str = "flipt_flag";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A feature flag")
            .with_attribute(
                "environment_key",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute("namespace_key", Attribute::required_string().with_force_new())
            .with_attribute(
                "key",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Unique flag key within the namespace"),
            )
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("enabled", Attribute::optional_computed_bool())
            .with_attribute(
                "type",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_allowed_values([VARIANT_FLAG_TYPE, BOOLEAN_FLAG_TYPE])
                    .with_description("Defaults to VARIANT_FLAG_TYPE"),
            )
            .with_attribute("metadata", Attribute::optional_string_map())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    fn import_state(id: &str) -> Result<Self::State, ProviderError> {
        let (environment, mut parts) =
            ImportId::parse(id, &["namespace_key", "key"])?.into_parts();
        let key = parts.remove(1);
        let namespace_key = parts.remove(0);
        Ok(FlagState {
            environment_key: environment,
            namespace_key,
            key,
            ..Default::default()
        })
    }

    async fn create(&self, planned: Self::State) -> Result<Self::State, ProviderError> {
        let environment = self.environment(&planned);

        let mut payload = Map::new();
        planned.apply(&mut payload);
        payload.insert("variants".to_string(), Value::Array(Vec::new()));
        payload.insert("rules".to_string(), Value::Array(Vec::new()));

        let document = ParentDocument::new(
            ResourceKind::Flag,
            environment.as_str(),
            planned.namespace_key.as_str(),
            planned.key.as_str(),
            payload,
        );
        let stored = document.create(&self.client).await?;

        let mut state = FlagState::from_payload(&planned, &environment, &stored);
        state.metadata = planned.metadata;
        state.description = planned.description;
        info!(
            resource_type = Self::TYPE_NAME,
            environment_key = %environment,
            namespace_key = %state.namespace_key,
            key = %state.key,
            "flag created"
        );
        Ok(state)
    }

    async fn read(&self, current: Self::State) -> Result<Option<Self::State>, ProviderError> {
        let environment = self.environment(&current);
        let document = ParentDocument::fetch(
            &self.client,
            &environment,
            &current.namespace_key,
            ResourceKind::Flag,
            &current.key,
        )
        .await?;
        Ok(document.map(|doc| FlagState::from_payload(&current, &environment, &doc.payload)))
    }

    async fn update(
        &self,
        prior: Self::State,
        planned: Self::State,
    ) -> Result<Self::State, ProviderError> {
        let environment = self.environment(&prior);
        let mut document = ParentDocument::fetch_required(
            &self.client,
            &environment,
            &prior.namespace_key,
            ResourceKind::Flag,
            &prior.key,
        )
        .await?;

        planned.apply(&mut document.payload);
        let stored = document.store(&self.client).await?;

        let mut state = FlagState::from_payload(&planned, &environment, &stored);
        state.metadata = planned.metadata;
        state.description = planned.description;
        info!(
            resource_type = Self::TYPE_NAME,
            namespace_key = %state.namespace_key,
            key = %state.key,
            "flag updated"
        );
        Ok(state)
    }

    async fn delete(&self, current: Self::State) -> Result<(), ProviderError> {
        let environment = self.environment(&current);
        let url = api::resource_url(
            &self.client,
            &environment,
            &current.namespace_key,
            ResourceKind::Flag,
            &current.key,
        )?;
        if self.client.delete(url).await? {
            info!(resource_type = Self::TYPE_NAME, key = %current.key, "flag deleted");
        } else {
            warn!(resource_type = Self::TYPE_NAME, key = %current.key, "flag already absent");
        }
        Ok(())
    }
}
