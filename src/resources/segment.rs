//! `flipt_segment` resource.

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

/// Every constraint must match.
pub const ALL_MATCH_TYPE: &str = "ALL_MATCH_TYPE";
/// Any constraint may match.
pub const ANY_MATCH_TYPE: &str = "ANY_MATCH_TYPE";

/// State of a segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentState {
    /// Environment the segment lives in.
    #[serde(default)]
    pub environment_key: Option<String>,
    /// Owning namespace.
    pub namespace_key: String,
    /// Segment key.
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// `ALL_MATCH_TYPE` or `ANY_MATCH_TYPE`.
    #[serde(default)]
    pub match_type: Option<String>,
    /// Creation timestamp, when reported.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp, when reported.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl SegmentState {
    fn apply(&self, payload: &mut Map<String, Value>) {
        payload.insert("name".to_string(), Value::from(self.name.as_str()));
        payload.insert(
            "description".to_string(),
            Value::from(self.description.as_deref().unwrap_or("")),
        );
        payload.insert(
            "matchType".to_string(),
            Value::from(self.match_type.as_deref().unwrap_or(ALL_MATCH_TYPE)),
        );
    }

    fn from_payload(
        current: &SegmentState,
        environment: &str,
        payload: &Map<String, Value>,
    ) -> Self {
        let match_type = match payload_str(payload, "matchType") {
            "" => ALL_MATCH_TYPE,
            m => m,
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
            match_type: Some(match_type.to_string()),
            created_at: payload_timestamp(payload, "createdAt")
                .or_else(|| current.created_at.clone()),
            updated_at: payload_timestamp(payload, "updatedAt")
                .or_else(|| current.updated_at.clone()),
        }
    }
}

/// Handler for `flipt_segment`.
pub struct SegmentResource {
    client: Arc<FliptClient>,
}

impl SegmentResource {
    /// Create a handler backed by the shared client.
    pub fn new(client: Arc<FliptClient>) -> Self {
        Self { client }
    }

    fn environment(&self, state: &SegmentState) -> String {
        self.client
            .environment(state.environment_key.as_deref())
            .to_string()
    }
}

#[async_trait::async_trait]
impl Resource for SegmentResource {
    type State = SegmentState;

    const TYPE_NAME: &'static str = "flipt_segment";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A segment of evaluation contexts")
            .with_attribute(
                "environment_key",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute("namespace_key", Attribute::required_string().with_force_new())
            .with_attribute("key", Attribute::required_string().with_force_new())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "match_type",
                Attribute::optional_computed_string()
                    .with_allowed_values([ALL_MATCH_TYPE, ANY_MATCH_TYPE])
                    .with_description("Defaults to ALL_MATCH_TYPE"),
            )
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    fn import_state(id: &str) -> Result<Self::State, ProviderError> {
        let (environment, mut parts) =
            ImportId::parse(id, &["namespace_key", "key"])?.into_parts();
        let key = parts.remove(1);
        let namespace_key = parts.remove(0);
        Ok(SegmentState {
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
        payload.insert("constraints".to_string(), Value::Array(Vec::new()));

        let document = ParentDocument::new(
            ResourceKind::Segment,
            environment.as_str(),
            planned.namespace_key.as_str(),
            planned.key.as_str(),
            payload,
        );
        let stored = document.create(&self.client).await?;

        let mut state = SegmentState::from_payload(&planned, &environment, &stored);
        state.description = planned.description;
        info!(
            resource_type = Self::TYPE_NAME,
            environment_key = %environment,
            namespace_key = %state.namespace_key,
            key = %state.key,
            "segment created"
        );
        Ok(state)
    }

    async fn read(&self, current: Self::State) -> Result<Option<Self::State>, ProviderError> {
        let environment = self.environment(&current);
        let document = ParentDocument::fetch(
            &self.client,
            &environment,
            &current.namespace_key,
            ResourceKind::Segment,
            &current.key,
        )
        .await?;
        Ok(document.map(|doc| SegmentState::from_payload(&current, &environment, &doc.payload)))
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
            ResourceKind::Segment,
            &prior.key,
        )
        .await?;

        planned.apply(&mut document.payload);
        let stored = document.store(&self.client).await?;

        let mut state = SegmentState::from_payload(&planned, &environment, &stored);
        state.description = planned.description;
        info!(resource_type = Self::TYPE_NAME, key = %state.key, "segment updated");
        Ok(state)
    }

    async fn delete(&self, current: Self::State) -> Result<(), ProviderError> {
        let environment = self.environment(&current);
        let url = api::resource_url(
            &self.client,
            &environment,
            &current.namespace_key,
            ResourceKind::Segment,
            &current.key,
        )?;
        if self.client.delete(url).await? {
            info!(resource_type = Self::TYPE_NAME, key = %current.key, "segment deleted");
        } else {
            warn!(resource_type = Self::TYPE_NAME, key = %current.key, "segment already absent");
        }
        Ok(())
    }
}
