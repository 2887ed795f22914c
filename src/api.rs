//! Flipt v2 wire formats and URL layout.
//!
//! Namespaces have their own endpoint family. Flags and segments are stored
//! as generic "resources" whose `payload` is a typed document discriminated by
//! `@type`; they are kept as opaque JSON maps here so that fields this crate
//! does not model are written back untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::client::FliptClient;
use crate::error::ProviderError;

/// `@type` discriminator of flag documents.
pub const FLAG_TYPE_URL: &str = "flipt.core.Flag";
/// `@type` discriminator of segment documents.
pub const SEGMENT_TYPE_URL: &str = "flipt.core.Segment";

/// The two kinds of parent documents stored under `/resources`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A flag, owning `variants` and `rules`.
    Flag,
    /// A segment, owning `constraints`.
    Segment,
}

impl ResourceKind {
    /// The `@type` value and URL segment of this kind.
    pub fn type_url(self) -> &'static str {
        match self {
            ResourceKind::Flag => FLAG_TYPE_URL,
            ResourceKind::Segment => SEGMENT_TYPE_URL,
        }
    }

    /// Lower-case noun used in messages.
    pub fn noun(self) -> &'static str {
        match self {
            ResourceKind::Flag => "flag",
            ResourceKind::Segment => "segment",
        }
    }
}

/// `{endpoint}/api/v2/environments`
pub fn environments_url(client: &FliptClient) -> Result<Url, ProviderError> {
    client.url(&["api", "v2", "environments"])
}

/// `{endpoint}/api/v2/environments/{env}/namespaces`
pub fn namespaces_url(client: &FliptClient, env: &str) -> Result<Url, ProviderError> {
    client.url(&["api", "v2", "environments", env, "namespaces"])
}

/// `{endpoint}/api/v2/environments/{env}/namespaces/{key}`
pub fn namespace_url(client: &FliptClient, env: &str, key: &str) -> Result<Url, ProviderError> {
    client.url(&["api", "v2", "environments", env, "namespaces", key])
}

/// `{endpoint}/api/v2/environments/{env}/namespaces/{ns}/resources`
pub fn resources_url(
    client: &FliptClient,
    env: &str,
    namespace: &str,
) -> Result<Url, ProviderError> {
    client.url(&["api", "v2", "environments", env, "namespaces", namespace, "resources"])
}

/// `{endpoint}/api/v2/environments/{env}/namespaces/{ns}/resources/{type}/{key}`
pub fn resource_url(
    client: &FliptClient,
    env: &str,
    namespace: &str,
    kind: ResourceKind,
    key: &str,
) -> Result<Url, ProviderError> {
    client.url(&[
        "api",
        "v2",
        "environments",
        env,
        "namespaces",
        namespace,
        "resources",
        kind.type_url(),
        key,
    ])
}

/// A namespace as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    /// Namespace key.
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Protected namespaces cannot be deleted.
    #[serde(default)]
    pub protected: bool,
    /// Creation timestamp, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Envelope of `GET /namespaces/{key}` and of namespace writes.
#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceResponse {
    /// The namespace.
    pub namespace: Namespace,
    /// Storage revision after the call.
    #[serde(default)]
    pub revision: Option<String>,
}

/// Body of namespace create and update calls.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceRequest<'a> {
    /// Namespace key.
    pub key: &'a str,
    /// Display name.
    pub name: &'a str,
    /// Description, empty when unset.
    pub description: &'a str,
    /// Whether the namespace is protected.
    pub protected: bool,
}

/// An environment as listed by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Environment {
    /// Environment key.
    pub key: String,
    /// Display name, often empty.
    #[serde(default)]
    pub name: String,
    /// Whether this is the server's default environment.
    #[serde(default)]
    pub default: bool,
}

/// Envelope of `GET /environments`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentList {
    /// Every environment the server knows about.
    #[serde(default)]
    pub environments: Vec<Environment>,
}

/// A stored flag or segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResource {
    /// Owning namespace, when echoed.
    #[serde(default)]
    pub namespace_key: Option<String>,
    /// Resource key.
    pub key: String,
    /// The typed document, kept verbatim.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// Envelope of `GET /resources/{type}/{key}` and of resource writes.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceResponse {
    /// The resource.
    pub resource: StoredResource,
    /// Storage revision after the call.
    #[serde(default)]
    pub revision: Option<String>,
}

/// Body of `POST|PUT /resources`.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceRequest<'a> {
    /// Resource key.
    pub key: &'a str,
    /// The full document to store.
    pub payload: &'a Map<String, Value>,
}

/// Read a string field from a payload, treating absence and non-strings as empty.
pub fn payload_str<'a>(payload: &'a Map<String, Value>, field: &str) -> &'a str {
    payload.get(field).and_then(Value::as_str).unwrap_or("")
}

/// A timestamp field of a payload, when the server reports one.
pub fn payload_timestamp(payload: &Map<String, Value>, field: &str) -> Option<String> {
    non_empty(payload_str(payload, field))
}

/// Map an empty string to `None`.
pub fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Read back an optional string attribute.
///
/// Flipt stores unset and `""` alike. An empty stored value reads as `""`
/// when that is what was declared and as unset otherwise.
pub fn read_optional(declared: Option<&str>, stored: &str) -> Option<String> {
    match (declared, stored) {
        (Some(""), "") => Some(String::new()),
        (_, stored) => non_empty(stored),
    }
}
