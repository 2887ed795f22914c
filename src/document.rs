//! Reconciliation of children embedded in a parent document.
//!
//! Variants and rules live inside a flag's payload and constraints inside a
//! segment's payload. The API only addresses the parent, so every child
//! operation is the same routine:
//!
//! 1. fetch the whole parent document,
//! 2. locate the child in one of its arrays,
//! 3. splice that array in memory,
//! 4. write the whole parent back with a single PUT.
//!
//! [`EmbeddedChild`] captures what differs per child type (field mapping and
//! identity). [`ChildResource`] turns any `EmbeddedChild` into a
//! [`Resource`](crate::resources::Resource).
//!
//! The parent payload is carried as an opaque JSON map, so sibling children,
//! the other arrays and any field this crate does not model are written back
//! exactly as they were read.

use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::api::{self, ResourceKind, ResourceRequest, ResourceResponse};
use crate::client::FliptClient;
use crate::error::ProviderError;
use crate::resources::Resource;
use crate::schema::Schema;

/// A flag or segment document as stored by Flipt.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentDocument {
    /// Flag or segment.
    pub kind: ResourceKind,
    /// Environment the document lives in.
    pub environment: String,
    /// Owning namespace.
    pub namespace: String,
    /// Document key.
    pub key: String,
    /// The full payload, including `@type`.
    pub payload: Map<String, Value>,
}

impl ParentDocument {
    /// Wrap a payload, stamping the `@type` discriminator and key.
    pub fn new(
        kind: ResourceKind,
        environment: impl Into<String>,
        namespace: impl Into<String>,
        key: impl Into<String>,
        mut payload: Map<String, Value>,
    ) -> Self {
        let key = key.into();
        payload.insert("@type".to_string(), Value::from(kind.type_url()));
        payload.insert("key".to_string(), Value::from(key.clone()));
        Self {
            kind,
            environment: environment.into(),
            namespace: namespace.into(),
            key,
            payload,
        }
    }

    /// GET the document. `Ok(None)` when it does not exist.
    pub async fn fetch(
        client: &FliptClient,
        environment: &str,
        namespace: &str,
        kind: ResourceKind,
        key: &str,
    ) -> Result<Option<Self>, ProviderError> {
        let url = api::resource_url(client, environment, namespace, kind, key)?;
        let Some(response) = client.get::<ResourceResponse>(url).await? else {
            return Ok(None);
        };
        debug!(
            kind = kind.noun(),
            namespace_key = %namespace,
            key = %key,
            revision = ?response.revision,
            "fetched parent document"
        );
        Ok(Some(Self {
            kind,
            environment: environment.to_string(),
            namespace: namespace.to_string(),
            key: response.resource.key,
            payload: response.resource.payload,
        }))
    }

    /// GET the document, failing with `NotFound` when it does not exist.
    pub async fn fetch_required(
        client: &FliptClient,
        environment: &str,
        namespace: &str,
        kind: ResourceKind,
        key: &str,
    ) -> Result<Self, ProviderError> {
        Self::fetch(client, environment, namespace, kind, key)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "{} '{}' in namespace '{}' (environment '{}')",
                    kind.noun(),
                    key,
                    namespace,
                    environment
                ))
            })
    }

    /// The elements of a child array. Absent or null counts as empty.
    pub fn children(&self, collection: &str) -> Result<Vec<Value>, ProviderError> {
        children_of(&self.payload, collection)
    }

    /// Replace a child array wholesale.
    pub fn set_children(&mut self, collection: &str, children: Vec<Value>) {
        self.payload
            .insert(collection.to_string(), Value::Array(children));
    }

    /// POST the document as a new resource. Returns the stored payload.
    pub async fn create(&self, client: &FliptClient) -> Result<Map<String, Value>, ProviderError> {
        self.write(client, Method::POST).await
    }

    /// PUT the whole document back. Returns the stored payload.
    pub async fn store(&self, client: &FliptClient) -> Result<Map<String, Value>, ProviderError> {
        self.write(client, Method::PUT).await
    }

    async fn write(
        &self,
        client: &FliptClient,
        method: Method,
    ) -> Result<Map<String, Value>, ProviderError> {
        let url = api::resources_url(client, &self.environment, &self.namespace)?;
        let body = ResourceRequest {
            key: &self.key,
            payload: &self.payload,
        };
        let response = client.send(method, url, &body).await?;

        // Servers that echo the stored resource are authoritative; otherwise
        // what was sent is what is stored.
        match serde_json::from_value::<ResourceResponse>(response) {
            Ok(echo) if !echo.resource.payload.is_empty() => Ok(echo.resource.payload),
            _ => Ok(self.payload.clone()),
        }
    }
}

/// The elements of `payload[collection]`. Absent or null counts as empty.
pub fn children_of(
    payload: &Map<String, Value>,
    collection: &str,
) -> Result<Vec<Value>, ProviderError> {
    match payload.get(collection) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(ProviderError::FailedPrecondition(format!(
            "expected '{}' to be an array, found {}",
            collection, other
        ))),
    }
}

/// Where a child lives: environment (if pinned), namespace and parent key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    /// Environment pinned by the state, if any.
    pub environment: Option<String>,
    /// Owning namespace.
    pub namespace: String,
    /// Parent flag or segment key.
    pub key: String,
}

/// Per-type field mapping for a child embedded in a parent array.
pub trait EmbeddedChild: Send + Sync + 'static {
    /// Declarative state of the child.
    type State: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Resource type name, e.g. `flipt_variant`.
    const TYPE_NAME: &'static str;
    /// Lower-case noun used in messages.
    const LABEL: &'static str;
    /// Kind of the owning document.
    const PARENT: ResourceKind;
    /// Name of the array inside the parent payload.
    const COLLECTION: &'static str;

    /// Declarative schema.
    fn schema() -> Schema;

    /// Identity-only state from an import id.
    fn import_state(id: &str) -> Result<Self::State, ProviderError>;

    /// Where the child lives.
    fn parent(state: &Self::State) -> ParentRef;

    /// Record the environment the child was resolved in.
    fn set_environment(state: &mut Self::State, environment: &str);

    /// Human-readable identity, for messages.
    fn describe(state: &Self::State) -> String;

    /// Index of the element `state` refers to, if present.
    fn locate(state: &Self::State, children: &[Value]) -> Result<Option<usize>, ProviderError>;

    /// Fill defaults that depend on the current array. `slot` is the element
    /// being replaced on update.
    fn prepare(state: &mut Self::State, children: &[Value], slot: Option<usize>) {
        let _ = (state, children, slot);
    }

    /// Reject a write that would break an invariant of the array.
    fn admit(
        state: &Self::State,
        children: &[Value],
        slot: Option<usize>,
    ) -> Result<(), ProviderError> {
        let _ = (state, children, slot);
        Ok(())
    }

    /// Build the wire element. `previous` is the element being replaced, whose
    /// undeclared fields must be carried over.
    fn build(state: &Self::State, previous: Option<&Value>) -> Result<Value, ProviderError>;

    /// Copy the declared fields of `element` into a state derived from `current`.
    fn refresh(current: &Self::State, element: &Value) -> Result<Self::State, ProviderError>;

    /// Copy server-computed fields from the stored array after a write.
    fn after_store(state: &mut Self::State, stored: &[Value]) {
        let _ = (state, stored);
    }
}

/// Any [`EmbeddedChild`] as a resource.
pub struct ChildResource<C> {
    client: Arc<FliptClient>,
    _child: PhantomData<fn() -> C>,
}

impl<C> ChildResource<C> {
    /// Create a handler backed by the shared client.
    pub fn new(client: Arc<FliptClient>) -> Self {
        Self {
            client,
            _child: PhantomData,
        }
    }
}

impl<C: EmbeddedChild> ChildResource<C> {
    fn resolve(&self, state: &C::State) -> (String, ParentRef) {
        let parent = C::parent(state);
        let environment = self
            .client
            .environment(parent.environment.as_deref())
            .to_string();
        (environment, parent)
    }

    async fn write_back(
        &self,
        mut document: ParentDocument,
        children: Vec<Value>,
    ) -> Result<Vec<Value>, ProviderError> {
        document.set_children(C::COLLECTION, children);
        let stored = document.store(&self.client).await?;
        children_of(&stored, C::COLLECTION)
    }
}

#[async_trait::async_trait]
impl<C: EmbeddedChild> Resource for ChildResource<C> {
    type State = C::State;

    const TYPE_NAME: &'static str = C::TYPE_NAME;

    fn schema() -> Schema {
        C::schema()
    }

    fn import_state(id: &str) -> Result<Self::State, ProviderError> {
        C::import_state(id)
    }

    async fn create(&self, planned: Self::State) -> Result<Self::State, ProviderError> {
        let (environment, parent) = self.resolve(&planned);
        let document = ParentDocument::fetch_required(
            &self.client,
            &environment,
            &parent.namespace,
            C::PARENT,
            &parent.key,
        )
        .await?;

        let mut children = document.children(C::COLLECTION)?;
        let before = children.len();

        let mut state = planned;
        C::set_environment(&mut state, &environment);
        C::prepare(&mut state, &children, None);
        C::admit(&state, &children, None)?;
        children.push(C::build(&state, None)?);

        let stored = self.write_back(document, children).await?;
        C::after_store(&mut state, &stored);

        info!(
            resource_type = C::TYPE_NAME,
            environment_key = %environment,
            namespace_key = %parent.namespace,
            parent_key = %parent.key,
            child = %C::describe(&state),
            children = before + 1,
            "appended child to parent document"
        );
        Ok(state)
    }

    async fn read(&self, current: Self::State) -> Result<Option<Self::State>, ProviderError> {
        let (environment, parent) = self.resolve(&current);
        let Some(document) = ParentDocument::fetch(
            &self.client,
            &environment,
            &parent.namespace,
            C::PARENT,
            &parent.key,
        )
        .await?
        else {
            debug!(
                resource_type = C::TYPE_NAME,
                parent_key = %parent.key,
                "parent document gone, child removed"
            );
            return Ok(None);
        };

        let children = document.children(C::COLLECTION)?;
        let Some(index) = C::locate(&current, &children)? else {
            debug!(
                resource_type = C::TYPE_NAME,
                child = %C::describe(&current),
                "child no longer present in parent"
            );
            return Ok(None);
        };

        let mut state = C::refresh(&current, &children[index])?;
        C::set_environment(&mut state, &environment);
        Ok(Some(state))
    }

    async fn update(
        &self,
        prior: Self::State,
        planned: Self::State,
    ) -> Result<Self::State, ProviderError> {
        let (environment, parent) = self.resolve(&prior);
        let document = ParentDocument::fetch_required(
            &self.client,
            &environment,
            &parent.namespace,
            C::PARENT,
            &parent.key,
        )
        .await?;

        let mut children = document.children(C::COLLECTION)?;
        let index = C::locate(&prior, &children)?.ok_or_else(|| {
            ProviderError::NotFound(format!(
                "{} {} in {} '{}'",
                C::LABEL,
                C::describe(&prior),
                C::PARENT.noun(),
                parent.key
            ))
        })?;

        let mut state = planned;
        C::set_environment(&mut state, &environment);
        C::prepare(&mut state, &children, Some(index));
        C::admit(&state, &children, Some(index))?;
        children[index] = C::build(&state, Some(&children[index]))?;

        let stored = self.write_back(document, children).await?;
        C::after_store(&mut state, &stored);

        info!(
            resource_type = C::TYPE_NAME,
            environment_key = %environment,
            parent_key = %parent.key,
            child = %C::describe(&state),
            index,
            "replaced child in parent document"
        );
        Ok(state)
    }

    async fn delete(&self, current: Self::State) -> Result<(), ProviderError> {
        let (environment, parent) = self.resolve(&current);
        let Some(document) = ParentDocument::fetch(
            &self.client,
            &environment,
            &parent.namespace,
            C::PARENT,
            &parent.key,
        )
        .await?
        else {
            warn!(
                resource_type = C::TYPE_NAME,
                parent_key = %parent.key,
                "parent document already gone"
            );
            return Ok(());
        };

        let mut children = document.children(C::COLLECTION)?;
        let Some(index) = C::locate(&current, &children)? else {
            debug!(
                resource_type = C::TYPE_NAME,
                child = %C::describe(&current),
                "child already absent, nothing to write"
            );
            return Ok(());
        };

        children.remove(index);
        self.write_back(document, children).await?;

        info!(
            resource_type = C::TYPE_NAME,
            environment_key = %environment,
            parent_key = %parent.key,
            child = %C::describe(&current),
            "removed child from parent document"
        );
        Ok(())
    }
}

/// Index of the first element whose `field` equals `value`.
pub fn position_by_field(children: &[Value], field: &str, value: &str) -> Option<usize> {
    children
        .iter()
        .position(|child| child.get(field).and_then(Value::as_str) == Some(value))
}

/// A string field of an element, empty when absent or not a string.
pub fn field_str<'a>(element: &'a Value, name: &str) -> &'a str {
    element.get(name).and_then(Value::as_str).unwrap_or("")
}

/// Start a new element from the one being replaced, or from an empty object.
pub fn base_element(previous: Option<&Value>) -> Map<String, Value> {
    previous
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}
