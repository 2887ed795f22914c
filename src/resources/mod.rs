//! Resource handlers.
//!
//! Each resource type implements [`Resource`] over its own typed state. The
//! blanket [`ResourceHandler`] implementation erases that type so the
//! provider can dispatch JSON documents by resource type name.

pub mod constraint;
pub mod flag;
pub mod namespace;
pub mod rule;
pub mod segment;
pub mod variant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::Schema;

pub use constraint::{ConstraintResource, ConstraintState};
pub use flag::{FlagResource, FlagState};
pub use namespace::{NamespaceResource, NamespaceState};
pub use rule::{RuleResource, RuleState};
pub use segment::{SegmentResource, SegmentState};
pub use variant::{VariantResource, VariantState};

/// A resource type with typed state.
#[async_trait::async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Declarative state.
    type State: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Resource type name, e.g. `flipt_flag`.
    const TYPE_NAME: &'static str;

    /// Declarative schema.
    fn schema() -> Schema;

    /// Identity-only state from an import id.
    fn import_state(id: &str) -> Result<Self::State, ProviderError>;

    /// Create the remote object and return the state with computed fields set.
    async fn create(&self, planned: Self::State) -> Result<Self::State, ProviderError>;

    /// Refresh from the remote side. `Ok(None)` means it is gone.
    async fn read(&self, current: Self::State) -> Result<Option<Self::State>, ProviderError>;

    /// Apply `planned` to the object identified by `prior`.
    async fn update(
        &self,
        prior: Self::State,
        planned: Self::State,
    ) -> Result<Self::State, ProviderError>;

    /// Remove the remote object. Already absent is success.
    async fn delete(&self, current: Self::State) -> Result<(), ProviderError>;
}

/// Type-erased resource handler.
#[async_trait::async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Resource type name.
    fn type_name(&self) -> &'static str;
    /// Declarative schema.
    fn schema(&self) -> Schema;
    /// Identity-only state from an import id.
    fn import(&self, id: &str) -> Result<Value, ProviderError>;
    /// See [`Resource::create`].
    async fn create(&self, planned: Value) -> Result<Value, ProviderError>;
    /// See [`Resource::read`].
    async fn read(&self, current: Value) -> Result<Option<Value>, ProviderError>;
    /// See [`Resource::update`].
    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError>;
    /// See [`Resource::delete`].
    async fn delete(&self, current: Value) -> Result<(), ProviderError>;
}

#[async_trait::async_trait]
impl<R: Resource> ResourceHandler for R {
    fn type_name(&self) -> &'static str {
        R::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        <R as Resource>::schema()
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(R::import_state(id)?)?)
    }

    async fn create(&self, planned: Value) -> Result<Value, ProviderError> {
        let state = Resource::create(self, decode::<R::State>(planned)?).await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn read(&self, current: Value) -> Result<Option<Value>, ProviderError> {
        match Resource::read(self, decode::<R::State>(current)?).await? {
            Some(state) => Ok(Some(serde_json::to_value(state)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let prior = decode::<R::State>(prior)?;
        let planned = decode::<R::State>(planned)?;
        let state = Resource::update(self, prior, planned).await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn delete(&self, current: Value) -> Result<(), ProviderError> {
        Resource::delete(self, decode::<R::State>(current)?).await
    }
}

/// Decode a state document, reporting shape problems as validation errors.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    serde_json::from_value(value)
        .map_err(|e| ProviderError::Validation(format!("invalid state document: {}", e)))
}

/// An import id split into its optional environment and fixed parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportId {
    /// Leading environment segment, if given.
    pub environment: Option<String>,
    /// The remaining parts, in order.
    pub parts: Vec<String>,
}

impl ImportId {
    /// Split `id` on `/`. `names` lists the required parts; one extra leading
    /// part is taken as the environment key.
    pub fn parse(id: &str, names: &[&str]) -> Result<Self, ProviderError> {
        let pieces: Vec<&str> = id.split('/').collect();
        let usage = || {
            ProviderError::Validation(format!(
                "invalid import id '{}', expected [environment_key/]{}",
                id,
                names.join("/")
            ))
        };

        if pieces.iter().any(|p| p.is_empty()) {
            return Err(usage());
        }

        let (environment, parts) = if pieces.len() == names.len() {
            (None, pieces)
        } else if pieces.len() == names.len() + 1 {
            (Some(pieces[0].to_string()), pieces[1..].to_vec())
        } else {
            return Err(usage());
        };

        Ok(Self {
            environment,
            parts: parts.into_iter().map(str::to_string).collect(),
        })
    }

    /// Take the parts by value.
    pub fn into_parts(self) -> (Option<String>, Vec<String>) {
        (self.environment, self.parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_id_without_environment() {
        let id = ImportId::parse("production/new-feature", &["namespace_key", "key"]).unwrap();
        assert_eq!(id.environment, None);
        assert_eq!(id.parts, vec!["production", "new-feature"]);
    }

    #[test]
    fn test_import_id_with_environment() {
        let id = ImportId::parse(
            "staging/production/new-feature/variant-a",
            &["namespace_key", "flag_key", "key"],
        )
        .unwrap();
        assert_eq!(id.environment.as_deref(), Some("staging"));
        assert_eq!(id.parts, vec!["production", "new-feature", "variant-a"]);
    }

    #[test]
    fn test_import_id_rejects_bad_shapes() {
        let names = ["namespace_key", "key"];
        for bad in ["", "only", "a//b", "a/b/c/d", "/a/b"] {
            let err = ImportId::parse(bad, &names).unwrap_err();
            assert!(
                err.message().contains("[environment_key/]namespace_key/key"),
                "{:?} gave {}",
                bad,
                err
            );
        }
    }
}
