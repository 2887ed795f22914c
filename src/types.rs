//! Plan, import and metadata values passed across [`ProviderService`](crate::ProviderService).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One attribute's before and after values in a plan.
///
/// `before` is `None` for an attribute being set, `after` is `None` for one
/// being cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute name.
    pub path: String,
    /// Prior value.
    pub before: Option<Value>,
    /// Planned value.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// An attribute that was unset and becomes `value`.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: None,
            after: Some(value),
        }
    }

    /// An attribute holding `value` that becomes unset.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(value),
            after: None,
        }
    }

    /// An attribute moving from `before` to `after`.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(before),
            after: Some(after),
        }
    }
}

/// Outcome of [`plan_resource`](crate::plan::plan_resource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State to hand to create or update. Null for a destroy.
    pub planned_state: Value,
    /// Changed attributes, sorted by name.
    pub changes: Vec<AttributeChange>,
    /// A force-new attribute changed.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Nothing to apply; `state` passes through.
    pub fn no_change(state: Value) -> Self {
        Self::with_changes(state, Vec::new(), false)
    }

    /// A plan that applies `changes`.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether applying this plan would touch Flipt.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// State produced by an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Type name, e.g. `flipt_variant`.
    pub resource_type: String,
    /// State as a subsequent read would return it.
    pub state: Value,
}

impl ImportedResource {
    /// Pair a type name with its imported state.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Type names a provider serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource types, sorted.
    pub resources: Vec<String>,
    /// Data source types, sorted.
    pub data_sources: Vec<String>,
}
