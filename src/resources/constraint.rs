//! `flipt_constraint` resource, an element of a segment's `constraints` array.
//!
//! A constraint is identified by its property within the segment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ImportId;
use crate::api::{read_optional, ResourceKind};
use crate::document::{
    base_element, field_str, position_by_field, ChildResource, EmbeddedChild, ParentRef,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Comparison types accepted by Flipt.
pub const COMPARISON_TYPES: [&str; 5] = [
    "STRING_COMPARISON_TYPE",
    "NUMBER_COMPARISON_TYPE",
    "BOOLEAN_COMPARISON_TYPE",
    "DATETIME_COMPARISON_TYPE",
    "ENTITY_ID_COMPARISON_TYPE",
];

/// State of a constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintState {
    /// Environment of the owning segment.
    #[serde(default)]
    pub environment_key: Option<String>,
    /// Namespace of the owning segment.
    pub namespace_key: String,
    /// Owning segment.
    pub segment_key: String,
    /// Context property the constraint tests.
    pub property: String,
    /// Comparison type, e.g. `STRING_COMPARISON_TYPE`.
    #[serde(default, rename = "type")]
    pub comparison_type: String,
    /// Operator, e.g. `eq` or `suffix`.
    #[serde(default)]
    pub operator: String,
    /// Operand, unset for unary operators.
    #[serde(default)]
    pub value: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Field mapping for constraints.
pub struct Constraint;

/// Handler for `flipt_constraint`.
pub type ConstraintResource = ChildResource<Constraint>;

impl EmbeddedChild for Constraint {
    type State = ConstraintState;

    const TYPE_NAME: &'static str = "flipt_constraint";
    const LABEL: &'static str = "constraint";
    const PARENT: ResourceKind = ResourceKind::Segment;
    const COLLECTION: &'static str = "constraints";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A constraint of a segment")
            .with_attribute(
                "environment_key",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute("namespace_key", Attribute::required_string().with_force_new())
            .with_attribute("segment_key", Attribute::required_string().with_force_new())
            .with_attribute(
                "property",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Context property, unique within the segment"),
            )
            .with_attribute(
                "type",
                Attribute::required_string().with_allowed_values(COMPARISON_TYPES),
            )
            .with_attribute("operator", Attribute::required_string())
            .with_attribute("value", Attribute::optional_string())
            .with_attribute("description", Attribute::optional_string())
    }

    fn import_state(id: &str) -> Result<ConstraintState, ProviderError> {
        let (environment, mut parts) =
            ImportId::parse(id, &["namespace_key", "segment_key", "property"])?.into_parts();
        let property = parts.remove(2);
        let segment_key = parts.remove(1);
        let namespace_key = parts.remove(0);
        Ok(ConstraintState {
            environment_key: environment,
            namespace_key,
            segment_key,
            property,
            ..Default::default()
        })
    }

    fn parent(state: &ConstraintState) -> ParentRef {
        ParentRef {
            environment: state.environment_key.clone(),
            namespace: state.namespace_key.clone(),
            key: state.segment_key.clone(),
        }
    }

    fn set_environment(state: &mut ConstraintState, environment: &str) {
        state.environment_key = Some(environment.to_string());
    }

    fn describe(state: &ConstraintState) -> String {
        format!("on property '{}'", state.property)
    }

    fn locate(state: &ConstraintState, children: &[Value]) -> Result<Option<usize>, ProviderError> {
        Ok(position_by_field(children, "property", &state.property))
    }

    fn build(state: &ConstraintState, previous: Option<&Value>) -> Result<Value, ProviderError> {
        let mut element = base_element(previous);
        element.insert("type".to_string(), Value::from(state.comparison_type.as_str()));
        element.insert("property".to_string(), Value::from(state.property.as_str()));
        element.insert("operator".to_string(), Value::from(state.operator.as_str()));
        element.insert(
            "value".to_string(),
            Value::from(state.value.as_deref().unwrap_or("")),
        );
        element.insert(
            "description".to_string(),
            Value::from(state.description.as_deref().unwrap_or("")),
        );
        Ok(Value::Object(element))
    }

    fn refresh(
        current: &ConstraintState,
        element: &Value,
    ) -> Result<ConstraintState, ProviderError> {
        Ok(ConstraintState {
            environment_key: current.environment_key.clone(),
            namespace_key: current.namespace_key.clone(),
            segment_key: current.segment_key.clone(),
            property: field_str(element, "property").to_string(),
            comparison_type: field_str(element, "type").to_string(),
            operator: field_str(element, "operator").to_string(),
            value: read_optional(current.value.as_deref(), field_str(element, "value")),
            description: read_optional(
                current.description.as_deref(),
                field_str(element, "description"),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn email_suffix() -> ConstraintState {
        ConstraintState {
            namespace_key: "production".to_string(),
            segment_key: "beta-users".to_string(),
            property: "email".to_string(),
            comparison_type: "STRING_COMPARISON_TYPE".to_string(),
            operator: "suffix".to_string(),
            value: Some("@beta.example.com".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_build() {
        let element = Constraint::build(&email_suffix(), None).unwrap();
        assert_eq!(
            element,
            json!({
                "type": "STRING_COMPARISON_TYPE",
                "property": "email",
                "operator": "suffix",
                "value": "@beta.example.com",
                "description": ""
            })
        );
    }

    #[test]
    fn test_refresh_round_trip() {
        let declared = email_suffix();
        let element = Constraint::build(&declared, None).unwrap();
        assert_eq!(Constraint::refresh(&declared, &element).unwrap(), declared);
    }

    #[test]
    fn test_locate_by_property() {
        let children = vec![
            json!({"property": "country", "operator": "eq", "value": "NZ"}),
            json!({"property": "email", "operator": "suffix"}),
        ];
        assert_eq!(Constraint::locate(&email_suffix(), &children).unwrap(), Some(1));
    }

    #[test]
    fn test_state_uses_type_key() {
        let value = serde_json::to_value(email_suffix()).unwrap();
        assert_eq!(value["type"], "STRING_COMPARISON_TYPE");
        assert!(value.get("comparison_type").is_none());
    }
}
