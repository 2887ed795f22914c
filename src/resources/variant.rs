//! `flipt_variant` resource, an element of a flag's `variants` array.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ImportId;
use crate::api::{read_optional, ResourceKind};
use crate::document::{
    base_element, field_str, position_by_field, ChildResource, EmbeddedChild, ParentRef,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// State of a variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantState {
    /// Environment of the owning flag.
    #[serde(default)]
    pub environment_key: Option<String>,
    /// Namespace of the owning flag.
    pub namespace_key: String,
    /// Owning flag.
    pub flag_key: String,
    /// Variant key, unique within the flag.
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Attachment as a JSON document string.
    #[serde(default)]
    pub attachment: Option<String>,
}

/// Field mapping for variants.
pub struct Variant;

/// Handler for `flipt_variant`.
pub type VariantResource = ChildResource<Variant>;

impl EmbeddedChild for Variant {
    type State = VariantState;

    const TYPE_NAME: &'static str = "flipt_variant";
    const LABEL: &'static str = "variant";
    const PARENT: ResourceKind = ResourceKind::Flag;
    const COLLECTION: &'static str = "variants";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("A variant served by a flag")
            .with_attribute(
                "environment_key",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute("namespace_key", Attribute::required_string().with_force_new())
            .with_attribute("flag_key", Attribute::required_string().with_force_new())
            .with_attribute(
                "key",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Unique variant key within the flag"),
            )
            .with_attribute("name", Attribute::optional_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "attachment",
                Attribute::optional_string()
                    .with_description("JSON document attached to the variant"),
            )
    }

    fn import_state(id: &str) -> Result<VariantState, ProviderError> {
        let (environment, mut parts) =
            ImportId::parse(id, &["namespace_key", "flag_key", "key"])?.into_parts();
        let key = parts.remove(2);
        let flag_key = parts.remove(1);
        let namespace_key = parts.remove(0);
        Ok(VariantState {
            environment_key: environment,
            namespace_key,
            flag_key,
            key,
            ..Default::default()
        })
    }

    fn parent(state: &VariantState) -> ParentRef {
        ParentRef {
            environment: state.environment_key.clone(),
            namespace: state.namespace_key.clone(),
            key: state.flag_key.clone(),
        }
    }

    fn set_environment(state: &mut VariantState, environment: &str) {
        state.environment_key = Some(environment.to_string());
    }

    fn describe(state: &VariantState) -> String {
        format!("'{}'", state.key)
    }

    fn locate(state: &VariantState, children: &[Value]) -> Result<Option<usize>, ProviderError> {
        Ok(position_by_field(children, "key", &state.key))
    }

    fn build(state: &VariantState, previous: Option<&Value>) -> Result<Value, ProviderError> {
        let mut element = base_element(previous);
        element.insert("key".to_string(), Value::from(state.key.as_str()));
        element.insert(
            "name".to_string(),
            Value::from(state.name.as_deref().unwrap_or("")),
        );
        element.insert(
            "description".to_string(),
            Value::from(state.description.as_deref().unwrap_or("")),
        );
        element.insert(
            "attachment".to_string(),
            parse_attachment(state.attachment.as_deref())?,
        );
        Ok(Value::Object(element))
    }

    fn refresh(current: &VariantState, element: &Value) -> Result<VariantState, ProviderError> {
        Ok(VariantState {
            environment_key: current.environment_key.clone(),
            namespace_key: current.namespace_key.clone(),
            flag_key: current.flag_key.clone(),
            key: field_str(element, "key").to_string(),
            name: read_optional(current.name.as_deref(), field_str(element, "name")),
            description: read_optional(
                current.description.as_deref(),
                field_str(element, "description"),
            ),
            attachment: read_attachment(current.attachment.as_deref(), element.get("attachment"))?,
        })
    }
}

/// Parse a declared attachment. Unset or blank becomes `{}`.
///
/// Flipt attachments are JSON objects; any other document is rejected before
/// it reaches the API.
pub fn parse_attachment(raw: Option<&str>) -> Result<Value, ProviderError> {
    let text = match raw.map(str::trim) {
        None | Some("") => return Ok(Value::Object(Map::new())),
        Some(text) => text,
    };
    let invalid = |detail: String| {
        ProviderError::Validation(format!("attachment must be valid JSON: {}", detail))
    };
    match serde_json::from_str::<Value>(text).map_err(|e| invalid(e.to_string()))? {
        document @ Value::Object(_) => Ok(document),
        other => Err(invalid(format!("expected an object, got {}", json_kind(&other)))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Render a stored attachment back into state.
///
/// When the stored document is semantically equal to the declared one, the
/// declared string is kept verbatim, so `"{}"` survives a refresh. Otherwise
/// an empty document reads as unset.
pub fn read_attachment(
    declared: Option<&str>,
    stored: Option<&Value>,
) -> Result<Option<String>, ProviderError> {
    let stored = match stored {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::String(s)) if s.trim().is_empty() => Value::Object(Map::new()),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(v) => v,
            Err(_) => return Ok(Some(s.clone())),
        },
        Some(v) => v.clone(),
    };

    if let Some(declared) = declared {
        if parse_attachment(Some(declared)).ok().as_ref() == Some(&stored) {
            return Ok(Some(declared.to_string()));
        }
    }
    if stored.as_object().is_some_and(Map::is_empty) {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(&stored)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(key: &str) -> VariantState {
        VariantState {
            namespace_key: "production".to_string(),
            flag_key: "new-feature".to_string(),
            key: key.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_applies_defaults() {
        let element = Variant::build(&state("variant-a"), None).unwrap();
        assert_eq!(
            element,
            json!({"key": "variant-a", "name": "", "description": "", "attachment": {}})
        );
    }

    #[test]
    fn test_build_carries_undeclared_fields() {
        let previous = json!({"key": "variant-a", "id": "v1", "name": "old"});
        let mut planned = state("variant-a");
        planned.name = Some("Variant A".to_string());
        let element = Variant::build(&planned, Some(&previous)).unwrap();
        assert_eq!(element["id"], "v1");
        assert_eq!(element["name"], "Variant A");
    }

    #[test]
    fn test_build_rejects_invalid_attachment() {
        let mut planned = state("variant-a");
        planned.attachment = Some("{not json".to_string());
        let err = Variant::build(&planned, None).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_refresh_maps_empty_to_unset() {
        let element = json!({"key": "variant-a", "name": "", "description": "", "attachment": {}});
        let refreshed = Variant::refresh(&state("variant-a"), &element).unwrap();
        assert_eq!(refreshed.name, None);
        assert_eq!(refreshed.description, None);
        assert_eq!(refreshed.attachment, None);
    }

    #[test]
    fn test_attachment_keeps_declared_formatting() {
        let declared = "{ \"color\": \"blue\",  \"size\": 2 }";
        let stored = json!({"size": 2, "color": "blue"});
        assert_eq!(
            read_attachment(Some(declared), Some(&stored)).unwrap().as_deref(),
            Some(declared)
        );

        let changed = json!({"color": "red"});
        assert_eq!(
            read_attachment(Some(declared), Some(&changed)).unwrap().as_deref(),
            Some("{\"color\":\"red\"}")
        );
    }

    #[test]
    fn test_attachment_stored_as_string() {
        let stored = json!("{\"a\":1}");
        assert_eq!(
            read_attachment(Some("{\"a\": 1}"), Some(&stored)).unwrap().as_deref(),
            Some("{\"a\": 1}")
        );
        assert_eq!(read_attachment(None, Some(&json!(""))).unwrap(), None);
    }

    #[test]
    fn test_build_rejects_non_object_attachment() {
        for raw in ["[1,2]", "\"x\"", "42", "null"] {
            let mut planned = state("variant-a");
            planned.attachment = Some(raw.to_string());
            match Variant::build(&planned, None) {
                Err(ProviderError::Validation(msg)) => {
                    assert!(msg.contains("attachment must be valid JSON"), "{}", msg)
                },
                other => panic!("{} accepted: {:?}", raw, other),
            }
        }
    }

    fn declared_empties() -> VariantState {
        VariantState {
            environment_key: Some("default".to_string()),
            name: Some(String::new()),
            description: Some(String::new()),
            attachment: Some("{}".to_string()),
            ..state("variant-a")
        }
    }

    #[test]
    fn test_empty_declarations_survive_refresh() {
        let declared = declared_empties();
        let element = Variant::build(&declared, None).unwrap();
        assert_eq!(element["attachment"], json!({}));

        let refreshed = Variant::refresh(&declared, &element).unwrap();
        assert_eq!(refreshed, declared);
    }

    #[test]
    fn test_empty_declarations_plan_no_changes() {
        let declared = declared_empties();
        let element = Variant::build(&declared, None).unwrap();
        let refreshed = Variant::refresh(&declared, &element).unwrap();

        let plan = crate::plan::plan_resource(
            &Variant::schema(),
            Some(&serde_json::to_value(&refreshed).unwrap()),
            serde_json::to_value(&declared).unwrap(),
        )
        .unwrap();
        assert!(plan.changes.is_empty(), "{:?}", plan.changes);
    }

    #[test]
    fn test_attachment_blank_declaration_matches_empty_document() {
        assert_eq!(read_attachment(Some(""), Some(&json!({}))).unwrap().as_deref(), Some(""));
        assert_eq!(read_attachment(Some("{}"), None).unwrap().as_deref(), Some("{}"));
        assert_eq!(read_attachment(Some("{\"a\":1}"), Some(&json!({}))).unwrap(), None);
    }

    #[test]
    fn test_locate_by_key() {
        let children = vec![json!({"key": "variant-a"}), json!({"key": "variant-b"})];
        assert_eq!(Variant::locate(&state("variant-b"), &children).unwrap(), Some(1));
        assert_eq!(Variant::locate(&state("variant-c"), &children).unwrap(), None);
    }

    #[test]
    fn test_import_state() {
        let imported = Variant::import_state("production/new-feature/variant-a").unwrap();
        assert_eq!(imported, state("variant-a"));
    }
}
