//! Schema-driven planning.
//!
//! Flipt resources need no remote call to plan: the diff is a function of the
//! prior state, the proposed state and the schema.

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult};

/// Plan a resource change.
///
/// - No prior state: a create, every set attribute is added.
/// - Null proposed state: a destroy, every set attribute is removed.
/// - Otherwise an update. Computed attributes left unset in the proposal keep
///   their prior value, and a change to a force-new attribute requires
///   replacement.
pub fn plan_resource(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: Value,
) -> Result<PlanResult, ProviderError> {
    let mut names: Vec<&String> = schema.attributes.keys().collect();
    names.sort_unstable();

    let prior = match prior {
        Some(Value::Null) | None => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            return Err(ProviderError::Validation(
                "prior state must be an object".to_string(),
            ))
        },
    };

    let proposed = match proposed {
        Value::Null => {
            let Some(prior) = prior else {
                return Ok(PlanResult::no_change(Value::Null));
            };
            let changes = names
                .iter()
                .filter_map(|name| {
                    set_value(prior, name).map(|v| AttributeChange::removed(*name, v))
                })
                .collect();
            return Ok(PlanResult::with_changes(Value::Null, changes, false));
        },
        Value::Object(map) => map,
        _ => {
            return Err(ProviderError::Validation(
                "proposed state must be an object".to_string(),
            ))
        },
    };

    let Some(prior) = prior else {
        let changes = names
            .iter()
            .filter_map(|name| {
                set_value(&proposed, name).map(|v| AttributeChange::added(*name, v))
            })
            .collect();
        return Ok(PlanResult::with_changes(Value::Object(proposed), changes, false));
    };

    let mut planned = proposed;
    for name in &names {
        let attr = &schema.attributes[*name];
        if attr.flags.computed && set_value(&planned, name).is_none() {
            if let Some(previous) = set_value(prior, name) {
                planned.insert((*name).clone(), previous);
            }
        }
    }

    let mut changes = Vec::new();
    let mut requires_replace = false;
    for name in &names {
        let before = set_value(prior, name);
        let after = set_value(&planned, name);
        let change = match (before, after) {
            (None, None) => continue,
            (Some(b), Some(a)) if b == a => continue,
            (None, Some(a)) => AttributeChange::added(*name, a),
            (Some(b), None) => AttributeChange::removed(*name, b),
            (Some(b), Some(a)) => AttributeChange::modified(*name, b, a),
        };
        if schema.attributes[*name].force_new {
            requires_replace = true;
        }
        changes.push(change);
    }

    if changes.is_empty() {
        return Ok(PlanResult::no_change(Value::Object(planned)));
    }
    Ok(PlanResult::with_changes(
        Value::Object(planned),
        changes,
        requires_replace,
    ))
}

fn set_value(state: &Map<String, Value>, name: &str) -> Option<Value> {
    match state.get(name) {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "environment_key",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute("key", Attribute::required_string().with_force_new())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("created_at", Attribute::computed_string())
    }

    #[test]
    fn test_plan_create() {
        let proposed = json!({"key": "production", "name": "Production"});
        let plan = plan_resource(&schema(), None, proposed).unwrap();
        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["key", "name"]);
        assert!(!plan.requires_replace);
        assert_eq!(plan.planned_state["name"], "Production");
    }

    #[test]
    fn test_plan_update_carries_computed_values() {
        let prior = json!({
            "environment_key": "default",
            "key": "production",
            "name": "Production",
            "created_at": "2025-01-01T00:00:00Z"
        });
        let plan = plan_resource(
            &schema(),
            Some(&prior),
            json!({"key": "production", "name": "Production"}),
        )
        .unwrap();
        assert!(plan.changes.is_empty());
        assert_eq!(plan.planned_state["environment_key"], "default");
        assert_eq!(plan.planned_state["created_at"], "2025-01-01T00:00:00Z");
    }

    #[test]
    fn test_plan_update_in_place() {
        let prior = json!({"key": "production", "name": "Production", "description": "old"});
        let plan = plan_resource(
            &schema(),
            Some(&prior),
            json!({"key": "production", "name": "Prod"}),
        )
        .unwrap();
        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 2);
        assert_eq!(plan.changes[0], AttributeChange::removed("description", json!("old")));
        assert_eq!(
            plan.changes[1],
            AttributeChange::modified("name", json!("Production"), json!("Prod"))
        );
    }

    #[test]
    fn test_plan_force_new_requires_replace() {
        let prior = json!({"key": "production", "name": "Production"});
        let plan = plan_resource(
            &schema(),
            Some(&prior),
            json!({"key": "staging", "name": "Production"}),
        )
        .unwrap();
        assert!(plan.requires_replace);
    }

    #[test]
    fn test_plan_destroy() {
        let prior = json!({"key": "production", "name": "Production"});
        let plan = plan_resource(&schema(), Some(&prior), Value::Null).unwrap();
        assert!(plan.planned_state.is_null());
        assert_eq!(plan.changes.len(), 2);
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }

    #[test]
    fn test_plan_rejects_non_objects() {
        assert!(plan_resource(&schema(), None, json!("production")).is_err());
    }
}
