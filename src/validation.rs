//! Checks a JSON document against a [`Schema`].
//!
//! Runs before any request reaches Flipt, so a typo in an enum or a missing
//! key comes back as a diagnostic pointing at the attribute rather than as an
//! opaque API error.
//!
//! # Example
//!
//! ```
//! use flipt_provider::schema::{Attribute, Schema};
//! use flipt_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("key", Attribute::required_string())
//!     .with_attribute(
//!         "match_type",
//!         Attribute::optional_computed_string()
//!             .with_allowed_values(["ALL_MATCH_TYPE", "ANY_MATCH_TYPE"]),
//!     );
//!
//! assert!(validate(&schema, &json!({"key": "beta-users"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"key": "beta-users", "match_type": "SOME"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("match_type"));
//! ```

use serde_json::Value;

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};

/// Every problem with `value`, in attribute-name order.
///
/// A null document has nothing to check. Computed-only attributes are
/// ignored since Flipt owns them. A value of the wrong type is reported once;
/// its allowed values are only checked when the type matches.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut checker = Checker::default();
    match value {
        Value::Null => {},
        Value::Object(document) => {
            let mut names: Vec<&String> = schema.attributes.keys().collect();
            names.sort_unstable();
            for name in names {
                checker.attribute(name, &schema.attributes[name], document.get(name));
            }
        },
        other => {
            let found = Diagnostic::error("Expected object");
            checker.found.push(found.with_detail(format!("Got {}", kind(other))));
        },
    }
    checker.found
}

/// [`validate`] as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let found = validate(schema, value);
    if found.is_empty() {
        Ok(())
    } else {
        Err(found)
    }
}

/// `value` has no problems.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

#[derive(Default)]
struct Checker {
    found: Vec<Diagnostic>,
}

impl Checker {
    fn attribute(&mut self, name: &str, attr: &Attribute, value: Option<&Value>) {
        if attr.flags.is_computed_only() {
            return;
        }
        match value {
            None | Some(Value::Null) if attr.flags.required => self.found.push(
                Diagnostic::error(format!("Missing required attribute '{}'", name))
                    .with_detail("Set this attribute in the configuration")
                    .with_attribute(name),
            ),
            None | Some(Value::Null) => {},
            Some(value) => {
                if self.conforms(&attr.attr_type, value, name) {
                    self.allowed(attr, value, name);
                }
            },
        }
    }

    /// Records a mismatch at `path` or below and reports whether there was none.
    fn conforms(&mut self, expected: &AttributeType, value: &Value, path: &str) -> bool {
        let ok = match (expected, value) {
            (AttributeType::String, Value::String(_)) => true,
            (AttributeType::Bool, Value::Bool(_)) => true,
            (AttributeType::Int64, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (AttributeType::List(element), Value::Array(items)) => {
                return items.iter().enumerate().fold(true, |ok, (i, item)| {
                    self.conforms(element, item, &format!("{}.{}", path, i)) && ok
                });
            },
            (AttributeType::Map(element), Value::Object(entries)) => {
                return entries.iter().fold(true, |ok, (key, item)| {
                    self.conforms(element, item, &format!("{}.{}", path, key)) && ok
                });
            },
            _ => false,
        };
        if !ok {
            self.found.push(
                Diagnostic::error(format!("Invalid type for attribute '{}'", path))
                    .with_detail(format!("Expected {}, got {}", type_name(expected), kind(value)))
                    .with_attribute(path),
            );
        }
        ok
    }

    fn allowed(&mut self, attr: &Attribute, value: &Value, name: &str) {
        let Some(s) = value.as_str() else {
            return;
        };
        if attr.allowed_values.is_empty() || attr.allowed_values.iter().any(|a| a == s) {
            return;
        }
        self.found.push(
            Diagnostic::error(format!("Invalid value for attribute '{}'", name))
                .with_detail(format!(
                    "Got \"{}\", expected one of: {}",
                    s,
                    attr.allowed_values.join(", ")
                ))
                .with_attribute(name),
        );
    }
}

fn type_name(attr_type: &AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
        AttributeType::List(_) => "list",
        AttributeType::Map(_) => "map",
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
