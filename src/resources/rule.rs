//! `flipt_rule` resource, an element of a flag's `rules` array.
//!
//! Rules are matched by server id when one is known and present, otherwise by
//! rank. An element's rank is its `rank` field, or its array position when the
//! field is missing. Two rules at the same rank make the match ambiguous, so
//! that case is reported instead of guessed, and writes that would create it
//! are refused.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ImportId;
use crate::api::{non_empty, ResourceKind};
use crate::document::{
    base_element, field_str, position_by_field, ChildResource, EmbeddedChild, ParentRef,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Match if any segment matches.
pub const OR_SEGMENT_OPERATOR: &str = "OR_SEGMENT_OPERATOR";
/// Match only if every segment matches.
pub const AND_SEGMENT_OPERATOR: &str = "AND_SEGMENT_OPERATOR";

/// State of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleState {
    /// Environment of the owning flag.
    #[serde(default)]
    pub environment_key: Option<String>,
    /// Namespace of the owning flag.
    pub namespace_key: String,
    /// Owning flag.
    pub flag_key: String,
    /// Server-generated id, when the server assigns one.
    #[serde(default)]
    pub id: Option<String>,
    /// Segments the rule evaluates.
    #[serde(default)]
    pub segment_keys: Vec<String>,
    /// How segments combine.
    #[serde(default)]
    pub segment_operator: Option<String>,
    /// Evaluation order within the flag.
    #[serde(default)]
    pub rank: Option<i64>,
}

/// Field mapping for rules.
pub struct Rule;

/// Handler for `flipt_rule`.
pub type RuleResource = ChildResource<Rule>;

/// The rank of the element at `index`.
pub fn element_rank(element: &Value, index: usize) -> i64 {
    match element.get("rank") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(index as i64),
        Some(Value::String(s)) => s.parse().unwrap_or(index as i64),
        _ => index as i64,
    }
}

/// Segment keys of a stored rule. Accepts plain strings as well as objects
/// carrying `segmentKey` or `key`.
pub fn segment_keys(element: &Value) -> Vec<String> {
    let from_list = element
        .get("segments")
        .and_then(Value::as_array)
        .map(|segments| {
            segments
                .iter()
                .filter_map(|s| match s {
                    Value::String(key) => Some(key.clone()),
                    Value::Object(obj) => obj
                        .get("segmentKey")
                        .or_else(|| obj.get("key"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if from_list.is_empty() {
        if let Some(key) = non_empty(field_str(element, "segmentKey")) {
            return vec![key];
        }
    }
    from_list
}

fn ranked(children: &[Value], rank: i64) -> Vec<usize> {
    children
        .iter()
        .enumerate()
        .filter(|(i, c)| element_rank(c, *i) == rank)
        .map(|(i, _)| i)
        .collect()
}

impl EmbeddedChild for Rule {
    type State = RuleState;

    const TYPE_NAME: &'static str = "flipt_rule";
    const LABEL: &'static str = "rule";
    const PARENT: ResourceKind = ResourceKind::Flag;
    const COLLECTION: &'static str = "rules";

    fn schema() -> Schema {
        Schema::v0()
            .with_description("An evaluation rule of a flag")
            .with_attribute(
                "environment_key",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute("namespace_key", Attribute::required_string().with_force_new())
            .with_attribute("flag_key", Attribute::required_string().with_force_new())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("segment_keys", Attribute::required_string_list())
            .with_attribute(
                "segment_operator",
                Attribute::optional_computed_string()
                    .with_allowed_values([OR_SEGMENT_OPERATOR, AND_SEGMENT_OPERATOR]),
            )
            .with_attribute(
                "rank",
                Attribute::optional_computed_int64()
                    .with_description("Evaluation order, defaults to after the last rule"),
            )
    }

    fn import_state(id: &str) -> Result<RuleState, ProviderError> {
        let (environment, mut parts) =
            ImportId::parse(id, &["namespace_key", "flag_key", "rank"])?.into_parts();
        let rank = parts.remove(2);
        let rank: i64 = rank.parse().map_err(|_| {
            ProviderError::Validation(format!(
                "invalid import id '{}', rank '{}' is not an integer",
                id, rank
            ))
        })?;
        let flag_key = parts.remove(1);
        let namespace_key = parts.remove(0);
        Ok(RuleState {
            environment_key: environment,
            namespace_key,
            flag_key,
            rank: Some(rank),
            ..Default::default()
        })
    }

    fn parent(state: &RuleState) -> ParentRef {
        ParentRef {
            environment: state.environment_key.clone(),
            namespace: state.namespace_key.clone(),
            key: state.flag_key.clone(),
        }
    }

    fn set_environment(state: &mut RuleState, environment: &str) {
        state.environment_key = Some(environment.to_string());
    }

    fn describe(state: &RuleState) -> String {
        match (&state.id, state.rank) {
            (Some(id), _) if !id.is_empty() => format!("with id '{}'", id),
            (_, Some(rank)) => format!("at rank {}", rank),
            _ => "without id or rank".to_string(),
        }
    }

    fn locate(state: &RuleState, children: &[Value]) -> Result<Option<usize>, ProviderError> {
        if let Some(id) = state.id.as_deref().filter(|id| !id.is_empty()) {
            if let Some(index) = position_by_field(children, "id", id) {
                return Ok(Some(index));
            }
        }

        let Some(rank) = state.rank else {
            return Ok(None);
        };
        let matches = ranked(children, rank);
        match matches.as_slice() {
            [] => Ok(None),
            [index] => Ok(Some(*index)),
            _ => Err(ProviderError::FailedPrecondition(format!(
                "{} rules of flag '{}' share rank {}, cannot tell which one is managed",
                matches.len(),
                state.flag_key,
                rank
            ))),
        }
    }

    fn prepare(state: &mut RuleState, children: &[Value], slot: Option<usize>) {
        if state.rank.is_none() {
            state.rank = Some(match slot {
                Some(index) => element_rank(&children[index], index),
                None => children
                    .iter()
                    .enumerate()
                    .map(|(i, c)| element_rank(c, i))
                    .max()
                    .map_or(0, |highest| highest + 1),
            });
        }
        if state
            .segment_operator
            .as_deref()
            .map_or(true, str::is_empty)
        {
            state.segment_operator = Some(OR_SEGMENT_OPERATOR.to_string());
        }
        if slot.is_none() {
            state.id = None;
        }
    }

    fn admit(
        state: &RuleState,
        children: &[Value],
        slot: Option<usize>,
    ) -> Result<(), ProviderError> {
        let Some(rank) = state.rank else {
            return Ok(());
        };
        let taken = ranked(children, rank)
            .into_iter()
            .any(|index| Some(index) != slot);
        if taken {
            return Err(ProviderError::FailedPrecondition(format!(
                "rank {} is already held by another rule of flag '{}'",
                rank, state.flag_key
            )));
        }
        Ok(())
    }

    fn build(state: &RuleState, previous: Option<&Value>) -> Result<Value, ProviderError> {
        if state.segment_keys.is_empty() {
            return Err(ProviderError::Validation(
                "a rule needs at least one segment key".to_string(),
            ));
        }

        let mut element = base_element(previous);
        element.insert(
            "segments".to_string(),
            Value::from(state.segment_keys.clone()),
        );
        element.remove("segmentKey");
        element.insert(
            "segmentOperator".to_string(),
            Value::from(state.segment_operator.as_deref().unwrap_or(OR_SEGMENT_OPERATOR)),
        );
        if let Some(rank) = state.rank {
            element.insert("rank".to_string(), Value::from(rank));
        }
        element
            .entry("distributions")
            .or_insert_with(|| Value::Array(Vec::new()));
        Ok(Value::Object(element))
    }

    fn refresh(current: &RuleState, element: &Value) -> Result<RuleState, ProviderError> {
        let operator = match field_str(element, "segmentOperator") {
            "" => OR_SEGMENT_OPERATOR,
            op => op,
        };
        let rank = match element.get("rank") {
            Some(_) => Some(element_rank(element, 0)),
            None => current.rank,
        };
        Ok(RuleState {
            environment_key: current.environment_key.clone(),
            namespace_key: current.namespace_key.clone(),
            flag_key: current.flag_key.clone(),
            id: non_empty(field_str(element, "id")).or_else(|| current.id.clone()),
            segment_keys: segment_keys(element),
            segment_operator: Some(operator.to_string()),
            rank,
        })
    }

    fn after_store(state: &mut RuleState, stored: &[Value]) {
        let Some(rank) = state.rank else {
            return;
        };
        if let [index] = ranked(stored, rank).as_slice() {
            if let Some(id) = non_empty(field_str(&stored[*index], "id")) {
                state.id = Some(id);
            }
        }
    }
}
