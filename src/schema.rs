//! Attribute schemas and diagnostics.
//!
//! Every Flipt resource is a flat object: an identity (environment, namespace,
//! parent key, own key), a handful of scalar attributes and, for flags, a
//! string map of metadata. The schema tells the orchestrator which of those
//! attributes it must supply, which the provider computes, and which force the
//! resource to be replaced when they change.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// UTF-8 string. Flipt enums are strings too.
    String,
    /// Signed integer, used for rule ranks.
    Int64,
    /// Boolean.
    Bool,
    /// Homogeneous list.
    List(Box<AttributeType>),
    /// String-keyed homogeneous map.
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// `List` of `element`.
    pub fn list(element: AttributeType) -> Self {
        Self::List(Box::new(element))
    }

    /// `Map` of `element`.
    pub fn map(element: AttributeType) -> Self {
        Self::Map(Box::new(element))
    }
}

/// Who sets an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Configuration must set it.
    pub required: bool,
    /// Configuration may set it.
    pub optional: bool,
    /// The provider fills it in from Flipt.
    pub computed: bool,
    /// Never logged or shown.
    pub sensitive: bool,
}

impl AttributeFlags {
    const fn usage(required: bool, optional: bool, computed: bool) -> Self {
        Self {
            required,
            optional,
            computed,
            sensitive: false,
        }
    }

    /// Must be configured.
    pub const fn required() -> Self {
        Self::usage(true, false, false)
    }

    /// May be configured.
    pub const fn optional() -> Self {
        Self::usage(false, true, false)
    }

    /// Read back from Flipt only.
    pub const fn computed() -> Self {
        Self::usage(false, false, true)
    }

    /// May be configured; Flipt's value is used otherwise.
    pub const fn optional_computed() -> Self {
        Self::usage(false, true, true)
    }

    /// Configuration can never set it.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !(self.optional || self.required)
    }
}

/// One attribute of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Usage flags.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Shown to users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change replaces the object rather than updating it.
    #[serde(default)]
    pub force_new: bool,
    /// Accepted values of an enum-like string. Empty means unrestricted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
}

macro_rules! typed_constructors {
    ($($(#[$doc:meta])* $name:ident => $ty:expr, $flags:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name() -> Self {
                Self::new($ty, AttributeFlags::$flags())
            }
        )*
    };
}

impl Attribute {
    /// An attribute of type `attr_type` used as `flags` describes.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            allowed_values: Vec::new(),
        }
    }

    typed_constructors! {
        /// Required string, e.g. a key.
        required_string => AttributeType::String, required;
        /// Optional string.
        optional_string => AttributeType::String, optional;
        /// String read back from Flipt.
        computed_string => AttributeType::String, computed;
        /// Optional string Flipt defaults.
        optional_computed_string => AttributeType::String, optional_computed;
        /// Optional integer Flipt defaults.
        optional_computed_int64 => AttributeType::Int64, optional_computed;
        /// Optional bool Flipt defaults.
        optional_computed_bool => AttributeType::Bool, optional_computed;
        /// Bool read back from Flipt.
        computed_bool => AttributeType::Bool, computed;
        /// Required list of strings.
        required_string_list => AttributeType::list(AttributeType::String), required;
        /// Optional string map.
        optional_string_map => AttributeType::map(AttributeType::String), optional;
        /// String map read back from Flipt.
        computed_string_map => AttributeType::map(AttributeType::String), computed;
    }

    /// Attach user-facing text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Changing the value replaces the object.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Restrict to the given enum values.
    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Hide the value from logs and plans.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// Attributes of one resource, data source, or the provider block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// State layout version.
    #[serde(default)]
    pub version: u64,
    /// Shown to users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Attributes by state name.
    #[serde(default)]
    pub attributes: HashMap<String, Attribute>,
}

impl Schema {
    /// Empty schema at `version`.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Empty schema at version 0. Every Flipt schema is still at 0.
    pub fn v0() -> Self {
        Self::default()
    }

    /// Attach user-facing text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add or replace `name`.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// `name`, if declared.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Sorted names of force-new attributes.
    pub fn force_new_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .attributes
            .iter()
            .filter_map(|(name, attr)| attr.force_new.then_some(name.as_str()))
            .collect();
        names.sort_unstable();
        names
    }
}

/// Everything a provider declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Provider block.
    #[serde(default)]
    pub provider: Schema,
    /// Resource schemas by type name.
    #[serde(default)]
    pub resources: HashMap<String, Schema>,
    /// Data source schemas by type name.
    #[serde(default)]
    pub data_sources: HashMap<String, Schema>,
}

impl ProviderSchema {
    /// No provider attributes, resources or data sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider block.
    pub fn with_provider_config(self, provider: Schema) -> Self {
        Self { provider, ..self }
    }

    /// Register a resource type.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Register a data source type.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The call did not take effect.
    Error,
    /// Worth surfacing; the call went ahead.
    Warning,
}

/// A validation or configuration finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: DiagnosticSeverity,
    /// One-line headline.
    pub summary: String,
    /// Longer explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Offending attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// An error headed by `summary`.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary)
    }

    /// A warning headed by `summary`.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary)
    }

    /// Add an explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Point at an attribute.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Severity is [`DiagnosticSeverity::Error`].
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
