//! Core types for extended-schema validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Property name (minus prefix) declaring the primary schema of a document.
pub const SCHEMA_TAG: &str = "schema";

/// Property name (minus prefix) declaring extension schemas on an object.
pub const EXT_SCHEMAS_TAG: &str = "extensionSchemas";

/// Default prefix for the special validation properties.
pub const DEFAULT_TAG_PREFIX: &str = "$";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The resolved names of the special validation properties.
///
/// Instances normally declare their schemas with `$schema` and
/// `$extensionSchemas`. Some stores (most notably MongoDB) reject
/// property names starting with `$`, so the prefix is configurable:
/// a prefix of `_` makes the validator look for `_schema` and
/// `_extensionSchemas` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tags {
    schema: String,
    extensions: String,
}

impl Tags {
    /// Build the property names from a prefix (usually `$` or `_`).
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            schema: format!("{prefix}{SCHEMA_TAG}"),
            extensions: format!("{prefix}{EXT_SCHEMAS_TAG}"),
        }
    }

    /// The primary-schema property name (e.g. `$schema`).
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// The extension-schemas property name (e.g. `$extensionSchemas`).
    pub fn extensions(&self) -> &str {
        &self.extensions
    }
}

impl Default for Tags {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_TAG_PREFIX)
    }
}

/// Classification of a recorded violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The instance fails a rule of an applicable schema.
    Structural,
    /// A declared schema identifier could not be resolved; the subtree
    /// could not be verified against it.
    SchemaUnavailable,
}

/// A single recorded failure of an instance node against one schema.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    /// JSON Pointer (RFC 6901) to the instance node; empty for the root.
    pub location: String,
    /// The schema identifier the node was checked against.
    pub schema_id: String,
    /// Human-readable description.
    pub message: String,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn structural(
        location: impl Into<String>,
        schema_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            schema_id: schema_id.into(),
            message: message.into(),
            kind: ViolationKind::Structural,
        }
    }

    pub fn unavailable(
        location: impl Into<String>,
        schema_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            schema_id: schema_id.into(),
            message: message.into(),
            kind: ViolationKind::SchemaUnavailable,
        }
    }

    /// Rebase the violation's location under a node pointer.
    pub(crate) fn prefixed(mut self, prefix: &str) -> Self {
        if !prefix.is_empty() {
            self.location = format!("{}{}", prefix, self.location);
        }
        self
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let location = if self.location.is_empty() {
            "/"
        } else {
            &self.location
        };
        write!(f, "{} [{}]: {}", location, self.schema_id, self.message)
    }
}

/// The ordered sequence of violations produced by one validation run.
///
/// Violations appear in traversal order: all violations for a node
/// precede those of nodes visited later in the depth-first walk.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.violations.extend(violations);
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.violations.iter()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether the instance passed validation.
    ///
    /// Structural violations always fail the run. `SchemaUnavailable`
    /// entries mean "could not verify" and fail only under `strict`.
    pub fn passed(&self, strict: bool) -> bool {
        self.violations.iter().all(|v| match v.kind {
            ViolationKind::Structural => false,
            ViolationKind::SchemaUnavailable => !strict,
        })
    }
}

impl<'a> IntoIterator for &'a ValidationReport {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.iter()
    }
}

/// Options for a validation run.
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    /// Explicit primary schema for the document as a whole, overriding
    /// the instance's own primary-schema property.
    pub schema_uri: Option<String>,
    /// Validate only against the primary schema, ignoring any extension
    /// declarations in the instance.
    pub ignore_extensions: bool,
    /// When true, `SchemaUnavailable` entries fail
    /// [`ValidationReport::passed`]. They are recorded either way.
    pub strict: bool,
    /// Prefix for the special validation properties (default `$`).
    pub tag_prefix: String,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit primary schema URI for the document.
    pub fn schema_uri(mut self, uri: impl Into<String>) -> Self {
        self.schema_uri = Some(uri.into());
        self
    }

    /// Ignore extension-schema declarations.
    pub fn ignore_extensions(mut self, ignore: bool) -> Self {
        self.ignore_extensions = ignore;
        self
    }

    /// Treat unavailable schemas as failures.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Expect the special validation properties with a different prefix.
    pub fn tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_prefix = prefix.into();
        self
    }
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            schema_uri: None,
            ignore_extensions: false,
            strict: false,
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
        }
    }
}
