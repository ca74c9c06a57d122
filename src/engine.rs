//! The extension-aware validation engine.
//!
//! A depth-first walk over the instance tree. At each object node the
//! engine reads the node's schema declarations, unions them with the
//! context inherited from its ancestors, and validates the subtree
//! rooted at the node against each identifier not already covered by an
//! ancestor's pass. All violations from all nodes and schemas end up in
//! one [`ValidationReport`], in traversal order.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::checker::SchemaChecker;
use crate::context::{declared_schemas, SchemaContext};
use crate::error::{LocationError, ValidateError};
use crate::resolver::SchemaResolver;
use crate::types::{Tags, ValidateOptions, ValidationReport, Violation};

/// Validates instances against their primary schema and any extension
/// schemas declared on nested objects.
///
/// One validator may serve many runs, concurrently; resolved schema
/// documents and compiled validators are reused across all of them.
pub struct ExtValidator {
    resolver: Arc<SchemaResolver>,
    checker: SchemaChecker,
}

impl ExtValidator {
    pub fn new(resolver: SchemaResolver) -> Self {
        let resolver = Arc::new(resolver);
        let checker = SchemaChecker::new(Arc::clone(&resolver));
        Self { resolver, checker }
    }

    /// Create a validator backed by schemas cached as files under a
    /// directory (see [`crate::SchemaLocations::from_directory`]).
    pub fn with_schema_dir(dir: &Path) -> Result<Self, LocationError> {
        Ok(Self::new(SchemaResolver::from_directory(dir)?))
    }

    /// The resolver backing this validator, e.g. for pre-registering
    /// schemas with [`SchemaResolver::register`].
    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    /// Validate an instance document.
    ///
    /// The primary schema comes from `options.schema_uri`, falling back
    /// to the instance's own primary-schema property.
    ///
    /// # Errors
    ///
    /// Fails with `MissingBaseSchema` when no primary schema can be
    /// determined, or with a resolution error when the primary schema
    /// itself is unavailable or unusable. Unavailable *extension*
    /// schemas do not fail the run; they are recorded in the report as
    /// `SchemaUnavailable` violations.
    pub fn validate(
        &self,
        instance: &Value,
        options: &ValidateOptions,
    ) -> Result<ValidationReport, ValidateError> {
        let tags = Tags::with_prefix(&options.tag_prefix);

        let base_uri = options
            .schema_uri
            .clone()
            .or_else(|| {
                instance
                    .get(tags.schema())
                    .and_then(Value::as_str)
                    .map(String::from)
            })
            .ok_or_else(|| ValidateError::MissingBaseSchema {
                tag: tags.schema().to_string(),
            })?;

        // relative/fragment identifiers resolve against the document's
        // own identifier, when it has one
        let doc_id = instance
            .get("$id")
            .or_else(|| instance.get("id"))
            .and_then(Value::as_str)
            .map(String::from);
        let base = doc_id.as_deref();

        let primary = self.resolver.normalize(&base_uri, base);
        debug!(schema = %primary, "validating against primary schema");

        let mut report = ValidationReport::new();

        // the primary schema must be usable; everything else degrades
        // to SchemaUnavailable entries
        let resolved = self.resolver.resolve_with_base(&primary, base)?;
        let violations = self.checker.check(instance, &resolved)?;
        report.extend(violations);

        if options.ignore_extensions {
            return Ok(report);
        }

        let (context, _) = SchemaContext::new().extend(std::slice::from_ref(&primary));
        self.walk(instance, "", &context, base, &tags, &mut report, true);

        Ok(report)
    }

    /// Open a file and validate its contents; equivalent to loading the
    /// JSON and passing it to [`validate`](Self::validate).
    pub fn validate_file(
        &self,
        path: &Path,
        options: &ValidateOptions,
    ) -> Result<ValidationReport, ValidateError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ValidateError::ReadInstance {
                path: path.to_path_buf(),
                source,
            })?;

        let instance: Value =
            serde_json::from_str(&content).map_err(|source| ValidateError::MalformedInstance {
                path: path.to_path_buf(),
                source,
            })?;

        self.validate(&instance, options)
    }

    /// Visit one node: discover declarations, validate the subtree
    /// against freshly declared schemas, then descend with the updated
    /// context. `skip_primary` is set only for the document root, whose
    /// primary schema was established by the caller.
    #[allow(clippy::too_many_arguments)]
    fn walk(
        &self,
        node: &Value,
        location: &str,
        inherited: &SchemaContext,
        base: Option<&str>,
        tags: &Tags,
        report: &mut ValidationReport,
        skip_primary: bool,
    ) {
        match node {
            Value::Object(obj) => {
                let declared = declared_schemas(obj, tags, skip_primary);
                for problem in declared.problems {
                    report.push(Violation::structural(location, problem.tag, problem.message));
                }

                let own: Vec<String> = declared
                    .ids
                    .iter()
                    .map(|id| self.resolver.normalize(id, base))
                    .collect();
                let (context, fresh) = inherited.extend(&own);

                if !fresh.is_empty() {
                    let at = if location.is_empty() { "/" } else { location };
                    debug!(
                        location = at,
                        schemas = fresh.len(),
                        "validating subtree against newly declared schemas"
                    );
                    self.check_fresh(node, location, &fresh, base, report);
                }

                for (key, child) in obj {
                    let child_location = format!("{}/{}", location, escape_pointer_token(key));
                    self.walk(child, &child_location, &context, base, tags, report, false);
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    let child_location = format!("{location}/{index}");
                    self.walk(item, &child_location, inherited, base, tags, report, false);
                }
            }
            // scalars terminate the recursion
            _ => {}
        }
    }

    /// Validate a node's subtree against each schema id, degrading
    /// failures to `SchemaUnavailable` violations at the node.
    fn check_fresh(
        &self,
        node: &Value,
        location: &str,
        ids: &[String],
        base: Option<&str>,
        report: &mut ValidationReport,
    ) {
        for id in ids {
            match self.resolver.resolve_with_base(id, base) {
                Ok(resolved) => match self.checker.check(node, &resolved) {
                    Ok(violations) => {
                        report.extend(violations.into_iter().map(|v| v.prefixed(location)));
                    }
                    Err(err) => {
                        report.push(Violation::unavailable(
                            location,
                            resolved.id.as_str(),
                            err.to_string(),
                        ));
                    }
                },
                Err(err) => {
                    report.push(Violation::unavailable(location, id.as_str(), err.to_string()));
                }
            }
        }
    }
}

impl Default for ExtValidator {
    fn default() -> Self {
        Self::new(SchemaResolver::new())
    }
}

/// Escape a property name for use as a JSON Pointer token (RFC 6901).
fn escape_pointer_token(token: &str) -> std::borrow::Cow<'_, str> {
    if token.contains('~') || token.contains('/') {
        std::borrow::Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
    } else {
        std::borrow::Cow::Borrowed(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ViolationKind;
    use serde_json::json;

    fn validator_with(schemas: Vec<Value>) -> ExtValidator {
        let resolver = SchemaResolver::new().network(false);
        for schema in schemas {
            resolver.register(schema, None).unwrap();
        }
        ExtValidator::new(resolver)
    }

    #[test]
    fn escape_pointer_tokens() {
        assert_eq!(escape_pointer_token("plain"), "plain");
        assert_eq!(escape_pointer_token("a/b"), "a~1b");
        assert_eq!(escape_pointer_token("a~b"), "a~0b");
    }

    #[test]
    fn missing_base_schema_is_fatal() {
        let validator = validator_with(vec![]);
        let result = validator.validate(&json!({"a": 1}), &ValidateOptions::default());
        assert!(matches!(
            result,
            Err(ValidateError::MissingBaseSchema { .. })
        ));
    }

    #[test]
    fn unresolvable_primary_schema_is_fatal() {
        let validator = validator_with(vec![]);
        let instance = json!({"$schema": "https://ex.org/unseen", "a": 1});
        let result = validator.validate(&instance, &ValidateOptions::default());
        assert!(matches!(result, Err(ValidateError::Resolve(_))));
    }

    #[test]
    fn explicit_schema_overrides_root_tag() {
        let validator = validator_with(vec![json!({
            "$id": "https://ex.org/strictly-empty",
            "type": "object",
            "additionalProperties": false,
            "properties": {"$schema": {"type": "string"}}
        })]);

        // the tag names a schema nobody can resolve, but the explicit
        // option wins, so the run succeeds
        let instance = json!({"$schema": "https://ex.org/unseen"});
        let options = ValidateOptions::new().schema_uri("https://ex.org/strictly-empty");
        let report = validator.validate(&instance, &options).unwrap();
        assert!(report.passed(true));
    }

    #[test]
    fn nested_declarations_augment_inherited_context() {
        let validator = validator_with(vec![
            json!({
                "$id": "https://ex.org/s1",
                "type": "object",
                "properties": {"obj": {"type": "object"}}
            }),
            json!({
                "$id": "https://ex.org/s2",
                "not": {"required": ["b"]}
            }),
        ]);

        let instance = json!({
            "$schema": "https://ex.org/s1",
            "obj": {"$extensionSchemas": ["https://ex.org/s2"], "b": true}
        });
        let report = validator
            .validate(&instance, &ValidateOptions::default())
            .unwrap();

        assert_eq!(report.len(), 1);
        let violation = &report.violations()[0];
        assert_eq!(violation.location, "/obj");
        assert_eq!(violation.schema_id, "https://ex.org/s2");
        assert_eq!(violation.kind, ViolationKind::Structural);
    }

    #[test]
    fn repeated_declaration_not_revalidated() {
        let validator = validator_with(vec![json!({
            "$id": "https://ex.org/s1",
            "not": {"required": ["bad"]}
        })]);

        // the child redeclares the schema already inherited from the
        // root; its subtree must not produce a second violation
        let instance = json!({
            "$schema": "https://ex.org/s1",
            "obj": {"$extensionSchemas": ["https://ex.org/s1"]},
            "bad": 1
        });
        let report = validator
            .validate(&instance, &ValidateOptions::default())
            .unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report.violations()[0].location, "");
    }

    #[test]
    fn unavailable_extension_is_tolerated() {
        let validator = validator_with(vec![json!({
            "$id": "https://ex.org/s1",
            "type": "object"
        })]);

        let instance = json!({
            "$schema": "https://ex.org/s1",
            "obj": {"$extensionSchemas": ["https://ex.org/unseen"], "b": true}
        });
        let report = validator
            .validate(&instance, &ValidateOptions::default())
            .unwrap();

        assert_eq!(report.len(), 1);
        let violation = &report.violations()[0];
        assert_eq!(violation.kind, ViolationKind::SchemaUnavailable);
        assert_eq!(violation.location, "/obj");
        assert_eq!(violation.schema_id, "https://ex.org/unseen");
        assert!(report.passed(false));
        assert!(!report.passed(true));
    }

    #[test]
    fn ignore_extensions_skips_discovery() {
        let validator = validator_with(vec![json!({
            "$id": "https://ex.org/s1",
            "type": "object"
        })]);

        let instance = json!({
            "$schema": "https://ex.org/s1",
            "obj": {"$extensionSchemas": ["https://ex.org/unseen"]}
        });
        let options = ValidateOptions::new().ignore_extensions(true);
        let report = validator.validate(&instance, &options).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn declarations_inside_arrays_are_found() {
        let validator = validator_with(vec![
            json!({"$id": "https://ex.org/s1", "type": "object"}),
            json!({"$id": "https://ex.org/item", "required": ["name"]}),
        ]);

        let instance = json!({
            "$schema": "https://ex.org/s1",
            "items": [
                {"$extensionSchemas": ["https://ex.org/item"], "name": "ok"},
                {"$extensionSchemas": ["https://ex.org/item"]}
            ]
        });
        let report = validator
            .validate(&instance, &ValidateOptions::default())
            .unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report.violations()[0].location, "/items/1");
    }

    #[test]
    fn malformed_extension_declaration_reported() {
        let validator = validator_with(vec![json!({
            "$id": "https://ex.org/s1",
            "type": "object",
            "properties": {"obj": {"type": "object"}}
        })]);

        let instance = json!({
            "$schema": "https://ex.org/s1",
            "obj": {"$extensionSchemas": "https://ex.org/s2"}
        });
        let report = validator
            .validate(&instance, &ValidateOptions::default())
            .unwrap();

        assert_eq!(report.len(), 1);
        let violation = &report.violations()[0];
        assert_eq!(violation.location, "/obj");
        assert_eq!(violation.schema_id, "$extensionSchemas");
        assert!(violation.message.contains("not an array"));
    }

    #[test]
    fn nested_primary_tag_joins_context() {
        let validator = validator_with(vec![
            json!({"$id": "https://ex.org/s1", "type": "object"}),
            json!({"$id": "https://ex.org/part", "required": ["name"]}),
        ]);

        let instance = json!({
            "$schema": "https://ex.org/s1",
            "part": {"$schema": "https://ex.org/part"}
        });
        let report = validator
            .validate(&instance, &ValidateOptions::default())
            .unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report.violations()[0].location, "/part");
        assert_eq!(report.violations()[0].schema_id, "https://ex.org/part");
    }

    #[test]
    fn mongodb_safe_prefix() {
        let validator = validator_with(vec![
            json!({"$id": "https://ex.org/s1", "type": "object"}),
            json!({"$id": "https://ex.org/s2", "not": {"required": ["b"]}}),
        ]);

        let instance = json!({
            "_schema": "https://ex.org/s1",
            "obj": {"_extensionSchemas": ["https://ex.org/s2"], "b": 1}
        });
        let options = ValidateOptions::new().tag_prefix("_");
        let report = validator.validate(&instance, &options).unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report.violations()[0].location, "/obj");
    }

    #[test]
    fn fragment_extension_against_document_id() {
        let validator = validator_with(vec![
            json!({"$id": "https://ex.org/s1", "type": "object"}),
            json!({
                "$id": "https://ex.org/defs",
                "definitions": {"Named": {"required": ["name"]}}
            }),
        ]);

        // fragment-only identifier resolves against the instance's id
        let instance = json!({
            "id": "https://ex.org/defs",
            "$schema": "https://ex.org/s1",
            "obj": {"$extensionSchemas": ["#/definitions/Named"]}
        });
        let report = validator
            .validate(&instance, &ValidateOptions::default())
            .unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report.violations()[0].location, "/obj");
        assert_eq!(
            report.violations()[0].schema_id,
            "https://ex.org/defs#/definitions/Named"
        );
    }
}
