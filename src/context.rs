//! Discovery of the schemas that govern an instance node.
//!
//! Every object node may declare a primary schema (`$schema`) and a
//! list of extension schemas (`$extensionSchemas`). The set governing a
//! node is its own declarations unioned with everything inherited from
//! its nearest declaring ancestor: deeper declarations add to the
//! inherited set, they never replace it.

use serde_json::{Map, Value};

use crate::types::{json_type_name, Tags};

/// The ordered set of schema identifiers governing a node.
///
/// Inherited identifiers come first, then the node's own, with
/// duplicates removed by first occurrence. Ordering only affects
/// diagnostic ordering; every identifier is checked independently.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    ids: Vec<String>,
}

impl SchemaContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|known| known == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Union this context with a node's own declared identifiers.
    ///
    /// Returns the node's new context and the identifiers that were not
    /// already inherited. Only those fresh identifiers need a
    /// validation pass at the node: its subtree is already covered for
    /// the rest by an ancestor's pass.
    pub fn extend(&self, own: &[String]) -> (SchemaContext, Vec<String>) {
        let mut next = self.clone();
        let mut fresh = Vec::new();

        for id in own {
            if !next.contains(id) {
                next.ids.push(id.clone());
                fresh.push(id.clone());
            }
        }
        (next, fresh)
    }
}

/// A problem with how a node declares its schemas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationProblem {
    /// The property the problem was found in.
    pub tag: String,
    pub message: String,
}

/// The identifiers an object node declares for itself.
#[derive(Debug, Default)]
pub struct Declared {
    /// Identifiers in declaration order: primary first, then extensions.
    pub ids: Vec<String>,
    /// Malformed declarations, reported but not fatal.
    pub problems: Vec<DeclarationProblem>,
}

/// Read a node's own schema declarations.
///
/// `skip_primary` suppresses the primary-schema property; the engine
/// sets it at the document root, where the base schema is established
/// separately (and an explicit base overrides the root property).
pub fn declared_schemas(node: &Map<String, Value>, tags: &Tags, skip_primary: bool) -> Declared {
    let mut out = Declared::default();

    if !skip_primary {
        if let Some(value) = node.get(tags.schema()) {
            match value.as_str() {
                Some(id) => out.ids.push(id.to_string()),
                None => out.problems.push(DeclarationProblem {
                    tag: tags.schema().to_string(),
                    message: format!(
                        "invalid value type for {} (expected string, got {})",
                        tags.schema(),
                        json_type_name(value)
                    ),
                }),
            }
        }
    }

    if let Some(value) = node.get(tags.extensions()) {
        match value {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    match item.as_str() {
                        Some(id) => out.ids.push(id.to_string()),
                        None => out.problems.push(DeclarationProblem {
                            tag: tags.extensions().to_string(),
                            message: format!(
                                "invalid {} array item at index {} (expected string, got {})",
                                tags.extensions(),
                                index,
                                json_type_name(item)
                            ),
                        }),
                    }
                }
            }
            other => out.problems.push(DeclarationProblem {
                tag: tags.extensions().to_string(),
                message: format!(
                    "invalid value type for {} (not an array): got {}",
                    tags.extensions(),
                    json_type_name(other)
                ),
            }),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn context_extend_unions_in_order() {
        let (ctx, fresh) = SchemaContext::new().extend(&["s1".into(), "s2".into()]);
        assert_eq!(ctx.ids(), ["s1", "s2"]);
        assert_eq!(fresh, ["s1", "s2"]);

        let (child, fresh) = ctx.extend(&["s2".into(), "s3".into()]);
        assert_eq!(child.ids(), ["s1", "s2", "s3"]);
        assert_eq!(fresh, ["s3"]);
    }

    #[test]
    fn context_extend_no_declarations() {
        let (ctx, _) = SchemaContext::new().extend(&["s1".into()]);
        let (child, fresh) = ctx.extend(&[]);
        assert_eq!(child.ids(), ctx.ids());
        assert!(fresh.is_empty());
    }

    #[test]
    fn context_dedups_repeated_own_ids() {
        let (ctx, fresh) = SchemaContext::new().extend(&["s1".into(), "s1".into()]);
        assert_eq!(ctx.ids(), ["s1"]);
        assert_eq!(fresh, ["s1"]);
    }

    #[test]
    fn declared_primary_and_extensions() {
        let node = obj(json!({
            "$schema": "https://ex.org/s1",
            "$extensionSchemas": ["https://ex.org/s2", "https://ex.org/s3"],
            "data": 1
        }));

        let declared = declared_schemas(&node, &Tags::default(), false);
        assert_eq!(
            declared.ids,
            ["https://ex.org/s1", "https://ex.org/s2", "https://ex.org/s3"]
        );
        assert!(declared.problems.is_empty());
    }

    #[test]
    fn declared_skip_primary() {
        let node = obj(json!({
            "$schema": "https://ex.org/s1",
            "$extensionSchemas": ["https://ex.org/s2"]
        }));

        let declared = declared_schemas(&node, &Tags::default(), true);
        assert_eq!(declared.ids, ["https://ex.org/s2"]);
    }

    #[test]
    fn declared_honors_tag_prefix() {
        let node = obj(json!({
            "_schema": "https://ex.org/s1",
            "_extensionSchemas": ["https://ex.org/s2"],
            "$schema": "https://ex.org/ignored"
        }));

        let declared = declared_schemas(&node, &Tags::with_prefix("_"), false);
        assert_eq!(declared.ids, ["https://ex.org/s1", "https://ex.org/s2"]);
    }

    #[test]
    fn declared_extensions_not_an_array() {
        let node = obj(json!({"$extensionSchemas": "https://ex.org/s2"}));

        let declared = declared_schemas(&node, &Tags::default(), false);
        assert!(declared.ids.is_empty());
        assert_eq!(declared.problems.len(), 1);
        assert_eq!(declared.problems[0].tag, "$extensionSchemas");
        assert!(declared.problems[0].message.contains("not an array"));
    }

    #[test]
    fn declared_extension_item_not_a_string() {
        let node = obj(json!({"$extensionSchemas": ["https://ex.org/s2", 42]}));

        let declared = declared_schemas(&node, &Tags::default(), false);
        // the valid entry is still used
        assert_eq!(declared.ids, ["https://ex.org/s2"]);
        assert_eq!(declared.problems.len(), 1);
        assert!(declared.problems[0].message.contains("index 1"));
    }

    #[test]
    fn declared_primary_not_a_string() {
        let node = obj(json!({"$schema": 42}));

        let declared = declared_schemas(&node, &Tags::default(), false);
        assert!(declared.ids.is_empty());
        assert_eq!(declared.problems[0].tag, "$schema");
    }

    #[test]
    fn declared_nothing() {
        let node = obj(json!({"data": 1}));
        let declared = declared_schemas(&node, &Tags::default(), false);
        assert!(declared.ids.is_empty());
        assert!(declared.problems.is_empty());
    }
}
