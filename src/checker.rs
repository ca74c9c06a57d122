//! Structural validation of one node against one schema.
//!
//! All rule evaluation (type, required, pattern, `$ref`, ...) is
//! delegated to the `jsonschema` crate; this adapter only compiles
//! schemas, caches the compiled validators, and translates the crate's
//! native errors into [`Violation`] records tagged with the schema
//! identifier that produced them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::error::ResolveError;
use crate::resolver::{ResolvedSchema, ResolverRetriever, SchemaResolver};
use crate::types::Violation;

/// Compiles and applies single schemas, reusing compiled validators
/// across nodes and runs.
pub struct SchemaChecker {
    resolver: Arc<SchemaResolver>,
    compiled: RwLock<HashMap<String, Arc<jsonschema::Validator>>>,
}

impl SchemaChecker {
    pub fn new(resolver: Arc<SchemaResolver>) -> Self {
        Self {
            resolver,
            compiled: RwLock::new(HashMap::new()),
        }
    }

    /// Validate a node's subtree against one resolved schema.
    ///
    /// Returned violation locations are relative to the node; the
    /// caller rebases them under the node's pointer.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::InvalidSchema` when the schema document
    /// itself does not compile.
    pub fn check(
        &self,
        node: &Value,
        schema: &ResolvedSchema,
    ) -> Result<Vec<Violation>, ResolveError> {
        let validator = self.validator_for(schema)?;

        Ok(validator
            .iter_errors(node)
            .map(|err| {
                Violation::structural(
                    err.instance_path.to_string(),
                    schema.id.as_str(),
                    err.to_string(),
                )
            })
            .collect())
    }

    fn validator_for(
        &self,
        schema: &ResolvedSchema,
    ) -> Result<Arc<jsonschema::Validator>, ResolveError> {
        if let Some(validator) = self.read_compiled().get(&schema.id) {
            return Ok(Arc::clone(validator));
        }

        let retriever = ResolverRetriever {
            resolver: Arc::clone(&self.resolver),
        };

        // A fragment identifier is compiled as a reference so pointers
        // inside the target still resolve against the whole document.
        let compiled = match schema.fragment {
            None => jsonschema::options()
                .with_retriever(retriever)
                .build(&schema.document),
            Some(_) => jsonschema::options()
                .with_retriever(retriever)
                .build(&serde_json::json!({ "$ref": schema.id.as_str() })),
        }
        .map_err(|err| ResolveError::InvalidSchema {
            uri: schema.id.clone(),
            message: err.to_string(),
        })?;

        let compiled = Arc::new(compiled);
        self.write_compiled()
            .insert(schema.id.clone(), Arc::clone(&compiled));
        Ok(compiled)
    }

    fn read_compiled(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<jsonschema::Validator>>> {
        self.compiled.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_compiled(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<jsonschema::Validator>>> {
        self.compiled.write().unwrap_or_else(|e| e.into_inner())
    }
}
