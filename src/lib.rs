//! Extended JSON Schema validation
//!
//! Validates JSON instances that declare their schemas inline: a
//! `$schema` property at the document root names the primary schema,
//! and any nested object may carry a `$extensionSchemas` property
//! listing additional schemas its subtree must also comply with.
//! Declarations are inherited: an object is governed by everything its
//! ancestors declared plus whatever it declares itself.
//!
//! Schema identifiers are resolved through an in-process cache, then a
//! configurable map of local files (a schema directory or location
//! file), then a network fetch. Structural rule checking is delegated
//! to the [`jsonschema`] crate.
//!
//! # Example
//!
//! ```
//! use ejschema::{ExtValidator, SchemaResolver, ValidateOptions};
//! use serde_json::json;
//!
//! let resolver = SchemaResolver::new().network(false);
//! resolver
//!     .register(
//!         json!({
//!             "$id": "https://example.org/schemas/person",
//!             "type": "object",
//!             "properties": { "name": { "type": "string" } },
//!             "required": ["name"]
//!         }),
//!         None,
//!     )
//!     .unwrap();
//!
//! let validator = ExtValidator::new(resolver);
//! let instance = json!({
//!     "$schema": "https://example.org/schemas/person",
//!     "name": 42
//! });
//!
//! let report = validator
//!     .validate(&instance, &ValidateOptions::default())
//!     .unwrap();
//!
//! assert!(!report.passed(false));
//! assert_eq!(report.violations()[0].location, "/name");
//! ```
//!
//! Unavailable extension schemas do not fail a run by default: they are
//! recorded as [`ViolationKind::SchemaUnavailable`] entries ("could not
//! verify") and only fail a strict run.

mod cache;
mod checker;
mod context;
mod engine;
mod error;
mod loader;
mod location;
mod resolver;
mod types;

pub use cache::SchemaCache;
pub use checker::SchemaChecker;
pub use context::{declared_schemas, Declared, DeclarationProblem, SchemaContext};
pub use engine::ExtValidator;
pub use error::{LocationError, ResolveError, ValidateError};
pub use loader::{is_url, load_document, load_document_str, navigate_fragment};
pub use location::{SchemaLocations, SCHEMA_LOCATION_FILE};
pub use resolver::{ResolvedSchema, SchemaResolver};
pub use types::{
    json_type_name, Tags, ValidateOptions, ValidationReport, Violation, ViolationKind,
    DEFAULT_TAG_PREFIX, EXT_SCHEMAS_TAG, SCHEMA_TAG,
};

#[cfg(feature = "remote")]
pub use loader::{load_document_url, DEFAULT_HTTP_TIMEOUT};
