//! Schema resolution - turns schema identifiers into schema documents.
//!
//! Resolution consults, in order: the in-process cache, the configured
//! location map (local files or pinned URLs), and finally a network
//! fetch of the identifier itself. Whatever is retrieved is parsed and
//! cached under the normalized identifier, so later runs in the same
//! process never repeat the fetch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace};

use crate::cache::SchemaCache;
use crate::error::{LocationError, ResolveError};
use crate::loader::{is_url, load_document, navigate_fragment};
use crate::location::SchemaLocations;

/// A schema identifier resolved to its document.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    /// The normalized identifier, fragment included.
    pub id: String,
    /// The whole schema document the identifier lives in.
    pub document: Arc<Value>,
    /// JSON Pointer fragment within the document, without the `#`.
    pub fragment: Option<String>,
}

/// Resolves schema identifiers via cache, local locations, and network.
#[derive(Debug)]
pub struct SchemaResolver {
    cache: Arc<SchemaCache>,
    locations: SchemaLocations,
    network: bool,
    #[cfg_attr(not(feature = "remote"), allow(dead_code))]
    timeout: Duration,
}

impl SchemaResolver {
    pub fn new() -> Self {
        Self::with_locations(SchemaLocations::new())
    }

    /// Create a resolver backed by an identifier-to-location map.
    pub fn with_locations(locations: SchemaLocations) -> Self {
        Self {
            cache: Arc::new(SchemaCache::new()),
            locations,
            network: true,
            timeout: default_timeout(),
        }
    }

    /// Create a resolver for schemas cached as files under a directory.
    ///
    /// See [`SchemaLocations::from_directory`] for how the directory is
    /// interpreted.
    pub fn from_directory(dir: &Path) -> Result<Self, LocationError> {
        Ok(Self::with_locations(SchemaLocations::from_directory(dir)?))
    }

    /// Enable or disable network fetches. Disabled resolvers fail with
    /// `ResolveError::NetworkDisabled` for uncached remote schemas.
    pub fn network(mut self, enabled: bool) -> Self {
        self.network = enabled;
        self
    }

    /// Timeout for network fetches (default 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Share a document cache with other resolvers.
    pub fn shared_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.cache = cache;
        self
    }

    /// The document cache backing this resolver.
    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    /// The location map backing this resolver.
    pub fn locations(&self) -> &SchemaLocations {
        &self.locations
    }

    /// Pre-load a parsed schema document into the cache.
    ///
    /// The identifier is taken from `uri`, falling back to the
    /// document's `$id` (or legacy `id`) property. Returns the
    /// normalized identifier the document was stored under.
    pub fn register(&self, document: Value, uri: Option<&str>) -> Result<String, ResolveError> {
        let uri = match uri {
            Some(uri) => uri.to_string(),
            None => document
                .get("$id")
                .or_else(|| document.get("id"))
                .and_then(Value::as_str)
                .map(String::from)
                .ok_or(ResolveError::MissingId)?,
        };

        let normalized = self.normalize(&uri, None);
        let (doc_uri, _) = split_fragment(&normalized);
        self.cache.put(doc_uri, Arc::new(document));
        Ok(doc_uri.to_string())
    }

    /// Resolve an identifier to its schema document.
    pub fn resolve(&self, id: &str) -> Result<ResolvedSchema, ResolveError> {
        self.resolve_with_base(id, None)
    }

    /// Resolve an identifier, normalizing it against a base identifier
    /// first (for fragment-only or relative identifiers).
    pub fn resolve_with_base(
        &self,
        id: &str,
        base: Option<&str>,
    ) -> Result<ResolvedSchema, ResolveError> {
        let id = self.normalize(id, base);
        let (doc_uri, fragment) = split_fragment(&id);

        let document = self.resolve_document(doc_uri)?;

        if let Some(frag) = fragment {
            // surface a dangling pointer as a resolution failure here,
            // not as a compile error later
            if navigate_fragment(&document, frag).is_none() {
                return Err(ResolveError::FragmentNotFound {
                    uri: doc_uri.to_string(),
                    fragment: format!("#{frag}"),
                });
            }
        }

        Ok(ResolvedSchema {
            id: id.clone(),
            document,
            fragment: fragment.map(String::from),
        })
    }

    /// Resolve a fragment-free identifier to its whole document,
    /// consulting cache, then configured locations, then the network.
    pub fn resolve_document(&self, uri: &str) -> Result<Arc<Value>, ResolveError> {
        let uri = uri.strip_suffix('#').unwrap_or(uri);

        if let Some(document) = self.cache.get(uri) {
            trace!(uri, "schema cache hit");
            return Ok(document);
        }

        let document = if let Some(location) = self.locations.get(uri) {
            debug!(uri, location, "loading schema from configured location");
            if is_url(location) {
                self.fetch(location)?
            } else {
                load_document(Path::new(location))?
            }
        } else if is_url(uri) {
            debug!(uri, "fetching schema");
            self.fetch(uri)?
        } else {
            return Err(ResolveError::UnknownSchema {
                uri: uri.to_string(),
            });
        };

        let document = Arc::new(document);
        self.cache.put(uri, Arc::clone(&document));
        Ok(document)
    }

    /// Normalize an identifier against an optional base identifier.
    ///
    /// A bare trailing `#` is dropped. A fragment-only identifier
    /// (`#/definitions/X`) is attached to the base's document part. A
    /// relative identifier is joined to the base URL: path-absolute
    /// (`/x/y`) against the base's authority, otherwise against the
    /// base's directory.
    pub fn normalize(&self, id: &str, base: Option<&str>) -> String {
        let id = id.strip_suffix('#').unwrap_or(id);

        let Some(base) = base else {
            return id.to_string();
        };
        let (base_doc, _) = split_fragment(base);

        if let Some(frag) = id.strip_prefix('#') {
            return format!("{base_doc}#{frag}");
        }

        if !has_scheme(id) && is_url(base_doc) {
            if let Some(stripped) = id.strip_prefix('/') {
                if let Some(authority) = authority_of(base_doc) {
                    return format!("{authority}/{stripped}");
                }
            } else if let Some(pos) = base_doc.rfind('/') {
                return format!("{}/{}", &base_doc[..pos], id);
            }
        }

        id.to_string()
    }

    fn fetch(&self, url: &str) -> Result<Value, ResolveError> {
        if !self.network {
            return Err(ResolveError::NetworkDisabled {
                uri: url.to_string(),
            });
        }

        #[cfg(feature = "remote")]
        {
            crate::loader::load_document_url(url, self.timeout)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(ResolveError::NetworkDisabled {
                uri: url.to_string(),
            })
        }
    }
}

impl Default for SchemaResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn default_timeout() -> Duration {
    #[cfg(feature = "remote")]
    {
        crate::loader::DEFAULT_HTTP_TIMEOUT
    }
    #[cfg(not(feature = "remote"))]
    {
        Duration::from_secs(10)
    }
}

/// Whether an identifier carries a URI scheme (`https:`, `urn:`, ...),
/// making it absolute rather than base-relative.
fn has_scheme(id: &str) -> bool {
    match id.split_once(':') {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// The scheme-and-authority prefix of a URL (`https://host`), without
/// any path.
fn authority_of(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")? + 3;
    match url[scheme_end..].find('/') {
        Some(pos) => Some(&url[..scheme_end + pos]),
        None => Some(url),
    }
}

/// Split an identifier into its document part and fragment.
fn split_fragment(id: &str) -> (&str, Option<&str>) {
    match id.find('#') {
        Some(pos) => (&id[..pos], Some(&id[pos + 1..])),
        None => (id, None),
    }
}

/// Adapter exposing the resolver to the `jsonschema` crate, so `$ref`
/// targets inside schemas go through the same cache/disk/network chain.
pub(crate) struct ResolverRetriever {
    pub(crate) resolver: Arc<SchemaResolver>,
}

impl jsonschema::Retrieve for ResolverRetriever {
    fn retrieve(
        &self,
        uri: &jsonschema::Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let document = self.resolver.resolve_document(uri.as_str())?;
        Ok((*document).clone())
    }
}
