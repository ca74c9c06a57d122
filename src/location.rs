//! Mapping schema identifiers to their on-disk (or remote) locations.
//!
//! A location map can be built three ways: from an explicit set of
//! entries, from a location file, or by scanning a directory of schema
//! files. Location files come in two formats: a JSON object whose keys
//! are identifiers and values are paths/URLs, or plain text with one
//! `URI LOCATION` pair per line (`#` starts a comment line).

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::LocationError;

/// Conventional name of the location file inside a schema directory.
pub const SCHEMA_LOCATION_FILE: &str = "schemaLocation.json";

/// An identifier-to-location map for schema documents.
///
/// Locations are file paths or URLs. Identifiers are stored with any
/// trailing `#` stripped so lookups agree with resolver normalization.
#[derive(Debug, Clone, Default)]
pub struct SchemaLocations {
    map: HashMap<String, String>,
}

impl SchemaLocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map for schemas stored under a directory.
    ///
    /// If the directory contains a `schemaLocation.json` file, it is
    /// read and trusted. Otherwise every `.json` file under the
    /// directory (recursively) is examined, and those recognized as
    /// JSON Schemas are added.
    pub fn from_directory(dir: &Path) -> Result<Self, LocationError> {
        check_directory(dir)?;

        let locfile = dir.join(SCHEMA_LOCATION_FILE);
        if locfile.exists() {
            Self::from_file(&locfile)
        } else {
            Self::scan(dir)
        }
    }

    /// Build a map by scanning a directory for schema files, ignoring
    /// any location file present.
    ///
    /// A schema file is a `.json` file holding an object whose
    /// `$schema` property names a JSON-Schema dialect. Its identifier
    /// is the `$id` (or legacy `id`) property; files without one get a
    /// `file://` identifier based on their path. Unreadable files and
    /// non-schema JSON are skipped.
    pub fn scan(dir: &Path) -> Result<Self, LocationError> {
        check_directory(dir)?;

        let mut out = Self::new();
        scan_into(dir, &mut out)?;
        Ok(out)
    }

    /// Read a location file (JSON or txt format, chosen by extension;
    /// anything but `.json` is parsed as txt).
    ///
    /// Relative locations are resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, LocationError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => LocationError::NotFound {
                    path: path.to_path_buf(),
                },
                _ => LocationError::ReadError {
                    path: path.to_path_buf(),
                    source,
                },
            })?;

        let entries = if path.extension().is_some_and(|ext| ext == "json") {
            parse_mappings_json(path, &content)?
        } else {
            parse_mappings_txt(path, &content)?
        };

        let base = path.parent().unwrap_or(Path::new("."));
        let mut out = Self::new();
        for (uri, loc) in entries {
            out.insert(&uri, &resolve_location(&loc, base));
        }
        Ok(out)
    }

    /// Add a mapping. A trailing `#` on the identifier is dropped.
    pub fn insert(&mut self, uri: &str, location: &str) {
        let uri = uri.strip_suffix('#').unwrap_or(uri);
        self.map.insert(uri.to_string(), location.to_string());
    }

    /// The location registered for an identifier, if any.
    pub fn get(&self, uri: &str) -> Option<&str> {
        self.map.get(uri).map(String::as_str)
    }

    /// Copy all mappings from another map, overwriting shared ids.
    pub fn merge(&mut self, other: &SchemaLocations) {
        for (uri, loc) in &other.map {
            self.map.insert(uri.clone(), loc.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Render the map as a JSON object, keys sorted for stable output.
    /// When `relative_to` is given, locations under that directory are
    /// written relative to it.
    pub fn to_json(&self, relative_to: Option<&Path>) -> Value {
        let mut sorted: Vec<(&str, &str)> = self.iter().collect();
        sorted.sort();

        let mut obj = serde_json::Map::new();
        for (uri, loc) in sorted {
            let loc = match relative_to {
                Some(base) => Path::new(loc)
                    .strip_prefix(base)
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| loc.to_string()),
                None => loc.to_string(),
            };
            obj.insert(uri.to_string(), Value::String(loc));
        }
        Value::Object(obj)
    }

    /// Write the map to a location file in JSON format.
    pub fn save(&self, path: &Path, relative_to: Option<&Path>) -> std::io::Result<()> {
        let json = self.to_json(relative_to);
        let mut content = serde_json::to_string_pretty(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        content.push('\n');
        std::fs::write(path, content)
    }
}

fn check_directory(dir: &Path) -> Result<(), LocationError> {
    if !dir.exists() {
        return Err(LocationError::NotFound {
            path: dir.to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(LocationError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }
    Ok(())
}

fn scan_into(dir: &Path, out: &mut SchemaLocations) -> Result<(), LocationError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LocationError::ReadError {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| LocationError::ReadError {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        if path.is_dir() {
            scan_into(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            if let Some(id) = read_schema_id(&path) {
                debug!(uri = %id, file = %path.display(), "found schema file");
                out.insert(&id, &path.to_string_lossy());
            }
        }
    }
    Ok(())
}

/// Extract the identifier of a schema file, or `None` if the file is
/// unreadable or not a JSON Schema document.
fn read_schema_id(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let doc: Value = serde_json::from_str(&content).ok()?;
    let obj = doc.as_object()?;

    let dialect = obj.get("$schema")?.as_str()?;
    if !is_metaschema_uri(dialect) {
        debug!(file = %path.display(), dialect, "skipping: unrecognized $schema");
        return None;
    }

    match obj.get("$id").or_else(|| obj.get("id")).and_then(Value::as_str) {
        Some(id) => Some(id.to_string()),
        None => {
            let abs = path
                .canonicalize()
                .unwrap_or_else(|_| path.to_path_buf());
            Some(format!("file://{}", abs.display()))
        }
    }
}

/// Whether a `$schema` value names a JSON-Schema dialect.
fn is_metaschema_uri(uri: &str) -> bool {
    uri.starts_with("http://json-schema.org/") || uri.starts_with("https://json-schema.org/")
}

fn parse_mappings_json(path: &Path, content: &str) -> Result<Vec<(String, String)>, LocationError> {
    let doc: Value =
        serde_json::from_str(content).map_err(|e| LocationError::BadLocationFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let obj = doc.as_object().ok_or_else(|| LocationError::BadLocationFile {
        path: path.to_path_buf(),
        message: "expected a JSON object mapping URIs to locations".into(),
    })?;

    let mut out = Vec::with_capacity(obj.len());
    for (uri, loc) in obj {
        let loc = loc.as_str().ok_or_else(|| LocationError::BadLocationFile {
            path: path.to_path_buf(),
            message: format!("location for {uri} is not a string"),
        })?;
        out.push((uri.clone(), loc.to_string()));
    }
    Ok(out)
}

fn parse_mappings_txt(path: &Path, content: &str) -> Result<Vec<(String, String)>, LocationError> {
    let mut out = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some(uri), Some(loc)) => out.push((uri.to_string(), loc.to_string())),
            _ => {
                return Err(LocationError::BadLocationFile {
                    path: path.to_path_buf(),
                    message: format!("line {}: expected \"URI LOCATION\"", lineno + 1),
                })
            }
        }
    }
    Ok(out)
}

/// Resolve a location against the location file's directory. URLs and
/// absolute paths pass through unchanged.
fn resolve_location(loc: &str, base: &Path) -> String {
    if crate::loader::is_url(loc) || Path::new(loc).is_absolute() {
        loc.to_string()
    } else {
        base.join(loc).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn insert_strips_trailing_hash() {
        let mut locs = SchemaLocations::new();
        locs.insert("https://ex.org/s#", "/tmp/s.json");
        assert_eq!(locs.get("https://ex.org/s"), Some("/tmp/s.json"));
        assert!(locs.get("https://ex.org/s#").is_none());
    }

    #[test]
    fn from_file_json_format() {
        let dir = TempDir::new().unwrap();
        let locfile = write_file(
            &dir,
            "locations.json",
            r#"{"https://ex.org/s1": "s1.json", "https://ex.org/s2": "/abs/s2.json"}"#,
        );

        let locs = SchemaLocations::from_file(&locfile).unwrap();
        assert_eq!(locs.len(), 2);
        // relative resolved against the file's directory
        assert_eq!(
            locs.get("https://ex.org/s1"),
            Some(dir.path().join("s1.json").to_string_lossy().as_ref())
        );
        // absolute left alone
        assert_eq!(locs.get("https://ex.org/s2"), Some("/abs/s2.json"));
    }

    #[test]
    fn from_file_txt_format() {
        let dir = TempDir::new().unwrap();
        let locfile = write_file(
            &dir,
            "locations.txt",
            "# cached schemas\nhttps://ex.org/s1 s1.json\n\nhttps://ex.org/s2 https://cdn.ex.org/s2.json\n",
        );

        let locs = SchemaLocations::from_file(&locfile).unwrap();
        assert_eq!(locs.len(), 2);
        // URL locations pass through
        assert_eq!(
            locs.get("https://ex.org/s2"),
            Some("https://cdn.ex.org/s2.json")
        );
    }

    #[test]
    fn from_file_txt_short_line_errors() {
        let dir = TempDir::new().unwrap();
        let locfile = write_file(&dir, "locations.txt", "https://ex.org/s1\n");

        let result = SchemaLocations::from_file(&locfile);
        assert!(matches!(
            result,
            Err(LocationError::BadLocationFile { .. })
        ));
    }

    #[test]
    fn from_file_json_non_object_errors() {
        let dir = TempDir::new().unwrap();
        let locfile = write_file(&dir, "locations.json", r#"["not", "a", "map"]"#);

        let result = SchemaLocations::from_file(&locfile);
        assert!(matches!(
            result,
            Err(LocationError::BadLocationFile { .. })
        ));
    }

    #[test]
    fn scan_finds_schemas_recursively() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "person.json",
            r#"{"$schema": "http://json-schema.org/draft-07/schema#",
                "$id": "https://ex.org/schemas/person", "type": "object"}"#,
        );
        write_file(
            &dir,
            "nested/address.json",
            r#"{"$schema": "https://json-schema.org/draft/2020-12/schema",
                "id": "https://ex.org/schemas/address#", "type": "object"}"#,
        );
        // not schemas: plain data, bad JSON, wrong extension
        write_file(&dir, "data.json", r#"{"name": "nobody"}"#);
        write_file(&dir, "broken.json", "{");
        write_file(&dir, "readme.txt", "nothing");

        let locs = SchemaLocations::scan(dir.path()).unwrap();
        assert_eq!(locs.len(), 2);
        assert!(locs.get("https://ex.org/schemas/person").is_some());
        // trailing # stripped from the legacy id form
        assert!(locs.get("https://ex.org/schemas/address").is_some());
    }

    #[test]
    fn scan_assigns_file_uri_when_id_missing() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "anon.json",
            r#"{"$schema": "http://json-schema.org/draft-07/schema#", "type": "object"}"#,
        );

        let locs = SchemaLocations::scan(dir.path()).unwrap();
        assert_eq!(locs.len(), 1);
        let (id, _) = locs.iter().next().unwrap();
        assert!(id.starts_with("file://"));
    }

    #[test]
    fn from_directory_prefers_location_file() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            SCHEMA_LOCATION_FILE,
            r#"{"https://ex.org/only": "only.json"}"#,
        );
        // schema file on disk is ignored when a location file exists
        write_file(
            &dir,
            "person.json",
            r#"{"$schema": "http://json-schema.org/draft-07/schema#",
                "$id": "https://ex.org/schemas/person"}"#,
        );

        let locs = SchemaLocations::from_directory(dir.path()).unwrap();
        assert_eq!(locs.len(), 1);
        assert!(locs.get("https://ex.org/only").is_some());
    }

    #[test]
    fn from_directory_missing_dir() {
        let result = SchemaLocations::from_directory(Path::new("/no/such/dir"));
        assert!(matches!(result, Err(LocationError::NotFound { .. })));
    }

    #[test]
    fn save_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut locs = SchemaLocations::new();
        locs.insert(
            "https://ex.org/s1",
            &dir.path().join("s1.json").to_string_lossy(),
        );

        let out = dir.path().join(SCHEMA_LOCATION_FILE);
        locs.save(&out, None).unwrap();

        let reloaded = SchemaLocations::from_file(&out).unwrap();
        assert_eq!(
            reloaded.get("https://ex.org/s1"),
            locs.get("https://ex.org/s1")
        );
    }

    #[test]
    fn to_json_relative_paths() {
        let mut locs = SchemaLocations::new();
        locs.insert("https://ex.org/s1", "/cache/schemas/s1.json");

        let json = locs.to_json(Some(Path::new("/cache/schemas")));
        assert_eq!(json["https://ex.org/s1"], "s1.json");
    }
}
