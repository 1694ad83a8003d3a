//! Rendered manifest bundles
//!
//! A bundle holds every Kubernetes-style document found in a version archive,
//! which is either an unpacked directory or a `.tar.gz` file. Documents are
//! kept as raw YAML, so kinds Drydock knows nothing about still marshal back
//! unchanged.

use flate2::read::GzDecoder;
use indexmap::IndexMap;
use serde_yaml::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tar::Archive;
use walkdir::WalkDir;

use crate::error::{CoreError, Result};
use crate::preflight::{PREFLIGHT_API_VERSIONS, PREFLIGHT_KIND};

/// API version of application config values
pub const CONFIG_VALUES_API_VERSION: &str = "kots.io/v1beta1";

/// Kind of application config values
pub const CONFIG_VALUES_KIND: &str = "ConfigValues";

/// A single document from a bundle
#[derive(Debug, Clone, PartialEq)]
pub struct KindDocument {
    pub api_version: String,
    pub kind: String,
    pub name: Option<String>,

    /// File the document was read from, relative to the archive root
    pub source: String,

    pub body: Value,

    /// Document text as it appeared in the file
    pub raw: String,
}

impl KindDocument {
    /// Parse one document's text; `None` if it is empty or has no apiVersion or kind
    pub fn parse(raw: &str, source: &str) -> Result<Option<Self>> {
        let body: Value = serde_yaml::from_str(raw).map_err(|e| CoreError::InvalidDocument {
            path: source.to_string(),
            message: e.to_string(),
        })?;

        if body.is_null() {
            return Ok(None);
        }

        Ok(Self::with_raw(body, raw.to_string(), source))
    }

    /// Build a document from parsed YAML; `None` if it has no apiVersion or kind
    ///
    /// The text form is produced by serializing `body`.
    pub fn from_value(body: Value, source: &str) -> Option<Self> {
        let raw = serde_yaml::to_string(&body).ok()?;
        Self::with_raw(body, raw, source)
    }

    fn with_raw(body: Value, raw: String, source: &str) -> Option<Self> {
        let api_version = body.get("apiVersion")?.as_str()?.to_string();
        let kind = body.get("kind")?.as_str()?.to_string();
        let name = body
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self {
            api_version,
            kind,
            name,
            source: source.to_string(),
            body,
            raw,
        })
    }

    /// API group (empty for the core group)
    pub fn group(&self) -> &str {
        self.api_version
            .split_once('/')
            .map(|(group, _)| group)
            .unwrap_or("")
    }

    pub fn version(&self) -> &str {
        self.api_version
            .split_once('/')
            .map(|(_, version)| version)
            .unwrap_or(&self.api_version)
    }

    pub fn matches(&self, group: &str, version: &str, kind: &str) -> bool {
        self.group() == group && self.version() == version && self.kind == kind
    }

    /// The document as YAML text
    ///
    /// Returns the text read from the file, so template expressions inside
    /// quoted scalars reach the engine exactly as written.
    pub fn to_yaml(&self) -> &str {
        &self.raw
    }
}

/// All documents of a rendered version
#[derive(Debug, Clone, Default)]
pub struct ManifestBundle {
    documents: Vec<KindDocument>,
}

impl ManifestBundle {
    pub fn new(documents: Vec<KindDocument>) -> Self {
        Self { documents }
    }

    /// Load a bundle from a directory or a `.tar.gz` archive
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::ArchiveNotFound {
                path: path.display().to_string(),
            });
        }

        if path.is_dir() {
            Self::load_from_dir(path)
        } else {
            Self::load_from_archive(path)
        }
    }

    /// Load every YAML file below a directory
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut documents = Vec::new();

        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_yaml(entry.path()) {
                continue;
            }

            let content = std::fs::read_to_string(entry.path())?;
            let source = entry
                .path()
                .strip_prefix(dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            documents.extend(parse_documents(&content, &source)?);
        }

        Ok(Self { documents })
    }

    /// Load every YAML file inside a gzipped tarball
    pub fn load_from_archive(archive_path: &Path) -> Result<Self> {
        let file = File::open(archive_path)?;
        let mut archive = Archive::new(GzDecoder::new(file));

        let mut files = Vec::new();
        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let path = entry.path()?.to_path_buf();
            if !is_yaml(&path) {
                continue;
            }

            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            files.push((path.to_string_lossy().to_string(), content));
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut documents = Vec::new();
        for (source, content) in &files {
            documents.extend(parse_documents(content, source)?);
        }

        Ok(Self { documents })
    }

    pub fn documents(&self) -> &[KindDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The preflight document, if the version ships one
    pub fn preflight(&self) -> Option<&KindDocument> {
        self.documents.iter().find(|doc| {
            doc.kind == PREFLIGHT_KIND && PREFLIGHT_API_VERSIONS.contains(&doc.api_version.as_str())
        })
    }

    /// Find the first document of the given group, version and kind
    pub fn find(&self, group: &str, version: &str, kind: &str) -> Option<&KindDocument> {
        self.documents
            .iter()
            .find(|doc| doc.matches(group, version, kind))
    }

    /// Serialize the first document of the given group, version and kind
    pub fn marshal(&self, group: &str, version: &str, kind: &str) -> Result<String> {
        let document = self
            .find(group, version, kind)
            .ok_or_else(|| CoreError::KindNotFound {
                api_version: format!("{}/{}", group, version),
                kind: kind.to_string(),
            })?;
        Ok(document.to_yaml().to_string())
    }

    /// Config option values by name, in document order
    ///
    /// An option without a `value` falls back to its `default`.
    pub fn config_values(&self) -> IndexMap<String, String> {
        let mut values = IndexMap::new();

        let config_docs = self
            .documents
            .iter()
            .filter(|d| d.api_version == CONFIG_VALUES_API_VERSION && d.kind == CONFIG_VALUES_KIND);

        for doc in config_docs {
            let Some(Value::Mapping(entries)) = doc.body.get("spec").and_then(|s| s.get("values"))
            else {
                continue;
            };

            for (name, entry) in entries {
                let Some(name) = name.as_str() else {
                    continue;
                };
                let value = entry
                    .get("value")
                    .and_then(scalar_to_string)
                    .or_else(|| entry.get("default").and_then(scalar_to_string))
                    .unwrap_or_default();
                values.insert(name.to_string(), value);
            }
        }

        values
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Split a multi-document YAML file into kind documents
fn parse_documents(content: &str, source: &str) -> Result<Vec<KindDocument>> {
    let mut documents = Vec::new();

    for raw in split_documents(content) {
        if let Some(doc) = KindDocument::parse(&raw, source)? {
            documents.push(doc);
        }
    }

    Ok(documents)
}

/// Split YAML text on `---` separator lines, keeping each document's text
fn split_documents(content: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in content.split_inclusive('\n') {
        if let Some(rest) = line.strip_prefix("---") {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                documents.push(std::mem::take(&mut current));
                let rest = rest.trim_start_matches([' ', '\t']);
                if !rest.trim().is_empty() && !rest.starts_with('#') {
                    current.push_str(rest);
                }
                continue;
            }
        }
        current.push_str(line);
    }
    documents.push(current);

    documents
        .into_iter()
        .filter(|doc| {
            doc.lines()
                .map(str::trim)
                .any(|line| !line.is_empty() && !line.starts_with('#'))
        })
        .collect()
}
