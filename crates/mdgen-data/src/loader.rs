//! Reading schema, identifier-registry and record files.
//!
//! Provides format detection (RON/JSON/TOML), deserialization, and the
//! recursive record discovery that turns a records directory into
//! [`RecordBucket`]s.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use mdgen_core::id::{IdDomain, IdRegistry, IdRegistryError};
use mdgen_core::namespace::NamespacePath;
use mdgen_core::validation::RecordBucket;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while reading input files.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required file does not exist.
    #[error("file not found: {file}")]
    MissingFile { file: PathBuf },

    /// A required directory does not exist.
    #[error("directory not found: {dir}")]
    MissingDirectory { dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The file lacks the expected top-level table.
    #[error("missing table '{key}' in {file}")]
    MissingKey { file: PathBuf, key: String },

    #[error("invalid id registry {file}: {source}")]
    IdRegistry {
        file: PathBuf,
        #[source]
        source: IdRegistryError,
    },

    #[error("invalid configuration {file}: {detail}")]
    Config { file: PathBuf, detail: String },

    #[error("failed to read {file}: {source}")]
    Read {
        file: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to walk {dir}: {source}")]
    Walk {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

pub(crate) fn read_file(path: &Path) -> Result<String, DataLoadError> {
    std::fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => DataLoadError::MissingFile {
            file: path.to_path_buf(),
        },
        _ => DataLoadError::Read {
            file: path.to_path_buf(),
            source,
        },
    })
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = read_file(path)?;
    let parse_error = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Read a file as a table and return the table stored under `root_key`.
/// Key order is preserved for every format.
pub fn load_root_table(path: &Path, root_key: &str) -> Result<toml::Table, DataLoadError> {
    let mut table: toml::Table = deserialize_file(path)?;
    match table.remove(root_key) {
        Some(toml::Value::Table(inner)) => Ok(inner),
        Some(_) => Err(DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: format!("'{root_key}' is not a table"),
        }),
        None => Err(DataLoadError::MissingKey {
            file: path.to_path_buf(),
            key: root_key.to_string(),
        }),
    }
}

// ===========================================================================
// Identifier registry
// ===========================================================================

#[derive(Deserialize)]
struct IdFile {
    #[serde(default)]
    id: toml::Table,
}

/// Load `[id.<key>]` tables, each holding `name`, `begin` and `end`, in
/// file order.
pub fn load_id_registry(path: &Path) -> Result<IdRegistry, DataLoadError> {
    let file: IdFile = deserialize_file(path)?;
    let domains = file
        .id
        .into_iter()
        .map(|(key, value)| {
            value
                .try_into::<IdDomain>()
                .map_err(|e| DataLoadError::Parse {
                    file: path.to_path_buf(),
                    detail: format!("id.{key}: {e}"),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let registry = IdRegistry::new(domains).map_err(|source| DataLoadError::IdRegistry {
        file: path.to_path_buf(),
        source,
    })?;
    debug!(file = %path.display(), domains = registry.domains().len(), "loaded id registry");
    Ok(registry)
}

// ===========================================================================
// Record discovery
// ===========================================================================

/// Namespace of a record file from its directory relative to the records
/// root. Files directly in the root belong to the root bucket.
pub fn namespace_of(relative_dir: &Path) -> NamespacePath {
    let segments: Vec<&str> = relative_dir
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    NamespacePath::parse(&segments.join("/"))
}

/// Walk `root` recursively and load every data file as one bucket:
/// `<root>/<namespace>/<TypeName>.<ext>`, records under `root_key`.
///
/// Files with other extensions are skipped. Paths are visited in sorted
/// order so the bucket list is stable across runs.
pub fn discover_records(root: &Path, root_key: &str) -> Result<Vec<RecordBucket>, DataLoadError> {
    if !root.is_dir() {
        return Err(DataLoadError::MissingDirectory {
            dir: root.to_path_buf(),
        });
    }

    let mut seen: HashMap<(NamespacePath, String), PathBuf> = HashMap::new();
    let mut buckets = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| DataLoadError::Walk {
            dir: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if detect_format(path).is_err() {
            debug!(file = %path.display(), "skipping non-data file");
            continue;
        }
        let Some(data_type) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let namespace = path
            .strip_prefix(root)
            .ok()
            .and_then(Path::parent)
            .map(namespace_of)
            .unwrap_or_default();

        let key = (namespace.clone(), data_type.to_string());
        if let Some(existing) = seen.insert(key, path.to_path_buf()) {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: path.to_path_buf(),
            });
        }

        let records = load_root_table(path, root_key)?;
        debug!(file = %path.display(), records = records.len(), "loaded records");
        buckets.push(RecordBucket {
            namespace,
            data_type: data_type.to_string(),
            records,
        });
    }

    Ok(buckets)
}

// ===========================================================================
// Tests
// ===========================================================================
