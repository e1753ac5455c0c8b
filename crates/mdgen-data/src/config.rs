//! `mdgen.toml`: project paths plus the knobs of schema reading, type
//! resolution and code generation.
//!
//! Every table and every key is optional; an absent key takes the same
//! default the core types use.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use mdgen_core::codegen::CodegenOptions;
use mdgen_core::field::ResolverRules;
use mdgen_core::registry::SchemaOptions;

use crate::loader::{DataLoadError, read_file};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "mdgen.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub path: PathConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub codegen: CodegenConfig,
    /// Directory `path.root` is relative to.
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Project layout. All paths are relative to `root`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathConfig {
    pub root: PathBuf,
    pub schema: PathBuf,
    pub id_registry: PathBuf,
    pub records: PathBuf,
    pub output: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            schema: PathBuf::from("schema/master/masterdata.toml"),
            id_registry: PathBuf::from("schema/master/id.toml"),
            records: PathBuf::from("masterdata"),
            output: PathBuf::from("md_header"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaConfig {
    /// Top-level key of the schema file and of every record file.
    pub root_key: String,
    pub declaration_marker: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            root_key: "masterdata".to_string(),
            declaration_marker: SchemaOptions::default().declaration_marker,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    pub allowed_types: BTreeSet<String>,
    pub heavy_types: BTreeSet<String>,
    pub substitutions: BTreeMap<String, String>,
    pub id_tag: String,
    pub primary_key_tag: String,
    pub id_suffix: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        let rules = ResolverRules::default();
        Self {
            allowed_types: rules.allowed_types.into_iter().collect(),
            heavy_types: rules.heavy_types.into_iter().collect(),
            substitutions: rules.substitutions.into_iter().collect(),
            id_tag: rules.id_tag,
            primary_key_tag: rules.primary_key_tag,
            id_suffix: rules.id_suffix,
        }
    }
}

impl ResolverConfig {
    pub fn rules(&self) -> ResolverRules {
        ResolverRules {
            allowed_types: self.allowed_types.iter().cloned().collect(),
            heavy_types: self.heavy_types.iter().cloned().collect(),
            substitutions: self
                .substitutions
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            id_tag: self.id_tag.clone(),
            primary_key_tag: self.primary_key_tag.clone(),
            id_suffix: self.id_suffix.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodegenConfig {
    pub indent: String,
    pub namespaces: Vec<String>,
    pub class_prefix: String,
    pub ids_header: String,
    pub id_value_type: String,
    pub repository_header: String,
    pub repository_base: String,
    pub instance_header: String,
    pub instance_base: String,
    pub record_source_header: String,
    pub record_source_type: String,
    pub record_key_type: String,
    /// Base type -> header included by the value class.
    pub type_headers: BTreeMap<String, String>,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        let o = CodegenOptions::default();
        Self {
            indent: o.indent,
            namespaces: o.namespaces,
            class_prefix: o.class_prefix,
            ids_header: o.ids_header,
            id_value_type: o.id_value_type,
            repository_header: o.repository_header,
            repository_base: o.repository_base,
            instance_header: o.instance_header,
            instance_base: o.instance_base,
            record_source_header: o.record_source_header,
            record_source_type: o.record_source_type,
            record_key_type: o.record_key_type,
            type_headers: o.type_headers.into_iter().collect(),
        }
    }
}

impl Config {
    /// Read a config file. Relative paths inside it resolve against the
    /// file's own directory.
    pub fn load(file: &Path) -> Result<Self, DataLoadError> {
        let content = read_file(file)?;
        let mut config: Config = toml::from_str(&content).map_err(|e| DataLoadError::Config {
            file: file.to_path_buf(),
            detail: e.to_string(),
        })?;
        config.base_dir = match file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(config)
    }

    /// All defaults, with the project rooted at `root`.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            base_dir: root.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn root(&self) -> PathBuf {
        self.base_dir.join(&self.path.root)
    }

    pub fn schema_path(&self) -> PathBuf {
        self.root().join(&self.path.schema)
    }

    pub fn id_registry_path(&self) -> PathBuf {
        self.root().join(&self.path.id_registry)
    }

    pub fn records_dir(&self) -> PathBuf {
        self.root().join(&self.path.records)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join(&self.path.output)
    }

    /// Fail if wiping the output directory would also remove one of the
    /// inputs it is generated from.
    pub fn check_output_dir(&self) -> Result<(), DataLoadError> {
        let output = self.output_dir();
        let normalized = normalize(&output);
        let inputs = [
            ("schema", self.schema_path()),
            ("id registry", self.id_registry_path()),
            ("records directory", self.records_dir()),
        ];
        for (what, input) in inputs {
            if normalize(&input).starts_with(&normalized) {
                return Err(DataLoadError::Config {
                    file: output,
                    detail: format!("output directory would contain the {what} {}", input.display()),
                });
            }
        }
        Ok(())
    }

    pub fn schema_options(&self) -> SchemaOptions {
        SchemaOptions {
            declaration_marker: self.schema.declaration_marker.clone(),
            resolver: self.resolver.rules(),
        }
    }

    /// Code generation options. The provenance line quotes the schema file
    /// name and the repositories read records under the schema root key.
    pub fn codegen_options(&self) -> CodegenOptions {
        let c = &self.codegen;
        let source_name = self
            .path
            .schema
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.schema.display().to_string());
        CodegenOptions {
            source_name,
            indent: c.indent.clone(),
            namespaces: c.namespaces.clone(),
            class_prefix: c.class_prefix.clone(),
            ids_header: c.ids_header.clone(),
            id_value_type: c.id_value_type.clone(),
            repository_header: c.repository_header.clone(),
            repository_base: c.repository_base.clone(),
            instance_header: c.instance_header.clone(),
            instance_base: c.instance_base.clone(),
            record_source_header: c.record_source_header.clone(),
            record_source_type: c.record_source_type.clone(),
            record_key_type: c.record_key_type.clone(),
            record_root_key: self.schema.root_key.clone(),
            type_headers: c
                .type_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Absolute form of `path` with `.` and `..` folded away. Symlinks are not
/// followed.
fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
