//! The two runs the command line exposes: regenerate every artifact, and
//! audit authored records against the schema.
//!
//! Schema problems are fatal and surface before the output root is touched,
//! so a failing schema never leaves a half-written tree behind.

use std::io;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use mdgen_core::codegen::generate_registry;
use mdgen_core::id::IdRegistry;
use mdgen_core::registry::{LookupError, SchemaError, TypeRegistry};
use mdgen_core::validation::{self, ValidationReport};

use crate::config::Config;
use crate::loader::{self, DataLoadError};
use crate::output;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] DataLoadError),

    #[error("invalid schema {file}: {source}")]
    Schema {
        file: PathBuf,
        #[source]
        source: SchemaError,
    },

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What a generate run produced.
#[derive(Debug, Clone, Default)]
pub struct GenerateSummary {
    pub data_types: usize,
    /// Written files, relative to the output root, in write order.
    pub files: Vec<PathBuf>,
}

/// Read the schema file and build the type registry.
pub fn load_registry(config: &Config) -> Result<TypeRegistry, PipelineError> {
    let file = config.schema_path();
    let tree = loader::load_root_table(&file, &config.schema.root_key)?;
    let registry = TypeRegistry::load(&tree, &config.schema_options())
        .map_err(|source| PipelineError::Schema { file, source })?;
    for namespace in registry.namespaces() {
        debug!(%namespace, data_types = registry.count_in(namespace), "namespace loaded");
    }
    Ok(registry)
}

/// Identifier fields whose domain the id registry does not know, as
/// `(data type, field, domain)`. Identifiers over an allow-listed base type
/// are not domains and are skipped.
pub fn unknown_id_domains(
    registry: &TypeRegistry,
    ids: &IdRegistry,
    config: &Config,
) -> Vec<(String, String, String)> {
    registry
        .data_types()
        .iter()
        .flat_map(|dt| dt.fields().iter().map(move |f| (dt, f)))
        .filter(|(_, f)| f.is_id && !config.resolver.allowed_types.contains(&f.base))
        .filter(|(_, f)| ids.search_by_name(&f.base).is_none())
        .map(|(dt, f)| (dt.name().to_string(), f.name.clone(), f.base.clone()))
        .collect()
}

fn check_id_domains(registry: &TypeRegistry, config: &Config) -> Result<(), PipelineError> {
    let path = config.id_registry_path();
    if !path.is_file() {
        warn!(file = %path.display(), "id registry not found, skipping identifier domain check");
        return Ok(());
    }
    let ids = loader::load_id_registry(&path)?;
    for (data_type, field, domain) in unknown_id_domains(registry, &ids, config) {
        warn!("{data_type}.{field}: id domain '{domain}' is not in the id registry");
    }
    Ok(())
}

/// Regenerate every artifact: build the registry, render all three files of
/// every data type in memory, then wipe the output root and write them.
/// Refuses to run when the output root would hold any input.
pub fn generate(config: &Config) -> Result<GenerateSummary, PipelineError> {
    config.check_output_dir()?;
    let registry = load_registry(config)?;
    check_id_domains(&registry, config)?;

    let rendered = generate_registry(&registry, &config.codegen_options());

    let root = config.output_dir();
    output::clear_output(&root).map_err(|source| PipelineError::Write {
        path: root.clone(),
        source,
    })?;

    let mut summary = GenerateSummary {
        data_types: registry.len(),
        files: Vec::with_capacity(rendered.len() * 3),
    };
    for artifact in rendered.iter().flatten() {
        output::write_artifact(&root, artifact).map_err(|source| PipelineError::Write {
            path: root.join(&artifact.path),
            source,
        })?;
        summary.files.push(artifact.path.clone());
    }

    info!(
        "generated {} files for {} data types in {}",
        summary.files.len(),
        summary.data_types,
        root.display()
    );
    Ok(summary)
}

/// Audit every record file under the records root. Never writes.
pub fn validate(config: &Config) -> Result<ValidationReport, PipelineError> {
    let registry = load_registry(config)?;
    let buckets = loader::discover_records(&config.records_dir(), &config.schema.root_key)?;
    let report = validation::validate(&registry, &buckets)?;

    if report.is_clean() {
        info!(
            "validation passed: {} records in {} buckets",
            report.record_count(),
            report.buckets.len()
        );
    } else {
        let offending: usize = report.buckets.iter().map(|b| b.offending_records.len()).sum();
        warn!(
            "validation found {} discrepancies in {} records",
            report.discrepancies.len(),
            offending
        );
    }
    Ok(report)
}
