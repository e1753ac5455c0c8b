//! Consistency checks between authored records and the declared schema.
//!
//! Every record of a bucket is compared in both directions: declared fields
//! the record lacks, and record fields the schema does not declare. Nothing
//! stops early; one pass yields the complete list of discrepancies.

use std::fmt;
use tracing::{error, info};

use crate::namespace::NamespacePath;
use crate::registry::{DataType, LookupError, TypeRegistry};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// All records authored for one `(namespace, type)` pair, keyed by record
/// key in file order.
#[derive(Debug, Clone)]
pub struct RecordBucket {
    pub namespace: NamespacePath,
    pub data_type: String,
    pub records: toml::Table,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscrepancyKind {
    /// Declared in the schema, absent from the record.
    Missing,
    /// Present in the record, not declared in the schema.
    Unnecessary,
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscrepancyKind::Missing => f.write_str("missing"),
            DiscrepancyKind::Unnecessary => f.write_str("unnecessary"),
        }
    }
}

/// One field-set mismatch on one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    pub namespace: NamespacePath,
    pub data_type: String,
    pub record_key: String,
    pub field: String,
    pub kind: DiscrepancyKind,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{} ({}): {} field '{}'",
            self.data_type, self.record_key, self.namespace, self.kind, self.field
        )
    }
}

/// Per-bucket outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    pub namespace: NamespacePath,
    pub data_type: String,
    pub record_count: usize,
    pub offending_records: Vec<String>,
}

impl BucketSummary {
    pub fn is_clean(&self) -> bool {
        self.offending_records.is_empty()
    }
}

/// Result of one validation run.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub buckets: Vec<BucketSummary>,
    pub discrepancies: Vec<Discrepancy>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.buckets.iter().map(|b| b.record_count).sum()
    }

    /// Discrepancies of one record, identified by its bucket and key.
    pub fn for_record<'a>(
        &'a self,
        namespace: &'a NamespacePath,
        data_type: &'a str,
        record_key: &'a str,
    ) -> impl Iterator<Item = &'a Discrepancy> {
        self.discrepancies.iter().filter(move |d| {
            d.namespace == *namespace && d.data_type == data_type && d.record_key == record_key
        })
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check every record of every bucket against its declared data type.
///
/// An unknown bucket is a lookup failure and aborts the run; field-set
/// mismatches never do.
pub fn validate(
    registry: &TypeRegistry,
    buckets: &[RecordBucket],
) -> Result<ValidationReport, LookupError> {
    let mut report = ValidationReport::default();

    for bucket in buckets {
        info!(
            "validate... : {} ({})",
            bucket.data_type, bucket.namespace
        );
        let data_type = registry.at(&bucket.data_type, &bucket.namespace)?;
        let mut summary = BucketSummary {
            namespace: bucket.namespace.clone(),
            data_type: bucket.data_type.clone(),
            record_count: bucket.records.len(),
            offending_records: Vec::new(),
        };

        for (key, record) in &bucket.records {
            let found = check_record(data_type, key, record);
            if !found.is_empty() {
                summary.offending_records.push(key.clone());
                report.discrepancies.extend(found);
            }
        }

        if summary.is_clean() {
            info!(
                "All data is validated : {} records in {} ({})",
                summary.record_count, summary.data_type, summary.namespace
            );
        }
        report.buckets.push(summary);
    }

    Ok(report)
}

/// Compare one record's field set to the declared one. A record that is not
/// a table has no fields, so every declared field is reported missing.
pub fn check_record(data_type: &DataType, key: &str, record: &toml::Value) -> Vec<Discrepancy> {
    let empty = toml::Table::new();
    let fields = record.as_table().unwrap_or(&empty);

    let discrepancy = |field: &str, kind| Discrepancy {
        namespace: data_type.namespace().clone(),
        data_type: data_type.name().to_string(),
        record_key: key.to_string(),
        field: field.to_string(),
        kind,
    };

    let missing: Vec<Discrepancy> = data_type
        .fields()
        .iter()
        .filter(|f| !fields.contains_key(&f.name))
        .map(|f| discrepancy(&f.name, DiscrepancyKind::Missing))
        .collect();
    if !missing.is_empty() {
        error!("The submitted data contains missing fields. (key: [{key}])");
        for d in &missing {
            error!("> {}", d.field);
        }
    }

    let unnecessary: Vec<Discrepancy> = fields
        .keys()
        .filter(|name| data_type.field(name).is_none())
        .map(|name| discrepancy(name, DiscrepancyKind::Unnecessary))
        .collect();
    if !unnecessary.is_empty() {
        error!("The submitted data contains unnecessary fields. (key: [{key}])");
        for d in &unnecessary {
            error!("> {}", d.field);
        }
    }

    missing.into_iter().chain(unnecessary).collect()
}
