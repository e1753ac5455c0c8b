//! mdgen core -- the schema compiler behind the game client's master data.
//!
//! A master-data schema declares every data type once: its fields, each
//! field's type token, and which field is the primary key. This crate turns
//! that declaration into an immutable [`registry::TypeRegistry`] and from it
//! produces three mutually consistent C++ artifacts per data type, then
//! audits authored records against the same declaration.
//!
//! # Pipeline
//!
//! 1. **Resolve** -- [`field::resolve`] parses `base[:attr]*` tokens into
//!    storage and call-site types.
//! 2. **Register** -- [`registry::TypeRegistry::load`] walks the schema tree
//!    and enforces one primary key per data type.
//! 3. **Generate** -- [`codegen::generate`] renders the value class, the
//!    repository declaration and the repository definition.
//! 4. **Validate** -- [`validation::validate`] compares record field sets
//!    against declared field sets and accumulates every discrepancy.
//!
//! # Key Types
//!
//! - [`field::ResolvedField`] -- one field with its storage/call types.
//! - [`registry::DataType`] -- ordered fields plus the primary key.
//! - [`namespace::NamespacePath`] -- slash-delimited grouping, with a root
//!   bucket for ungrouped types.
//! - [`id::IdRegistry`] -- named identifier ranges, queried by value or name.
//!
//! Filesystem access, configuration and logging setup live in `mdgen-data`
//! and `mdgen-cli`; everything here works on in-memory values.

pub mod codegen;
pub mod field;
pub mod id;
pub mod namespace;
pub mod registry;
pub mod validation;

pub use codegen::{Artifact, ArtifactKind, CodegenOptions};
pub use field::{ResolvedField, ResolverRules};
pub use namespace::NamespacePath;
pub use registry::{DataType, LookupError, SchemaError, SchemaOptions, TypeRegistry};
pub use validation::{Discrepancy, DiscrepancyKind, RecordBucket, ValidationReport};
