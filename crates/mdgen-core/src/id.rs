use serde::Deserialize;
use std::collections::HashSet;

/// Identifies a data type in the [`TypeRegistry`](crate::registry::TypeRegistry).
/// Indexes schema declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataTypeId(pub u32);

/// A named, inclusive range of identifier values, e.g. `Kanji` = 0..=9999.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdDomain {
    pub name: String,
    pub begin: i64,
    pub end: i64,
}

impl IdDomain {
    pub fn contains(&self, value: i64) -> bool {
        self.begin <= value && value <= self.end
    }
}

/// Read-only view of the identifier-domain registry.
///
/// Domains keep file order; a by-value query returns the first match.
#[derive(Debug, Clone, Default)]
pub struct IdRegistry {
    domains: Vec<IdDomain>,
}

impl IdRegistry {
    pub fn new(domains: Vec<IdDomain>) -> Result<Self, IdRegistryError> {
        let mut seen = HashSet::new();
        for domain in &domains {
            if domain.begin > domain.end {
                return Err(IdRegistryError::InvertedRange {
                    name: domain.name.clone(),
                    begin: domain.begin,
                    end: domain.end,
                });
            }
            if !seen.insert(domain.name.as_str()) {
                return Err(IdRegistryError::DuplicateName(domain.name.clone()));
            }
        }
        Ok(Self { domains })
    }

    /// The domain whose range contains `value`.
    pub fn search_by_value(&self, value: i64) -> Option<&IdDomain> {
        self.domains.iter().find(|d| d.contains(value))
    }

    pub fn search_by_name(&self, name: &str) -> Option<&IdDomain> {
        self.domains.iter().find(|d| d.name == name)
    }

    pub fn domains(&self) -> &[IdDomain] {
        &self.domains
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdRegistryError {
    #[error("id domain '{name}' has begin {begin} after end {end}")]
    InvertedRange { name: String, begin: i64, end: i64 },
    #[error("id domain '{0}' declared twice")]
    DuplicateName(String),
}
