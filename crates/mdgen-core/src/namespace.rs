use std::fmt;
use std::path::PathBuf;

/// Slash-delimited namespace grouping for data types.
///
/// The root bucket has no segments. It never collides with a real segment
/// because a real path always has at least one non-empty segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamespacePath(Vec<String>);

impl NamespacePath {
    /// The bucket for data types declared at the top of the schema.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse `a/b/c`. Empty input, `.` and empty segments map to the root bucket.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|s| !s.is_empty() && *s != ".")
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new path one level deeper.
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Relative directory for this namespace. Empty for the root bucket.
    pub fn to_dir(&self) -> PathBuf {
        self.0.iter().collect()
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("(root)")
        } else {
            f.write_str(&self.0.join("/"))
        }
    }
}
