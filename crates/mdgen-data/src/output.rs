//! Writing generated artifacts under the output root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use mdgen_core::codegen::Artifact;

/// Remove the output root and everything below it. A missing root is fine.
pub fn clear_output(root: &Path) -> io::Result<()> {
    match fs::remove_dir_all(root) {
        Ok(()) => {
            debug!(dir = %root.display(), "cleared output root");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Write one artifact, creating parent directories as needed. Returns the
/// absolute path written.
pub fn write_artifact(root: &Path, artifact: &Artifact) -> io::Result<PathBuf> {
    let path = root.join(&artifact.path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, &artifact.text)?;
    info!("create file: {}", artifact.path.display());
    Ok(path)
}
