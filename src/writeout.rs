//! `--write DIR` artifact persistence.
//!
//! Writes every artifact in the store to `DIR/NAME`, creating `DIR` if it
//! doesn't already exist. Overwrites are permitted — a repeated run against
//! the same directory is expected during iterative client-test setup.

use std::path::Path;

use tracing::info;

use crate::store::ArtifactStore;
use crate::{Error, Result};

/// Write every artifact in `store` to `dir`, one file per artifact.
///
/// # Errors
///
/// Returns [`Error::Config`] if `dir` cannot be created or a file cannot be
/// written.
pub async fn write_all(store: &ArtifactStore, dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Config(format!("failed to create directory '{}': {e}", dir.display())))?;

    for name in store.names() {
        let bytes = store.get(name).expect("name came from store.names()");
        let path = dir.join(name);
        tokio::fs::write(&path, &*bytes)
            .await
            .map_err(|e| Error::Config(format!("failed to write artifact '{}': {e}", path.display())))?;
    }

    info!(dir = %dir.display(), count = store.len(), "wrote artifacts to disk");
    Ok(())
}
