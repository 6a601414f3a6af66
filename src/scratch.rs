use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-execution working directory holding the submitted source and
/// whatever the compiler leaves next to it.
///
/// Each instance gets its own uniquely named directory under the shared
/// root, so concurrent executions never touch each other's files. The
/// directory is removed by [`ScratchSpace::release`], or on drop if the
/// owner never got that far.
pub struct ScratchSpace {
    dir: PathBuf,
    source_path: PathBuf,
    released: bool,
}

impl ScratchSpace {
    /// Reserve a fresh identity under `root`; nothing touches the disk yet.
    pub fn new(root: &Path, source_file: &str) -> Self {
        let dir = root.join(format!("run-{}", Uuid::new_v4().simple()));
        let source_path = dir.join(source_file);
        Self {
            dir,
            source_path,
            released: false,
        }
    }

    /// Create the directory and write `code` verbatim as the source file
    pub async fn write_source(&self, code: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create scratch directory {}", self.dir.display()))?;
        fs::write(&self.source_path, code)
            .await
            .context("Failed to write source code")?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Remove the directory and everything in it. Failures are logged and
    /// otherwise ignored.
    pub async fn release(mut self) {
        self.released = true;
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!(dir = %self.dir.display(), "scratch space removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.dir.display(), error = %e, "Error cleaning up scratch space"),
        }
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != ErrorKind::NotFound {
                warn!(dir = %self.dir.display(), error = %e, "Error cleaning up scratch space");
            }
        }
    }
}
