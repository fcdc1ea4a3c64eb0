use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Per-invocation scratch directory, removed with everything in it when
/// dropped.
pub struct ScratchSpace {
    dir: PathBuf,
}

impl ScratchSpace {
    pub fn create(work_dir: &Path) -> std::io::Result<Self> {
        let dir = work_dir.join(format!("compose-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove scratch directory {}: {}", self.dir.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_removed_on_drop() {
        let work = TempDir::new().unwrap();
        let dir;
        {
            let scratch = ScratchSpace::create(work.path()).unwrap();
            std::fs::write(scratch.file("a.wav"), b"x").unwrap();
            dir = scratch.path().to_path_buf();
            assert!(dir.exists());
        }
        assert!(!dir.exists());
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_distinct_per_invocation() {
        let work = TempDir::new().unwrap();
        let a = ScratchSpace::create(work.path()).unwrap();
        let b = ScratchSpace::create(work.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
