//! Blob storage for finished videos and intermediate files.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

const CHUNK_SIZE: usize = 64 * 1024;

/// Bytes transferred so far and the total size.
pub type ProgressFn<'a> = dyn Fn(u64, u64) + Send + Sync + 'a;

/// Remote object storage addressed by key on upload and by URL afterwards.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Upload a local file under `key`, returning its URL.
    async fn upload(&self, local: &Path, key: &str, progress: &ProgressFn<'_>) -> StorageResult<String>;

    /// Download the object at `url` to `dest`.
    async fn download(&self, url: &str, dest: &Path, progress: &ProgressFn<'_>) -> StorageResult<()>;

    async fn delete(&self, url: &str) -> StorageResult<()>;
}

/// Progress callback that ignores updates.
pub fn no_progress(_done: u64, _total: u64) {}

/// Blob storage rooted at a local directory, handing out `file://` URLs.
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn url_for(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    /// Map a URL back to a path inside the root.
    fn url_path(&self, url: &str) -> StorageResult<PathBuf> {
        let raw = url
            .strip_prefix("file://")
            .ok_or_else(|| StorageError::InvalidKey(url.to_string()))?;
        let path = PathBuf::from(raw);
        let inside = path.starts_with(&self.root)
            && !path.components().any(|c| matches!(c, Component::ParentDir));
        if !inside {
            return Err(StorageError::InvalidKey(url.to_string()));
        }
        Ok(path)
    }
}

async fn copy_with_progress(from: &Path, to: &Path, progress: &ProgressFn<'_>) -> std::io::Result<u64> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut src = File::open(from).await?;
    let total = src.metadata().await?.len();
    let mut dst = File::create(to).await?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut done = 0u64;
    loop {
        let n = src.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n]).await?;
        done += n as u64;
        progress(done, total);
    }
    dst.flush().await?;
    Ok(done)
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn upload(&self, local: &Path, key: &str, progress: &ProgressFn<'_>) -> StorageResult<String> {
        let dest = self.key_path(key)?;
        debug!("Uploading {} to {}", local.display(), key);

        let bytes = copy_with_progress(local, &dest, progress)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", local.display(), e)))?;

        info!("Uploaded {} ({} bytes) to {}", local.display(), bytes, key);
        Ok(Self::url_for(&dest))
    }

    async fn download(&self, url: &str, dest: &Path, progress: &ProgressFn<'_>) -> StorageResult<()> {
        let src = self.url_path(url)?;
        if !tokio::fs::try_exists(&src).await? {
            return Err(StorageError::NotFound(url.to_string()));
        }

        copy_with_progress(&src, dest, progress)
            .await
            .map_err(|e| StorageError::download_failed(format!("{}: {}", url, e)))?;
        debug!("Downloaded {} to {}", url, dest.display());
        Ok(())
    }

    async fn delete(&self, url: &str) -> StorageResult<()> {
        let path = self.url_path(url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(url.to_string())),
            Err(e) => Err(StorageError::DeleteFailed(format!("{}: {}", url, e))),
        }
    }
}
