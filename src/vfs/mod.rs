pub mod gio;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tracing::debug;

use crate::attributes::FileInfo;
use crate::error::{GioAdapterError, Result};

/// An opened file: a sequential byte stream plus the metadata known at open
/// time
pub trait MediaFile: AsyncRead + Send + Unpin {
    fn stat(&self) -> &FileInfo;

    /// Release the handle.
    ///
    /// Nothing is cancelled: a subprocess already feeding the file ends on
    /// its own once its output is consumed or the pipe is gone.
    fn close(self: Box<Self>) {}
}

/// Read-and-delete view of a device's files
///
/// This is the whole surface an importer needs: walk with `list_dir`, inspect
/// with `stat`, copy through `open`, and `remove` after a move. Paths are
/// relative to the filesystem root; `""` is the root itself.
#[async_trait]
pub trait MediaFs: Send + Sync {
    /// Get metadata for a path
    async fn stat(&self, path: &str) -> Result<FileInfo>;

    /// List directory contents, sorted by name
    async fn list_dir(&self, path: &str) -> Result<Vec<FileInfo>>;

    /// Check if a path exists
    ///
    /// Default implementation uses stat(). A failing `gio` subcommand counts
    /// as absence; an unavailable tool or cancellation is still an error.
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(GioAdapterError::Process { .. } | GioAdapterError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove a file or an empty directory
    async fn remove(&self, path: &str) -> Result<()>;

    /// Open a file for sequential reading
    ///
    /// Metadata is fetched here so it is available before the first byte.
    async fn open(&self, path: &str) -> Result<Box<dyn MediaFile>>;
}

/// Join a directory path and an entry name the way `MediaFs` paths are written
pub fn join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() || dir == "." {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Locate the photo directory inside a mounted device.
///
/// Camera and phone protocols expose one storage directory per memory
/// (internal storage, SD card, ...) with the photo directory below it, so the
/// first `*/<photo_dir>` wins. Plain mounts are browsed from their root.
pub async fn find_photo_root(
    fs: &dyn MediaFs,
    protocol: &str,
    photo_dir: &str,
) -> Result<Option<String>> {
    match protocol {
        "mtp" | "gphoto2" => {
            for storage in fs.list_dir("").await?.into_iter().filter(|e| e.is_dir) {
                let entries = match fs.list_dir(&storage.name).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        debug!("Can't list storage {:?}: {}", storage.name, e);
                        continue;
                    }
                };
                if entries.iter().any(|e| e.is_dir && e.name == photo_dir) {
                    return Ok(Some(join(&storage.name, photo_dir)));
                }
            }
            Ok(None)
        }
        _ => Ok(Some(String::new())),
    }
}
