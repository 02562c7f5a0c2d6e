//! `MediaFs` over the gio command line
//!
//! Some documentation about the gio command:
//!
//! - <https://manpages.ubuntu.com/manpages/jammy/en/man1/gio.1.html>
//!
//! Each operation is one subcommand run to completion; nothing is cached
//! between calls.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::attributes::{parse_info, parse_list, FileInfo, QUERY_ATTRIBUTES};
use crate::error::{GioAdapterError, Result};
use crate::runner::Gio;
use crate::stream::StreamingFile;
use crate::vfs::{MediaFile, MediaFs};

/// Filesystem rooted at a gio URI (`mtp://...`, `gphoto2://...`, `file://...`)
#[derive(Clone)]
pub struct GioFs {
    base_uri: String,
    gio: Gio,
    cancel: CancellationToken,
}

impl GioFs {
    pub fn new(gio: Gio, base_uri: impl Into<String>) -> Self {
        Self::with_cancel(gio, base_uri, CancellationToken::new())
    }

    /// Like `new`, with a token checked before every subcommand
    pub fn with_cancel(gio: Gio, base_uri: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            base_uri: base_uri.into(),
            gio,
            cancel,
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// URI of `path` below the base URI
    pub fn uri_for(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() || path == "." {
            return self.base_uri.clone();
        }
        if self.base_uri.ends_with('/') {
            format!("{}{}", self.base_uri, path)
        } else {
            format!("{}/{}", self.base_uri, path)
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(GioAdapterError::Cancelled);
        }
        Ok(())
    }

    async fn query(&self, op: &str, path: &str, subcommand: &str) -> Result<String> {
        self.check_cancelled()?;
        let uri = self.uri_for(path);
        trace!("{}: path={:?} uri={}", op, path, uri);

        let out = self
            .gio
            .run(
                op,
                path,
                vec![
                    subcommand.to_string(),
                    "-a".to_string(),
                    QUERY_ATTRIBUTES.to_string(),
                    uri,
                ],
            )
            .await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

#[async_trait]
impl MediaFs for GioFs {
    async fn stat(&self, path: &str) -> Result<FileInfo> {
        let out = self.query("stat", path, "info").await?;
        let mut info = parse_info(&out, path);
        if info.name.is_empty() {
            info.name = self.base_uri.clone();
        }
        Ok(info)
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<FileInfo>> {
        let out = self.query("list", path, "list").await?;
        let mut entries = parse_list(&out);
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("list: path={:?} entries={}", path, entries.len());
        Ok(entries)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.check_cancelled()?;
        let uri = self.uri_for(path);
        debug!("remove: path={:?} uri={}", path, uri);

        self.gio
            .run("remove", path, vec!["remove".to_string(), uri])
            .await?;
        Ok(())
    }

    async fn open(&self, path: &str) -> Result<Box<dyn MediaFile>> {
        let info = match self.stat(path).await {
            Ok(info) => info,
            Err(GioAdapterError::Process { path, message, .. }) => {
                return Err(GioAdapterError::process("open", path, message));
            }
            Err(e) => return Err(e),
        };
        debug!("open: path={:?} size={}", path, info.size);

        Ok(Box::new(StreamingFile::new(
            self.gio.clone(),
            self.uri_for(path),
            info,
        )))
    }
}
