//! Subprocess-backed file reads
//!
//! A [`StreamingFile`] reads a file through `gio cat <uri>`. The subprocess is
//! started by the first read, not at open time:
//!
//! ```text
//! Unopened --first read--> Opening --spawned--> Streaming --exit 0--> Eof
//!                             |                     |
//!                             +-------error---------+--exit != 0--> Failed
//! ```
//!
//! Reads pend while the subprocess is being started. Once it runs, bytes come
//! straight from its stdout. A watcher task owns the child, collects stderr and
//! reports the exit status over a oneshot channel; the reader only consults
//! that verdict once stdout is drained, so the terminal state has one writer.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::process::Child;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::attributes::FileInfo;
use crate::error::{GioAdapterError, Result};
use crate::runner::Gio;
use crate::vfs::MediaFile;

type ExitVerdict = std::result::Result<(), GioAdapterError>;

/// Externally visible stage of a [`StreamingFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unopened,
    Opening,
    Streaming,
    Eof,
    Failed,
}

struct Running {
    stdout: Box<dyn AsyncRead + Send + Unpin>,
    exit: oneshot::Receiver<ExitVerdict>,
}

enum State {
    Unopened,
    Opening(BoxFuture<'static, Result<Running>>),
    Streaming(Running),
    Eof,
    Failed(Arc<GioAdapterError>),
}

/// A file on the media, read through a `gio cat` subprocess
pub struct StreamingFile {
    uri: String,
    info: FileInfo,
    gio: Gio,
    state: State,
}

impl StreamingFile {
    pub fn new(gio: Gio, uri: impl Into<String>, info: FileInfo) -> Self {
        Self {
            uri: uri.into(),
            info,
            gio,
            state: State::Unopened,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Unopened => Phase::Unopened,
            State::Opening(_) => Phase::Opening,
            State::Streaming(_) => Phase::Streaming,
            State::Eof => Phase::Eof,
            State::Failed(_) => Phase::Failed,
        }
    }
}

impl MediaFile for StreamingFile {
    fn stat(&self) -> &FileInfo {
        &self.info
    }
}

async fn start(gio: Gio, uri: String) -> Result<Running> {
    let mut child = gio.spawn(vec!["cat".to_string(), uri.clone()]).await?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| GioAdapterError::Stream(format!("no stdout for gio cat {}", uri)))?;

    let (tx, exit) = oneshot::channel();
    tokio::spawn(watch(child, uri, tx));

    Ok(Running {
        stdout: Box::new(stdout),
        exit,
    })
}

/// Wait for `gio cat` to finish and report how it went
async fn watch(mut child: Child, uri: String, verdict: oneshot::Sender<ExitVerdict>) {
    let mut diagnostic = Vec::new();
    if let Some(mut stderr) = child.stderr.take() {
        if let Err(e) = stderr.read_to_end(&mut diagnostic).await {
            debug!("Lost stderr of gio cat {}: {}", uri, e);
        }
    }

    let outcome = match child.wait().await {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => {
            let message = String::from_utf8_lossy(&diagnostic).trim().to_string();
            let message = if message.is_empty() {
                status.to_string()
            } else {
                message
            };
            Err(GioAdapterError::process("cat", uri.as_str(), message))
        }
        Err(e) => Err(GioAdapterError::Io(e)),
    };

    trace!("gio cat {} finished: {:?}", uri, outcome);
    // The reader may be gone already
    let _ = verdict.send(outcome);
}

/// Reading a pipe torn down under our feet means the subprocess is done
fn is_closed_pipe(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::BrokenPipe || e.to_string().contains("already closed")
}

impl AsyncRead for StreamingFile {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            match &mut this.state {
                State::Unopened => {
                    debug!("Starting gio cat {}", this.uri);
                    let opening = start(this.gio.clone(), this.uri.clone()).boxed();
                    this.state = State::Opening(opening);
                }
                State::Opening(opening) => {
                    this.state = match ready!(opening.as_mut().poll(cx)) {
                        Ok(running) => State::Streaming(running),
                        Err(e) => State::Failed(Arc::new(e)),
                    };
                }
                State::Streaming(running) => {
                    let before = buf.filled().len();
                    match ready!(Pin::new(&mut running.stdout).poll_read(cx, buf)) {
                        Ok(()) if buf.filled().len() > before => return Poll::Ready(Ok(())),
                        Ok(()) => {
                            // stdout drained, the exit status decides
                            this.state = match ready!(Pin::new(&mut running.exit).poll(cx)) {
                                Ok(Ok(())) => State::Eof,
                                Ok(Err(e)) => State::Failed(Arc::new(e)),
                                Err(_) => State::Failed(Arc::new(GioAdapterError::Stream(
                                    format!("lost track of gio cat {}", this.uri),
                                ))),
                            };
                        }
                        Err(e) if is_closed_pipe(&e) => {
                            trace!("gio cat {} pipe closed: {}", this.uri, e);
                            this.state = State::Eof;
                        }
                        Err(e) => {
                            this.state =
                                State::Failed(Arc::new(GioAdapterError::Stream(e.to_string())));
                        }
                    }
                }
                State::Eof => return Poll::Ready(Ok(())),
                State::Failed(err) => {
                    return Poll::Ready(Err(io::Error::new(err.to_io_error_kind(), err.clone())));
                }
            }
        }
    }
}
