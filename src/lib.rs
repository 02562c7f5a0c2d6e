//! gio-adapter: camera and phone media through the `gio` command line
//!
//! Removable media mounted by GVFS (MTP phones, PTP/gphoto2 cameras, memory
//! cards) are reachable through `gio` subcommands even when no usable local
//! path exists. This library wraps those subcommands into a small filesystem
//! abstraction and finds the photo directories of the connected devices.
//!
//! # Architecture
//!
//! - **Runner**: `Gio` handle running the external tool, with a shared,
//!   write-once availability probe. Tests swap the runner for fixtures.
//! - **Mounts**: `MountEnumerator` parses `gio mount -l`.
//! - **Locator**: `DeviceLocator` maps mounts to concrete DCIM directories,
//!   using the GVFS fuse mount point for MTP and gphoto2 devices.
//! - **Filesystem**: `GioFs` implements the `MediaFs` trait (stat, list,
//!   remove, open) over `gio info/list/remove`.
//! - **Streaming**: `StreamingFile` reads a file through a lazily started
//!   `gio cat` subprocess.
//!
//! # Example
//!
//! ```no_run
//! use gio_adapter::config::Config;
//! use gio_adapter::locator::DeviceLocator;
//! use gio_adapter::runner::Gio;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let gio = Gio::system(&config.gio.program);
//!
//! let locator = DeviceLocator::new(gio, config.discovery.clone());
//! for device in locator.search(&CancellationToken::new()).await? {
//!     println!("{}: {}", device.name, device.path.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod config;
pub mod env;
pub mod error;
pub mod locator;
pub mod mount;
pub mod runner;
pub mod stream;
pub mod vfs;

pub use error::{GioAdapterError, Result};
