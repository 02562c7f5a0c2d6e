//! Mount enumeration through `gio mount -l`
//!
//! Only the `Mount(<n>): <name> -> <protocol>://<host-and-path>` lines are of
//! interest; drives, volumes and their detail lines are ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::runner::Gio;

static MOUNT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*Mount\(\d+\):\s([[:print:]]*)\s->\s([[:print:]]+)$").unwrap()
});

static MOUNT_TARGET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)://(.+)$").unwrap());

/// A mounted media as reported by `gio mount -l`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    /// Name shown by gio (e.g. the phone model)
    pub device_name: String,
    /// URI scheme: `file`, `mtp`, `gphoto2`, ...
    pub protocol: String,
    /// Percent-unescaped URI
    pub uri: String,
    /// Part after `://`, still escaped. GVFS names its fuse directories after
    /// this form.
    pub location: String,
}

impl MountRecord {
    /// Local path of a `file://` mount
    pub fn local_path(&self) -> Option<&str> {
        self.uri.strip_prefix("file://")
    }
}

/// Parse `gio mount -l` output. Lines outside the mount grammar are skipped.
pub fn parse_mount_list(output: &str) -> Vec<MountRecord> {
    let mut records = Vec::new();

    for caps in MOUNT_LINE.captures_iter(output) {
        let name = &caps[1];
        let target = &caps[2];

        // gio lists an extra "mtp" entry next to the named MTP device
        if name == "mtp" {
            debug!("Skipping placeholder mount {:?}", target);
            continue;
        }

        let Some(parts) = MOUNT_TARGET.captures(target) else {
            debug!("Skipping mount {:?} without a URI target", name);
            continue;
        };

        let uri = match urlencoding::decode(target) {
            Ok(uri) => uri.into_owned(),
            Err(e) => {
                debug!("Skipping mount {:?}: bad escape in {:?}: {}", name, target, e);
                continue;
            }
        };

        records.push(MountRecord {
            device_name: name.to_string(),
            protocol: parts[1].to_string(),
            uri,
            location: parts[2].to_string(),
        });
    }

    records
}

/// Lists mounted media through gio
#[derive(Clone)]
pub struct MountEnumerator {
    gio: Gio,
}

impl MountEnumerator {
    pub fn new(gio: Gio) -> Self {
        Self { gio }
    }

    pub async fn list(&self) -> Result<Vec<MountRecord>> {
        let out = self
            .gio
            .run("list", "mounts", vec!["mount".into(), "-l".into()])
            .await?;
        let records = parse_mount_list(&String::from_utf8_lossy(&out));
        debug!("gio reported {} mount(s)", records.len());
        Ok(records)
    }
}
