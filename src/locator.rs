//! Photo directory discovery
//!
//! A [`MountRecord`] is turned into a candidate DCIM path, then expanded
//! against the live filesystem:
//!
//! - `file` mounts are plain local paths: `<path>/DCIM`.
//! - `mtp` devices live under the GVFS fuse root and carry an extra storage
//!   directory whose name changes between plug events:
//!   `<fuse>/mtp:host=<location>/*/DCIM`.
//! - anything else (gphoto2, ...) sits directly under the fuse root:
//!   `<fuse>/<protocol>:host=<location>/DCIM`.

use std::path::{Component, Path, PathBuf};

use globset::Glob;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::error::{GioAdapterError, Result};
use crate::mount::{MountEnumerator, MountRecord};
use crate::runner::Gio;

/// A device directory that holds photos
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoDevice {
    pub name: String,
    pub protocol: String,
    pub path: PathBuf,
}

/// Find the GVFS fuse mount point in a mount table (`/proc/self/mounts`
/// format). The first entry whose source is `daemon` wins.
pub fn find_fuse_root(mount_table: &str, daemon: &str) -> Result<PathBuf> {
    mount_table
        .lines()
        .find_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(source), Some(target)) if source == daemon => {
                    Some(PathBuf::from(unescape_mount_field(target)))
                }
                _ => None,
            }
        })
        .ok_or_else(|| GioAdapterError::NotFound(format!("{} mount point", daemon)))
}

/// Undo the octal escapes (`\040` for a space, ...) used in mount tables
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits.iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(b) = u8::try_from(value) {
                    out.push(b);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Candidate (possibly wildcarded) photo directory for a mount.
///
/// Fails with `NotFound` when the protocol needs the fuse root and there is
/// none.
pub fn candidate_path(
    record: &MountRecord,
    fuse_root: Option<&Path>,
    photo_dir: &str,
) -> Result<PathBuf> {
    if record.protocol == "file" {
        let local = record.local_path().ok_or_else(|| {
            GioAdapterError::Parse(format!("file mount without local path: {}", record.uri))
        })?;
        return Ok(Path::new(local).join(photo_dir));
    }

    let root = fuse_root.ok_or_else(|| {
        GioAdapterError::NotFound(format!(
            "fuse mount point needed for {} device {:?}",
            record.protocol, record.device_name
        ))
    })?;
    let device_dir = root.join(format!("{}:host={}", record.protocol, record.location));

    if record.protocol == "mtp" {
        Ok(device_dir.join("*").join(photo_dir))
    } else {
        Ok(device_dir.join(photo_dir))
    }
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(|c: char| matches!(c, '*' | '?' | '['))
}

/// Expand wildcard segments of `pattern` against the filesystem.
///
/// Returns the existing matches in sorted order. No match is an empty result,
/// not an error.
pub fn expand(pattern: &Path) -> Result<Vec<PathBuf>> {
    let mut candidates = vec![PathBuf::new()];

    for component in pattern.components() {
        let segment = match component {
            Component::Normal(s) => s.to_string_lossy(),
            other => {
                for c in candidates.iter_mut() {
                    c.push(other.as_os_str());
                }
                continue;
            }
        };

        if !has_wildcard(&segment) {
            for c in candidates.iter_mut() {
                c.push(&*segment);
            }
            continue;
        }

        let matcher = Glob::new(&segment)
            .map_err(|e| GioAdapterError::Parse(format!("bad pattern {:?}: {}", segment, e)))?
            .compile_matcher();

        let mut next = Vec::new();
        for dir in &candidates {
            let read_from = if dir.as_os_str().is_empty() {
                Path::new(".")
            } else {
                dir.as_path()
            };
            let Ok(entries) = std::fs::read_dir(read_from) else {
                continue;
            };
            let mut names: Vec<_> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name())
                .filter(|name| matcher.is_match(Path::new(name)))
                .collect();
            names.sort();
            next.extend(names.into_iter().map(|name| dir.join(name)));
        }
        candidates = next;
    }

    candidates.retain(|p| p.exists());
    Ok(candidates)
}

/// Finds photo directories of the mounted media
pub struct DeviceLocator {
    mounts: MountEnumerator,
    config: DiscoveryConfig,
}

impl DeviceLocator {
    pub fn new(gio: Gio, config: DiscoveryConfig) -> Self {
        Self {
            mounts: MountEnumerator::new(gio),
            config,
        }
    }

    /// Resolve the GVFS fuse root from the configured mount table
    pub async fn fuse_root(&self) -> Result<PathBuf> {
        let table = tokio::fs::read_to_string(&self.config.mount_table).await?;
        find_fuse_root(&table, &self.config.fuse_daemon)
    }

    /// Resolve every record to its concrete photo directories.
    ///
    /// The token is checked before each device. A device whose candidate
    /// cannot be built or expanded is logged and skipped.
    pub async fn locate(
        &self,
        records: &[MountRecord],
        fuse_root: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<Vec<PhotoDevice>> {
        let mut devices = Vec::new();

        for record in records {
            if cancel.is_cancelled() {
                return Err(GioAdapterError::Cancelled);
            }

            if !self.config.accepts(&record.protocol) {
                debug!("Ignoring {} mount {:?}", record.protocol, record.device_name);
                continue;
            }

            let pattern = match candidate_path(record, fuse_root, &self.config.photo_dir) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Skipping device {:?}: {}", record.device_name, e);
                    continue;
                }
            };

            let matches = tokio::task::spawn_blocking({
                let pattern = pattern.clone();
                move || expand(&pattern)
            })
            .await
            .map_err(|e| GioAdapterError::Io(std::io::Error::other(e)))?;

            let matches = match matches {
                Ok(m) => m,
                Err(e) => {
                    warn!("Can't expand {:?}: {}", pattern, e);
                    continue;
                }
            };

            if matches.is_empty() {
                debug!("No photo directory yet for {:?} ({:?})", record.device_name, pattern);
                continue;
            }

            info!("Found device {}", record.device_name);
            devices.extend(matches.into_iter().map(|path| PhotoDevice {
                name: record.device_name.clone(),
                protocol: record.protocol.clone(),
                path,
            }));
        }

        Ok(devices)
    }

    /// Enumerate mounts and resolve their photo directories.
    ///
    /// A missing fuse root only disables the protocols that need it.
    pub async fn search(&self, cancel: &CancellationToken) -> Result<Vec<PhotoDevice>> {
        let records = self.mounts.list().await?;

        let fuse_root = match self.fuse_root().await {
            Ok(root) => Some(root),
            Err(e) => {
                warn!("GVFS fuse mount point unavailable: {}", e);
                None
            }
        };

        self.locate(&records, fuse_root.as_deref(), cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::FakeRunner;
    use std::fs;

    fn record(name: &str, protocol: &str, location: &str) -> MountRecord {
        MountRecord {
            device_name: name.to_string(),
            protocol: protocol.to_string(),
            uri: format!("{}://{}", protocol, location),
            location: location.to_string(),
        }
    }

    fn locator(gio: Gio, mount_table: &Path) -> DeviceLocator {
        DeviceLocator::new(
            gio,
            DiscoveryConfig {
                mount_table: mount_table.to_path_buf(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_find_fuse_root() {
        let table = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
gvfsd-fuse /run/user/1000/gvfs fuse.gvfsd-fuse rw,nosuid,nodev,relatime,user_id=1000,group_id=1000 0 0
";
        assert_eq!(
            find_fuse_root(table, "gvfsd-fuse").unwrap(),
            PathBuf::from("/run/user/1000/gvfs")
        );
    }

    #[test]
    fn test_find_fuse_root_unescapes_and_reports_absence() {
        let table = "gvfsd-fuse /home/me/my\\040gvfs fuse.gvfsd-fuse rw 0 0\n";
        assert_eq!(
            find_fuse_root(table, "gvfsd-fuse").unwrap(),
            PathBuf::from("/home/me/my gvfs")
        );

        let err = find_fuse_root("proc /proc proc rw 0 0\n", "gvfsd-fuse").unwrap_err();
        assert!(matches!(err, GioAdapterError::NotFound(_)));
    }

    #[test]
    fn test_candidate_paths_per_protocol() {
        let root = Path::new("/run/user/1000/gvfs");

        let file = MountRecord {
            device_name: "EOS_DIGITAL".to_string(),
            protocol: "file".to_string(),
            uri: "file:///media/user/EOS DIGITAL".to_string(),
            location: "/media/user/EOS%20DIGITAL".to_string(),
        };
        assert_eq!(
            candidate_path(&file, None, "DCIM").unwrap(),
            PathBuf::from("/media/user/EOS DIGITAL/DCIM")
        );

        let mtp = record("Pixel 7", "mtp", "Google_Pixel_7_2A11/");
        assert_eq!(
            candidate_path(&mtp, Some(root), "DCIM").unwrap(),
            PathBuf::from("/run/user/1000/gvfs/mtp:host=Google_Pixel_7_2A11/*/DCIM")
        );

        let ptp = record("Canon", "gphoto2", "%5Busb%3A001%2C005%5D/");
        assert_eq!(
            candidate_path(&ptp, Some(root), "DCIM").unwrap(),
            PathBuf::from("/run/user/1000/gvfs/gphoto2:host=%5Busb%3A001%2C005%5D/DCIM")
        );

        assert!(matches!(
            candidate_path(&mtp, None, "DCIM"),
            Err(GioAdapterError::NotFound(_))
        ));
    }

    #[test]
    fn test_expand_wildcard_two_matches() {
        let tmp = tempfile::tempdir().unwrap();
        let device = tmp.path().join("mtp:host=Pixel");
        fs::create_dir_all(device.join("Internal storage/DCIM")).unwrap();
        fs::create_dir_all(device.join("SD card/DCIM")).unwrap();
        fs::create_dir_all(device.join("Empty storage")).unwrap();

        let found = expand(&device.join("*").join("DCIM")).unwrap();
        assert_eq!(
            found,
            vec![
                device.join("Internal storage/DCIM"),
                device.join("SD card/DCIM"),
            ]
        );
        assert!(found.iter().all(|p| !p.to_string_lossy().contains('*')));
    }

    #[test]
    fn test_expand_no_match_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(expand(&tmp.path().join("*").join("DCIM")).unwrap().is_empty());
        assert!(expand(&tmp.path().join("DCIM")).unwrap().is_empty());

        fs::create_dir(tmp.path().join("DCIM")).unwrap();
        assert_eq!(
            expand(&tmp.path().join("DCIM")).unwrap(),
            vec![tmp.path().join("DCIM")]
        );
    }

    #[tokio::test]
    async fn test_locate_yields_one_device_per_match() {
        let tmp = tempfile::tempdir().unwrap();
        let device = tmp.path().join("mtp:host=Pixel");
        fs::create_dir_all(device.join("Internal storage/DCIM")).unwrap();
        fs::create_dir_all(device.join("SD card/DCIM")).unwrap();

        let (_, gio) = FakeRunner::new().into_gio();
        let locator = locator(gio, &tmp.path().join("mounts"));

        let devices = locator
            .locate(
                &[record("Pixel 7", "mtp", "Pixel")],
                Some(tmp.path()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.name == "Pixel 7"));
        assert_eq!(devices[0].path, device.join("Internal storage/DCIM"));
        assert_eq!(devices[1].path, device.join("SD card/DCIM"));
    }

    #[tokio::test]
    async fn test_locate_maps_any_protocol_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("afc:host=iPhone/DCIM")).unwrap();

        let (_, gio) = FakeRunner::new().into_gio();
        let locator = locator(gio, &tmp.path().join("mounts"));

        let devices = locator
            .locate(
                &[record("iPhone", "afc", "iPhone")],
                Some(tmp.path()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            devices,
            vec![PhotoDevice {
                name: "iPhone".to_string(),
                protocol: "afc".to_string(),
                path: tmp.path().join("afc:host=iPhone/DCIM"),
            }]
        );
    }

    #[tokio::test]
    async fn test_locate_honors_protocol_list() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("afc:host=iPhone/DCIM")).unwrap();

        let (_, gio) = FakeRunner::new().into_gio();
        let locator = DeviceLocator::new(
            gio,
            DiscoveryConfig {
                protocols: vec!["mtp".to_string()],
                ..Default::default()
            },
        );

        let devices = locator
            .locate(
                &[record("iPhone", "afc", "iPhone")],
                Some(tmp.path()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(devices.is_empty());
    }

    #[tokio::test]
    async fn test_locate_is_cancellable() {
        let (_, gio) = FakeRunner::new().into_gio();
        let locator = locator(gio, Path::new("/nonexistent"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = locator
            .locate(&[record("Pixel 7", "mtp", "Pixel")], None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GioAdapterError::Cancelled));
    }

    #[tokio::test]
    async fn test_search_without_fuse_root_keeps_file_mounts() {
        let tmp = tempfile::tempdir().unwrap();
        let card = tmp.path().join("card");
        fs::create_dir_all(card.join("DCIM")).unwrap();
        let table = tmp.path().join("mounts");
        fs::write(&table, "/dev/sda1 / ext4 rw 0 0\n").unwrap();

        let mount_output = format!(
            "Mount(0): Pixel 7 -> mtp://Pixel/\nMount(1): CARD -> file://{}\nMount(2): Share -> smb://nas/photos\n",
            card.display()
        );
        let (_, gio) = FakeRunner::new().with_ok("mount", &mount_output).into_gio();

        let devices = locator(gio, &table)
            .search(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            devices,
            vec![PhotoDevice {
                name: "CARD".to_string(),
                protocol: "file".to_string(),
                path: card.join("DCIM"),
            }]
        );
    }
}
