//! Decoding of `gio` attribute output into [`FileInfo`]
//!
//! Two textual shapes are understood:
//!
//! - `gio info -a <attrs> <uri>` prints one `key: value` pair per line.
//! - `gio list -a <attrs> <uri>` prints one row per child:
//!   `name<TAB>size<TAB>(type)<TAB>key=value key=value ...`
//!
//! Both feed the same [`FileInfo::set_attribute`] mapping.

use std::time::{Duration, SystemTime};

use once_cell::sync::Lazy;
use regex::Regex;

/// Read permission bit
pub const MODE_READ: u32 = 0o4;
/// Write permission bit
pub const MODE_WRITE: u32 = 0o2;
/// Execute permission bit
pub const MODE_EXECUTE: u32 = 0o1;

/// Attributes requested from `gio info` and `gio list`
pub const QUERY_ATTRIBUTES: &str = "standard::size,standard::type,time::modified,access::can-read,access::can-write,access::can-execute";

/// One row of `gio list` output
static LIST_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([^\t\n]+)\t(\d+)\t\((\w+)\)(?:\t(.*))?$").unwrap());

/// How a size value is turned into a number.
///
/// `gio info` sizes go through prefix autodetection (`0x`, `0o`, `0b`, leading
/// `0`), `gio list` sizes are read as plain decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeRadix {
    AutoDetect,
    Decimal,
}

/// Metadata for a file or directory on the media
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: i64,
    /// Permission bits made of `MODE_READ`, `MODE_WRITE`, `MODE_EXECUTE`
    pub mode: u32,
    pub mtime: Option<SystemTime>,
    pub is_dir: bool,
}

impl FileInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn can_read(&self) -> bool {
        self.mode & MODE_READ != 0
    }

    pub fn can_write(&self) -> bool {
        self.mode & MODE_WRITE != 0
    }

    pub fn can_execute(&self) -> bool {
        self.mode & MODE_EXECUTE != 0
    }

    /// Apply one attribute reported by `gio`.
    ///
    /// Unknown keys and unparsable numbers leave the info untouched. Absent
    /// permission attributes never set a bit.
    pub fn set_attribute(&mut self, key: &str, value: &str, radix: SizeRadix) {
        match key {
            "standard::display-name" => self.name = value.to_string(),
            "time::modified" => {
                if let Some(secs) = parse_int_auto(value) {
                    self.mtime = epoch_plus(secs);
                }
            }
            "access::can-read" => self.set_mode_bit(MODE_READ, value),
            "access::can-write" => self.set_mode_bit(MODE_WRITE, value),
            "access::can-execute" => self.set_mode_bit(MODE_EXECUTE, value),
            "standard::size" => {
                let size = match radix {
                    SizeRadix::AutoDetect => parse_int_auto(value),
                    SizeRadix::Decimal => value.parse::<i64>().ok(),
                };
                if let Some(size) = size.filter(|s| *s >= 0) {
                    self.size = size;
                }
            }
            "standard::type" => self.is_dir = value == "2",
            "type" => self.is_dir = value == "directory",
            _ => {}
        }
    }

    fn set_mode_bit(&mut self, bit: u32, value: &str) {
        if value == "TRUE" {
            self.mode |= bit;
        }
    }
}

/// Parse `gio info` output. `name` is used unless a display name is reported.
pub fn parse_info(output: &str, name: &str) -> FileInfo {
    let mut info = FileInfo::named(name);
    for line in output.lines() {
        if let Some((key, value)) = line.split_once(": ") {
            info.set_attribute(key.trim(), value.trim(), SizeRadix::AutoDetect);
        }
    }
    info
}

/// Parse `gio list` output, skipping rows that don't match the row grammar.
/// Entries are returned in tool order.
pub fn parse_list(output: &str) -> Vec<FileInfo> {
    LIST_ROW
        .captures_iter(output)
        .map(|caps| {
            let mut entry = FileInfo::named(&caps[1]);
            if let Ok(size) = caps[2].parse::<i64>() {
                entry.size = size;
            }
            entry.is_dir = &caps[3] == "directory";

            if let Some(attrs) = caps.get(4) {
                for pair in attrs.as_str().split_whitespace() {
                    if let Some((key, value)) = pair.split_once('=') {
                        entry.set_attribute(key, value, SizeRadix::Decimal);
                    }
                }
            }
            entry
        })
        .collect()
}

/// Integer parsing with prefix detection: `0x` hex, `0o` or leading `0`
/// octal, `0b` binary, otherwise decimal. An optional sign is accepted.
pub fn parse_int_auto(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    if body.is_empty() || body.starts_with(|c: char| c == '+' || c == '-') {
        return None;
    }
    let magnitude = i64::from_str_radix(body, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn epoch_plus(secs: i64) -> Option<SystemTime> {
    let offset = Duration::from_secs(secs.unsigned_abs());
    if secs >= 0 {
        SystemTime::UNIX_EPOCH.checked_add(offset)
    } else {
        SystemTime::UNIX_EPOCH.checked_sub(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_auto() {
        assert_eq!(parse_int_auto("1234"), Some(1234));
        assert_eq!(parse_int_auto("0x1F"), Some(31));
        assert_eq!(parse_int_auto("0o17"), Some(15));
        assert_eq!(parse_int_auto("017"), Some(15));
        assert_eq!(parse_int_auto("0b101"), Some(5));
        assert_eq!(parse_int_auto("-42"), Some(-42));
        assert_eq!(parse_int_auto("0"), Some(0));
        assert_eq!(parse_int_auto("08"), None);
        assert_eq!(parse_int_auto(""), None);
        assert_eq!(parse_int_auto("--1"), None);
        assert_eq!(parse_int_auto("abc"), None);
    }

    #[test]
    fn test_set_attribute_is_idempotent() {
        let pairs = [
            ("standard::display-name", "IMG_0001.JPG"),
            ("time::modified", "1700000000"),
            ("access::can-read", "TRUE"),
            ("access::can-write", "TRUE"),
            ("standard::size", "2048"),
            ("standard::type", "2"),
            ("type", "directory"),
        ];

        for (key, value) in pairs {
            let mut once = FileInfo::named("x");
            once.set_attribute(key, value, SizeRadix::AutoDetect);

            let mut twice = once.clone();
            twice.set_attribute(key, value, SizeRadix::AutoDetect);

            assert_eq!(once, twice, "attribute {} not idempotent", key);
        }
    }

    #[test]
    fn test_mode_bits_only_from_true_values() {
        let mut info = FileInfo::named("a");
        info.set_attribute("access::can-read", "TRUE", SizeRadix::Decimal);
        info.set_attribute("access::can-write", "FALSE", SizeRadix::Decimal);
        assert!(info.can_read());
        assert!(!info.can_write());
        assert!(!info.can_execute());
        assert_eq!(info.mode, MODE_READ);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let mut info = FileInfo::named("a");
        info.set_attribute("unix::inode", "1234", SizeRadix::AutoDetect);
        info.set_attribute("standard::size", "not-a-number", SizeRadix::AutoDetect);
        assert_eq!(info, FileInfo::named("a"));
    }

    #[test]
    fn test_size_radix() {
        let mut info = FileInfo::default();
        info.set_attribute("standard::size", "0x10", SizeRadix::AutoDetect);
        assert_eq!(info.size, 16);

        let mut info = FileInfo::default();
        info.set_attribute("standard::size", "0x10", SizeRadix::Decimal);
        assert_eq!(info.size, 0);

        let mut info = FileInfo::default();
        info.set_attribute("standard::size", "010", SizeRadix::Decimal);
        assert_eq!(info.size, 10);
    }

    #[test]
    fn test_parse_info() {
        let output = "\
display name: IMG_0001.JPG
name: IMG_0001.JPG
type: regular
size:  2048
uri: mtp://Pixel/Internal%20storage/DCIM/Camera/IMG_0001.JPG
attributes:
  standard::type: 1
  standard::size: 2048
  time::modified: 1700000000
  access::can-read: TRUE
  access::can-write: TRUE
  access::can-execute: FALSE
";
        let info = parse_info(output, "DCIM/Camera/IMG_0001.JPG");
        assert_eq!(info.name, "DCIM/Camera/IMG_0001.JPG");
        assert_eq!(info.size, 2048);
        assert!(!info.is_dir);
        assert_eq!(info.mode, MODE_READ | MODE_WRITE);
        assert_eq!(
            info.mtime,
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
        );
    }

    #[test]
    fn test_parse_info_directory() {
        let output = "type: directory\nattributes:\n  standard::type: 2\n";
        let info = parse_info(output, "DCIM");
        assert!(info.is_dir);
        assert_eq!(info.mode, 0);
    }

    #[test]
    fn test_parse_list_directory_row() {
        let output = "DCIM\t0\t(directory)\tstandard::type=2 access::can-read=TRUE\n";
        let entries = parse_list(output);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].mode, MODE_READ);
        assert!(!entries[0].can_write());
        assert!(!entries[0].can_execute());
    }

    #[test]
    fn test_parse_list_skips_bad_rows() {
        let output = "\
IMG_0002.JPG\t4096\t(regular)\tstandard::size=4096 time::modified=1700000100
garbage line without tabs
broken\tnot-a-size\t(regular)\t
IMG_0001.JPG\t2048\t(regular)
";
        let entries = parse_list(output);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["IMG_0002.JPG", "IMG_0001.JPG"]);
        assert_eq!(entries[0].size, 4096);
        assert!(entries[0].mtime.is_some());
        assert_eq!(entries[1].size, 2048);
    }
}
