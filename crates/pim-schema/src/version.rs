//! Version comparison for package versions and host OS versions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;

/// Compare two dotted version strings segment by segment.
///
/// Numeric segments compare numerically, anything else compares as text;
/// missing trailing segments count as zero, so `1.2` equals `1.2.0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a_parts: Vec<&str> = a.split(['.', '-', '+']).collect();
    let b_parts: Vec<&str> = b.split(['.', '-', '+']).collect();

    for i in 0..std::cmp::max(a_parts.len(), b_parts.len()) {
        let av = a_parts.get(i).copied().unwrap_or("0");
        let bv = b_parts.get(i).copied().unwrap_or("0");
        let ord = match (av.parse::<u64>(), bv.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => av.cmp(bv),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// A four-part operating system version (`major.minor.build.revision`).
///
/// Parsing is lenient: each segment contributes its leading digits, so a
/// kernel release such as `6.8.0-45-generic` reads as `6.8.0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OsVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Build number.
    pub build: u32,
    /// Revision.
    pub revision: u32,
}

impl OsVersion {
    /// Construct a version from its four parts.
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl std::str::FromStr for OsVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0u32; 4];
        let mut seen = 0;
        for (slot, segment) in parts.iter_mut().zip(s.trim().split('.')) {
            let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                break;
            }
            *slot = digits
                .parse()
                .map_err(|_| format!("Invalid OS version segment '{segment}' in '{s}'"))?;
            seen += 1;
            if digits.len() != segment.len() {
                break;
            }
        }
        if seen == 0 {
            return Err(format!("Invalid OS version: '{s}'"));
        }
        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

impl std::fmt::Display for OsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl Serialize for OsVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OsVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
