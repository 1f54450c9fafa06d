//! Human-readable byte sizes.

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Parse a size string like "10MB", "512KB", "1GB" or a plain byte count.
///
/// Units are binary (1KB = 1024 bytes) and case-insensitive; `KiB` style
/// suffixes are accepted too.
pub fn parse_size(size: &str) -> Result<u64> {
    let normalized = size.trim().to_ascii_uppercase();
    let normalized = normalized.replace("IB", "B");

    let (digits, unit) = if let Some(n) = normalized.strip_suffix("GB") {
        (n, GB)
    } else if let Some(n) = normalized.strip_suffix("MB") {
        (n, MB)
    } else if let Some(n) = normalized.strip_suffix("KB") {
        (n, KB)
    } else if let Some(n) = normalized.strip_suffix('B') {
        (n, 1)
    } else {
        (normalized.as_str(), 1)
    };

    let invalid = || Error::ConfigValidationError {
        message: format!("Invalid size '{}'", size.trim()),
    };
    let count: u64 = digits.trim().parse().map_err(|_| invalid())?;
    count.checked_mul(unit).ok_or_else(invalid)
}

/// Format a byte count for display, using the largest fitting unit.
pub fn format_size(bytes: u64) -> String {
    let (unit, suffix) = if bytes >= GB {
        (GB, "GB")
    } else if bytes >= MB {
        (MB, "MB")
    } else if bytes >= KB {
        (KB, "KB")
    } else {
        return format!("{}B", bytes);
    };

    if bytes % unit == 0 {
        format!("{}{}", bytes / unit, suffix)
    } else {
        format!("{:.1}{}", bytes as f64 / unit as f64, suffix)
    }
}

/// Deserialize a size given either as a byte count or as a size string.
pub(crate) fn deserialize<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Bytes(u64),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Bytes(bytes) => Ok(bytes),
        Size::Text(text) => parse_size(&text).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_units() {
        assert_eq!(parse_size("512KB").unwrap(), 512 * 1024);
        assert_eq!(parse_size("10MB").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_size("1GB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("100B").unwrap(), 100);
    }

    #[test]
    fn parse_size_plain_bytes() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
    }

    #[test]
    fn parse_size_is_case_insensitive() {
        assert_eq!(parse_size("5mb").unwrap(), 5 * MB);
        assert_eq!(parse_size(" 2 Kb ").unwrap(), 2 * KB);
    }

    #[test]
    fn parse_size_binary_suffixes() {
        assert_eq!(parse_size("4MiB").unwrap(), 4 * MB);
        assert_eq!(parse_size("1KiB").unwrap(), KB);
    }

    #[test]
    fn parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("ten MB").is_err());
        assert!(parse_size("-1MB").is_err());
        assert!(parse_size("1.5MB").is_err());
    }

    #[test]
    fn parse_size_rejects_overflow() {
        assert!(parse_size("99999999999999GB").is_err());
    }

    #[test]
    fn format_size_exact_units() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(1024), "1KB");
        assert_eq!(format_size(10 * MB), "10MB");
        assert_eq!(format_size(2 * GB), "2GB");
    }

    #[test]
    fn format_size_fractions() {
        assert_eq!(format_size(1536), "1.5KB");
        assert_eq!(format_size(MB + MB / 2), "1.5MB");
    }

    #[test]
    fn format_then_parse_exact_size() {
        assert_eq!(parse_size(&format_size(5 * MB)).unwrap(), 5 * MB);
    }
}
