//! Human-readable byte sizes.

use std::sync::OnceLock;

use regex::Regex;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Format a size in bytes as a human-readable string.
pub fn format_size(bytes: u64) -> String {
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(b|k|kb|kib|m|mb|mib|g|gb|gib)?\s*$").unwrap()
    })
}

/// Parse sizes such as `512`, `64KB`, `256 MB` or `1.5GiB` (binary units).
pub fn parse_size(text: &str) -> Option<u64> {
    let caps = size_pattern().captures(text)?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();
    let multiplier = match unit.chars().next() {
        None | Some('b') => 1,
        Some('k') => KB,
        Some('m') => MB,
        Some('g') => GB,
        Some(_) => return None,
    };
    let bytes = number * multiplier as f64;
    (bytes.is_finite() && bytes <= u64::MAX as f64).then_some(bytes.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(256 * MB), "256.00 MB");
        assert_eq!(format_size(3 * GB / 2), "1.50 GB");
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("1048576"), Some(MB));
        assert_eq!(parse_size("64KB"), Some(64 * KB));
        assert_eq!(parse_size("256 MB"), Some(256 * MB));
        assert_eq!(parse_size("1.5GiB"), Some(3 * GB / 2));
        assert_eq!(parse_size("2m"), Some(2 * MB));
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("lots"), None);
        assert_eq!(parse_size("12 TB"), None);
        assert_eq!(parse_size("-5MB"), None);
    }
}
