//! Utility functions and helpers for dataformat
//!
//! This module provides common utility functions used throughout the crate:
//! - Time and duration utilities
//! - Byte size parsing and formatting
//! - File system helpers

use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Time utilities
pub mod time {
    use super::*;

    /// Format duration as human-readable string
    ///
    /// # Arguments
    /// * `duration` - Duration to format
    ///
    /// # Returns
    /// * `String` - Formatted duration (e.g., "1h 30m 45s")
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let millis = duration.subsec_millis();

        if secs == 0 {
            return format!("{}ms", millis);
        }

        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        let mut parts = Vec::new();

        if hours > 0 {
            parts.push(format!("{}h", hours));
        }
        if minutes > 0 {
            parts.push(format!("{}m", minutes));
        }
        if seconds > 0 || parts.is_empty() {
            parts.push(format!("{}s", seconds));
        }

        parts.join(" ")
    }

    /// Parse a keep-alive duration string (e.g., "500ms", "30s", "5m", "1h", "1d")
    ///
    /// A bare number is read as milliseconds, the way search engines read
    /// time values.
    ///
    /// # Arguments
    /// * `s` - Duration string
    ///
    /// # Returns
    /// * `Option<Duration>` - Parsed duration or None
    pub fn parse_duration(s: &str) -> Option<Duration> {
        let s = s.trim().to_ascii_lowercase();
        if s.is_empty() {
            return None;
        }

        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (num_str, unit) = s.split_at(split);
        let num: u64 = num_str.parse().ok()?;

        match unit.trim() {
            "" | "ms" => Some(Duration::from_millis(num)),
            "s" => Some(Duration::from_secs(num)),
            "m" => num.checked_mul(60).map(Duration::from_secs),
            "h" => num.checked_mul(3600).map(Duration::from_secs),
            "d" => num.checked_mul(86_400).map(Duration::from_secs),
            _ => None,
        }
    }
}

/// Conversion utilities
pub mod convert {
    /// Format bytes as human-readable size
    ///
    /// # Arguments
    /// * `bytes` - Number of bytes
    ///
    /// # Returns
    /// * `String` - Formatted size (e.g., "1.5 MB")
    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Parse human-readable size to bytes
    ///
    /// # Arguments
    /// * `s` - Size string (e.g., "10MB")
    ///
    /// # Returns
    /// * `Option<u64>` - Size in bytes or None
    pub fn parse_bytes(s: &str) -> Option<u64> {
        let s = s.trim().to_uppercase();
        let (num_str, unit) = if s.ends_with("TB") {
            (s.trim_end_matches("TB"), 1024u64.pow(4))
        } else if s.ends_with("GB") {
            (s.trim_end_matches("GB"), 1024u64.pow(3))
        } else if s.ends_with("MB") {
            (s.trim_end_matches("MB"), 1024u64.pow(2))
        } else if s.ends_with("KB") {
            (s.trim_end_matches("KB"), 1024u64)
        } else if s.ends_with('B') {
            (s.trim_end_matches('B'), 1)
        } else {
            return s.parse().ok();
        };

        num_str
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| *n >= 0.0)
            .map(|n| (n * unit as f64) as u64)
    }
}

/// File system utilities
pub mod fs {
    use super::*;

    /// Check that the parent directory of `path` exists
    ///
    /// # Arguments
    /// * `path` - Output file path
    ///
    /// # Returns
    /// * `Result<()>` - Ok when the file can be created in its directory
    pub fn validate_parent<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();

        if path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidPath("empty path".to_string()).into());
        }
        if path.is_dir() {
            return Err(ConfigError::InvalidPath(format!(
                "{} is a directory",
                path.display()
            ))
            .into());
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(ConfigError::InvalidPath(format!(
                    "Directory does not exist: {}",
                    parent.display()
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(time::format_duration(Duration::from_secs(0)), "0ms");
        assert_eq!(time::format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(time::format_duration(Duration::from_secs(3661)), "1h 1m 1s");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(time::parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(time::parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(time::parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(time::parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(time::parse_duration("60000"), Some(Duration::from_secs(60)));
        assert_eq!(time::parse_duration("invalid"), None);
        assert_eq!(time::parse_duration("5w"), None);
        assert_eq!(time::parse_duration("307445734561825861m"), None);
        assert_eq!(time::parse_duration("213503982334601d"), None);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(convert::format_bytes(500), "500 B");
        assert_eq!(convert::format_bytes(1024), "1.00 KB");
        assert_eq!(convert::format_bytes(1024 * 1024), "1.00 MB");
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(convert::parse_bytes("1024"), Some(1024));
        assert_eq!(convert::parse_bytes("0"), Some(0));
        assert_eq!(convert::parse_bytes("1KB"), Some(1024));
        assert_eq!(convert::parse_bytes("1MB"), Some(1024 * 1024));
        assert_eq!(
            convert::parse_bytes("1.5GB"),
            Some((1.5 * 1024.0 * 1024.0 * 1024.0) as u64)
        );
        assert_eq!(convert::parse_bytes("lots"), None);
    }

    #[test]
    fn test_validate_parent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(fs::validate_parent(dir.path().join("out.csv")).is_ok());
        assert!(fs::validate_parent(dir.path().join("missing").join("out.csv")).is_err());
        assert!(fs::validate_parent(dir.path()).is_err());
    }
}
