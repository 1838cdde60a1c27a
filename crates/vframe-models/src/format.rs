//! Display formatting for notification text.

use std::time::Duration;

const UNIT: u64 = 1024;
const PREFIXES: &[u8] = b"KMGTPE";

/// Format a byte count with binary prefixes and one decimal place.
///
/// `1024 -> "1.0 KB"`, `1572864 -> "1.5 MB"`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!(
        "{:.1} {}B",
        bytes as f64 / div as f64,
        PREFIXES[exp] as char
    )
}

/// Format a duration as seconds, minutes+seconds, or hours+minutes.
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if seconds < 60 {
        return format!("{} seconds", seconds);
    }

    let minutes = seconds / 60;
    let seconds = seconds % 60;
    if minutes < 60 {
        return format!("{} minutes {} seconds", minutes, seconds);
    }

    let hours = minutes / 60;
    let minutes = minutes % 60;
    format!("{} hours {} minutes", hours, minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1_572_864), "1.5 MB");
        assert_eq!(format_bytes(1_073_741_824), "1.0 GB");
        assert_eq!(format_bytes(1u64 << 60), "1.0 EB");
        assert_eq!(format_bytes(u64::MAX), "16.0 EB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0 seconds");
        assert_eq!(format_duration(Duration::from_secs(59)), "59 seconds");
        assert_eq!(format_duration(Duration::from_secs(60)), "1 minutes 0 seconds");
        assert_eq!(format_duration(Duration::from_secs(150)), "2 minutes 30 seconds");
        assert_eq!(format_duration(Duration::from_secs(90 * 60)), "1 hours 30 minutes");
    }

    #[test]
    fn test_format_duration_truncates_subseconds() {
        assert_eq!(format_duration(Duration::from_millis(59_999)), "59 seconds");
    }
}
