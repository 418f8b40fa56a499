//! Human-readable formatting for durations and file sizes

/// Format a duration in seconds as `M:SS`
///
/// Zero, negative, and non-finite values render as `0:00`.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let mins = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{}:{:02}", mins, secs)
}

/// Format a byte count with 1024-based units, up to two decimals
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && exponent < UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }

    // Two decimals with trailing zeros dropped
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0.0, "0:00" ; "zero")]
    #[test_case(f64::NAN, "0:00" ; "nan")]
    #[test_case(5.9, "0:05" ; "fraction truncated")]
    #[test_case(65.0, "1:05" ; "over a minute")]
    #[test_case(600.0, "10:00" ; "ten minutes")]
    #[test_case(3725.4, "62:05" ; "over an hour")]
    fn test_format_duration(seconds: f64, expected: &str) {
        assert_eq!(format_duration(seconds), expected);
    }

    #[test_case(0, "0 Bytes" ; "zero")]
    #[test_case(512, "512 Bytes" ; "bytes")]
    #[test_case(1024, "1 KB" ; "one kb")]
    #[test_case(1536, "1.5 KB" ; "fractional kb")]
    #[test_case(5 * 1024 * 1024, "5 MB" ; "megabytes")]
    #[test_case(1024 * 1024 * 1024, "1 GB" ; "gigabyte")]
    #[test_case(3 * 1024 * 1024 * 1024 * 1024, "3072 GB" ; "capped at gb")]
    fn test_format_file_size(bytes: u64, expected: &str) {
        assert_eq!(format_file_size(bytes), expected);
    }
}
