//! Human-readable size and duration formatting
//!
//! Used by the library listing and the statistics summary so every
//! surface displays the same strings.

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
const SIZE_STEP: u64 = 1024;

/// Format a byte count with binary (1024) steps and at most two decimals.
///
/// Trailing zeros are dropped; sizes beyond the gigabyte range stay in GB.
///
/// # Examples
///
/// ```
/// use mvault_common::format::format_file_size;
///
/// assert_eq!(format_file_size(0), "0 B");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// assert_eq!(format_file_size(3 * 1024 * 1024), "3 MB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut unit = 0;
    let mut divisor = 1u64;
    while unit + 1 < SIZE_UNITS.len() && bytes >= divisor * SIZE_STEP {
        divisor *= SIZE_STEP;
        unit += 1;
    }

    let scaled = (bytes as f64 / divisor as f64 * 100.0).round() / 100.0;
    format!("{} {}", trim_decimals(scaled), SIZE_UNITS[unit])
}

/// Format whole seconds as `M:SS`; minutes are not wrapped into hours.
///
/// # Examples
///
/// ```
/// use mvault_common::format::format_duration;
///
/// assert_eq!(format_duration(125), "2:05");
/// assert_eq!(format_duration(59), "0:59");
/// ```
pub fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn trim_decimals(value: f64) -> String {
    let text = format!("{:.2}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_size_units() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(1), "1 B");
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(3_145_728), "3 MB");
        assert_eq!(format_file_size(1024 * 1024 * 1024), "1 GB");
    }

    #[test]
    fn test_file_size_rounds_to_two_decimals() {
        // 1234567 / 1048576 = 1.17737...
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
        // 1100 / 1024 = 1.07421...
        assert_eq!(format_file_size(1100), "1.07 KB");
    }

    #[test]
    fn test_file_size_caps_at_gigabytes() {
        assert_eq!(format_file_size(2 * 1024 * 1024 * 1024 * 1024), "2048 GB");
    }

    #[test]
    fn test_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(60), "1:00");
        assert_eq!(format_duration(125), "2:05");
        assert_eq!(format_duration(3725), "62:05");
    }
}
