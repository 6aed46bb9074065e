//! Human-readable formatting for queue listings

const BYTE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// `1536` → `"1.5 KB"` (1024-based, trailing zeros trimmed)
pub fn format_bytes(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    let mut scale = 1u64;
    while exponent < BYTE_UNITS.len() - 1 && bytes / scale >= 1024 {
        scale *= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / scale as f64;

    let mut text = format!("{:.*}", decimals, value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }

    format!("{} {}", text, BYTE_UNITS[exponent])
}

/// `125.7` → `"2:05"`
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let whole = seconds.floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// `44100` → `"44.1 kHz"`
pub fn format_sample_rate(hz: u32) -> String {
    format!("{:.1} kHz", hz as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0, 2), "0 Bytes");
        assert_eq!(format_bytes(1000, 2), "1000 Bytes");
        assert_eq!(format_bytes(1024, 2), "1 KB");
        assert_eq!(format_bytes(1536, 2), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024, 2), "1 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 + 123_456, 2), "5.12 MB");
        assert_eq!(format_bytes(3 * 1024u64.pow(3), 0), "3 GB");
    }

    #[test]
    fn test_format_bytes_caps_at_tb() {
        assert_eq!(format_bytes(2048 * 1024u64.pow(4), 1), "2048 TB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(9.99), "0:09");
        assert_eq!(format_duration(125.7), "2:05");
        assert_eq!(format_duration(3600.0), "60:00");
        assert_eq!(format_duration(f64::NAN), "0:00");
    }

    #[test]
    fn test_format_sample_rate() {
        assert_eq!(format_sample_rate(44100), "44.1 kHz");
        assert_eq!(format_sample_rate(48000), "48.0 kHz");
    }
}
