use std::sync::Arc;

/// Transfer progress callback: `(bytes transferred, total bytes)`.
///
/// `total` is 0 when the server does not announce a length.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Formats a byte count into a human-readable string.
///
/// # Examples
/// ```
/// use memo::sync::progress::format_bytes;
/// assert_eq!(format_bytes(0), "0 B");
/// assert_eq!(format_bytes(1536), "1.5 KB");
/// assert_eq!(format_bytes(1048576), "1.0 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// One-line progress summary such as `512.0 KB / 1.0 MB (50%)`.
pub fn describe_progress(done: u64, total: u64) -> String {
    if total == 0 {
        return format_bytes(done);
    }
    let percent = (done.min(total) * 100) / total;
    format!("{} / {} ({}%)", format_bytes(done), format_bytes(total), percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1572864), "1.5 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_describe_progress() {
        assert_eq!(describe_progress(512 * 1024, 1024 * 1024), "512.0 KB / 1.0 MB (50%)");
        assert_eq!(describe_progress(10, 10), "10 B / 10 B (100%)");
        assert_eq!(describe_progress(2048, 0), "2.0 KB");
    }
}
