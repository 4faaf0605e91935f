//! Progress formatting and reporting.
//!
//! Pure formatting helpers ([`format_bytes`], [`percentage`],
//! [`status_line`]) plus the [`ProgressFn`] callback type the scheduler
//! forwards raw `(bytes_done, bytes_expected)` pairs through, tagged with
//! the item's filename. Progress is best-effort status output and is never
//! used for control flow.

/// Callback for per-item progress updates: `(filename, bytes_done, bytes_expected)`.
pub type ProgressFn = Box<dyn Fn(&str, u64, Option<u64>) + Send + Sync>;

/// Decimal places used when none are specified.
pub const DEFAULT_PRECISION: usize = 2;

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Format a byte count in the largest 1024-based unit where the scaled
/// value is at least 1, with [`DEFAULT_PRECISION`] decimals.
///
/// Trailing zeros are trimmed: `25907` formats as `"25.3KB"`, not
/// `"25.30KB"`.
pub fn format_bytes(bytes: u64) -> String {
    format_bytes_with(bytes, DEFAULT_PRECISION)
}

/// [`format_bytes`] with an explicit number of decimal places.
pub fn format_bytes_with(bytes: u64, precision: usize) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while unit + 1 < UNITS.len() && value >= 1024.0 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        return format!("{bytes}B");
    }

    let formatted = format!("{value:.precision$}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}{}", UNITS[unit])
}

/// Format `done / expected` as a percentage with two decimals.
///
/// Returns `None` when `expected` is zero: an unknown total suppresses
/// percentage reporting instead of dividing by zero.
pub fn percentage(done: u64, expected: u64) -> Option<String> {
    if expected == 0 {
        return None;
    }
    Some(format!("{:.2}%", done as f64 / expected as f64 * 100.0))
}

/// One line of human progress for an in-flight item.
///
/// The percentage is omitted when the expected size is zero or unknown.
pub fn status_line(name: &str, done: u64, expected: Option<u64>) -> String {
    match expected.and_then(|total| percentage(done, total).map(|pct| (total, pct))) {
        Some((total, pct)) => format!(
            "{name}: {} / {} ({pct})",
            format_bytes(done),
            format_bytes(total)
        ),
        None => format!("{name}: {}", format_bytes(done)),
    }
}

/// Create a per-environment progress bar over `total` items.
#[cfg(feature = "progress")]
#[cfg_attr(docsrs, doc(cfg(feature = "progress")))]
#[must_use]
pub fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} backups ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}
