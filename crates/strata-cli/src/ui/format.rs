//! Formatting utilities for sizes, durations, and build summaries.

use console::Term;
use owo_colors::OwoColorize;
use std::time::Duration;

use super::{colors_enabled, is_quiet};

/// Format file size in human-readable format.
///
/// ```
/// use strata_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1024), "1.00 KB");
/// assert_eq!(format_size(1_048_576), "1.00 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format duration in human-readable format.
///
/// ```
/// use std::time::Duration;
/// use strata_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Print a table of `(bundle, bytes written, build time)` rows plus a total.
pub fn print_build_summary(entries: &[(String, u64, Duration)]) {
    if is_quiet() || entries.is_empty() {
        return;
    }

    let width = (Term::stderr().size().1 as usize).clamp(40, 80);
    let name_width = width.saturating_sub(24);

    if colors_enabled() {
        eprintln!("\n{}", "Build Summary".bold().underline());
    } else {
        eprintln!("\nBuild Summary");
    }
    eprintln!("{}", "─".repeat(width));

    for (name, size, duration) in entries {
        let name = truncate(name, name_width);
        eprintln!(
            "{:<name_width$} {:>10} {:>10}",
            name,
            format_size(*size),
            format_duration(*duration),
        );
    }

    let total_size: u64 = entries.iter().map(|(_, size, _)| size).sum();
    let longest = entries
        .iter()
        .map(|(_, _, d)| *d)
        .max()
        .unwrap_or_default();

    eprintln!("{}", "─".repeat(width));
    let total = format!(
        "{:<name_width$} {:>10} {:>10}",
        format!("{} bundles", entries.len()),
        format_size(total_size),
        format_duration(longest),
    );
    if colors_enabled() {
        eprintln!("{}", total.bold());
    } else {
        eprintln!("{total}");
    }
}

fn truncate(name: &str, max: usize) -> String {
    if name.chars().count() <= max || max < 2 {
        return name.to_string();
    }
    let tail: String = name
        .chars()
        .rev()
        .take(max - 1)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1_073_741_824), "1.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
        assert_eq!(format_duration(Duration::from_secs(2)), "2.00s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_truncate_keeps_tail() {
        assert_eq!(truncate("packages/ui", 20), "packages/ui");
        assert_eq!(truncate("packages/ui/src/index.ts", 9), "…index.ts");
    }

    #[test]
    fn test_print_build_summary() {
        print_build_summary(&[
            ("@acme/ui (module)".to_string(), 15_234, Duration::from_millis(45)),
            ("@acme/ui (style)".to_string(), 2_048, Duration::from_millis(12)),
        ]);
    }
}
