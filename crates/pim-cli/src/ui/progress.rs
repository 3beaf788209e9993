//! Download progress formatting.

use super::theme::format_size;

const BAR_WIDTH: usize = 24;

/// Bar, percentage and total size; just the byte count when the total is
/// unknown.
pub fn format_download_progress(current: u64, total: Option<u64>) -> String {
    match total.filter(|&t| t > 0) {
        Some(total) => {
            let pct = (current.saturating_mul(100) / total).min(100);
            let bar = format_progress_bar(current, total, BAR_WIDTH);
            format!("{bar}  {pct:>3}%  {}", format_size(total))
        }
        None => format!("{}  {}", "░".repeat(BAR_WIDTH), format_size(current)),
    }
}

/// A fixed-width bar using ▓ (filled) and ░ (empty).
pub fn format_progress_bar(current: u64, total: u64, width: usize) -> String {
    let filled = if total > 0 {
        (((current as f64 / total as f64) * width as f64).round() as usize).min(width)
    } else {
        0
    };
    let empty = width - filled;
    format!("{}{}", "▓".repeat(filled), "░".repeat(empty))
}
