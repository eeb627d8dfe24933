//! Utilities module for logging and error handling
//!
//! This module provides:
//! - Structured logging with tracing
//! - The pipeline error type
//! - Small formatting helpers for CLI output

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{DefectError, Result};
pub use logging::init_logging;

/// Format a duration given in milliseconds in a human-readable way
pub fn format_millis(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.0}µs", ms * 1000.0)
    } else if ms < 1000.0 {
        format!("{:.2}ms", ms)
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

/// Format a probability as a percentage with a bar
pub fn format_confidence_bar(confidence: f32, width: usize) -> String {
    let filled = (confidence.clamp(0.0, 1.0) * width as f32).round() as usize;
    let empty = width.saturating_sub(filled);

    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(empty),
        confidence * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0.5), "500µs");
        assert_eq!(format_millis(12.5), "12.50ms");
        assert_eq!(format_millis(2500.0), "2.50s");
    }

    #[test]
    fn test_format_confidence_bar() {
        let bar = format_confidence_bar(0.5, 10);
        assert!(bar.contains("50.0%"));
        assert!(bar.contains("█████░░░░░"));
    }
}
