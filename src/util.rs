//! Utility functions and helpers.

use tokio::sync::mpsc;

/// Push an event to a screen's channel, logging instead of failing when the
/// screen has already gone away.
///
/// Replaces the repetitive pattern:
/// ```ignore
/// if let Err(e) = tx.send(value) {
///     tracing::debug!("Dropped event: {}", e);
/// }
/// ```
pub fn emit_or_log<T: std::fmt::Debug>(tx: &mpsc::UnboundedSender<T>, value: T, context: &str) {
    if let Err(e) = tx.send(value) {
        tracing::debug!("{}: no listener for {:?}", context, e.0);
    }
}

/// Trimmed content, or `None` when nothing but whitespace is left.
pub fn non_blank(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_or_log_success() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        emit_or_log(&tx, 42, "test value");
        assert_eq!(rx.try_recv().unwrap(), 42);
    }

    #[test]
    fn test_emit_or_log_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel::<i32>();
        drop(rx);
        // Should not panic, just log
        emit_or_log(&tx, 42, "test value");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank("  buy milk "), Some("buy milk"));
        assert_eq!(non_blank(" \t\n"), None);
        assert_eq!(non_blank(""), None);
    }
}
