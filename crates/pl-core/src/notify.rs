//! User-facing notification model.

use serde::{Deserialize, Serialize};

pub const DEFAULT_DURATION_MS: i64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A message destined for the notification sink.
///
/// Two messages are content-equal when title, body and severity match;
/// identity and timestamps do not matter for coalescing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: Option<String>,
    pub body: String,
    pub severity: Severity,
    /// Auto-dismiss duration; `None` means sticky.
    pub duration_ms: Option<i64>,
    pub created_at_ms: i64,
}

impl NotificationMessage {
    pub fn new(title: Option<String>, body: impl Into<String>, severity: Severity) -> Self {
        Self {
            title,
            body: body.into(),
            severity,
            duration_ms: Some(DEFAULT_DURATION_MS),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn error(body: impl Into<String>) -> Self {
        Self::new(None, body, Severity::Error)
    }

    pub fn success(body: impl Into<String>) -> Self {
        Self::new(None, body, Severity::Success)
    }

    /// Equality used by the coalescer: fingerprint, not identity.
    pub fn equal_content(&self, other: &Self) -> bool {
        self.title == other.title && self.body == other.body && self.severity == other.severity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_content_ignores_timestamps() {
        let mut a = NotificationMessage::error("pull failed");
        let mut b = NotificationMessage::error("pull failed");
        a.created_at_ms = 1;
        b.created_at_ms = 2;
        b.duration_ms = None;
        assert!(a.equal_content(&b));
    }

    #[test]
    fn test_equal_content_distinguishes_severity() {
        let a = NotificationMessage::new(Some("sync".into()), "done", Severity::Success);
        let b = NotificationMessage::new(Some("sync".into()), "done", Severity::Info);
        assert!(!a.equal_content(&b));
    }
}
