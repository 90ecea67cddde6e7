//! Clipboard history entries.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of characters kept in a preview before the ellipsis.
pub const PREVIEW_MAX_CHARS: usize = 100;

/// A single captured clipboard snapshot.
///
/// Entries are immutable once created; the preview is derived from the
/// content at creation time and stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardEntry {
    /// Creation-time derived identifier (epoch milliseconds as text)
    pub id: String,
    /// Full captured text
    pub content: String,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    /// Truncated, single-line summary of the content
    pub preview: String,
}

impl ClipboardEntry {
    /// Create an entry captured at `timestamp` (epoch milliseconds).
    pub fn new(content: String, timestamp: i64) -> Self {
        let preview = create_preview(&content, PREVIEW_MAX_CHARS);
        Self {
            id: timestamp.to_string(),
            content,
            timestamp,
            preview,
        }
    }

    /// Create an entry stamped with the current time.
    pub fn now(content: String) -> Self {
        Self::new(content, Utc::now().timestamp_millis())
    }

    /// Capture time in the local timezone.
    pub fn captured_at(&self) -> DateTime<Local> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp)
            .unwrap_or_default()
            .with_timezone(&Local)
    }
}

/// Build a preview: trimmed, newlines collapsed to spaces, truncated to
/// `max_chars` characters with `...` appended when anything was cut.
pub fn create_preview(content: &str, max_chars: usize) -> String {
    // A CRLF pair is one line break; a lone CR still must not split the line
    let flattened: String = content
        .trim()
        .replace("\r\n", "\n")
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();

    match flattened.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flattened[..cut]),
        None => flattened,
    }
}
