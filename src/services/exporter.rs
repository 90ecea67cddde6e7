//! Export clipboard entries into a single markdown document.

use chrono::{DateTime, Local, SecondsFormat, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::models::ClipboardEntry;

/// Date format used for human-readable timestamps in exports.
const EXPORT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Failure writing an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to create export folder {path}: {source}")]
    CreateFolder {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write export file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Write up to `max_count` entries into a new document inside `folder`.
///
/// Entries are exported in the order given. Returns the path of the file
/// that was created.
pub fn export_entries(
    entries: &[&ClipboardEntry],
    folder: &Path,
    max_count: usize,
    now: DateTime<Utc>,
) -> Result<PathBuf, ExportError> {
    let limited = &entries[..entries.len().min(max_count)];

    fs::create_dir_all(folder).map_err(|source| ExportError::CreateFolder {
        path: folder.to_path_buf(),
        source,
    })?;

    let path = folder.join(export_file_name(now));
    let document = render_document(limited, now);

    let write = || -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(document.as_bytes())?;
        file.flush()
    };
    write().map_err(|source| ExportError::WriteFile {
        path: path.clone(),
        source,
    })?;

    tracing::info!(count = limited.len(), path = %path.display(), "exported clipboard entries");
    Ok(path)
}

/// File name for an export started at `now`, e.g. `2024-05-01T10-20-30-123Z.md`.
pub fn export_file_name(now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}.md", stamp)
}

/// Render the export document.
pub fn render_document(entries: &[&ClipboardEntry], now: DateTime<Utc>) -> String {
    let mut doc = String::new();
    let exported_at = now.with_timezone(&Local).format(EXPORT_DATE_FORMAT);
    doc.push_str(&format!("# Clipboard Export ({})\n\n", exported_at));

    for (index, entry) in entries.iter().enumerate() {
        let captured = entry.captured_at().format(EXPORT_DATE_FORMAT);
        doc.push_str(&format!("## Entry {} - {}\n\n", index + 1, captured));

        if looks_like_markdown(&entry.content) {
            // Fenced copy keeps the exact text, the raw copy renders
            doc.push_str(&format!("```markdown\n{}\n```\n\n", entry.content));
            doc.push_str(&format!("{}\n\n", entry.content));
        } else {
            doc.push_str(&format!("```\n{}\n```\n\n", entry.content));
        }
    }

    doc
}

/// Heuristic for content that carries markdown formatting.
pub fn looks_like_markdown(content: &str) -> bool {
    content.contains('#')
        || content.contains("```")
        || content.contains('*')
        || content.contains("- [")
}
