//! History store - the capacity-bounded, newest-first list of entries.

use crate::models::ClipboardEntry;

/// In-memory clipboard history, newest entry first.
#[derive(Debug, Default, Clone)]
pub struct HistoryStore {
    entries: Vec<ClipboardEntry>,
}

impl HistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from entries already in newest-first order.
    ///
    /// No trimming happens here; capacity is enforced on the next insertion.
    pub fn from_entries(entries: Vec<ClipboardEntry>) -> Self {
        Self { entries }
    }

    /// Record new content, stamped with the current time.
    ///
    /// Empty content is ignored. Older entries beyond `max_entries` are dropped.
    pub fn add(&mut self, content: &str, max_entries: usize) -> Option<ClipboardEntry> {
        if content.is_empty() {
            return None;
        }
        Some(self.insert(ClipboardEntry::now(content.to_string()), max_entries))
    }

    /// Prepend an already-built entry and trim the tail to capacity.
    pub fn insert(&mut self, entry: ClipboardEntry, max_entries: usize) -> ClipboardEntry {
        self.entries.insert(0, entry.clone());
        self.entries.truncate(max_entries.max(1));
        entry
    }

    /// Remove every entry with the given id. Returns how many were removed.
    pub fn delete(&mut self, id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before - self.entries.len()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries whose content or preview contains `query`, ignoring case.
    ///
    /// An empty query returns everything. Order is always recency order.
    pub fn search(&self, query: &str) -> Vec<&ClipboardEntry> {
        if query.is_empty() {
            return self.entries.iter().collect();
        }

        let needle = query.to_lowercase();
        self.entries
            .iter()
            .filter(|e| {
                e.content.to_lowercase().contains(&needle)
                    || e.preview.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Look up an entry by id.
    pub fn get(&self, id: &str) -> Option<&ClipboardEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// All entries, newest first.
    pub fn entries(&self) -> &[ClipboardEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
