//! Application state and the watch loop.

use chrono::Utc;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::models::{ClipboardEntry, Settings};
use crate::services::clipboard::{ClipboardSource, EditorTarget};
use crate::services::exporter;
use crate::services::monitor::{ChangeMonitor, MonitorState, Tick};
use crate::services::notice::NoticeSink;
use crate::services::notifier::{HistoryObserver, UpdateNotifier};
use crate::services::state_file::{self, Persister, StateDriver};
use crate::services::HistoryStore;

/// Root of the application: owns settings, history and every service
/// that reads or mutates them.
pub struct AppState {
    config: Arc<Config>,
    settings: Settings,
    history: HistoryStore,
    notifier: UpdateNotifier,
    monitor: ChangeMonitor,
    clipboard: Box<dyn ClipboardSource>,
    notices: Box<dyn NoticeSink>,
    persister: Persister,
}

impl AppState {
    /// Hydrate state from storage. Must be called from within a Tokio runtime.
    pub async fn load(
        config: Arc<Config>,
        driver: Arc<dyn StateDriver>,
        clipboard: Box<dyn ClipboardSource>,
        notices: Box<dyn NoticeSink>,
    ) -> Self {
        let loaded = state_file::load_state(driver.as_ref()).await;
        tracing::debug!(entries = loaded.history.len(), "history loaded");

        let persister = if loaded.writable {
            Persister::spawn(driver)
        } else {
            Persister::disabled()
        };

        Self {
            config,
            settings: loaded.settings,
            history: HistoryStore::from_entries(loaded.history),
            notifier: UpdateNotifier::new(),
            monitor: ChangeMonitor::new(),
            clipboard,
            notices,
            persister,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn monitor_state(&self) -> MonitorState {
        self.monitor.state()
    }

    /// Search the history (empty query returns everything).
    pub fn search(&self, query: &str) -> Vec<&ClipboardEntry> {
        self.history.search(query)
    }

    pub fn register_observer(&mut self, observer: Arc<dyn HistoryObserver>) {
        self.notifier.register(observer);
    }

    pub fn unregister_observer(&mut self, observer: &Arc<dyn HistoryObserver>) {
        self.notifier.unregister(observer);
    }

    /// Record new clipboard content.
    pub fn capture(&mut self, content: &str) -> Option<ClipboardEntry> {
        let entry = self.history.add(content, self.settings.max_entries)?;
        tracing::info!(id = %entry.id, preview = %entry.preview, "captured clipboard entry");
        self.history_changed();
        Some(entry)
    }

    /// Delete every entry with `id`; unknown ids are not an error.
    pub fn delete_entry(&mut self, id: &str) -> usize {
        let removed = self.history.delete(id);
        self.history_changed();
        removed
    }

    /// Remove all history.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.history_changed();
        self.notices.notice("Clipboard history cleared!");
    }

    /// Put an entry's content back on the clipboard.
    ///
    /// The monitor's last observed value is left alone, so the next poll
    /// can capture the copied text again.
    pub fn copy_entry(&mut self, id: &str) -> bool {
        let Some(content) = self.history.get(id).map(|e| e.content.clone()) else {
            self.notices.notice(&format!("No clipboard entry with id {}", id));
            return false;
        };

        match self.clipboard.write_text(&content) {
            Ok(()) => {
                self.notices.notice("Copied to clipboard!");
                true
            }
            Err(e) => {
                tracing::error!("Error copying to clipboard: {}", e);
                self.notices.notice("Failed to copy to clipboard");
                false
            }
        }
    }

    /// Paste the `index`th (1-based) search result into `target`.
    pub fn paste(&self, query: &str, index: usize, target: &mut dyn EditorTarget) -> bool {
        if !target.is_active() {
            return false;
        }
        let matches = self.history.search(query);
        let Some(entry) = matches.into_iter().nth(index.saturating_sub(1)) else {
            return false;
        };

        match target.insert_at_cursor(&entry.content) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Error pasting entry {}: {}", entry.id, e);
                false
            }
        }
    }

    /// Export matching entries, newest first.
    ///
    /// `folder` and `count` fall back to the export settings.
    pub fn export(
        &mut self,
        query: &str,
        folder: Option<&str>,
        count: Option<usize>,
    ) -> Option<PathBuf> {
        let folder = self
            .config
            .resolve_export_folder(folder.unwrap_or(&self.settings.export_folder_path));
        let count = count
            .filter(|n| *n > 0)
            .unwrap_or(self.settings.export_default_count);

        let entries = self.history.search(query);
        if entries.is_empty() {
            self.notices.notice("No entries to export");
            return None;
        }

        match exporter::export_entries(&entries, &folder, count, Utc::now()) {
            Ok(path) => {
                let exported = entries.len().min(count);
                self.notices.notice(&format!(
                    "Exported {} clipboard entries to {}",
                    exported,
                    path.display()
                ));
                Some(path)
            }
            Err(e) => {
                tracing::error!("Error exporting clipboard entries: {}", e);
                self.notices.notice("Failed to export clipboard entries");
                None
            }
        }
    }

    /// Change one setting from raw user input. Invalid input is ignored.
    ///
    /// A new poll interval restarts a running monitor.
    pub fn update_setting(&mut self, key: &str, raw: &str) -> bool {
        let old_interval = self.settings.poll_interval_ms;
        if !self.settings.apply(key, raw) {
            return false;
        }

        self.persist();

        if self.settings.poll_interval_ms != old_interval
            && self.monitor.state() == MonitorState::Running
        {
            self.restart_monitor();
        }
        true
    }

    /// Seed from the current clipboard and start polling.
    pub fn start_monitor(&mut self) {
        let interval = self.poll_interval();
        self.monitor.start(self.clipboard.as_mut(), interval);
    }

    pub fn stop_monitor(&mut self) {
        self.monitor.stop();
    }

    fn restart_monitor(&mut self) {
        let interval = self.poll_interval();
        self.monitor.restart(self.clipboard.as_mut(), interval);
        tracing::info!(
            interval_ms = self.settings.poll_interval_ms,
            "clipboard monitor restarted"
        );
    }

    /// Wait for the next poll tick.
    pub async fn next_tick(&mut self) -> Tick {
        self.monitor.next_tick().await
    }

    /// Handle one poll tick: capture the clipboard if it changed.
    pub fn on_tick(&mut self, tick: Tick) {
        if !self.monitor.is_current(&tick) {
            return;
        }
        self.poll_once();
    }

    /// Check the clipboard once, capturing a change.
    pub fn poll_once(&mut self) -> Option<ClipboardEntry> {
        let content = self.monitor.poll(self.clipboard.as_mut())?;
        let entry = self.capture(&content)?;
        if self.settings.notify_on_capture {
            self.notices.notice("Clipboard content saved!");
        }
        Some(entry)
    }

    /// Poll until `shutdown` resolves, then stop the monitor.
    pub async fn watch<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.start_monitor();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                tick = self.next_tick() => self.on_tick(tick),
                _ = &mut shutdown => break,
            }
        }

        self.stop_monitor();
    }

    /// Stop polling and wait for pending writes.
    pub async fn shutdown(mut self) {
        self.monitor.stop();
        self.persister.flush().await;
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.settings.poll_interval_ms)
    }

    fn history_changed(&mut self) {
        self.persist();
        self.notifier.notify_all();
    }

    fn persist(&self) {
        self.persister
            .submit(state_file::encode(&self.settings, self.history.entries()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::monitor::tests::FakeClipboard;
    use crate::services::state_file::tests::MemoryDriver;
    use crate::services::FileSystemDriver;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordedNotices(Arc<Mutex<Vec<String>>>);

    impl RecordedNotices {
        fn all(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl NoticeSink for RecordedNotices {
        fn notice(&mut self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    struct BufferTarget {
        active: bool,
        text: String,
    }

    impl EditorTarget for BufferTarget {
        fn is_active(&self) -> bool {
            self.active
        }

        fn insert_at_cursor(&mut self, text: &str) -> std::io::Result<()> {
            self.text.push_str(text);
            Ok(())
        }
    }

    struct Harness {
        state: AppState,
        driver: Arc<MemoryDriver>,
        notices: RecordedNotices,
    }

    async fn harness_with(initial: Option<serde_json::Value>, clipboard: FakeClipboard) -> Harness {
        harness_on(
            MemoryDriver {
                initial,
                ..MemoryDriver::default()
            },
            clipboard,
        )
        .await
    }

    async fn harness_on(driver: MemoryDriver, clipboard: FakeClipboard) -> Harness {
        let driver = Arc::new(driver);
        let notices = RecordedNotices::default();
        let state = AppState::load(
            Arc::new(Config::default()),
            driver.clone(),
            Box::new(clipboard),
            Box::new(notices.clone()),
        )
        .await;
        Harness {
            state,
            driver,
            notices,
        }
    }

    async fn harness() -> Harness {
        harness_with(None, FakeClipboard::default()).await
    }

    fn contents(state: &AppState) -> Vec<String> {
        state.search("").iter().map(|e| e.content.clone()).collect()
    }

    #[tokio::test]
    async fn test_load_hydrates_settings_and_history() {
        let doc = json!({
            "maxEntries": 2,
            "clipboardHistory": [
                {"id": "3", "content": "c", "timestamp": 3, "preview": "c"},
                {"id": "2", "content": "b", "timestamp": 2, "preview": "b"},
                {"id": "1", "content": "a", "timestamp": 1, "preview": "a"}
            ]
        });
        let h = harness_with(Some(doc), FakeClipboard::default()).await;
        assert_eq!(h.state.settings().max_entries, 2);
        // Stored history beyond capacity is kept until the next capture
        assert_eq!(contents(&h.state), vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_corrupt_state_file_survives_next_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let original = r#"{"clipboardHistory": [{"content": "precious"}]}x"#;
        std::fs::write(&path, original).unwrap();

        let mut state = AppState::load(
            Arc::new(Config::default()),
            Arc::new(FileSystemDriver::new(&path)),
            Box::new(FakeClipboard::default()),
            Box::new(RecordedNotices::default()),
        )
        .await;
        assert!(state.history().is_empty());
        state.capture("new");
        state.shutdown().await;

        assert!(std::fs::read_to_string(&path).unwrap().contains("\"new\""));
        let kept: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().contains(".corrupt-"))
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();
        assert_eq!(kept, vec![original.to_string()]);
    }

    #[tokio::test]
    async fn test_unreadable_state_is_never_overwritten() {
        let driver = MemoryDriver {
            fail_load: true,
            ..MemoryDriver::default()
        };
        let mut h = harness_on(driver, FakeClipboard::default()).await;
        h.state.capture("session only");
        assert!(h.state.update_setting("maxEntries", "5"));
        assert_eq!(contents(&h.state), vec!["session only"]);

        h.state.shutdown().await;
        assert!(h.driver.last_saved().is_none());
    }

    #[tokio::test]
    async fn test_capture_persists_and_notifies() {
        let mut h = harness().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let observer: Arc<dyn HistoryObserver> = Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        h.state.register_observer(observer.clone());

        assert!(h.state.capture("first").is_some());
        assert!(h.state.capture("").is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        h.state.unregister_observer(&observer);
        h.state.capture("second");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        h.state.shutdown().await;
        let saved = h.driver.last_saved().unwrap();
        assert_eq!(saved["clipboardHistory"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_capacity_scenario() {
        let mut h = harness().await;
        assert!(h.state.update_setting("maxEntries", "3"));
        for (i, c) in ["a", "b", "c", "d"].iter().enumerate() {
            // Distinct ids even when captures land in the same millisecond
            let entry = ClipboardEntry::new(c.to_string(), i as i64);
            h.state.history.insert(entry, h.state.settings.max_entries);
        }
        assert_eq!(contents(&h.state), vec!["d", "c", "b"]);
    }

    #[tokio::test]
    async fn test_unchanged_clipboard_is_not_captured() {
        let mut h = harness_with(None, FakeClipboard::with("seed")).await;
        h.state.start_monitor();
        assert!(h.state.poll_once().is_none());
        assert!(h.state.history().is_empty());
        h.state.stop_monitor();
    }

    #[tokio::test]
    async fn test_capture_notice_is_gated() {
        let mut clipboard = FakeClipboard::default();
        clipboard.queued.extend([Ok("one".to_string()), Ok("two".to_string())]);
        let mut h = harness_with(None, clipboard).await;

        h.state.poll_once();
        assert!(h.notices.all().is_empty());

        h.state.update_setting("notifyOnCapture", "true");
        h.state.poll_once();
        assert_eq!(h.notices.all(), vec!["Clipboard content saved!"]);
        assert_eq!(contents(&h.state), vec!["two", "one"]);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let mut h = harness().await;
        let entry = h.state.capture("keep me").unwrap();
        assert_eq!(h.state.delete_entry(&entry.id), 1);
        assert_eq!(h.state.delete_entry(&entry.id), 0);

        h.state.capture("again");
        h.state.clear_history();
        assert!(h.state.search("").is_empty());
        assert_eq!(h.notices.all(), vec!["Clipboard history cleared!"]);
    }

    #[tokio::test]
    async fn test_copy_does_not_update_last_observed() {
        let mut h = harness_with(None, FakeClipboard::with("original")).await;
        h.state.start_monitor();
        h.state.history.insert(ClipboardEntry::new("older".to_string(), 1), 10);

        assert!(h.state.copy_entry("1"));
        assert_eq!(h.notices.all(), vec!["Copied to clipboard!"]);

        // The copied text differs from what the monitor last saw, so it is captured again
        let recaptured = h.state.poll_once().unwrap();
        assert_eq!(recaptured.content, "older");
        assert_eq!(contents(&h.state), vec!["older", "older"]);
        h.state.stop_monitor();
    }

    #[tokio::test]
    async fn test_copy_failure_and_unknown_id() {
        let mut clipboard = FakeClipboard::default();
        clipboard.fail_writes = true;
        let mut h = harness_with(None, clipboard).await;
        h.state.history.insert(ClipboardEntry::new("text".to_string(), 1), 10);

        assert!(!h.state.copy_entry("1"));
        assert!(!h.state.copy_entry("404"));
        assert_eq!(
            h.notices.all(),
            vec!["Failed to copy to clipboard", "No clipboard entry with id 404"]
        );
    }

    #[tokio::test]
    async fn test_paste_picks_indexed_result() {
        let mut h = harness().await;
        h.state.history.insert(ClipboardEntry::new("alpha one".to_string(), 1), 10);
        h.state.history.insert(ClipboardEntry::new("beta".to_string(), 2), 10);
        h.state.history.insert(ClipboardEntry::new("alpha two".to_string(), 3), 10);

        let mut target = BufferTarget { active: true, text: String::new() };
        assert!(h.state.paste("ALPHA", 2, &mut target));
        assert_eq!(target.text, "alpha one");

        assert!(!h.state.paste("missing", 1, &mut target));

        let mut inactive = BufferTarget { active: false, text: String::new() };
        assert!(!h.state.paste("", 1, &mut inactive));
        assert!(inactive.text.is_empty());
    }

    #[tokio::test]
    async fn test_export_uses_settings_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness().await;
        let folder = dir.path().join("out");
        h.state.update_setting("exportFolderPath", &folder.to_string_lossy());
        h.state.update_setting("exportDefaultCount", "1");
        h.state.history.insert(ClipboardEntry::new("# Title".to_string(), 1), 10);
        h.state.history.insert(ClipboardEntry::new("plain".to_string(), 2), 10);

        let path = h.state.export("", None, None).unwrap();
        let doc = std::fs::read_to_string(&path).unwrap();
        assert!(path.starts_with(&folder));
        assert!(doc.contains("```\nplain\n```"));
        assert!(!doc.contains("# Title"));
        assert_eq!(
            h.notices.all(),
            vec![format!("Exported 1 clipboard entries to {}", path.display())]
        );
    }

    #[tokio::test]
    async fn test_export_nothing_matches() {
        let mut h = harness().await;
        assert!(h.state.export("", None, None).is_none());
        assert_eq!(h.notices.all(), vec!["No entries to export"]);
    }

    #[tokio::test]
    async fn test_export_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let mut h = harness().await;
        h.state.capture("content");

        let folder = blocker.to_string_lossy().to_string();
        assert!(h.state.export("", Some(&folder), Some(5)).is_none());
        assert_eq!(h.notices.all(), vec!["Failed to export clipboard entries"]);
    }

    #[tokio::test]
    async fn test_invalid_setting_is_ignored() {
        let mut h = harness().await;
        assert!(!h.state.update_setting("pollIntervalMs", "10"));
        assert_eq!(h.state.settings().poll_interval_ms, 1000);
        h.state.shutdown().await;
        assert!(h.driver.last_saved().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_restarts_running_monitor() {
        let mut h = harness().await;
        h.state.start_monitor();
        let old_tick = h.state.next_tick().await;

        assert!(h.state.update_setting("pollIntervalMs", "250"));
        assert_eq!(h.state.monitor_state(), MonitorState::Running);
        assert!(!h.state.monitor.is_current(&old_tick));

        let started = tokio::time::Instant::now();
        let tick = h.state.next_tick().await;
        assert!(h.state.monitor.is_current(&tick));
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_leaves_stopped_monitor() {
        let mut h = harness().await;
        assert!(h.state.update_setting("pollIntervalMs", "250"));
        assert_eq!(h.state.monitor_state(), MonitorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_captures_until_shutdown() {
        let mut clipboard = FakeClipboard::with("before");
        clipboard.queued.extend([
            Ok("before".to_string()),
            Ok("copied".to_string()),
        ]);
        let mut h = harness_with(None, clipboard).await;

        h.state
            .watch(tokio::time::sleep(Duration::from_millis(1_050)))
            .await;

        assert_eq!(contents(&h.state), vec!["copied"]);
        assert_eq!(h.state.monitor_state(), MonitorState::Stopped);
    }
}
