//! User-adjustable settings stored alongside the history.

use serde::Serialize;
use serde_json::{Map, Value};

/// Smallest poll interval the monitor accepts, in milliseconds.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Settings persisted at the top level of the state document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Maximum number of history entries kept
    pub max_entries: usize,
    /// How often the clipboard is polled
    pub poll_interval_ms: u64,
    /// Emit a notice every time content is captured
    pub notify_on_capture: bool,
    /// Export destination (relative paths resolve against the export root)
    pub export_folder_path: String,
    /// Number of entries exported when no count is given
    pub export_default_count: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_entries: 100,
            poll_interval_ms: 1000,
            notify_on_capture: false,
            export_folder_path: "clipboard".to_string(),
            export_default_count: 50,
        }
    }
}

/// Settings keys accepted by [`Settings::apply`].
pub const SETTING_KEYS: &[&str] = &[
    "maxEntries",
    "pollIntervalMs",
    "notifyOnCapture",
    "exportFolderPath",
    "exportDefaultCount",
];

impl Settings {
    /// Build settings from a persisted document, defaulting each field on its own.
    ///
    /// The document also carries the history, so its shape is never trusted:
    /// a missing, mistyped or out-of-range field only resets that field.
    /// Keys written by older releases are accepted as fallbacks.
    pub fn from_document(doc: &Value) -> Self {
        let defaults = Self::default();
        let Some(map) = doc.as_object() else {
            return defaults;
        };

        Self {
            max_entries: read_u64(map, &["maxEntries"])
                .filter(|n| *n >= 1)
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(defaults.max_entries),
            poll_interval_ms: read_u64(map, &["pollIntervalMs", "checkInterval"])
                .filter(|n| *n >= MIN_POLL_INTERVAL_MS)
                .unwrap_or(defaults.poll_interval_ms),
            notify_on_capture: read_field(map, &["notifyOnCapture", "enableNotifications"])
                .and_then(Value::as_bool)
                .unwrap_or(defaults.notify_on_capture),
            export_folder_path: read_field(map, &["exportFolderPath", "defaultExportFolder"])
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or(defaults.export_folder_path),
            export_default_count: read_u64(map, &["exportDefaultCount", "defaultExportCount"])
                .filter(|n| *n >= 1)
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(defaults.export_default_count),
        }
    }

    /// Apply a raw user-supplied value to the named setting.
    ///
    /// Invalid input leaves the setting untouched. Returns `true` when the
    /// stored value changed.
    pub fn apply(&mut self, key: &str, raw: &str) -> bool {
        let raw = raw.trim();
        let before = self.clone();

        match key {
            "maxEntries" => {
                if let Some(n) = parse_positive(raw) {
                    self.max_entries = n;
                }
            }
            "pollIntervalMs" => {
                if let Ok(n) = raw.parse::<u64>() {
                    if n >= MIN_POLL_INTERVAL_MS {
                        self.poll_interval_ms = n;
                    }
                }
            }
            "notifyOnCapture" => {
                if let Ok(b) = raw.parse::<bool>() {
                    self.notify_on_capture = b;
                }
            }
            "exportFolderPath" => {
                if !raw.is_empty() {
                    self.export_folder_path = raw.to_string();
                }
            }
            "exportDefaultCount" => {
                if let Some(n) = parse_positive(raw) {
                    self.export_default_count = n;
                }
            }
            _ => {}
        }

        if *self == before {
            tracing::debug!(key, value = raw, "setting unchanged");
            false
        } else {
            true
        }
    }

    /// Render settings as a JSON object (the top level of the state document).
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn read_field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k))
}

fn read_u64(map: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    read_field(map, keys).and_then(Value::as_u64)
}

fn parse_positive(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok().filter(|n| *n > 0)
}
