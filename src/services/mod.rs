//! Backend services.

pub mod clipboard;
pub mod exporter;
pub mod history_store;
pub mod monitor;
pub mod notice;
pub mod notifier;
pub mod state_file;

pub use clipboard::{StdoutTarget, SystemClipboard};
pub use history_store::HistoryStore;
pub use notice::ConsoleNotices;
pub use state_file::FileSystemDriver;
