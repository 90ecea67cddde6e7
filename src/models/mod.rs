//! Data models for clipboard history.

pub mod entry;
pub mod settings;

pub use entry::ClipboardEntry;
pub use settings::Settings;
