//! User-visible notices.

/// Receives short advisory messages meant for the user.
pub trait NoticeSink: Send {
    fn notice(&mut self, message: &str);
}

/// Prints notices to stderr, keeping stdout for command output.
pub struct ConsoleNotices;

impl NoticeSink for ConsoleNotices {
    fn notice(&mut self, message: &str) {
        eprintln!("{}", message);
    }
}
