//! Clipboard operations.

use std::io::Write;

/// Hidden subcommand run by the detached clipboard holder.
pub const HOLD_COMMAND: &str = "hold-clipboard";

/// Failure talking to the system clipboard.
#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard read failed: {0}")]
    Read(String),
    #[error("clipboard write failed: {0}")]
    Write(String),
}

/// Read/write access to a text clipboard.
pub trait ClipboardSource {
    /// Current clipboard text. An empty clipboard reads as an empty string.
    fn read_text(&mut self) -> Result<String, ClipboardError>;

    /// Replace the clipboard text.
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// The system clipboard, via `arboard`.
///
/// The handle is opened lazily and dropped after a failure so the next
/// call gets a fresh connection.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    hand_off_writes: bool,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clipboard for a process that exits right after writing.
    ///
    /// On Linux the selection is served by the process that set it and
    /// vanishes when that process exits, so writes go to a detached
    /// holder process instead.
    pub fn one_shot() -> Self {
        Self {
            inner: None,
            hand_off_writes: cfg!(target_os = "linux"),
        }
    }

    fn handle(&mut self) -> Result<&mut arboard::Clipboard, ClipboardError> {
        if self.inner.is_none() {
            let clipboard =
                arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
            self.inner = Some(clipboard);
        }
        self.inner
            .as_mut()
            .ok_or_else(|| ClipboardError::Unavailable("no clipboard handle".to_string()))
    }
}

impl ClipboardSource for SystemClipboard {
    fn read_text(&mut self) -> Result<String, ClipboardError> {
        let result = self.handle()?.get_text();
        match result {
            Ok(text) => Ok(text),
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => {
                self.inner = None;
                Err(ClipboardError::Read(e.to_string()))
            }
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        #[cfg(target_os = "linux")]
        if self.hand_off_writes {
            return spawn_holder(text);
        }

        let result = self.handle()?.set_text(text);
        result.map_err(|e| {
            self.inner = None;
            ClipboardError::Write(e.to_string())
        })
    }
}

/// Own the clipboard with `text` until another application replaces it.
///
/// Blocks on Linux; elsewhere the clipboard keeps the text on its own.
pub fn hold_until_replaced(text: &str) -> Result<(), ClipboardError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;

    #[cfg(target_os = "linux")]
    let result = {
        use arboard::SetExtLinux;
        clipboard.set().wait().text(text)
    };
    #[cfg(not(target_os = "linux"))]
    let result = clipboard.set_text(text);

    result.map_err(|e| ClipboardError::Write(e.to_string()))
}

#[cfg(target_os = "linux")]
fn holder_command(exe: &std::path::Path) -> std::process::Command {
    let mut cmd = std::process::Command::new(exe);
    cmd.arg(HOLD_COMMAND);
    cmd
}

/// Start `clip-recall hold-clipboard` in its own session and pipe `text` to it.
#[cfg(target_os = "linux")]
fn spawn_holder(text: &str) -> Result<(), ClipboardError> {
    use std::os::unix::process::CommandExt;
    use std::process::Stdio;

    let write_error = |e: std::io::Error| ClipboardError::Write(e.to_string());

    let exe = std::env::current_exe().map_err(write_error)?;
    let mut cmd = holder_command(&exe);
    // New session, so closing the terminal does not take the selection with it
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(write_error)?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ClipboardError::Write("holder has no stdin".to_string()))?;
    stdin.write_all(text.as_bytes()).map_err(write_error)?;

    tracing::debug!(pid = child.id(), "clipboard holder started");
    Ok(())
}

/// Somewhere pasted content can be inserted.
pub trait EditorTarget {
    /// Whether there is anything to paste into right now.
    fn is_active(&self) -> bool;

    /// Insert text at the cursor position.
    fn insert_at_cursor(&mut self, text: &str) -> std::io::Result<()>;
}

/// Paste target writing to standard output, so history can be piped.
pub struct StdoutTarget;

impl EditorTarget for StdoutTarget {
    fn is_active(&self) -> bool {
        true
    }

    fn insert_at_cursor(&mut self, text: &str) -> std::io::Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()
    }
}
