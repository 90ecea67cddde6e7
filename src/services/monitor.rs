//! Change monitor - polls the clipboard and reports new content.
//!
//! The timer runs as its own task and only emits ticks; the owner of the
//! monitor awaits them with [`ChangeMonitor::next_tick`] and calls
//! [`ChangeMonitor::poll`] itself, so a tick always runs to completion
//! before the next one is looked at.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::settings::MIN_POLL_INTERVAL_MS;
use crate::services::clipboard::ClipboardSource;

/// Whether the poll timer is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

/// One firing of the poll timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    generation: u64,
}

/// Polls a [`ClipboardSource`] and detects changes against the last value seen.
pub struct ChangeMonitor {
    last_observed: String,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    ticks: mpsc::Sender<Tick>,
    pending: mpsc::Receiver<Tick>,
}

impl ChangeMonitor {
    /// Create a stopped monitor.
    pub fn new() -> Self {
        // One pending tick is enough; a slow poll delays the next instead of queueing more.
        let (ticks, pending) = mpsc::channel(1);
        Self {
            last_observed: String::new(),
            generation: 0,
            timer: None,
            ticks,
            pending,
        }
    }

    pub fn state(&self) -> MonitorState {
        if self.timer.is_some() {
            MonitorState::Running
        } else {
            MonitorState::Stopped
        }
    }

    /// The clipboard value the monitor last recorded.
    pub fn last_observed(&self) -> &str {
        &self.last_observed
    }

    /// Seed the last observed value from the clipboard and schedule the timer.
    ///
    /// Any timer already running is stopped first. Must be called from within
    /// a Tokio runtime.
    pub fn start<C>(&mut self, source: &mut C, interval: Duration)
    where
        C: ClipboardSource + ?Sized,
    {
        self.stop();

        self.last_observed = match source.read_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Error reading initial clipboard: {}", e);
                String::new()
            }
        };

        let period = interval.max(Duration::from_millis(MIN_POLL_INTERVAL_MS));
        self.generation += 1;
        let generation = self.generation;
        let ticks = self.ticks.clone();

        self.timer = Some(tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; polling starts one period in.
            timer.tick().await;
            loop {
                timer.tick().await;
                match ticks.try_send(Tick { generation }) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        }));

        tracing::debug!(
            generation,
            interval_ms = period.as_millis() as u64,
            "clipboard monitor started"
        );
    }

    /// Cancel future ticks. Ticks already handed out become stale.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            // Free the slot so the next timer's first tick is not held back.
            while self.pending.try_recv().is_ok() {}
            tracing::debug!(generation = self.generation, "clipboard monitor stopped");
        }
    }

    /// Wait for the next timer tick.
    ///
    /// Pends forever while the monitor is stopped.
    pub async fn next_tick(&mut self) -> Tick {
        // The monitor keeps a sender, so the channel never closes.
        loop {
            if let Some(tick) = self.pending.recv().await {
                return tick;
            }
        }
    }

    /// Stop the current timer, then start a new one.
    pub fn restart<C>(&mut self, source: &mut C, interval: Duration)
    where
        C: ClipboardSource + ?Sized,
    {
        self.stop();
        self.start(source, interval);
    }

    /// Whether a tick came from the timer that is currently scheduled.
    pub fn is_current(&self, tick: &Tick) -> bool {
        self.timer.is_some() && tick.generation == self.generation
    }

    /// Run one poll tick.
    ///
    /// Returns the new clipboard text when it is non-empty and differs from
    /// the last observed value. Read failures are logged and yield `None`.
    pub fn poll<C>(&mut self, source: &mut C) -> Option<String>
    where
        C: ClipboardSource + ?Sized,
    {
        let current = match source.read_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Error checking clipboard: {}", e);
                return None;
            }
        };

        if current.is_empty() || current == self.last_observed {
            return None;
        }

        self.last_observed = current.clone();
        Some(current)
    }
}

impl Default for ChangeMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ChangeMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
