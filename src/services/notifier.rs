//! Update notifier - tells observers that the history changed.

use std::sync::Arc;

/// Something that re-reads the history after it changes.
pub trait HistoryObserver: Send + Sync {
    fn notify(&self);
}

impl<F> HistoryObserver for F
where
    F: Fn() + Send + Sync,
{
    fn notify(&self) {
        self()
    }
}

/// Registry of history observers, keyed by reference identity.
#[derive(Default)]
pub struct UpdateNotifier {
    observers: Vec<Arc<dyn HistoryObserver>>,
}

impl UpdateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Registering the same `Arc` twice is a no-op.
    pub fn register(&mut self, observer: Arc<dyn HistoryObserver>) {
        if !self.observers.iter().any(|o| same_observer(o, &observer)) {
            self.observers.push(observer);
        }
    }

    /// Remove a previously registered observer.
    pub fn unregister(&mut self, observer: &Arc<dyn HistoryObserver>) {
        self.observers.retain(|o| !same_observer(o, observer));
    }

    /// Call every registered observer on the current thread.
    pub fn notify_all(&self) {
        for observer in &self.observers {
            observer.notify();
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

// Compare data pointers only; vtable pointers may differ across codegen units.
fn same_observer(a: &Arc<dyn HistoryObserver>, b: &Arc<dyn HistoryObserver>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
