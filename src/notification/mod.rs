//! Alarm notifications.
//!
//! This module provides:
//!
//! - [`AlarmNotifier`], the surface the alarm task shows its notification on
//! - [`DesktopNotifier`], backed by notify-rust
//! - [`MockNotifier`] for tests
//!
//! A notification carries exactly one action, "Stop alarm". Activating it
//! invokes the callback passed to [`AlarmNotifier::show`]. Each shown
//! notification is cleared by its own id, so a finishing alarm never
//! removes the notification of a newer one.

mod content;
mod desktop;
pub mod error;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

pub use self::content::{AlarmContent, APP_NAME, STOP_ACTION_ID, STOP_ACTION_LABEL};
pub use self::desktop::DesktopNotifier;
pub use self::error::NotificationError;

/// Invoked when the user presses the stop action.
pub type StopCallback = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a shown notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(pub u32);

/// A surface that can show and clear alarm notifications.
pub trait AlarmNotifier: Send + Sync {
    /// Shows a persistent notification with a stop action.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be shown.
    fn show(
        &self,
        content: &AlarmContent,
        on_stop: StopCallback,
    ) -> Result<NotificationId, NotificationError>;

    /// Clears a notification. Clearing twice is a no-op; never fails.
    ///
    /// A backend may finish the clear after returning; see [`flush`](Self::flush).
    fn clear(&self, id: NotificationId);

    /// Blocks until every clear requested so far has completed.
    ///
    /// A process must flush before it exits, or a clear still in flight is lost.
    fn flush(&self) {}
}

// ============================================================================
// MockNotifier
// ============================================================================

/// Mock notifier for testing.
#[derive(Default)]
pub struct MockNotifier {
    shown: Mutex<Vec<AlarmContent>>,
    visible: Mutex<Vec<NotificationId>>,
    pending_stop: Mutex<Option<(NotificationId, StopCallback)>>,
    clear_calls: AtomicUsize,
    next_id: AtomicU32,
    should_fail: AtomicBool,
}

impl MockNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Returns every notification shown, in order.
    #[must_use]
    pub fn shown(&self) -> Vec<AlarmContent> {
        self.shown
            .lock()
            .map(|shown| shown.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn clear_count(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    /// Number of notifications shown and not yet cleared.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.visible.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// Returns true while any notification is shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible_count() > 0
    }

    /// Simulates the user pressing stop on the newest notification.
    ///
    /// Returns false if no notification with a pending action is shown.
    pub fn press_stop(&self) -> bool {
        let pending = self.pending_stop.lock().ok().and_then(|mut slot| slot.take());
        match pending {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl AlarmNotifier for MockNotifier {
    fn show(
        &self,
        content: &AlarmContent,
        on_stop: StopCallback,
    ) -> Result<NotificationId, NotificationError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(NotificationError::NotAvailable);
        }
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(content.clone());
        }
        if let Ok(mut visible) = self.visible.lock() {
            visible.push(id);
        }
        if let Ok(mut slot) = self.pending_stop.lock() {
            *slot = Some((id, on_stop));
        }
        Ok(id)
    }

    fn clear(&self, id: NotificationId) {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut visible) = self.visible.lock() {
            visible.retain(|shown| *shown != id);
        }
        if let Ok(mut slot) = self.pending_stop.lock() {
            if slot.as_ref().is_some_and(|(pending, _)| *pending == id) {
                slot.take();
            }
        }
    }
}

impl std::fmt::Debug for MockNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNotifier")
            .field("shown", &self.shown())
            .field("clear_calls", &self.clear_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntervalKind;
    use std::sync::Arc;

    #[test]
    fn test_mock_records_and_presses_stop() {
        let notifier = MockNotifier::new();
        let pressed = Arc::new(AtomicBool::new(false));
        let flag = pressed.clone();

        notifier
            .show(
                &AlarmContent::for_kind(IntervalKind::Work),
                Box::new(move || flag.store(true, Ordering::SeqCst)),
            )
            .unwrap();

        assert!(notifier.is_visible());
        assert!(notifier.press_stop());
        assert!(pressed.load(Ordering::SeqCst));
        assert!(!notifier.press_stop());
    }

    #[test]
    fn test_mock_clear_drops_action() {
        let notifier = MockNotifier::new();
        let id = notifier
            .show(&AlarmContent::for_kind(IntervalKind::Break), Box::new(|| {}))
            .unwrap();

        notifier.clear(id);
        notifier.clear(id);

        assert!(!notifier.is_visible());
        assert_eq!(notifier.clear_count(), 2);
        assert!(!notifier.press_stop());
        assert_eq!(notifier.shown()[0].title, "Break Over!");
    }

    #[test]
    fn test_mock_clear_old_keeps_newer() {
        let notifier = MockNotifier::new();
        let old = notifier
            .show(&AlarmContent::for_kind(IntervalKind::Work), Box::new(|| {}))
            .unwrap();
        let new = notifier
            .show(&AlarmContent::for_kind(IntervalKind::Break), Box::new(|| {}))
            .unwrap();
        assert_ne!(old, new);

        notifier.clear(old);

        assert_eq!(notifier.visible_count(), 1);
        assert!(notifier.press_stop());
    }

    #[test]
    fn test_mock_failure() {
        let notifier = MockNotifier::new();
        notifier.set_should_fail(true);
        let result = notifier.show(&AlarmContent::for_kind(IntervalKind::Work), Box::new(|| {}));
        assert!(result.unwrap_err().is_unavailable());
        assert!(notifier.shown().is_empty());
    }
}
