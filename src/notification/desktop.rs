//! Desktop notifications via notify-rust.
//!
//! On freedesktop hosts the alarm notification is critical, resident and
//! never expires, and carries a stop action. A helper thread blocks on the
//! action and invokes the stop callback. Clearing closes the notification
//! by id over the session bus, which also releases that thread. The bus
//! round trip runs on its own thread; `flush` joins every close still in
//! flight.
//!
//! macOS shows summary and body only; there is nothing to clear.

#[cfg(all(unix, not(target_os = "macos")))]
use std::sync::Mutex;
#[cfg(all(unix, not(target_os = "macos")))]
use std::thread::JoinHandle;

use notify_rust::Notification;

use super::content::{AlarmContent, APP_NAME};
#[cfg(all(unix, not(target_os = "macos")))]
use super::content::STOP_ACTION_ID;
use super::error::NotificationError;
use super::{AlarmNotifier, NotificationId, StopCallback};

/// Shows alarm notifications on the user's desktop.
#[derive(Debug, Default)]
pub struct DesktopNotifier {
    /// Close requests that may still be talking to the bus.
    #[cfg(all(unix, not(target_os = "macos")))]
    closing: Mutex<Vec<JoinHandle<()>>>,
}

impl DesktopNotifier {
    /// Creates a new desktop notifier.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
impl AlarmNotifier for DesktopNotifier {
    fn show(
        &self,
        content: &AlarmContent,
        on_stop: StopCallback,
    ) -> Result<NotificationId, NotificationError> {
        use notify_rust::{Hint, Timeout, Urgency};

        let handle = Notification::new()
            .appname(APP_NAME)
            .summary(&content.title)
            .body(&content.body)
            .action(STOP_ACTION_ID, &content.stop_label)
            .urgency(Urgency::Critical)
            .hint(Hint::Resident(true))
            .timeout(Timeout::Never)
            .show()?;

        let id = handle.id();
        tracing::debug!("Alarm notification {} shown", id);

        std::thread::Builder::new()
            .name("pomodoro-notification".to_string())
            .spawn(move || {
                handle.wait_for_action(|action| {
                    if action == STOP_ACTION_ID {
                        tracing::info!("Stop pressed on alarm notification");
                        on_stop();
                    }
                });
            })
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        Ok(NotificationId(id))
    }

    fn clear(&self, id: NotificationId) {
        // The bus round trip must not hold up the caller's runtime thread.
        let spawned = std::thread::Builder::new()
            .name("pomodoro-notification-close".to_string())
            .spawn(move || {
                if let Err(e) = close_notification(id.0) {
                    tracing::warn!("{}", e);
                }
            });
        match spawned {
            Ok(handle) => {
                if let Ok(mut closing) = self.closing.lock() {
                    closing.retain(|close| !close.is_finished());
                    closing.push(handle);
                }
            }
            Err(e) => tracing::warn!("Failed to close notification {}: {}", id.0, e),
        }
    }

    fn flush(&self) {
        let closing = self
            .closing
            .lock()
            .map(|mut closing| std::mem::take(&mut *closing))
            .unwrap_or_default();
        for handle in closing {
            if handle.join().is_err() {
                tracing::warn!("Notification close thread panicked");
            }
        }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn close_notification(id: u32) -> Result<(), NotificationError> {
    let connection = zbus::blocking::Connection::session()
        .map_err(|e| NotificationError::CloseFailed(e.to_string()))?;
    connection
        .call_method(
            Some("org.freedesktop.Notifications"),
            "/org/freedesktop/Notifications",
            Some("org.freedesktop.Notifications"),
            "CloseNotification",
            &(id,),
        )
        .map_err(|e| NotificationError::CloseFailed(e.to_string()))?;
    tracing::debug!("Alarm notification {} closed", id);
    Ok(())
}

#[cfg(target_os = "macos")]
impl AlarmNotifier for DesktopNotifier {
    fn show(
        &self,
        content: &AlarmContent,
        _on_stop: StopCallback,
    ) -> Result<NotificationId, NotificationError> {
        Notification::new()
            .appname(APP_NAME)
            .summary(&content.title)
            .body(&content.body)
            .show()?;
        Ok(NotificationId(0))
    }

    fn clear(&self, _id: NotificationId) {}
}
