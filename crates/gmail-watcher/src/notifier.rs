//! Best-effort user notifications.

use std::sync::Arc;

use notify_rust::{Notification, Timeout};

use crate::config::NotifierKind;
use crate::error::NotifyError;

const APP_NAME: &str = "Gmail Watcher";

/// Shows a transient popup. Implementations must never fail the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str, duration_secs: u32);
}

/// Native desktop notification via the platform's notification service
#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn show(&self, title: &str, body: &str, duration_secs: u32) -> Result<(), NotifyError> {
        Notification::new()
            .appname(APP_NAME)
            .summary(title)
            .body(body)
            .timeout(Timeout::Milliseconds(duration_secs.saturating_mul(1000)))
            .show()?;
        Ok(())
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str, duration_secs: u32) {
        match self.show(title, body, duration_secs) {
            Ok(()) => tracing::debug!("Notification shown: {}", title),
            Err(e) => tracing::warn!("{}", e),
        }
    }
}

/// Writes notifications to the log instead of the screen
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str, duration_secs: u32) {
        tracing::info!("[notify {}s] {}: {}", duration_secs, title, body);
    }
}

pub fn from_kind(kind: NotifierKind) -> Arc<dyn Notifier> {
    match kind {
        NotifierKind::Desktop => Arc::new(DesktopNotifier),
        NotifierKind::Log => Arc::new(LogNotifier),
    }
}

/// Records every call; shared by the test modules
#[cfg(test)]
pub mod testing {
    use super::Notifier;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Shown {
        pub title: String,
        pub body: String,
        pub duration_secs: u32,
    }

    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        shown: Mutex<Vec<Shown>>,
    }

    impl RecordingNotifier {
        pub fn shown(&self) -> Vec<Shown> {
            self.shown.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str, duration_secs: u32) {
            self.shown.lock().unwrap().push(Shown {
                title: title.to_string(),
                body: body.to_string(),
                duration_secs,
            });
        }
    }
}
