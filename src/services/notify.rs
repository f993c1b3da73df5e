//! User-visible notification service
//!
//! Upstream failures are caught at the call boundary and turned into
//! dismissible notifications. This module keeps that concern apart from the
//! composition and provider logic so each frontend can render them its own way.

use crate::error::ImaginariumError;
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Severity shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// A message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub dismissible: bool,
}

impl Notification {
    #[must_use]
    pub fn info<T: Into<String>, M: Into<String>>(title: T, message: M) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            message: message.into(),
            dismissible: true,
        }
    }

    #[must_use]
    pub fn success<T: Into<String>, M: Into<String>>(title: T, message: M) -> Self {
        Self {
            level: NotificationLevel::Success,
            ..Self::info(title, message)
        }
    }

    /// Map an error to the notification the user sees
    #[must_use]
    pub fn from_error(error: &ImaginariumError) -> Self {
        let title = match error {
            ImaginariumError::UpstreamUnavailable { service, .. } => {
                format!("The {service} service is unavailable")
            },
            ImaginariumError::InsufficientCredits { .. } => "Insufficient credits".to_string(),
            ImaginariumError::Unauthorized(_) => "Not allowed".to_string(),
            ImaginariumError::NotFound(_) => "Not found".to_string(),
            ImaginariumError::InvalidDimensions(_) => "Invalid image".to_string(),
            _ => "Something went wrong".to_string(),
        };
        Self {
            level: NotificationLevel::Error,
            title,
            message: error.to_string(),
            dismissible: true,
        }
    }
}

/// Receives notifications produced while serving a request or session
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification
    fn notify(&self, notification: Notification);

    /// Convenience for errors
    fn notify_error(&self, error: &ImaginariumError) {
        self.notify(Notification::from_error(error));
    }
}

/// Sink that discards all notifications
pub struct NoOpNotifier;

impl NotificationSink for NoOpNotifier {
    fn notify(&self, _notification: Notification) {}
}

/// Sink that writes notifications to the tracing subscriber
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => tracing::warn!(
                title = %notification.title,
                message = %notification.message,
                "🔔 Notification"
            ),
            NotificationLevel::Info | NotificationLevel::Success => tracing::info!(
                title = %notification.title,
                message = %notification.message,
                "🔔 Notification"
            ),
        }
    }
}

/// Sink that keeps notifications until the frontend drains them
#[derive(Debug, Clone, Default)]
pub struct CollectingNotifier {
    pending: Arc<Mutex<Vec<Notification>>>,
}

impl CollectingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every pending notification
    #[must_use]
    pub fn drain(&self) -> Vec<Notification> {
        self.pending
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for CollectingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Upstream;

    #[test]
    fn test_upstream_error_notification() {
        let error = ImaginariumError::upstream(Upstream::BackgroundRemoval, "HTTP 429");
        let notification = Notification::from_error(&error);
        assert_eq!(notification.level, NotificationLevel::Error);
        assert_eq!(
            notification.title,
            "The background removal service is unavailable"
        );
        assert!(notification.message.contains("HTTP 429"));
        assert!(notification.dismissible);
    }

    #[test]
    fn test_collecting_notifier_drains() {
        let sink = CollectingNotifier::new();
        sink.notify(Notification::info("Saved", "Image saved"));
        sink.notify_error(&ImaginariumError::not_found("image 42"));
        assert_eq!(sink.len(), 2);

        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].title, "Not found");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_clones_share_queue() {
        let sink = CollectingNotifier::new();
        let clone = sink.clone();
        clone.notify(Notification::success("Paid", "Credits added"));
        assert_eq!(sink.drain()[0].level, NotificationLevel::Success);
    }
}
