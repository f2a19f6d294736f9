// service/notification_service.rs
use std::sync::Arc;

use serde::Serialize;

use crate::service::error::ServiceError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Destructive,
}

/// Short-lived user-visible message.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub level: NoticeLevel,
}

/// Sink for user-visible notices; the view layer plugs its toast queue in here.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Default sink: every notice becomes a structured log event.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Destructive => tracing::warn!(
                title = %notice.title,
                "Notice: {}",
                notice.description
            ),
            _ => tracing::info!(title = %notice.title, "Notice: {}", notice.description),
        }
    }
}

#[derive(Clone)]
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService").finish_non_exhaustive()
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new(Arc::new(TracingNotifier))
    }
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn success(&self, title: &str, description: impl Into<String>) {
        self.notifier.notify(Notice {
            title: title.to_string(),
            description: description.into(),
            level: NoticeLevel::Success,
        });
    }

    pub fn info(&self, title: &str, description: impl Into<String>) {
        self.notifier.notify(Notice {
            title: title.to_string(),
            description: description.into(),
            level: NoticeLevel::Info,
        });
    }

    /// Reports the failure with its message and hands it back for re-raising.
    pub fn failure(&self, title: &str, error: ServiceError) -> ServiceError {
        self.notifier.notify(Notice {
            title: title.to_string(),
            description: error.to_string(),
            level: NoticeLevel::Destructive,
        });
        error
    }
}
