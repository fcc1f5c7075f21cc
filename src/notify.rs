//! Notification boundary: a fire-and-forget "show user message" sink.
//!
//! Notifications are never awaited or retried. The accessor emits a dedicated
//! `PermissionDenied` notification; the stage engine emits `Error` on rollback
//! and `Success` on confirmed moves.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Info,
    Error,
    /// Row-level policy rejection, shown differently from other failures
    PermissionDenied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::PermissionDenied, "Accès refusé", message)
    }
}

pub trait Notifier {
    fn notify(&self, notification: Notification);
}

/// Routes notifications to the `log` facade
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        match n.kind {
            NotificationKind::Error | NotificationKind::PermissionDenied => {
                log::warn!("{}: {}", n.title, n.message)
            }
            NotificationKind::Success | NotificationKind::Info => log::info!("{}: {}", n.title, n.message),
        }
    }
}

/// Prints notifications to stderr so they never mix with command output
#[derive(Debug, Default)]
pub struct TerminalNotifier {
    /// Suppress success/info lines (errors are always shown)
    pub quiet: bool,
}

impl Notifier for TerminalNotifier {
    fn notify(&self, n: Notification) {
        match n.kind {
            NotificationKind::PermissionDenied => eprintln!("{}: {}", n.title, n.message),
            NotificationKind::Error => eprintln!("Warning: {}: {}", n.title, n.message),
            NotificationKind::Success | NotificationKind::Info if !self.quiet => {
                eprintln!("{}: {}", n.title, n.message)
            }
            _ => {}
        }
    }
}

/// Collects notifications in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.notifications().iter().filter(|n| n.kind == kind).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification);
    }
}
