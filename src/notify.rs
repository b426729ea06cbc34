//! Desktop notification contract (§4.5, §6.6).
//!
//! The notifier is an external collaborator: best-effort, never observed for
//! failure by the components that call it. This module only defines the
//! trait-based seam and two implementations — a D-Bus one mirroring the
//! reference `notify-send` shell-out, and a no-op/mock pair for tests —
//! matching the teacher's `NetworkLogger` trait-seam pattern.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Normal,
    Critical,
}

impl Urgency {
    fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Critical => "critical",
        }
    }
}

/// A single notification, matching the `(title, message, urgency, icon)` contract.
#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub urgency: Urgency,
    pub icon: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            urgency: Urgency::Normal,
            icon: "drive-harddisk".to_string(),
        }
    }

    pub fn urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }
}

/// Best-effort desktop notification transport. Implementations must not
/// panic and callers must not block or branch on the result — delivery
/// failures are swallowed at the call site, matching §4.5.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Resolves the active user's session bus under `/run/user/<uid>/bus` and
/// shells out to `notify-send` as that user, mirroring `scripts/core/notify.py`.
pub struct DbusNotifier {
    /// UID of the primary user session (the reference script assumes 1000;
    /// we keep it configurable rather than hard-coded).
    pub target_uid: u32,
    pub app_name: String,
}

impl DbusNotifier {
    pub fn new(target_uid: u32) -> Self {
        Self {
            target_uid,
            app_name: "ZenFS".to_string(),
        }
    }
}

#[async_trait]
impl Notifier for DbusNotifier {
    async fn notify(&self, notification: Notification) {
        let bus_path = format!("/run/user/{}/bus", self.target_uid);
        if !std::path::Path::new(&bus_path).exists() {
            tracing::debug!("no session bus at {bus_path}, skipping notification");
            return;
        }

        let username = match users_lookup(self.target_uid) {
            Some(name) => name,
            None => {
                tracing::debug!("uid {} has no passwd entry, skipping notification", self.target_uid);
                return;
            }
        };

        let dbus_address = format!("unix:path={bus_path}");
        let inner = format!(
            "DBUS_SESSION_BUS_ADDRESS={dbus_address} notify-send -u {} -i {} -a '{}' '{}' '{}'",
            notification.urgency.as_str(),
            notification.icon,
            self.app_name,
            notification.title.replace('\'', "'\\''"),
            notification.message.replace('\'', "'\\''"),
        );

        let result = tokio::process::Command::new("su")
            .arg(&username)
            .arg("-c")
            .arg(&inner)
            .output()
            .await;

        if let Err(err) = result {
            tracing::debug!("notification delivery failed (best-effort): {err}");
        }
    }
}

#[cfg(unix)]
fn users_lookup(uid: u32) -> Option<String> {
    // SAFETY: getpwuid returns a pointer into thread-local static storage;
    // we copy the name out before the next libc call can invalidate it.
    unsafe {
        let passwd = libc::getpwuid(uid);
        if passwd.is_null() {
            return None;
        }
        let name = std::ffi::CStr::from_ptr((*passwd).pw_name);
        Some(name.to_string_lossy().into_owned())
    }
}

#[cfg(not(unix))]
fn users_lookup(_uid: u32) -> Option<String> {
    None
}

/// Swallows every notification. Used where no desktop session exists (tests,
/// headless service mode).
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: Notification) {}
}

/// Captures notifications for test assertions.
#[derive(Default, Clone)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}
