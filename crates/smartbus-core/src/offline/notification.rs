//! Push notifications and notification clicks.

use serde::Serialize;

pub const NOTIFICATION_TITLE: &str = "SMARTBUS";
pub const DEFAULT_NOTIFICATION_BODY: &str = "New update available";
pub const NOTIFICATION_ICON: &str = "/icons/icon-192x192.png";
pub const NOTIFICATION_BADGE: &str = "/icons/icon-72x72.png";
pub const VIBRATION_PATTERN: [u32; 3] = [100, 50, 100];

/// Action id that opens the app when clicked.
pub const EXPLORE_ACTION: &str = "explore";
pub const CLOSE_ACTION: &str = "close";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

impl NotificationAction {
    fn new(action: &str, title: &str) -> Self {
        Self {
            action: action.to_string(),
            title: title.to_string(),
            icon: NOTIFICATION_ICON.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    /// Epoch milliseconds when the push arrived.
    pub date_of_arrival: i64,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    /// Build the notification for a push, with an optional text payload.
    pub fn from_push(payload: Option<&str>, arrived_at_ms: i64) -> Self {
        let body = match payload {
            Some(text) => text.to_string(),
            None => DEFAULT_NOTIFICATION_BODY.to_string(),
        };
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body,
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_BADGE.to_string(),
            vibrate: VIBRATION_PATTERN.to_vec(),
            date_of_arrival: arrived_at_ms,
            actions: vec![
                NotificationAction::new(EXPLORE_ACTION, "Open app"),
                NotificationAction::new(CLOSE_ACTION, "Dismiss"),
            ],
        }
    }
}

/// Follow-up requested of the host after a notification click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    OpenWindow(String),
}

/// The notification always closes; `explore` also opens the app root.
pub fn notification_click(action: Option<&str>) -> Option<ClientCommand> {
    match action {
        Some(EXPLORE_ACTION) => Some(ClientCommand::OpenWindow("/".to_string())),
        _ => None,
    }
}
