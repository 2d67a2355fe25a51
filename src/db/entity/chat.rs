use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };

use crate::enums::Sender;

/// Per-thread summary stored in the shared chat index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPreview {
    pub last_message: String,
    pub timestamp: DateTime<Utc>,
    /// Unread on the admin side.
    pub unread: bool,
    #[serde(default)]
    pub unread_for_user: bool,
    pub user_name: String,
}

impl ChatPreview {
    pub fn is_unread_for(&self, viewer: Sender) -> bool {
        match viewer {
            Sender::Admin => self.unread,
            Sender::User => self.unread_for_user,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}
