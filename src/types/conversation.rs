use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{empty_as_none, UserSummary};

/// Pagination block attached to cursor-paginated responses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub next_cursor: Option<String>,
}

/// Channel, private group, or direct message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_im: bool,
    #[serde(default)]
    pub is_mpim: bool,
    #[serde(default)]
    pub is_private: bool,
    /// Peer user id, set on direct messages only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_members: Option<u64>,
    /// Profile of the DM peer, filled in by enrichment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dm_user: Option<UserSummary>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Conversation {
    pub fn kind(&self) -> &'static str {
        if self.is_im {
            "dm"
        } else if self.is_mpim {
            "group-dm"
        } else if self.is_private {
            "private"
        } else {
            "channel"
        }
    }

    pub fn display_name(&self) -> String {
        if let Some(user) = &self.dm_user {
            return format!("@{}", user.best_name());
        }
        match (&self.name, &self.user) {
            (Some(name), _) => format!("#{}", name),
            (None, Some(user)) => format!("@{}", user),
            (None, None) => self.id.clone(),
        }
    }

    pub fn topic(&self) -> Option<&str> {
        self.extra
            .get("topic")
            .and_then(|t| t.get("value"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationsPage {
    #[serde(default)]
    pub channels: Vec<Conversation>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

/// File attached to a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_private: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_private_download: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileRef {
    pub fn download_url(&self) -> Option<&str> {
        self.url_private_download
            .as_deref()
            .or(self.url_private.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub file: FileRef,
}

/// Message in a conversation history or thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub ts: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileRef>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn author(&self) -> &str {
        self.user
            .as_deref()
            .or_else(|| self.extra.get("username").and_then(|v| v.as_str()))
            .or_else(|| self.extra.get("bot_id").and_then(|v| v.as_str()))
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

/// Result of `chat.postMessage`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conversation_keeps_unknown_fields() {
        let conv: Conversation = serde_json::from_value(json!({
            "id": "C1",
            "name": "general",
            "is_channel": true,
            "topic": {"value": "Company-wide", "creator": "U1"}
        }))
        .unwrap();

        assert_eq!(conv.kind(), "channel");
        assert_eq!(conv.display_name(), "#general");
        assert_eq!(conv.topic(), Some("Company-wide"));

        let back = serde_json::to_value(&conv).unwrap();
        assert_eq!(back["is_channel"], true);
        assert!(back.get("dm_user").is_none());
    }

    #[test]
    fn test_dm_display_name_prefers_profile() {
        let mut conv: Conversation = serde_json::from_value(json!({
            "id": "D1",
            "is_im": true,
            "user": "U42"
        }))
        .unwrap();
        assert_eq!(conv.kind(), "dm");
        assert_eq!(conv.display_name(), "@U42");

        conv.dm_user = Some(UserSummary {
            id: "U42".to_string(),
            name: "ada".to_string(),
            real_name: Some("Ada Lovelace".to_string()),
            display_name: None,
        });
        assert_eq!(conv.display_name(), "@Ada Lovelace");
    }

    #[test]
    fn test_file_download_url_prefers_download_link() {
        let file: FileRef = serde_json::from_value(json!({
            "id": "F1",
            "url_private": "https://files.example.com/a",
            "url_private_download": "https://files.example.com/a/download"
        }))
        .unwrap();
        assert_eq!(file.download_url(), Some("https://files.example.com/a/download"));
    }
}
