use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of a plain API token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TokenRole {
    Bot,
    User,
}

impl TokenRole {
    /// Bot tokens carry the `xoxb-` prefix; everything else acts as a user.
    pub fn infer(token: &str) -> Self {
        if token.starts_with("xoxb-") {
            Self::Bot
        } else {
            Self::User
        }
    }
}

impl fmt::Display for TokenRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bot => write!(f, "bot"),
            Self::User => write!(f, "user"),
        }
    }
}

/// Credentials of one workspace. The tag selects the request strategy.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkspaceCredential {
    /// Bearer token issued to an app or user
    Token { token: String, role: TokenRole },
    /// Session cookie plus web client token captured from a browser
    Browser {
        session_token: String,
        api_token: String,
        origin_url: String,
    },
}

impl WorkspaceCredential {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Token { role: TokenRole::Bot, .. } => "bot token",
            Self::Token { role: TokenRole::User, .. } => "user token",
            Self::Browser { .. } => "browser session",
        }
    }
}

// Keep secrets out of logs and panics.
impl fmt::Debug for WorkspaceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token { role, .. } => f
                .debug_struct("Token")
                .field("token", &"<redacted>")
                .field("role", role)
                .finish(),
            Self::Browser { origin_url, .. } => f
                .debug_struct("Browser")
                .field("session_token", &"<redacted>")
                .field("api_token", &"<redacted>")
                .field("origin_url", origin_url)
                .finish(),
        }
    }
}

/// A persisted, authenticated workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    /// Team id reported by the remote, used as the store key
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub credential: WorkspaceCredential,
    /// Channels this workspace may post into. Empty or absent means unrestricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_channels: Option<Vec<String>>,
}

impl WorkspaceRecord {
    /// Whether `channel` is on the allow-list as written.
    ///
    /// Entries are matched literally, with or without a leading `#`; a name
    /// and the id it resolves to are different entries.
    pub fn may_post_to(&self, channel: &str) -> bool {
        match &self.allowed_channels {
            Some(list) if !list.is_empty() => list
                .iter()
                .any(|c| c == channel || c.trim_start_matches('#') == channel.trim_start_matches('#')),
            _ => true,
        }
    }
}

/// Everything the credential store persists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceBook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub workspaces: BTreeMap<String, WorkspaceRecord>,
}
