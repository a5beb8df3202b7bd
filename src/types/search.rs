use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Channel a search match was found in
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One hit of `search.messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    pub ts: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel: ChannelRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where a message sits relative to a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadKind {
    None,
    Root,
    Reply,
}

impl SearchMatch {
    pub fn thread_kind(&self) -> ThreadKind {
        match &self.thread_ts {
            None => ThreadKind::None,
            Some(thread_ts) if *thread_ts == self.ts => ThreadKind::Root,
            Some(_) => ThreadKind::Reply,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchMessages {
    #[serde(default)]
    pub matches: Vec<SearchMatch>,
    #[serde(default)]
    pub paging: Paging,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub messages: SearchMessages,
}

/// Search match as emitted, with its derived thread classification
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub matched: SearchMatch,
    pub thread_kind: ThreadKind,
}

impl From<SearchMatch> for SearchHit {
    fn from(matched: SearchMatch) -> Self {
        let thread_kind = matched.thread_kind();
        Self {
            matched,
            thread_kind,
        }
    }
}
