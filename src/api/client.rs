use serde::de::DeserializeOwned;
use serde_json::Value;

use super::pagination::{self, walk, Collected, Page, PagePolicy};
use super::threads;
use super::transport::{for_workspace, RawResponse, RemoteOperation, Transport};
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::types::*;

/// Longest slice of a non-2xx body kept in the error message
const MAX_ERROR_BODY: usize = 200;

/// Team-chat Web API client bound to one workspace
pub struct ChatClient {
    transport: Box<dyn Transport>,
}

impl ChatClient {
    /// Create a client for a workspace, choosing the strategy from its credential
    pub fn new(record: &WorkspaceRecord, config: &Config) -> Result<Self> {
        Ok(Self::with_transport(for_workspace(record, &config.api)?))
    }

    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Run a remote operation and return its payload.
    ///
    /// Fails on any non-2xx status and on any envelope with `ok: false`,
    /// whatever the status. Nothing is retried.
    pub async fn execute(&self, operation: RemoteOperation) -> Result<Value> {
        tracing::debug!(
            operation = operation.name(),
            strategy = self.transport.strategy(),
            "calling remote"
        );
        let raw = self.transport.call(&operation).await?;
        check_envelope(operation.name(), raw)
    }

    async fn execute_as<T: DeserializeOwned>(&self, operation: RemoteOperation) -> Result<T> {
        let name = operation.name().to_string();
        let value = self.execute(operation).await?;
        serde_json::from_value(value).map_err(|e| {
            CliError::remote("invalid_response", format!("unexpected {} payload: {}", name, e))
        })
    }

    /// Identity of the credential (`auth.test`)
    pub async fn auth_test(&self) -> Result<Identity> {
        self.execute_as(RemoteOperation::new("auth.test")).await
    }

    /// One page of `conversations.list`
    pub async fn conversations_page(
        &self,
        types: &str,
        limit: u32,
        cursor: Option<String>,
    ) -> Result<Page<Conversation>> {
        let page: ConversationsPage = self
            .execute_as(
                RemoteOperation::new("conversations.list")
                    .param("types", types)
                    .param("limit", limit)
                    .param("exclude_archived", true)
                    .param_opt("cursor", cursor),
            )
            .await?;
        Ok(Page {
            items: page.channels,
            next_cursor: page.response_metadata.next_cursor,
        })
    }

    pub async fn list_conversations(
        &self,
        types: &str,
        limit: u32,
        policy: PagePolicy,
        start: Option<String>,
    ) -> Result<Collected<Conversation>> {
        walk(policy, start, |cursor| self.conversations_page(types, limit, cursor)).await
    }

    /// Turn `#name` or a bare name into a conversation id. Ids pass through.
    pub async fn resolve_channel(&self, channel: &str) -> Result<String> {
        if looks_like_id(channel) {
            return Ok(channel.to_string());
        }
        let name = channel.trim_start_matches('#');
        let all = self
            .list_conversations("public_channel,private_channel", 1000, PagePolicy::DrainAll, None)
            .await?;
        all.items
            .into_iter()
            .find(|c| c.name.as_deref() == Some(name))
            .map(|c| c.id)
            .ok_or_else(|| CliError::remote("channel_not_found", format!("no channel named #{}", name)))
    }

    async fn history_page(
        &self,
        channel: &str,
        limit: u32,
        cursor: Option<String>,
    ) -> Result<Page<Message>> {
        let page: HistoryPage = self
            .execute_as(
                RemoteOperation::new("conversations.history")
                    .param("channel", channel)
                    .param("limit", limit)
                    .param_opt("cursor", cursor),
            )
            .await?;
        Ok(Page {
            items: page.messages,
            next_cursor: page.response_metadata.next_cursor,
        })
    }

    /// Messages of a conversation, newest first as the remote returns them
    pub async fn history(
        &self,
        channel: &str,
        limit: u32,
        policy: PagePolicy,
        start: Option<String>,
    ) -> Result<Collected<Message>> {
        walk(policy, start, |cursor| self.history_page(channel, limit, cursor)).await
    }

    async fn replies_page(
        &self,
        channel: &str,
        ts: &str,
        limit: u32,
        cursor: Option<String>,
    ) -> Result<Page<Message>> {
        let page: HistoryPage = self
            .execute_as(
                RemoteOperation::new("conversations.replies")
                    .param("channel", channel)
                    .param("ts", ts)
                    .param("limit", limit)
                    .param_opt("cursor", cursor),
            )
            .await?;
        Ok(Page {
            items: page.messages,
            next_cursor: page.response_metadata.next_cursor,
        })
    }

    /// A thread: its root followed by the replies
    pub async fn replies(
        &self,
        channel: &str,
        ts: &str,
        limit: u32,
        policy: PagePolicy,
        start: Option<String>,
    ) -> Result<Collected<Message>> {
        walk(policy, start, |cursor| self.replies_page(channel, ts, limit, cursor)).await
    }

    async fn search_page(&self, query: &str, count: u32, cursor: Option<String>) -> Result<Page<SearchMatch>> {
        let page = pagination::page_from_cursor(cursor.as_deref());
        let response: SearchResponse = self
            .execute_as(
                RemoteOperation::new("search.messages")
                    .param("query", query)
                    .param("count", count)
                    .param("page", page),
            )
            .await?;
        let paging = response.messages.paging;
        Ok(Page {
            items: response.messages.matches,
            next_cursor: pagination::next_page_cursor(paging.page, paging.pages),
        })
    }

    /// Search messages, with thread linkage recovered from permalinks.
    ///
    /// Thread replies are included unless `top_level_only` is set.
    pub async fn search_messages(
        &self,
        query: &str,
        top_level_only: bool,
        count: u32,
        policy: PagePolicy,
        start: Option<String>,
    ) -> Result<Collected<SearchMatch>> {
        let query = threads::search_query(query, top_level_only);
        let mut collected = walk(policy, start, |cursor| self.search_page(&query, count, cursor)).await?;
        threads::reconstruct(&mut collected.items);
        Ok(collected)
    }

    pub async fn user_info(&self, user: &str) -> Result<User> {
        let info: UserInfo = self
            .execute_as(RemoteOperation::new("users.info").param("user", user))
            .await?;
        Ok(info.user)
    }

    async fn users_page(&self, limit: u32, cursor: Option<String>) -> Result<Page<User>> {
        let page: UsersPage = self
            .execute_as(
                RemoteOperation::new("users.list")
                    .param("limit", limit)
                    .param_opt("cursor", cursor),
            )
            .await?;
        Ok(Page {
            items: page.members,
            next_cursor: page.response_metadata.next_cursor,
        })
    }

    pub async fn list_users(
        &self,
        limit: u32,
        policy: PagePolicy,
        start: Option<String>,
    ) -> Result<Collected<User>> {
        walk(policy, start, |cursor| self.users_page(limit, cursor)).await
    }

    /// Post a message, optionally as a thread reply
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage> {
        self.execute_as(
            RemoteOperation::new("chat.postMessage")
                .param("channel", channel)
                .param("text", text)
                .param_opt("thread_ts", thread_ts),
        )
        .await
    }

    pub async fn file_info(&self, file: &str) -> Result<FileRef> {
        let info: FileInfo = self
            .execute_as(RemoteOperation::new("files.info").param("file", file))
            .await?;
        Ok(info.file)
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.transport.download(url).await
    }
}

/// Conversation ids are upper-case alphanumerics starting with C, D or G.
pub fn looks_like_id(channel: &str) -> bool {
    let mut chars = channel.chars();
    matches!(chars.next(), Some('C' | 'D' | 'G'))
        && channel.len() >= 9
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Turn a raw reply into a payload or an error
pub fn check_envelope(operation: &str, raw: RawResponse) -> Result<Value> {
    if !(200..300).contains(&raw.status) {
        let mut message: String = raw.body.chars().take(MAX_ERROR_BODY).collect();
        if let Some(retry_after) = &raw.retry_after {
            message = format!("retry after {}s; {}", retry_after, message);
        }
        return Err(CliError::remote(format!("http_{}", raw.status), message));
    }

    let value: Value = serde_json::from_str(&raw.body).map_err(|e| {
        CliError::remote("invalid_response", format!("{} returned non-JSON: {}", operation, e))
    })?;

    match value.get("ok").and_then(Value::as_bool) {
        Some(true) => {
            if let Some(warning) = value.get("warning").and_then(Value::as_str) {
                tracing::debug!(operation, warning, "remote warning");
            }
            Ok(value)
        }
        Some(false) => {
            let code = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            Err(CliError::from_envelope(code, operation))
        }
        None => Err(CliError::remote(
            "invalid_response",
            format!("{} returned no `ok` field", operation),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: body.to_string(),
            retry_after: None,
        }
    }

    #[test]
    fn test_ok_false_on_200_is_an_error() {
        let err = check_envelope("chat.postMessage", raw(200, r#"{"ok":false,"error":"not_found"}"#))
            .unwrap_err();
        assert_eq!(err.code(), Some("not_found"));
    }

    #[test]
    fn test_non_2xx_is_fatal_even_with_ok_true() {
        let err = check_envelope("auth.test", raw(500, r#"{"ok":true}"#)).unwrap_err();
        assert_eq!(err.code(), Some("http_500"));
    }

    #[test]
    fn test_rate_limit_reports_retry_after() {
        let mut response = raw(429, "");
        response.retry_after = Some("30".to_string());
        let err = check_envelope("search.messages", response).unwrap_err();
        assert_eq!(err.code(), Some("http_429"));
        assert!(err.to_string().contains("retry after 30s"));
    }

    #[test]
    fn test_auth_rejection_maps_to_auth_error() {
        let err = check_envelope("auth.test", raw(200, r#"{"ok":false,"error":"invalid_auth"}"#))
            .unwrap_err();
        assert!(matches!(err, CliError::Auth(_)));
    }

    #[test]
    fn test_unreadable_bodies() {
        let err = check_envelope("auth.test", raw(200, "<html>")).unwrap_err();
        assert_eq!(err.code(), Some("invalid_response"));

        let err = check_envelope("auth.test", raw(200, r#"{"team":"x"}"#)).unwrap_err();
        assert_eq!(err.code(), Some("invalid_response"));
    }

    #[test]
    fn test_ok_true_returns_payload() {
        let value = check_envelope("auth.test", raw(200, r#"{"ok":true,"team":"acme"}"#)).unwrap();
        assert_eq!(value["team"], "acme");
    }

    #[test]
    fn test_looks_like_id() {
        assert!(looks_like_id("C024BE91L"));
        assert!(looks_like_id("D0123456789"));
        assert!(!looks_like_id("general"));
        assert!(!looks_like_id("#general"));
        assert!(!looks_like_id("Cats"));
    }
}
