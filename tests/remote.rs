//! Access-layer tests against a local mock of the remote API.

use huddle::api::enrich::enrich_dm_users;
use huddle::api::transport::{BrowserTransport, TokenTransport};
use huddle::api::{ChatClient, PagePolicy};
use huddle::types::ThreadKind;
use huddle::CliError;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_client(server: &MockServer) -> ChatClient {
    ChatClient::with_transport(Box::new(TokenTransport::new(
        reqwest::Client::new(),
        &server.uri(),
        "xoxb-test",
    )))
}

fn ok(mut body: serde_json::Value) -> ResponseTemplate {
    body["ok"] = json!(true);
    ResponseTemplate::new(200).set_body_json(body)
}

#[tokio::test]
async fn test_ok_false_on_200_is_a_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/conversations.history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "not_found"})))
        .expect(1)
        .mount(&server)
        .await;

    let err = token_client(&server)
        .history("C0123456789", 10, PagePolicy::SinglePage, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("not_found"));
}

#[tokio::test]
async fn test_token_strategy_sends_bearer_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth.test"))
        .and(header("authorization", "Bearer xoxb-test"))
        .respond_with(ok(json!({
            "url": "https://acme.example.com/",
            "team": "Acme",
            "team_id": "T1",
            "user_id": "U9"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let identity = token_client(&server).auth_test().await.unwrap();
    assert_eq!(identity.team_id, "T1");
    assert_eq!(identity.user_id.as_deref(), Some("U9"));
}

#[tokio::test]
async fn test_browser_strategy_sends_cookie_and_token_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth.test"))
        .and(header("cookie", "d=xoxd-AAA"))
        .and(body_string_contains("token=xoxc-BBB"))
        .respond_with(ok(json!({"url": "https://acme.example.com/", "team": "Acme", "team_id": "T1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::with_transport(Box::new(BrowserTransport::new(
        reqwest::Client::new(),
        &server.uri(),
        "xoxd-AAA",
        "xoxc-BBB",
        "huddle-test",
    )));
    let identity = client.auth_test().await.unwrap();
    assert_eq!(identity.team, "Acme");
}

#[tokio::test]
async fn test_rejected_credential_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "invalid_auth"})))
        .mount(&server)
        .await;

    let err = token_client(&server).auth_test().await.unwrap_err();
    assert!(matches!(err, CliError::Auth(_)));
}

#[tokio::test]
async fn test_server_error_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users.info"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let err = token_client(&server).user_info("U1").await.unwrap_err();
    assert_eq!(err.code(), Some("http_503"));
}

#[tokio::test]
async fn test_drain_all_follows_cursors_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users.list"))
        .and(body_string_contains("cursor=page2"))
        .respond_with(ok(json!({
            "members": [{"id": "U3", "name": "carol"}],
            "response_metadata": {"next_cursor": ""}
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users.list"))
        .respond_with(ok(json!({
            "members": [{"id": "U1", "name": "ada"}, {"id": "U2", "name": "bob"}],
            "response_metadata": {"next_cursor": "page2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = token_client(&server);
    let all = client.list_users(2, PagePolicy::DrainAll, None).await.unwrap();
    let ids: Vec<&str> = all.items.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, ["U1", "U2", "U3"]);
    assert!(!all.has_more());
}

#[tokio::test]
async fn test_single_page_reports_more() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users.list"))
        .respond_with(ok(json!({
            "members": [{"id": "U1", "name": "ada"}],
            "response_metadata": {"next_cursor": "page2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = token_client(&server)
        .list_users(1, PagePolicy::SinglePage, None)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(page.has_more());
    assert_eq!(page.next_cursor.as_deref(), Some("page2"));
}

#[tokio::test]
async fn test_search_includes_replies_and_recovers_threads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search.messages"))
        .and(body_string_contains("query=deploy+is%3Athread"))
        .respond_with(ok(json!({
            "messages": {
                "matches": [
                    {
                        "ts": "1700000100.000200",
                        "text": "deploy done",
                        "channel": {"id": "C1", "name": "ops"},
                        "permalink": "https://acme.example.com/archives/C1/p1700000100000200?thread_ts=1700000000.000100&cid=C1"
                    },
                    {
                        "ts": "1700000000.000100",
                        "text": "deploy starting",
                        "channel": {"id": "C1", "name": "ops"},
                        "thread_ts": "1700000000.000100"
                    },
                    {
                        "ts": "1700000200.000300",
                        "text": "deploy notes",
                        "channel": {"id": "C2"},
                        "permalink": "https://acme.example.com/archives/C2/p1700000200000300"
                    }
                ],
                "paging": {"page": 1, "pages": 1, "total": 3}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = token_client(&server)
        .search_messages("deploy", false, 20, PagePolicy::SinglePage, None)
        .await
        .unwrap();
    let kinds: Vec<ThreadKind> = found.items.iter().map(|m| m.thread_kind()).collect();
    assert_eq!(kinds, [ThreadKind::Reply, ThreadKind::Root, ThreadKind::None]);
    assert_eq!(found.items[0].thread_ts.as_deref(), Some("1700000000.000100"));
    assert!(!found.has_more());
}

#[tokio::test]
async fn test_top_level_search_leaves_query_alone() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/search.messages"))
        .and(body_string_contains("query=deploy&"))
        .respond_with(ok(json!({
            "messages": {"matches": [], "paging": {"page": 1, "pages": 0, "total": 0}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = token_client(&server)
        .search_messages("deploy", true, 20, PagePolicy::SinglePage, None)
        .await
        .unwrap();
    assert!(found.items.is_empty());
}

#[tokio::test]
async fn test_only_direct_messages_are_enriched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/conversations.list"))
        .respond_with(ok(json!({
            "channels": [
                {"id": "C1", "name": "general", "is_im": false, "num_members": 12},
                {"id": "D1", "is_im": true, "user": "U1"},
                {"id": "G1", "name": "mpdm-ada--bob", "is_mpim": true}
            ],
            "response_metadata": {"next_cursor": ""}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users.info"))
        .and(body_string_contains("user=U1"))
        .respond_with(ok(json!({
            "user": {
                "id": "U1",
                "name": "ada",
                "profile": {"real_name": "Ada Lovelace", "display_name": "ada"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = token_client(&server);
    let mut listed = client
        .list_conversations("public_channel,mpim,im", 100, PagePolicy::SinglePage, None)
        .await
        .unwrap();
    enrich_dm_users(&client, &mut listed.items).await;

    let dm = listed.items.iter().find(|c| c.id == "D1").unwrap();
    let peer = dm.dm_user.as_ref().unwrap();
    assert_eq!(peer.real_name.as_deref(), Some("Ada Lovelace"));
    assert!(listed
        .items
        .iter()
        .filter(|c| c.id != "D1")
        .all(|c| c.dm_user.is_none()));
}

#[tokio::test]
async fn test_failed_profile_lookup_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/conversations.list"))
        .respond_with(ok(json!({
            "channels": [
                {"id": "D1", "is_im": true, "user": "U1"},
                {"id": "D2", "is_im": true, "user": "U2"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users.info"))
        .and(body_string_contains("user=U1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "user_not_found"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users.info"))
        .and(body_string_contains("user=U2"))
        .respond_with(ok(json!({"user": {"id": "U2", "name": "bob"}})))
        .mount(&server)
        .await;

    let client = token_client(&server);
    let mut listed = client
        .list_conversations("im", 100, PagePolicy::SinglePage, None)
        .await
        .unwrap();
    enrich_dm_users(&client, &mut listed.items).await;

    assert!(listed.items[0].dm_user.is_none());
    assert_eq!(listed.items[1].dm_user.as_ref().map(|u| u.name.as_str()), Some("bob"));
}

#[tokio::test]
async fn test_post_message_to_thread() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat.postMessage"))
        .and(body_string_contains("channel=C0123456789"))
        .and(body_string_contains("thread_ts=1700000000.000100"))
        .respond_with(ok(json!({"channel": "C0123456789", "ts": "1700000300.000400"})))
        .expect(1)
        .mount(&server)
        .await;

    let posted = token_client(&server)
        .post_message("C0123456789", "on it", Some("1700000000.000100"))
        .await
        .unwrap();
    assert_eq!(posted.ts, "1700000300.000400");
}

#[tokio::test]
async fn test_download_uses_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files-pri/T1-F1/report.txt"))
        .and(header("authorization", "Bearer xoxb-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("quarterly numbers"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/files-pri/T1-F1/report.txt", server.uri());
    let bytes = token_client(&server).download(&url).await.unwrap();
    assert_eq!(bytes, b"quarterly numbers");
}
