//! Credentials from a browser's "Copy as cURL" output.
//!
//! The copied command carries the workspace URL, the `d` session cookie and
//! the web client token (as a form field or inside a multipart body). Pieces
//! are matched independently, so their order in the text does not matter.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{CliError, Result};

const SESSION_PREFIX: &str = "xoxd-";
const API_TOKEN_PREFIX: &str = "xoxc-";

/// Everything needed to build a browser-session workspace
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CurlCredentials {
    pub workspace_url: String,
    pub workspace_name: String,
    pub session_token: String,
    pub api_token: String,
}

impl std::fmt::Debug for CurlCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurlCredentials")
            .field("workspace_url", &self.workspace_url)
            .field("workspace_name", &self.workspace_name)
            .field("session_token", &mask(&self.session_token))
            .field("api_token", &mask(&self.api_token))
            .finish()
    }
}

impl CurlCredentials {
    /// Copy safe to print
    pub fn masked(&self) -> Self {
        Self {
            workspace_url: self.workspace_url.clone(),
            workspace_name: self.workspace_name.clone(),
            session_token: mask(&self.session_token),
            api_token: mask(&self.api_token),
        }
    }
}

/// Keep the prefix and the last four characters
pub fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

struct Patterns {
    url: Regex,
    cookie: Regex,
    token_field: Regex,
    bare_token: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        url: Regex::new(r"https://([A-Za-z0-9][A-Za-z0-9-]*)\.([A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+)")
            .expect("valid url pattern"),
        cookie: Regex::new(r#"(?:^|[\s;'"])d=([^;'"\s]+)"#).expect("valid cookie pattern"),
        token_field: Regex::new(r#"(?:^|[\s&?'"])token=([^&'"\s]+)"#).expect("valid token pattern"),
        bare_token: Regex::new(r"xoxc-[A-Za-z0-9-]+").expect("valid bare token pattern"),
    })
}

/// Cheap check that the text is a curl command at all
pub fn looks_like_curl(text: &str) -> bool {
    matches!(
        text.split_whitespace().next(),
        Some("curl") | Some("curl.exe")
    )
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Extract workspace URL, session token and API token from curl text
pub fn parse_curl(text: &str) -> Result<CurlCredentials> {
    if !looks_like_curl(text) {
        return Err(CliError::NotCurl);
    }
    let p = patterns();

    let caps = p
        .url
        .captures(text)
        .ok_or_else(|| CliError::Parse("no https://<workspace>.<host> URL found".to_string()))?;
    let workspace_name = caps[1].to_lowercase();
    let workspace_url = format!("https://{}.{}", workspace_name, caps[2].to_lowercase());

    let session_token = p
        .cookie
        .captures_iter(text)
        .map(|c| decode(&c[1]))
        .find(|v| v.starts_with(SESSION_PREFIX))
        .ok_or_else(|| {
            CliError::Parse(format!("no `d` cookie with an {} session token found", SESSION_PREFIX))
        })?;

    let api_token = p
        .token_field
        .captures_iter(text)
        .map(|c| decode(&c[1]))
        .find(|v| v.starts_with(API_TOKEN_PREFIX))
        .or_else(|| p.bare_token.find(text).map(|m| m.as_str().to_string()))
        .ok_or_else(|| CliError::Parse(format!("no {} API token found", API_TOKEN_PREFIX)))?;

    Ok(CurlCredentials {
        workspace_url,
        workspace_name,
        session_token,
        api_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_cookie_header_and_form_field() {
        let text = "curl 'https://acme.example.com/api/x' -H 'Cookie: d=xoxd-AAA' --data-raw 'token=xoxc-BBB'";
        let creds = parse_curl(text).unwrap();

        assert_eq!(
            creds,
            CurlCredentials {
                workspace_url: "https://acme.example.com".to_string(),
                workspace_name: "acme".to_string(),
                session_token: "xoxd-AAA".to_string(),
                api_token: "xoxc-BBB".to_string(),
            }
        );
    }

    #[test]
    fn test_order_independent_and_url_decoded() {
        let text = concat!(
            "curl -X POST --data-raw 'channel=C1&token=xoxc-111-222-abc&limit=10' \\\n",
            "  -H 'cookie: b=123; d=xoxd-abc%2Fdef%3D%3D; d-s=1700000000; lc=1' \\\n",
            "  'https://Globex.example.org/api/conversations.history'"
        );
        let creds = parse_curl(text).unwrap();

        assert_eq!(creds.workspace_url, "https://globex.example.org");
        assert_eq!(creds.workspace_name, "globex");
        assert_eq!(creds.session_token, "xoxd-abc/def==");
        assert_eq!(creds.api_token, "xoxc-111-222-abc");
    }

    #[test]
    fn test_multipart_body_uses_bare_token() {
        let text = concat!(
            "curl 'https://acme.example.com/api/client.counts' -b 'd=xoxd-AAA' ",
            r#"--data-raw $'------Boundary\r\nContent-Disposition: form-data; name="token"\r\n\r\nxoxc-999-888\r\n------Boundary--\r\n'"#
        );
        let creds = parse_curl(text).unwrap();
        assert_eq!(creds.api_token, "xoxc-999-888");
    }

    #[test]
    fn test_not_curl_is_rejected_early() {
        let err = parse_curl("d=xoxd-AAA token=xoxc-BBB https://acme.example.com").unwrap_err();
        assert!(matches!(err, CliError::NotCurl));

        assert!(matches!(parse_curl("   "), Err(CliError::NotCurl)));
    }

    #[test]
    fn test_missing_pieces_are_named() {
        let err = parse_curl("curl 'https://acme.example.com/api/x' --data 'token=xoxc-BBB'").unwrap_err();
        assert!(matches!(err, CliError::Parse(ref m) if m.contains("cookie")));

        let err = parse_curl("curl 'https://acme.example.com/api/x' -H 'Cookie: d=xoxd-AAA'").unwrap_err();
        assert!(matches!(err, CliError::Parse(ref m) if m.contains("API token")));

        let err = parse_curl("curl 'http://localhost/api/x' -H 'Cookie: d=xoxd-AAA' --data 'token=xoxc-B'")
            .unwrap_err();
        assert!(matches!(err, CliError::Parse(ref m) if m.contains("URL")));
    }

    #[test]
    fn test_cookie_must_carry_session_prefix() {
        let text = "curl 'https://acme.example.com/api/x' -H 'Cookie: d=garbage' --data 'token=xoxc-B'";
        assert!(matches!(parse_curl(text), Err(CliError::Parse(_))));
    }

    #[test]
    fn test_mask_hides_secret() {
        assert_eq!(mask("xoxc-1234567890-abcd"), "xoxc-…abcd");
        assert_eq!(mask("short"), "*****");

        let creds = parse_curl("curl https://acme.example.com/x -H 'Cookie: d=xoxd-0123456789abcdef' -d 'token=xoxc-0123456789wxyz'")
            .unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("0123456789abcdef"));
        assert_eq!(creds.masked().api_token, "xoxc-…wxyz");
    }
}
