//! Thread linkage for search results.
//!
//! `search.messages` often leaves `thread_ts` empty on matches, but the
//! permalink of a threaded message carries it as a query parameter.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::SearchMatch;

/// Search modifier that makes the remote include thread replies
pub const THREAD_MODIFIER: &str = "is:thread";

fn thread_ts_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[?&]thread_ts=([0-9.]+)").expect("valid thread_ts pattern"))
}

/// `thread_ts` carried in a permalink's query string, if any
pub fn thread_ts_from_permalink(permalink: &str) -> Option<&str> {
    thread_ts_pattern()
        .captures(permalink)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Fill in `thread_ts` from the permalink where the remote left it out.
///
/// Best effort: a match without permalink, or whose permalink has no
/// `thread_ts`, stays unthreaded.
pub fn reconstruct(matches: &mut [SearchMatch]) {
    for m in matches.iter_mut().filter(|m| m.thread_ts.is_none()) {
        let Some(permalink) = m.permalink.as_deref() else {
            continue;
        };
        match thread_ts_from_permalink(permalink) {
            Some(thread_ts) => m.thread_ts = Some(thread_ts.to_string()),
            None => tracing::debug!(ts = %m.ts, "permalink carries no thread_ts"),
        }
    }
}

/// Query sent to the remote. Unless only top-level messages are wanted, the
/// thread modifier is appended so replies are returned as well.
pub fn search_query(query: &str, top_level_only: bool) -> String {
    let has_modifier = query
        .split_whitespace()
        .any(|w| w.eq_ignore_ascii_case(THREAD_MODIFIER));
    if top_level_only || has_modifier {
        query.to_string()
    } else {
        format!("{} {}", query.trim_end(), THREAD_MODIFIER)
    }
}
