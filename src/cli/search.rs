use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::{json, Value};
use tabled::Tabled;

use crate::api::PagePolicy;
use crate::types::{format_ts, SearchHit, ThreadKind};

use super::output::{listing_shape, print_info, Listing};
use super::utils::{one_line, truncate};
use super::Context;

#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Search query (supports the remote's modifiers, e.g. in:#general from:@ada)
    pub query: String,

    /// Matches per page
    #[arg(short, long, default_value = "20")]
    pub count: u32,

    /// Page number to fetch
    #[arg(short, long)]
    pub page: Option<u32>,

    /// Fetch every page
    #[arg(short, long)]
    pub all: bool,

    /// Only top-level messages; do not ask the remote for thread replies
    #[arg(long)]
    pub top_level: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct SearchRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "Thread")]
    thread: String,
    #[tabled(rename = "Text")]
    text: String,
}

pub fn shape() -> Value {
    listing_shape(json!({
        "ts": "string",
        "text": "string",
        "channel": {"id": "string", "name": "string?"},
        "thread_ts": "string?",
        "permalink": "string?",
        "user": "string?",
        "username": "string?",
        "thread_kind": "none | root | reply",
        "...": "other remote fields, unchanged"
    }))
}

pub async fn execute(cmd: SearchCommand, ctx: &Context<'_>) -> Result<()> {
    let (_, client) = ctx.client()?;
    let start = cmd.page.map(|p| p.to_string());
    let collected = client
        .search_messages(
            &cmd.query,
            cmd.top_level,
            cmd.count,
            PagePolicy::from_all_flag(cmd.all),
            start,
        )
        .await?;

    let listing = Listing {
        has_more: collected.has_more(),
        next_cursor: collected.next_cursor,
        items: collected.items.into_iter().map(SearchHit::from).collect(),
    };

    if listing.items.is_empty() && ctx.output.is_human() {
        println!("No results found for '{}'", cmd.query);
        return Ok(());
    }

    let rows: Vec<SearchRow> = listing
        .items
        .iter()
        .map(|hit| {
            let m = &hit.matched;
            SearchRow {
                time: format_ts(&m.ts),
                channel: m
                    .channel
                    .name
                    .as_ref()
                    .map(|n| format!("#{}", n))
                    .unwrap_or_else(|| m.channel.id.clone()),
                from: m
                    .username
                    .clone()
                    .or_else(|| m.user.clone())
                    .unwrap_or_default(),
                thread: match hit.thread_kind {
                    ThreadKind::None => String::new(),
                    ThreadKind::Root => "root".to_string(),
                    ThreadKind::Reply => "reply".to_string(),
                },
                text: truncate(&one_line(&m.text), 60),
            }
        })
        .collect();

    ctx.output.list(&rows, &listing, &shape()).await?;
    if listing.has_more && ctx.output.is_human() {
        if let Some(page) = &listing.next_cursor {
            print_info(&format!("More results available: pass --all, or --page {}", page));
        }
    }
    Ok(())
}
