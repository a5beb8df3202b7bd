use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use tabled::Tabled;

use crate::api::enrich::enrich_dm_users;
use crate::api::PagePolicy;
use crate::types::{format_ts, Conversation, Message};

use super::output::{listing_shape, print_info, Listing};
use super::utils::{one_line, truncate};
use super::Context;

#[derive(Args, Debug)]
pub struct ConversationsCommand {
    #[command(subcommand)]
    pub command: ConversationsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ConversationsSubcommand {
    /// List channels and direct messages
    List {
        /// Conversation types, comma-separated
        #[arg(short, long, default_value = "public_channel,private_channel,mpim,im")]
        types: String,

        /// Page size
        #[arg(short, long, default_value = "200")]
        limit: u32,

        /// Continue from a cursor returned by a previous call
        #[arg(long)]
        cursor: Option<String>,

        /// Fetch every page
        #[arg(short, long)]
        all: bool,

        /// Skip looking up the people behind direct messages
        #[arg(long)]
        no_enrich: bool,
    },

    /// Show messages of a conversation
    History {
        /// Channel id or #name
        channel: String,

        /// Page size
        #[arg(short, long, default_value = "50")]
        limit: u32,

        /// Continue from a cursor returned by a previous call
        #[arg(long)]
        cursor: Option<String>,

        /// Fetch every page
        #[arg(short, long)]
        all: bool,
    },

    /// Show a thread: the root message and its replies
    Replies {
        /// Channel id or #name
        channel: String,

        /// Timestamp of the thread root
        ts: String,

        /// Page size
        #[arg(short, long, default_value = "200")]
        limit: u32,

        /// Continue from a cursor returned by a previous call
        #[arg(long)]
        cursor: Option<String>,

        /// Fetch every page
        #[arg(short, long)]
        all: bool,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct ConversationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Members")]
    members: String,
    #[tabled(rename = "Topic")]
    topic: String,
}

#[derive(Debug, Serialize, Tabled)]
struct MessageRow {
    #[tabled(rename = "TS")]
    ts: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "Thread")]
    thread: String,
    #[tabled(rename = "Text")]
    text: String,
}

fn conversation_shape() -> Value {
    json!({
        "id": "string",
        "name": "string?",
        "is_im": "bool",
        "is_mpim": "bool",
        "is_private": "bool",
        "user": "string? (peer of a direct message)",
        "num_members": "number?",
        "dm_user": {
            "id": "string",
            "name": "string",
            "real_name": "string?",
            "display_name": "string?"
        },
        "...": "other remote fields, unchanged"
    })
}

pub fn message_shape() -> Value {
    json!({
        "ts": "string",
        "text": "string",
        "user": "string?",
        "thread_ts": "string?",
        "reply_count": "number?",
        "files": [{"id": "string", "name": "string?", "url_private": "string?"}],
        "...": "other remote fields, unchanged"
    })
}

pub fn shape(cmd: &ConversationsCommand) -> Value {
    match cmd.command {
        ConversationsSubcommand::List { .. } => listing_shape(conversation_shape()),
        ConversationsSubcommand::History { .. } | ConversationsSubcommand::Replies { .. } => {
            listing_shape(message_shape())
        }
    }
}

pub async fn execute(cmd: ConversationsCommand, ctx: &Context<'_>) -> Result<()> {
    match cmd.command {
        ConversationsSubcommand::List {
            types,
            limit,
            cursor,
            all,
            no_enrich,
        } => list(ctx, &types, limit, cursor, all, no_enrich).await,
        ConversationsSubcommand::History {
            channel,
            limit,
            cursor,
            all,
        } => history(ctx, &channel, limit, cursor, all).await,
        ConversationsSubcommand::Replies {
            channel,
            ts,
            limit,
            cursor,
            all,
        } => replies(ctx, &channel, &ts, limit, cursor, all).await,
    }
}

async fn list(
    ctx: &Context<'_>,
    types: &str,
    limit: u32,
    cursor: Option<String>,
    all: bool,
    no_enrich: bool,
) -> Result<()> {
    let (_, client) = ctx.client()?;
    let mut collected = client
        .list_conversations(types, limit, PagePolicy::from_all_flag(all), cursor)
        .await?;

    if !no_enrich {
        enrich_dm_users(&client, &mut collected.items).await;
    }

    let rows: Vec<ConversationRow> = collected.items.iter().map(conversation_row).collect();
    let has_more = collected.has_more();
    let listing = Listing::from(collected);

    ctx.output
        .list(&rows, &listing, &listing_shape(conversation_shape()))
        .await?;
    if has_more && ctx.output.is_human() {
        print_more_hint(listing.next_cursor.as_deref());
    }
    Ok(())
}

fn conversation_row(c: &Conversation) -> ConversationRow {
    ConversationRow {
        id: c.id.clone(),
        name: truncate(&c.display_name(), 30),
        kind: c.kind().to_string(),
        members: c.num_members.map(|n| n.to_string()).unwrap_or_default(),
        topic: truncate(&one_line(c.topic().unwrap_or_default()), 40),
    }
}

async fn history(
    ctx: &Context<'_>,
    channel: &str,
    limit: u32,
    cursor: Option<String>,
    all: bool,
) -> Result<()> {
    let (_, client) = ctx.client()?;
    let channel = client.resolve_channel(channel).await?;
    let collected = client
        .history(&channel, limit, PagePolicy::from_all_flag(all), cursor)
        .await?;
    emit_messages(ctx, collected.into()).await
}

async fn replies(
    ctx: &Context<'_>,
    channel: &str,
    ts: &str,
    limit: u32,
    cursor: Option<String>,
    all: bool,
) -> Result<()> {
    let (_, client) = ctx.client()?;
    let channel = client.resolve_channel(channel).await?;
    let collected = client
        .replies(&channel, ts, limit, PagePolicy::from_all_flag(all), cursor)
        .await?;
    emit_messages(ctx, collected.into()).await
}

async fn emit_messages(ctx: &Context<'_>, listing: Listing<Message>) -> Result<()> {
    let rows: Vec<MessageRow> = listing.items.iter().map(message_row).collect();
    ctx.output
        .list(&rows, &listing, &listing_shape(message_shape()))
        .await?;
    if listing.has_more && ctx.output.is_human() {
        print_more_hint(listing.next_cursor.as_deref());
    }
    Ok(())
}

fn message_row(m: &Message) -> MessageRow {
    let thread = match (&m.thread_ts, m.reply_count) {
        (Some(_), Some(n)) if n > 0 => format!("{} replies", n),
        (Some(root), _) if *root != m.ts => "reply".to_string(),
        _ => String::new(),
    };
    MessageRow {
        ts: m.ts.clone(),
        time: format_ts(&m.ts),
        from: truncate(m.author(), 20),
        thread,
        text: truncate(&one_line(&m.text), 60),
    }
}

pub(crate) fn print_more_hint(cursor: Option<&str>) {
    match cursor {
        Some(cursor) => print_info(&format!(
            "More results available: pass --all, or --cursor {}",
            cursor
        )),
        None => print_info("More results available: pass --all"),
    }
}
