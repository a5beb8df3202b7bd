use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use tabled::Tabled;

use crate::api::PagePolicy;
use crate::types::User;

use super::conversations::print_more_hint;
use super::output::{listing_shape, Listing};
use super::utils::truncate;
use super::Context;

#[derive(Args, Debug)]
pub struct UsersCommand {
    #[command(subcommand)]
    pub command: UsersSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum UsersSubcommand {
    /// Show one member's profile
    Info {
        /// User id
        user: String,
    },

    /// List workspace members
    List {
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
struct UserRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Handle")]
    name: String,
    #[tabled(rename = "Name")]
    real_name: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Flags")]
    flags: String,
}

fn user_shape() -> Value {
    json!({
        "id": "string",
        "name": "string",
        "real_name": "string?",
        "deleted": "bool",
        "is_bot": "bool",
        "profile": {
            "real_name": "string?",
            "display_name": "string?",
            "email": "string?",
            "title": "string?"
        },
        "...": "other remote fields, unchanged"
    })
}

pub fn shape(cmd: &UsersCommand) -> Value {
    match cmd.command {
        UsersSubcommand::Info { .. } => user_shape(),
        UsersSubcommand::List { .. } => listing_shape(user_shape()),
    }
}

pub async fn execute(cmd: UsersCommand, ctx: &Context<'_>) -> Result<()> {
    match cmd.command {
        UsersSubcommand::Info { user } => info(ctx, &user).await,
        UsersSubcommand::List { limit, cursor, all } => list(ctx, limit, cursor, all).await,
    }
}

async fn info(ctx: &Context<'_>, user: &str) -> Result<()> {
    let (_, client) = ctx.client()?;
    let user = client.user_info(user).await?;

    if ctx.output.is_human() {
        ctx.output.list(&[user_row(&user)], &user, &user_shape()).await?;
        return Ok(());
    }
    ctx.output.single(&user, &user_shape()).await?;
    Ok(())
}

async fn list(ctx: &Context<'_>, limit: u32, cursor: Option<String>, all: bool) -> Result<()> {
    let (_, client) = ctx.client()?;
    let collected = client
        .list_users(limit, PagePolicy::from_all_flag(all), cursor)
        .await?;
    let listing = Listing::from(collected);

    let rows: Vec<UserRow> = listing.items.iter().map(user_row).collect();
    ctx.output
        .list(&rows, &listing, &listing_shape(user_shape()))
        .await?;
    if listing.has_more && ctx.output.is_human() {
        print_more_hint(listing.next_cursor.as_deref());
    }
    Ok(())
}

fn user_row(user: &User) -> UserRow {
    let summary = user.summary();
    let mut flags = Vec::new();
    if user.is_bot {
        flags.push("bot");
    }
    if user.deleted {
        flags.push("deactivated");
    }
    UserRow {
        id: user.id.clone(),
        name: user.name.clone(),
        real_name: truncate(summary.real_name.as_deref().unwrap_or_default(), 30),
        title: truncate(user.profile.title.as_deref().unwrap_or_default(), 30),
        flags: flags.join(","),
    }
}
