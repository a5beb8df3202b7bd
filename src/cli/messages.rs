use std::io::{self, Read};

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use serde_json::{json, Value};

use crate::api::looks_like_id;
use crate::error::CliError;
use crate::types::WorkspaceRecord;

use super::output::print_success;
use super::Context;

#[derive(Args, Debug)]
pub struct MessagesCommand {
    #[command(subcommand)]
    pub command: MessagesSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum MessagesSubcommand {
    /// Post a message to a conversation
    Send {
        /// Channel id or #name
        channel: String,

        /// Message text
        text: Option<String>,

        /// Read message text from stdin
        #[arg(short, long, conflicts_with = "text")]
        stdin: bool,

        /// Reply in the thread rooted at this timestamp
        #[arg(short, long)]
        thread: Option<String>,
    },
}

pub fn shape(cmd: &MessagesCommand) -> Value {
    match cmd.command {
        MessagesSubcommand::Send { .. } => json!({"channel": "string", "ts": "string"}),
    }
}

pub async fn execute(cmd: MessagesCommand, ctx: &Context<'_>) -> Result<()> {
    match cmd.command {
        MessagesSubcommand::Send {
            channel,
            text,
            stdin,
            thread,
        } => send(ctx, &channel, text, stdin, thread.as_deref()).await,
    }
}

async fn send(
    ctx: &Context<'_>,
    channel: &str,
    text: Option<String>,
    stdin: bool,
    thread: Option<&str>,
) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None if stdin => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read message from stdin")?;
            buffer.trim().to_string()
        }
        None => {
            return Err(CliError::Config(
                "no message provided; pass it as an argument or use --stdin".to_string(),
            )
            .into())
        }
    };
    if text.is_empty() {
        return Err(CliError::Config("message cannot be empty".to_string()).into());
    }

    // A name outside the allow-list is rejected before anything goes over
    // the network, unless the list holds ids the name might resolve to.
    let (record, client) = ctx.client()?;
    let channel_id = if record.may_post_to(channel) {
        client.resolve_channel(channel).await?
    } else if !looks_like_id(channel) && lists_ids(&record) {
        let id = client.resolve_channel(channel).await?;
        if !record.may_post_to(&id) {
            return Err(not_allowed(&record, channel));
        }
        id
    } else {
        return Err(not_allowed(&record, channel));
    };

    let posted = client.post_message(&channel_id, &text, thread).await?;
    tracing::info!(channel = %posted.channel, ts = %posted.ts, "message posted");

    if ctx.output.is_human() {
        print_success(&format!("Message sent to {} (ts {})", channel, posted.ts));
        Ok(())
    } else {
        ctx.output
            .single(&posted, &json!({"channel": "string", "ts": "string"}))
            .await?;
        Ok(())
    }
}

fn lists_ids(record: &WorkspaceRecord) -> bool {
    record
        .allowed_channels
        .iter()
        .flatten()
        .any(|c| looks_like_id(c))
}

fn not_allowed(record: &WorkspaceRecord, channel: &str) -> anyhow::Error {
    CliError::Config(format!(
        "workspace {} is not allowed to post to {}; see `huddle auth allow`",
        record.name, channel
    ))
    .into()
}
