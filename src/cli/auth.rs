use std::io::{self, BufRead, IsTerminal, Read};

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use tabled::Tabled;

use crate::api::ChatClient;
use crate::auth::{parse_curl, CurlCredentials};
use crate::error::CliError;
use crate::types::{Identity, TokenRole, WorkspaceCredential, WorkspaceRecord};

use super::output::{print_info, print_success, print_warning};
use super::Context;

#[derive(Args, Debug)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthSubcommand {
    /// Add a workspace from an API token or a browser "Copy as cURL" capture
    Login {
        /// API token (xoxb- bot or xoxp- user token)
        #[arg(long, env = "HUDDLE_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Role of the token (inferred from its prefix when omitted)
        #[arg(long, value_enum, requires = "token")]
        role: Option<TokenRole>,

        /// Captured curl command, or '-' to read it from stdin
        #[arg(conflicts_with = "token")]
        curl: Option<String>,

        /// Read the curl command from the clipboard
        #[arg(long, conflicts_with_all = ["token", "curl"])]
        clipboard: bool,
    },

    /// Remove a workspace and its credentials
    #[command(alias = "remove")]
    Logout {
        /// Workspace to remove (defaults to --workspace or the default)
        workspace: Option<String>,
    },

    /// List configured workspaces
    List,

    /// Set the default workspace
    Default {
        /// Team id, name, or part of the URL
        workspace: String,
    },

    /// Check the credential against the remote
    Status,

    /// Restrict which channels `messages send` may post to
    Allow {
        /// Channel ids or names to allow
        channels: Vec<String>,

        /// Remove the restriction
        #[arg(long, conflicts_with = "channels")]
        clear: bool,
    },

    /// Show what would be extracted from a curl command, without saving
    ParseCurl {
        /// Captured curl command, or '-' to read it from stdin
        curl: Option<String>,

        /// Read the curl command from the clipboard
        #[arg(long, conflicts_with = "curl")]
        clipboard: bool,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct WorkspaceRow {
    #[tabled(rename = "Default")]
    default: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Auth")]
    auth: String,
    #[tabled(rename = "Posting")]
    posting: String,
}

/// Workspace as shown to users: never includes secrets
#[derive(Debug, Serialize)]
struct WorkspaceSummary {
    id: String,
    name: String,
    url: String,
    auth: String,
    default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_channels: Option<Vec<String>>,
}

impl WorkspaceSummary {
    fn new(record: &WorkspaceRecord, default: bool) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            url: record.url.clone(),
            auth: record.credential.kind().to_string(),
            default,
            allowed_channels: record.allowed_channels.clone(),
        }
    }
}

fn workspace_shape() -> Value {
    json!({
        "id": "string",
        "name": "string",
        "url": "string",
        "auth": "bot token | user token | browser session",
        "default": "bool",
        "allowed_channels": ["string"]
    })
}

pub fn shape(cmd: &AuthCommand) -> Value {
    match cmd.command {
        AuthSubcommand::Login { .. }
        | AuthSubcommand::Default { .. }
        | AuthSubcommand::Allow { .. } => workspace_shape(),
        AuthSubcommand::Logout { .. } => json!({"removed": "string"}),
        AuthSubcommand::List => json!([workspace_shape()]),
        AuthSubcommand::Status => status_shape(),
        AuthSubcommand::ParseCurl { .. } => curl_shape(),
    }
}

fn status_shape() -> Value {
    json!({
        "url": "string",
        "team": "string",
        "team_id": "string",
        "user": "string?",
        "user_id": "string?"
    })
}

fn curl_shape() -> Value {
    json!({
        "workspace_url": "string",
        "workspace_name": "string",
        "session_token": "string (masked)",
        "api_token": "string (masked)"
    })
}

pub async fn execute(cmd: AuthCommand, ctx: &Context<'_>) -> Result<()> {
    match cmd.command {
        AuthSubcommand::Login {
            token,
            role,
            curl,
            clipboard,
        } => login(ctx, token, role, curl, clipboard).await,
        AuthSubcommand::Logout { workspace } => logout(ctx, workspace).await,
        AuthSubcommand::List => list(ctx).await,
        AuthSubcommand::Default { workspace } => set_default(ctx, &workspace).await,
        AuthSubcommand::Status => status(ctx).await,
        AuthSubcommand::Allow { channels, clear } => allow(ctx, channels, clear).await,
        AuthSubcommand::ParseCurl { curl, clipboard } => parse_only(ctx, curl, clipboard).await,
    }
}

async fn login(
    ctx: &Context<'_>,
    token: Option<String>,
    role: Option<TokenRole>,
    curl: Option<String>,
    clipboard: bool,
) -> Result<()> {
    let (credential, curl_name) = match token {
        Some(token) => {
            let role = role.unwrap_or_else(|| TokenRole::infer(&token));
            (WorkspaceCredential::Token { token, role }, None)
        }
        None => {
            let text = read_curl_input(curl, clipboard)?;
            let CurlCredentials {
                workspace_url,
                workspace_name,
                session_token,
                api_token,
            } = parse_curl(&text)?;
            (
                WorkspaceCredential::Browser {
                    session_token,
                    api_token,
                    origin_url: workspace_url,
                },
                Some(workspace_name),
            )
        }
    };

    // Provisional record: the team id is only known after the identity check.
    let mut record = WorkspaceRecord {
        id: String::new(),
        name: String::new(),
        url: String::new(),
        user_id: None,
        credential,
        allowed_channels: None,
    };
    let client = ChatClient::new(&record, ctx.config)?;
    let identity = client
        .auth_test()
        .await
        .context("The remote rejected these credentials")?;

    record.id = identity.team_id.clone();
    record.name = curl_name.unwrap_or_else(|| workspace_name_from_url(&identity));
    record.url = identity.url.trim_end_matches('/').to_string();
    record.user_id = identity.user_id.clone();

    let mut book = ctx.store.load()?;
    if let Some(existing) = book.workspaces.get(&record.id) {
        record.allowed_channels = existing.allowed_channels.clone();
    }
    book.upsert(record.clone());
    ctx.store.save(&book)?;

    let is_default = book.default.as_deref() == Some(record.id.as_str());
    if ctx.output.is_human() {
        print_success(&format!(
            "Logged in to {} ({}) as {} using a {}",
            record.name,
            record.url,
            identity.user.as_deref().unwrap_or("unknown user"),
            record.credential.kind()
        ));
        if is_default {
            print_info("This is now the default workspace.");
        }
        Ok(())
    } else {
        ctx.output
            .single(&WorkspaceSummary::new(&record, is_default), &workspace_shape())
            .await?;
        Ok(())
    }
}

fn workspace_name_from_url(identity: &Identity) -> String {
    identity
        .url
        .trim_start_matches("https://")
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| identity.team.clone())
}

/// Curl text from the argument, stdin, the clipboard, or an interactive prompt
fn read_curl_input(arg: Option<String>, clipboard: bool) -> Result<String> {
    if clipboard {
        let mut board = arboard::Clipboard::new().context("Failed to open the clipboard")?;
        return board.get_text().context("Failed to read text from the clipboard");
    }

    match arg {
        Some(text) if text == "-" => read_stdin(),
        Some(text) => Ok(text),
        None if !io::stdin().is_terminal() => read_stdin(),
        None => {
            eprintln!("Paste the request copied with \"Copy as cURL\", then an empty line:");
            read_pasted(io::stdin().lock())
        }
    }
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read curl command from stdin")?;
    Ok(buffer)
}

/// Lines pasted into a terminal, up to the first blank line after content.
/// Leading blank lines are skipped; EOF ends input as well.
fn read_pasted(reader: impl BufRead) -> Result<String> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read from terminal")?;
        if line.trim().is_empty() {
            if lines.is_empty() {
                continue;
            }
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

async fn logout(ctx: &Context<'_>, workspace: Option<String>) -> Result<()> {
    let mut book = ctx.store.load()?;
    let reference = workspace.or_else(|| ctx.workspace.clone());
    let id = book.resolve(reference.as_deref())?.id.clone();
    let removed = book
        .remove(&id)
        .ok_or_else(|| CliError::Config(format!("unknown workspace: {}", id)))?;
    ctx.store.save(&book)?;

    if ctx.output.is_human() {
        print_success(&format!("Removed workspace {} ({})", removed.name, removed.id));
        if let Some(default) = book.default.as_ref().and_then(|id| book.workspaces.get(id)) {
            print_info(&format!("Default workspace is now {}", default.name));
        }
        Ok(())
    } else {
        ctx.output
            .single(&json!({"removed": removed.id}), &json!({"removed": "string"}))
            .await?;
        Ok(())
    }
}

async fn list(ctx: &Context<'_>) -> Result<()> {
    let book = ctx.store.load()?;
    if book.workspaces.is_empty() && ctx.output.is_human() {
        print_warning("No workspaces configured. Run 'huddle auth login' to add one.");
        return Ok(());
    }

    let is_default = |record: &WorkspaceRecord| book.default.as_deref() == Some(record.id.as_str());
    let rows: Vec<WorkspaceRow> = book
        .workspaces
        .values()
        .map(|w| WorkspaceRow {
            default: if is_default(w) { "*".to_string() } else { String::new() },
            name: w.name.clone(),
            id: w.id.clone(),
            url: w.url.clone(),
            auth: w.credential.kind().to_string(),
            posting: match &w.allowed_channels {
                Some(list) if !list.is_empty() => list.join(", "),
                _ => "any".to_string(),
            },
        })
        .collect();
    let summaries: Vec<WorkspaceSummary> = book
        .workspaces
        .values()
        .map(|w| WorkspaceSummary::new(w, is_default(w)))
        .collect();

    ctx.output
        .list(&rows, &summaries, &json!([workspace_shape()]))
        .await?;
    Ok(())
}

async fn set_default(ctx: &Context<'_>, reference: &str) -> Result<()> {
    let mut book = ctx.store.load()?;
    let record = book.resolve(Some(reference))?.clone();
    book.set_default(&record.id)?;
    ctx.store.save(&book)?;

    if ctx.output.is_human() {
        print_success(&format!("Default workspace set to {} ({})", record.name, record.id));
        Ok(())
    } else {
        ctx.output
            .single(&WorkspaceSummary::new(&record, true), &workspace_shape())
            .await?;
        Ok(())
    }
}

async fn status(ctx: &Context<'_>) -> Result<()> {
    let (record, client) = ctx.client()?;
    let identity = client.auth_test().await?;

    if ctx.output.is_human() {
        print_success(&format!("Authenticated to {} ({})", identity.team, identity.url));
        if let Some(user) = &identity.user {
            println!("  User: {}", user);
        }
        println!("  Auth: {}", record.credential.kind());
        Ok(())
    } else {
        ctx.output.single(&identity, &status_shape()).await?;
        Ok(())
    }
}

async fn allow(ctx: &Context<'_>, channels: Vec<String>, clear: bool) -> Result<()> {
    let mut book = ctx.store.load()?;
    let id = book.resolve(ctx.workspace.as_deref())?.id.clone();
    let record = book
        .workspaces
        .get_mut(&id)
        .ok_or_else(|| CliError::Config(format!("unknown workspace: {}", id)))?;

    if clear {
        record.allowed_channels = None;
    } else {
        let list = record.allowed_channels.get_or_insert_with(Vec::new);
        for channel in channels {
            if !list.contains(&channel) {
                list.push(channel);
            }
        }
    }
    let record = record.clone();
    let is_default = book.default.as_deref() == Some(id.as_str());
    ctx.store.save(&book)?;

    if ctx.output.is_human() {
        match &record.allowed_channels {
            Some(list) if !list.is_empty() => {
                print_success(&format!("{} may post to: {}", record.name, list.join(", ")))
            }
            _ => print_success(&format!("{} may post to any channel", record.name)),
        }
        Ok(())
    } else {
        ctx.output
            .single(&WorkspaceSummary::new(&record, is_default), &workspace_shape())
            .await?;
        Ok(())
    }
}

async fn parse_only(ctx: &Context<'_>, curl: Option<String>, clipboard: bool) -> Result<()> {
    let text = read_curl_input(curl, clipboard)?;
    let creds = parse_curl(&text)?;
    ctx.output.single(&creds.masked(), &curl_shape()).await?;
    Ok(())
}
