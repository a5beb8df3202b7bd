pub mod auth;
pub mod completions;
pub mod conversations;
pub mod files;
pub mod messages;
pub mod output;
pub mod search;
pub mod users;
pub mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

use crate::api::ChatClient;
use crate::config::Config;
use crate::store::CredentialStore;
use crate::types::WorkspaceRecord;
use output::Output;

/// Team-chat CLI for AI agents and terminal users
#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (defaults to output.default_format from config.toml)
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    /// Pipe JSON output through the filter program (jq) with this expression
    #[arg(long, global = true, value_name = "EXPR")]
    pub jq: Option<String>,

    /// Print the shape of the command's output instead of running it
    #[arg(long, global = true, conflicts_with = "jq")]
    pub schema: bool,

    /// Workspace to use: team id, name, or part of its URL
    #[arg(short, long, global = true, env = "HUDDLE_WORKSPACE")]
    pub workspace: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Workspace login and credential management
    Auth(auth::AuthCommand),

    /// Channels, direct messages, and their history
    Conversations(conversations::ConversationsCommand),

    /// Post messages
    Messages(messages::MessagesCommand),

    /// Search messages across the workspace
    Search(search::SearchCommand),

    /// Workspace members
    Users(users::UsersCommand),

    /// Shared files
    Files(files::FilesCommand),

    /// Generate shell completions
    Completions(completions::CompletionsCommand),
}

impl Commands {
    /// Shape descriptor of the command's output
    pub fn shape(&self) -> Value {
        match self {
            Commands::Auth(cmd) => auth::shape(cmd),
            Commands::Conversations(cmd) => conversations::shape(cmd),
            Commands::Messages(cmd) => messages::shape(cmd),
            Commands::Search(_) => search::shape(),
            Commands::Users(cmd) => users::shape(cmd),
            Commands::Files(_) => files::shape(),
            Commands::Completions(_) => Value::String("shell script".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output (best for AI agents)
    Json,
    /// Table output (best for humans)
    #[default]
    Table,
    /// Plain output (minimal, for scripting)
    Plain,
}

impl OutputFormat {
    /// Parse the configured default, falling back to a table
    pub fn from_config(value: &str) -> Self {
        <Self as ValueEnum>::from_str(value, true).unwrap_or_else(|_| {
            tracing::warn!("unknown output.default_format '{}', using table", value);
            Self::Table
        })
    }
}

/// Everything a command handler needs, built once per process
pub struct Context<'a> {
    pub config: &'a Config,
    pub store: &'a dyn CredentialStore,
    pub output: Output,
    pub workspace: Option<String>,
}

impl Context<'_> {
    /// The workspace selected by `--workspace` or the default
    pub fn workspace(&self) -> Result<WorkspaceRecord> {
        let book = self.store.load()?;
        Ok(book.resolve(self.workspace.as_deref())?.clone())
    }

    /// A client for the selected workspace
    pub fn client(&self) -> Result<(WorkspaceRecord, ChatClient)> {
        let record = self.workspace()?;
        let client = ChatClient::new(&record, self.config)?;
        tracing::debug!(workspace = %record.name, auth = record.credential.kind(), "using workspace");
        Ok((record, client))
    }
}
