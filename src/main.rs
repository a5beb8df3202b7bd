use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use huddle::cli::output::{print_error, Output};
use huddle::cli::{self, Cli, Commands, Context};
use huddle::config::Config;
use huddle::error::CliError;
use huddle::store::FileStore;

#[tokio::main]
async fn main() {
    // Logs go to stderr so structured stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(err) = run(Cli::parse()).await {
        print_error(&format!("{:#}", err));
        if let Some(CliError::Filter {
            shape: Some(shape), ..
        }) = err.downcast_ref::<CliError>()
        {
            if let Ok(shape) = serde_json::to_string_pretty(shape) {
                eprintln!("Expected data shape:\n{}", shape);
            }
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    if !config.output.color {
        colored::control::set_override(false);
    }

    let output = Output::resolve(cli.format, cli.jq, cli.schema, &config.output)?;
    if output.is_shape() {
        output.shape(&cli.command.shape())?;
        return Ok(());
    }

    let store = FileStore::new()?;
    let ctx = Context {
        config: &config,
        store: &store,
        output,
        workspace: cli.workspace,
    };

    match cli.command {
        Commands::Auth(cmd) => cli::auth::execute(cmd, &ctx).await,
        Commands::Conversations(cmd) => cli::conversations::execute(cmd, &ctx).await,
        Commands::Messages(cmd) => cli::messages::execute(cmd, &ctx).await,
        Commands::Search(cmd) => cli::search::execute(cmd, &ctx).await,
        Commands::Users(cmd) => cli::users::execute(cmd, &ctx).await,
        Commands::Files(cmd) => cli::files::execute(cmd, &ctx).await,
        Commands::Completions(cmd) => cli::completions::execute(cmd),
    }
}
