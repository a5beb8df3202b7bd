use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use tabled::Tabled;

use crate::api::ChatClient;
use crate::error::CliError;

use super::output::{print_info, print_warning};
use super::Context;

const TEMP_DIR_PREFIX: &str = "huddle-files-";

#[derive(Args, Debug)]
pub struct FilesCommand {
    #[command(subcommand)]
    pub command: FilesSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum FilesSubcommand {
    /// Download shared files into a fresh temporary directory
    Download {
        /// File ids (F...)
        #[arg(required = true)]
        file_ids: Vec<String>,
    },
}

/// Outcome of one download batch
#[derive(Debug, Serialize)]
pub struct DownloadReport {
    pub directory: PathBuf,
    pub downloaded: Vec<Downloaded>,
    pub errors: Vec<DownloadError>,
}

#[derive(Debug, Serialize, Tabled)]
pub struct Downloaded {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Path")]
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadError {
    pub id: String,
    pub error: String,
}

pub fn shape() -> Value {
    json!({
        "directory": "string",
        "downloaded": [{"id": "string", "name": "string", "path": "string"}],
        "errors": [{"id": "string", "error": "string"}]
    })
}

pub async fn execute(cmd: FilesCommand, ctx: &Context<'_>) -> Result<()> {
    match cmd.command {
        FilesSubcommand::Download { file_ids } => download(ctx, &file_ids).await,
    }
}

async fn download(ctx: &Context<'_>, file_ids: &[String]) -> Result<()> {
    let (_, client) = ctx.client()?;
    let report = download_batch(&client, file_ids).await?;

    if ctx.output.is_human() {
        if !report.downloaded.is_empty() {
            ctx.output.list(&report.downloaded, &report, &shape()).await?;
        }
        for failure in &report.errors {
            print_warning(&format!("{}: {}", failure.id, failure.error));
        }
        print_info(&format!("Files saved in {}", report.directory.display()));
    } else {
        ctx.output.single(&report, &shape()).await?;
    }

    if report.downloaded.is_empty() {
        return Err(CliError::remote(
            "download_failed",
            format!("none of the {} files could be downloaded", file_ids.len()),
        )
        .into());
    }
    Ok(())
}

/// Fetch each file into a fresh directory, collecting per-file failures.
async fn download_batch(client: &ChatClient, file_ids: &[String]) -> Result<DownloadReport> {
    // Kept on disk after exit; the caller owns the files.
    let directory = tempfile::Builder::new()
        .prefix(TEMP_DIR_PREFIX)
        .tempdir()
        .context("Failed to create download directory")?
        .keep();

    let mut report = DownloadReport {
        directory,
        downloaded: Vec::new(),
        errors: Vec::new(),
    };

    for id in file_ids {
        match fetch_one(client, id, &report.directory).await {
            Ok(done) => {
                tracing::debug!(file = %id, path = %done.path, "downloaded");
                report.downloaded.push(done);
            }
            Err(e) => {
                tracing::debug!(file = %id, error = %e, "download failed");
                report.errors.push(DownloadError {
                    id: id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}

async fn fetch_one(client: &ChatClient, id: &str, directory: &Path) -> Result<Downloaded, CliError> {
    let file = client.file_info(id).await?;
    let url = file
        .download_url()
        .ok_or_else(|| CliError::remote("no_download_url", format!("file {} has no private URL", id)))?;
    let bytes = client.download(url).await?;

    let name = local_name(id, file.name.as_deref());
    let path = directory.join(&name);
    tokio::fs::write(&path, &bytes).await?;

    Ok(Downloaded {
        id: id.to_string(),
        name,
        path: path.display().to_string(),
    })
}

/// File name to write under the batch directory.
///
/// Only the final path component of the remote name is used; the id prefix
/// keeps two uploads with the same name apart.
fn local_name(id: &str, remote_name: Option<&str>) -> String {
    let base = remote_name
        .and_then(|n| Path::new(n).file_name())
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty());
    match base {
        Some(base) => format!("{}-{}", id, base),
        None => id.to_string(),
    }
}
