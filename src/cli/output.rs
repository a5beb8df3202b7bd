use std::io::{ErrorKind, Write};
use std::process::Stdio;

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::OutputFormat;
use crate::api::Collected;
use crate::config::OutputConfig;
use crate::error::{CliError, Result};

/// What a command writes to stdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Json,
    Table,
    Plain,
    /// JSON piped through the filter program with this expression
    Filter(String),
    /// Shape of the output, without running the command
    Shape,
}

/// Resolved output settings for one invocation
#[derive(Debug, Clone)]
pub struct Output {
    mode: OutputMode,
    filter_program: String,
}

/// A page or a full walk, as emitted in structured modes
#[derive(Debug, Serialize)]
pub struct Listing<T: Serialize> {
    pub items: Vec<T>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T: Serialize> From<Collected<T>> for Listing<T> {
    fn from(collected: Collected<T>) -> Self {
        Self {
            has_more: collected.has_more(),
            next_cursor: collected.next_cursor,
            items: collected.items,
        }
    }
}

/// Shape of a `Listing` whose items look like `item`
pub fn listing_shape(item: Value) -> Value {
    serde_json::json!({
        "items": [item],
        "has_more": "bool",
        "next_cursor": "string?"
    })
}

impl Output {
    /// Pick exactly one output mode.
    ///
    /// A filter needs JSON: combining it with an explicit human-readable
    /// format is rejected here, before any network call.
    pub fn resolve(
        format: Option<OutputFormat>,
        filter: Option<String>,
        schema: bool,
        config: &OutputConfig,
    ) -> Result<Self> {
        let mode = match (schema, filter, format) {
            (true, Some(_), _) => {
                return Err(CliError::Filter {
                    message: "--jq cannot be combined with --schema".to_string(),
                    shape: None,
                })
            }
            (true, None, _) => OutputMode::Shape,
            (false, Some(_), Some(OutputFormat::Table | OutputFormat::Plain)) => {
                return Err(CliError::Filter {
                    message: "--jq needs JSON output; drop --format or use --format json".to_string(),
                    shape: None,
                })
            }
            (false, Some(expr), _) => OutputMode::Filter(expr),
            (false, None, Some(format)) => format.into(),
            (false, None, None) => OutputFormat::from_config(&config.default_format).into(),
        };
        Ok(Self {
            mode,
            filter_program: config.filter_program.clone(),
        })
    }

    #[cfg(test)]
    fn mode(&self) -> &OutputMode {
        &self.mode
    }

    pub fn is_shape(&self) -> bool {
        self.mode == OutputMode::Shape
    }

    pub fn is_human(&self) -> bool {
        matches!(self.mode, OutputMode::Table | OutputMode::Plain)
    }

    /// Print the shape descriptor for a command
    pub fn shape(&self, shape: &Value) -> Result<()> {
        print_json(shape)
    }

    /// Emit a list: rows in human modes, `data` in structured modes
    pub async fn list<R, D>(&self, rows: &[R], data: &D, shape: &Value) -> Result<()>
    where
        R: Serialize + Tabled,
        D: Serialize,
    {
        match &self.mode {
            OutputMode::Table => {
                println!("{}", Table::new(rows));
                Ok(())
            }
            OutputMode::Plain => print_plain(rows),
            _ => self.structured(data, shape).await,
        }
    }

    /// Emit a single item. Human modes fall back to pretty JSON.
    pub async fn single<D: Serialize>(&self, data: &D, shape: &Value) -> Result<()> {
        match &self.mode {
            OutputMode::Table | OutputMode::Plain => print_json(data),
            _ => self.structured(data, shape).await,
        }
    }

    async fn structured<D: Serialize>(&self, data: &D, shape: &Value) -> Result<()> {
        match &self.mode {
            OutputMode::Filter(expr) => {
                let filtered = run_filter(&self.filter_program, expr, data, shape).await?;
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&filtered)?;
                stdout.flush()?;
                Ok(())
            }
            OutputMode::Shape => self.shape(shape),
            _ => print_json(data),
        }
    }
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Self::Json,
            OutputFormat::Table => Self::Table,
            OutputFormat::Plain => Self::Plain,
        }
    }
}

fn print_json<T: Serialize + ?Sized>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(std::io::Error::from)?;
    println!("{}", json);
    Ok(())
}

fn print_plain<T: Serialize>(rows: &[T]) -> Result<()> {
    // One line per row, values joined with '|'
    let json = serde_json::to_value(rows).map_err(std::io::Error::from)?;
    if let Some(arr) = json.as_array() {
        for item in arr {
            if let Some(obj) = item.as_object() {
                let values: Vec<String> = obj
                    .values()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        Value::Null => "".to_string(),
                        other => other.to_string(),
                    })
                    .collect();
                println!("{}", values.join("|"));
            }
        }
    }
    Ok(())
}

/// Run `program expr` with `data` as JSON on stdin and return its stdout.
pub async fn run_filter<D: Serialize + ?Sized>(
    program: &str,
    expr: &str,
    data: &D,
    shape: &Value,
) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(data).map_err(std::io::Error::from)?;

    let mut child = match Command::new(program)
        .arg(expr)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(CliError::Filter {
                message: format!("filter program '{}' not found; install it or set output.filter_program", program),
                shape: Some(shape.clone()),
            })
        }
        Err(e) => return Err(e.into()),
    };

    // Feed stdin concurrently so a chatty filter cannot fill its stdout pipe and stall.
    let stdin = child.stdin.take();
    let writer = tokio::spawn(async move {
        if let Some(mut stdin) = stdin {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let output = child.wait_with_output().await?;
    match writer.await {
        Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => return Err(e.into()),
        _ => {}
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{} exited with {}", program, output.status)
        } else {
            stderr
        };
        return Err(CliError::Filter {
            message,
            shape: Some(shape.clone()),
        });
    }

    Ok(output.stdout)
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> OutputConfig {
        OutputConfig::default()
    }

    #[test]
    fn test_filter_with_table_is_rejected() {
        let err = Output::resolve(Some(OutputFormat::Table), Some(".".to_string()), false, &config())
            .unwrap_err();
        assert!(matches!(err, CliError::Filter { shape: None, .. }));

        let err = Output::resolve(Some(OutputFormat::Plain), Some(".".to_string()), false, &config())
            .unwrap_err();
        assert!(matches!(err, CliError::Filter { .. }));
    }

    #[test]
    fn test_filter_overrides_configured_table_default() {
        let out = Output::resolve(None, Some(".items".to_string()), false, &config()).unwrap();
        assert_eq!(out.mode(), &OutputMode::Filter(".items".to_string()));

        let out = Output::resolve(Some(OutputFormat::Json), Some(".".to_string()), false, &config())
            .unwrap();
        assert!(matches!(out.mode(), OutputMode::Filter(_)));
    }

    #[test]
    fn test_schema_mode() {
        let out = Output::resolve(Some(OutputFormat::Table), None, true, &config()).unwrap();
        assert!(out.is_shape());
        assert!(!out.is_human());

        assert!(Output::resolve(None, Some(".".to_string()), true, &config()).is_err());
    }

    #[test]
    fn test_default_format_from_config() {
        let out = Output::resolve(None, None, false, &config()).unwrap();
        assert_eq!(out.mode(), &OutputMode::Table);

        let mut json_default = config();
        json_default.default_format = "json".to_string();
        let out = Output::resolve(None, None, false, &json_default).unwrap();
        assert_eq!(out.mode(), &OutputMode::Json);
    }

    #[tokio::test]
    async fn test_missing_filter_program_reports_shape() {
        let shape = json!({"items": [{"id": "string"}]});
        let err = run_filter("huddle-no-such-filter-program", ".", &json!({}), &shape)
            .await
            .unwrap_err();
        match err {
            CliError::Filter { message, shape: Some(s) } => {
                assert!(message.contains("not found"));
                assert_eq!(s, shape);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_filter_output_is_verbatim() {
        // `cat -` echoes stdin, standing in for a filter program.
        let out = run_filter("cat", "-", &json!({"a": 1}), &json!({})).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), r#"{"a":1}"#);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_filter_is_a_filter_error() {
        let err = run_filter("false", ".", &json!([1, 2]), &json!({"items": []}))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Filter { shape: Some(_), .. }));
    }
}
