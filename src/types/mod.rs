mod conversation;
mod search;
mod user;
mod workspace;

pub use conversation::*;
pub use search::*;
pub use user::*;
pub use workspace::*;

use serde::{Deserialize, Deserializer};

// Helper deserializers

/// Treat empty strings as absent. The remote sends `""` for "no next cursor".
pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|s| !s.is_empty()))
}

/// Render a message timestamp (`"1700000000.000100"`) as local time.
pub fn format_ts(ts: &str) -> String {
    let secs = ts
        .split('.')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or_default();
    match chrono::DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        None => ts.to_string(),
    }
}
