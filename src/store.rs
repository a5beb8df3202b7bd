use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use crate::config::Config;
use crate::error::CliError;
use crate::types::{WorkspaceBook, WorkspaceRecord};

/// Store file name inside the config directory
pub const WORKSPACES_FILE: &str = "workspaces.json";

/// Persistence for workspace records.
///
/// Reads and writes whole books; there is no locking, so two invocations that
/// write concurrently can lose one of the updates.
pub trait CredentialStore {
    fn load(&self) -> Result<WorkspaceBook>;
    fn save(&self, book: &WorkspaceBook) -> Result<()>;
}

/// JSON file store in the config directory
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store at the default location
    pub fn new() -> Result<Self> {
        Ok(Self::at(Config::config_dir()?.join(WORKSPACES_FILE)))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> Result<WorkspaceBook> {
        if !self.path.exists() {
            return Ok(WorkspaceBook::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read workspace store: {:?}", self.path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse workspace store: {:?}", self.path))
    }

    /// Written to an owner-only sibling temp file, then renamed over the store.
    fn save(&self, book: &WorkspaceBook) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory: {:?}", dir))?;

        let content = serde_json::to_string_pretty(book).context("Failed to serialize workspaces")?;
        let mut file = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {:?}", dir))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))
                .context("Failed to restrict permissions on the workspace store")?;
        }

        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write workspace store: {:?}", self.path))?;
        file.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace workspace store: {:?}", self.path))?;

        tracing::debug!(path = ?self.path, workspaces = book.workspaces.len(), "saved workspace store");
        Ok(())
    }
}

/// In-memory store, for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    book: Mutex<WorkspaceBook>,
}

impl MemoryStore {
    pub fn with(book: WorkspaceBook) -> Self {
        Self {
            book: Mutex::new(book),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<WorkspaceBook> {
        Ok(self
            .book
            .lock()
            .map_err(|_| anyhow::anyhow!("workspace store lock poisoned"))?
            .clone())
    }

    fn save(&self, book: &WorkspaceBook) -> Result<()> {
        *self
            .book
            .lock()
            .map_err(|_| anyhow::anyhow!("workspace store lock poisoned"))? = book.clone();
        Ok(())
    }
}

impl WorkspaceBook {
    /// Find the workspace a command should run against.
    ///
    /// `reference` may be a team id, a workspace name, or part of its URL.
    /// Without a reference the default is used, or the only workspace if
    /// exactly one exists.
    pub fn resolve(&self, reference: Option<&str>) -> std::result::Result<&WorkspaceRecord, CliError> {
        if self.workspaces.is_empty() {
            return Err(CliError::Config(
                "no workspace configured; run `huddle auth login` first".to_string(),
            ));
        }

        let Some(reference) = reference else {
            if let Some(record) = self.default.as_ref().and_then(|id| self.workspaces.get(id)) {
                return Ok(record);
            }
            if self.workspaces.len() == 1 {
                if let Some(record) = self.workspaces.values().next() {
                    return Ok(record);
                }
            }
            return Err(CliError::Config(format!(
                "{} workspaces configured and no default; pass --workspace or run `huddle auth default <workspace>`",
                self.workspaces.len()
            )));
        };

        if let Some(record) = self.workspaces.get(reference) {
            return Ok(record);
        }

        let needle = reference.to_lowercase();
        let by_name: Vec<&WorkspaceRecord> = self
            .workspaces
            .values()
            .filter(|w| w.name.to_lowercase() == needle)
            .collect();
        let matches = if by_name.is_empty() {
            self.workspaces
                .values()
                .filter(|w| w.url.to_lowercase().contains(&needle))
                .collect()
        } else {
            by_name
        };

        match matches.as_slice() {
            [] => Err(CliError::Config(format!("unknown workspace: {}", reference))),
            [record] => Ok(*record),
            many => Err(CliError::Config(format!(
                "workspace reference '{}' is ambiguous: {}",
                reference,
                many.iter()
                    .map(|w| format!("{} ({})", w.name, w.id))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Insert or replace a workspace. The first workspace becomes the default.
    pub fn upsert(&mut self, record: WorkspaceRecord) {
        if self.default.is_none() {
            self.default = Some(record.id.clone());
        }
        self.workspaces.insert(record.id.clone(), record);
    }

    /// Remove a workspace, clearing or moving the default pointer.
    pub fn remove(&mut self, id: &str) -> Option<WorkspaceRecord> {
        let removed = self.workspaces.remove(id)?;
        if self.default.as_deref() == Some(id) {
            self.default = self.workspaces.keys().next().cloned();
        }
        Some(removed)
    }

    pub fn set_default(&mut self, id: &str) -> std::result::Result<(), CliError> {
        if !self.workspaces.contains_key(id) {
            return Err(CliError::Config(format!("unknown workspace: {}", id)));
        }
        self.default = Some(id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TokenRole, WorkspaceCredential};

    fn record(id: &str, name: &str) -> WorkspaceRecord {
        WorkspaceRecord {
            id: id.to_string(),
            name: name.to_string(),
            url: format!("https://{}.example.com", name),
            user_id: None,
            credential: WorkspaceCredential::Token {
                token: "xoxp-1".to_string(),
                role: TokenRole::User,
            },
            allowed_channels: None,
        }
    }

    #[test]
    fn test_resolve_empty_book() {
        let book = WorkspaceBook::default();
        let err = book.resolve(None).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("auth login"));
    }

    #[test]
    fn test_resolve_single_and_default() {
        let mut book = WorkspaceBook::default();
        book.upsert(record("T1", "acme"));
        assert_eq!(book.resolve(None).unwrap().id, "T1");

        book.upsert(record("T2", "globex"));
        assert_eq!(book.default.as_deref(), Some("T1"));
        assert_eq!(book.resolve(None).unwrap().id, "T1");

        book.set_default("T2").unwrap();
        assert_eq!(book.resolve(None).unwrap().id, "T2");
        assert!(book.set_default("T9").is_err());
    }

    #[test]
    fn test_resolve_without_default_is_ambiguous() {
        let mut book = WorkspaceBook::default();
        book.workspaces.insert("T1".to_string(), record("T1", "acme"));
        book.workspaces.insert("T2".to_string(), record("T2", "globex"));
        assert!(matches!(book.resolve(None), Err(CliError::Config(_))));
    }

    #[test]
    fn test_resolve_by_reference() {
        let mut book = WorkspaceBook::default();
        book.upsert(record("T1", "acme"));
        book.upsert(record("T2", "acme-labs"));

        assert_eq!(book.resolve(Some("T2")).unwrap().id, "T2");
        assert_eq!(book.resolve(Some("ACME")).unwrap().id, "T1");
        assert_eq!(book.resolve(Some("labs")).unwrap().id, "T2");

        let err = book.resolve(Some("example.com")).unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
        assert!(book.resolve(Some("initech")).is_err());
    }

    #[test]
    fn test_remove_moves_default() {
        let mut book = WorkspaceBook::default();
        book.upsert(record("T1", "acme"));
        book.upsert(record("T2", "globex"));

        assert!(book.remove("T1").is_some());
        assert_eq!(book.default.as_deref(), Some("T2"));
        assert!(book.remove("T1").is_none());

        book.remove("T2");
        assert_eq!(book.default, None);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::at(dir.path().join("nested").join(WORKSPACES_FILE));
        assert!(store.load().unwrap().workspaces.is_empty());

        let mut book = WorkspaceBook::default();
        book.upsert(record("T1", "acme"));
        store.save(&book).unwrap();

        assert_eq!(store.load().unwrap(), book);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only_after_every_save() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(WORKSPACES_FILE);
        let store = FileStore::at(path.clone());

        let mut book = WorkspaceBook::default();
        book.upsert(record("T1", "acme"));
        store.save(&book).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        book.upsert(record("T2", "globex"));
        store.save(&book).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(store.load().unwrap().workspaces.len(), 2);

        // Only the store itself is left behind; temp files were renamed away.
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
