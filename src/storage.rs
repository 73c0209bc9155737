use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "folio";
const STATE_FILENAME: &str = "state.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires| expires > now)
    }
}

/// Keyed string store persisted as one JSON file.
///
/// Entries written with a max age behave like cookies: they read as absent
/// once expired and every write restarts the clock. Every mutation is
/// flushed synchronously, last write wins.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LocalStore {
    entries: BTreeMap<String, StoredEntry>,
    #[serde(skip)]
    file_path: Option<PathBuf>,
}

pub fn default_state_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_NAME).join(STATE_FILENAME))
}

impl LocalStore {
    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub fn with_file(file_path: &Path) -> Self {
        Self {
            entries: BTreeMap::new(),
            file_path: Some(file_path.to_path_buf()),
        }
    }

    pub fn load_or_ephemeral(file_path: Option<&Path>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::error!("Failed to load state from {}: {e:#}", path.display());
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(file_path: &Path) -> anyhow::Result<Self> {
        if !file_path.exists() {
            return Ok(Self::with_file(file_path));
        }
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("reading {}", file_path.display()))?;
        let mut store: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", file_path.display()))?;
        store.file_path = Some(file_path.to_path_buf());
        store.purge_expired(Utc::now());
        Ok(store)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn is_ephemeral(&self) -> bool {
        self.file_path.is_none()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<&str> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.as_str())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.insert(key, value.into(), None);
    }

    pub fn set_with_max_age(&mut self, key: &str, value: impl Into<String>, max_age: Duration) {
        self.insert(key, value.into(), Some(Utc::now() + max_age));
    }

    pub fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.flush();
        }
    }

    fn insert(&mut self, key: &str, value: String, expires_at: Option<DateTime<Utc>>) {
        self.entries
            .insert(key.to_string(), StoredEntry { value, expires_at });
        self.flush();
    }

    fn flush(&self) {
        if let Err(e) = self.save() {
            log::error!("Failed to persist state: {e:#}");
        }
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| entry.is_live(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn values_survive_a_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut store = LocalStore::load_or_ephemeral(Some(&path));
        store.set("theme", "light");
        store.set_with_max_age("book_page_x", "7", Duration::days(30));

        let reloaded = LocalStore::load_from_file(&path).unwrap();
        assert_eq!(reloaded.get("theme"), Some("light"));
        assert_eq!(reloaded.get("book_page_x"), Some("7"));
    }

    #[test]
    fn expired_entries_read_as_absent() {
        let mut store = LocalStore::ephemeral();
        store.set_with_max_age("k", "v", Duration::days(30));

        let later = Utc::now() + Duration::days(31);
        assert_eq!(store.get_at("k", later), None);
        assert_eq!(store.get("k"), Some("v"));
    }

    #[test]
    fn corrupt_file_falls_back_to_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();

        let store = LocalStore::load_or_ephemeral(Some(&path));
        assert!(!store.is_ephemeral());
        assert_eq!(store.get("theme"), None);
    }
}
