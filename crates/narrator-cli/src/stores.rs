//! JSON file implementations of the persistence ports.
//!
//! Files are rewritten whole through a temporary sibling and a rename, so a
//! crash mid-write leaves the previous contents intact.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use narrator_core::{
    Bookmark, BufferedPlaybackConfig, NarratorSettings, PreferencesStore, SessionStore,
    StoreError,
};

fn io_error(path: &Path, err: &std::io::Error) -> StoreError {
    StoreError::Storage(format!("{}: {err}", path.display()))
}

async fn read_json(path: &Path) -> Result<Option<Value>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, &e)),
    }
}

async fn write_json(path: &Path, value: &Value) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, &e))?;
    }
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| io_error(&tmp, &e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, &e))
}

/// Application settings in a single JSON file.
///
/// Also serves as the [`PreferencesStore`] for the buffering section.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing file yields defaults.
    pub async fn load_settings(&self) -> Result<NarratorSettings, StoreError> {
        match read_json(&self.path).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(NarratorSettings::default()),
        }
    }

    pub async fn save_settings(&self, settings: &NarratorSettings) -> Result<(), StoreError> {
        write_json(&self.path, &serde_json::to_value(settings)?).await?;
        tracing::debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

#[async_trait]
impl PreferencesStore for JsonSettingsStore {
    async fn load(&self) -> Result<BufferedPlaybackConfig, StoreError> {
        Ok(self.load_settings().await?.buffer)
    }

    async fn save(&self, config: &BufferedPlaybackConfig) -> Result<(), StoreError> {
        let mut settings = self.load_settings().await?;
        settings.buffer = *config;
        self.save_settings(&settings).await
    }
}

/// Per-document bookmarks in a shared JSON file.
///
/// The file maps a document key (its canonical path) to the last position.
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    path: PathBuf,
    document: String,
}

impl JsonSessionStore {
    pub fn new(path: impl Into<PathBuf>, document: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            document: document.into(),
        }
    }

    async fn load_all(&self) -> Result<BTreeMap<String, Bookmark>, StoreError> {
        match read_json(&self.path).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn load_bookmark(&self) -> Result<Option<Bookmark>, StoreError> {
        Ok(self.load_all().await?.remove(&self.document))
    }

    async fn save_bookmark(&self, bookmark: &Bookmark) -> Result<(), StoreError> {
        let mut all = self.load_all().await?;
        all.insert(self.document.clone(), bookmark.clone());
        write_json(&self.path, &serde_json::to_value(&all)?).await?;
        tracing::trace!(
            document = %self.document,
            paragraph = bookmark.paragraph,
            "Bookmark saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn missing_settings_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::new(tmp.path().join("settings.json"));

        let settings = store.load_settings().await.unwrap();
        assert_eq!(settings, NarratorSettings::default());
    }

    #[tokio::test]
    async fn settings_round_trip_through_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::new(tmp.path().join("conf").join("settings.json"));

        let mut settings = NarratorSettings::default();
        settings.server_url = "http://tts.local:5000".to_string();
        settings.generation.voice = "alloy".to_string();
        assert_ok!(store.save_settings(&settings).await);

        assert_eq!(store.load_settings().await.unwrap(), settings);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn preferences_only_touch_buffer_section() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::new(tmp.path().join("settings.json"));

        let mut settings = NarratorSettings::default();
        settings.generation.voice = "alloy".to_string();
        assert_ok!(store.save_settings(&settings).await);

        let config = BufferedPlaybackConfig::new(6, 2);
        assert_ok!(PreferencesStore::save(&store, &config).await);

        assert_eq!(PreferencesStore::load(&store).await.unwrap(), config);
        assert_eq!(store.load_settings().await.unwrap().generation.voice, "alloy");
    }

    #[tokio::test]
    async fn corrupt_settings_are_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, b"{not json").unwrap();

        let err = JsonSettingsStore::new(&path).load_settings().await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn bookmarks_are_kept_per_document() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bookmarks.json");
        let first = JsonSessionStore::new(&path, "/books/a.txt");
        let second = JsonSessionStore::new(&path, "/books/b.txt");

        assert_eq!(first.load_bookmark().await.unwrap(), None);

        assert_ok!(first.save_bookmark(&Bookmark::now(4)).await);
        assert_ok!(second.save_bookmark(&Bookmark::now(9)).await);
        assert_ok!(first.save_bookmark(&Bookmark::now(5)).await);

        assert_eq!(first.load_bookmark().await.unwrap().map(|b| b.paragraph), Some(5));
        assert_eq!(second.load_bookmark().await.unwrap().map(|b| b.paragraph), Some(9));
    }
}
