//! CLI bootstrap: process setup and the shared command context.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use url::Url;

use narrator_core::NarratorSettings;

use crate::paths::{bookmarks_path, data_root, settings_path};
use crate::stores::{JsonSessionStore, JsonSettingsStore};

/// Load `.env` and install the log subscriber.
///
/// `RUST_LOG` wins; otherwise `narrator=info`, or `narrator=debug` with
/// `--verbose`. Logs go to stderr so they do not mix with playback output.
pub fn init(verbose: bool) {
    dotenvy::dotenv().ok();

    let default = if verbose { "narrator=debug" } else { "narrator=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Paths and stores every command needs.
pub struct CliContext {
    data_dir: PathBuf,
    server_url: Option<String>,
    settings: JsonSettingsStore,
}

impl CliContext {
    pub fn new(data_dir: Option<&Path>, server_url: Option<String>) -> Result<Self> {
        let data_dir = data_root(data_dir)?;
        let settings = JsonSettingsStore::new(settings_path(&data_dir));
        Ok(Self {
            data_dir,
            server_url,
            settings,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub const fn settings_store(&self) -> &JsonSettingsStore {
        &self.settings
    }

    /// Saved settings with command-line overrides applied.
    pub async fn settings(&self) -> Result<NarratorSettings> {
        let mut settings = self
            .settings
            .load_settings()
            .await
            .with_context(|| format!("Failed to read {}", self.settings.path().display()))?;
        if let Some(ref url) = self.server_url {
            settings.server_url.clone_from(url);
        }
        Ok(settings)
    }

    /// Bookmark store for one document.
    pub fn session_store(&self, document: &Path) -> JsonSessionStore {
        let key = document
            .canonicalize()
            .unwrap_or_else(|_| document.to_path_buf());
        JsonSessionStore::new(bookmarks_path(&self.data_dir), key.display().to_string())
    }
}

/// Parse the server address, accepting it with or without a trailing slash.
pub fn server_url(raw: &str) -> Result<Url> {
    Url::parse(raw).with_context(|| format!("Invalid server URL '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn override_replaces_saved_server_url() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = CliContext::new(Some(tmp.path()), Some("http://other:9000".to_string())).unwrap();

        let settings = ctx.settings().await.unwrap();
        assert_eq!(settings.server_url, "http://other:9000");
        assert_eq!(ctx.data_dir(), tmp.path());
    }

    #[test]
    fn rejects_malformed_server_url() {
        assert!(server_url("not a url").is_err());
        assert_eq!(
            server_url("http://127.0.0.1:5000").unwrap().as_str(),
            "http://127.0.0.1:5000/"
        );
    }
}
