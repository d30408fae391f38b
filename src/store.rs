use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::book::View;
use crate::section::Section;

/// On-disk form of a book: `{ "sections": [...], "activeTab": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub active_tab: View,
}

impl PersistedState {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("parse book state json")
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("serialize book state json")
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> anyhow::Result<Option<PersistedState>>;
    async fn save(&self, state: &PersistedState) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct LocalFsStateStore {
    path: PathBuf,
}

impl LocalFsStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for LocalFsStateStore {
    async fn load(&self) -> anyhow::Result<Option<PersistedState>> {
        read_json(&self.path)
            .await
            .with_context(|| format!("read: {}", self.path.display()))
    }

    async fn save(&self, state: &PersistedState) -> anyhow::Result<()> {
        write_json_atomic(&self.path, state)
            .await
            .with_context(|| format!("write: {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), sections = state.sections.len(), "state saved");
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
