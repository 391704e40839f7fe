//! Request-facing facade over the index, the cache and the settings file.
//!
//! Handlers only ever talk to `AssetService`. Read queries go to the
//! in-memory cache; only `rebuild_index` walks the filesystem.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ServerConfig, DEFAULT_IMAGE_DIR};
use crate::index::builder::MANIFEST_FILE;
use crate::index::{manifest_path, resolve_root, ImageIndexBuilder, IndexError};
use crate::state::cache::IndexCache;
use crate::state::data::Manifest;
use crate::state::settings::SettingsStore;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("failed to update settings")]
    SettingsWriteFailed,
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Outcome of a rebuild, as reported to the caller
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildReport {
    pub success: bool,
    pub count: usize,
}

/// Metadata for a single indexed image
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub name: String,
    pub path: String,
    /// None when the header could not be decoded
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bytes: u64,
}

/// Current state of the published index
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    pub count: usize,
    pub root: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
}

pub struct AssetService {
    settings: SettingsStore,
    builder: ImageIndexBuilder,
    cache: IndexCache,
    base_dir: PathBuf,
    save_path_key: String,
    favorites_key: String,
}

impl AssetService {
    pub fn new(config: &ServerConfig, settings: SettingsStore) -> Self {
        Self {
            settings,
            builder: ImageIndexBuilder::new(),
            cache: IndexCache::new(),
            base_dir: config.base_dir.clone(),
            save_path_key: config.save_path_key(),
            favorites_key: config.favorites_key(),
        }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    /// The scan root as currently configured in the settings file. Blocking.
    pub fn configured_root(&self) -> PathBuf {
        let configured: String = self
            .settings
            .get(&self.save_path_key, DEFAULT_IMAGE_DIR.to_string());
        resolve_root(&self.base_dir, &configured)
    }

    /// Rescan the configured root and publish the result.
    ///
    /// A missing root leaves the current cache untouched and reports failure.
    /// A manifest that could not be saved still replaces the cache. Overlapping
    /// rebuilds are not serialised; whichever publishes last wins.
    ///
    /// Blocking: run from `spawn_blocking` on the async runtime.
    pub fn rebuild_index(&self) -> RebuildReport {
        let root = self.configured_root();

        let manifest = match self.builder.rebuild(&root) {
            Ok(manifest) => manifest,
            Err(IndexError::PersistFailed {
                path,
                manifest,
                source,
            }) => {
                warn!("⚠️  Could not save manifest {}: {source}; serving in-memory index", path.display());
                manifest
            }
            Err(IndexError::RootNotFound(path)) => {
                warn!("⚠️  Directory not found: {}", path.display());
                return RebuildReport {
                    success: false,
                    count: 0,
                };
            }
        };

        self.cache.load(&root, &manifest);
        info!("📊 Index published: {} images", manifest.count);
        RebuildReport {
            success: true,
            count: manifest.count,
        }
    }

    /// Manifest file of the published index, or under the configured root
    /// before any scan succeeded. Blocking (may read the settings file).
    pub fn manifest_file(&self) -> PathBuf {
        match self.cache.snapshot().root() {
            Some(root) => manifest_path(root),
            None => manifest_path(&self.configured_root()),
        }
    }

    /// Cache-only lookup; no filesystem access
    fn lookup(&self, name: &str) -> Result<PathBuf, AssetError> {
        if name.is_empty() {
            return Err(AssetError::BadRequest("image name is empty".to_string()));
        }

        self.cache.resolve(name).ok_or_else(|| {
            debug!("Unknown image name {name}");
            AssetError::NotFound(name.to_string())
        })
    }

    /// Map a name to its file, checking the file is still on disk.
    ///
    /// A file deleted since the last rebuild yields `NotFound`; the stale
    /// entry stays in the cache until the next rebuild.
    pub async fn resolve_image(&self, name: &str) -> Result<PathBuf, AssetError> {
        let path = self.lookup(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => {
                debug!("Indexed image {name} is gone from {}", path.display());
                Err(AssetError::NotFound(name.to_string()))
            }
        }
    }

    /// Size and dimensions of an indexed image. Blocking.
    pub fn image_info(&self, name: &str) -> Result<ImageInfo, AssetError> {
        let path = self.lookup(name)?;
        let bytes = match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Err(AssetError::NotFound(name.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AssetError::NotFound(name.to_string()));
            }
            Err(source) => return Err(AssetError::Io { path, source }),
        };

        let (width, height) = match image::image_dimensions(&path) {
            Ok((w, h)) => (Some(w), Some(h)),
            Err(e) => {
                debug!("Could not read dimensions of {}: {e}", path.display());
                (None, None)
            }
        };

        Ok(ImageInfo {
            name: name.to_string(),
            path: path.to_string_lossy().to_string(),
            width,
            height,
            bytes,
        })
    }

    pub fn status(&self) -> IndexStatus {
        let snap = self.cache.snapshot();
        IndexStatus {
            count: snap.len(),
            root: snap.root().map(display_path),
            built_at: snap.loaded_at(),
        }
    }

    /// Blocking (reads the settings file)
    pub fn list_favorites(&self) -> Vec<String> {
        self.settings.get(&self.favorites_key, Vec::new())
    }

    /// Add `name` to the favorites, or remove it if already there. Blocking.
    pub fn toggle_favorite(&self, name: &str) -> Result<Vec<String>, AssetError> {
        if name.is_empty() {
            return Err(AssetError::BadRequest("favorite name is empty".to_string()));
        }

        let mut favorites = self.list_favorites();
        match favorites.iter().position(|f| f == name) {
            Some(i) => {
                favorites.remove(i);
            }
            None => favorites.push(name.to_string()),
        }

        let value = Value::from(favorites.clone());
        if !self.settings.set(&self.favorites_key, Some(value)) {
            return Err(AssetError::SettingsWriteFailed);
        }
        Ok(favorites)
    }

    /// Forget every indexed entry (on shutdown)
    pub fn shutdown(&self) {
        self.cache.clear();
        info!("Index cache cleared");
    }
}

/// Bytes of a persisted manifest, served verbatim.
///
/// Any read failure (missing, unreadable, not a file) is `NotFound`.
pub async fn read_manifest(path: &Path) -> Result<Vec<u8>, AssetError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            if e.kind() == ErrorKind::NotFound {
                debug!("No manifest at {}", path.display());
            } else {
                warn!("⚠️  Could not read manifest {}: {e}", path.display());
            }
            return Err(AssetError::NotFound(MANIFEST_FILE.to_string()));
        }
    };

    match Manifest::from_json(&bytes) {
        Ok(manifest) => debug!("Serving manifest with {} images", manifest.count),
        Err(e) => warn!("⚠️  Manifest {} does not parse: {e}", path.display()),
    }
    Ok(bytes)
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
