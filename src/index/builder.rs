use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::state::data::{Manifest, ManifestEntry};

/// Extensions picked up by a scan. Matching is case-sensitive.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Name of the manifest written into the scan root
pub const MANIFEST_FILE: &str = "images.json";

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("image root {0} does not exist or is not a directory")]
    RootNotFound(PathBuf),
    /// The scan succeeded but the manifest could not be saved.
    /// `manifest` is still complete and usable.
    #[error("failed to write manifest {path}: {source}")]
    PersistFailed {
        path: PathBuf,
        manifest: Manifest,
        source: std::io::Error,
    },
}

/// Turn the configured save path into an absolute scan root.
///
/// Relative paths (with or without a leading `./`) hang off `base_dir`;
/// absolute paths are used as they are.
pub fn resolve_root(base_dir: &Path, configured: &str) -> PathBuf {
    let configured = Path::new(configured);
    let root = if configured.is_relative() {
        base_dir.join(configured.strip_prefix("./").unwrap_or(configured))
    } else {
        configured.to_path_buf()
    };
    std::path::absolute(&root).unwrap_or(root)
}

/// Where the manifest for `root` lives
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE)
}

/// Scans a directory tree for images and persists the result as a manifest.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageIndexBuilder;

impl ImageIndexBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Rescan `root` and overwrite `root/images.json`.
    ///
    /// This is a one-shot blocking snapshot; call it from `spawn_blocking`
    /// when on the async runtime.
    pub fn rebuild(&self, root: &Path) -> Result<Manifest, IndexError> {
        // Walk an absolute root so every manifest path comes out absolute
        let root = match std::path::absolute(root) {
            Ok(root) if root.is_dir() => root,
            _ => return Err(IndexError::RootNotFound(root.to_path_buf())),
        };
        let root = root.as_path();

        info!("🔍 Scanning folder: {}", root.display());
        let manifest = self.scan(root);

        let path = manifest_path(root);
        if let Err(source) = write_manifest(&path, &manifest) {
            return Err(IndexError::PersistFailed {
                path,
                manifest,
                source,
            });
        }

        info!("✅ Created index with {} images at {}", manifest.count, path.display());
        Ok(manifest)
    }

    /// Walk the tree and collect one entry per stem.
    ///
    /// The walk is sorted by file name so repeated scans of an unchanged tree
    /// agree. On a stem collision the file visited later wins, and the entry
    /// keeps the slot of the first occurrence.
    pub fn scan(&self, root: &Path) -> Manifest {
        let mut entries: Vec<ManifestEntry> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();

        for entry in WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!("Skipping unreadable entry: {err}");
                    None
                }
            })
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !is_image(path) {
                continue;
            }

            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };
            let path_str = path.to_string_lossy().to_string();

            match slots.get(&name) {
                Some(&slot) => {
                    debug!("Duplicate image name {name}: {} replaces {}", path_str, entries[slot].path);
                    entries[slot].path = path_str;
                }
                None => {
                    slots.insert(name.clone(), entries.len());
                    entries.push(ManifestEntry {
                        name,
                        path: path_str,
                    });
                }
            }
        }

        Manifest::new(entries)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext))
}

fn write_manifest(path: &Path, manifest: &Manifest) -> std::io::Result<()> {
    let json = manifest.to_json()?;
    fs::write(path, json)
}
