use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::data::Manifest;

/// One immutable name → path mapping, published as a whole together with
/// the root it was scanned from
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    images: HashMap<String, PathBuf>,
    root: Option<PathBuf>,
    /// When this mapping was loaded (None for the empty startup snapshot)
    loaded_at: Option<DateTime<Utc>>,
}

impl IndexSnapshot {
    fn from_manifest(root: &Path, manifest: &Manifest) -> Self {
        let mut images = HashMap::with_capacity(manifest.entries.len());
        for entry in &manifest.entries {
            // Later entries overwrite earlier ones with the same name
            images.insert(entry.name.clone(), PathBuf::from(&entry.path));
        }
        Self {
            images,
            root: Some(root.to_path_buf()),
            loaded_at: Some(Utc::now()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PathBuf> {
        self.images.get(name)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Directory the mapping was scanned from (None for the empty snapshot)
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}

/// In-memory lookup table backing every read query.
///
/// The mapping is never patched in place. `load` builds a fresh snapshot
/// off to the side and swaps it in with a single pointer store, so a reader
/// sees either the old table or the new one in full. Reads take no lock.
#[derive(Debug)]
pub struct IndexCache {
    snap: ArcSwap<IndexSnapshot>,
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexCache {
    /// Empty cache, as at process start
    pub fn new() -> Self {
        Self {
            snap: ArcSwap::from_pointee(IndexSnapshot::default()),
        }
    }

    /// Replace the whole mapping with the contents of `manifest`, scanned from `root`
    pub fn load(&self, root: &Path, manifest: &Manifest) {
        self.snap
            .store(Arc::new(IndexSnapshot::from_manifest(root, manifest)));
    }

    /// Look up a name in the current mapping. Never touches the filesystem.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.snap.load().get(name).cloned()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.snap.store(Arc::new(IndexSnapshot::default()));
    }

    /// The currently published snapshot. Holding it pins that version.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snap.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::ManifestEntry;
    use std::thread;

    fn manifest(entries: &[(&str, &str)]) -> Manifest {
        Manifest::new(
            entries
                .iter()
                .map(|(name, path)| ManifestEntry {
                    name: name.to_string(),
                    path: path.to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_starts_empty() {
        let cache = IndexCache::new();
        assert_eq!(cache.snapshot().len(), 0);
        assert_eq!(cache.resolve("anything"), None);
        assert!(cache.snapshot().loaded_at().is_none());
        assert!(cache.snapshot().root().is_none());
    }

    #[test]
    fn test_load_replaces_wholesale() {
        let cache = IndexCache::new();
        cache.load(Path::new("/root"), &manifest(&[("a", "/old/a.png"), ("b", "/old/b.png")]));
        assert_eq!(cache.resolve("a"), Some(PathBuf::from("/old/a.png")));

        cache.load(Path::new("/new"), &manifest(&[("c", "/new/c.png")]));
        assert_eq!(cache.resolve("a"), None);
        assert_eq!(cache.resolve("b"), None);
        assert_eq!(cache.resolve("c"), Some(PathBuf::from("/new/c.png")));
        assert_eq!(cache.snapshot().len(), 1);
        assert!(cache.snapshot().loaded_at().is_some());
        assert_eq!(cache.snapshot().root(), Some(Path::new("/new")));
    }

    #[test]
    fn test_later_entry_wins() {
        let cache = IndexCache::new();
        cache.load(Path::new("/root"), &manifest(&[("dup", "/first.png"), ("dup", "/second.png")]));
        assert_eq!(cache.resolve("dup"), Some(PathBuf::from("/second.png")));
        assert_eq!(cache.snapshot().len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = IndexCache::new();
        cache.load(Path::new("/root"), &manifest(&[("a", "/a.png")]));
        cache.clear();
        assert_eq!(cache.resolve("a"), None);
        assert_eq!(cache.snapshot().len(), 0);
        assert!(cache.snapshot().root().is_none());
    }

    #[test]
    fn test_readers_never_see_a_mix() {
        let old: Vec<(String, String)> = (0..200)
            .map(|i| (format!("img{i}"), format!("/old/img{i}.png")))
            .collect();
        let new: Vec<(String, String)> = (0..200)
            .map(|i| (format!("img{i}"), format!("/new/img{i}.png")))
            .collect();
        let as_manifest = |pairs: &[(String, String)]| {
            Manifest::new(
                pairs
                    .iter()
                    .map(|(name, path)| ManifestEntry {
                        name: name.clone(),
                        path: path.clone(),
                    })
                    .collect(),
            )
        };
        let old = as_manifest(&old);
        let new = as_manifest(&new);

        let cache = Arc::new(IndexCache::new());
        cache.load(Path::new("/old"), &old);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snap = cache.snapshot();
                        let first = snap.get("img0").unwrap().starts_with("/old");
                        // The root travels with the mapping it was scanned from
                        assert_eq!(snap.root().unwrap().starts_with("/old"), first);
                        for i in 0..200 {
                            let path = snap.get(&format!("img{i}")).unwrap();
                            assert_eq!(path.starts_with("/old"), first);
                        }
                    }
                })
            })
            .collect();

        for round in 0..100 {
            if round % 2 == 0 {
                cache.load(Path::new("/new"), &new);
            } else {
                cache.load(Path::new("/old"), &old);
            }
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
