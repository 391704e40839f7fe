use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{info, warn};

/// Settings file location relative to the host's working directory
const STANDALONE_SETTINGS: &str = "user/default/comfy.settings.json";
/// Same file when the host runs from a portable bundle
const PORTABLE_SETTINGS: &str = "ComfyUI/user/default/comfy.settings.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file not found at {standalone} or {portable}")]
    NotLocated { standalone: PathBuf, portable: PathBuf },
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode settings file {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// How the host application is laid out on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallLayout {
    /// Neither candidate settings file exists (yet)
    Unknown,
    /// Settings live under `ComfyUI/user/default`
    Portable,
    /// Settings live under `user/default`
    Standalone,
}

/// Flat key/value view over the host's shared JSON settings file.
///
/// Only the keys this service owns are touched; every other key in the
/// file is carried through a write unchanged. Reads never fail: any problem
/// is logged and the caller's default is returned.
///
/// Writes are an unlocked read-modify-write of the whole file, so two
/// concurrent `set` calls can lose one update. Settings change at
/// interactive rates, which keeps that window small.
#[derive(Debug)]
pub struct SettingsStore {
    standalone_path: PathBuf,
    portable_path: PathBuf,
    /// Only a resolved layout is stored; `Unknown` is re-checked on each access
    layout: OnceLock<InstallLayout>,
}

impl SettingsStore {
    /// Locate the settings file by checking the host layouts under `work_dir`
    pub fn discover(work_dir: &Path) -> Self {
        Self {
            standalone_path: work_dir.join(STANDALONE_SETTINGS),
            portable_path: work_dir.join(PORTABLE_SETTINGS),
            layout: OnceLock::new(),
        }
    }

    /// Use an explicit settings file. A missing file is treated as empty.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            standalone_path: path.clone(),
            portable_path: path,
            layout: OnceLock::from(InstallLayout::Standalone),
        }
    }

    /// Resolve the install layout, caching it once either file is found
    pub fn layout(&self) -> InstallLayout {
        if let Some(layout) = self.layout.get() {
            return *layout;
        }

        let detected = if self.standalone_path.is_file() {
            info!("Running standalone host, settings at {}", self.standalone_path.display());
            InstallLayout::Standalone
        } else if self.portable_path.is_file() {
            info!("Running portable host, settings at {}", self.portable_path.display());
            InstallLayout::Portable
        } else {
            return InstallLayout::Unknown;
        };

        *self.layout.get_or_init(|| detected)
    }

    /// Path of the settings file for the resolved layout
    pub fn path(&self) -> Result<&Path, SettingsError> {
        match self.layout() {
            InstallLayout::Standalone => Ok(&self.standalone_path),
            InstallLayout::Portable => Ok(&self.portable_path),
            InstallLayout::Unknown => Err(SettingsError::NotLocated {
                standalone: self.standalone_path.clone(),
                portable: self.portable_path.clone(),
            }),
        }
    }

    /// Read the whole settings object
    pub fn read_all(&self) -> Result<Map<String, Value>, SettingsError> {
        let path = self.path()?;
        let raw = fs::read(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| SettingsError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a single setting, falling back to `default` on any failure
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let settings = match self.read_all() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("⚠️  {e}; using default for {key}");
                return default;
            }
        };

        let Some(value) = settings.get(key) else {
            return default;
        };

        match T::deserialize(value) {
            Ok(value) => value,
            Err(e) => {
                warn!("⚠️  Setting {key} has an unexpected type ({e}); using default");
                default
            }
        }
    }

    /// Upsert `key`, or remove it when `value` is `None`.
    ///
    /// Returns `false` (after logging the cause) if the file could not be
    /// read, decoded or written.
    pub fn set(&self, key: &str, value: Option<Value>) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(e) => {
                warn!("⚠️  Could not update setting {key}: {e}");
                false
            }
        }
    }

    fn try_set(&self, key: &str, value: Option<Value>) -> Result<(), SettingsError> {
        let path = self.path()?;

        let mut settings = if path.exists() {
            self.read_all()?
        } else {
            Map::new()
        };

        match value {
            Some(value) => {
                settings.insert(key.to_string(), value);
            }
            None => {
                settings.remove(key);
            }
        }

        let json = to_json_indented(&Value::Object(settings)).map_err(|e| SettingsError::Write {
            path: path.to_path_buf(),
            source: e.into(),
        })?;

        fs::write(path, json).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The host writes its settings with four-space indentation; keep that so diffs stay small
fn to_json_indented(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    use serde::Serialize;

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}
