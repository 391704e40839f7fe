//! Shared data structures for the index
//!
//! These structs represent the data model that flows between
//! the scanner, the in-memory cache and the HTTP layer.

use serde::{Deserialize, Serialize};

/// A single discovered image
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Lookup key: the filename without its extension (e.g., "portrait_01")
    #[serde(rename = "filename")]
    pub name: String,
    /// Absolute path to the image file
    pub path: String,
}

/// Point-in-time snapshot of every image found under the scan root.
///
/// Serialized as `{ "images": [...], "count": N }`, which is the exact
/// shape of the `images.json` file written next to the images.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    #[serde(rename = "images")]
    pub entries: Vec<ManifestEntry>,
    pub count: usize,
}

impl Manifest {
    /// Build a manifest from a list of entries. `count` always tracks the length.
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        let count = entries.len();
        Self { entries, count }
    }

    /// Convert to pretty JSON bytes for the manifest file
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Parse from JSON bytes (a previously written manifest file)
    pub fn from_json(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }
}
