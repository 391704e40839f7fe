//! Image index module
//!
//! This module handles:
//! - Walking the preview folder for image files
//! - Resolving the configured folder into an absolute root
//! - Writing the `images.json` manifest next to the images

pub mod builder;

pub use builder::{manifest_path, resolve_root, ImageIndexBuilder, IndexError};
