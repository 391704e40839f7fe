//! State management module
//!
//! This module holds everything the service keeps between requests:
//! - Manifest data structures (data.rs)
//! - The lock-free name → path cache (cache.rs)
//! - The shared host settings file (settings.rs)

pub mod cache;
pub mod data;
pub mod settings;
