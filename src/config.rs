use std::path::PathBuf;

/// Default scan folder, relative to the base directory
pub const DEFAULT_IMAGE_DIR: &str = "./web/images";

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub host: String,
    /// HTTP listen port.
    pub port: u16,
    /// Base directory that relative image folders are resolved against.
    pub base_dir: PathBuf,
    /// Explicit settings file. When `None` the host layout is detected from
    /// the working directory.
    pub settings_path: Option<PathBuf>,
    /// Prefix for the keys this service owns in the settings file.
    pub namespace: String,
    /// Route prefix; empty mounts the routes at the root.
    pub api_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8188,
            base_dir: PathBuf::from("."),
            settings_path: None,
            namespace: "PreviewIndex".to_string(),
            api_prefix: "/PreviewIndex".to_string(),
        }
    }
}

impl ServerConfig {
    /// Settings key holding the image folder
    pub fn save_path_key(&self) -> String {
        format!("{}.preview-image-save-path", self.namespace)
    }

    /// Settings key holding the favorites list
    pub fn favorites_key(&self) -> String {
        format!("{}.favorites", self.namespace)
    }
}
