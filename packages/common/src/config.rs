use serde::Deserialize;

/// App-level blob storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageAppConfig {
    /// Root directory of the filesystem blob store. Default: "./media".
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Public URL prefix under which stored objects are served. Default: "/media".
    #[serde(default = "default_media_url")]
    pub media_url: String,
    /// Largest blob accepted by the store, in bytes. Default: 64 MiB.
    #[serde(default = "default_max_blob_size")]
    pub max_blob_size: u64,
}

fn default_base_path() -> String {
    "./media".into()
}
fn default_media_url() -> String {
    "/media".into()
}
fn default_max_blob_size() -> u64 {
    64 * 1024 * 1024
}

impl Default for StorageAppConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            media_url: default_media_url(),
            max_blob_size: default_max_blob_size(),
        }
    }
}
