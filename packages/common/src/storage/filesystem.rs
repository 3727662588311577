use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use super::error::StorageError;
use super::key::ObjectKey;
use super::traits::{BlobStore, BoxReader, StoredBlob};
use crate::config::StorageAppConfig;

/// Filesystem-backed blob store.
///
/// An object with key `a/b/c.jpg` lives at `{base_path}/a/b/c.jpg` and is
/// served from `{media_url}/a/b/c.jpg`. Writes go through a temp file in
/// `{base_path}/.tmp` followed by a rename.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    media_url: String,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store.
    pub async fn new(
        base_path: PathBuf,
        media_url: impl Into<String>,
        max_size: u64,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            media_url: media_url.into().trim_end_matches('/').to_string(),
            max_size,
        })
    }

    pub async fn from_config(config: &StorageAppConfig) -> Result<Self, StorageError> {
        Self::new(
            PathBuf::from(&config.base_path),
            config.media_url.clone(),
            config.max_blob_size,
        )
        .await
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn blob_path(&self, key: &ObjectKey) -> PathBuf {
        key.as_str()
            .split('/')
            .fold(self.base_path.clone(), |path, segment| path.join(segment))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Move a finished temp file into place, cleaning up on failure.
    async fn commit(&self, temp_path: &Path, key: &ObjectKey) -> Result<(), StorageError> {
        let blob_path = self.blob_path(key);
        if let Some(parent) = blob_path.parent()
            && let Err(e) = fs::create_dir_all(parent).await
        {
            let _ = fs::remove_file(temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(temp_path, &blob_path).await {
            let _ = fs::remove_file(temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    /// Copy `reader` into a fresh temp file, returning its size and checksum.
    /// The caller removes the temp file on error.
    async fn write_temp(
        &self,
        temp_path: &Path,
        mut reader: BoxReader,
    ) -> Result<(u64, String), StorageError> {
        let mut hasher = Sha256::new();
        let mut total_bytes: u64 = 0;

        let mut buf = vec![0u8; 64 * 1024];
        let mut temp_file = fs::File::create(temp_path).await?;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            total_bytes += n as u64;
            self.check_size(total_bytes)?;

            hasher.update(&buf[..n]);
            temp_file.write_all(&buf[..n]).await?;
        }

        temp_file.flush().await?;
        Ok((total_bytes, hex::encode(hasher.finalize())))
    }

    fn check_size(&self, actual: u64) -> Result<(), StorageError> {
        if actual > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual,
                limit: self.max_size,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, key: &ObjectKey, data: &[u8]) -> Result<StoredBlob, StorageError> {
        self.check_size(data.len() as u64)?;

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        self.commit(&temp_path, key).await?;

        debug!(key = %key, size = data.len(), "Stored blob");
        Ok(StoredBlob {
            key: key.clone(),
            size: data.len() as u64,
            checksum: hex::encode(Sha256::digest(data)),
        })
    }

    async fn put_stream(
        &self,
        key: &ObjectKey,
        reader: BoxReader,
    ) -> Result<StoredBlob, StorageError> {
        let temp_path = self.temp_path();

        let (size, checksum) = match self.write_temp(&temp_path, reader).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        self.commit(&temp_path, key).await?;

        debug!(key = %key, size, "Stored blob from stream");
        Ok(StoredBlob {
            key: key.clone(),
            size,
            checksum,
        })
    }

    async fn get_stream(&self, key: &ObjectKey) -> Result<BoxReader, StorageError> {
        match fs::File::open(self.blob_path(key)).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.blob_path(key)).await?)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        match fs::remove_file(self.blob_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn size(&self, key: &ObjectKey) -> Result<u64, StorageError> {
        match fs::metadata(self.blob_path(key)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, key: &ObjectKey) -> String {
        format!("{}/{}", self.media_url, key)
    }
}
