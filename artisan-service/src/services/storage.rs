use async_trait::async_trait;
use service_core::error::AppError;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError>;
    async fn download(&self, key: &str) -> Result<Vec<u8>, AppError>;
    /// Deleting a missing key is a no-op.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Media files on the local filesystem, rooted at the media directory.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        let is_safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

        if !is_safe {
            return Err(AppError::bad_request(format!("Invalid storage key: {}", key)));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await.map_err(|e| {
            tracing::error!(key = %key, "Failed to write media file: {}", e);
            AppError::StorageError(anyhow::Error::new(e))
        })?;
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AppError::not_found(format!("Media file not found: {}", key)))
            }
            Err(e) => Err(AppError::StorageError(anyhow::Error::new(e))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::StorageError(anyhow::Error::new(e))),
        }
    }
}
