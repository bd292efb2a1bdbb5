//! Storage of submission files under the platform's files directory.
//!
//! Paths handed to this repository are relative (`repos/{preprintId}/{name}`), the
//! same value stored in `preprint_file.file`.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

#[async_trait]
pub trait FilesRepo: Send + Sync {
    /// Writes `contents` so that readers never observe a partially written file.
    async fn write_atomic(&self, relative_path: &str, contents: Bytes) -> Result<u64, io::Error>;

    async fn exists(&self, relative_path: &str) -> bool;

    /// Returns whether a file was removed.
    async fn remove(&self, relative_path: &str) -> Result<bool, io::Error>;
}

#[derive(Debug, Clone, Default)]
pub struct LocalFilesRepo {
    pub base_dir: PathBuf,
}

impl LocalFilesRepo {
    fn resolve(&self, relative_path: &str) -> Result<PathBuf, io::Error> {
        let relative = Path::new(relative_path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, std::path::Component::ParentDir))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to write outside the files directory: {relative_path}"),
            ));
        }
        Ok(self.base_dir.join(relative))
    }
}

#[async_trait]
impl FilesRepo for LocalFilesRepo {
    async fn write_atomic(&self, relative_path: &str, contents: Bytes) -> Result<u64, io::Error> {
        let target = self.resolve(relative_path)?;
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone());
        fs::create_dir_all(&parent).await?;
        let temp = parent.join(format!(".{}.part", Uuid::new_v4()));
        if let Err(err) = fs::write(&temp, &contents).await {
            let _ = fs::remove_file(&temp).await;
            return Err(err);
        }
        if let Err(err) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(err);
        }
        Ok(contents.len() as u64)
    }

    async fn exists(&self, relative_path: &str) -> bool {
        match self.resolve(relative_path) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn remove(&self, relative_path: &str) -> Result<bool, io::Error> {
        let path = self.resolve(relative_path)?;
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}
