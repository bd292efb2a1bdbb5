//! Source of PLOS submission packages.
//!
//! The feed is delivered to a drop directory (the FTPS transfer itself happens outside
//! this crate). Files are listed, read as bytes and removed once staged locally.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::PathBuf;
use tokio::fs;

#[async_trait]
pub trait SubmissionSourceRepo: Send + Sync {
    async fn list(&self) -> Result<Vec<String>, io::Error>;

    async fn retrieve(&self, name: &str) -> Result<Bytes, io::Error>;

    async fn delete(&self, name: &str) -> Result<(), io::Error>;
}

#[derive(Debug, Clone, Default)]
pub struct DirectorySubmissionSource {
    pub dir: PathBuf,
}

#[async_trait]
impl SubmissionSourceRepo for DirectorySubmissionSource {
    async fn list(&self) -> Result<Vec<String>, io::Error> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn retrieve(&self, name: &str) -> Result<Bytes, io::Error> {
        Ok(Bytes::from(fs::read(self.dir.join(name)).await?))
    }

    async fn delete(&self, name: &str) -> Result<(), io::Error> {
        fs::remove_file(self.dir.join(name)).await
    }
}
