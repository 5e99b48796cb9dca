use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use super::ProviderResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStat {
    pub size: u64,
    pub is_file: bool,
    pub is_directory: bool,
    pub modified: Option<DateTime<Utc>>,
}

/// File access used by the file builtins. Paths arrive already resolved
/// against the configured working directory.
#[mockall::automock]
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read_to_string(&self, path: &Path) -> ProviderResult<String>;
    async fn write(&self, path: &Path, contents: &str) -> ProviderResult<()>;
    async fn append(&self, path: &Path, contents: &str) -> ProviderResult<()>;
    async fn exists(&self, path: &Path) -> bool;
    async fn stat(&self, path: &Path) -> ProviderResult<FileStat>;
    async fn create_dir_all(&self, path: &Path) -> ProviderResult<()>;
    /// Removes a file, or a directory with everything below it.
    async fn remove(&self, path: &Path) -> ProviderResult<()>;
    async fn rename(&self, from: &Path, to: &Path) -> ProviderResult<()>;
    async fn copy(&self, from: &Path, to: &Path) -> ProviderResult<()>;
    /// Entry names of a directory, sorted.
    async fn read_dir(&self, path: &Path) -> ProviderResult<Vec<String>>;
}

#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read_to_string(&self, path: &Path) -> ProviderResult<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write(&self, path: &Path, contents: &str) -> ProviderResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(tokio::fs::write(path, contents).await?)
    }

    async fn append(&self, path: &Path, contents: &str) -> ProviderResult<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(contents.as_bytes()).await?;
        Ok(file.flush().await?)
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn stat(&self, path: &Path) -> ProviderResult<FileStat> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(FileStat {
            size: metadata.len(),
            is_file: metadata.is_file(),
            is_directory: metadata.is_dir(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> ProviderResult<()> {
        Ok(tokio::fs::create_dir_all(path).await?)
    }

    async fn remove(&self, path: &Path) -> ProviderResult<()> {
        if tokio::fs::metadata(path).await?.is_dir() {
            Ok(tokio::fs::remove_dir_all(path).await?)
        } else {
            Ok(tokio::fs::remove_file(path).await?)
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> ProviderResult<()> {
        Ok(tokio::fs::rename(from, to).await?)
    }

    async fn copy(&self, from: &Path, to: &Path) -> ProviderResult<()> {
        tokio::fs::copy(from, to).await?;
        Ok(())
    }

    async fn read_dir(&self, path: &Path) -> ProviderResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
