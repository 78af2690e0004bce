use crate::types::Result;
use async_trait::async_trait;
use std::path::Path;

/// Where generated files end up.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn ensure_directory(&self, path: &Path) -> Result<()>;

    /// Writes (or overwrites) `file_name` inside `dir`.
    async fn write(&self, dir: &Path, file_name: &str, bytes: &[u8]) -> Result<()>;
}

/// Local filesystem store backed by `tokio::fs`.
#[derive(Debug, Clone, Default)]
pub struct FsContentStore;

impl FsContentStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn ensure_directory(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn write(&self, dir: &Path, file_name: &str, bytes: &[u8]) -> Result<()> {
        let target = dir.join(file_name);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!("Wrote {} bytes to {}", bytes.len(), target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_overwrites_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsContentStore::new();
        let dir = tmp.path().join("html_1");
        store.ensure_directory(&dir).await.unwrap();
        store.write(&dir, "index.html", b"first").await.unwrap();
        store.write(&dir, "index.html", b"second").await.unwrap();
        let content = tokio::fs::read_to_string(dir.join("index.html")).await.unwrap();
        assert_eq!(content, "second");
    }

    #[tokio::test]
    async fn test_write_creates_nested_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsContentStore::new();
        store
            .write(tmp.path(), "src/components/App.vue", b"<template/>")
            .await
            .unwrap();
        assert!(tmp.path().join("src/components/App.vue").exists());
    }
}
