use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::manifest::Manifest;
use crate::patterns::SNAPSHOT_NAME_PATTERN;
use crate::serialization::{
    read_binary_file_and_deserialize, save_to_binary_file, serialize_to_bson,
};

use super::SnapshotStore;

const SNAPSHOT_EXTENSION: &str = "bson";

/// Keeps each snapshot as `<name>.bson` inside one directory.
pub struct BsonDirStore {
    root: PathBuf,
}

impl BsonDirStore {
    pub async fn try_new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create snapshot store {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, name: &str) -> Result<PathBuf> {
        if !SNAPSHOT_NAME_PATTERN.is_match(name) {
            bail!("Invalid snapshot name {name:?}: use letters, digits, '.', '_' or '-'");
        }
        Ok(self.root.join(format!("{name}.{SNAPSHOT_EXTENSION}")))
    }
}

#[async_trait]
impl SnapshotStore for BsonDirStore {
    async fn health_check(&self) -> Result<()> {
        let metadata = fs::metadata(&self.root)
            .await
            .with_context(|| format!("Snapshot store {} is not accessible", self.root.display()))?;
        if !metadata.is_dir() {
            bail!("Snapshot store {} is not a directory", self.root.display());
        }
        Ok(())
    }

    async fn insert(&self, name: &str, manifest: &Manifest) -> Result<()> {
        let path = self.snapshot_path(name)?;
        let serialized = serialize_to_bson(manifest)?;
        save_to_binary_file(&path, &serialized).await?;
        debug!("Saved snapshot {} ({} bytes)", name, serialized.len());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Manifest> {
        let path = self.snapshot_path(name)?;
        if !fs::try_exists(&path).await? {
            bail!("No snapshot named {name:?} in {}", self.root.display());
        }
        read_binary_file_and_deserialize(&path).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = vec![];
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn get_name(&self) -> &'static str {
        "BSON directory"
    }
}

#[cfg(test)]
mod test {
    use super::BsonDirStore;
    use crate::store::{
        shared::{assert_manifest, create_manifest},
        SnapshotStore,
    };
    use anyhow::Result;
    use tempfile::TempDir;

    #[tokio::test]
    async fn success_init_creates_directory() -> Result<()> {
        // Arrange
        let dir = TempDir::new()?;

        // Act
        let store = BsonDirStore::try_new(dir.path().join("snapshots")).await?;

        // Assert
        store.health_check().await?;
        assert!(store.root().is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn insert_data() -> Result<()> {
        // Arrange
        let dir = TempDir::new()?;
        let store = BsonDirStore::try_new(dir.path()).await?;
        let generated = create_manifest();

        // Act
        store.insert("release-1.0", &generated).await?;
        let retrieved = store.get("release-1.0").await?;

        // Assert
        assert_manifest(&retrieved, &generated);
        Ok(())
    }

    #[tokio::test]
    async fn lists_saved_snapshots() -> Result<()> {
        // Arrange
        let dir = TempDir::new()?;
        let store = BsonDirStore::try_new(dir.path()).await?;
        tokio::fs::write(dir.path().join("notes.txt"), "not a snapshot").await?;

        // Act
        store.insert("b", &create_manifest()).await?;
        store.insert("a", &create_manifest()).await?;

        // Assert
        assert_eq!(store.list().await?, vec!["a", "b"]);
        Ok(())
    }

    #[tokio::test]
    async fn rejects_unknown_and_unsafe_names() -> Result<()> {
        let dir = TempDir::new()?;
        let store = BsonDirStore::try_new(dir.path()).await?;

        assert!(store.get("missing").await.is_err());
        assert!(store.insert("../escape", &create_manifest()).await.is_err());
        assert!(store.insert("", &create_manifest()).await.is_err());
        Ok(())
    }
}
