use std::path::Path;

use anyhow::{Context, Result};
use bson::{doc, Document};
use serde::Serialize;
use tokio::{fs::File, io::AsyncWriteExt};

use crate::manifest::Manifest;

pub fn serialize_to_bson(manifest: &Manifest) -> Result<Vec<u8>> {
    let bson_doc = doc! { "manifest": bson::to_bson(manifest)? };

    let mut buffer = vec![];
    bson_doc.to_writer(&mut buffer)?;
    Ok(buffer)
}

pub fn deserialize_from_bson(bytes: &[u8]) -> Result<Manifest> {
    let document = Document::from_reader(bytes)?;
    let manifest = document
        .get("manifest")
        .context("BSON document has no `manifest` field")?
        .to_owned();
    Ok(bson::from_bson(manifest)?)
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize to JSON")
}

pub async fn save_to_binary_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

pub async fn read_binary_file_and_deserialize(path: &Path) -> Result<Manifest> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    deserialize_from_bson(&bytes).with_context(|| format!("Invalid BSON manifest {}", path.display()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::manifest::RenderMode;
    use crate::parser::parse_manifest;
    use tempfile::TempDir;

    const TEXT: &str = "\
# deploy
--index-url https://pypi.org/simple
uvicorn[standard]==0.17.6 # server
balsam @ https://example.org/balsam.tar.gz ; os_name == \"posix\"

-e .
";

    #[tokio::test]
    async fn bson_file_keeps_every_line() -> Result<()> {
        // Arrange
        let dir = TempDir::new()?;
        let path = dir.path().join("manifest.bson");
        let manifest = parse_manifest(TEXT)?;

        // Act
        save_to_binary_file(&path, &serialize_to_bson(&manifest)?).await?;
        let restored = read_binary_file_and_deserialize(&path).await?;

        // Assert
        assert_eq!(restored, manifest);
        assert_eq!(restored.render(RenderMode::Preserve), TEXT);
        Ok(())
    }

    #[test]
    fn json_tags_entries_by_kind() -> Result<()> {
        let manifest = parse_manifest("fastapi==0.78.0\n-e .\n")?;

        let json: serde_json::Value = serde_json::from_str(&to_json(&manifest)?)?;

        assert_eq!(json["lines"][0]["entry"]["kind"], "requirement");
        assert_eq!(json["lines"][0]["entry"]["constraints"][0]["operator"], "==");
        assert_eq!(json["lines"][1]["entry"]["kind"], "editable");
        assert_eq!(json["lines"][1]["entry"]["target"], ".");
        Ok(())
    }

    #[test]
    fn rejects_document_without_manifest() -> Result<()> {
        let mut buffer = vec![];
        doc! { "packages": [] }.to_writer(&mut buffer)?;

        assert!(deserialize_from_bson(&buffer).is_err());
        Ok(())
    }
}
