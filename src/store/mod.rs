use anyhow::Result;
use async_trait::async_trait;

use crate::manifest::Manifest;

mod bson_dir;
#[cfg(test)]
mod shared;

pub use bson_dir::BsonDirStore;

/// Named manifest snapshots, used to diff a pin file against an earlier state.
#[async_trait]
pub trait SnapshotStore {
    async fn health_check(&self) -> Result<()>;
    async fn insert(&self, name: &str, manifest: &Manifest) -> Result<()>;
    async fn get(&self, name: &str) -> Result<Manifest>;
    async fn list(&self) -> Result<Vec<String>>;
    fn get_name(&self) -> &'static str;
}
