use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::manifest::Manifest;
use crate::models::{Include, IncludeKind};
use crate::parser::{parse_manifest, ParseError};

/// A manifest together with the file it came from and how it was pulled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcedManifest {
    pub path: Option<PathBuf>,
    pub kind: IncludeKind,
    pub manifest: Manifest,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("include cycle: {}", .chain.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> "))]
    IncludeCycle { chain: Vec<PathBuf> },
}

pub async fn load_manifest(path: &Path) -> Result<Manifest, LoadError> {
    let text = fs::read_to_string(path).await.map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_manifest(&text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads `root` and every file reachable through `-r`/`-c`, each once, in
/// discovery order. Include paths resolve against the including file.
pub async fn load_tree(root: &Path) -> Result<Vec<SourcedManifest>, LoadError> {
    let mut loaded = vec![];
    let mut visited = HashMap::new();
    let mut chain = vec![];

    visit(
        root.to_path_buf(),
        IncludeKind::Requirements,
        &mut chain,
        &mut visited,
        &mut loaded,
    )
    .await?;

    info!("Loaded {} manifest file(s) from {}", loaded.len(), root.display());
    Ok(loaded)
}

type VisitFuture<'a> = Pin<Box<dyn Future<Output = Result<(), LoadError>> + Send + 'a>>;

fn visit<'a>(
    path: PathBuf,
    kind: IncludeKind,
    chain: &'a mut Vec<PathBuf>,
    visited: &'a mut HashMap<PathBuf, usize>,
    loaded: &'a mut Vec<SourcedManifest>,
) -> VisitFuture<'a> {
    Box::pin(async move {
        let canonical = fs::canonicalize(&path).await.map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;

        if chain.contains(&canonical) {
            let mut cycle = chain.clone();
            cycle.push(canonical);
            return Err(LoadError::IncludeCycle { chain: cycle });
        }
        let includes: Vec<Include> = match visited.get(&canonical).copied() {
            // A file first seen through `-c` is installed once `-r` reaches it.
            Some(index)
                if kind == IncludeKind::Requirements
                    && loaded[index].kind == IncludeKind::Constraints =>
            {
                debug!("{} reached through -r, upgrading from constraints", path.display());
                loaded[index].kind = IncludeKind::Requirements;
                loaded[index].manifest.includes().into_iter().cloned().collect()
            }
            Some(_) => {
                debug!("{} already loaded, skipping", path.display());
                return Ok(());
            }
            None => {
                let manifest = load_manifest(&path).await?;
                let includes = manifest.includes().into_iter().cloned().collect();
                visited.insert(canonical.clone(), loaded.len());
                loaded.push(SourcedManifest {
                    path: Some(path.clone()),
                    kind,
                    manifest,
                });
                includes
            }
        };
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        debug!("{} includes {} file(s)", path.display(), includes.len());

        chain.push(canonical);
        for include in includes {
            // Anything reached through a constraints file only constrains.
            let child_kind = match kind {
                IncludeKind::Constraints => IncludeKind::Constraints,
                IncludeKind::Requirements => include.kind,
            };
            visit(base.join(&include.path), child_kind, chain, visited, loaded).await?;
        }
        chain.pop();

        Ok(())
    })
}
