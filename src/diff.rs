use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::manifest::Manifest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageChange {
    pub package: String,
    pub before: Vec<String>,
    pub after: Vec<String>,
}

/// Package-level difference between two manifests. Comments, ordering and
/// spelling of names are not changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<PackageChange>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

pub fn diff(old: &Manifest, new: &Manifest) -> ManifestDiff {
    let before = specs_by_package(old);
    let after = specs_by_package(new);
    let mut result = ManifestDiff::default();

    for (package, old_specs) in &before {
        match after.get(package) {
            None => result.removed.extend(old_specs.values().cloned()),
            Some(new_specs) if old_specs.keys().ne(new_specs.keys()) => {
                result.changed.push(PackageChange {
                    package: package.clone(),
                    before: old_specs.values().cloned().collect(),
                    after: new_specs.values().cloned().collect(),
                });
            }
            Some(_) => {}
        }
    }

    for (package, new_specs) in &after {
        if !before.contains_key(package) {
            result.added.extend(new_specs.values().cloned());
        }
    }

    result
}

/// normalized name -> spec key -> rendered requirement (first spelling wins).
fn specs_by_package(manifest: &Manifest) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut packages: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for requirement in manifest.requirements() {
        packages
            .entry(requirement.normalized_name())
            .or_default()
            .entry(requirement.spec_key())
            .or_insert_with(|| requirement.to_string());
    }
    packages
}
