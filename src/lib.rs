pub mod config;
pub mod diff;
pub mod lint;
pub mod loader;
pub mod manifest;
mod models;
pub mod parser;
mod patterns;
pub mod report;
pub mod serialization;
pub mod store;

#[cfg(feature = "models")]
pub use models::{
    is_valid_name, normalize_name, EditableInstall, Entry, Include, IncludeKind, Line,
    ModelError, Operator, PipOption, Requirement, VersionConstraint,
};

pub use config::{ConfigError, LintConfig};
pub use diff::{diff, ManifestDiff, PackageChange};
pub use lint::{lint, lint_sources, Finding, FindingKind, LintReport, Location, Severity};
pub use loader::{load_manifest, load_tree, LoadError, SourcedManifest};
pub use manifest::{Manifest, ManifestSummary, RenderMode};
pub use parser::{parse_line, parse_manifest, parse_requirement, ParseError, ParseErrorKind};
pub use store::{BsonDirStore, SnapshotStore};
