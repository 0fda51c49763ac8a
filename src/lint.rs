use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LintConfig;
use crate::loader::SourcedManifest;
use crate::manifest::Manifest;
use crate::models::{Entry, IncludeKind, Requirement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    ConflictingPin,
    DuplicatePin,
    Unpinned,
    MissingHash,
    EditableNotLast,
}

impl FindingKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::ConflictingPin => "conflicting-pin",
            Self::DuplicatePin => "duplicate-pin",
            Self::Unpinned => "unpinned",
            Self::MissingHash => "missing-hash",
            Self::EditableNotLast => "editable-not-last",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub source: Option<PathBuf>,
    pub line: usize,
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(path) => write!(f, "{}:{}", path.display(), self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub kind: FindingKind,
    pub package: Option<String>,
    pub locations: Vec<Location>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintReport {
    pub findings: Vec<Finding>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    /// True when at least one finding is at or above `threshold`.
    pub fn exceeds(&self, threshold: Severity) -> bool {
        self.max_severity().is_some_and(|max| max >= threshold)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn of_kind(&self, kind: FindingKind) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.kind == kind).collect()
    }
}

struct Occurrence<'a> {
    source: Option<&'a Path>,
    kind: IncludeKind,
    line: usize,
    requirement: &'a Requirement,
}

impl Occurrence<'_> {
    fn location(&self) -> Location {
        Location {
            source: self.source.map(Path::to_path_buf),
            line: self.line,
        }
    }

    /// What an installer would be forced to pick: an exact version or a URL.
    fn target(&self) -> Option<String> {
        match (&self.requirement.url, self.requirement.pinned_version()) {
            (Some(url), _) => Some(url.clone()),
            (None, Some(version)) => Some(version.to_ascii_lowercase()),
            (None, None) => None,
        }
    }
}

type LintInput<'a> = (Option<&'a Path>, IncludeKind, &'a Manifest);

pub fn lint(manifest: &Manifest, config: &LintConfig) -> LintReport {
    lint_inputs(&[(None, IncludeKind::Requirements, manifest)], config)
}

/// Lints a whole include tree as one installation set.
pub fn lint_sources(sources: &[SourcedManifest], config: &LintConfig) -> LintReport {
    let inputs: Vec<LintInput> = sources
        .iter()
        .map(|s| (s.path.as_deref(), s.kind, &s.manifest))
        .collect();
    lint_inputs(&inputs, config)
}

fn lint_inputs(inputs: &[LintInput], config: &LintConfig) -> LintReport {
    let mut findings = vec![];
    let require_hashes = inputs.iter().any(|(_, _, manifest)| manifest.requires_hashes());
    let mut by_name: BTreeMap<String, Vec<Occurrence>> = BTreeMap::new();

    for &(source, kind, manifest) in inputs {
        for (line, requirement) in manifest.requirement_lines() {
            let name = requirement.normalized_name();
            if config.is_ignored(&name) {
                debug!(package = %name, "ignored by configuration");
                continue;
            }
            by_name.entry(name).or_default().push(Occurrence {
                source,
                kind,
                line,
                requirement,
            });
        }
        if kind == IncludeKind::Requirements {
            findings.extend(check_editable_order(source, manifest));
        }
    }

    for (name, occurrences) in &by_name {
        findings.extend(check_conflicts(name, occurrences));
        findings.extend(check_duplicates(name, occurrences, config));

        for occurrence in occurrences.iter().filter(|o| o.kind == IncludeKind::Requirements) {
            if !config.allow_unpinned && occurrence.target().is_none() {
                findings.push(Finding {
                    severity: Severity::Warning,
                    kind: FindingKind::Unpinned,
                    package: Some(name.clone()),
                    locations: vec![occurrence.location()],
                    message: format!(
                        "`{}` has no exact version pin",
                        occurrence.requirement
                    ),
                });
            }
            if require_hashes && occurrence.requirement.hashes.is_empty() {
                findings.push(Finding {
                    severity: Severity::Error,
                    kind: FindingKind::MissingHash,
                    package: Some(name.clone()),
                    locations: vec![occurrence.location()],
                    message: format!("`{name}` has no --hash but --require-hashes is set"),
                });
            }
        }
    }

    findings.sort_by(|a, b| {
        a.locations
            .first()
            .cmp(&b.locations.first())
            .then(a.kind.cmp(&b.kind))
    });
    debug!("Lint produced {} findings", findings.len());

    LintReport { findings }
}

fn check_conflicts(name: &str, occurrences: &[Occurrence]) -> Vec<Finding> {
    // Differing markers select different environments, so they never clash.
    let mut by_marker: BTreeMap<&str, BTreeMap<String, Vec<&Occurrence>>> = BTreeMap::new();
    for occurrence in occurrences {
        if let Some(target) = occurrence.target() {
            let marker = occurrence.requirement.marker.as_deref().map_or("", str::trim);
            by_marker
                .entry(marker)
                .or_default()
                .entry(target)
                .or_default()
                .push(occurrence);
        }
    }

    by_marker
        .into_values()
        .filter(|targets| targets.len() > 1)
        .map(|targets| {
            let described: Vec<String> = targets
                .iter()
                .map(|(target, occs)| {
                    let lines: Vec<String> =
                        occs.iter().map(|o| o.location().to_string()).collect();
                    format!("{target} ({})", lines.join(", "))
                })
                .collect();
            let mut locations: Vec<Location> =
                targets.values().flatten().map(|o| o.location()).collect();
            locations.sort();

            Finding {
                severity: Severity::Error,
                kind: FindingKind::ConflictingPin,
                package: Some(name.to_string()),
                locations,
                message: format!(
                    "`{name}` is pinned to conflicting targets: {}",
                    described.join("; ")
                ),
            }
        })
        .collect()
}

fn check_duplicates(name: &str, occurrences: &[Occurrence], config: &LintConfig) -> Vec<Finding> {
    let mut by_spec: BTreeMap<String, Vec<&Occurrence>> = BTreeMap::new();
    for occurrence in occurrences.iter().filter(|o| o.kind == IncludeKind::Requirements) {
        by_spec
            .entry(occurrence.requirement.spec_key())
            .or_default()
            .push(occurrence);
    }

    let severity = if config.deny_duplicates {
        Severity::Error
    } else {
        Severity::Warning
    };

    by_spec
        .into_values()
        .filter(|group| group.len() > 1)
        .map(|group| Finding {
            severity,
            kind: FindingKind::DuplicatePin,
            package: Some(name.to_string()),
            locations: group.iter().map(|o| o.location()).collect(),
            message: format!(
                "`{}` is declared {} times with identical pins; candidate for deduplication",
                group[0].requirement,
                group.len()
            ),
        })
        .collect()
}

fn check_editable_order(source: Option<&Path>, manifest: &Manifest) -> Option<Finding> {
    let (editable_line, editable) = manifest.lines.iter().find_map(|line| match &line.entry {
        Entry::Editable(editable) => Some((line.number, editable)),
        _ => None,
    })?;

    let trailing = manifest
        .requirement_lines()
        .filter(|(number, _)| *number > editable_line)
        .count();
    if trailing == 0 {
        return None;
    }

    Some(Finding {
        severity: Severity::Info,
        kind: FindingKind::EditableNotLast,
        package: None,
        locations: vec![Location {
            source: source.map(Path::to_path_buf),
            line: editable_line,
        }],
        message: format!("editable install `{editable}` is followed by {trailing} requirement(s)"),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse_manifest;

    fn lint_text(text: &str, config: &LintConfig) -> LintReport {
        lint(&parse_manifest(text).unwrap(), config)
    }

    #[test]
    fn clean_manifest_has_no_findings() {
        let report = lint_text("click==8.1.3\nrich==12.4.4\n-e .\n", &LintConfig::default());

        assert!(report.is_clean());
        assert!(!report.exceeds(Severity::Info));
    }

    #[test]
    fn identical_pins_are_a_duplicate_not_a_conflict() {
        // Act
        let report = lint_text(
            "fastapi==0.78.0\nclick==8.1.3\nFastAPI==0.78.0\n",
            &LintConfig::default(),
        );

        // Assert
        assert!(report.of_kind(FindingKind::ConflictingPin).is_empty());
        let duplicates = report.of_kind(FindingKind::DuplicatePin);
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].severity, Severity::Warning);
        assert_eq!(duplicates[0].package.as_deref(), Some("fastapi"));
        assert_eq!(
            duplicates[0].locations.iter().map(|l| l.line).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert!(!report.exceeds(Severity::Error));
    }

    #[test]
    fn deny_duplicates_escalates_to_error() {
        let config = LintConfig {
            deny_duplicates: true,
            ..LintConfig::default()
        };

        let report = lint_text("fastapi==0.78.0\nfastapi==0.78.0\n", &config);

        assert_eq!(report.count(Severity::Error), 1);
        assert!(report.exceeds(Severity::Error));
    }

    #[test]
    fn different_pins_conflict() {
        // Act
        let report = lint_text(
            "fastapi==0.78.0\nfastapi==0.79.0\n",
            &LintConfig::default(),
        );

        // Assert
        let conflicts = report.of_kind(FindingKind::ConflictingPin);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, Severity::Error);
        assert_eq!(
            conflicts[0].message,
            "`fastapi` is pinned to conflicting targets: 0.78.0 (line 1); 0.79.0 (line 2)"
        );
        assert!(report.of_kind(FindingKind::DuplicatePin).is_empty());
    }

    #[test]
    fn different_markers_do_not_conflict() {
        let report = lint_text(
            "numpy==1.21.6; python_version < \"3.8\"\nnumpy==1.22.4; python_version >= \"3.8\"\n",
            &LintConfig::default(),
        );

        assert!(report.is_clean());
    }

    #[test]
    fn unpinned_is_a_warning_unless_allowed() {
        // Arrange
        let text = "globus-sdk>=3\nclick==8.1.3\n";
        let allow = LintConfig {
            allow_unpinned: true,
            ..LintConfig::default()
        };

        // Act
        let strict = lint_text(text, &LintConfig::default());
        let lenient = lint_text(text, &allow);

        // Assert
        let unpinned = strict.of_kind(FindingKind::Unpinned);
        assert_eq!(unpinned.len(), 1);
        assert_eq!(unpinned[0].message, "`globus-sdk>=3` has no exact version pin");
        assert!(lenient.is_clean());
    }

    #[test]
    fn require_hashes_flags_unhashed_requirements() {
        let report = lint_text(
            "--require-hashes\nclick==8.1.3 --hash=sha256:ab\nrich==12.4.4\n",
            &LintConfig::default(),
        );

        let missing = report.of_kind(FindingKind::MissingHash);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].package.as_deref(), Some("rich"));
    }

    #[test]
    fn editable_followed_by_requirements_is_info() {
        let report = lint_text("-e .\nclick==8.1.3\n", &LintConfig::default());

        assert_eq!(report.max_severity(), Some(Severity::Info));
        assert_eq!(report.findings[0].kind, FindingKind::EditableNotLast);
    }

    #[test]
    fn ignored_packages_are_skipped() {
        let config = LintConfig {
            ignore: vec!["FastAPI".into()],
            ..LintConfig::default()
        };

        let report = lint_text("fastapi==0.78.0\nfastapi==0.79.0\n", &config);

        assert!(report.is_clean());
    }

    #[test]
    fn constraint_files_conflict_but_never_duplicate() {
        // Arrange
        let requirements = parse_manifest("-c constraints.txt\nclick==8.1.3\nrich==12.4.4\n").unwrap();
        let constraints = parse_manifest("click==8.1.3\nrich==12.0.0\nhttpx\n").unwrap();
        let sources = vec![
            SourcedManifest {
                path: Some("requirements.txt".into()),
                kind: IncludeKind::Requirements,
                manifest: requirements,
            },
            SourcedManifest {
                path: Some("constraints.txt".into()),
                kind: IncludeKind::Constraints,
                manifest: constraints,
            },
        ];

        // Act
        let report = lint_sources(&sources, &LintConfig::default());

        // Assert
        assert_eq!(report.findings.len(), 1);
        let conflict = &report.findings[0];
        assert_eq!(conflict.kind, FindingKind::ConflictingPin);
        assert_eq!(
            conflict.message,
            "`rich` is pinned to conflicting targets: 12.0.0 (constraints.txt:2); 12.4.4 (requirements.txt:3)"
        );
    }

    #[test]
    fn editable_order_is_not_checked_in_constraint_files() {
        // Arrange
        let requirements = parse_manifest("-c constraints.txt
click==8.1.3
").unwrap();
        let constraints = parse_manifest("-e .
rich==12.4.4
").unwrap();
        let sources = vec![
            SourcedManifest {
                path: Some("requirements.txt".into()),
                kind: IncludeKind::Requirements,
                manifest: requirements,
            },
            SourcedManifest {
                path: Some("constraints.txt".into()),
                kind: IncludeKind::Constraints,
                manifest: constraints,
            },
        ];

        // Act
        let report = lint_sources(&sources, &LintConfig::default());

        // Assert
        assert!(report.of_kind(FindingKind::EditableNotLast).is_empty());
        assert!(report.is_clean());
    }
}
