//! Plain-text rendering for CLI output. JSON output goes through `serialization::to_json`.

use std::fmt::Write;

use crate::diff::ManifestDiff;
use crate::lint::{LintReport, Severity};
use crate::manifest::{Manifest, ManifestSummary};
use crate::models::Entry;

pub fn render_summary(summary: &ManifestSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "lines:             {}", summary.lines);
    let _ = writeln!(out, "requirement lines: {}", summary.requirement_lines);
    let _ = writeln!(out, "distinct packages: {}", summary.distinct_packages);
    let _ = writeln!(out, "editable installs: {}", summary.editable_installs);
    let _ = writeln!(out, "includes:          {}", summary.includes);
    let _ = writeln!(out, "options:           {}", summary.options);
    let _ = writeln!(out, "comments:          {}", summary.comment_lines);
    let _ = writeln!(out, "blank lines:       {}", summary.blank_lines);
    if !summary.duplicated_packages.is_empty() {
        let _ = writeln!(out, "duplicated:        {}", summary.duplicated_packages.join(", "));
    }
    out
}

/// One row per non-blank, non-comment line: `<line> <kind> <entry>`.
pub fn render_entries(manifest: &Manifest) -> String {
    let mut out = String::new();
    for line in &manifest.lines {
        let kind = match &line.entry {
            Entry::Requirement(_) => "package",
            Entry::Editable(_) => "editable",
            Entry::Include(_) => "include",
            Entry::GlobalOption(_) => "option",
            Entry::Comment { .. } | Entry::Blank => continue,
        };
        let _ = writeln!(out, "{:>4}  {:<8}  {}", line.number, kind, line.entry);
    }
    out
}

pub fn render_findings(report: &LintReport) -> String {
    if report.is_clean() {
        return "no findings\n".to_string();
    }

    let mut out = String::new();
    for finding in &report.findings {
        let location = finding
            .locations
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{location}: {}[{}]: {}",
            finding.severity,
            finding.kind.code(),
            finding.message
        );
    }
    let _ = writeln!(
        out,
        "{} finding(s): {} error(s), {} warning(s), {} info",
        report.findings.len(),
        report.count(Severity::Error),
        report.count(Severity::Warning),
        report.count(Severity::Info)
    );
    out
}

pub fn render_diff(diff: &ManifestDiff) -> String {
    if diff.is_empty() {
        return "no package changes\n".to_string();
    }

    let mut out = String::new();
    for added in &diff.added {
        let _ = writeln!(out, "+ {added}");
    }
    for removed in &diff.removed {
        let _ = writeln!(out, "- {removed}");
    }
    for change in &diff.changed {
        let _ = writeln!(
            out,
            "~ {}: {} -> {}",
            change.package,
            change.before.join(" | "),
            change.after.join(" | ")
        );
    }
    out
}
