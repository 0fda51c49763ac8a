use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{EditableInstall, Entry, Include, Line, PipOption, Requirement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Keep every line, comments and order; only the spelling of entries is canonicalized.
    #[default]
    Preserve,
    /// Drop comments, blank lines and exact duplicates; options first, then
    /// includes, requirements sorted by name, editable installs last.
    Normalize,
}

/// A parsed pin file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSummary {
    pub lines: usize,
    pub blank_lines: usize,
    pub comment_lines: usize,
    pub requirement_lines: usize,
    pub distinct_packages: usize,
    pub editable_installs: usize,
    pub includes: usize,
    pub options: usize,
    pub duplicated_packages: Vec<String>,
}

impl Manifest {
    pub fn new(lines: Vec<Line>) -> Self {
        Self { lines }
    }

    pub fn requirements(&self) -> Vec<&Requirement> {
        self.requirement_lines().map(|(_, req)| req).collect()
    }

    /// Requirements together with the line they were declared on.
    pub fn requirement_lines(&self) -> impl Iterator<Item = (usize, &Requirement)> {
        self.lines.iter().filter_map(|line| match &line.entry {
            Entry::Requirement(req) => Some((line.number, req)),
            _ => None,
        })
    }

    pub fn editables(&self) -> Vec<&EditableInstall> {
        self.lines
            .iter()
            .filter_map(|line| match &line.entry {
                Entry::Editable(editable) => Some(editable),
                _ => None,
            })
            .collect()
    }

    pub fn includes(&self) -> Vec<&Include> {
        self.lines
            .iter()
            .filter_map(|line| match &line.entry {
                Entry::Include(include) => Some(include),
                _ => None,
            })
            .collect()
    }

    pub fn options(&self) -> Vec<&PipOption> {
        self.lines
            .iter()
            .filter_map(|line| match &line.entry {
                Entry::GlobalOption(option) => Some(option),
                _ => None,
            })
            .collect()
    }

    pub fn requires_hashes(&self) -> bool {
        self.options().iter().any(|option| option.flag == "--require-hashes")
    }

    /// Normalized package names in first-seen order.
    pub fn distinct_packages(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.requirement_lines()
            .map(|(_, req)| req.normalized_name())
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    /// Normalized package names declared on more than one line, with those lines.
    pub fn duplicate_groups(&self) -> BTreeMap<String, Vec<usize>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (number, req) in self.requirement_lines() {
            groups.entry(req.normalized_name()).or_default().push(number);
        }
        groups.retain(|_, lines| lines.len() > 1);
        groups
    }

    pub fn summary(&self) -> ManifestSummary {
        let mut summary = ManifestSummary {
            lines: self.lines.len(),
            distinct_packages: self.distinct_packages().len(),
            duplicated_packages: self.duplicate_groups().into_keys().collect(),
            ..ManifestSummary::default()
        };

        for line in &self.lines {
            match line.entry {
                Entry::Requirement(_) => summary.requirement_lines += 1,
                Entry::Editable(_) => summary.editable_installs += 1,
                Entry::Include(_) => summary.includes += 1,
                Entry::GlobalOption(_) => summary.options += 1,
                Entry::Comment { .. } => summary.comment_lines += 1,
                Entry::Blank => summary.blank_lines += 1,
            }
        }

        summary
    }

    pub fn render(&self, mode: RenderMode) -> String {
        let rendered: Vec<String> = match mode {
            RenderMode::Preserve => self.lines.iter().map(ToString::to_string).collect(),
            RenderMode::Normalize => self.normalized_entries(),
        };

        if rendered.is_empty() {
            return String::new();
        }
        let mut out = rendered.join("\n");
        out.push('\n');
        out
    }

    fn normalized_entries(&self) -> Vec<String> {
        let mut options: Vec<String> = vec![];
        let mut includes: Vec<String> = vec![];
        let mut requirements: Vec<(String, String, &Requirement)> = vec![];
        let mut editables: Vec<String> = vec![];
        let mut seen_specs = HashSet::new();

        for line in &self.lines {
            match &line.entry {
                Entry::GlobalOption(option) => push_unique(&mut options, option.to_string()),
                Entry::Include(include) => push_unique(&mut includes, include.to_string()),
                Entry::Editable(editable) => push_unique(&mut editables, editable.to_string()),
                Entry::Requirement(req) => {
                    let name = req.normalized_name();
                    if seen_specs.insert((name.clone(), req.spec_key())) {
                        let marker = req.marker.clone().unwrap_or_default();
                        requirements.push((name, marker, req));
                    }
                }
                Entry::Comment { .. } | Entry::Blank => {}
            }
        }

        // Stable: equal keys keep their declaration order.
        requirements.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

        options
            .into_iter()
            .chain(includes)
            .chain(requirements.into_iter().map(|(_, _, req)| req.to_string()))
            .chain(editables)
            .collect()
    }
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}
