use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::patterns::{PACKAGE_NAME_PATTERN, VERSION_PATTERN};

/// Comparison operator of a single version constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "===")]
    ArbitraryEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "~=")]
    Compatible,
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">")]
    Greater,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ArbitraryEqual => "===",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Compatible => "~=",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Less => "<",
            Self::Greater => ">",
        }
    }

    /// Whether the operator fixes a single version.
    pub fn is_exact(self) -> bool {
        matches!(self, Self::Equal | Self::ArbitraryEqual)
    }
}

impl FromStr for Operator {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "===" => Ok(Self::ArbitraryEqual),
            "==" => Ok(Self::Equal),
            "!=" => Ok(Self::NotEqual),
            "~=" => Ok(Self::Compatible),
            "<=" => Ok(Self::LessEqual),
            ">=" => Ok(Self::GreaterEqual),
            "<" => Ok(Self::Less),
            ">" => Ok(Self::Greater),
            other => Err(ModelError::UnknownOperator(other.to_string())),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionConstraint {
    pub operator: Operator,
    pub version: String,
}

impl VersionConstraint {
    pub fn new(operator: Operator, version: impl Into<String>) -> Result<Self, ModelError> {
        let version = version.into();
        if !VERSION_PATTERN.is_match(&version) {
            return Err(ModelError::InvalidVersion(version));
        }
        // `.*` only makes sense as a prefix match.
        if version.ends_with(".*") && !matches!(operator, Operator::Equal | Operator::NotEqual) {
            return Err(ModelError::WildcardNotAllowed { operator, version });
        }
        Ok(Self { operator, version })
    }
}

impl Display for VersionConstraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)
    }
}

/// One package specifier: `name[extras]constraints ; marker`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub extras: Vec<String>,
    pub constraints: Vec<VersionConstraint>,
    pub url: Option<String>,
    pub marker: Option<String>,
    pub hashes: Vec<String>,
}

impl Requirement {
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(ModelError::InvalidPackageName(name));
        }

        Ok(Self {
            name,
            extras: vec![],
            constraints: vec![],
            url: None,
            marker: None,
            hashes: vec![],
        })
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Result<Self, ModelError> {
        let extra = extra.into();
        if !is_valid_name(&extra) {
            return Err(ModelError::InvalidExtra(extra));
        }
        self.extras.push(extra);
        Ok(self)
    }

    pub fn with_constraint(mut self, constraint: VersionConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn pinned(name: impl Into<String>, version: impl Into<String>) -> Result<Self, ModelError> {
        Ok(Self::new(name)?.with_constraint(VersionConstraint::new(Operator::Equal, version)?))
    }

    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Version fixed by the single exact constraint, if there is exactly one.
    pub fn pinned_version(&self) -> Option<&str> {
        let mut exact = self.constraints.iter().filter(|c| c.operator.is_exact());
        match (exact.next(), exact.next()) {
            (Some(c), None) if !c.version.ends_with(".*") => Some(&c.version),
            _ => None,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned_version().is_some()
    }

    /// Comparison key for duplicate detection: everything except the spelling
    /// of the name, ordering of extras/constraints, hashes and comments.
    pub fn spec_key(&self) -> String {
        let mut extras: Vec<String> = self.extras.iter().map(|e| normalize_name(e)).collect();
        extras.sort();
        extras.dedup();

        let mut constraints: Vec<String> =
            self.constraints.iter().map(ToString::to_string).collect();
        constraints.sort();

        format!(
            "[{}]{}@{};{}",
            extras.join(","),
            constraints.join(","),
            self.url.as_deref().unwrap_or(""),
            self.marker.as_deref().map(str::trim).unwrap_or("")
        )
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }

        let constraints: Vec<String> = self.constraints.iter().map(ToString::to_string).collect();
        f.write_str(&constraints.join(","))?;

        match (&self.url, &self.marker) {
            (Some(url), Some(marker)) => write!(f, " @ {url} ; {marker}")?,
            (Some(url), None) => write!(f, " @ {url}")?,
            (None, Some(marker)) => write!(f, "; {marker}")?,
            (None, None) => {}
        }

        for hash in &self.hashes {
            write!(f, " --hash={hash}")?;
        }
        Ok(())
    }
}

/// Marker requesting a development (linked) install, e.g. `-e .`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditableInstall {
    pub target: String,
}

impl EditableInstall {
    pub fn new(target: impl Into<String>) -> Result<Self, ModelError> {
        let target = target.into();
        if target.trim().is_empty() {
            return Err(ModelError::EmptyEditableTarget);
        }
        Ok(Self { target })
    }

    pub fn is_local_project(&self) -> bool {
        self.target == "." || self.target == "./"
    }
}

impl Display for EditableInstall {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "-e {}", self.target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeKind {
    /// `-r file`: every line of the file is a requirement.
    Requirements,
    /// `-c file`: lines only constrain versions of packages pulled in elsewhere.
    Constraints,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Include {
    pub kind: IncludeKind,
    pub path: String,
}

impl Display for Include {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            IncludeKind::Requirements => write!(f, "-r {}", self.path),
            IncludeKind::Constraints => write!(f, "-c {}", self.path),
        }
    }
}

/// Global installer option such as `--index-url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipOption {
    pub flag: String,
    pub value: Option<String>,
}

impl Display for PipOption {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {}", self.flag, value),
            None => f.write_str(&self.flag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    Requirement(Requirement),
    Editable(EditableInstall),
    Include(Include),
    GlobalOption(PipOption),
    Comment { text: String },
    Blank,
}

impl Display for Entry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requirement(req) => req.fmt(f),
            Self::Editable(editable) => editable.fmt(f),
            Self::Include(include) => include.fmt(f),
            Self::GlobalOption(option) => option.fmt(f),
            Self::Comment { text } => f.write_str(text),
            Self::Blank => Ok(()),
        }
    }
}

/// A logical manifest line. `number` is the 1-based physical line it starts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub number: usize,
    pub entry: Entry,
    pub comment: Option<String>,
}

impl Display for Line {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.entry.fmt(f)?;
        if let Some(comment) = &self.comment {
            if comment.is_empty() {
                f.write_str(" #")?;
            } else {
                write!(f, " # {comment}")?;
            }
        }
        Ok(())
    }
}

/// Canonical package name: lowercase with runs of `-`, `_` and `.` folded into `-`.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                normalized.push('-');
            }
            in_separator = true;
        } else {
            normalized.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }
    normalized
}

pub fn is_valid_name(name: &str) -> bool {
    PACKAGE_NAME_PATTERN.is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("invalid package name: {0:?}")]
    InvalidPackageName(String),
    #[error("invalid extra name: {0:?}")]
    InvalidExtra(String),
    #[error("invalid version: {0:?}")]
    InvalidVersion(String),
    #[error("wildcard version {version:?} is only allowed with == or !=, not {operator}")]
    WildcardNotAllowed { operator: Operator, version: String },
    #[error("unknown version operator: {0:?}")]
    UnknownOperator(String),
    #[error("editable install target must not be empty")]
    EmptyEditableTarget,
}
