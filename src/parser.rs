use thiserror::Error;
use tracing::{debug, trace};

use crate::manifest::Manifest;
use crate::models::{
    EditableInstall, Entry, Include, IncludeKind, Line, ModelError, Operator, PipOption,
    Requirement, VersionConstraint,
};
use crate::patterns::{
    CONSTRAINT_PATTERN, HASH_PATTERN, INLINE_COMMENT_PATTERN, REQUIREMENT_HEAD_PATTERN,
};

struct OptionSpec {
    short: Option<&'static str>,
    long: &'static str,
    takes_value: bool,
}

const KNOWN_OPTIONS: &[OptionSpec] = &[
    OptionSpec { short: Some("-e"), long: "--editable", takes_value: true },
    OptionSpec { short: Some("-r"), long: "--requirement", takes_value: true },
    OptionSpec { short: Some("-c"), long: "--constraint", takes_value: true },
    OptionSpec { short: Some("-i"), long: "--index-url", takes_value: true },
    OptionSpec { short: None, long: "--extra-index-url", takes_value: true },
    OptionSpec { short: None, long: "--no-index", takes_value: false },
    OptionSpec { short: Some("-f"), long: "--find-links", takes_value: true },
    OptionSpec { short: None, long: "--pre", takes_value: false },
    OptionSpec { short: None, long: "--prefer-binary", takes_value: false },
    OptionSpec { short: None, long: "--only-binary", takes_value: true },
    OptionSpec { short: None, long: "--no-binary", takes_value: true },
    OptionSpec { short: None, long: "--require-hashes", takes_value: false },
    OptionSpec { short: None, long: "--trusted-host", takes_value: true },
    OptionSpec { short: None, long: "--use-feature", takes_value: true },
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("malformed requirement: {0:?}")]
    Malformed(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("invalid version constraint: {0:?}")]
    InvalidConstraint(String),
    #[error("environment marker after ';' is empty")]
    EmptyMarker,
    #[error("direct reference is missing its URL after '@'")]
    MissingUrl,
    #[error("unexpected text after direct reference: {0:?}")]
    TrailingText(String),
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("option {0} requires a value")]
    MissingOptionValue(String),
    #[error("option {0} does not take a value")]
    UnexpectedOptionValue(String),
    #[error("option {0} is not allowed after a requirement (only --hash is)")]
    UnexpectedRequirementOption(String),
    #[error("invalid hash {0:?}, expected <algorithm>:<hex digest>")]
    InvalidHash(String),
}

/// Parses a whole manifest. Fails on the first line that is neither a comment,
/// a blank line, a known option nor a valid package specifier.
pub fn parse_manifest(text: &str) -> Result<Manifest, ParseError> {
    let mut lines = vec![];
    for (number, logical) in join_continuations(text) {
        lines.push(parse_line(&logical, number)?);
    }

    debug!("Parsed {} manifest lines", lines.len());
    Ok(Manifest::new(lines))
}

/// Parses one logical line.
pub fn parse_line(text: &str, number: usize) -> Result<Line, ParseError> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Ok(Line { number, entry: Entry::Blank, comment: None });
    }
    if trimmed.starts_with('#') {
        return Ok(Line {
            number,
            entry: Entry::Comment { text: trimmed.to_string() },
            comment: None,
        });
    }

    let (body, comment) = split_inline_comment(trimmed);
    trace!(line = number, body, "parsing line");

    let entry = if body.starts_with('-') {
        parse_option(body)
    } else {
        parse_requirement(body).map(Entry::Requirement)
    }
    .map_err(|kind| ParseError { line: number, kind })?;

    Ok(Line { number, entry, comment })
}

/// Parses a single package specifier such as `uvicorn[standard]==0.17.6`.
pub fn parse_requirement(text: &str) -> Result<Requirement, ParseErrorKind> {
    let (spec_part, option_part) = match option_tail_start(text) {
        Some(start) => (&text[..start], Some(&text[start..])),
        None => (text, None),
    };
    let spec_part = spec_part.trim();

    let caps = REQUIREMENT_HEAD_PATTERN
        .captures(spec_part)
        .ok_or_else(|| ParseErrorKind::Malformed(spec_part.to_string()))?;

    let mut requirement = Requirement::new(&caps["name"])?;
    if let Some(extras) = caps.name("extras") {
        for extra in extras.as_str().split(',').map(str::trim).filter(|e| !e.is_empty()) {
            requirement = requirement.with_extra(extra)?;
        }
    }

    let rest = caps.name("rest").map_or("", |m| m.as_str()).trim();
    if let Some(reference) = rest.strip_prefix('@') {
        parse_direct_reference(reference.trim(), &mut requirement)?;
    } else {
        let (spec, marker) = split_marker(rest)?;
        requirement.constraints = parse_constraints(spec)?;
        requirement.marker = marker;
    }

    if let Some(options) = option_part {
        requirement.hashes = parse_hashes(options)?;
    }

    Ok(requirement)
}

/// Joins `\`-continued physical lines. Each logical line keeps the number of
/// the physical line it starts on.
fn join_continuations(text: &str) -> Vec<(usize, String)> {
    let mut logical = vec![];
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let number = idx + 1;
        let is_comment = raw.trim_start().starts_with('#');

        if !is_comment {
            if let Some(head) = raw.strip_suffix('\\') {
                match pending.as_mut() {
                    Some((_, buffer)) => buffer.push_str(head),
                    None => pending = Some((number, head.to_string())),
                }
                continue;
            }
        }

        match pending.take() {
            Some((start, mut buffer)) => {
                if is_comment {
                    buffer.push(' ');
                }
                buffer.push_str(raw);
                logical.push((start, buffer));
            }
            None => logical.push((number, raw.to_string())),
        }
    }

    if let Some(rest) = pending.take() {
        logical.push(rest);
    }

    logical
}

/// Byte offset of the whitespace run before the first `--` that sits outside
/// a quoted marker string.
fn option_tail_start(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut whitespace_start: Option<usize> = None;

    for (idx, c) in text.char_indices() {
        if let Some(open) = quote {
            if c == open {
                quote = None;
            }
            continue;
        }
        if c.is_whitespace() {
            whitespace_start.get_or_insert(idx);
            continue;
        }
        if let Some(start) = whitespace_start {
            if text[idx..].starts_with("--") {
                return Some(start);
            }
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
        }
        whitespace_start = None;
    }

    None
}

fn split_inline_comment(text: &str) -> (&str, Option<String>) {
    match INLINE_COMMENT_PATTERN.captures(text) {
        Some(caps) => {
            let start = caps.get(0).map_or(text.len(), |m| m.start());
            let comment = caps.name("text").map_or("", |m| m.as_str()).trim();
            (text[..start].trim_end(), Some(comment.to_string()))
        }
        None => (text, None),
    }
}

fn split_marker(rest: &str) -> Result<(&str, Option<String>), ParseErrorKind> {
    match rest.split_once(';') {
        Some((spec, marker)) => {
            let marker = marker.trim();
            if marker.is_empty() {
                return Err(ParseErrorKind::EmptyMarker);
            }
            Ok((spec.trim(), Some(marker.to_string())))
        }
        None => Ok((rest, None)),
    }
}

fn parse_constraints(spec: &str) -> Result<Vec<VersionConstraint>, ParseErrorKind> {
    let mut spec = spec.trim();
    if spec.is_empty() {
        return Ok(vec![]);
    }
    if let Some(inner) = spec.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        spec = inner.trim();
    }

    spec.split(',').map(|c| parse_constraint(c.trim())).collect()
}

fn parse_constraint(text: &str) -> Result<VersionConstraint, ParseErrorKind> {
    let caps = CONSTRAINT_PATTERN
        .captures(text)
        .ok_or_else(|| ParseErrorKind::InvalidConstraint(text.to_string()))?;
    let operator: Operator = caps["op"].parse()?;
    Ok(VersionConstraint::new(operator, &caps["version"])?)
}

fn parse_direct_reference(
    reference: &str,
    requirement: &mut Requirement,
) -> Result<(), ParseErrorKind> {
    let (url, remainder) = match reference.split_once(char::is_whitespace) {
        Some((url, remainder)) => (url, remainder.trim()),
        None => (reference, ""),
    };
    if url.is_empty() || url.starts_with(';') {
        return Err(ParseErrorKind::MissingUrl);
    }
    requirement.url = Some(url.to_string());

    if remainder.is_empty() {
        return Ok(());
    }
    match remainder.strip_prefix(';').map(str::trim) {
        Some("") => Err(ParseErrorKind::EmptyMarker),
        Some(marker) => {
            requirement.marker = Some(marker.to_string());
            Ok(())
        }
        None => Err(ParseErrorKind::TrailingText(remainder.to_string())),
    }
}

fn parse_hashes(options: &str) -> Result<Vec<String>, ParseErrorKind> {
    let mut hashes = vec![];
    let mut tokens = options.split_whitespace();

    while let Some(token) = tokens.next() {
        let value = if let Some(value) = token.strip_prefix("--hash=") {
            value
        } else if token == "--hash" {
            tokens
                .next()
                .ok_or_else(|| ParseErrorKind::MissingOptionValue("--hash".into()))?
        } else {
            let flag = token.split('=').next().unwrap_or(token);
            return Err(ParseErrorKind::UnexpectedRequirementOption(flag.to_string()));
        };

        if !HASH_PATTERN.is_match(value) {
            return Err(ParseErrorKind::InvalidHash(value.to_string()));
        }
        hashes.push(value.to_string());
    }

    Ok(hashes)
}

fn parse_option(body: &str) -> Result<Entry, ParseErrorKind> {
    let token_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let token = &body[..token_end];

    let (flag, value) = match token.split_once('=') {
        Some((flag, _)) if flag.starts_with("--") => (flag, &body[flag.len() + 1..]),
        _ => (token, &body[token_end..]),
    };

    let (spec, value) = match find_option(flag) {
        Some(spec) => (spec, value.trim()),
        // `-rbase.txt` style: short flag glued to its value.
        None => match find_glued_short_option(token) {
            Some(spec) => (spec, body[2..].trim()),
            None => return Err(ParseErrorKind::UnknownOption(flag.to_string())),
        },
    };
    let value = (!value.is_empty()).then_some(value);

    match (spec.takes_value, value) {
        (true, None) => return Err(ParseErrorKind::MissingOptionValue(spec.long.to_string())),
        (false, Some(_)) => {
            return Err(ParseErrorKind::UnexpectedOptionValue(spec.long.to_string()))
        }
        _ => {}
    }

    let entry = match (spec.long, value) {
        ("--editable", Some(target)) => Entry::Editable(EditableInstall::new(target)?),
        ("--requirement", Some(path)) => Entry::Include(Include {
            kind: IncludeKind::Requirements,
            path: path.to_string(),
        }),
        ("--constraint", Some(path)) => Entry::Include(Include {
            kind: IncludeKind::Constraints,
            path: path.to_string(),
        }),
        (_, value) => Entry::GlobalOption(PipOption {
            flag: spec.long.to_string(),
            value: value.map(str::to_string),
        }),
    };

    Ok(entry)
}

fn find_option(flag: &str) -> Option<&'static OptionSpec> {
    KNOWN_OPTIONS
        .iter()
        .find(|spec| spec.long == flag || spec.short == Some(flag))
}

fn find_glued_short_option(token: &str) -> Option<&'static OptionSpec> {
    if token.starts_with("--") || token.len() <= 2 {
        return None;
    }
    KNOWN_OPTIONS
        .iter()
        .find(|spec| spec.takes_value && spec.short.is_some_and(|short| token.starts_with(short)))
}

#[cfg(test)]
mod test {
    use super::*;

    fn requirement(text: &str) -> Requirement {
        parse_requirement(text).unwrap()
    }

    #[test]
    fn parses_exact_pin() {
        let req = requirement("fastapi==0.78.0");

        assert_eq!(req.name, "fastapi");
        assert!(req.extras.is_empty());
        assert_eq!(req.pinned_version(), Some("0.78.0"));
    }

    #[test]
    fn parses_extras_and_multiple_constraints() {
        let req = requirement("uvicorn[standard, watch] >= 0.17 , < 0.18");

        assert_eq!(req.extras, vec!["standard", "watch"]);
        assert_eq!(req.constraints.len(), 2);
        assert_eq!(req.constraints[0].operator, Operator::GreaterEqual);
        assert_eq!(req.constraints[1].operator, Operator::Less);
        assert_eq!(req.to_string(), "uvicorn[standard,watch]>=0.17,<0.18");
    }

    #[test]
    fn parses_parenthesized_constraints_and_marker() {
        let req = requirement("dataclasses (==0.8) ; python_version < \"3.7\"");

        assert_eq!(req.pinned_version(), Some("0.8"));
        assert_eq!(req.marker.as_deref(), Some("python_version < \"3.7\""));
    }

    #[test]
    fn parses_bare_name() {
        let req = requirement("globus-sdk");

        assert!(req.constraints.is_empty());
        assert!(!req.is_pinned());
    }

    #[test]
    fn parses_direct_reference() {
        let req = requirement("balsam @ git+https://github.com/argonne-lcf/balsam.git ; os_name == 'posix'");

        assert_eq!(
            req.url.as_deref(),
            Some("git+https://github.com/argonne-lcf/balsam.git")
        );
        assert_eq!(req.marker.as_deref(), Some("os_name == 'posix'"));
    }

    #[test]
    fn parses_hashes() {
        let req = requirement("click==8.1.3 --hash=sha256:abc123 --hash sha256:DEF456");

        assert_eq!(req.hashes, vec!["sha256:abc123", "sha256:DEF456"]);
        assert_eq!(req.pinned_version(), Some("8.1.3"));
    }

    #[test]
    fn double_dash_inside_quoted_marker_is_not_an_option() {
        // Arrange
        let text = "foo==1.0; extra == \"a --b\"";
        let hashed = "foo==1.0 ; platform_version == 'x --y' --hash=sha256:abc123";

        // Act
        let req = requirement(text);
        let with_hash = requirement(hashed);
        let manifest = parse_manifest("foo==1.0; extra == \"a --b\"\n").unwrap();

        // Assert
        assert_eq!(req.marker.as_deref(), Some("extra == \"a --b\""));
        assert!(req.hashes.is_empty());
        assert_eq!(with_hash.marker.as_deref(), Some("platform_version == 'x --y'"));
        assert_eq!(with_hash.hashes, vec!["sha256:abc123"]);
        assert_eq!(manifest.requirements().len(), 1);
    }

    #[test]
    fn rejects_bad_specifiers() {
        assert_eq!(
            parse_requirement("fastapi=0.78.0"),
            Err(ParseErrorKind::InvalidConstraint("=0.78.0".into()))
        );
        assert_eq!(
            parse_requirement("fastapi==0.78.0,"),
            Err(ParseErrorKind::InvalidConstraint("".into()))
        );
        assert_eq!(parse_requirement("fastapi==1.0;"), Err(ParseErrorKind::EmptyMarker));
        assert_eq!(parse_requirement("fastapi @ "), Err(ParseErrorKind::MissingUrl));
        assert!(matches!(
            parse_requirement("fastapi[bad extra]==1.0"),
            Err(ParseErrorKind::Model(ModelError::InvalidExtra(_)))
        ));
        assert!(matches!(
            parse_requirement("fastapi==1.0 --hash=md5"),
            Err(ParseErrorKind::InvalidHash(_))
        ));
        assert_eq!(
            parse_requirement("fastapi==1.0 --install-option=x"),
            Err(ParseErrorKind::UnexpectedRequirementOption("--install-option".into()))
        );
    }

    #[test]
    fn parses_comment_blank_and_inline_comment() {
        // Act
        let comment = parse_line("# Deploy-specific pins", 1).unwrap();
        let blank = parse_line("   ", 2).unwrap();
        let pinned = parse_line("redis==4.3.1  # cache", 3).unwrap();

        // Assert
        assert_eq!(comment.entry, Entry::Comment { text: "# Deploy-specific pins".into() });
        assert_eq!(blank.entry, Entry::Blank);
        assert_eq!(pinned.comment.as_deref(), Some("cache"));
        assert!(matches!(pinned.entry, Entry::Requirement(ref r) if r.name == "redis"));
    }

    #[test]
    fn hash_in_url_fragment_is_not_a_comment() {
        let line = parse_line("-e git+https://example.org/repo.git#egg=balsam", 1).unwrap();

        assert_eq!(line.comment, None);
        assert_eq!(
            line.entry,
            Entry::Editable(EditableInstall {
                target: "git+https://example.org/repo.git#egg=balsam".into()
            })
        );
    }

    #[test]
    fn parses_editable_marker_in_all_spellings() {
        for text in ["-e .", "--editable .", "--editable=.", "-e."] {
            let line = parse_line(text, 1).unwrap();
            assert_eq!(
                line.entry,
                Entry::Editable(EditableInstall { target: ".".into() }),
                "{text}"
            );
        }
    }

    #[test]
    fn parses_includes_and_global_options() {
        // Act
        let include = parse_line("-r base.txt", 1).unwrap();
        let constraint = parse_line("--constraint=constraints.txt", 2).unwrap();
        let index = parse_line("-i https://pypi.org/simple", 3).unwrap();
        let pre = parse_line("--pre", 4).unwrap();

        // Assert
        assert_eq!(
            include.entry,
            Entry::Include(Include { kind: IncludeKind::Requirements, path: "base.txt".into() })
        );
        assert_eq!(
            constraint.entry,
            Entry::Include(Include {
                kind: IncludeKind::Constraints,
                path: "constraints.txt".into()
            })
        );
        assert_eq!(
            index.entry,
            Entry::GlobalOption(PipOption {
                flag: "--index-url".into(),
                value: Some("https://pypi.org/simple".into())
            })
        );
        assert_eq!(
            pre.entry,
            Entry::GlobalOption(PipOption { flag: "--pre".into(), value: None })
        );
    }

    #[test]
    fn rejects_bad_options() {
        assert_eq!(
            parse_line("--frobnicate", 7).unwrap_err(),
            ParseError { line: 7, kind: ParseErrorKind::UnknownOption("--frobnicate".into()) }
        );
        assert_eq!(
            parse_line("-e", 8).unwrap_err().kind,
            ParseErrorKind::MissingOptionValue("--editable".into())
        );
        assert_eq!(
            parse_line("--pre now", 9).unwrap_err().kind,
            ParseErrorKind::UnexpectedOptionValue("--pre".into())
        );
    }

    #[test]
    fn joins_continuation_lines() {
        // Arrange
        let text = "fastapi==0.78.0 \\\n    --hash=sha256:aa \\\n    --hash=sha256:bb\nclick==8.1.3\n";

        // Act
        let manifest = parse_manifest(text).unwrap();

        // Assert
        assert_eq!(manifest.lines.len(), 2);
        assert_eq!(manifest.lines[0].number, 1);
        assert_eq!(manifest.lines[1].number, 4);
        let reqs = manifest.requirements();
        assert_eq!(reqs[0].hashes, vec!["sha256:aa", "sha256:bb"]);
    }

    #[test]
    fn reports_failing_line_number() {
        let err = parse_manifest("click==8.1.3\n\nrich~~1.0\n").unwrap_err();

        assert_eq!(err.line, 3);
        assert_eq!(err.to_string(), "line 3: invalid version constraint: \"~~1.0\"");
    }
}
