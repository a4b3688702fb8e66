//! Test-runner output classifier.
//!
//! Normalizes raw pytest / CPython traceback / lint output into an ordered list
//! of [`FailureRecord`]s. Classification is pure: the only environment access
//! is resolving relative repository roots against the working directory.
//!
//! Each error line (`NameError: ...`, `E   SyntaxError: ...`) is attributed to
//! the most recent location line seen before it (the innermost frame). Lint
//! lines (`path:line:col: CODE message`) carry their own location. Diagnostics
//! without a location, or whose file is not inside the repository, are dropped.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{FailureKind, FailureRecord};

/// Typing generics whose `NameError` is a missing import rather than a logic bug.
pub const TYPING_GENERICS: &[&str] = &[
    "List", "Dict", "Optional", "Set", "Tuple", "Union", "Any", "Callable", "Iterable",
    "Mapping", "Sequence", "TypeVar", "Generic",
];

/// Directory names whose files are never attributed to the repository.
const EXCLUDED_DIRS: &[&str] = &[
    ".venv",
    "venv",
    "env",
    "site-packages",
    "dist-packages",
    "node_modules",
    "__pycache__",
    ".git",
];

// ---------------------------------------------------------------------------
// Pattern catalog
// ---------------------------------------------------------------------------

/// How a catalog entry recognizes a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Case-insensitive substring of the message (needle is lowercase).
    Text(&'static str),
    /// Exception class name (last dotted segment).
    Exception(&'static str),
    /// `name 'X' is not defined` where `X` is in [`TYPING_GENERICS`].
    UndefinedTypingName,
}

/// One entry of the fixed diagnostic catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    pub kind: FailureKind,
    pub variant: &'static str,
    pub matcher: Matcher,
}

const fn text(kind: FailureKind, variant: &'static str, needle: &'static str) -> Pattern {
    Pattern {
        kind,
        variant,
        matcher: Matcher::Text(needle),
    }
}

const fn exception(kind: FailureKind, variant: &'static str, name: &'static str) -> Pattern {
    Pattern {
        kind,
        variant,
        matcher: Matcher::Exception(name),
    }
}

/// Catalog in priority order; the first matching entry decides the kind.
pub const CATALOG: &[Pattern] = &[
    text(FailureKind::Syntax, "missing_colon", "expected ':'"),
    text(FailureKind::Syntax, "missing_colon", "expected \":\""),
    text(FailureKind::Syntax, "print_statement", "missing parentheses in call to"),
    text(FailureKind::Syntax, "invalid_syntax", "invalid syntax"),
    text(FailureKind::Syntax, "unterminated_string", "unterminated string literal"),
    text(FailureKind::Syntax, "unterminated_string", "eol while scanning string literal"),
    text(FailureKind::Syntax, "empty_block", "expected an indented block"),
    exception(FailureKind::Syntax, "syntax_error", "SyntaxError"),
    text(FailureKind::Indentation, "unindent_mismatch", "unindent does not match"),
    text(FailureKind::Indentation, "unexpected_indent", "unexpected indent"),
    text(FailureKind::Indentation, "mixed_tabs", "inconsistent use of tabs"),
    exception(FailureKind::Indentation, "indentation_error", "IndentationError"),
    exception(FailureKind::Indentation, "tab_error", "TabError"),
    Pattern {
        kind: FailureKind::TypeError,
        variant: "missing_typing_import",
        matcher: Matcher::UndefinedTypingName,
    },
    text(FailureKind::TypeError, "str_concat", "can only concatenate str"),
    text(FailureKind::TypeError, "str_concat", "must be str, not"),
    text(FailureKind::TypeError, "missing_argument", "required positional argument"),
    text(FailureKind::TypeError, "unsupported_operand", "unsupported operand type"),
    exception(FailureKind::TypeError, "type_error", "TypeError"),
    text(FailureKind::Import, "module_missing", "no module named"),
    text(FailureKind::Import, "name_missing", "cannot import name"),
    text(FailureKind::Import, "relative_import", "attempted relative import"),
    exception(FailureKind::Import, "import_error", "ImportError"),
    exception(FailureKind::Import, "module_not_found", "ModuleNotFoundError"),
    text(FailureKind::Logic, "undefined_name", "is not defined"),
    text(FailureKind::Logic, "missing_attribute", "has no attribute"),
    text(FailureKind::Logic, "division_by_zero", "division by zero"),
    text(FailureKind::Logic, "index_out_of_range", "index out of range"),
    exception(FailureKind::Logic, "name_error", "NameError"),
    exception(FailureKind::Logic, "attribute_error", "AttributeError"),
    exception(FailureKind::Logic, "zero_division", "ZeroDivisionError"),
    exception(FailureKind::Logic, "index_error", "IndexError"),
    text(FailureKind::Linting, "unused_import", "imported but unused"),
    text(FailureKind::Linting, "unused_import", "unused import"),
    text(FailureKind::Linting, "trailing_whitespace", "trailing whitespace"),
    text(FailureKind::Linting, "unused_variable", "assigned to but never used"),
    text(FailureKind::Linting, "unused_variable", "unused variable"),
];

impl Pattern {
    fn matches(&self, exception: Option<&str>, lowered: &str, message: &str) -> bool {
        match self.matcher {
            Matcher::Text(needle) => lowered.contains(needle),
            Matcher::Exception(name) => exception == Some(name),
            Matcher::UndefinedTypingName => undefined_name(message)
                .map(|n| TYPING_GENERICS.contains(&n))
                .unwrap_or(false),
        }
    }
}

/// Find the catalog entry for a diagnostic, honoring kind priority.
pub fn match_pattern(exception: Option<&str>, message: &str) -> Option<&'static Pattern> {
    let exception = exception.map(|e| e.rsplit('.').next().unwrap_or(e));
    let lowered = message.to_lowercase();
    CATALOG
        .iter()
        .find(|p| p.matches(exception, &lowered, message))
}

/// Extract `X` from `name 'X' is not defined`.
pub fn undefined_name(message: &str) -> Option<&str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"name '(\w+)' is not defined").expect("valid regex"));
    re.captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

// ---------------------------------------------------------------------------
// Line grammar
// ---------------------------------------------------------------------------

struct Grammar {
    pytest_prefix: Regex,
    separator: Regex,
    lint: Regex,
    frame: Regex,
    pytest_location: Regex,
    error: Regex,
}

fn grammar() -> &'static Grammar {
    static GRAMMAR: OnceLock<Grammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| Grammar {
        pytest_prefix: Regex::new(r"^E(?:\s+|$)").expect("valid regex"),
        separator: Regex::new(r"^(?:_{3,}|={3,}).*(?:_{3,}|={3,})\s*$").expect("valid regex"),
        lint: Regex::new(r"^(?P<path>[^\s:<][^:]*\.\w+):(?P<line>\d+):(?P<col>\d+):\s*(?P<msg>.+)$")
            .expect("valid regex"),
        frame: Regex::new(r#"^\s*File "(?P<path>[^"]+)", line (?P<line>\d+)"#).expect("valid regex"),
        pytest_location: Regex::new(r"^(?P<path>[^\s:<][^:]*\.\w+):(?P<line>\d+):(?:\s|$)")
            .expect("valid regex"),
        error: Regex::new(
            r"^(?P<exc>[A-Za-z_][\w.]*(?:Error|Exception|Warning))(?::\s*(?P<msg>.*))?$",
        )
        .expect("valid regex"),
    })
}

#[derive(Debug, Clone)]
struct Location {
    path: String,
    line: u32,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify raw runner output into ordered failure records.
///
/// Records keep the order their diagnostics appeared in; exact duplicates
/// (same kind, file, line and message) are collapsed to the first occurrence.
pub fn classify(raw: &str, repo_root: &Path) -> Vec<FailureRecord> {
    let g = grammar();
    let root = absolute_root(repo_root);
    let mut location: Option<Location> = None;
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for raw_line in raw.lines() {
        let line = raw_line.trim_end();
        let (content, prefixed) = match g.pytest_prefix.find(line) {
            Some(m) => (line[m.end()..].trim_start(), true),
            None => (line, false),
        };

        if !prefixed && g.separator.is_match(content) {
            location = None;
            continue;
        }

        if let Some(caps) = g.lint.captures(content) {
            let message = caps["msg"].trim();
            if let Some(pattern) = match_pattern(None, message) {
                push_record(
                    &mut records,
                    &mut seen,
                    &root,
                    pattern.kind,
                    &caps["path"],
                    &caps["line"],
                    message,
                );
            }
            continue;
        }

        if let Some(caps) = g.frame.captures(content) {
            location = parse_location(&caps["path"], &caps["line"]);
            continue;
        }

        if let Some(caps) = g.pytest_location.captures(content) {
            location = parse_location(&caps["path"], &caps["line"]);
            continue;
        }

        // Unprefixed error lines must start at column 0 so indented source
        // echoes are never mistaken for diagnostics.
        if !prefixed && content.starts_with(char::is_whitespace) {
            continue;
        }

        if let Some(caps) = g.error.captures(content) {
            let exc = &caps["exc"];
            let detail = caps.name("msg").map(|m| m.as_str()).unwrap_or("");
            let Some(loc) = location.take() else {
                tracing::trace!(exception = %exc, "dropping diagnostic without location");
                continue;
            };
            let message = if detail.is_empty() {
                exc.to_string()
            } else {
                format!("{exc}: {detail}")
            };
            if let Some(pattern) = match_pattern(Some(exc), &message) {
                push_record(
                    &mut records,
                    &mut seen,
                    &root,
                    pattern.kind,
                    &loc.path,
                    &loc.line.to_string(),
                    &message,
                );
            }
        }
    }

    records
}

fn parse_location(path: &str, line: &str) -> Option<Location> {
    let line = line.parse().ok()?;
    Some(Location {
        path: path.to_string(),
        line,
    })
}

fn push_record(
    records: &mut Vec<FailureRecord>,
    seen: &mut HashSet<FailureRecord>,
    root: &Path,
    kind: FailureKind,
    path: &str,
    line: &str,
    message: &str,
) {
    let Some(file) = resolve_in_repo(path, root) else {
        tracing::debug!(path = %path, "dropping diagnostic outside repository");
        return;
    };
    let Ok(line) = line.parse::<u32>() else {
        return;
    };
    let record = FailureRecord::new(kind, file, line, message);
    if seen.insert(record.clone()) {
        records.push(record);
    }
}

fn absolute_root(repo_root: &Path) -> PathBuf {
    let root = if repo_root.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(repo_root))
            .unwrap_or_else(|_| repo_root.to_path_buf())
    } else {
        repo_root.to_path_buf()
    };
    normalize(&root)
}

/// Lexically normalize `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve a reported path to a `/`-separated path relative to `root`.
///
/// Returns `None` for pseudo-files (`<frozen ...>`, `<string>`), paths that
/// escape the root, and files inside environment or vendor directories.
pub fn resolve_in_repo(reported: &str, root: &Path) -> Option<String> {
    let reported = reported.trim();
    if reported.is_empty() || reported.starts_with('<') {
        return None;
    }
    let path = Path::new(reported);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    let normalized = normalize(&joined);
    let relative = normalized.strip_prefix(root).ok()?;

    let mut parts = Vec::new();
    for component in relative.components() {
        let Component::Normal(part) = component else {
            return None;
        };
        let part = part.to_str()?;
        if EXCLUDED_DIRS.contains(&part) {
            return None;
        }
        parts.push(part);
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
