//! Lint repairs: unused imports and trailing whitespace.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::FailureRecord;

use super::source::{indent_of, split_comment, SourceFile};
use super::Edit;

fn unused_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)['`]([\w. ]+)['`] imported but unused|unused import:? ['`]?([\w.]+)")
            .expect("valid regex")
    })
}

pub(crate) fn apply(record: &FailureRecord, src: &mut SourceFile) -> Option<Edit> {
    let msg = record.message.to_lowercase();

    if msg.contains("imported but unused") || msg.contains("unused import") {
        let caps = unused_import_re().captures(&record.message)?;
        let symbol = caps.get(1).or_else(|| caps.get(2))?.as_str().to_string();
        return drop_unused_import(record.line, &symbol, src);
    }

    if msg.contains("trailing whitespace") {
        return strip_trailing(record.line, src);
    }

    // Unused variables are recognized but never patched.
    None
}

/// Imported names bound by an import line: `(bound name, full item)`.
fn bound_names(code: &str) -> Option<(ImportForm, Vec<String>)> {
    let stripped = code.trim();
    if code.contains('(') || code.trim_end().ends_with('\\') {
        return None;
    }
    if let Some(rest) = stripped.strip_prefix("import ") {
        let items = rest.split(',').map(|s| s.trim().to_string()).collect();
        return Some((ImportForm::Plain, items));
    }
    let rest = stripped.strip_prefix("from ")?;
    let (module, items) = rest.split_once(" import ")?;
    let items = items.split(',').map(|s| s.trim().to_string()).collect();
    Some((ImportForm::From(module.trim().to_string()), items))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ImportForm {
    Plain,
    From(String),
}

/// Whether an import item (`os.path`, `List`, `numpy as np`) provides the
/// symbol a linter reported (`os.path`, `typing.List`, `numpy as np`, `np`).
fn item_matches(form: &ImportForm, item: &str, symbol: &str) -> bool {
    let mut parts = item.split_whitespace();
    let target = parts.next().unwrap_or("");
    let alias = match (parts.next(), parts.next()) {
        (Some("as"), Some(alias)) => Some(alias),
        _ => None,
    };
    let qualified = match form {
        ImportForm::Plain => target.to_string(),
        ImportForm::From(module) => format!("{module}.{target}"),
    };
    symbol == qualified
        || symbol == target
        || alias == Some(symbol)
        || symbol == format!("{qualified} as {}", alias.unwrap_or(""))
}

fn drop_unused_import(line: u32, symbol: &str, src: &mut SourceFile) -> Option<Edit> {
    let text = src.line(line)?;
    let (code, comment) = split_comment(text);
    let (form, items) = bound_names(code)?;
    let keep: Vec<&String> = items
        .iter()
        .filter(|item| !item_matches(&form, item, symbol))
        .collect();
    if keep.len() == items.len() {
        return None;
    }

    if !keep.is_empty() {
        let indent = indent_of(code);
        let list = keep
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let head = match &form {
            ImportForm::Plain => "import".to_string(),
            ImportForm::From(module) => format!("from {module} import"),
        };
        let spacer = if comment.is_empty() { "" } else { "  " };
        let fixed = format!("{indent}{head} {list}{spacer}{comment}");
        src.set_line(line, fixed);
        return Some(Edit::in_place("drop_unused_import_name", line));
    }

    if src.is_sole_block_statement(line) {
        let indent = indent_of(text).to_string();
        src.set_line(line, format!("{indent}pass"));
        return Some(Edit::in_place("drop_unused_import", line));
    }

    src.remove_line(line);
    Some(Edit::removed("drop_unused_import", line))
}

fn strip_trailing(line: u32, src: &mut SourceFile) -> Option<Edit> {
    let text = src.line(line)?;
    let stripped = text.trim_end();
    if stripped.len() == text.len() {
        return None;
    }
    let fixed = stripped.to_string();
    src.set_line(line, fixed);
    Some(Edit::in_place("strip_trailing_whitespace", line))
}
