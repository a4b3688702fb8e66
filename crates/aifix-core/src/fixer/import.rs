//! Import repairs: comment out missing modules, drop unimportable names.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::FailureRecord;

use super::source::{indent_of, split_comment, SourceFile};
use super::Edit;

fn missing_module_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"No module named '([\w.]+)'").expect("valid regex"))
}

fn missing_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"cannot import name '(\w+)'(?: from '([\w.]+)')?").expect("valid regex")
    })
}

pub(crate) fn apply(record: &FailureRecord, src: &mut SourceFile) -> Option<Edit> {
    if let Some(caps) = missing_module_re().captures(&record.message) {
        let module = caps[1].to_string();
        let own_line = src
            .line(record.line)
            .is_some_and(|text| imports_module(text, &module, true));
        let line = if own_line {
            record.line
        } else {
            find_import(record.line, src, |text| imports_module(text, &module, false))?
        };
        return disable_line(line, src, "comment_out_import");
    }

    if let Some(caps) = missing_name_re().captures(&record.message) {
        let name = caps[1].to_string();
        let from = caps.get(2).map(|m| m.as_str().to_string());
        let line = find_import(record.line, src, |text| {
            from_import_parts(text)
                .map(|(module, items)| {
                    module_matches(&module, from.as_deref())
                        && items.iter().any(|item| import_name(item) == name)
                })
                .unwrap_or(false)
        })?;
        return remove_imported_name(line, &name, src);
    }

    // Relative-import errors are recognized but never patched.
    None
}

/// The record's own line when it matches, otherwise the first matching line.
fn find_import(line: u32, src: &SourceFile, matches: impl Fn(&str) -> bool) -> Option<u32> {
    if let Some(text) = src.line(line) {
        if matches(text) {
            return Some(line);
        }
    }
    src.lines()
        .iter()
        .position(|text| matches(text))
        .map(|idx| idx as u32 + 1)
}

/// Replace an import line with its commented-out form, or with `pass` plus
/// the comment when it is the only statement of its block.
fn disable_line(line: u32, src: &mut SourceFile, rule: &'static str) -> Option<Edit> {
    let text = src.line(line)?;
    let indent = indent_of(text).to_string();
    let body = text.trim();
    let fixed = if src.is_sole_block_statement(line) {
        format!("{indent}pass  # {body}")
    } else {
        format!("{indent}# {body}")
    };
    src.set_line(line, fixed);
    Some(Edit::in_place(rule, line))
}

/// Whether a single-line import statement is unsafe to rewrite.
fn is_multiline(code: &str) -> bool {
    let open = code.matches('(').count();
    let close = code.matches(')').count();
    open != close || code.trim_end().ends_with('\\')
}

/// Whether `text` imports `module` or one of its submodules. A parent
/// package import (`import app` for `app.missing`) counts only when
/// `allow_parent` is set.
fn imports_module(text: &str, module: &str, allow_parent: bool) -> bool {
    let (code, _) = split_comment(text);
    if is_multiline(code) {
        return false;
    }
    let stripped = code.trim();
    let related = |candidate: &str| {
        candidate == module
            || candidate.starts_with(&format!("{module}."))
            || (allow_parent && module.starts_with(&format!("{candidate}.")))
    };
    if let Some(rest) = stripped.strip_prefix("import ") {
        return rest
            .split(',')
            .map(|item| item.trim().split_whitespace().next().unwrap_or(""))
            .any(related);
    }
    if let Some((from, _)) = from_import_parts(text) {
        return related(&from);
    }
    false
}

/// `(module, items)` of a single-line `from M import a, b as c` statement.
/// Parentheses on the same line are accepted.
fn from_import_parts(text: &str) -> Option<(String, Vec<String>)> {
    let (code, _) = split_comment(text);
    if is_multiline(code) {
        return None;
    }
    let rest = code.trim().strip_prefix("from ")?;
    let (module, items) = rest.split_once(" import ")?;
    let items = items.trim().trim_start_matches('(').trim_end_matches(')');
    let items: Vec<String> = items
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() || items.iter().any(|i| i == "*") {
        return None;
    }
    Some((module.trim().to_string(), items))
}

fn module_matches(module: &str, reported: Option<&str>) -> bool {
    match reported {
        Some(reported) if !module.starts_with('.') => module == reported,
        Some(reported) => reported.ends_with(module.trim_start_matches('.')),
        None => true,
    }
}

/// `b` for `b as c`, else the item itself.
fn import_name(item: &str) -> &str {
    item.split_whitespace().next().unwrap_or(item)
}

fn remove_imported_name(line: u32, name: &str, src: &mut SourceFile) -> Option<Edit> {
    let text = src.line(line)?;
    let (module, items) = from_import_parts(text)?;
    let remaining: Vec<&String> = items.iter().filter(|i| import_name(i) != name).collect();
    if remaining.len() == items.len() {
        return None;
    }
    if remaining.is_empty() {
        return disable_line(line, src, "remove_import_name");
    }

    let (code, comment) = split_comment(text);
    let indent = indent_of(code);
    let joined = remaining
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let list = if code.contains('(') {
        format!("({joined})")
    } else {
        joined
    };
    let spacer = if comment.is_empty() { "" } else { "  " };
    let fixed = format!("{indent}from {module} import {list}{spacer}{comment}");
    src.set_line(line, fixed);
    Some(Edit::in_place("remove_import_name", line))
}
