//! Type error repairs: missing `typing` imports and `str + int` concatenation.

use std::sync::OnceLock;

use regex::Regex;

use crate::classifier::{undefined_name, TYPING_GENERICS};
use crate::domain::FailureRecord;

use super::source::{split_comment, SourceFile};
use super::Edit;

/// Operand types that can be safely wrapped in `str(...)`.
const STRINGIFIABLE: &[&str] = &["int", "float", "bool"];

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "lambda", "None", "True", "False", "return",
    "yield", "await",
];

pub(crate) fn apply(record: &FailureRecord, src: &mut SourceFile) -> Option<Edit> {
    if let Some(name) = undefined_name(&record.message) {
        if TYPING_GENERICS.contains(&name) {
            return typing_import(name, src);
        }
        return None;
    }

    if let Some(ty) = concat_operand_type(&record.message) {
        if STRINGIFIABLE.contains(&ty.as_str()) {
            return wrap_str_operand(record.line, src);
        }
    }

    // Missing arguments and unsupported operands are recognized but never
    // patched.
    None
}

// ---------------------------------------------------------------------------
// typing imports
// ---------------------------------------------------------------------------

fn typing_import(name: &str, src: &mut SourceFile) -> Option<Edit> {
    let mut extended = None;
    for (idx, text) in src.lines().iter().enumerate() {
        let Some(names) = typing_import_names(text) else {
            continue;
        };
        if names.iter().any(|n| n == name) {
            return None;
        }
        let (code, comment) = split_comment(text);
        let head = code.trim_end();
        let spacer = if comment.is_empty() { "" } else { "  " };
        extended = Some((idx as u32 + 1, format!("{head}, {name}{spacer}{comment}")));
        break;
    }
    if let Some((line, fixed)) = extended {
        src.set_line(line, fixed);
        return Some(Edit::in_place("extend_typing_import", line));
    }

    let insert_at = import_insertion_line(src);
    src.insert_line(insert_at, format!("from typing import {name}"));
    Some(Edit::inserted("add_typing_import", insert_at))
}

/// Names bound by a single-line, top-level `from typing import ...`.
fn typing_import_names(text: &str) -> Option<Vec<String>> {
    let (code, _) = split_comment(text);
    let rest = code.strip_prefix("from typing import ")?;
    let rest = rest.trim();
    if rest.is_empty() || rest.contains('(') || rest.contains(')') || rest.ends_with('\\') {
        return None;
    }
    Some(
        rest.split(',')
            .map(|item| {
                let item = item.trim();
                item.rsplit(" as ").next().unwrap_or(item).trim().to_string()
            })
            .collect(),
    )
}

/// 1-based line where a new top-level import goes: after the last top-level
/// import statement, else after the module preamble.
fn import_insertion_line(src: &SourceFile) -> u32 {
    let lines = src.lines();
    let mut last_import_end: Option<usize> = None;
    let mut i = 0;
    while i < lines.len() {
        let text = &lines[i];
        if text.starts_with("import ") || text.starts_with("from ") {
            let mut end = i;
            let (code, _) = split_comment(text);
            if code.contains('(') && !code.contains(')') {
                while end + 1 < lines.len() && !split_comment(&lines[end]).0.contains(')') {
                    end += 1;
                }
            } else {
                while code_continues(&lines[end]) && end + 1 < lines.len() {
                    end += 1;
                }
            }
            last_import_end = Some(end);
            i = end + 1;
            continue;
        }
        i += 1;
    }
    if let Some(end) = last_import_end {
        return end as u32 + 2;
    }
    preamble_end(lines) as u32 + 1
}

fn code_continues(text: &str) -> bool {
    split_comment(text).0.trim_end().ends_with('\\')
}

/// Index of the first line after leading comments, blank lines and a module
/// docstring.
fn preamble_end(lines: &[String]) -> usize {
    let mut i = 0;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            i += 1;
            continue;
        }
        let delim = ["\"\"\"", "'''"]
            .into_iter()
            .find(|d| trimmed.starts_with(d));
        if let Some(delim) = delim {
            let body = &trimmed[3..];
            if body.contains(delim) {
                return i + 1;
            }
            let mut j = i + 1;
            while j < lines.len() {
                if lines[j].contains(delim) {
                    return j + 1;
                }
                j += 1;
            }
            return i;
        }
        return i;
    }
    // Only comments and blank lines: append after them.
    lines.len()
}

// ---------------------------------------------------------------------------
// str concatenation
// ---------------------------------------------------------------------------

fn concat_operand_type(message: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"can only concatenate str \(not "(\w+)"\)|must be str, not (\w+)"#)
            .expect("valid regex")
    });
    let caps = re.captures(message)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Wrap the non-string operand of the first `str + x` / `x + str` pair.
fn wrap_str_operand(line: u32, src: &mut SourceFile) -> Option<Edit> {
    let text = src.line(line)?;
    let (code, comment) = split_comment(text);
    let chars: Vec<char> = code.chars().collect();
    let strings = string_spans(&chars);
    let in_string = |i: usize| strings.iter().any(|&(s, e)| i >= s && i < e);

    for plus in 0..chars.len() {
        if chars[plus] != '+' || in_string(plus) {
            continue;
        }
        if chars.get(plus + 1) == Some(&'=') {
            continue;
        }
        let Some(left) = atom_before(&chars, plus, &strings) else {
            continue;
        };
        let Some(right) = atom_after(&chars, plus + 1, &strings) else {
            continue;
        };
        let target = match (left.is_string, right.is_string) {
            (true, false) => right,
            (false, true) => left,
            _ => continue,
        };
        let operand: String = chars[target.start..target.end].iter().collect();
        if operand.starts_with("str(") || KEYWORDS.contains(&operand.as_str()) {
            continue;
        }

        let mut fixed: String = chars[..target.start].iter().collect();
        fixed.push_str("str(");
        fixed.push_str(&operand);
        fixed.push(')');
        fixed.extend(chars[target.end..].iter());
        fixed.push_str(comment);
        src.set_line(line, fixed);
        return Some(Edit::in_place("wrap_str_operand", line));
    }
    None
}

#[derive(Debug, Clone, Copy)]
struct Atom {
    start: usize,
    end: usize,
    is_string: bool,
}

/// `[start, end)` char spans of string literals, including any prefix.
fn string_spans(chars: &[char]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' {
            let mut start = i;
            while start > 0 && matches!(chars[start - 1], 'r' | 'R' | 'b' | 'B' | 'f' | 'F' | 'u' | 'U')
            {
                start -= 1;
            }
            if start > 0 && (chars[start - 1].is_alphanumeric() || chars[start - 1] == '_') {
                start = i;
            }
            let mut j = i + 1;
            while j < chars.len() && chars[j] != c {
                if chars[j] == '\\' {
                    j += 1;
                }
                j += 1;
            }
            let end = (j + 1).min(chars.len());
            spans.push((start, end));
            i = end;
            continue;
        }
        i += 1;
    }
    spans
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

fn atom_before(chars: &[char], plus: usize, strings: &[(usize, usize)]) -> Option<Atom> {
    let mut end = plus;
    while end > 0 && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    if end == 0 {
        return None;
    }
    if let Some(&(s, _)) = strings.iter().find(|&&(_, e)| e == end) {
        return Some(Atom {
            start: s,
            end,
            is_string: true,
        });
    }
    let mut k = end;
    while k > 0 {
        let c = chars[k - 1];
        if is_word(c) {
            k -= 1;
        } else if c == ')' || c == ']' {
            k = matching_open(chars, k - 1)?;
        } else {
            break;
        }
    }
    (k < end).then_some(Atom {
        start: k,
        end,
        is_string: false,
    })
}

fn atom_after(chars: &[char], from: usize, strings: &[(usize, usize)]) -> Option<Atom> {
    let mut start = from;
    while start < chars.len() && chars[start].is_whitespace() {
        start += 1;
    }
    if let Some(&(_, e)) = strings.iter().find(|&&(s, _)| s == start) {
        return Some(Atom {
            start,
            end: e,
            is_string: true,
        });
    }
    let mut k = start;
    while k < chars.len() {
        let c = chars[k];
        if is_word(c) {
            k += 1;
        } else if (c == '(' || c == '[') && k > start {
            k = matching_close(chars, k)? + 1;
        } else {
            break;
        }
    }
    (k > start).then_some(Atom {
        start,
        end: k,
        is_string: false,
    })
}

fn matching_open(chars: &[char], close: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut k = close + 1;
    while k > 0 {
        k -= 1;
        match chars[k] {
            ')' | ']' => depth += 1,
            '(' | '[' => {
                depth -= 1;
                if depth == 0 {
                    return Some(k);
                }
            }
            _ => {}
        }
    }
    None
}

fn matching_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (k, &c) in chars.iter().enumerate().skip(open) {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(k);
                }
            }
            _ => {}
        }
    }
    None
}
