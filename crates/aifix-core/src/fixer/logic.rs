//! Logic repairs: initialize undefined names.

use crate::classifier::undefined_name;
use crate::domain::FailureRecord;

use super::source::{indent_of, split_comment, starts_with_keyword, SourceFile};
use super::Edit;

/// Marker appended to inserted initializations.
pub const AUTO_INIT_MARKER: &str = "# AI-AGENT: auto-initialized";

/// Statements that continue a preceding block and cannot be preceded by a
/// new statement at the same indent.
const CONTINUATION_KEYWORDS: &[&str] = &["elif", "else", "except", "finally", "case"];

pub(crate) fn apply(record: &FailureRecord, src: &mut SourceFile) -> Option<Edit> {
    // Attribute, zero-division and index errors are recognized but never
    // patched.
    let name = undefined_name(&record.message)?;
    initialize_name(name, record.line, src)
}

fn initialize_name(name: &str, line: u32, src: &mut SourceFile) -> Option<Edit> {
    let text = src.line(line)?;
    if text.trim().is_empty() || text.trim_start().starts_with('#') {
        return None;
    }
    if CONTINUATION_KEYWORDS
        .iter()
        .any(|k| starts_with_keyword(text, k))
    {
        return None;
    }

    let init = format!("{name} = None  {AUTO_INIT_MARKER}");
    let already = |n: u32| src.line(n).map(|t| t.trim() == init).unwrap_or(false);
    if already(line) || line.checked_sub(1).map(already).unwrap_or(false) {
        return None;
    }

    if let Some((_, prev)) = src.prev_non_blank(line) {
        let code = split_comment(prev).0.trim_end();
        if code.ends_with('\\') || code.ends_with(',') || code.ends_with('(') || code.ends_with('[')
        {
            return None;
        }
    }

    let indent = indent_of(text).to_string();
    src.insert_line(line, format!("{indent}{init}"));
    Some(Edit::inserted("initialize_name", line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FailureKind;
    use crate::fixer::testing::run;

    fn fix(text: &str, line: u32, message: &str) -> (Option<Edit>, String) {
        run(apply, FailureKind::Logic, text, line, message)
    }

    #[test]
    fn test_inserts_initialization_at_indent() {
        let (edit, out) = fix(
            "def total(items):\n    for i in items:\n        acc += i\n",
            3,
            "NameError: name 'acc' is not defined",
        );
        assert_eq!(edit, Some(Edit::inserted("initialize_name", 3)));
        assert_eq!(
            out,
            "def total(items):\n    for i in items:\n        acc = None  # AI-AGENT: auto-initialized\n        acc += i\n"
        );
    }

    #[test]
    fn test_second_dispatch_declines() {
        let text = "x = None  # AI-AGENT: auto-initialized\nprint(x)\n";
        let (edit, _) = fix(text, 1, "NameError: name 'x' is not defined");
        assert!(edit.is_none());
        let (edit, _) = fix(text, 2, "NameError: name 'x' is not defined");
        assert!(edit.is_none());
    }

    #[test]
    fn test_declines_before_else() {
        let (edit, _) = fix(
            "if a:\n    pass\nelse:\n    b()\n",
            3,
            "NameError: name 'a' is not defined",
        );
        assert!(edit.is_none());
    }

    #[test]
    fn test_declines_inside_continuation() {
        let (edit, _) = fix(
            "result = compute(\n    value,\n)\n",
            2,
            "NameError: name 'value' is not defined",
        );
        assert!(edit.is_none());
    }

    #[test]
    fn test_other_logic_errors_decline() {
        let (edit, _) = fix("x = 1 / 0\n", 1, "ZeroDivisionError: division by zero");
        assert!(edit.is_none());
        let (edit, _) = fix(
            "obj.run()\n",
            1,
            "AttributeError: 'NoneType' object has no attribute 'run'",
        );
        assert!(edit.is_none());
    }
}
