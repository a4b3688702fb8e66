//! Syntax repairs.

use crate::domain::FailureRecord;

use super::source::{
    indent_of, indent_width, is_block_header, is_code, opens_block, split_comment,
    starts_with_keyword, SourceFile,
};
use super::Edit;

pub(crate) fn apply(record: &FailureRecord, src: &mut SourceFile) -> Option<Edit> {
    let msg = record.message.to_lowercase();

    if msg.contains("expected ':'") || msg.contains("expected \":\"") {
        return missing_colon(record.line, src);
    }

    let specific = if msg.contains("missing parentheses in call to 'print'") {
        print_call(record.line, src)
    } else if msg.contains("invalid syntax") {
        assignment_in_condition(record.line, src)
    } else if msg.contains("unterminated string literal")
        || msg.contains("eol while scanning string")
    {
        close_string(record.line, src)
    } else if msg.contains("expected an indented block") {
        empty_block(record.line, src)
    } else {
        None
    };
    specific.or_else(|| missing_colon(record.line, src))
}

/// Append `:` to a block header that lacks one, ahead of any trailing comment.
fn missing_colon(line: u32, src: &mut SourceFile) -> Option<Edit> {
    let text = src.line(line)?;
    if !is_block_header(text) {
        return None;
    }
    let (code, comment) = split_comment(text);
    let head = code.trim_end();
    if head.ends_with(':') || head.ends_with('\\') {
        return None;
    }
    let fixed = format!("{head}:{}{comment}", &code[head.len()..]);
    src.set_line(line, fixed);
    Some(Edit::in_place("missing_colon", line))
}

/// `print x` to `print(x)`.
fn print_call(line: u32, src: &mut SourceFile) -> Option<Edit> {
    let text = src.line(line)?;
    if !starts_with_keyword(text, "print") {
        return None;
    }
    let (code, comment) = split_comment(text);
    let indent = indent_of(code);
    let rest = code.trim_start()["print".len()..].trim();
    if rest.starts_with('(') {
        return None;
    }
    let spacer = if comment.is_empty() { "" } else { "  " };
    let fixed = format!("{indent}print({rest}){spacer}{comment}");
    src.set_line(line, fixed);
    Some(Edit::in_place("print_call", line))
}

/// `if x = 5:` to `if x == 5:` (also `elif` and `while`).
fn assignment_in_condition(line: u32, src: &mut SourceFile) -> Option<Edit> {
    let text = src.line(line)?;
    if !["if", "elif", "while"]
        .iter()
        .any(|k| starts_with_keyword(text, k))
    {
        return None;
    }
    let (code, _) = split_comment(text);
    let pos = lone_equals(code)?;
    let fixed = format!("{}=={}", &text[..pos], &text[pos + 1..]);
    src.set_line(line, fixed);
    Some(Edit::in_place("assignment_in_condition", line))
}

/// Byte offset of the first `=` at bracket depth zero, outside strings, that
/// is not part of a comparison, augmented assignment, walrus or `==`.
fn lone_equals(code: &str) -> Option<usize> {
    let bytes = code.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                let compound = matches!(
                    prev,
                    Some(
                        b'=' | b'!' | b'<' | b'>' | b':' | b'+' | b'-' | b'*' | b'/' | b'%'
                            | b'&' | b'|' | b'^' | b'@'
                    )
                );
                if !compound && next != Some(b'=') {
                    return Some(i);
                }
                if next == Some(b'=') {
                    i += 2;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Close a single-quoted string left open at the end of the line.
fn close_string(line: u32, src: &mut SourceFile) -> Option<Edit> {
    let text = src.line(line)?;
    let open = open_quote(text)?;
    let fixed = format!("{}{}", text.trim_end(), open);
    src.set_line(line, fixed);
    Some(Edit::in_place("close_string", line))
}

/// Quote character still open at end of `text`, ignoring triple quotes.
fn open_quote(text: &str) -> Option<char> {
    let chars: Vec<char> = text.chars().collect();
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) => {
                if c == '\\' {
                    i += 1;
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '#' {
                    return None;
                }
                if c == '"' || c == '\'' {
                    if chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c) {
                        return None;
                    }
                    quote = Some(c);
                }
            }
        }
        i += 1;
    }
    quote
}

/// Insert `pass` after a header whose block has no body.
///
/// `line` is the statement following the header (where the interpreter
/// expected indentation). Declines when that line is already indented deeper
/// than the header.
fn empty_block(line: u32, src: &mut SourceFile) -> Option<Edit> {
    let (header_line, header) = header_before(line, src)?;
    let header_indent = indent_of(header).to_string();
    let header_width = indent_width(header);

    let insert_at = if header_line >= line { header_line + 1 } else { line };
    if let Some(current) = src.line(insert_at) {
        if !current.trim().is_empty() && indent_width(current) > header_width {
            return None;
        }
    } else if insert_at as usize != src.len() + 1 {
        return None;
    }

    src.insert_line(insert_at, format!("{header_indent}    pass"));
    Some(Edit::inserted("empty_block", insert_at))
}

/// The block header at or before `line`.
fn header_before(line: u32, src: &SourceFile) -> Option<(u32, &str)> {
    if let Some(text) = src.line(line) {
        if opens_block(text) && is_code(text) {
            return Some((line, text));
        }
    }
    let mut k = line.checked_sub(1)?;
    while k >= 1 {
        let text = src.line(k)?;
        if is_code(text) {
            return opens_block(text).then_some((k, text));
        }
        k -= 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FailureKind;
    use crate::fixer::testing::run;

    fn fix(text: &str, line: u32, message: &str) -> (Option<Edit>, String) {
        run(apply, FailureKind::Syntax, text, line, message)
    }

    #[test]
    fn test_missing_colon_keeps_comment() {
        let (edit, out) = fix("def f()  # entry\n    pass\n", 1, "SyntaxError: expected ':'");
        assert!(edit.is_some());
        assert_eq!(out, "def f():  # entry\n    pass\n");
    }

    #[test]
    fn test_missing_colon_declines_when_present() {
        let (edit, _) = fix("for x in y:\n", 1, "SyntaxError: expected ':'");
        assert!(edit.is_none());
    }

    #[test]
    fn test_missing_colon_requires_header() {
        let (edit, _) = fix("x = compute(\n", 1, "SyntaxError: expected ':'");
        assert!(edit.is_none());
    }

    #[test]
    fn test_print_statement() {
        let (edit, out) = fix(
            "    print \"hi\", name\n",
            1,
            "SyntaxError: Missing parentheses in call to 'print'. Did you mean print(...)?",
        );
        assert!(edit.is_some());
        assert_eq!(out, "    print(\"hi\", name)\n");
    }

    #[test]
    fn test_assignment_in_if() {
        let (edit, out) = fix(
            "if x = 5:\n    go()\n",
            1,
            "SyntaxError: invalid syntax. Maybe you meant '==' or ':=' instead of '='?",
        );
        assert_eq!(edit.map(|e| e.rule), Some("assignment_in_condition"));
        assert_eq!(out, "if x == 5:\n    go()\n");
    }

    #[test]
    fn test_assignment_ignores_keyword_arguments() {
        assert_eq!(lone_equals("if f(a=1) == 2:"), None);
        assert_eq!(lone_equals("while n <= 3:"), None);
        assert_eq!(lone_equals("elif y = 'a=b':"), Some(7));
    }

    #[test]
    fn test_invalid_syntax_falls_back_to_colon() {
        let (edit, out) = fix("while running\n    step()\n", 1, "SyntaxError: invalid syntax");
        assert_eq!(edit.map(|e| e.rule), Some("missing_colon"));
        assert_eq!(out, "while running:\n    step()\n");
    }

    #[test]
    fn test_unterminated_string() {
        let (edit, out) = fix(
            "msg = 'hello\n",
            1,
            "SyntaxError: unterminated string literal (detected at line 1)",
        );
        assert!(edit.is_some());
        assert_eq!(out, "msg = 'hello'\n");

        let (edit, _) = fix("msg = 'ok'\n", 1, "SyntaxError: unterminated string literal");
        assert!(edit.is_none());
    }

    #[test]
    fn test_empty_block_inserts_pass() {
        let text = "def f():\n    if ready:\n    return 1\n";
        let (edit, out) = fix(
            text,
            3,
            "IndentationError: expected an indented block after 'if' statement on line 2",
        );
        assert_eq!(edit, Some(Edit::inserted("empty_block", 3)));
        assert_eq!(out, "def f():\n    if ready:\n        pass\n    return 1\n");
    }

    #[test]
    fn test_empty_block_idempotent() {
        let text = "def f():\n    if ready:\n        pass\n    return 1\n";
        let (edit, _) = fix(text, 3, "IndentationError: expected an indented block");
        assert!(edit.is_none());
    }

    #[test]
    fn test_empty_block_at_end_of_file() {
        let (edit, out) = fix("class A:\n", 2, "expected an indented block");
        assert!(edit.is_some());
        assert_eq!(out, "class A:\n    pass\n");
    }

    #[test]
    fn test_declined_print_rule_falls_back_to_colon() {
        let (edit, out) = fix(
            "def show(x)\n    return x\n",
            1,
            "SyntaxError: Missing parentheses in call to 'print'",
        );
        assert_eq!(edit.map(|e| e.rule), Some("missing_colon"));
        assert_eq!(out, "def show(x):\n    return x\n");
    }

    #[test]
    fn test_declined_string_rule_falls_back_to_colon() {
        let (edit, out) = fix(
            "if ready\n    go()\n",
            1,
            "SyntaxError: unterminated string literal",
        );
        assert_eq!(edit.map(|e| e.rule), Some("missing_colon"));
        assert_eq!(out, "if ready:\n    go()\n");
    }

    #[test]
    fn test_declined_block_rule_falls_back_to_colon() {
        let (edit, out) = fix("for item in items\n", 1, "expected an indented block");
        assert_eq!(edit.map(|e| e.rule), Some("missing_colon"));
        assert_eq!(out, "for item in items:\n");
    }
}
