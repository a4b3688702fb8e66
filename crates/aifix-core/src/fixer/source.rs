//! Line-oriented source buffer and small lexical helpers shared by the rules.

use std::path::{Component, Path, PathBuf};

/// A text file loaded as lines, written back with its original line endings.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    lines: Vec<String>,
    crlf: bool,
    trailing_newline: bool,
}

impl SourceFile {
    /// Load `rel` under `root`. Rejects absolute paths and `..` escapes, missing
    /// files and non-UTF-8 content.
    pub fn load(root: &Path, rel: &str) -> Option<Self> {
        let rel_path = Path::new(rel);
        if rel.is_empty()
            || rel_path.is_absolute()
            || rel_path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        let path = root.join(rel_path);
        let text = std::fs::read_to_string(&path).ok()?;
        Some(Self::from_text(path, &text))
    }

    pub(crate) fn from_text(path: PathBuf, text: &str) -> Self {
        let crlf = text.contains("\r\n");
        let trailing_newline = text.ends_with('\n');
        let lines = text
            .lines()
            .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
            .collect();
        Self {
            path,
            lines,
            crlf,
            trailing_newline,
        }
    }

    pub fn render(&self) -> String {
        let eol = if self.crlf { "\r\n" } else { "\n" };
        let mut out = self.lines.join(eol);
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(eol);
        }
        out
    }

    pub fn save(&self) -> std::io::Result<()> {
        std::fs::write(&self.path, self.render())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// 1-based line access.
    pub fn line(&self, n: u32) -> Option<&str> {
        let idx = (n as usize).checked_sub(1)?;
        self.lines.get(idx).map(String::as_str)
    }

    pub fn set_line(&mut self, n: u32, text: String) -> bool {
        match (n as usize).checked_sub(1).and_then(|i| self.lines.get_mut(i)) {
            Some(slot) => {
                *slot = text;
                true
            }
            None => false,
        }
    }

    /// Insert `text` so that it becomes line `n`; `n == len + 1` appends.
    pub fn insert_line(&mut self, n: u32, text: String) -> bool {
        let Some(idx) = (n as usize).checked_sub(1) else {
            return false;
        };
        if idx > self.lines.len() {
            return false;
        }
        self.lines.insert(idx, text);
        true
    }

    pub fn remove_line(&mut self, n: u32) -> bool {
        match (n as usize).checked_sub(1) {
            Some(idx) if idx < self.lines.len() => {
                self.lines.remove(idx);
                true
            }
            _ => false,
        }
    }

    /// Nearest non-blank line before `n`, as `(line_number, text)`.
    pub fn prev_non_blank(&self, n: u32) -> Option<(u32, &str)> {
        let mut k = n.checked_sub(1)?;
        while k >= 1 {
            let text = self.line(k)?;
            if !text.trim().is_empty() {
                return Some((k, text));
            }
            k -= 1;
        }
        None
    }

    /// Nearest line after `n` that holds code (not blank, not a comment).
    pub fn next_code_line(&self, n: u32) -> Option<(u32, &str)> {
        let mut k = n + 1;
        while let Some(text) = self.line(k) {
            let trimmed = text.trim();
            if !trimmed.is_empty() && !trimmed.starts_with('#') {
                return Some((k, text));
            }
            k += 1;
        }
        None
    }

    /// True when line `n` is the only statement of an indented block, so
    /// removing it would leave the block header without a body.
    pub fn is_sole_block_statement(&self, n: u32) -> bool {
        let Some(current) = self.line(n) else {
            return false;
        };
        let indent = indent_width(current);
        if indent == 0 {
            return false;
        }
        let opens_block = self
            .prev_non_blank(n)
            .map(|(_, prev)| opens_block(prev))
            .unwrap_or(false);
        if !opens_block {
            return false;
        }
        match self.next_code_line(n) {
            Some((_, next)) => indent_width(next) < indent,
            None => true,
        }
    }
}

/// Python source files, the only targets of the structural rules.
pub fn is_python_path(rel: &str) -> bool {
    rel.ends_with(".py") || rel.ends_with(".pyi")
}

/// Leading whitespace of `line`.
pub fn indent_of(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

/// Visual indentation width, tabs counted as four columns.
pub fn indent_width(line: &str) -> usize {
    indent_of(line)
        .chars()
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Split a line into its code and `#` comment parts. The comment part keeps
/// the `#`; the code part keeps any whitespace before it.
pub fn split_comment(line: &str) -> (&str, &str) {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match quote {
            Some(q) => {
                if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '#' => return (&line[..i], &line[i..]),
                _ => {}
            },
        }
    }
    (line, "")
}

/// Python compound statement keywords that open a block.
pub const BLOCK_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "def", "class", "try", "except", "finally", "with",
    "async", "match", "case",
];

/// Whether the stripped code of `line` starts with `keyword` as a whole word.
pub fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    let stripped = line.trim_start();
    match stripped.strip_prefix(keyword) {
        Some(rest) => rest
            .chars()
            .next()
            .map(|c| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(true),
        None => false,
    }
}

/// Whether `line` is a block header (starts with a block keyword).
pub fn is_block_header(line: &str) -> bool {
    BLOCK_KEYWORDS.iter().any(|k| starts_with_keyword(line, k))
}

/// Whether the code part of `line` ends with `:`.
pub fn opens_block(line: &str) -> bool {
    split_comment(line).0.trim_end().ends_with(':')
}

/// Whether `line` has any code, ignoring whitespace and comments.
pub fn is_code(line: &str) -> bool {
    !split_comment(line).0.trim().is_empty()
}
