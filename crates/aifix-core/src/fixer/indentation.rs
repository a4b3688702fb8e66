//! Indentation repairs.

use crate::domain::FailureRecord;

use super::source::{indent_width, opens_block, SourceFile};
use super::Edit;

pub(crate) fn apply(record: &FailureRecord, src: &mut SourceFile) -> Option<Edit> {
    let line = record.line;
    let text = src.line(line)?;
    if text.trim().is_empty() {
        return None;
    }

    let leading = &text[..text.len() - text.trim_start().len()];
    if leading.contains('\t') {
        let expanded = leading.replace('\t', "    ");
        let fixed = format!("{expanded}{}", text.trim_start());
        src.set_line(line, fixed);
        return Some(Edit::in_place("expand_tabs", line));
    }

    let (_, prev) = src.prev_non_blank(line)?;
    let current = indent_width(text);
    let prev_width = indent_width(prev);

    if opens_block(prev) {
        let target = prev_width + 4;
        if current == target {
            return None;
        }
        reindent(src, line, target);
        return Some(Edit::in_place("indent_block_body", line));
    }

    if current < prev_width {
        reindent(src, line, prev_width);
        return Some(Edit::in_place("align_with_previous", line));
    }

    None
}

fn reindent(src: &mut SourceFile, line: u32, width: usize) {
    if let Some(text) = src.line(line) {
        let fixed = format!("{}{}", " ".repeat(width), text.trim_start());
        src.set_line(line, fixed);
    }
}
