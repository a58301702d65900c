//! Row/column addressed edits applied to the document text.
//!
//! Both operations address the document as it is before the edit. Rows are
//! produced by splitting on `\n` (a trailing `\r` is dropped along with it).
//! The insert column is a byte offset into the row; the length of a single-row
//! removal is the character count of the removed text.

use coedit_common::ChangeMsg;

use crate::error::AppError;

/// Number of rows in `contents`; a final fragment without a newline counts as a row
pub fn line_count(contents: &str) -> usize {
    let newlines = contents.bytes().filter(|b| *b == b'\n').count();
    if !contents.is_empty() && !contents.ends_with('\n') {
        newlines + 1
    } else {
        newlines
    }
}

/// Splice `msg.lines` into `contents` at `msg.start`
pub fn insert(contents: &str, msg: &ChangeMsg) -> Result<String, AppError> {
    let total_rows = line_count(contents);
    let joined = msg.lines.join("\n");

    let mut out = String::with_capacity(contents.len() + joined.len() + 1);
    let mut suffix = "\n";
    let mut row = 0;

    for line in contents.lines() {
        // the original last row keeps its missing newline
        if row == total_rows {
            suffix = "";
        }

        if row == msg.start.row {
            let (before, after) = split_at_column(line, msg.start.column, row)?;
            out.push_str(before);
            out.push_str(&joined);
            out.push_str(after);
            out.push_str(suffix);

            if msg.lines.len() > 1 {
                row += msg.lines.len() - 1;
            } else {
                row += 1;
            }
            continue;
        }

        out.push_str(line);
        out.push_str(suffix);
        row += 1;
    }

    if msg.end.row > total_rows {
        out.push_str(&joined);
    }

    Ok(out)
}

/// Cut the span `msg.start..msg.end` out of `contents`.
///
/// `msg.lines` holds the removed text; only the first entry is read, to size a
/// removal confined to one row.
pub fn remove(contents: &str, msg: &ChangeMsg) -> Result<String, AppError> {
    let total_rows = line_count(contents);
    let (start, end) = (msg.start, msg.end);

    let mut out = String::with_capacity(contents.len());
    let mut suffix = "\n";
    let mut row = 0;
    let mut lines_row = 0;

    for line in contents.lines() {
        if row == total_rows {
            suffix = "";
        }

        if row < start.row || row > end.row {
            out.push_str(line);
            out.push_str(suffix);
            row += 1;
            continue;
        }

        if start.row == end.row {
            let removed = msg
                .lines
                .get(lines_row)
                .ok_or_else(|| {
                    AppError::Validation(format!("removed text missing for row {row}"))
                })?
                .chars()
                .count();

            let (before, rest) = split_at_column(line, start.column, row)?;
            let after = &rest[char_offset(rest, removed, row)?..];
            out.push_str(before);
            out.push_str(after);
            out.push_str(suffix);
        } else if row == start.row {
            let (before, _) = split_at_column(line, start.column, row)?;
            out.push_str(before);
        } else if row == end.row {
            let pointer = if end.column != 0 { end.column - 1 } else { 0 };
            let (_, after) = split_at_column(line, pointer, row)?;
            out.push_str(after);
            out.push_str(suffix);
        }

        row += 1;
        lines_row += 1;
    }

    Ok(out)
}

/// Byte offset just past the first `chars` characters of `text`
fn char_offset(text: &str, chars: usize, row: usize) -> Result<usize, AppError> {
    match text.char_indices().nth(chars) {
        Some((offset, _)) => Ok(offset),
        None if text.chars().count() == chars => Ok(text.len()),
        None => Err(AppError::Validation(format!(
            "removing {chars} characters overruns row {row}"
        ))),
    }
}

fn split_at_column(line: &str, column: usize, row: usize) -> Result<(&str, &str), AppError> {
    match (line.get(..column), line.get(column..)) {
        (Some(before), Some(after)) => Ok((before, after)),
        _ => Err(AppError::Validation(format!(
            "column {column} is outside row {row}"
        ))),
    }
}
