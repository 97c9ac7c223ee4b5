//! Conversion of formatting edits to LSP text edits.

use tower_lsp::lsp_types::{Position, Range, TextEdit};

use crate::document::LineIndex;
use crate::pipeline::Edit;

/// Convert whole-line edits to LSP text edits.
///
/// Each range starts at column 0 of the first line and ends at the end of the
/// last line. Edits whose lines are outside the document are dropped.
pub fn to_text_edits(edits: &[Edit], line_index: &LineIndex) -> Vec<TextEdit> {
    edits
        .iter()
        .filter_map(|edit| {
            let start = Position::new(edit.span.start_line as u32, 0);
            let end = line_index.line_end_position(edit.span.end_line)?;
            Some(TextEdit {
                range: Range::new(start, end),
                new_text: edit.replacement_text.clone(),
            })
        })
        .collect()
}
