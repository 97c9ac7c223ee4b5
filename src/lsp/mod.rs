//! LSP protocol feature implementations.
//!
//! This module provides the conversion of formatting edits to LSP text edits.

mod formatting;

pub use formatting::to_text_edits;
