//! Structural parsing of Vue single-file components.
//!
//! This module splits an SFC into its top-level blocks:
//! - `<template>` (markup), scanned with an element stack so unbalanced markup
//!   is reported instead of silently mis-splitting the file
//! - `<script>` and `<script setup>`, read as raw text
//! - any number of `<style>` blocks, read as raw text
//!
//! Unknown top-level elements are treated as custom blocks and skipped.

mod parser;

use std::ops::Range;

pub use parser::{parse, ParseError};

/// A position in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    /// Byte offset from the start of the source.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

/// Start and end of a block, from the `<` of its open tag to just past the
/// `>` of its close tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

/// One top-level block of an SFC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfcBlock {
    /// Text between the open and close tags.
    pub content: String,
    /// Value of the `lang` attribute, if any.
    pub lang: Option<String>,
    /// Location of the whole element.
    pub loc: SourceLocation,
    /// Byte range of `content` in the source.
    pub content_range: Range<usize>,
}

/// The blocks found in an SFC, in the shape of `@vue/compiler-sfc`'s descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SfcDescriptor {
    pub template: Option<SfcBlock>,
    pub script: Option<SfcBlock>,
    pub script_setup: Option<SfcBlock>,
    pub styles: Vec<SfcBlock>,
}

/// HTML elements that never have a close tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "menuitem",
    "meta", "param", "source", "track", "wbr",
];

/// Check whether `tag` is a void element (case-insensitive).
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}
