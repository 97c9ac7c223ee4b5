//! Region extraction for the blocks embedded in an SFC.
//!
//! A region is one block widened to whole lines. Replacements are emitted per
//! region, so spans always start at column 0 and stop at the end of a line.

use std::fmt;
use std::ops::Range;

use crate::sfc::{self, SfcBlock};

use super::state::Document;

/// The sub-language a region holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Markup,
    Script,
    ScriptSetup,
    Style,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegionKind::Markup => "template",
            RegionKind::Script => "script",
            RegionKind::ScriptSetup => "script setup",
            RegionKind::Style => "style",
        };
        f.write_str(name)
    }
}

/// Inclusive, 0-based range of document lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineSpan {
    pub start_line: usize,
    pub end_line: usize,
}

impl LineSpan {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    /// Check if two spans share at least one line.
    pub fn overlaps(&self, other: &LineSpan) -> bool {
        self.start_line <= other.end_line && other.start_line <= self.end_line
    }
}

impl fmt::Display for LineSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start_line, self.end_line)
    }
}

/// A block of the document together with the whole lines it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    /// The block's `lang` attribute.
    pub lang: Option<String>,
    pub span: LineSpan,
    /// The block payload, without the enclosing tags.
    pub raw_content: String,
    /// Every line of the span, from column 0 of the first to the end of the last.
    pub full_text: String,
    /// Byte range of `raw_content` within `full_text`.
    pub content_range: Range<usize>,
}

impl Region {
    /// Build a region from a parsed block, widening its location to whole lines.
    ///
    /// Returns `None` if the block's location does not fit the document.
    pub fn from_block(kind: RegionKind, block: SfcBlock, document: &Document) -> Option<Self> {
        let index = &document.line_index;
        let start_line = block.loc.start.line.checked_sub(1)?;
        let end_line = block.loc.end.line.checked_sub(1)?;
        let lines = index.full_lines(start_line, end_line)?;

        if block.content_range.start < lines.start || block.content_range.end > lines.end {
            return None;
        }
        let content_range =
            block.content_range.start - lines.start..block.content_range.end - lines.start;

        Some(Self {
            kind,
            lang: block.lang,
            span: LineSpan::new(start_line, end_line),
            raw_content: block.content,
            full_text: index.source()[lines].to_string(),
            content_range,
        })
    }
}

/// Extract the regions of a document in document order.
///
/// A document that fails to parse has no regions. Regions that would share a
/// line with another region are dropped, since whole-line replacements of
/// both would conflict.
pub fn extract_regions(document: &Document) -> Vec<Region> {
    let descriptor = match sfc::parse(document.text()) {
        Ok(descriptor) => descriptor,
        Err(err) => {
            tracing::debug!("document is not a well-formed SFC: {err}");
            return Vec::new();
        }
    };

    let blocks = descriptor
        .template
        .map(|b| (RegionKind::Markup, b))
        .into_iter()
        .chain(descriptor.script.map(|b| (RegionKind::Script, b)))
        .chain(descriptor.script_setup.map(|b| (RegionKind::ScriptSetup, b)))
        .chain(descriptor.styles.into_iter().map(|b| (RegionKind::Style, b)));

    let mut regions: Vec<Region> = blocks
        .filter_map(|(kind, block)| Region::from_block(kind, block, document))
        .collect();
    regions.sort_by_key(|r| r.span.start_line);

    let shares_line = |i: usize| {
        let span = &regions[i].span;
        let before = i > 0 && regions[i - 1].span.overlaps(span);
        let after = regions.get(i + 1).is_some_and(|r| r.span.overlaps(span));
        before || after
    };
    let keep: Vec<bool> = (0..regions.len()).map(|i| !shares_line(i)).collect();

    regions
        .into_iter()
        .zip(keep)
        .filter_map(|(region, keep)| {
            if !keep {
                tracing::debug!(
                    "skipping {} block on lines {}: it shares a line with another block",
                    region.kind,
                    region.span
                );
            }
            keep.then_some(region)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions(src: &str) -> Vec<Region> {
        extract_regions(&Document::new(src.to_string(), 0))
    }

    #[test]
    fn regions_follow_source_order() {
        let src = "<script setup lang=\"ts\">\nlet a\n</script>\n\n<template>\n<p/>\n</template>\n<style>\n</style>\n";
        let found = regions(src);
        let kinds: Vec<_> = found.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RegionKind::ScriptSetup, RegionKind::Markup, RegionKind::Style]
        );
        assert_eq!(found[0].span, LineSpan::new(0, 2));
        assert_eq!(found[1].span, LineSpan::new(4, 6));
        assert_eq!(found[2].span, LineSpan::new(7, 8));
        assert_eq!(found[0].lang.as_deref(), Some("ts"));
    }

    #[test]
    fn spans_cover_whole_lines() {
        let src = "<!-- x -->  <style lang=\"scss\">\na {}\n</style>  <!-- y -->\n";
        let found = regions(src);
        assert_eq!(found.len(), 1);
        let region = &found[0];
        assert_eq!(
            region.full_text,
            "<!-- x -->  <style lang=\"scss\">\na {}\n</style>  <!-- y -->"
        );
        assert_eq!(&region.full_text[region.content_range.clone()], "\na {}\n");
        assert_eq!(region.raw_content, "\na {}\n");
    }

    #[test]
    fn blocks_sharing_a_line_are_dropped() {
        let src = "<template>\n<div></div>\n</template><script>\nlet a\n</script>\n<style>\n</style>";
        let found = regions(src);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, RegionKind::Style);
    }

    #[test]
    fn spans_are_disjoint_and_sorted() {
        let src = "<style>\n</style>\n<template>\n</template>\n<script>\n</script>\n<style lang=\"less\">\n</style>";
        let found = regions(src);
        assert_eq!(found.len(), 4);
        for pair in found.windows(2) {
            assert!(pair[0].span.end_line < pair[1].span.start_line);
        }
    }

    #[test]
    fn parse_failure_yields_no_regions() {
        assert!(regions("<template>\n<div>\n</template>").is_empty());
        assert!(regions("").is_empty());
    }

    #[test]
    fn crlf_lines_exclude_terminators() {
        let found = regions("<style>\r\na {}\r\n</style>\r\n");
        assert_eq!(found[0].full_text, "<style>\r\na {}\r\n</style>");
        assert_eq!(found[0].raw_content, "\r\na {}\r\n");
    }
}
