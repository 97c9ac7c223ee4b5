//! Splicing formatted output back into a region, and deciding whether the
//! result is worth an edit.

use crate::document::{Region, RegionKind};

/// The recorded payload range does not hold the payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} payload not found at {start}..{end} of its span")]
pub struct SpliceError {
    pub kind: RegionKind,
    pub start: usize,
    pub end: usize,
}

/// Result of formatting one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOutcome {
    pub region: Region,
    /// Formatter output; empty when the formatter was skipped or failed.
    pub formatted_sub: String,
    /// The whole spliced region text.
    pub spliced: String,
    /// True only when `formatted_sub` is non-empty and `spliced` differs from
    /// the region's original text.
    pub changed: bool,
}

/// Rebuild the region's text around `formatted_sub`.
///
/// Markup output already covers the whole element and is returned as is.
/// For scripts and styles the payload's byte range is replaced by a newline
/// followed by `formatted_sub`; the tags and everything else in the span are
/// kept byte for byte.
pub fn splice(region: &Region, formatted_sub: &str) -> Result<String, SpliceError> {
    if region.kind == RegionKind::Markup {
        return Ok(formatted_sub.to_string());
    }

    let range = region.content_range.clone();
    if region.full_text.get(range.clone()) != Some(region.raw_content.as_str()) {
        return Err(SpliceError {
            kind: region.kind,
            start: range.start,
            end: range.end,
        });
    }

    let mut spliced = String::with_capacity(
        region.full_text.len() - region.raw_content.len() + formatted_sub.len() + 1,
    );
    spliced.push_str(&region.full_text[..range.start]);
    spliced.push('\n');
    spliced.push_str(formatted_sub);
    spliced.push_str(&region.full_text[range.end..]);
    Ok(spliced)
}

/// Splice `formatted_sub` into `region` and compare with the original text.
pub fn synthesize(region: Region, formatted_sub: String) -> FormatOutcome {
    if formatted_sub.is_empty() {
        return FormatOutcome {
            spliced: region.full_text.clone(),
            region,
            formatted_sub,
            changed: false,
        };
    }

    match splice(&region, &formatted_sub) {
        Ok(spliced) => FormatOutcome {
            changed: spliced != region.full_text,
            spliced,
            region,
            formatted_sub,
        },
        Err(e) => {
            tracing::warn!("leaving block on lines {} unchanged: {e}", region.span);
            FormatOutcome {
                spliced: region.full_text.clone(),
                region,
                formatted_sub,
                changed: false,
            }
        }
    }
}
