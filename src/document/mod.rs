//! Document state management and text utilities.
//!
//! This module provides:
//! - `LineIndex` for byte offset <-> LSP position conversion and whole-line lookups
//! - `Region` extraction for the blocks embedded in an SFC
//! - `Document` snapshots and the `DocumentStore` of open documents

mod region;
mod state;
mod text;

pub use region::{extract_regions, LineSpan, Region, RegionKind};
pub use state::{Document, DocumentStore};
pub use text::LineIndex;
