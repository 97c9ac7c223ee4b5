//! Document snapshots and the store of open documents.

use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::Url;

use super::text::LineIndex;

/// Immutable snapshot of a document's text.
///
/// A formatting pass works against one snapshot so that every region span
/// refers to the same text.
#[derive(Debug, Clone)]
pub struct Document {
    /// Pre-computed line index (owns the text).
    pub line_index: LineIndex,
    /// Document version from the client.
    pub version: i32,
}

impl Document {
    pub fn new(source: String, version: i32) -> Self {
        Self {
            line_index: LineIndex::new(source),
            version,
        }
    }

    /// The full document text.
    pub fn text(&self) -> &str {
        self.line_index.source()
    }
}

/// Thread-safe storage for open documents.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<Url, Arc<Document>>,
}

impl DocumentStore {
    /// Create a new empty document store.
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Open or replace a document with the given source text.
    pub fn open(&self, uri: Url, source: String, version: i32) -> Arc<Document> {
        let document = Arc::new(Document::new(source, version));
        self.documents.insert(uri, Arc::clone(&document));
        document
    }

    /// Close a document.
    pub fn close(&self, uri: &Url) {
        self.documents.remove(uri);
    }

    /// Get the current snapshot of a document.
    pub fn get(&self, uri: &Url) -> Option<Arc<Document>> {
        self.documents.get(uri).map(|r| Arc::clone(&r))
    }
}
