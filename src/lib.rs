//! Vue single-file component formatting language server.
//!
//! Each block of a `.vue` file is formatted by the engine for its language and
//! replaced only when formatting changed it.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock, RwLock};

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};

mod document;
pub mod format;
mod lsp;
mod pipeline;
pub mod settings;
pub mod sfc;

pub use document::{extract_regions, Document, LineIndex, LineSpan, Region, RegionKind};
pub use format::{CommandFormatter, FormatError, FormatOutcome, Formatter};
pub use lsp::to_text_edits;
pub use pipeline::{format_outcome, Edit, PassReport, Pipeline};
pub use settings::{ConfigResolver, EnvironmentSettings, FormattingOptions};

use document::DocumentStore;

pub struct Backend {
    client: Client,
    documents: DocumentStore,
    workspace_root: OnceLock<PathBuf>,
    settings: RwLock<Arc<EnvironmentSettings>>,
}

impl Backend {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            documents: DocumentStore::new(),
            workspace_root: OnceLock::new(),
            settings: RwLock::new(Arc::default()),
        }
    }

    fn current_settings(&self) -> Arc<EnvironmentSettings> {
        match self.settings.read() {
            Ok(settings) => Arc::clone(&settings),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the client settings, reporting sections that were ignored.
    async fn apply_settings(&self, value: serde_json::Value) {
        let (settings, errors) = EnvironmentSettings::parse(&value);
        for e in errors {
            tracing::warn!("{e}");
            self.client.log_message(MessageType::WARNING, e.to_string()).await;
        }

        let settings = Arc::new(settings);
        match self.settings.write() {
            Ok(mut slot) => *slot = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
    }

    /// Build the pipeline for one formatting pass from the current settings.
    fn pipeline(&self) -> Pipeline {
        let settings = self.current_settings();
        let formatter = Arc::new(CommandFormatter::from_settings(&settings.vuefmt));
        let resolver = ConfigResolver::new(self.workspace_root.get().cloned(), settings);
        Pipeline::new(formatter, resolver)
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        if let Some(root) = workspace_root {
            let _ = self.workspace_root.set(root);
        }
        if let Some(options) = params.initialization_options {
            self.apply_settings(options).await;
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                document_formatting_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "Vue formatting server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.documents.open(
            params.text_document.uri,
            params.text_document.text,
            params.text_document.version,
        );
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // We use FULL sync, so there's exactly one change with the full text
        if let Some(change) = params.content_changes.into_iter().next() {
            self.documents.open(
                params.text_document.uri,
                change.text,
                params.text_document.version,
            );
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.documents.close(&params.text_document.uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        self.apply_settings(params.settings).await;
        tracing::debug!("client settings updated");
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        let uri = &params.text_document.uri;
        let Some(document) = self.documents.get(uri) else {
            tracing::debug!("formatting requested for unknown document {uri}");
            return Ok(None);
        };

        let PassReport { edits, failures } = self.pipeline().run_report(&document).await;
        for failure in failures {
            self.client
                .log_message(MessageType::WARNING, format!("{uri}: {failure}"))
                .await;
        }
        tracing::debug!(
            "{} edit(s) for {uri} (version {})",
            edits.len(),
            document.version
        );
        Ok(Some(to_text_edits(&edits, &document.line_index)))
    }
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::new(Backend::new)
}
