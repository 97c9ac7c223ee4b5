//! The formatting pass: regions in, edits out.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::document::{extract_regions, Document, LineSpan, Region};
use crate::format::{format_region, synthesize, try_format_region, FormatOutcome, Formatter};
use crate::settings::{ConfigResolver, FormattingOptions};

/// A whole-line replacement of one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: LineSpan,
    pub replacement_text: String,
}

impl Edit {
    /// The edit for an outcome, if it changed anything.
    pub fn from_outcome(outcome: FormatOutcome) -> Option<Self> {
        outcome.changed.then(|| Edit {
            span: outcome.region.span,
            replacement_text: outcome.spliced,
        })
    }
}

/// Edits of one pass, plus a message for every region that failed to format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub edits: Vec<Edit>,
    pub failures: Vec<String>,
}

/// Format one region and splice the result.
pub fn format_outcome(
    formatter: &dyn Formatter,
    region: Region,
    options: &FormattingOptions,
) -> FormatOutcome {
    let formatted = format_region(formatter, &region, options);
    synthesize(region, formatted)
}

/// Runs formatting passes with one formatter.
#[derive(Clone)]
pub struct Pipeline {
    formatter: Arc<dyn Formatter>,
    resolver: ConfigResolver,
}

impl Pipeline {
    pub fn new(formatter: Arc<dyn Formatter>, resolver: ConfigResolver) -> Self {
        Self {
            formatter,
            resolver,
        }
    }

    /// Format every region of `document`, resolving options once for the pass.
    pub async fn run(&self, document: &Document) -> Vec<Edit> {
        self.run_report(document).await.edits
    }

    /// Like [`Pipeline::run`], also reporting the regions that failed.
    pub async fn run_report(&self, document: &Document) -> PassReport {
        let regions = extract_regions(document);
        if regions.is_empty() {
            return PassReport::default();
        }

        let resolver = self.resolver.clone();
        let options = match tokio::task::spawn_blocking(move || resolver.resolve()).await {
            Ok(options) => options,
            Err(e) => {
                tracing::warn!("option resolution failed, using defaults: {e}");
                FormattingOptions::default()
            }
        };

        self.format_regions(regions, Arc::new(options)).await
    }

    /// Format every region of `document` with already resolved options.
    pub async fn run_with_options(
        &self,
        document: &Document,
        options: Arc<FormattingOptions>,
    ) -> Vec<Edit> {
        self.format_regions(extract_regions(document), options)
            .await
            .edits
    }

    /// Format regions concurrently on the blocking pool and collect the edits
    /// in document order.
    async fn format_regions(
        &self,
        regions: Vec<Region>,
        options: Arc<FormattingOptions>,
    ) -> PassReport {
        let mut tasks = JoinSet::new();
        for region in regions {
            let formatter = Arc::clone(&self.formatter);
            let options = Arc::clone(&options);
            tasks.spawn_blocking(move || {
                match try_format_region(formatter.as_ref(), &region, &options) {
                    Ok(formatted) => (synthesize(region, formatted), None),
                    Err(e) => {
                        let failure = format!(
                            "failed to format {} block on lines {}: {e}",
                            region.kind, region.span
                        );
                        tracing::warn!("{failure}");
                        (synthesize(region, String::new()), Some(failure))
                    }
                }
            });
        }

        let mut report = PassReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((outcome, failure)) => {
                    report.edits.extend(Edit::from_outcome(outcome));
                    report.failures.extend(failure);
                }
                Err(e) => {
                    tracing::warn!("formatting task failed: {e}");
                    report.failures.push(format!("formatting task failed: {e}"));
                }
            }
        }

        report.edits.sort_by_key(|edit| edit.span.start_line);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FormatError, ScriptParser, StyleDialect};

    /// Uppercases scripts, panics on styles, leaves markup alone.
    struct Shouty;

    impl Formatter for Shouty {
        fn format_markup(&self, text: &str, _: &FormattingOptions) -> Result<String, FormatError> {
            Ok(text.to_string())
        }

        fn format_script(
            &self,
            text: &str,
            _: ScriptParser,
            _: &FormattingOptions,
        ) -> Result<String, FormatError> {
            Ok(format!("{}\n", text.trim().to_uppercase()))
        }

        fn format_style(
            &self,
            _: &str,
            _: &StyleDialect,
            _: &FormattingOptions,
        ) -> Result<String, FormatError> {
            panic!("style engine crashed");
        }
    }

    /// Rejects every block.
    struct Refusing;

    impl Formatter for Refusing {
        fn format_markup(&self, _: &str, _: &FormattingOptions) -> Result<String, FormatError> {
            Err(FormatError::Syntax("unexpected token".to_string()))
        }

        fn format_script(
            &self,
            _: &str,
            _: ScriptParser,
            _: &FormattingOptions,
        ) -> Result<String, FormatError> {
            Err(FormatError::Syntax("unexpected token".to_string()))
        }

        fn format_style(
            &self,
            _: &str,
            dialect: &StyleDialect,
            _: &FormattingOptions,
        ) -> Result<String, FormatError> {
            Err(FormatError::UnsupportedDialect(dialect.to_string()))
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(Arc::new(Shouty), ConfigResolver::default())
    }

    #[tokio::test]
    async fn panicking_formatter_is_isolated() {
        let doc = Document::new(
            "<script>\nlet a\n</script>\n<style>\na {}\n</style>\n<template>\n<p></p>\n</template>"
                .to_string(),
            0,
        );
        let edits = pipeline().run(&doc).await;
        assert_eq!(
            edits,
            vec![Edit {
                span: LineSpan::new(0, 2),
                replacement_text: "<script>\nLET A\n</script>".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn report_lists_failed_regions() {
        let doc = Document::new(
            "<script>\nlet a\n</script>\n<style lang=\"scss\">\na {}\n</style>".to_string(),
            0,
        );
        let report = pipeline().run_report(&doc).await;
        assert_eq!(report.edits.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].starts_with("formatting task failed"));
    }

    #[tokio::test]
    async fn formatter_errors_are_reported_per_region() {
        let doc = Document::new(
            "<script>\nlet a\n</script>\n<style lang=\"stylus\">\na\n</style>".to_string(),
            0,
        );
        let report = Pipeline::new(Arc::new(Refusing), ConfigResolver::default())
            .run_report(&doc)
            .await;
        assert!(report.edits.is_empty());

        let mut failures = report.failures;
        failures.sort();
        assert_eq!(
            failures,
            vec![
                "failed to format script block on lines 0..=2: syntax error: unexpected token",
                "failed to format style block on lines 3..=5: unsupported style dialect 'stylus'",
            ]
        );
    }

    #[tokio::test]
    async fn empty_document_has_no_edits() {
        let doc = Document::new(String::new(), 0);
        assert!(pipeline().run(&doc).await.is_empty());
    }

    #[tokio::test]
    async fn run_with_options_skips_resolution() {
        let doc = Document::new("<script setup>\nx\n</script>".to_string(), 0);
        let edits = pipeline()
            .run_with_options(&doc, Arc::new(FormattingOptions::default()))
            .await;
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].replacement_text, "<script setup>\nX\n</script>");
    }

    #[test]
    fn unchanged_outcome_has_no_edit() {
        let doc = Document::new("<script>\nLET A\n</script>".to_string(), 0);
        let region = extract_regions(&doc).remove(0);
        let outcome = format_outcome(&Shouty, region, &FormattingOptions::default());
        assert!(!outcome.changed);
        assert_eq!(Edit::from_outcome(outcome), None);
    }
}
