//! Formatter dispatch.
//!
//! This module provides:
//! - the `Formatter` trait, one method per sub-language family
//! - `format_region`, which routes a region to the right method and contains
//!   formatter failures
//! - `synthesize`, which splices formatted output back into its region and
//!   decides whether an edit is needed
//! - `CommandFormatter`, which drives `prettier` and `js-beautify`

mod command;
mod splice;

use std::fmt;

use crate::document::{Region, RegionKind};
use crate::settings::FormattingOptions;

pub use command::{beautify_args, prettier_args, CommandFormatter};
pub use splice::{splice, synthesize, FormatOutcome, SpliceError};

/// Errors raised by a formatter.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{program} produced invalid UTF-8")]
    InvalidOutput { program: String },

    #[error("unsupported style dialect '{0}'")]
    UnsupportedDialect(String),

    #[error("syntax error: {0}")]
    Syntax(String),
}

/// Parser used for script blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptParser {
    Babel,
    BabelTs,
}

impl ScriptParser {
    /// Choose the parser for a `lang` attribute: typed dialects get `babel-ts`.
    pub fn for_lang(lang: Option<&str>) -> Self {
        match lang {
            Some("ts" | "tsx" | "mts" | "cts") => ScriptParser::BabelTs,
            _ => ScriptParser::Babel,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScriptParser::Babel => "babel",
            ScriptParser::BabelTs => "babel-ts",
        }
    }
}

/// Stylesheet dialect of a style block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StyleDialect {
    Css,
    Scss,
    Less,
    /// A dialect without a known parser (e.g. `stylus`).
    Other(String),
}

impl StyleDialect {
    /// Choose the dialect for a `lang` attribute; untagged styles are CSS.
    pub fn for_lang(lang: Option<&str>) -> Self {
        match lang.map(str::to_ascii_lowercase).as_deref() {
            None | Some("css") => StyleDialect::Css,
            Some("scss") => StyleDialect::Scss,
            Some("less") => StyleDialect::Less,
            Some(other) => StyleDialect::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StyleDialect::Css => "css",
            StyleDialect::Scss => "scss",
            StyleDialect::Less => "less",
            StyleDialect::Other(name) => name,
        }
    }
}

impl fmt::Display for StyleDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The formatting engines for the three sub-language families.
///
/// Implementations must be pure with respect to their inputs: the same text
/// and options always give the same output.
pub trait Formatter: Send + Sync {
    /// Format a whole `<template>` element.
    fn format_markup(&self, text: &str, options: &FormattingOptions) -> Result<String, FormatError>;

    /// Format script source.
    fn format_script(
        &self,
        text: &str,
        parser: ScriptParser,
        options: &FormattingOptions,
    ) -> Result<String, FormatError>;

    /// Format stylesheet source.
    fn format_style(
        &self,
        text: &str,
        dialect: &StyleDialect,
        options: &FormattingOptions,
    ) -> Result<String, FormatError>;
}

/// Format a region's payload.
///
/// Markup is formatted as the whole element; script and style formatters get
/// the payload only. Returns an empty string when the payload is blank or the
/// formatter fails, which callers treat as "no change".
pub fn format_region(
    formatter: &dyn Formatter,
    region: &Region,
    options: &FormattingOptions,
) -> String {
    try_format_region(formatter, region, options).unwrap_or_else(|e| {
        tracing::warn!(
            "failed to format {} block on lines {}: {e}",
            region.kind,
            region.span
        );
        String::new()
    })
}

/// Like [`format_region`], but hands the formatter's error back.
pub fn try_format_region(
    formatter: &dyn Formatter,
    region: &Region,
    options: &FormattingOptions,
) -> Result<String, FormatError> {
    if region.raw_content.trim().is_empty() {
        return Ok(String::new());
    }

    let lang = region.lang.as_deref();
    match region.kind {
        RegionKind::Markup => formatter.format_markup(&region.full_text, options),
        RegionKind::Script | RegionKind::ScriptSetup => {
            formatter.format_script(&region.raw_content, ScriptParser::for_lang(lang), options)
        }
        RegionKind::Style => {
            formatter.format_style(&region.raw_content, &StyleDialect::for_lang(lang), options)
        }
    }
}
