//! Formatters backed by external programs.
//!
//! Script and style blocks go through `prettier`, the template through
//! `js-beautify --type html`. Options are passed as command-line flags and the
//! text through stdin, so neither tool consults its own config files.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::settings::{FormattingOptions, ToolSettings};

use super::{FormatError, Formatter, ScriptParser, StyleDialect};

const DEFAULT_PRETTIER: &str = "prettier";
const DEFAULT_JS_BEAUTIFY: &str = "js-beautify";

/// Runs `prettier` and `js-beautify` as child processes.
#[derive(Debug, Clone)]
pub struct CommandFormatter {
    prettier: PathBuf,
    js_beautify: PathBuf,
}

impl Default for CommandFormatter {
    fn default() -> Self {
        Self {
            prettier: PathBuf::from(DEFAULT_PRETTIER),
            js_beautify: PathBuf::from(DEFAULT_JS_BEAUTIFY),
        }
    }
}

impl CommandFormatter {
    /// Use the program paths from the client settings, falling back to the
    /// programs on `PATH`.
    pub fn from_settings(tools: &ToolSettings) -> Self {
        let defaults = Self::default();
        Self {
            prettier: tools.prettier_path.clone().unwrap_or(defaults.prettier),
            js_beautify: tools.js_beautify_path.clone().unwrap_or(defaults.js_beautify),
        }
    }

    /// Run `program` with `args`, feeding `input` on stdin.
    fn run(&self, program: &Path, args: &[String], input: &str) -> Result<String, FormatError> {
        let name = program.display().to_string();
        tracing::debug!("running {name} {}", args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FormatError::Spawn {
                program: name.clone(),
                source,
            })?;

        // Write on a separate thread so a full stdout pipe can't deadlock us.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = input.as_bytes().to_vec();
            std::thread::spawn(move || stdin.write_all(&input))
        });

        let output = child.wait_with_output().map_err(|source| FormatError::Spawn {
            program: name.clone(),
            source,
        })?;

        if let Some(Ok(Err(e))) = writer.map(|handle| handle.join()) {
            tracing::debug!("{name} closed stdin early: {e}");
        }

        if !output.status.success() {
            return Err(FormatError::Failed {
                program: name,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| FormatError::InvalidOutput { program: name })
    }
}

impl Formatter for CommandFormatter {
    fn format_markup(&self, text: &str, options: &FormattingOptions) -> Result<String, FormatError> {
        self.run(&self.js_beautify, &beautify_args(options), text)
    }

    fn format_script(
        &self,
        text: &str,
        parser: ScriptParser,
        options: &FormattingOptions,
    ) -> Result<String, FormatError> {
        self.run(&self.prettier, &prettier_args(parser.as_str(), options), text)
    }

    fn format_style(
        &self,
        text: &str,
        dialect: &StyleDialect,
        options: &FormattingOptions,
    ) -> Result<String, FormatError> {
        if let StyleDialect::Other(name) = dialect {
            return Err(FormatError::UnsupportedDialect(name.clone()));
        }
        self.run(&self.prettier, &prettier_args(dialect.as_str(), options), text)
    }
}

/// Command-line arguments for `prettier` reading from stdin with `parser`.
pub fn prettier_args(parser: &str, options: &FormattingOptions) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--no-config".into(),
        "--no-editorconfig".into(),
        "--parser".into(),
        parser.into(),
        "--print-width".into(),
        options.print_width.to_string(),
        "--tab-width".into(),
        options.tab_width.to_string(),
        "--trailing-comma".into(),
        options.trailing_comma.as_str().into(),
        "--arrow-parens".into(),
        options.arrow_parens.as_str().into(),
        "--quote-props".into(),
        options.quote_props.as_str().into(),
        "--end-of-line".into(),
        options.end_of_line.as_str().into(),
        "--html-whitespace-sensitivity".into(),
        options.html_whitespace_sensitivity.as_str().into(),
        "--prose-wrap".into(),
        options.prose_wrap.as_str().into(),
        "--embedded-language-formatting".into(),
        options.embedded_language_formatting.as_str().into(),
    ];

    let flags = [
        (options.use_tabs, "--use-tabs"),
        (!options.semi, "--no-semi"),
        (options.single_quote, "--single-quote"),
        (options.jsx_single_quote, "--jsx-single-quote"),
        (!options.bracket_spacing, "--no-bracket-spacing"),
        (options.bracket_same_line, "--bracket-same-line"),
        (options.single_attribute_per_line, "--single-attribute-per-line"),
        (options.vue_indent_script_and_style, "--vue-indent-script-and-style"),
        (options.insert_pragma, "--insert-pragma"),
        (options.require_pragma, "--require-pragma"),
        (options.experimental_ternaries, "--experimental-ternaries"),
    ];
    args.extend(
        flags
            .into_iter()
            .filter(|(on, _)| *on)
            .map(|(_, flag)| flag.to_string()),
    );
    args
}

/// Command-line arguments for `js-beautify` formatting HTML from stdin.
pub fn beautify_args(options: &FormattingOptions) -> Vec<String> {
    let markup = &options.markup;
    let mut args: Vec<String> = vec![
        "--type".into(),
        "html".into(),
        "--indent-size".into(),
        options.tab_width.to_string(),
        "--wrap-line-length".into(),
        markup.wrap_line_length.to_string(),
        "--wrap-attributes".into(),
        markup.wrap_attributes.as_str().into(),
    ];
    if options.use_tabs {
        args.push("--indent-with-tabs".into());
    }
    if markup.indent_inner_html {
        args.push("--indent-inner-html".into());
    }
    if !markup.preserve_new_lines {
        args.push("--no-preserve-newlines".into());
    }
    if let Some(max) = markup.max_preserve_new_lines {
        args.push("--max-preserve-newlines".into());
        args.push(max.to_string());
    }
    for tag in &markup.unformatted {
        args.push("--unformatted".into());
        args.push(tag.clone());
    }
    args
}
