//! Formatting options and their layered resolution.
//!
//! Options are resolved once per formatting pass, in this order (later layers
//! win):
//! 1. the built-in defaults of [`FormattingOptions::default`]
//! 2. environment settings sent by the client (`prettier`, `html.format`)
//! 3. a project config file at the workspace root (the first of
//!    [`PROJECT_CONFIG_FILES`] that exists)
//!
//! A project file that is missing, unreadable or invalid is skipped. Each
//! client settings section is read on its own, so one invalid section leaves
//! the others in effect.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Project config files, in lookup order. `.prettierrc` may hold YAML or JSON.
pub const PROJECT_CONFIG_FILES: &[&str] = &[
    ".prettierrc",
    ".prettierrc.json",
    ".prettierrc.yaml",
    ".prettierrc.yml",
    ".prettierrc.toml",
];

/// Markup tags that are never reflowed.
pub const UNFORMATTED_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "keygen", "link", "menuitem", "meta", "param",
    "source", "track", "wbr",
];

/// Defines a string-valued option enum, with its serde names and the same
/// names for command-line use.
macro_rules! option_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $value)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $value),+
                }
            }
        }
    };
}

option_enum!(TrailingComma { None => "none", Es5 => "es5", All => "all" });
option_enum!(ArrowParens { Always => "always", Avoid => "avoid" });
option_enum!(EndOfLine { Lf => "lf", Crlf => "crlf", Cr => "cr", Auto => "auto" });
option_enum!(QuoteProps { AsNeeded => "as-needed", Consistent => "consistent", Preserve => "preserve" });
option_enum!(HtmlWhitespaceSensitivity { Css => "css", Strict => "strict", Ignore => "ignore" });
option_enum!(ProseWrap { Always => "always", Never => "never", Preserve => "preserve" });
option_enum!(EmbeddedLanguageFormatting { Auto => "auto", Off => "off" });
option_enum!(
    /// Attribute wrapping policy of the markup formatter.
    WrapAttributes {
        Auto => "auto",
        Force => "force",
        ForceAligned => "force-aligned",
        ForceExpandMultiline => "force-expand-multiline",
        AlignedMultiple => "aligned-multiple",
        Preserve => "preserve",
        PreserveAligned => "preserve-aligned",
    }
);

/// Fully resolved options for one formatting pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattingOptions {
    pub print_width: u32,
    pub tab_width: u32,
    pub use_tabs: bool,
    pub semi: bool,
    pub single_quote: bool,
    pub jsx_single_quote: bool,
    pub quote_props: QuoteProps,
    pub trailing_comma: TrailingComma,
    pub bracket_spacing: bool,
    pub bracket_same_line: bool,
    pub arrow_parens: ArrowParens,
    pub single_attribute_per_line: bool,
    pub end_of_line: EndOfLine,
    pub html_whitespace_sensitivity: HtmlWhitespaceSensitivity,
    pub prose_wrap: ProseWrap,
    pub vue_indent_script_and_style: bool,
    pub embedded_language_formatting: EmbeddedLanguageFormatting,
    pub insert_pragma: bool,
    pub require_pragma: bool,
    pub experimental_ternaries: bool,
    /// Options for the `<template>` formatter.
    pub markup: MarkupOptions,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            print_width: 150,
            tab_width: 4,
            use_tabs: false,
            semi: true,
            single_quote: true,
            jsx_single_quote: true,
            quote_props: QuoteProps::Consistent,
            trailing_comma: TrailingComma::None,
            bracket_spacing: true,
            bracket_same_line: true,
            arrow_parens: ArrowParens::Avoid,
            single_attribute_per_line: true,
            end_of_line: EndOfLine::Lf,
            html_whitespace_sensitivity: HtmlWhitespaceSensitivity::Css,
            prose_wrap: ProseWrap::Preserve,
            vue_indent_script_and_style: false,
            embedded_language_formatting: EmbeddedLanguageFormatting::Auto,
            insert_pragma: false,
            require_pragma: false,
            experimental_ternaries: false,
            markup: MarkupOptions::default(),
        }
    }
}

/// Options specific to the markup formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupOptions {
    pub wrap_line_length: u32,
    pub wrap_attributes: WrapAttributes,
    /// Tags whose content is left as written.
    pub unformatted: Vec<String>,
    pub indent_inner_html: bool,
    pub preserve_new_lines: bool,
    /// `None` means unlimited.
    pub max_preserve_new_lines: Option<u32>,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        Self {
            wrap_line_length: 150,
            wrap_attributes: WrapAttributes::ForceAligned,
            unformatted: UNFORMATTED_TAGS.iter().map(|t| t.to_string()).collect(),
            indent_inner_html: false,
            preserve_new_lines: true,
            max_preserve_new_lines: None,
        }
    }
}

/// Copy every field that is set in `$layer` over the same field of `$target`.
macro_rules! overlay {
    ($target:ident, $layer:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$layer.$field {
                $target.$field = value.clone();
            }
        )+
    };
}

/// A partial set of script/style options, as found in one configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptionsLayer {
    pub print_width: Option<u32>,
    pub tab_width: Option<u32>,
    pub use_tabs: Option<bool>,
    pub semi: Option<bool>,
    pub single_quote: Option<bool>,
    pub jsx_single_quote: Option<bool>,
    pub quote_props: Option<QuoteProps>,
    pub trailing_comma: Option<TrailingComma>,
    pub bracket_spacing: Option<bool>,
    pub bracket_same_line: Option<bool>,
    pub arrow_parens: Option<ArrowParens>,
    pub single_attribute_per_line: Option<bool>,
    pub end_of_line: Option<EndOfLine>,
    pub html_whitespace_sensitivity: Option<HtmlWhitespaceSensitivity>,
    pub prose_wrap: Option<ProseWrap>,
    pub vue_indent_script_and_style: Option<bool>,
    pub embedded_language_formatting: Option<EmbeddedLanguageFormatting>,
    pub insert_pragma: Option<bool>,
    pub require_pragma: Option<bool>,
    pub experimental_ternaries: Option<bool>,
}

/// A partial set of markup options (the client's `html.format` section).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarkupLayer {
    pub wrap_line_length: Option<u32>,
    pub wrap_attributes: Option<WrapAttributes>,
    #[serde(deserialize_with = "tag_list")]
    pub unformatted: Option<Vec<String>>,
    pub indent_inner_html: Option<bool>,
    pub preserve_new_lines: Option<bool>,
    pub max_preserve_new_lines: Option<u32>,
}

/// Accept a tag list either as an array or as a comma-separated string
/// (`"wbr, pre"`).
fn tag_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        Joined(String),
        List(Vec<String>),
    }

    Ok(Option::<Tags>::deserialize(deserializer)?.map(|tags| match tags {
        Tags::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        Tags::List(list) => list,
    }))
}

impl FormattingOptions {
    /// Apply a layer on top of these options.
    pub fn layered(mut self, layer: &OptionsLayer) -> Self {
        let options = &mut self;
        overlay!(
            options,
            layer,
            print_width,
            tab_width,
            use_tabs,
            semi,
            single_quote,
            jsx_single_quote,
            quote_props,
            trailing_comma,
            bracket_spacing,
            bracket_same_line,
            arrow_parens,
            single_attribute_per_line,
            end_of_line,
            html_whitespace_sensitivity,
            prose_wrap,
            vue_indent_script_and_style,
            embedded_language_formatting,
            insert_pragma,
            require_pragma,
            experimental_ternaries,
        );
        self
    }
}

impl MarkupOptions {
    /// Apply a layer on top of these options.
    pub fn layered(mut self, layer: &MarkupLayer) -> Self {
        let options = &mut self;
        overlay!(
            options,
            layer,
            wrap_line_length,
            wrap_attributes,
            unformatted,
            indent_inner_html,
            preserve_new_lines,
        );
        if layer.max_preserve_new_lines.is_some() {
            self.max_preserve_new_lines = layer.max_preserve_new_lines;
        }
        self
    }
}

/// Settings supplied by the client (initialization options or
/// `workspace/didChangeConfiguration`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSettings {
    /// Script and style options.
    pub prettier: OptionsLayer,
    pub html: HtmlSettings,
    /// Settings of the server itself.
    pub vuefmt: ToolSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlSettings {
    pub format: MarkupLayer,
}

/// Paths of the external formatter programs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolSettings {
    pub prettier_path: Option<PathBuf>,
    pub js_beautify_path: Option<PathBuf>,
}

/// A client settings section that could not be read and was ignored.
#[derive(Debug, thiserror::Error)]
#[error("ignoring invalid `{section}` settings: {source}")]
pub struct SettingsError {
    pub section: &'static str,
    source: serde_json::Error,
}

impl EnvironmentSettings {
    /// Read client settings from a JSON value, logging ignored sections.
    pub fn from_value(value: serde_json::Value) -> Self {
        let (settings, errors) = Self::parse(&value);
        for e in errors {
            tracing::warn!("{e}");
        }
        settings
    }

    /// Read client settings from a JSON value.
    ///
    /// Sections are read independently: a section that doesn't fit is left at
    /// its defaults and reported in the returned errors.
    pub fn parse(value: &serde_json::Value) -> (Self, Vec<SettingsError>) {
        let mut errors = Vec::new();
        let settings = Self {
            prettier: section(value, "prettier", &mut errors),
            html: HtmlSettings {
                format: section(value, "html.format", &mut errors),
            },
            vuefmt: section(value, "vuefmt", &mut errors),
        };
        (settings, errors)
    }
}

/// Deserialize the section at dotted `path`, or its default when it is
/// missing, null or invalid.
fn section<T>(value: &serde_json::Value, path: &'static str, errors: &mut Vec<SettingsError>) -> T
where
    T: DeserializeOwned + Default,
{
    let found = path
        .split('.')
        .try_fold(value, |value, key| value.get(key));
    match found {
        None | Some(serde_json::Value::Null) => T::default(),
        Some(found) => T::deserialize(found).unwrap_or_else(|source| {
            errors.push(SettingsError {
                section: path,
                source,
            });
            T::default()
        }),
    }
}

/// Errors raised while reading a project config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Find the project config file in `root`, if any.
pub fn find_project_config(root: &Path) -> Option<PathBuf> {
    PROJECT_CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|candidate| candidate.is_file())
}

/// Load a project config file. `.toml` and `.json` files are read as TOML
/// and JSON, everything else (`.prettierrc`, `.yaml`, `.yml`) as YAML, which
/// also accepts JSON.
pub fn load_project_config(path: &Path) -> Result<OptionsLayer, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        }),
        Some("json") => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        }),
        _ => serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Resolves the options for one formatting pass.
///
/// Nothing is cached: each call re-reads the project config file, so edits to
/// it apply to the next pass.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    workspace_root: Option<PathBuf>,
    environment: Arc<EnvironmentSettings>,
}

impl ConfigResolver {
    pub fn new(workspace_root: Option<PathBuf>, environment: Arc<EnvironmentSettings>) -> Self {
        Self {
            workspace_root,
            environment,
        }
    }

    /// The environment settings this resolver layers over the defaults.
    pub fn environment(&self) -> &EnvironmentSettings {
        &self.environment
    }

    /// Merge defaults, environment settings and the project config file.
    pub fn resolve(&self) -> FormattingOptions {
        let mut options = FormattingOptions::default().layered(&self.environment.prettier);
        options.markup = options.markup.layered(&self.environment.html.format);

        match self.project_layer() {
            Some(layer) => options.layered(&layer),
            None => options,
        }
    }

    fn project_layer(&self) -> Option<OptionsLayer> {
        let path = find_project_config(self.workspace_root.as_deref()?)?;
        match load_project_config(&path) {
            Ok(layer) => {
                tracing::debug!("using project config {}", path.display());
                Some(layer)
            }
            Err(e) => {
                tracing::warn!("ignoring project config: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a unique temp directory for test isolation.
    fn make_test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("vuefmt-test")
            .join(name)
            .join(format!("{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup_test_dir(dir: &Path) {
        let _ = std::fs::remove_dir_all(dir);
    }

    fn environment(value: serde_json::Value) -> Arc<EnvironmentSettings> {
        Arc::new(EnvironmentSettings::from_value(value))
    }

    #[test]
    fn default_table() {
        let options = FormattingOptions::default();
        assert_eq!(options.print_width, 150);
        assert_eq!(options.tab_width, 4);
        assert!(!options.use_tabs);
        assert!(options.single_quote);
        assert!(options.semi);
        assert_eq!(options.trailing_comma, TrailingComma::None);
        assert_eq!(options.arrow_parens, ArrowParens::Avoid);
        assert_eq!(options.markup.wrap_line_length, 150);
        assert_eq!(options.markup.wrap_attributes, WrapAttributes::ForceAligned);
        assert_eq!(options.markup.unformatted.len(), 14);
        assert_eq!(options.markup.unformatted[0], "area");
        assert_eq!(options.markup.unformatted[13], "wbr");
    }

    #[test]
    fn empty_layer_changes_nothing() {
        let options = FormattingOptions::default().layered(&OptionsLayer::default());
        assert_eq!(options, FormattingOptions::default());
    }

    #[test]
    fn parse_layer_with_enums() {
        let layer: OptionsLayer = serde_json::from_str(
            r#"{ "tabWidth": 2, "trailingComma": "es5", "quoteProps": "as-needed", "plugins": [] }"#,
        )
        .unwrap();
        assert_eq!(layer.tab_width, Some(2));
        assert_eq!(layer.trailing_comma, Some(TrailingComma::Es5));
        assert_eq!(layer.quote_props, Some(QuoteProps::AsNeeded));
        assert_eq!(layer.semi, None);
    }

    #[test]
    fn environment_overrides_defaults() {
        let resolver = ConfigResolver::new(
            None,
            environment(serde_json::json!({
                "prettier": { "semi": false, "printWidth": 100 },
                "html": { "format": { "wrapLineLength": 120, "wrapAttributes": "auto" } }
            })),
        );
        let options = resolver.resolve();
        assert!(!options.semi);
        assert_eq!(options.print_width, 100);
        assert_eq!(options.tab_width, 4);
        assert_eq!(options.markup.wrap_line_length, 120);
        assert_eq!(options.markup.wrap_attributes, WrapAttributes::Auto);
        assert_eq!(options.markup.unformatted.len(), 14);
    }

    #[test]
    fn project_file_overrides_environment() {
        let dir = make_test_dir("project-overrides");
        std::fs::write(dir.join(".prettierrc"), r#"{ "tabWidth": 2, "semi": true }"#).unwrap();

        let resolver = ConfigResolver::new(
            Some(dir.clone()),
            environment(serde_json::json!({ "prettier": { "semi": false, "useTabs": true } })),
        );
        let options = resolver.resolve();
        assert_eq!(options.tab_width, 2);
        assert!(options.semi);
        assert!(options.use_tabs);

        cleanup_test_dir(&dir);
    }

    #[test]
    fn toml_project_file() {
        let dir = make_test_dir("project-toml");
        std::fs::write(
            dir.join(".prettierrc.toml"),
            "singleQuote = false\ntrailingComma = \"all\"\n",
        )
        .unwrap();

        let options = ConfigResolver::new(Some(dir.clone()), Arc::default()).resolve();
        assert!(!options.single_quote);
        assert_eq!(options.trailing_comma, TrailingComma::All);

        cleanup_test_dir(&dir);
    }

    #[test]
    fn prettierrc_preferred_over_json() {
        let dir = make_test_dir("project-order");
        std::fs::write(dir.join(".prettierrc"), r#"{ "tabWidth": 8 }"#).unwrap();
        std::fs::write(dir.join(".prettierrc.json"), r#"{ "tabWidth": 3 }"#).unwrap();

        assert_eq!(
            find_project_config(&dir),
            Some(dir.join(".prettierrc"))
        );
        let options = ConfigResolver::new(Some(dir.clone()), Arc::default()).resolve();
        assert_eq!(options.tab_width, 8);

        cleanup_test_dir(&dir);
    }

    #[test]
    fn invalid_project_file_degrades_to_environment() {
        let dir = make_test_dir("project-invalid");
        std::fs::write(dir.join(".prettierrc"), "tabWidth: [").unwrap();

        let resolver = ConfigResolver::new(
            Some(dir.clone()),
            environment(serde_json::json!({ "prettier": { "printWidth": 80 } })),
        );
        let options = resolver.resolve();
        assert_eq!(options.print_width, 80);
        assert_eq!(options.tab_width, 4);
        assert!(matches!(
            load_project_config(&dir.join(".prettierrc")),
            Err(ConfigError::Yaml { .. })
        ));

        cleanup_test_dir(&dir);
    }

    #[test]
    fn missing_project_file_uses_defaults() {
        let dir = make_test_dir("project-missing");
        assert_eq!(find_project_config(&dir), None);
        let options = ConfigResolver::new(Some(dir.clone()), Arc::default()).resolve();
        assert_eq!(options, FormattingOptions::default());

        cleanup_test_dir(&dir);
    }

    #[test]
    fn resolution_is_not_cached() {
        let dir = make_test_dir("project-reread");
        let resolver = ConfigResolver::new(Some(dir.clone()), Arc::default());
        assert_eq!(resolver.resolve().tab_width, 4);

        std::fs::write(dir.join(".prettierrc.json"), r#"{ "tabWidth": 2 }"#).unwrap();
        assert_eq!(resolver.resolve().tab_width, 2);

        cleanup_test_dir(&dir);
    }

    #[test]
    fn invalid_client_settings_fall_back() {
        let settings = EnvironmentSettings::from_value(serde_json::json!({
            "prettier": { "tabWidth": "wide" }
        }));
        assert_eq!(settings, EnvironmentSettings::default());
        assert_eq!(
            EnvironmentSettings::from_value(serde_json::Value::Null),
            EnvironmentSettings::default()
        );
    }

    #[test]
    fn yaml_project_file() {
        let dir = make_test_dir("project-yaml");
        std::fs::write(dir.join(".prettierrc"), "tabWidth: 2\nsemi: false\n").unwrap();

        let options = ConfigResolver::new(Some(dir.clone()), Arc::default()).resolve();
        assert_eq!(options.tab_width, 2);
        assert!(!options.semi);

        cleanup_test_dir(&dir);
    }

    #[test]
    fn yml_project_file_is_found() {
        let dir = make_test_dir("project-yml");
        std::fs::write(dir.join(".prettierrc.yml"), "trailingComma: es5\n").unwrap();

        assert_eq!(find_project_config(&dir), Some(dir.join(".prettierrc.yml")));
        let options = ConfigResolver::new(Some(dir.clone()), Arc::default()).resolve();
        assert_eq!(options.trailing_comma, TrailingComma::Es5);

        cleanup_test_dir(&dir);
    }

    #[test]
    fn unformatted_accepts_joined_string() {
        let settings = EnvironmentSettings::from_value(serde_json::json!({
            "prettier": { "tabWidth": 2 },
            "html": { "format": { "unformatted": "wbr, pre,", "wrapLineLength": 120 } }
        }));
        assert_eq!(settings.prettier.tab_width, Some(2));
        assert_eq!(settings.html.format.wrap_line_length, Some(120));
        assert_eq!(
            settings.html.format.unformatted,
            Some(vec!["wbr".to_string(), "pre".to_string()])
        );

        let listed = EnvironmentSettings::from_value(serde_json::json!({
            "html": { "format": { "unformatted": ["code"] } }
        }));
        assert_eq!(listed.html.format.unformatted, Some(vec!["code".to_string()]));
    }

    #[test]
    fn invalid_section_keeps_the_others() {
        let (settings, errors) = EnvironmentSettings::parse(&serde_json::json!({
            "prettier": { "tabWidth": 2 },
            "html": { "format": { "wrapAttributes": "sideways" } },
            "vuefmt": { "prettierPath": "/opt/bin/prettier" }
        }));
        assert_eq!(settings.prettier.tab_width, Some(2));
        assert_eq!(settings.html.format, MarkupLayer::default());
        assert_eq!(
            settings.vuefmt.prettier_path,
            Some(PathBuf::from("/opt/bin/prettier"))
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].section, "html.format");
    }

    #[test]
    fn tool_paths_from_settings() {
        let settings = EnvironmentSettings::from_value(serde_json::json!({
            "vuefmt": { "prettierPath": "/opt/bin/prettier" }
        }));
        assert_eq!(
            settings.vuefmt.prettier_path,
            Some(PathBuf::from("/opt/bin/prettier"))
        );
        assert_eq!(settings.vuefmt.js_beautify_path, None);
    }
}
