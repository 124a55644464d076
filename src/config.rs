//! Build configuration.
//!
//! Handles loading, validating, and merging `lesson-build.toml`. Stock
//! defaults are the base layer; the user file only needs the keys it wants to
//! override. Unknown keys are rejected to catch typos early.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! templates_dir = "templates"     # template.html, {theme}_legal.html, css/
//! assets_dir = "assets"           # fonts/ and img/ are copied to the output root
//! manifest_extension = "manifest" # files describing one term each
//!
//! [renderer]
//! program = "pandoc"
//! highlight_style = "pygments"
//! markdown_format = "markdown_github+header_attributes+yaml_metadata_block+inline_code_attributes+smart"
//! filter = "pandoc_scratchblocks/filter.py"  # optional pandoc filter
//!
//! [processing]
//! max_processes = 4               # Max parallel project builds (omit for auto)
//!
//! [languages.nl-NL]
//! name = "Nederlands"
//!
//! [languages.nl-NL.legal]
//! uk = "<p>Juridische tekst</p>"  # legal footer override, keyed by theme id
//!
//! [languages.nl-NL.translations]
//! resources = "bronnen"
//! Projects = "Projecten"
//!
//! [themes.uk.css_variables]
//! header_text = "#000000"         # merged over the theme's stock variables
//! ```
//!
//! Relative paths are resolved against the directory holding the config
//! file, so a build behaves the same from any working directory.

use crate::model::{DEFAULT_LANGUAGE, Language, Languages, Theme};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("failed to read legal text {path}: {source}")]
    Legal {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "lesson-build.toml";

/// Build configuration loaded from `lesson-build.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory holding `template.html`, the legal snippets and `css/`.
    pub templates_dir: PathBuf,
    /// Directory holding `fonts/` and `img/`.
    pub assets_dir: PathBuf,
    /// Extension (without the dot) of term manifests.
    pub manifest_extension: String,
    pub renderer: RendererConfig,
    pub processing: ProcessingConfig,
    /// Languages keyed by code.
    pub languages: BTreeMap<String, LanguageConfig>,
    /// Per-theme overrides keyed by theme id.
    pub themes: BTreeMap<String, ThemeConfig>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            assets_dir: PathBuf::from("assets"),
            manifest_extension: "manifest".to_string(),
            renderer: RendererConfig::default(),
            processing: ProcessingConfig::default(),
            languages: BTreeMap::new(),
            themes: BTreeMap::new(),
        }
    }
}

impl BuildConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.manifest_extension.trim().is_empty() {
            return Err(ConfigError::Validation(
                "manifest_extension must not be empty".into(),
            ));
        }
        if self.manifest_extension.starts_with('.') {
            return Err(ConfigError::Validation(
                "manifest_extension must not start with a dot".into(),
            ));
        }
        if self.renderer.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "renderer.program must not be empty".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Make every relative path absolute against `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        self.templates_dir = base.join(&self.templates_dir);
        self.assets_dir = base.join(&self.assets_dir);
        self.renderer.filter = self.renderer.filter.map(|f| base.join(f));
        self
    }

    /// The language registry for one run: stock English plus everything
    /// configured here.
    pub fn languages(&self) -> Languages {
        Languages::new(self.languages.iter().map(|(code, lang)| Language {
            code: code.clone(),
            name: lang.name.clone().unwrap_or_else(|| match code.as_str() {
                DEFAULT_LANGUAGE => "English".to_string(),
                _ => code.clone(),
            }),
            legal: lang.legal.clone(),
            translations: lang.translations.clone(),
        }))
    }
}

/// External renderer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Renderer executable, looked up on `PATH` unless it is a path.
    pub program: String,
    pub highlight_style: String,
    /// Input format used for markdown lessons.
    pub markdown_format: String,
    /// Optional pandoc filter run on every page.
    pub filter: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: "pandoc".to_string(),
            highlight_style: "pygments".to_string(),
            markdown_format:
                "markdown_github+header_attributes+yaml_metadata_block+inline_code_attributes+smart"
                    .to_string(),
            filter: None,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of projects built in parallel.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// One configured output language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LanguageConfig {
    /// Display name; defaults to the language code.
    pub name: Option<String>,
    /// Legal footer overrides keyed by theme id.
    pub legal: BTreeMap<String, String>,
    pub translations: BTreeMap<String, String>,
}

/// Overrides for one theme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeConfig {
    pub css_variables: BTreeMap<String, String>,
}

/// Site variant selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Region {
    /// Code Club World
    World,
    /// Code Club UK
    Uk,
}

impl Region {
    pub fn id(self) -> &'static str {
        match self {
            Region::World => "world",
            Region::Uk => "uk",
        }
    }

    /// Build the theme for this region.
    ///
    /// The legal footer is read from `{templates_dir}/{id}_legal.html`;
    /// configured CSS variables are merged over the stock ones.
    pub fn theme(self, config: &BuildConfig) -> Result<Theme, ConfigError> {
        let (name, logo, stock_variables) = match self {
            Region::World => (
                "Code Club World",
                "/img/ccw_logo.svg",
                [
                    ("header_bg_light", "#ADCAEA"),
                    ("header_bg_dark", "#007CC9"),
                    ("header_text", "#FFFFFF"),
                ],
            ),
            Region::Uk => (
                "Code Club",
                "/img/ccuk_logo.svg",
                [
                    ("header_bg_light", "#B1DAAE"),
                    ("header_bg_dark", "#349946"),
                    ("header_text", "#FFFFFF"),
                ],
            ),
        };

        let legal_path = config
            .templates_dir
            .join(format!("{}_legal.html", self.id()));
        let legal = fs::read_to_string(&legal_path).map_err(|source| ConfigError::Legal {
            path: legal_path.clone(),
            source,
        })?;

        let mut css_variables: BTreeMap<String, String> = stock_variables
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(overrides) = config.themes.get(self.id()) {
            css_variables.extend(overrides.css_variables.clone());
        }

        Ok(Theme {
            id: self.id().to_string(),
            name: name.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            legal,
            stylesheets: Vec::new(),
            logo: logo.to_string(),
            css_variables,
        })
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BuildConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BuildConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, falling back to stock defaults when it
/// does not exist.
///
/// Relative paths in the result are anchored at the file's directory.
pub fn load_config(path: &Path) -> Result<BuildConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    let config = resolve_config(stock_defaults_value(), overlay)?;
    let base = path.parent().unwrap_or(Path::new(""));
    Ok(config.resolve_paths(base))
}

/// Returns a fully-commented stock `lesson-build.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# lesson-build Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Relative paths are resolved against the directory holding this file.
# Unknown keys will cause an error.

# Directory with template.html, world_legal.html, uk_legal.html and css/.
# Every .css file under css/ may use $variables from the theme.
templates_dir = "templates"

# Directory with fonts/ and img/, copied to the output root.
assets_dir = "assets"

# Extension of term manifest files.
manifest_extension = "manifest"

# ---------------------------------------------------------------------------
# Renderer
# ---------------------------------------------------------------------------
[renderer]
# Renderer executable. Must accept pandoc's command line.
program = "pandoc"

# Syntax highlighting style for code blocks.
highlight_style = "pygments"

# Input format for markdown lessons.
markdown_format = "markdown_github+header_attributes+yaml_metadata_block+inline_code_attributes+smart"

# Optional filter run on every page, e.g. for scratch blocks.
# filter = "pandoc_scratchblocks/filter.py"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel project builds within a term.
# Omit to use all CPU cores. Larger values are clamped to the core count.
# max_processes = 4

# ---------------------------------------------------------------------------
# Languages
# ---------------------------------------------------------------------------
# Codes found in manifests but not listed here use the code as display name
# and are not translated.
#
# [languages.nl-NL]
# name = "Nederlands"
#
# [languages.nl-NL.legal]
# uk = "<p>...</p>"
#
# [languages.nl-NL.translations]
# resources = "bronnen"
# Projects = "Projecten"
# Extras = "Extra's"
# Notes = "Notities"
# Resources = "Bronnen"
# Terms = "Periodes"
# Languages = "Talen"

# ---------------------------------------------------------------------------
# Themes
# ---------------------------------------------------------------------------
# CSS variables per theme, merged over the stock values.
#
# [themes.world.css_variables]
# header_bg_light = "#ADCAEA"
# header_bg_dark = "#007CC9"
# header_text = "#FFFFFF"
#
# [themes.uk.css_variables]
# header_bg_light = "#B1DAAE"
# header_bg_dark = "#349946"
# header_text = "#FFFFFF"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = BuildConfig::default();
        assert_eq!(config.templates_dir, PathBuf::from("templates"));
        assert_eq!(config.assets_dir, PathBuf::from("assets"));
        assert_eq!(config.manifest_extension, "manifest");
        assert_eq!(config.renderer.program, "pandoc");
        assert_eq!(config.renderer.highlight_style, "pygments");
        assert_eq!(config.renderer.filter, None);
        assert_eq!(config.processing.max_processes, None);
        assert!(config.languages.is_empty());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[renderer]
program = "/opt/pandoc/bin/pandoc"
"##;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.renderer.program, "/opt/pandoc/bin/pandoc");
        // Default values preserved
        assert_eq!(config.renderer.highlight_style, "pygments");
        assert_eq!(config.manifest_extension, "manifest");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<BuildConfig, _> = toml::from_str("templates = \"x\"");
        assert!(result.is_err());

        let result: Result<BuildConfig, _> = toml::from_str("[renderer]\nprogramme = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn languages_become_registry_entries() {
        let toml = r##"
[languages.nl-NL]
name = "Nederlands"

[languages.nl-NL.legal]
uk = "<p>nl</p>"

[languages.nl-NL.translations]
resources = "bronnen"

[languages.de-DE.translations]
Projects = "Projekte"
"##;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        let languages = config.languages();

        let dutch = languages.resolve("nl-NL");
        assert_eq!(dutch.name, "Nederlands");
        assert_eq!(dutch.translate("resources"), "bronnen");
        assert_eq!(dutch.legal.get("uk").map(String::as_str), Some("<p>nl</p>"));

        // no name configured: the code is the name
        assert_eq!(languages.resolve("de-DE").name, "de-DE");
        assert_eq!(languages.resolve(DEFAULT_LANGUAGE).name, "English");
    }

    #[test]
    fn configured_english_keeps_its_name() {
        let toml = r##"
[languages.en-GB.translations]
resources = "resources"
"##;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.languages().resolve("en-GB").name, "English");
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_accepts_defaults() {
        assert!(BuildConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_extension() {
        let config = BuildConfig {
            manifest_extension: String::new(),
            ..BuildConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = BuildConfig {
            manifest_extension: ".manifest".to_string(),
            ..BuildConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_empty_program() {
        let mut config = BuildConfig::default();
        config.renderer.program = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_zero_processes() {
        let mut config = BuildConfig::default();
        config.processing.max_processes = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Loading and merging
    // =========================================================================

    #[test]
    fn merge_toml_overlays_nested_tables() {
        let base: toml::Value = toml::from_str("[renderer]\nprogram = \"pandoc\"\nhighlight_style = \"pygments\"").unwrap();
        let overlay: toml::Value = toml::from_str("[renderer]\nhighlight_style = \"tango\"").unwrap();

        let merged = merge_toml(base, overlay);
        assert_eq!(merged["renderer"]["program"].as_str(), Some("pandoc"));
        assert_eq!(merged["renderer"]["highlight_style"].as_str(), Some("tango"));
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE)).unwrap();

        assert_eq!(config.templates_dir, tmp.path().join("templates"));
        assert_eq!(config.assets_dir, tmp.path().join("assets"));
        assert_eq!(config.renderer.program, "pandoc");
    }

    #[test]
    fn load_config_reads_file_and_resolves_paths() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r##"
templates_dir = "site/templates"
assets_dir = "/srv/assets"

[renderer]
filter = "pandoc_scratchblocks/filter.py"

[processing]
max_processes = 2
"##,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.templates_dir, tmp.path().join("site/templates"));
        assert_eq!(config.assets_dir, PathBuf::from("/srv/assets"));
        assert_eq!(
            config.renderer.filter,
            Some(tmp.path().join("pandoc_scratchblocks/filter.py"))
        );
        assert_eq!(config.processing.max_processes, Some(2));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "this is not valid toml [[[").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_invalid_value_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "[processing]\nmax_processes = 0\n").unwrap();

        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn stock_config_toml_is_valid_and_matches_defaults() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(stock_defaults_value(), Some(value)).unwrap();
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let auto = ProcessingConfig { max_processes: None };
        assert_eq!(effective_threads(&auto), cores);

        let one = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&one), 1);

        let many = ProcessingConfig {
            max_processes: Some(cores + 100),
        };
        assert_eq!(effective_threads(&many), cores);
    }

    // =========================================================================
    // Themes
    // =========================================================================

    fn templates_with_legal(tmp: &TempDir) -> BuildConfig {
        let templates = tmp.path().join("templates");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("uk_legal.html"), "<p>uk legal</p>").unwrap();
        fs::write(templates.join("world_legal.html"), "<p>world legal</p>").unwrap();
        BuildConfig {
            templates_dir: templates,
            ..BuildConfig::default()
        }
    }

    #[test]
    fn uk_theme_uses_stock_values() {
        let tmp = TempDir::new().unwrap();
        let config = templates_with_legal(&tmp);

        let theme = Region::Uk.theme(&config).unwrap();
        assert_eq!(theme.id, "uk");
        assert_eq!(theme.name, "Code Club");
        assert_eq!(theme.language, "en-GB");
        assert_eq!(theme.logo, "/img/ccuk_logo.svg");
        assert_eq!(theme.legal, "<p>uk legal</p>");
        assert_eq!(theme.css_variables["header_bg_dark"], "#349946");
        assert!(theme.stylesheets.is_empty());
    }

    #[test]
    fn world_theme_merges_configured_variables() {
        let tmp = TempDir::new().unwrap();
        let mut config = templates_with_legal(&tmp);
        config.themes.insert(
            "world".to_string(),
            ThemeConfig {
                css_variables: [
                    ("header_text".to_string(), "#000000".to_string()),
                    ("accent".to_string(), "#FF0000".to_string()),
                ]
                .into(),
            },
        );

        let theme = Region::World.theme(&config).unwrap();
        assert_eq!(theme.name, "Code Club World");
        assert_eq!(theme.legal, "<p>world legal</p>");
        assert_eq!(theme.css_variables["header_bg_light"], "#ADCAEA");
        assert_eq!(theme.css_variables["header_text"], "#000000");
        assert_eq!(theme.css_variables["accent"], "#FF0000");
    }

    #[test]
    fn missing_legal_text_is_error() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig {
            templates_dir: tmp.path().to_path_buf(),
            ..BuildConfig::default()
        };
        assert!(matches!(
            Region::Uk.theme(&config),
            Err(ConfigError::Legal { .. })
        ));
    }
}
