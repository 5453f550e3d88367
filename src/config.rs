use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Looked up in the working directory when no `--config` path is given.
const DEFAULT_CONFIG_FILE: &str = "quotes";
const ENV_PREFIX: &str = "QUOTES";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub extractor: ExtractorConfig,
    pub render: RenderConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Markers that open an attribution line. Matched longest first.
    pub author_prefixes: Vec<String>,
    /// Every character here counts as a quotation mark.
    pub quotation_marks: String,
    /// Class names marking structural noise (bylines, share widgets).
    pub noise_classes: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            author_prefixes: ["\\-- ", "\\--", "-- ", "--", "—", "–", "-"]
                .into_iter()
                .map(String::from)
                .collect(),
            quotation_marks: "'\"“”‘’".to_string(),
            noise_classes: ["byline", "sharetable", "share-tools"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Prefix lines inside `<blockquote>` with `> `.
    pub blockquote_markers: bool,
    /// Wrap `<em>`/`<i>` content in underscores.
    pub emphasis_markers: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            blockquote_markers: true,
            emphasis_markers: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// One match per post.
    pub post_selector: String,
    /// Excerpt/body container inside a post. The post itself when unset,
    /// empty (TOML has no null) or not found.
    pub body_selector: Option<String>,
    /// First match inside a post names it in logs and output.
    pub title_selector: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            post_selector: "article".to_string(),
            body_selector: Some(".entry-content".to_string()),
            title_selector: "h1, h2, h3".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, then the config file, then `QUOTES__SECTION__KEY` env vars.
    /// An explicit path must exist; the default `quotes.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }
}
