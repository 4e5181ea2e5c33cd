//! Engine configuration.
//! Options are read from `backfill.json`, `backfill.yml` or `backfill.yaml`,
//! or from an explicit file, and fall back to defaults when absent.

use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::constants::{
    CONFIG_FILES, DEFAULT_BREAKER_WINDOW, DEFAULT_DATE_FORMAT, DEFAULT_MAX_TEXT_TOKEN_LEN,
};
use crate::error::{Error, Result};
use crate::path::{coerce_as, LeafType};

/// Options shared by the text and grid engines.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Maximum length of the literal text used to find where a value ends.
    pub breaker_window: usize,

    /// Text runs longer than this are split into several tokens.
    pub max_text_token_len: usize,

    /// Whether extracted text is turned into booleans and numbers.
    pub coerce_leaf_values: bool,

    /// Per-path overrides of the coercion, keyed by expression path.
    pub leaf_types: IndexMap<String, LeafType>,

    /// `chrono` format used to read date cells as text.
    pub date_format: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            breaker_window: DEFAULT_BREAKER_WINDOW,
            max_text_token_len: DEFAULT_MAX_TEXT_TOKEN_LEN,
            coerce_leaf_values: true,
            leaf_types: IndexMap::new(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl Options {
    /// Type to give to text extracted for `path`.
    pub fn leaf_type(&self, path: &str) -> LeafType {
        match self.leaf_types.get(path.trim()) {
            Some(leaf_type) => *leaf_type,
            None if self.coerce_leaf_values => LeafType::Auto,
            None => LeafType::String,
        }
    }

    /// Converts text extracted for `path` into the value stored in the tree.
    pub fn leaf_value(&self, path: &str, raw: &str) -> Result<Value> {
        coerce_as(raw, self.leaf_type(path))
    }

    fn validate(self) -> Result<Self> {
        if self.breaker_window == 0 {
            return Err(Error::ConfigError(
                "breaker_window must be at least 1".to_string(),
            ));
        }
        if self.max_text_token_len == 0 {
            return Err(Error::ConfigError(
                "max_text_token_len must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Parses configuration content, trying JSON first and YAML second.
///
/// # Errors
/// * `Error::ConfigError` if the content is neither valid JSON nor valid YAML
pub fn parse_options(content: &str) -> Result<Options> {
    let options: Options = match serde_json::from_str(content) {
        Ok(options) => options,
        Err(_) => serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration format: {e}")))?,
    };
    options.validate()
}

/// Parses a data tree, trying JSON first and YAML second.
pub fn parse_data(content: &str) -> Result<Value> {
    match serde_json::from_str(content) {
        Ok(data) => Ok(data),
        Err(_) => Ok(serde_yaml::from_str(content)?),
    }
}

/// Loads options from an explicit configuration file.
pub fn load_options<P: AsRef<Path>>(path: P) -> Result<Options> {
    let path = path.as_ref();
    debug!("Loading configuration from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    parse_options(&content)
}

/// Looks for a configuration file in `dir`, trying every supported name.
/// Returns the default options when none exists.
pub fn find_options<P: AsRef<Path>>(dir: P) -> Result<Options> {
    for file in CONFIG_FILES {
        let config_path = dir.as_ref().join(file);
        if config_path.exists() {
            return load_options(config_path);
        }
    }
    debug!("No configuration file found (tried: {})", CONFIG_FILES.join(", "));
    Ok(Options::default())
}
