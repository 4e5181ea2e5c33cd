//! Backfill is a bidirectional templating engine.
//! The same template renders a document from a data tree, and reads a data
//! tree back out of a document that was filled from it. Text documents and
//! spreadsheet-like workbooks are supported.

use std::io::{BufRead, Write};

use serde_json::Value;

/// Command-line interface module for the backfill binary
pub mod cli;

/// Engine options
/// Supports JSON and YAML formats (backfill.json, backfill.yml, backfill.yaml)
pub mod config;

/// Common constants
pub mod constants;

/// Error types and handling
pub mod error;

/// Text extraction engine
pub mod extract;

/// Workbook model, tokenizer, extraction and rendering
pub mod grid;

/// Logging setup for the binary
pub mod logger;

/// Path parsing, resolution and leaf coercion over the data tree
pub mod path;

/// Text rendering
pub mod render;

/// Engine facade
pub mod renderer;

/// Pushback streams shared by the tokenizers and engines
pub mod stream;

/// Template tokens
pub mod token;

/// Text template tokenizer
pub mod tokenizer;

use error::Result;
use renderer::{empty_tree, DataExtractor, TemplateEngine, TemplateRenderer};

/// Extracts a new data tree from `document` with the default options.
pub fn extract(template: &str, document: &str) -> Result<Value> {
    let mut data = empty_tree();
    TemplateEngine::new().extract(template, document, &mut data)?;
    Ok(data)
}

/// Extracts into an existing data tree, editing it in place.
pub fn extract_into(template: &str, document: &str, data: &mut Value) -> Result<()> {
    TemplateEngine::new().extract(template, document, data)
}

/// Extracts a new data tree from streamed template and document.
pub fn extract_reader<T: BufRead, D: BufRead>(template: T, document: D) -> Result<Value> {
    let mut data = empty_tree();
    TemplateEngine::new().extract_reader(template, document, &mut data)?;
    Ok(data)
}

/// Renders `template` with the values of `data`.
pub fn render(template: &str, data: &Value) -> Result<String> {
    TemplateEngine::new().render(template, data)
}

/// Renders a streamed template into `out`.
pub fn render_writer<T: BufRead, W: Write>(template: T, data: &Value, out: &mut W) -> Result<()> {
    TemplateEngine::new().render_writer(template, data, out)
}
