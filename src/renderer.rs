//! Engine facade tying tokenizers, extraction and rendering together for
//! both text documents and workbooks.

use std::io::{BufRead, Write};

use log::debug;
use serde_json::{Map, Value};

use crate::config::Options;
use crate::error::Result;
use crate::extract::TextExtractor;
use crate::grid::{GridExtractor, GridRenderer, Workbook};
use crate::render::{Scope, TextRenderer};
use crate::stream::{chars_of, CharReader, Pushback};
use crate::tokenizer::{tokenize_reader, tokenize_str};

/// Trait for template rendering engines.
pub trait TemplateRenderer {
    /// Renders a template string with the given context.
    ///
    /// # Arguments
    /// * `template` - Template string to render
    /// * `context` - Data tree providing the values
    ///
    /// # Returns
    /// * `Result<String>` - Rendered document
    fn render(&self, template: &str, context: &Value) -> Result<String>;
}

/// Trait for engines reading data back out of filled documents.
pub trait DataExtractor {
    /// Extracts the values `document` holds where `template` has tags.
    ///
    /// # Arguments
    /// * `template` - Template the document was rendered from
    /// * `document` - Filled document
    /// * `data` - Tree to write into; may already hold values
    ///
    /// # Errors
    /// * `Error::MismatchError` if the document does not follow the template
    /// * `Error::ParseError` if the template is malformed
    fn extract(&self, template: &str, document: &str, data: &mut Value) -> Result<()>;
}

/// Bidirectional template engine.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    options: Options,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self { options }
    }

    /// Extracts from streamed template and document.
    pub fn extract_reader<T, D>(&self, template: T, document: D, data: &mut Value) -> Result<()>
    where
        T: BufRead,
        D: BufRead,
    {
        let mut tokens =
            tokenize_reader(template).with_max_text_len(self.options.max_text_token_len);
        let mut document = Pushback::new(CharReader::new(document));
        TextExtractor::new(&self.options).extract(&mut tokens, &mut document, data)
    }

    /// Renders a streamed template into `out`.
    pub fn render_writer<T, W>(&self, template: T, context: &Value, out: &mut W) -> Result<()>
    where
        T: BufRead,
        W: Write,
    {
        let mut tokens =
            tokenize_reader(template).with_max_text_len(self.options.max_text_token_len);
        TextRenderer::new(&self.options).render(&mut tokens, &Scope::new(context), out)?;
        out.flush()?;
        Ok(())
    }

    pub fn extract_workbook(
        &self,
        template: &Workbook,
        document: &Workbook,
        data: &mut Value,
    ) -> Result<()> {
        debug!(
            "Extracting a workbook of {} sheet(s) with a template of {}",
            document.sheets.len(),
            template.sheets.len()
        );
        GridExtractor::new(&self.options).extract_workbook(template, document, data)
    }

    pub fn render_workbook(&self, template: &Workbook, context: &Value) -> Result<Workbook> {
        GridRenderer::new(&self.options).render_workbook(template, context)
    }
}

impl TemplateRenderer for TemplateEngine {
    fn render(&self, template: &str, context: &Value) -> Result<String> {
        TextRenderer::new(&self.options).render_str(template, &Scope::new(context))
    }
}

impl DataExtractor for TemplateEngine {
    fn extract(&self, template: &str, document: &str, data: &mut Value) -> Result<()> {
        let mut tokens = tokenize_str(template).with_max_text_len(self.options.max_text_token_len);
        TextExtractor::new(&self.options).extract(&mut tokens, &mut chars_of(document), data)
    }
}

/// A fresh, empty data tree.
pub fn empty_tree() -> Value {
    Value::Object(Map::new())
}
