//! Grid rendering: replays a template sheet into a [`SheetSink`], filling
//! text cells and repeating loop rows for each collection item.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde_json::Value;

use super::{Cell, CellValue, GridLoop, GridToken, GridTokenizer, Sheet, SheetSink, SheetSource, Workbook};
use crate::config::Options;
use crate::constants::FORMULA_TRIGGERS;
use crate::error::{Error, Result};
use crate::render::{Scope, TextRenderer};

static LOOP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\[.*?\]\}").expect("loop tag pattern is valid"));

/// Where the next cell goes.
#[derive(Debug, Default)]
struct Position {
    row: Option<usize>,
    column: Option<usize>,
    depth: usize,
}

impl Position {
    fn next_row(&mut self) -> usize {
        let row = self.row.map_or(0, |row| row + 1);
        self.row = Some(row);
        self.column = None;
        row
    }

    fn next_cell(&mut self) -> Result<(usize, usize)> {
        let row = self
            .row
            .ok_or_else(|| Error::UsageError("cell rendered before any row".to_string()))?;
        let column = self.column.map_or(0, |column| column + 1);
        self.column = Some(column);
        Ok((row, column))
    }
}

/// Quotes a rendered text that a spreadsheet would read as a formula, unless
/// the template itself holds that text.
pub fn escape_formula(source: &str, rendered: String) -> String {
    if rendered != source && rendered.starts_with(FORMULA_TRIGGERS) {
        format!("'{rendered}")
    } else {
        rendered
    }
}

pub struct GridRenderer<'o> {
    options: &'o Options,
}

impl<'o> GridRenderer<'o> {
    pub fn new(options: &'o Options) -> Self {
        Self { options }
    }

    pub fn render_workbook(&self, template: &Workbook, data: &Value) -> Result<Workbook> {
        let scope = Scope::new(data);
        let text = TextRenderer::new(self.options);
        let mut sheets = Vec::with_capacity(template.sheets.len());
        for template_sheet in &template.sheets {
            let mut sheet = Sheet::new(text.render_str(&template_sheet.name, &scope)?);
            debug!("Rendering sheet '{}' as '{}'", template_sheet.name, sheet.name);
            self.render_sheet(template_sheet.cursor(), data, &mut sheet)?;
            sheets.push(sheet);
        }
        Ok(Workbook { sheets })
    }

    pub fn render_sheet<S, K>(&self, template: S, data: &Value, sink: &mut K) -> Result<()>
    where
        S: SheetSource,
        K: SheetSink,
    {
        let scope = Scope::new(data);
        let mut tokens = GridTokenizer::new(template);
        let mut position = Position::default();
        loop {
            match tokens.next_token()? {
                GridToken::End => return Ok(()),
                token => self.render_token(&token, &scope, sink, &mut position)?,
            }
        }
    }

    fn render_token<K: SheetSink>(
        &self,
        token: &GridToken,
        scope: &Scope<'_, '_>,
        sink: &mut K,
        position: &mut Position,
    ) -> Result<()> {
        match token {
            GridToken::NewRow | GridToken::NewBlankRow => {
                let row = position.next_row();
                sink.create_row(row)
            }
            GridToken::NonTextCell(cell) | GridToken::BlankCell(cell) => {
                self.render_cell(cell, cell.value.clone(), scope, sink, position)
            }
            GridToken::TextCell(cell) => {
                let source = match &cell.value {
                    CellValue::Text(source) => source.as_str(),
                    _ => "",
                };
                let rendered = TextRenderer::new(self.options).render_str(source, scope)?;
                let value = CellValue::Text(escape_formula(source, rendered));
                self.render_cell(cell, value, scope, sink, position)
            }
            GridToken::Loop(tag) => self.render_loop(tag, scope, sink, position),
            GridToken::End => Ok(()),
        }
    }

    fn render_cell<K: SheetSink>(
        &self,
        cell: &Cell,
        value: CellValue,
        scope: &Scope<'_, '_>,
        sink: &mut K,
        position: &mut Position,
    ) -> Result<()> {
        let (row, column) = position.next_cell()?;
        sink.create_cell(row, column)?;
        sink.set_value(row, column, value)?;
        sink.copy_style(row, column, cell.style.as_deref())?;
        let comment = match &cell.comment {
            Some(comment) => self.render_comment(comment, scope)?,
            None => None,
        };
        sink.set_comment(row, column, comment)
    }

    /// Drops any loop tag left in a comment and renders the rest.
    fn render_comment(&self, comment: &str, scope: &Scope<'_, '_>) -> Result<Option<String>> {
        let stripped = LOOP_TAG.replace_all(comment, "");
        if stripped.trim().is_empty() {
            return Ok(None);
        }
        let rendered = TextRenderer::new(self.options).render_str(&stripped, scope)?;
        Ok(if rendered.trim().is_empty() {
            None
        } else {
            Some(rendered)
        })
    }

    fn render_loop<K: SheetSink>(
        &self,
        tag: &GridLoop,
        scope: &Scope<'_, '_>,
        sink: &mut K,
        position: &mut Position,
    ) -> Result<()> {
        let items = scope.collection(&tag.collection)?;
        debug!("Rendering {} row item(s) of '{}'", items.len(), tag.collection);

        position.depth += 1;
        for (i, item) in items.iter().enumerate() {
            // Items of the outermost loop each start on a new row.
            if position.depth <= 1 && i > 0 {
                self.render_token(&GridToken::NewRow, scope, sink, position)?;
            }
            let inner = scope.bind(&tag.item, item);
            for token in &tag.body {
                self.render_token(token, &inner, sink, position)?;
            }
        }
        position.depth -= 1;
        Ok(())
    }
}

/// Renders a workbook with the default options.
pub fn render_workbook(template: &Workbook, data: &Value) -> Result<Workbook> {
    GridRenderer::new(&Options::default()).render_workbook(template, data)
}
