//! Spreadsheet-like grids: the in-memory model, the collaborator traits and
//! the grid tokens shared by extraction and rendering.
//!
//! A template sheet is a regular sheet whose text cells hold `{{ }}`
//! expressions. Loops are not written in the cells: they live in cell
//! comments, `{[ collection | item ]}` on the first cell of the loop body and
//! `{[ item ]}` on its last cell.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod extract;
pub mod reader;
pub mod render;
pub mod tokenizer;

pub use extract::{extract_workbook, GridExtractor};
pub use reader::SheetTokens;
pub use render::{render_workbook, GridRenderer};
pub use tokenizer::GridTokenizer;

/// Typed content of a cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellValue {
    #[default]
    Blank,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Formula source, without the leading `=`.
    Formula(String),
    Date(NaiveDate),
}

impl CellValue {
    /// Blank cells and empty text both count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Blank => true,
            CellValue::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    /// Text form of the value as seen by text extraction.
    pub fn as_text(&self, date_format: &str) -> String {
        match self {
            CellValue::Blank => String::new(),
            CellValue::Text(text) | CellValue::Formula(text) => text.clone(),
            CellValue::Number(number) => format_number(*number),
            CellValue::Bool(flag) => flag.to_string(),
            CellValue::Date(date) => date.format(date_format).to_string(),
        }
    }
}

/// Integral numbers are printed without a fractional part.
fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cell {
    pub column: usize,
    #[serde(default)]
    pub value: CellValue,
    /// Opaque style name, copied as is when rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Cell {
    pub fn new(column: usize, value: CellValue) -> Self {
        Self {
            column,
            value,
            ..Self::default()
        }
    }

    pub fn blank(column: usize) -> Self {
        Self::new(column, CellValue::Blank)
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }
}

/// A row of a sheet. Cells are sparse and sorted by column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    pub index: usize,
    #[serde(default)]
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(index: usize, cells: Vec<Cell>) -> Self {
        Self { index, cells }
    }
}

/// A sheet. Rows are sparse and sorted by index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// Forward cursor over the rows of this sheet.
    pub fn cursor(&self) -> SheetCursor<'_> {
        SheetCursor {
            name: &self.name,
            rows: self.rows.iter(),
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows
            .iter()
            .find(|r| r.index == row)
            .and_then(|r| r.cells.iter().find(|c| c.column == column))
    }

    fn cell_mut(&mut self, row: usize, column: usize) -> Result<&mut Cell> {
        self.rows
            .iter_mut()
            .find(|r| r.index == row)
            .and_then(|r| r.cells.iter_mut().find(|c| c.column == column))
            .ok_or_else(|| {
                Error::UsageError(format!(
                    "cell ({row}, {column}) of sheet '{}' was never created",
                    self.name
                ))
            })
    }
}

/// Forward, row by row access to a sheet being read.
pub trait SheetSource {
    fn name(&self) -> &str;

    /// Next row holding at least one cell, in ascending index order.
    fn next_row(&mut self) -> Result<Option<Row>>;
}

/// Write access to a sheet being rendered.
pub trait SheetSink {
    fn create_row(&mut self, row: usize) -> Result<()>;
    fn create_cell(&mut self, row: usize, column: usize) -> Result<()>;
    fn set_value(&mut self, row: usize, column: usize, value: CellValue) -> Result<()>;
    fn copy_style(&mut self, row: usize, column: usize, style: Option<&str>) -> Result<()>;
    /// `None` clears the comment.
    fn set_comment(&mut self, row: usize, column: usize, comment: Option<String>) -> Result<()>;
}

pub struct SheetCursor<'a> {
    name: &'a str,
    rows: std::slice::Iter<'a, Row>,
}

impl SheetSource for SheetCursor<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.next().cloned())
    }
}

impl SheetSink for Sheet {
    fn create_row(&mut self, row: usize) -> Result<()> {
        if let Err(position) = self.rows.binary_search_by_key(&row, |r| r.index) {
            self.rows.insert(position, Row::new(row, Vec::new()));
        }
        Ok(())
    }

    fn create_cell(&mut self, row: usize, column: usize) -> Result<()> {
        self.create_row(row)?;
        let Some(target) = self.rows.iter_mut().find(|r| r.index == row) else {
            return Err(Error::UsageError(format!("row {row} could not be created")));
        };
        if let Err(position) = target.cells.binary_search_by_key(&column, |c| c.column) {
            target.cells.insert(position, Cell::blank(column));
        }
        Ok(())
    }

    fn set_value(&mut self, row: usize, column: usize, value: CellValue) -> Result<()> {
        self.cell_mut(row, column)?.value = value;
        Ok(())
    }

    fn copy_style(&mut self, row: usize, column: usize, style: Option<&str>) -> Result<()> {
        self.cell_mut(row, column)?.style = style.map(str::to_string);
        Ok(())
    }

    fn set_comment(&mut self, row: usize, column: usize, comment: Option<String>) -> Result<()> {
        self.cell_mut(row, column)?.comment = comment;
        Ok(())
    }
}

/// Loop read out of cell comments, with the grid tokens of its body.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLoop {
    pub collection: String,
    pub item: String,
    pub body: Vec<GridToken>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridToken {
    NewRow,
    /// A row without any non-blank cell. Its cells are not reported.
    NewBlankRow,
    TextCell(Cell),
    NonTextCell(Cell),
    BlankCell(Cell),
    Loop(GridLoop),
    End,
}

impl GridToken {
    /// Classifies a cell by its value.
    pub fn cell(cell: Cell) -> Self {
        if cell.value.is_blank() {
            GridToken::BlankCell(cell)
        } else if matches!(cell.value, CellValue::Text(_)) {
            GridToken::TextCell(cell)
        } else {
            GridToken::NonTextCell(cell)
        }
    }

    pub fn is_row(&self) -> bool {
        matches!(self, GridToken::NewRow | GridToken::NewBlankRow)
    }

    /// Short human readable form for error messages.
    pub fn describe(&self) -> String {
        match self {
            GridToken::NewRow => "a new row".to_string(),
            GridToken::NewBlankRow => "a new blank row".to_string(),
            GridToken::TextCell(cell) => format!("a text cell at column {}", cell.column),
            GridToken::NonTextCell(cell) => format!("a non-text cell at column {}", cell.column),
            GridToken::BlankCell(cell) => format!("a blank cell at column {}", cell.column),
            GridToken::Loop(l) => format!("loop '{}'", l.item),
            GridToken::End => "the end of the sheet".to_string(),
        }
    }
}

/// Turns a row into grid tokens. Gaps between cells become blank cells, and
/// a row holding only blank cells is reported as one blank row.
pub fn row_tokens(row: &Row) -> Vec<GridToken> {
    if row.cells.iter().all(|cell| cell.value.is_blank()) {
        return vec![GridToken::NewBlankRow];
    }
    let mut tokens = vec![GridToken::NewRow];
    let mut column = 0;
    for cell in &row.cells {
        while column < cell.column {
            tokens.push(GridToken::BlankCell(Cell::blank(column)));
            column += 1;
        }
        tokens.push(GridToken::cell(cell.clone()));
        column = cell.column + 1;
    }
    tokens
}
