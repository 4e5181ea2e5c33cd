//! Grid extraction engine.
//!
//! Row and cell tokens of the template are matched one for one against the
//! document. Text cells are handed to the text engine. Loops cannot rely on
//! a breaker, so every iteration is matched speculatively: a candidate window
//! of document tokens is tried against the loop body on a scratch tree, and
//! only a successful dry run is replayed for real. A failed attempt puts every
//! token it read back on the document stream.

use std::mem::discriminant;

use log::{debug, trace, warn};
use serde_json::{Map, Value};

use super::{Cell, GridLoop, GridToken, GridTokenizer, SheetSource, SheetTokens, Workbook};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::extract::{init_collection, root_map, with_item, TextExtractor};
use crate::path::Path;
use crate::stream::{chars_of, Buffered, Pushback};
use crate::tokenizer::tokenize_str;

pub struct GridExtractor<'o> {
    options: &'o Options,
}

impl<'o> GridExtractor<'o> {
    pub fn new(options: &'o Options) -> Self {
        Self { options }
    }

    /// Extracts every sheet of `document` paired by position with the sheets
    /// of `template`. Extra document sheets are ignored.
    pub fn extract_workbook(
        &self,
        template: &Workbook,
        document: &Workbook,
        tree: &mut Value,
    ) -> Result<()> {
        for (template_sheet, document_sheet) in template.sheets.iter().zip(&document.sheets) {
            debug!(
                "Extracting sheet '{}' with template sheet '{}'",
                document_sheet.name, template_sheet.name
            );
            // Sheet names may be renamed by hand; a mismatch there is not fatal.
            if let Err(e) = self.extract_text(&template_sheet.name, &document_sheet.name, tree) {
                warn!(
                    "Sheet name '{}' does not match template '{}': {e}",
                    document_sheet.name, template_sheet.name
                );
            }
            self.extract_sheet(template_sheet.cursor(), document_sheet.cursor(), tree)?;
        }
        if document.sheets.len() > template.sheets.len() {
            debug!(
                "Ignoring {} document sheet(s) without a template",
                document.sheets.len() - template.sheets.len()
            );
        }
        Ok(())
    }

    /// Extracts one sheet. Document rows left once the template ends are
    /// ignored.
    pub fn extract_sheet<T, D>(&self, template: T, document: D, tree: &mut Value) -> Result<()>
    where
        T: SheetSource,
        D: SheetSource,
    {
        root_map(tree)?;
        let mut tokens = GridTokenizer::new(template);
        let mut document = SheetTokens::new(document).into_stream();
        loop {
            match tokens.next_token()? {
                GridToken::End => return Ok(()),
                token => self.extract_token(&token, &mut document, tree, 0)?,
            }
        }
    }

    fn extract_text(&self, template: &str, document: &str, tree: &mut Value) -> Result<()> {
        let mut tokens = tokenize_str(template).with_max_text_len(self.options.max_text_token_len);
        TextExtractor::new(self.options).extract(&mut tokens, &mut chars_of(document), tree)
    }

    fn extract_cell(&self, template: &Cell, document: &Cell, tree: &mut Value) -> Result<()> {
        let format = &self.options.date_format;
        self.extract_text(
            &template.value.as_text(format),
            &document.value.as_text(format),
            tree,
        )
        .map_err(|e| match e {
            Error::MismatchError {
                expected,
                found,
                location,
            } => Error::mismatch(
                expected,
                found,
                format!("column {} ({location})", document.column),
            ),
            other => other,
        })
    }

    fn extract_token<I>(
        &self,
        token: &GridToken,
        document: &mut Pushback<GridToken, I>,
        tree: &mut Value,
        depth: usize,
    ) -> Result<()>
    where
        I: Iterator<Item = Result<GridToken>>,
    {
        match token {
            GridToken::End => Ok(()),
            GridToken::Loop(tag) => self.extract_loop(tag, document, tree, depth + 1),
            GridToken::TextCell(cell) => match read(document)? {
                GridToken::TextCell(found)
                | GridToken::NonTextCell(found)
                | GridToken::BlankCell(found) => self.extract_cell(cell, &found, tree),
                other => Err(mismatch("a cell", &other, document)),
            },
            expected => {
                let found = read(document)?;
                if discriminant(expected) == discriminant(&found) {
                    Ok(())
                } else {
                    Err(mismatch(&expected.describe(), &found, document))
                }
            }
        }
    }

    fn extract_loop<I>(
        &self,
        tag: &GridLoop,
        document: &mut Pushback<GridToken, I>,
        tree: &mut Value,
        depth: usize,
    ) -> Result<()>
    where
        I: Iterator<Item = Result<GridToken>>,
    {
        let collection = Path::parse(&tag.collection)?;
        init_collection(&collection, tree)?;
        debug!("Extracting grid loop over '{}' at depth {depth}", tag.collection);

        // Only the outermost loop spans rows; nested loops stay within one.
        let row_keys: Vec<&GridToken> = if depth == 1 {
            tag.body.iter().filter(|t| t.is_row()).collect()
        } else {
            Vec::new()
        };

        let mut index = 0;
        loop {
            let separator = if depth == 1 && index > 0 {
                document.next()?
            } else {
                None
            };

            // An iteration that would consume nothing ends the loop without
            // adding an item.
            let window = match self.window(&row_keys, document)? {
                Some(window) if self.is_match(tag, &window, depth)?.is_some_and(|n| n > 0) => {
                    window
                }
                rejected => {
                    if let Some(window) = rejected {
                        document.unread(window);
                    }
                    if let Some(separator) = separator {
                        document.push_front(separator);
                    }
                    break;
                }
            };

            let mut candidates = Buffered::from_vec(window);
            with_item(&tag.item, &collection, index, tree, |tree| {
                self.run_body(tag, &mut candidates, tree, depth)
            })?;
            if depth > 1 {
                document.unread(candidates.into_remaining());
            }
            index += 1;
        }

        debug!("Grid loop over '{}' matched {index} item(s)", tag.collection);
        Ok(())
    }

    fn run_body<I>(
        &self,
        tag: &GridLoop,
        document: &mut Pushback<GridToken, I>,
        tree: &mut Value,
        depth: usize,
    ) -> Result<()>
    where
        I: Iterator<Item = Result<GridToken>>,
    {
        for token in &tag.body {
            self.extract_token(token, document, tree, depth)?;
        }
        Ok(())
    }

    /// Dry run of the loop body against `window`, on a scratch tree. Returns
    /// how many window tokens a matching iteration consumes.
    fn is_match(&self, tag: &GridLoop, window: &[GridToken], depth: usize) -> Result<Option<usize>> {
        let collection = Path::parse(&tag.collection)?;
        let mut scratch = Value::Object(Map::new());
        init_collection(&collection, &mut scratch)?;

        let mut candidates = Buffered::from_vec(window.to_vec());
        let outcome = with_item(&tag.item, &collection, 0, &mut scratch, |tree| {
            self.run_body(tag, &mut candidates, tree, depth)
        });

        match outcome {
            Ok(()) => {
                let leftover = candidates.into_remaining();
                let consumed = window.len() - leftover.len();
                if depth == 1 && !leftover.iter().all(|t| matches!(t, GridToken::BlankCell(_))) {
                    trace!("'{}': {} token(s) left unmatched", tag.item, leftover.len());
                    return Ok(None);
                }
                Ok(Some(consumed))
            }
            Err(e) if e.is_structural() => {
                trace!("'{}' does not match: {e}", tag.item);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Reads the candidate tokens of one loop iteration: cells up to the next
    /// row token, once per row token of the loop body. Returns `None`, with
    /// everything put back, when the document rows do not line up.
    fn window<I>(
        &self,
        row_keys: &[&GridToken],
        document: &mut Pushback<GridToken, I>,
    ) -> Result<Option<Vec<GridToken>>>
    where
        I: Iterator<Item = Result<GridToken>>,
    {
        let mut window = Vec::new();
        let mut boundary = read_cells(document, &mut window)?;

        for key in row_keys {
            match boundary {
                Some(token) if discriminant(&token) == discriminant(*key) => window.push(token),
                Some(token) => {
                    window.push(token);
                    document.unread(window);
                    return Ok(None);
                }
                None => {
                    document.unread(window);
                    return Ok(None);
                }
            }
            boundary = read_cells(document, &mut window)?;
        }

        if let Some(token) = boundary {
            document.push_front(token);
        }
        Ok(Some(window))
    }
}

/// Extracts a workbook with the default options.
pub fn extract_workbook(template: &Workbook, document: &Workbook, tree: &mut Value) -> Result<()> {
    GridExtractor::new(&Options::default()).extract_workbook(template, document, tree)
}

fn read<I>(document: &mut Pushback<GridToken, I>) -> Result<GridToken>
where
    I: Iterator<Item = Result<GridToken>>,
{
    Ok(document.next()?.unwrap_or(GridToken::End))
}

/// Moves cell tokens into `window` until a row token, which is returned.
fn read_cells<I>(
    document: &mut Pushback<GridToken, I>,
    window: &mut Vec<GridToken>,
) -> Result<Option<GridToken>>
where
    I: Iterator<Item = Result<GridToken>>,
{
    while let Some(token) = document.next()? {
        if token.is_row() {
            return Ok(Some(token));
        }
        window.push(token);
    }
    Ok(None)
}

fn mismatch<I>(expected: &str, found: &GridToken, document: &Pushback<GridToken, I>) -> Error
where
    I: Iterator<Item = Result<GridToken>>,
{
    Error::mismatch(
        expected,
        found.describe(),
        format!("document grid token {}", document.position()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellValue, Row, Sheet};
    use serde_json::json;

    fn text(column: usize, s: &str) -> Cell {
        Cell::new(column, CellValue::Text(s.to_string()))
    }

    fn extract(template: &Sheet, document: &Sheet) -> Result<Value> {
        let mut tree = json!({});
        GridExtractor::new(&Options::default()).extract_sheet(
            template.cursor(),
            document.cursor(),
            &mut tree,
        )?;
        Ok(tree)
    }

    #[test]
    fn test_cells_in_a_row() {
        let template = Sheet {
            name: "t".to_string(),
            rows: vec![Row::new(
                0,
                vec![
                    text(0, "Invoice {{invoice.number}}"),
                    Cell::new(1, CellValue::Number(1.0)),
                    text(2, "{{invoice.paid}}"),
                ],
            )],
        };
        let document = Sheet {
            name: "d".to_string(),
            rows: vec![Row::new(
                0,
                vec![
                    text(0, "Invoice 0042"),
                    Cell::new(1, CellValue::Number(7.0)),
                    Cell::new(2, CellValue::Bool(true)),
                ],
            )],
        };
        assert_eq!(
            extract(&template, &document).unwrap(),
            json!({"invoice": {"number": 42, "paid": true}})
        );
    }

    #[test]
    fn test_non_text_cell_mismatch() {
        let template = Sheet {
            name: "t".to_string(),
            rows: vec![Row::new(0, vec![Cell::new(0, CellValue::Number(1.0))])],
        };
        let document = Sheet {
            name: "d".to_string(),
            rows: vec![Row::new(0, vec![text(0, "one")])],
        };
        assert!(matches!(
            extract(&template, &document),
            Err(Error::MismatchError { .. })
        ));
    }

    #[test]
    fn test_nested_loop_within_a_row() {
        let template = Sheet {
            name: "t".to_string(),
            rows: vec![Row::new(
                0,
                vec![
                    text(0, "{{row.name}}").with_comment("{[rows|row]}"),
                    text(1, "#{{tag}}").with_comment("{[row.tags|tag]}{[tag]}{[row]}"),
                ],
            )],
        };
        let document = Sheet {
            name: "d".to_string(),
            rows: vec![
                Row::new(0, vec![text(0, "a"), text(1, "#x"), text(2, "#y")]),
                Row::new(1, vec![text(0, "b"), text(1, "#z")]),
            ],
        };
        assert_eq!(
            extract(&template, &document).unwrap(),
            json!({"rows": [
                {"name": "a", "tags": ["x", "y"]},
                {"name": "b", "tags": ["z"]}
            ]})
        );
    }

    #[test]
    fn test_loop_of_nested_loops_adds_no_empty_item() {
        let template = Sheet {
            name: "t".to_string(),
            rows: vec![Row::new(
                0,
                vec![text(0, "{{c}}").with_comment("{[rows|row]}{[row.cells|c]}{[c]}{[row]}")],
            )],
        };
        let document = Sheet {
            name: "d".to_string(),
            rows: vec![
                Row::new(0, vec![text(0, "a"), text(1, "b")]),
                Row::new(1, vec![text(0, "c")]),
            ],
        };
        assert_eq!(
            extract(&template, &document).unwrap(),
            json!({"rows": [{"cells": ["a", "b"]}, {"cells": ["c"]}]})
        );
    }

    #[test]
    fn test_malformed_cell_in_a_loop_is_fatal() {
        let template = Sheet {
            name: "t".to_string(),
            rows: vec![Row::new(0, vec![text(0, "{{a}}{{b}}").with_comment("{[xs|x]}{[]}")])],
        };
        let document = Sheet {
            name: "d".to_string(),
            rows: vec![Row::new(0, vec![text(0, "xy")])],
        };
        assert!(matches!(
            extract(&template, &document),
            Err(Error::ParseError(_))
        ));
    }
}
