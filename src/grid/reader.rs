//! Reads a filled sheet as a forward stream of grid tokens.
//!
//! Rows missing from the source are reported as blank rows, so row positions
//! line up with the template even when the source skips empty rows.

use std::collections::VecDeque;

use log::trace;

use super::{row_tokens, GridToken, Row, SheetSource};
use crate::error::Result;
use crate::stream::Pushback;

pub struct SheetTokens<S> {
    source: S,
    queue: VecDeque<GridToken>,
    /// Row fetched ahead of its position, waiting for blank rows to be reported.
    ahead: Option<Row>,
    next_index: usize,
    done: bool,
}

impl<S: SheetSource> SheetTokens<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            queue: VecDeque::new(),
            ahead: None,
            next_index: 0,
            done: false,
        }
    }

    /// Wraps the reader into a stream the grid engine can push tokens back on.
    pub fn into_stream(self) -> Pushback<GridToken, Self> {
        Pushback::new(self)
    }

    fn fill(&mut self) -> Result<()> {
        let row = match self.ahead.take() {
            Some(row) => row,
            None => match self.source.next_row()? {
                Some(row) => row,
                None => {
                    self.done = true;
                    return Ok(());
                }
            },
        };

        if row.index > self.next_index {
            trace!("sheet '{}': row {} is missing", self.source.name(), self.next_index);
            self.next_index += 1;
            self.ahead = Some(row);
            self.queue.push_back(GridToken::NewBlankRow);
            return Ok(());
        }

        self.next_index = row.index + 1;
        self.queue.extend(row_tokens(&row));
        Ok(())
    }
}

impl<S: SheetSource> Iterator for SheetTokens<S> {
    type Item = Result<GridToken>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.queue.is_empty() && !self.done {
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.queue.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Cell, CellValue, Sheet};

    fn text(column: usize, s: &str) -> Cell {
        Cell::new(column, CellValue::Text(s.to_string()))
    }

    #[test]
    fn test_missing_rows_and_cells() {
        let sheet = Sheet {
            name: "doc".to_string(),
            rows: vec![
                Row::new(0, vec![text(0, "a")]),
                Row::new(2, vec![text(1, "b")]),
                Row::new(3, vec![Cell::blank(0), Cell::blank(1)]),
            ],
        };
        let tokens: Vec<GridToken> = SheetTokens::new(sheet.cursor())
            .map(|t| t.unwrap())
            .collect();
        assert_eq!(
            tokens,
            vec![
                GridToken::NewRow,
                GridToken::TextCell(text(0, "a")),
                GridToken::NewBlankRow,
                GridToken::NewRow,
                GridToken::BlankCell(Cell::blank(0)),
                GridToken::TextCell(text(1, "b")),
                GridToken::NewBlankRow,
            ]
        );
    }

    #[test]
    fn test_empty_sheet() {
        let sheet = Sheet::new("empty");
        assert_eq!(SheetTokens::new(sheet.cursor()).count(), 0);
    }
}
