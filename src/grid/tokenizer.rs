//! Template sheet tokenizer.
//!
//! Cells become cell tokens the same way the document reader classifies
//! them. Loop tags are read out of cell comments: opening tags take effect
//! before the cell, closing tags after it. Processed tags are stripped from
//! the comment carried by the cell token.

use std::collections::VecDeque;

use log::trace;

use super::{row_tokens, Cell, GridLoop, GridToken, Row, SheetSource};
use crate::error::{Error, Result};
use crate::token::LoopTag;

/// Loop tags found in a cell comment.
struct Annotations {
    opens: Vec<GridLoop>,
    closes: Vec<Option<String>>,
}

/// Splits the leading loop tag off a comment made only of loop tags.
fn leading_tag(comment: &str) -> Option<(&str, &str)> {
    let trimmed = comment.trim();
    if !(trimmed.starts_with("{[") && trimmed.ends_with("]}")) {
        return None;
    }
    let end = trimmed.find("]}")?;
    Some((&trimmed[2..end], &trimmed[end + 2..]))
}

/// Reads and strips the loop tags of a cell comment.
fn annotations(cell: &mut Cell) -> Result<Annotations> {
    let mut found = Annotations {
        opens: Vec::new(),
        closes: Vec::new(),
    };
    let Some(mut comment) = cell.comment.take() else {
        return Ok(found);
    };

    while let Some((tag, rest)) = leading_tag(&comment) {
        match LoopTag::parse(tag)? {
            LoopTag::Open { collection, item } => {
                found.opens.push(GridLoop {
                    collection,
                    item,
                    body: Vec::new(),
                });
                comment = rest.to_string();
            }
            LoopTag::Close(_) => break,
        }
    }

    while let Some((tag, rest)) = leading_tag(&comment) {
        match LoopTag::parse(tag)? {
            LoopTag::Close(item) => {
                found.closes.push(item);
                comment = rest.to_string();
            }
            LoopTag::Open { collection, .. } => {
                return Err(Error::ParseError(format!(
                    "loop over '{collection}' opens after a closing tag in the comment of column {}",
                    cell.column
                )))
            }
        }
    }

    if !comment.trim().is_empty() {
        cell.comment = Some(comment);
    }
    Ok(found)
}

pub struct GridTokenizer<S> {
    source: S,
    queue: VecDeque<GridToken>,
    loops: Vec<GridLoop>,
    ahead: Option<Row>,
    next_index: usize,
    finished: bool,
}

impl<S: SheetSource> GridTokenizer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            queue: VecDeque::new(),
            loops: Vec::new(),
            ahead: None,
            next_index: 0,
            finished: false,
        }
    }

    /// Next top level token. Loops come out whole, with their body.
    pub fn next_token(&mut self) -> Result<GridToken> {
        if self.finished {
            return Err(Error::UsageError(
                "grid tokenizer already returned its End token".to_string(),
            ));
        }
        loop {
            if let Some(token) = self.queue.pop_front() {
                if token == GridToken::End {
                    self.finished = true;
                }
                return Ok(token);
            }
            self.fill()?;
        }
    }

    /// Reads every remaining token, `End` included.
    pub fn read_all(&mut self) -> Result<Vec<GridToken>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let end = token == GridToken::End;
            tokens.push(token);
            if end {
                return Ok(tokens);
            }
        }
    }

    fn push(&mut self, token: GridToken) {
        match self.loops.last_mut() {
            Some(open) => open.body.push(token),
            None => self.queue.push_back(token),
        }
    }

    fn close(&mut self, item: Option<String>) -> Result<()> {
        let Some(open) = self.loops.pop() else {
            return Err(Error::ParseError(format!(
                "closing loop tag '{}' in sheet '{}' without any opened loop",
                item.unwrap_or_default(),
                self.source.name()
            )));
        };
        if let Some(name) = item {
            if name != open.item {
                return Err(Error::ParseError(format!(
                    "closing loop tag '{name}' does not match the opened loop '{}'",
                    open.item
                )));
            }
        }
        trace!("loop over '{}' closed with {} token(s)", open.collection, open.body.len());
        self.push(GridToken::Loop(open));
        Ok(())
    }

    fn fill(&mut self) -> Result<()> {
        let row = match self.ahead.take() {
            Some(row) => row,
            None => match self.source.next_row()? {
                Some(row) => row,
                None => return self.finish(),
            },
        };

        if row.index > self.next_index {
            self.next_index += 1;
            self.ahead = Some(row);
            self.push(GridToken::NewBlankRow);
            return Ok(());
        }
        self.next_index = row.index + 1;

        let mut tokens = row_tokens(&row).into_iter();
        let Some(row_token) = tokens.next() else {
            return Ok(());
        };

        if row_token == GridToken::NewBlankRow {
            // Cells of a blank row are not reported, only their loop tags.
            let mut opens = Vec::new();
            let mut closes = Vec::new();
            for mut cell in row.cells {
                let found = annotations(&mut cell)?;
                opens.extend(found.opens);
                closes.extend(found.closes);
            }
            self.loops.extend(opens);
            self.push(GridToken::NewBlankRow);
            for item in closes {
                self.close(item)?;
            }
            return Ok(());
        }

        self.push(row_token);
        for token in tokens {
            let mut cell = match token {
                GridToken::TextCell(cell) | GridToken::NonTextCell(cell) | GridToken::BlankCell(cell) => cell,
                other => {
                    self.push(other);
                    continue;
                }
            };
            let found = annotations(&mut cell)?;
            self.loops.extend(found.opens);
            self.push(GridToken::cell(cell));
            for item in found.closes {
                self.close(item)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(open) = self.loops.last() {
            return Err(Error::ParseError(format!(
                "sheet '{}' ended inside loop '{}', every loop tag must be closed",
                self.source.name(),
                open.item
            )));
        }
        self.queue.push_back(GridToken::End);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellValue, Sheet};

    fn text(column: usize, s: &str) -> Cell {
        Cell::new(column, CellValue::Text(s.to_string()))
    }

    #[test]
    fn test_loop_from_comments() {
        let sheet = Sheet {
            name: "template".to_string(),
            rows: vec![
                Row::new(0, vec![text(0, "Name"), text(1, "Qty")]),
                Row::new(
                    1,
                    vec![
                        text(0, "{{item.name}}").with_comment("{[items|item]}"),
                        text(1, "{{item.qty}}").with_comment(" {[item]} "),
                    ],
                ),
                Row::new(2, vec![text(0, "Total")]),
            ],
        };
        let tokens = GridTokenizer::new(sheet.cursor()).read_all().unwrap();
        assert_eq!(
            tokens,
            vec![
                GridToken::NewRow,
                GridToken::TextCell(text(0, "Name")),
                GridToken::TextCell(text(1, "Qty")),
                GridToken::NewRow,
                GridToken::Loop(GridLoop {
                    collection: "items".to_string(),
                    item: "item".to_string(),
                    body: vec![
                        GridToken::TextCell(text(0, "{{item.name}}")),
                        GridToken::TextCell(text(1, "{{item.qty}}")),
                    ],
                }),
                GridToken::NewRow,
                GridToken::TextCell(text(0, "Total")),
                GridToken::End,
            ]
        );
    }

    #[test]
    fn test_nested_loops_and_kept_comment() {
        let sheet = Sheet {
            name: "template".to_string(),
            rows: vec![Row::new(
                0,
                vec![
                    text(0, "{{row.id}}").with_comment("{[rows|row]}{[row.cells|c]}"),
                    text(1, "{{c}}").with_comment("{[c]}{[]}"),
                    text(2, "x").with_comment("just a note"),
                ],
            )],
        };
        let tokens = GridTokenizer::new(sheet.cursor()).read_all().unwrap();
        assert_eq!(tokens.len(), 4);
        let GridToken::Loop(outer) = &tokens[1] else {
            panic!("Expected a loop, got {:?}", tokens[1]);
        };
        assert_eq!(outer.collection, "rows");
        let GridToken::Loop(inner) = &outer.body[0] else {
            panic!("Expected a nested loop");
        };
        assert_eq!(inner.body.len(), 2);
        assert_eq!(
            tokens[2],
            GridToken::TextCell(text(2, "x").with_comment("just a note"))
        );
    }

    #[test]
    fn test_unbalanced_loops() {
        let unclosed = Sheet {
            name: "s".to_string(),
            rows: vec![Row::new(0, vec![text(0, "a").with_comment("{[xs|x]}")])],
        };
        assert!(matches!(
            GridTokenizer::new(unclosed.cursor()).read_all(),
            Err(Error::ParseError(_))
        ));

        let mismatched = Sheet {
            name: "s".to_string(),
            rows: vec![Row::new(0, vec![text(0, "a").with_comment("{[xs|x]}{[y]}")])],
        };
        assert!(matches!(
            GridTokenizer::new(mismatched.cursor()).read_all(),
            Err(Error::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_template_row_is_blank() {
        let sheet = Sheet {
            name: "s".to_string(),
            rows: vec![Row::new(1, vec![text(0, "a")])],
        };
        let tokens = GridTokenizer::new(sheet.cursor()).read_all().unwrap();
        assert_eq!(
            tokens,
            vec![
                GridToken::NewBlankRow,
                GridToken::NewRow,
                GridToken::TextCell(text(0, "a")),
                GridToken::End
            ]
        );
    }
}
