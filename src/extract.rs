//! Text extraction engine.
//!
//! Walks the template tokens and the filled document side by side. Literal
//! text must match character for character. The value of an expression is
//! whatever the document holds up to the *breaker*, the literal text the
//! template expects right after it. Loops keep matching their body until the
//! document shows the breaker that follows the loop.
//!
//! Memory is bounded by the breaker window, except for a trailing expression
//! or loop with nothing after it, which takes the rest of the document.

use log::{debug, trace};
use serde_json::{Map, Value};

use crate::config::Options;
use crate::error::{Error, Result};
use crate::path::{kind_of, Path};
use crate::stream::Pushback;
use crate::token::{Loop, Token, TokenList, TokenStream};

/// Literal text expected after a value, and what the template holds after it.
struct Breaker {
    text: Vec<char>,
    /// Token read past the breaker text, if any. `None` means the breaker
    /// filled the window and the template continues with the next token.
    next: Option<Token>,
}

impl Breaker {
    fn as_string(&self) -> String {
        self.text.iter().collect()
    }

    fn ends_template(&self) -> bool {
        matches!(self.next, Some(Token::End))
    }
}

pub struct TextExtractor<'o> {
    options: &'o Options,
}

impl<'o> TextExtractor<'o> {
    pub fn new(options: &'o Options) -> Self {
        Self { options }
    }

    /// Extracts data from `document` into `tree`, following `tokens`.
    ///
    /// Document text left over once the template ends is ignored.
    pub fn extract<S, I>(
        &self,
        tokens: &mut S,
        document: &mut Pushback<char, I>,
        tree: &mut Value,
    ) -> Result<()>
    where
        S: TokenStream + ?Sized,
        I: Iterator<Item = Result<char>>,
    {
        root_map(tree)?;

        let mut pending: Option<Token> = None;
        loop {
            let token = match pending.take() {
                Some(token) => token,
                None => tokens.next_token()?,
            };
            trace!("template token {token:?}");

            match token {
                Token::End => return Ok(()),
                Token::Text(text) => self.match_text(&text, document)?,
                Token::Expression(path) => {
                    let breaker = self.breaker(tokens)?;
                    self.extract_expression(&path, &breaker, document, tree)?;
                    pending = breaker.next;
                }
                Token::LoopOpen(tag) => {
                    let breaker = self.breaker(tokens)?;
                    self.extract_loop(&tag, &breaker, document, tree)?;
                    pending = breaker.next;
                }
                Token::LoopClose(item) => {
                    return Err(Error::ParseError(format!(
                        "unexpected closing loop tag '{}'",
                        item.unwrap_or_default()
                    )))
                }
            }
        }
    }

    /// Collects the literal text that follows the current token, up to the
    /// breaker window. Text past the window is handed back as a pending token.
    fn breaker<S>(&self, tokens: &mut S) -> Result<Breaker>
    where
        S: TokenStream + ?Sized,
    {
        let window = self.options.breaker_window;
        let mut text: Vec<char> = Vec::new();

        loop {
            match tokens.next_token()? {
                Token::Text(chunk) => {
                    let room = window - text.len();
                    let mut chars = chunk.chars();
                    text.extend(chars.by_ref().take(room));
                    let rest: String = chars.collect();
                    if !rest.is_empty() {
                        trace!("breaker truncated to {window} characters");
                        return Ok(Breaker {
                            text,
                            next: Some(Token::Text(rest)),
                        });
                    }
                    if text.len() == window {
                        return Ok(Breaker { text, next: None });
                    }
                }
                other => {
                    return Ok(Breaker {
                        text,
                        next: Some(other),
                    })
                }
            }
        }
    }

    fn match_text<I>(&self, text: &str, document: &mut Pushback<char, I>) -> Result<()>
    where
        I: Iterator<Item = Result<char>>,
    {
        for expected in text.chars() {
            match document.next()? {
                Some(c) if c == expected => {}
                Some(c) => {
                    return Err(Error::mismatch(
                        format!("'{expected}'"),
                        format!("'{c}'"),
                        location(document),
                    ))
                }
                None => {
                    return Err(Error::mismatch(
                        format!("'{expected}'"),
                        "the end of the document",
                        location(document),
                    ))
                }
            }
        }
        Ok(())
    }

    fn extract_expression<I>(
        &self,
        path: &str,
        breaker: &Breaker,
        document: &mut Pushback<char, I>,
        tree: &mut Value,
    ) -> Result<()>
    where
        I: Iterator<Item = Result<char>>,
    {
        let raw = if !breaker.text.is_empty() {
            self.read_until_breaker(breaker, document)?
        } else if breaker.ends_template() {
            let mut rest = String::new();
            while let Some(c) = document.next()? {
                rest.push(c);
            }
            rest
        } else {
            return Err(ambiguous(&format!("{{{{{path}}}}}"), breaker));
        };

        trace!("{{{{{path}}}}} = {raw:?}");
        let value = self.options.leaf_value(path, &raw)?;
        Path::parse(path)?.set(tree, value)
    }

    /// Reads the document into a value until the breaker text shows up.
    /// The breaker itself is consumed and dropped.
    fn read_until_breaker<I>(
        &self,
        breaker: &Breaker,
        document: &mut Pushback<char, I>,
    ) -> Result<String>
    where
        I: Iterator<Item = Result<char>>,
    {
        let text = &breaker.text;
        let mut value = String::new();
        let mut matched = 0;

        while matched < text.len() {
            let Some(c) = document.next()? else {
                return Err(Error::mismatch(
                    format!("'{}'", breaker.as_string()),
                    "the end of the document",
                    location(document),
                ));
            };
            if c == text[matched] {
                matched += 1;
                continue;
            }
            if matched == 0 {
                value.push(c);
                continue;
            }
            // Partial match: the first matched char belongs to the value,
            // the rest is scanned again.
            value.push(text[0]);
            let mut replay = text[1..matched].to_vec();
            replay.push(c);
            document.unread(replay);
            matched = 0;
        }

        Ok(value)
    }

    /// Tries the breaker at the current position. Consumes it on success and
    /// leaves the document untouched otherwise.
    fn match_breaker<I>(&self, breaker: &Breaker, document: &mut Pushback<char, I>) -> Result<bool>
    where
        I: Iterator<Item = Result<char>>,
    {
        let mut read = Vec::with_capacity(breaker.text.len());
        for &expected in &breaker.text {
            match document.next()? {
                Some(c) => {
                    read.push(c);
                    if c != expected {
                        document.unread(read);
                        return Ok(false);
                    }
                }
                None => {
                    return Err(Error::mismatch(
                        format!("'{}' after the loop", breaker.as_string()),
                        "the end of the document",
                        location(document),
                    ))
                }
            }
        }
        Ok(true)
    }

    fn extract_loop<I>(
        &self,
        tag: &Loop,
        breaker: &Breaker,
        document: &mut Pushback<char, I>,
        tree: &mut Value,
    ) -> Result<()>
    where
        I: Iterator<Item = Result<char>>,
    {
        if breaker.text.is_empty() && !breaker.ends_template() {
            return Err(ambiguous(&format!("{{[{}|{}]}}", tag.collection, tag.item), breaker));
        }

        let collection = Path::parse(&tag.collection)?;
        init_collection(&collection, tree)?;
        debug!(
            "Extracting loop over '{}' until {:?}",
            tag.collection,
            breaker.as_string()
        );

        let mut index = 0;
        loop {
            if breaker.text.is_empty() {
                if document.is_exhausted()? {
                    break;
                }
            } else if self.match_breaker(breaker, document)? {
                break;
            }

            let start = document.position();
            self.extract_item(tag, &collection, index, document, tree)?;
            if document.position() == start {
                return Err(Error::ParseError(format!(
                    "an iteration of loop '{}' matched no document text",
                    tag.item
                )));
            }
            index += 1;
        }

        debug!("Loop over '{}' matched {index} item(s)", tag.collection);
        Ok(())
    }

    fn extract_item<I>(
        &self,
        tag: &Loop,
        collection: &Path,
        index: usize,
        document: &mut Pushback<char, I>,
        tree: &mut Value,
    ) -> Result<()>
    where
        I: Iterator<Item = Result<char>>,
    {
        with_item(&tag.item, collection, index, tree, |tree| {
            self.extract(&mut TokenList::new(&tag.body), document, tree)
        })
    }
}

/// Runs `body` once with element `index` of the collection bound under
/// `item` at the root of the tree, then stores the bound value back at
/// `index`. A root value shadowed by the binding is restored afterwards.
pub(crate) fn with_item<F>(
    item: &str,
    collection: &Path,
    index: usize,
    tree: &mut Value,
    body: F,
) -> Result<()>
where
    F: FnOnce(&mut Value) -> Result<()>,
{
    let existing = collection
        .get(tree)
        .and_then(|items| items.get(index))
        .filter(|value| !value.is_null())
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    let shadowed = root_map(tree)?.insert(item.to_string(), existing);
    let result = body(tree);
    let root = root_map(tree)?;
    let bound = root.shift_remove(item).unwrap_or(Value::Null);
    if let Some(previous) = shadowed {
        root.insert(item.to_string(), previous);
    }
    result?;

    match collection.get_mut(tree) {
        Some(Value::Array(items)) => {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            items[index] = bound;
            Ok(())
        }
        Some(other) => Err(Error::EvaluationError(format!(
            "looped object '{collection}' should be a list but it is {}",
            kind_of(other)
        ))),
        None => Err(Error::EvaluationError(format!(
            "looped object '{collection}' disappeared while extracting it"
        ))),
    }
}

/// Makes sure the loop collection exists as a list.
pub(crate) fn init_collection(collection: &Path, tree: &mut Value) -> Result<()> {
    match collection.get(tree) {
        None | Some(Value::Null) => collection.set(tree, Value::Array(Vec::new())),
        Some(Value::Array(_)) => Ok(()),
        Some(other) => Err(Error::EvaluationError(format!(
            "looped object '{collection}' should be a list but it is {}",
            kind_of(other)
        ))),
    }
}

/// The root of the data tree, which is always a map.
pub(crate) fn root_map(tree: &mut Value) -> Result<&mut Map<String, Value>> {
    if tree.is_null() {
        *tree = Value::Object(Map::new());
    }
    match tree {
        Value::Object(map) => Ok(map),
        other => Err(Error::InstantiationError(format!(
            "the data tree must be a map, not {}",
            kind_of(other)
        ))),
    }
}

fn location<I>(document: &Pushback<char, I>) -> String
where
    I: Iterator<Item = Result<char>>,
{
    format!("document character {}", document.position())
}

fn ambiguous(tag: &str, breaker: &Breaker) -> Error {
    let next = match &breaker.next {
        Some(Token::Expression(path)) => format!("{{{{{path}}}}}"),
        Some(Token::LoopOpen(tag)) => format!("{{[{}|{}]}}", tag.collection, tag.item),
        other => format!("{other:?}"),
    };
    Error::ParseError(format!(
        "{tag} is followed by {next} with no text in-between, the end of the value cannot be found"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::chars_of;
    use crate::tokenizer::tokenize_str;
    use serde_json::json;

    fn extract_with(options: &Options, template: &str, document: &str) -> Result<Value> {
        let mut tree = json!({});
        TextExtractor::new(options).extract(
            &mut tokenize_str(template),
            &mut chars_of(document),
            &mut tree,
        )?;
        Ok(tree)
    }

    #[test]
    fn test_partial_breaker_is_flushed_into_value() {
        let tree = extract_with(&Options::default(), "<{{v}}-->", "<a--b-->").unwrap();
        assert_eq!(tree, json!({"v": "a--b"}));

        let tree = extract_with(&Options::default(), "[{{v}}aab]", "[aaab]").unwrap();
        assert_eq!(tree, json!({"v": "a"}));
    }

    #[test]
    fn test_breaker_window_truncates() {
        let options = Options {
            breaker_window: 2,
            ..Options::default()
        };
        let tree = extract_with(&options, "{{a}}, then {{b}}.", "x, then y.").unwrap();
        assert_eq!(tree, json!({"a": "x", "b": "y"}));
    }

    #[test]
    fn test_item_binding_is_restored() {
        let mut tree = json!({"color": "keep me"});
        TextExtractor::new(&Options::default())
            .extract(
                &mut tokenize_str("{[colors|color]}{{color}};{[]}!"),
                &mut chars_of("red;blue;!"),
                &mut tree,
            )
            .unwrap();
        assert_eq!(tree, json!({"color": "keep me", "colors": ["red", "blue"]}));
    }

    #[test]
    fn test_empty_loop_body_does_not_spin() {
        let result = extract_with(&Options::default(), "{[xs|x]}{[]}.", "abc.");
        assert!(matches!(result, Err(Error::ParseError(_))));
    }
}
