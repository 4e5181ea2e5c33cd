//! Template tokens and token streams.

use crate::error::{Error, Result};

/// A loop opened by `{[ collection | item ]}` together with its body.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    /// Path of the collection iterated over.
    pub collection: String,
    /// Name the current element is bound to inside the body.
    pub item: String,
    /// Fully parsed body, nested loops included. Never ends with `End`.
    pub body: Vec<Token>,
}

/// One token of a text template.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Literal text, never empty.
    Text(String),
    /// `{{ path }}`, trimmed.
    Expression(String),
    /// `{[ collection | item ]}` ... `{[ ]}`
    LoopOpen(Loop),
    /// `{[ item ]}` or `{[ ]}`. Only seen while a loop body is being parsed.
    LoopClose(Option<String>),
    End,
}

/// What a loop tag says once its delimiters are removed.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopTag {
    Open { collection: String, item: String },
    Close(Option<String>),
}

impl LoopTag {
    /// Parses the content found between `{[` and `]}`.
    ///
    /// Empty segments around `|` are dropped, so `{[ |item]}` closes `item`.
    pub fn parse(content: &str) -> Result<Self> {
        let parts: Vec<&str> = content
            .trim()
            .split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        match parts.as_slice() {
            [] => Ok(LoopTag::Close(None)),
            [item] => Ok(LoopTag::Close(Some(item.to_string()))),
            [collection, item] => Ok(LoopTag::Open {
                collection: collection.to_string(),
                item: item.to_string(),
            }),
            _ => Err(Error::ParseError(format!(
                "too many '|' in loop tag '{content}', use one to separate the collection path from the item name"
            ))),
        }
    }
}

/// A forward-only source of template tokens ending with exactly one `End`.
pub trait TokenStream {
    /// Returns the next token. Calling it again after `End` is a usage error.
    fn next_token(&mut self) -> Result<Token>;
}

/// Streams the body of a loop.
pub struct TokenList<'a> {
    tokens: std::slice::Iter<'a, Token>,
    ended: bool,
}

impl<'a> TokenList<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens: tokens.iter(),
            ended: false,
        }
    }
}

impl TokenStream for TokenList<'_> {
    fn next_token(&mut self) -> Result<Token> {
        if self.ended {
            return Err(Error::UsageError(
                "loop body already returned its End token".to_string(),
            ));
        }
        match self.tokens.next() {
            Some(token) => Ok(token.clone()),
            None => {
                self.ended = true;
                Ok(Token::End)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_tag_parse() {
        assert_eq!(LoopTag::parse("").unwrap(), LoopTag::Close(None));
        assert_eq!(LoopTag::parse("   ").unwrap(), LoopTag::Close(None));
        assert_eq!(
            LoopTag::parse(" item ").unwrap(),
            LoopTag::Close(Some("item".to_string()))
        );
        assert_eq!(
            LoopTag::parse("todo.list | item").unwrap(),
            LoopTag::Open {
                collection: "todo.list".to_string(),
                item: "item".to_string()
            }
        );
        assert!(matches!(
            LoopTag::parse("a|b|c"),
            Err(Error::ParseError(_))
        ));
    }

    #[test]
    fn test_token_list_ends_once() {
        let body = vec![Token::Text("a".to_string())];
        let mut list = TokenList::new(&body);
        assert_eq!(list.next_token().unwrap(), Token::Text("a".to_string()));
        assert_eq!(list.next_token().unwrap(), Token::End);
        assert!(matches!(list.next_token(), Err(Error::UsageError(_))));
    }
}
