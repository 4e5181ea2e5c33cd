//! Text template tokenizer.
//!
//! Turns template characters into [`Token`]s. Expressions are `{{ path }}`,
//! loops are `{[ collection | item ]}` ... `{[ item ]}` (or `{[ ]}`), and a
//! backslash right before `{{` or `{[` makes the pair literal.
//!
//! Loops are parsed by recursive descent over the same character cursor, so a
//! returned [`Token::LoopOpen`] already owns its whole body.

use log::trace;

use crate::constants::DEFAULT_MAX_TEXT_TOKEN_LEN;
use crate::error::{Error, Result};
use crate::stream::{chars_of, CharReader, Pushback};
use crate::token::{Loop, LoopTag, Token, TokenStream};

pub struct Tokenizer<I> {
    chars: Pushback<char, I>,
    max_text_len: usize,
    finished: bool,
}

impl<I> Tokenizer<I>
where
    I: Iterator<Item = Result<char>>,
{
    pub fn new(chars: Pushback<char, I>) -> Self {
        Self {
            chars,
            max_text_len: DEFAULT_MAX_TEXT_TOKEN_LEN,
            finished: false,
        }
    }

    /// Text runs longer than `max_text_len` characters are split into
    /// several `Text` tokens.
    pub fn with_max_text_len(mut self, max_text_len: usize) -> Self {
        self.max_text_len = max_text_len.max(1);
        self
    }

    /// Reads every remaining token, `End` included.
    ///
    /// Only meant for templates known to be small.
    pub fn read_all(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let end = token == Token::End;
            tokens.push(token);
            if end {
                return Ok(tokens);
            }
        }
    }

    /// Reads one token at the current nesting level. Closing loop tags are
    /// returned as is; the caller decides whether they are expected.
    fn read_token(&mut self) -> Result<Token> {
        let mut text = String::new();
        let mut length = 0;
        let mut escaped = false;

        loop {
            if !escaped && length >= self.max_text_len {
                return Ok(Token::Text(text));
            }

            let c = match self.chars.next()? {
                Some(c) => c,
                None => break,
            };

            if escaped && c != '{' {
                escaped = false;
                text.push('\\');
                length += 1;
            }

            if c == '\\' {
                escaped = true;
                continue;
            }

            if c != '{' {
                text.push(c);
                length += 1;
                continue;
            }

            match self.chars.next()? {
                None => {
                    if escaped {
                        text.push('\\');
                        escaped = false;
                    }
                    text.push('{');
                    break;
                }
                Some(opener @ ('{' | '[')) => {
                    if escaped {
                        text.push('{');
                        text.push(opener);
                        length += 2;
                        escaped = false;
                        continue;
                    }
                    if text.is_empty() {
                        return self.read_tag(opener);
                    }
                    self.chars.unread(['{', opener]);
                    return Ok(Token::Text(text));
                }
                Some(other) => {
                    if escaped {
                        text.push('\\');
                        length += 1;
                        escaped = false;
                    }
                    text.push('{');
                    length += 1;
                    if other == '\\' {
                        escaped = true;
                    } else {
                        text.push(other);
                        length += 1;
                    }
                }
            }
        }

        if escaped {
            text.push('\\');
        }

        if text.is_empty() {
            Ok(Token::End)
        } else {
            Ok(Token::Text(text))
        }
    }

    fn read_tag(&mut self, opener: char) -> Result<Token> {
        if opener == '{' {
            self.read_expression()
        } else {
            self.read_loop()
        }
    }

    /// Reads up to the closing `}}`. An expression cut short by the end of
    /// the template is returned as its raw text.
    fn read_expression(&mut self) -> Result<Token> {
        let mut content = String::new();
        while let Some(c) = self.chars.next()? {
            if c != '}' {
                content.push(c);
                continue;
            }
            match self.chars.next()? {
                Some('}') => {
                    trace!("expression {{{{{}}}}}", content.trim());
                    return Ok(Token::Expression(content.trim().to_string()));
                }
                Some(_) => {
                    return Err(Error::ParseError(format!(
                        "found a single '}}' within expression '{{{{{content}'"
                    )))
                }
                None => {
                    content.push(c);
                    break;
                }
            }
        }
        Ok(Token::Text(format!("{{{{{content}")))
    }

    /// Reads a loop tag; an opening tag also consumes the loop body up to
    /// its matching close.
    fn read_loop(&mut self) -> Result<Token> {
        let content = self.read_loop_tag()?;
        match LoopTag::parse(&content)? {
            LoopTag::Close(item) => Ok(Token::LoopClose(item)),
            LoopTag::Open { collection, item } => {
                trace!("loop over '{collection}' as '{item}'");
                let mut body = Vec::new();
                loop {
                    match self.read_token()? {
                        Token::End => {
                            return Err(Error::ParseError(format!(
                                "template ended inside loop '{item}', every loop tag must be closed"
                            )))
                        }
                        Token::LoopClose(None) => break,
                        Token::LoopClose(Some(name)) if name == item => break,
                        Token::LoopClose(Some(name)) => {
                            return Err(Error::ParseError(format!(
                                "closing loop tag '{name}' does not match the opened loop '{item}'"
                            )))
                        }
                        token => body.push(token),
                    }
                }
                Ok(Token::LoopOpen(Loop {
                    collection,
                    item,
                    body,
                }))
            }
        }
    }

    fn read_loop_tag(&mut self) -> Result<String> {
        let mut content = String::new();
        while let Some(c) = self.chars.next()? {
            if c != ']' {
                content.push(c);
                continue;
            }
            return match self.chars.next()? {
                Some('}') => Ok(content),
                Some(_) => Err(Error::ParseError(format!(
                    "found a single ']' within loop tag '{{[{content}'"
                ))),
                None => Err(Error::ParseError(format!(
                    "template ended in the middle of loop tag '{{[{content}]'"
                ))),
            };
        }
        Err(Error::ParseError(format!(
            "template ended right after opening loop tag '{{[{content}'"
        )))
    }
}

impl<I> TokenStream for Tokenizer<I>
where
    I: Iterator<Item = Result<char>>,
{
    fn next_token(&mut self) -> Result<Token> {
        if self.finished {
            return Err(Error::UsageError(
                "tokenizer already returned its End token".to_string(),
            ));
        }
        match self.read_token()? {
            Token::End => {
                self.finished = true;
                Ok(Token::End)
            }
            Token::LoopClose(item) => Err(Error::ParseError(format!(
                "closing loop tag '{}' without any opened loop",
                item.unwrap_or_default()
            ))),
            token => Ok(token),
        }
    }
}

/// Tokenizer over an in-memory template.
pub fn tokenize_str(template: &str) -> Tokenizer<impl Iterator<Item = Result<char>> + '_> {
    Tokenizer::new(chars_of(template))
}

/// Tokenizer over a template read from `reader`.
pub fn tokenize_reader<R: std::io::BufRead>(reader: R) -> Tokenizer<CharReader<R>> {
    Tokenizer::new(Pushback::new(CharReader::new(reader)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(template: &str) -> Vec<Token> {
        tokenize_str(template).read_all().unwrap()
    }

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    #[test]
    fn test_text_and_expressions() {
        assert_eq!(
            tokens("Hello {{ foo.bar }}!"),
            vec![
                text("Hello "),
                Token::Expression("foo.bar".to_string()),
                text("!"),
                Token::End
            ]
        );
        assert_eq!(
            tokens("{{foo}} Hello"),
            vec![Token::Expression("foo".to_string()), text(" Hello"), Token::End]
        );
        assert_eq!(tokens(""), vec![Token::End]);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(tokens("Hello\\{{World"), vec![text("Hello{{World"), Token::End]);
        assert_eq!(tokens("Hello\\{[World"), vec![text("Hello{[World"), Token::End]);
        assert_eq!(tokens("Hello\\"), vec![text("Hello\\"), Token::End]);
        assert_eq!(tokens("Hello\\{"), vec![text("Hello\\{"), Token::End]);
        assert_eq!(tokens("Hello\\\\"), vec![text("Hello\\\\"), Token::End]);
        assert_eq!(
            tokens("Hello\\\\{{World"),
            vec![text("Hello\\{{World"), Token::End]
        );
        assert_eq!(
            tokens("Hello\\{\\{World"),
            vec![text("Hello\\{\\{World"), Token::End]
        );
        assert_eq!(
            tokens("Hello\\{\\{{World"),
            vec![text("Hello\\{{{World"), Token::End]
        );
    }

    #[test]
    fn test_unterminated_expression_is_text() {
        assert_eq!(tokens("Hi {{name"), vec![text("Hi "), text("{{name"), Token::End]);
        assert_eq!(tokens("Hi {{name}"), vec![text("Hi "), text("{{name}"), Token::End]);
    }

    #[test]
    fn test_single_brace_in_expression() {
        assert!(matches!(
            tokenize_str("{{a}b}}").read_all(),
            Err(Error::ParseError(_))
        ));
    }

    #[test]
    fn test_loops() {
        let all = tokens(
            "Hello {{normal.tag}} Here's the list: {[todo.list|item]} name: {{item.name}} / Value: {{item.value}}. {[item]}. How good is it?",
        );
        assert_eq!(all.len(), 6);
        match &all[3] {
            Token::LoopOpen(l) => {
                assert_eq!(l.collection, "todo.list");
                assert_eq!(l.item, "item");
                assert_eq!(l.body.len(), 5);
            }
            other => panic!("Expected a loop, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_loops() {
        let all = tokens(concat!(
            "List: ",
            "{[todo.list|item]} name: {{item.name}} / Colors: ",
            "{[item.colors|color]}color:{{color}} Letters:",
            "{[color.letters|letter]}letter|",
            "{[letter]}",
            "{[]}",
            "{[item]}. How good is it?"
        ));
        assert_eq!(all.len(), 4);
        let Token::LoopOpen(outer) = &all[1] else {
            panic!("Expected a loop");
        };
        assert_eq!(outer.body.len(), 4);
        assert!(matches!(outer.body[3], Token::LoopOpen(_)));
    }

    #[test]
    fn test_loop_syntax_errors() {
        for template in [
            "unclosed loop tag: {[",
            "{[apples|apple]} {{apple}} {[orange]}",
            "{[apples|apple]} {{apple}} pie is not finished",
            "stray close {[]}",
            "{[a]b]}",
        ] {
            assert!(
                matches!(tokenize_str(template).read_all(), Err(Error::ParseError(_))),
                "{template} should not parse"
            );
        }
    }

    #[test]
    fn test_text_is_chunked() {
        let all = tokenize_str("abcdefgh{{x}}").with_max_text_len(3).read_all().unwrap();
        assert_eq!(
            all,
            vec![
                text("abc"),
                text("def"),
                text("gh"),
                Token::Expression("x".to_string()),
                Token::End
            ]
        );
    }

    #[test]
    fn test_no_read_after_end() {
        let mut tokenizer = tokenize_str("a");
        assert_eq!(tokenizer.next_token().unwrap(), text("a"));
        assert_eq!(tokenizer.next_token().unwrap(), Token::End);
        assert!(matches!(tokenizer.next_token(), Err(Error::UsageError(_))));
    }
}
