//! Text rendering: fills a template with values from a data tree.
//!
//! Loop items are bound through a [`Scope`] chain living on the stack, so the
//! data tree is never copied while rendering.

use std::io::Write;

use log::{debug, trace};
use serde_json::Value;

use crate::config::Options;
use crate::error::{Error, Result};
use crate::path::{kind_of, Path};
use crate::token::{Loop, Token, TokenStream};
use crate::tokenizer::tokenize_str;

/// Names bound by the enclosing loops, innermost first, on top of the root.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'s, 'a> {
    root: &'a Value,
    binding: Option<(&'s str, &'a Value)>,
    parent: Option<&'s Scope<'s, 'a>>,
}

impl<'s, 'a> Scope<'s, 'a> {
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            binding: None,
            parent: None,
        }
    }

    /// A child scope where `name` resolves to `value`.
    pub fn bind(&'s self, name: &'s str, value: &'a Value) -> Scope<'s, 'a> {
        Scope {
            root: self.root,
            binding: Some((name, value)),
            parent: Some(self),
        }
    }

    /// Resolves `path`, looking at loop items before the root.
    pub fn lookup(&self, path: &Path) -> Option<&'a Value> {
        if let Some(head) = path.head_name() {
            let mut scope = Some(self);
            while let Some(current) = scope {
                if let Some((name, value)) = current.binding {
                    if name == head {
                        return path.tail().get_from(value);
                    }
                }
                scope = current.parent;
            }
        }
        path.get(self.root)
    }

    /// Resolves the collection of a loop. Missing and null collections are
    /// empty; anything other than a list is an error.
    pub fn collection(&self, collection: &str) -> Result<&'a [Value]> {
        let path = Path::parse(collection)?;
        match self.lookup(&path) {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(Error::EvaluationError(format!(
                "looped object '{collection}' should be a list but it is {}",
                kind_of(other)
            ))),
        }
    }
}

/// Text form of a value. Missing and null values render as nothing,
/// containers as compact JSON.
pub fn display_value(value: Option<&Value>) -> Result<String> {
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(container) => serde_json::to_string(container)?,
    })
}

pub struct TextRenderer<'o> {
    options: &'o Options,
}

impl<'o> TextRenderer<'o> {
    pub fn new(options: &'o Options) -> Self {
        Self { options }
    }

    /// Renders every token of `tokens` into `out`.
    pub fn render<S, W>(&self, tokens: &mut S, scope: &Scope<'_, '_>, out: &mut W) -> Result<()>
    where
        S: TokenStream + ?Sized,
        W: Write,
    {
        loop {
            match tokens.next_token()? {
                Token::End => return Ok(()),
                token => self.render_token(&token, scope, out)?,
            }
        }
    }

    /// Renders a template held in memory.
    pub fn render_str(&self, template: &str, scope: &Scope<'_, '_>) -> Result<String> {
        let mut out = Vec::new();
        let mut tokens = tokenize_str(template).with_max_text_len(self.options.max_text_token_len);
        self.render(&mut tokens, scope, &mut out)?;
        String::from_utf8(out)
            .map_err(|e| Error::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    fn render_token<W: Write>(&self, token: &Token, scope: &Scope<'_, '_>, out: &mut W) -> Result<()> {
        match token {
            Token::Text(text) => out.write_all(text.as_bytes())?,
            Token::Expression(expression) => {
                let path = Path::parse(expression)?;
                let value = display_value(scope.lookup(&path))?;
                trace!("{{{{{expression}}}}} -> {value:?}");
                out.write_all(value.as_bytes())?;
            }
            Token::LoopOpen(tag) => self.render_loop(tag, scope, out)?,
            Token::LoopClose(item) => {
                return Err(Error::ParseError(format!(
                    "unexpected closing loop tag '{}'",
                    item.as_deref().unwrap_or_default()
                )))
            }
            Token::End => {}
        }
        Ok(())
    }

    fn render_loop<W: Write>(&self, tag: &Loop, scope: &Scope<'_, '_>, out: &mut W) -> Result<()> {
        let items = scope.collection(&tag.collection)?;
        debug!("Rendering {} item(s) of '{}'", items.len(), tag.collection);
        for item in items {
            let inner = scope.bind(&tag.item, item);
            for token in &tag.body {
                self.render_token(token, &inner, out)?;
            }
        }
        Ok(())
    }
}
