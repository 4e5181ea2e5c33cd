//! Path resolution over the data tree.
//!
//! A path such as `customers[2].address['postal code']` is parsed into
//! [`Segment`]s and resolved left to right. Reads never fail, they return
//! `None`. Writes create whatever intermediate containers are missing: a list
//! when the following segment is an index, a map otherwise.

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// `name` or `.name`
    Property(String),
    /// `[3]`
    Index(usize),
    /// `['key']` or `["key"]`
    MapKey(String),
}

impl Segment {
    fn is_index(&self) -> bool {
        matches!(self, Segment::Index(_))
    }

    /// An empty container of the kind this segment reads from.
    fn container(&self) -> Value {
        if self.is_index() {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Property(name) => write!(f, ".{name}"),
            Segment::Index(index) => write!(f, "[{index}]"),
            Segment::MapKey(key) => write!(f, "['{key}']"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    segments: Vec<Segment>,
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Removes quotes and spaces around an element name.
fn clean_name(name: &str) -> &str {
    name.trim_matches(|c| c == '\'' || c == '"' || c == ' ')
}

impl Path {
    pub fn parse(expression: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = expression;

        loop {
            rest = rest.trim_start_matches([' ', '.']);
            if rest.trim().is_empty() {
                break;
            }

            if let Some(bracketed) = rest.strip_prefix('[') {
                let close = bracketed.find(']').ok_or_else(|| {
                    Error::ParseError(format!("missing ']' in path '{expression}'"))
                })?;
                let element = &bracketed[..close];
                let segment = match element.trim().parse::<usize>() {
                    Ok(index) => Segment::Index(index),
                    Err(_) => Segment::MapKey(clean_name(element).to_string()),
                };
                segments.push(segment);
                rest = &bracketed[close + 1..];
            } else {
                let end = rest.find(['.', '[']).unwrap_or(rest.len());
                let name = clean_name(&rest[..end]);
                if name.is_empty() {
                    return Err(Error::ParseError(format!(
                        "empty identifier in path '{expression}'"
                    )));
                }
                segments.push(Segment::Property(name.to_string()));
                rest = &rest[end..];
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Name of the first segment when it addresses a map entry.
    pub fn head_name(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Property(name)) | Some(Segment::MapKey(name)) => Some(name),
            _ => None,
        }
    }

    /// The path without its first segment.
    pub fn tail(&self) -> Path {
        Path {
            segments: self.segments.iter().skip(1).cloned().collect(),
        }
    }

    /// Resolves the path against `tree`. An empty path resolves to nothing.
    pub fn get<'v>(&self, tree: &'v Value) -> Option<&'v Value> {
        if self.is_empty() {
            return None;
        }
        self.get_from(tree)
    }

    /// Like [`Path::get`], but an empty path resolves to `tree` itself.
    pub fn get_from<'v>(&self, tree: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(tree, |node, segment| match (segment, node) {
                (Segment::Index(index), Value::Array(items)) => items.get(*index),
                (Segment::Property(name) | Segment::MapKey(name), Value::Object(map)) => {
                    map.get(name)
                }
                _ => None,
            })
    }

    pub fn get_mut<'v>(&self, tree: &'v mut Value) -> Option<&'v mut Value> {
        if self.is_empty() {
            return None;
        }
        self.segments
            .iter()
            .try_fold(tree, |node, segment| match (segment, node) {
                (Segment::Index(index), Value::Array(items)) => items.get_mut(*index),
                (Segment::Property(name) | Segment::MapKey(name), Value::Object(map)) => {
                    map.get_mut(name)
                }
                _ => None,
            })
    }

    /// Writes `value` at this path, creating missing intermediate containers.
    /// An empty path writes nothing.
    pub fn set(&self, tree: &mut Value, value: Value) -> Result<()> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Ok(());
        };

        if tree.is_null() {
            *tree = self.segments[0].container();
        }

        let mut node = tree;
        for (i, segment) in parents.iter().enumerate() {
            let next = parents.get(i + 1).unwrap_or(last);
            node = self.child_or_insert(node, segment, next)?;
        }

        match (last, node) {
            (Segment::Index(index), Value::Array(items)) => {
                if items.len() <= *index {
                    items.resize(index + 1, Value::Null);
                }
                items[*index] = value;
                Ok(())
            }
            (Segment::Property(name) | Segment::MapKey(name), Value::Object(map)) => {
                map.insert(name.clone(), value);
                Ok(())
            }
            (segment, node) => Err(self.wrong_kind(segment, node)),
        }
    }

    fn child_or_insert<'v>(
        &self,
        node: &'v mut Value,
        segment: &Segment,
        next: &Segment,
    ) -> Result<&'v mut Value> {
        let slot = match (segment, node) {
            (Segment::Index(index), Value::Array(items)) => {
                if items.len() <= *index {
                    items.resize(index + 1, Value::Null);
                }
                &mut items[*index]
            }
            (Segment::Property(name) | Segment::MapKey(name), Value::Object(map)) => {
                map.entry(name.clone()).or_insert(Value::Null)
            }
            (segment, node) => return Err(self.wrong_kind(segment, node)),
        };
        if slot.is_null() {
            *slot = next.container();
        }
        Ok(slot)
    }

    fn wrong_kind(&self, segment: &Segment, node: &Value) -> Error {
        Error::EvaluationError(format!(
            "cannot apply '{segment}' of path '{self}' to {}",
            kind_of(node)
        ))
    }
}

/// Human readable kind of a value, for error messages.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

/// Type forced onto a value extracted from a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafType {
    /// Boolean, then integer, then float, then string.
    #[default]
    Auto,
    String,
    Number,
    Boolean,
}

/// Turns raw extracted text into a typed value.
///
/// `true`/`false` become booleans, then integers are tried, then floats.
/// Anything else stays a string. The order matters: `"007"` becomes `7`.
pub fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(integer) = raw.parse::<i64>() {
        return Value::from(integer);
    }
    if let Ok(float) = raw.parse::<f64>() {
        if let Some(number) = Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    Value::String(raw.to_string())
}

/// Converts raw extracted text according to `leaf_type`.
pub fn coerce_as(raw: &str, leaf_type: LeafType) -> Result<Value> {
    match leaf_type {
        LeafType::Auto => Ok(coerce(raw)),
        LeafType::String => Ok(Value::String(raw.to_string())),
        LeafType::Boolean => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(Error::EvaluationError(format!("'{raw}' is not a boolean"))),
        },
        LeafType::Number => match coerce(raw) {
            number @ Value::Number(_) => Ok(number),
            _ => Err(Error::EvaluationError(format!("'{raw}' is not a number"))),
        },
    }
}
