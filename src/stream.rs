//! Forward-only streams with pushback.
//!
//! Both extraction engines read their document one unit at a time (characters
//! for text, grid tokens for sheets) and sometimes need to give back what they
//! read: a breaker that only half matched, or a loop iteration that turned out
//! not to match. [`Pushback`] is the single adapter used for both.

use std::collections::VecDeque;
use std::io::BufRead;

use crate::error::Result;

/// Pushback adapter over a fallible iterator.
///
/// Items pushed back are returned before anything else is pulled from the
/// underlying iterator. The end of the stream is `Ok(None)`.
pub struct Pushback<T, I> {
    inner: I,
    pending: VecDeque<T>,
    position: usize,
    exhausted: bool,
}

impl<T, I> Pushback<T, I>
where
    I: Iterator<Item = Result<T>>,
{
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            position: 0,
            exhausted: false,
        }
    }

    /// Returns the next item, or `None` once both the pushback buffer and the
    /// underlying iterator are empty.
    pub fn next(&mut self) -> Result<Option<T>> {
        if let Some(item) = self.pending.pop_front() {
            self.position += 1;
            return Ok(Some(item));
        }
        if self.exhausted {
            return Ok(None);
        }
        match self.inner.next() {
            Some(item) => {
                let item = item?;
                self.position += 1;
                Ok(Some(item))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    /// Looks at the next item without consuming it.
    pub fn peek(&mut self) -> Result<Option<&T>> {
        if self.pending.is_empty() {
            match self.next()? {
                Some(item) => self.push_front(item),
                None => return Ok(None),
            }
        }
        Ok(self.pending.front())
    }

    /// Puts a single item back; it is the next one returned.
    pub fn push_front(&mut self, item: T) {
        self.position = self.position.saturating_sub(1);
        self.pending.push_front(item);
    }

    /// Puts items back so that they are returned again in their original
    /// order, ahead of anything pushed back earlier.
    pub fn unread<C>(&mut self, items: C)
    where
        C: IntoIterator<Item = T>,
        C::IntoIter: DoubleEndedIterator,
    {
        for item in items.into_iter().rev() {
            self.push_front(item);
        }
    }

    /// True once no item is left, pushed back or not.
    pub fn is_exhausted(&mut self) -> Result<bool> {
        Ok(self.peek()?.is_none())
    }

    /// Number of items consumed so far, net of pushbacks.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// An already buffered sequence of items, such as a grid loop candidate.
pub type Buffered<T> = Pushback<T, std::iter::Empty<Result<T>>>;

impl<T> Buffered<T> {
    pub fn from_vec(items: Vec<T>) -> Self {
        let mut stream = Self::new(std::iter::empty());
        stream.pending = items.into();
        stream
    }

    /// Gives back whatever has not been consumed yet.
    pub fn into_remaining(self) -> Vec<T> {
        self.pending.into()
    }
}

/// A character stream over an in-memory string.
pub fn chars_of(text: &str) -> Pushback<char, impl Iterator<Item = Result<char>> + '_> {
    Pushback::new(text.chars().map(Ok))
}

/// Lazily decodes characters from a buffered reader, one line at a time.
pub struct CharReader<R> {
    reader: R,
    line: Vec<char>,
    cursor: usize,
    done: bool,
}

impl<R: BufRead> CharReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            cursor: 0,
            done: false,
        }
    }

    fn fill(&mut self) -> Result<bool> {
        let mut buffer = String::new();
        let read = self.reader.read_line(&mut buffer)?;
        if read == 0 {
            self.done = true;
            return Ok(false);
        }
        self.line = buffer.chars().collect();
        self.cursor = 0;
        Ok(true)
    }
}

impl<R: BufRead> Iterator for CharReader<R> {
    type Item = Result<char>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done && self.cursor >= self.line.len() {
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
        if self.done {
            return None;
        }
        let c = self.line[self.cursor];
        self.cursor += 1;
        Some(Ok(c))
    }
}
