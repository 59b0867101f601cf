//! Verbatim extraction of matched spans from the raw file text.
//!
//! The extractor reads the file a second time through its own line cursor,
//! independent of the scanner. The cursor only ever moves forward and is
//! shared by every match in a file, so a file is read once no matter how
//! many fragments it yields.
//!
//! Lines are kept as raw bytes, so columns index them exactly as the
//! scanner counted them. Only the finished fragment is decoded: UTF-8 when
//! it is valid, otherwise Latin-1, which maps every byte to a character.

use std::io::{self, BufRead};

use crate::types::{Fragment, MatchSpan};

/// Lazy, forward-only, 1-based cursor over the lines of a reader.
///
/// The current line stays buffered, so several matches that start or end on
/// the same line are all cut from one read. Lines are split on `\n` only; a
/// `\r` before it is kept as line content.
pub struct LineCursor<R> {
    reader: R,
    line_number: usize,
    current: Vec<u8>,
    exhausted: bool,
}

impl<R: BufRead> LineCursor<R> {
    /// Wrap a reader; nothing is read until the first advance.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            current: Vec::new(),
            exhausted: false,
        }
    }

    /// Number of the buffered line; 0 before the first read.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// The buffered line without its `\n`.
    #[must_use]
    pub fn current(&self) -> &[u8] {
        &self.current
    }

    /// Read the next line; returns false at end of input.
    pub fn advance(&mut self) -> io::Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        self.current.clear();
        if self.reader.read_until(b'\n', &mut self.current)? == 0 {
            self.exhausted = true;
            return Ok(false);
        }
        if self.current.last() == Some(&b'\n') {
            self.current.pop();
        }
        self.line_number += 1;
        Ok(true)
    }

    /// Discard lines until `line` is buffered. Never moves backwards.
    pub fn seek(&mut self, line: usize) -> io::Result<bool> {
        while self.line_number < line {
            if !self.advance()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Cuts the exact source text of each match out of the raw file.
pub struct VerbatimExtractor<R> {
    cursor: LineCursor<R>,
}

impl<R: BufRead> VerbatimExtractor<R> {
    /// Extractor reading from its own stream over the file.
    pub fn new(reader: R) -> Self {
        Self {
            cursor: LineCursor::new(reader),
        }
    }

    #[must_use]
    pub fn cursor(&self) -> &LineCursor<R> {
        &self.cursor
    }

    /// Extract the text between `span.start` (exclusive of everything
    /// before its column) and `span.end` (up to, not past, its column).
    ///
    /// Spans must arrive in source order.
    pub fn extract(&mut self, span: MatchSpan) -> io::Result<Fragment> {
        let mut text = Vec::new();

        if !self.cursor.seek(span.start.line)? {
            return Ok(decode(text));
        }

        // The cursor already moved past the start line: its column no
        // longer refers to the buffered line.
        let mut start_column = if self.cursor.line_number() > span.start.line {
            0
        } else {
            span.start.column
        };
        let mut lines_remaining = span.end.line.saturating_sub(self.cursor.line_number());

        loop {
            let line = self.cursor.current();
            if lines_remaining == 0 {
                match line.get(start_column..span.end.column) {
                    Some(piece) => text.extend_from_slice(piece),
                    None => {
                        // Column past the end of the line: keep the whole line.
                        text.extend_from_slice(line.get(start_column..).unwrap_or_default());
                        text.push(b'\n');
                    }
                }
                break;
            }

            if start_column > 0 {
                let rest = line.get(start_column..).unwrap_or_default();
                if rest.iter().any(|&b| b != b'\r') {
                    text.extend_from_slice(rest);
                    text.push(b'\n');
                }
                start_column = 0;
            } else {
                text.extend_from_slice(line);
                text.push(b'\n');
            }

            lines_remaining -= 1;
            if !self.cursor.advance()? {
                break;
            }
        }

        Ok(decode(text))
    }
}

fn decode(bytes: Vec<u8>) -> Fragment {
    match String::from_utf8(bytes) {
        Ok(text) => Fragment::new(text),
        Err(e) => Fragment::new(e.into_bytes().into_iter().map(char::from).collect::<String>()),
    }
}
