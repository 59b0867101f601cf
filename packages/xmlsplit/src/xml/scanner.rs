//! Forward-only tag scanner over a buffered byte stream.
//!
//! The scanner never holds more than the reader's buffer plus the name of
//! each open element, so it works on files larger than memory. It tracks the
//! line and column of the next unread byte; the column is a byte offset so it
//! lines up with slicing the raw line text.

use std::io::{self, BufRead};

use memchr::{memchr, memchr_iter, memrchr};
use thiserror::Error;

use crate::types::{Position, TagEvent};

/// Markup the scanner cannot get past.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {position}")]
pub struct MarkupError {
    pub position: Position,
    pub message: String,
}

impl MarkupError {
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Errors produced while scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Markup(#[from] MarkupError),
}

/// One step of the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Tag(TagEvent),
    EndDocument,
}

/// Pull scanner yielding start and end tags.
///
/// Comments, CDATA sections, processing instructions, the XML declaration
/// and DOCTYPE declarations are skipped, so tags inside them never surface.
/// A self-closing element yields a start event followed by an end event at
/// the same position.
pub struct TagScanner<R> {
    reader: R,
    position: Position,
    open: Vec<String>,
    root_closed: bool,
    queued: Option<TagEvent>,
    finished: bool,
}

impl<R: BufRead> TagScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: Position::START,
            open: Vec::new(),
            root_closed: false,
            queued: None,
            finished: false,
        }
    }

    /// Position of the next unread byte.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Advance to the next tag, or report the end of the document.
    ///
    /// Once `EndDocument` has been returned, every further call returns it
    /// again.
    pub fn next_event(&mut self) -> Result<ScanEvent, ScanError> {
        if let Some(event) = self.queued.take() {
            return Ok(ScanEvent::Tag(event));
        }
        if self.finished {
            return Ok(ScanEvent::EndDocument);
        }

        loop {
            if !self.skip_past_byte(b'<')? {
                return self.finish();
            }
            // '<' is never a newline, so the column is at least 1 here
            let open_at = Position::new(self.position.line, self.position.column - 1);

            match self.next_byte()? {
                None => return Err(unterminated(open_at, "markup").into()),
                Some(b'?') => self.skip_through(b"?>", open_at, "processing instruction")?,
                Some(b'!') => self.skip_declaration(open_at)?,
                Some(b'/') => return self.end_tag(open_at).map(ScanEvent::Tag),
                Some(first) => return self.start_tag(first, open_at).map(ScanEvent::Tag),
            }
        }
    }

    fn finish(&mut self) -> Result<ScanEvent, ScanError> {
        if let Some(name) = self.open.last() {
            return Err(MarkupError::new(
                self.position,
                format!("unexpected end of document, <{name}> is not closed"),
            )
            .into());
        }
        self.finished = true;
        Ok(ScanEvent::EndDocument)
    }

    fn start_tag(&mut self, first: u8, open_at: Position) -> Result<TagEvent, ScanError> {
        if is_name_end(first) || !is_name_start(first) {
            return Err(MarkupError::new(open_at, "invalid start tag").into());
        }

        let mut name = vec![first];
        let terminator = loop {
            match self.next_byte()? {
                None => return Err(unterminated(open_at, "start tag").into()),
                Some(b) if is_name_end(b) => break b,
                Some(b) => name.push(b),
            }
        };
        let name = tag_name(name, open_at)?;

        let self_closing = match terminator {
            b'>' => false,
            b'/' => {
                self.expect_gt(open_at)?;
                true
            }
            _ => self.skip_attributes(open_at)?,
        };

        if self.root_closed && self.open.is_empty() {
            return Err(MarkupError::new(
                open_at,
                format!("element <{name}> found after the root element"),
            )
            .into());
        }

        let end = self.position;
        if self_closing {
            if self.open.is_empty() {
                self.root_closed = true;
            }
            self.queued = Some(TagEvent::end(name.clone(), end));
        } else {
            self.open.push(name.clone());
        }
        Ok(TagEvent::start(name, end))
    }

    fn end_tag(&mut self, open_at: Position) -> Result<TagEvent, ScanError> {
        let mut name = Vec::new();
        let closed = loop {
            match self.next_byte()? {
                None => return Err(unterminated(open_at, "end tag").into()),
                Some(b'>') => break true,
                Some(b) if b.is_ascii_whitespace() => break false,
                Some(b) => name.push(b),
            }
        };
        if !closed {
            loop {
                match self.next_byte()? {
                    None => return Err(unterminated(open_at, "end tag").into()),
                    Some(b'>') => break,
                    Some(b) if b.is_ascii_whitespace() => {}
                    Some(_) => {
                        return Err(MarkupError::new(open_at, "unexpected content in end tag").into())
                    }
                }
            }
        }
        let name = tag_name(name, open_at)?;

        match self.open.pop() {
            Some(open) if open == name => {}
            Some(open) => {
                return Err(MarkupError::new(
                    open_at,
                    format!("end tag </{name}> does not match <{open}>"),
                )
                .into())
            }
            None => {
                return Err(
                    MarkupError::new(open_at, format!("unexpected end tag </{name}>")).into(),
                )
            }
        }
        if self.open.is_empty() {
            self.root_closed = true;
        }

        Ok(TagEvent::end(name, self.position))
    }

    /// Skip attributes up to the closing `>`; returns whether the tag was
    /// self-closing.
    fn skip_attributes(&mut self, open_at: Position) -> Result<bool, ScanError> {
        let mut quote: Option<u8> = None;
        loop {
            let Some(b) = self.next_byte()? else {
                return Err(unterminated(open_at, "start tag").into());
            };
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
                continue;
            }
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Ok(false),
                b'/' if self.peek_byte()? == Some(b'>') => {
                    self.next_byte()?;
                    return Ok(true);
                }
                b'<' => return Err(MarkupError::new(open_at, "unexpected '<' inside tag").into()),
                _ => {}
            }
        }
    }

    /// Skip `<!-- -->`, `<![CDATA[ ]]>` or `<!DOCTYPE ...>`; the `<!` has
    /// already been consumed.
    fn skip_declaration(&mut self, open_at: Position) -> Result<(), ScanError> {
        match self.next_byte()? {
            None => Err(unterminated(open_at, "declaration").into()),
            Some(b'-') => {
                if self.next_byte()? != Some(b'-') {
                    return Err(MarkupError::new(open_at, "malformed comment").into());
                }
                self.skip_through(b"-->", open_at, "comment")
            }
            Some(b'[') => {
                for expected in b"CDATA[" {
                    if self.next_byte()? != Some(*expected) {
                        return Err(MarkupError::new(open_at, "malformed CDATA section").into());
                    }
                }
                self.skip_through(b"]]>", open_at, "CDATA section")
            }
            Some(b'>') => Ok(()),
            Some(_) => self.skip_doctype(open_at),
        }
    }

    fn skip_doctype(&mut self, open_at: Position) -> Result<(), ScanError> {
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        loop {
            let Some(b) = self.next_byte()? else {
                return Err(unterminated(open_at, "DOCTYPE declaration").into());
            };
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
                continue;
            }
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => return Ok(()),
                _ => {}
            }
        }
    }

    /// Consume bytes up to and including `terminator`.
    fn skip_through(
        &mut self,
        terminator: &[u8],
        open_at: Position,
        what: &str,
    ) -> Result<(), ScanError> {
        let mut window: Vec<u8> = Vec::with_capacity(terminator.len());
        while let Some(b) = self.next_byte()? {
            if window.len() == terminator.len() {
                window.remove(0);
            }
            window.push(b);
            if window == terminator {
                return Ok(());
            }
        }
        Err(unterminated(open_at, what).into())
    }

    /// Consume bytes up to and including the next `needle`; returns false
    /// if the input ran out first.
    fn skip_past_byte(&mut self, needle: u8) -> io::Result<bool> {
        loop {
            let (consumed, found) = {
                let buf = self.reader.fill_buf()?;
                if buf.is_empty() {
                    return Ok(false);
                }
                match memchr(needle, buf) {
                    Some(i) => {
                        advance_over(&mut self.position, &buf[..=i]);
                        (i + 1, true)
                    }
                    None => {
                        advance_over(&mut self.position, buf);
                        (buf.len(), false)
                    }
                }
            };
            self.reader.consume(consumed);
            if found {
                return Ok(true);
            }
        }
    }

    fn expect_gt(&mut self, open_at: Position) -> Result<(), ScanError> {
        match self.next_byte()? {
            Some(b'>') => Ok(()),
            Some(_) => Err(MarkupError::new(open_at, "expected '>' after '/'").into()),
            None => Err(unterminated(open_at, "start tag").into()),
        }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let Some(&b) = self.reader.fill_buf()?.first() else {
            return Ok(None);
        };
        self.reader.consume(1);
        if b == b'\n' {
            self.position.line += 1;
            self.position.column = 0;
        } else {
            self.position.column += 1;
        }
        Ok(Some(b))
    }

    fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(self.reader.fill_buf()?.first().copied())
    }
}

impl<R: BufRead> Iterator for TagScanner<R> {
    type Item = Result<TagEvent, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Ok(ScanEvent::Tag(event)) => Some(Ok(event)),
            Ok(ScanEvent::EndDocument) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn advance_over(position: &mut Position, bytes: &[u8]) {
    match memrchr(b'\n', bytes) {
        Some(last) => {
            position.line += memchr_iter(b'\n', bytes).count();
            position.column = bytes.len() - last - 1;
        }
        None => position.column += bytes.len(),
    }
}

fn is_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'>' || b == b'/'
}

fn is_name_start(b: u8) -> bool {
    !(b.is_ascii_digit() || matches!(b, b'-' | b'.' | b'<' | b'"' | b'\'' | b'=' | b'&'))
}

fn tag_name(bytes: Vec<u8>, open_at: Position) -> Result<String, MarkupError> {
    let valid = bytes.first().is_some_and(|b| is_name_start(*b))
        && !bytes
            .iter()
            .any(|b| matches!(b, b'<' | b'>' | b'"' | b'\'' | b'=' | b'&'));
    if !valid {
        return Err(MarkupError::new(open_at, "invalid tag name"));
    }
    String::from_utf8(bytes).map_err(|_| MarkupError::new(open_at, "tag name is not valid UTF-8"))
}

fn unterminated(open_at: Position, what: &str) -> MarkupError {
    MarkupError::new(open_at, format!("unexpected end of document inside {what}"))
}
