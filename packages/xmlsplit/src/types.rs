//! Core data types shared by the scanner, tracker, extractor and batcher.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A boundary in the raw text of a file.
///
/// `line` is 1-based, `column` is a 0-based byte offset within that line.
/// For tag events the column points just past the closing `>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// The very first boundary of a file.
    pub const START: Position = Position { line: 1, column: 0 };

    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::START
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Whether a tag event opens or closes an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Start,
    End,
}

/// A start or end tag as reported by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEvent {
    pub kind: TagKind,

    /// Element name exactly as written, prefix included.
    pub name: String,

    /// Boundary right after the tag's closing `>`.
    pub end: Position,
}

impl TagEvent {
    #[must_use]
    pub fn start(name: impl Into<String>, end: Position) -> Self {
        Self {
            kind: TagKind::Start,
            name: name.into(),
            end,
        }
    }

    #[must_use]
    pub fn end(name: impl Into<String>, end: Position) -> Self {
        Self {
            kind: TagKind::End,
            name: name.into(),
            end,
        }
    }
}

/// A target element whose start tag has been seen but not its end tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMatch {
    /// Boundary just after the tag preceding the matched start tag.
    pub start: Position,
    pub target: String,
}

/// The raw span of one complete target element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: Position,
    pub end: Position,
}

/// One verbatim-extracted element occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragment {
    text: String,
}

impl Fragment {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Batch metadata, e.g. the source file path.
pub type Headers = BTreeMap<String, String>;

/// A group of fragments delivered to the sink in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub headers: Headers,
    pub fragments: Vec<Fragment>,

    /// Set on the last batch of the last file when the caller signalled
    /// the end of the unit of work.
    pub is_final: bool,
}

impl Batch {
    /// Get the fragment texts in match order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().map(Fragment::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Counters for a single reader run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStats {
    pub files_read: usize,
    pub fragments_extracted: usize,
    pub batches_emitted: usize,
}

impl ReadStats {
    /// Fold the counters of another run into this one.
    pub fn merge(&mut self, other: ReadStats) {
        self.files_read += other.files_read;
        self.fragments_extracted += other.fragments_extracted;
        self.batches_emitted += other.batches_emitted;
    }
}
