//! Streaming XML markup scanning.
//!
//! Only element boundaries matter here: the scanner reports start and end
//! tags with the position where each one ends in the raw text, and skips
//! everything else.

mod scanner;

pub use scanner::{MarkupError, ScanError, ScanEvent, TagScanner};
