//! xmlsplit - Extract repeated XML elements verbatim from large files.
//!
//! Given the name of a target element, xmlsplit finds every occurrence of
//! it in one forward pass and copies each one out byte for byte, with its
//! original whitespace, attribute quoting and comments intact. Fragments
//! are grouped into fixed-size batches and handed to a sink as they fill.
//!
//! # Example
//!
//! ```
//! use std::num::NonZeroUsize;
//! use xmlsplit::{CollectingSink, MemoryOpener, ReaderConfig, XmlReader};
//!
//! let reader = XmlReader::new(
//!     ReaderConfig::from_message()
//!         .with_read_tag("item")
//!         .with_tags_per_message(NonZeroUsize::new(2).unwrap()),
//! )
//! .unwrap();
//! let opener = MemoryOpener::new()
//!     .with_file("in.xml", "<root><item>A</item><item>B</item></root>");
//! let files = vec!["in.xml".to_string()];
//! let mut sink = CollectingSink::new();
//!
//! reader
//!     .handle(Some(files.as_slice()), &opener, &mut sink, true)
//!     .unwrap();
//! assert_eq!(sink.fragments(), vec!["<item>A</item>", "<item>B</item>"]);
//! assert!(sink.batches[0].is_final);
//! ```
//!
//! # Architecture
//!
//! - [`xml`]: forward-only tag scanner reporting where each tag ends
//! - [`tracker`]: turns tag events into spans of the target element
//! - [`extract`]: cuts each span out of the raw text via a line cursor
//! - [`batch`]: groups fragments into batches and delivers them to a sink
//! - [`reader`]: per-file processing that ties the pieces together
//! - [`config`]: reader configuration and validation
//! - [`output`]: YAML/JSON batch sinks
//! - [`error`]: error types and Result alias
//! - [`cli`]: command-line interface

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod reader;
pub mod tracker;
pub mod types;
pub mod xml;

// Re-export commonly used items
pub use batch::{BatchAccumulator, BatchSink, CollectingSink};
pub use config::{FileSource, ReaderConfig};
pub use error::{Result, XmlSplitError};
pub use reader::{FsOpener, MemoryOpener, SourceOpener, XmlReader};
pub use types::{Batch, Fragment, Headers, Position, ReadStats};
