//! Reader configuration, defaults and validation.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, XmlSplitError};

/// Header under which the source file path is attached to each batch.
pub const DEFAULT_HEADER_KEY: &str = "source.file.path";

/// Default number of fragments per batch.
pub const DEFAULT_TAGS_PER_MESSAGE: NonZeroUsize = NonZeroUsize::MIN;

/// XML element name, optionally prefixed.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TAG_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}_][\p{L}\p{N}_.\-]*(:[\p{L}_][\p{L}\p{N}_.\-]*)?$").expect("valid regex")
});

/// Where the reader gets the names of the files to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// A single configured file, resolved against `ReaderConfig::base_dir`.
    Path(String),

    /// File names arrive with each inbound message.
    FromMessage,
}

/// Configuration for an [`XmlReader`](crate::reader::XmlReader).
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Element to extract; `None` means the document's root element.
    pub read_tag: Option<String>,

    /// Number of fragments per emitted batch.
    pub read_tags_per_message: NonZeroUsize,

    /// Header key that carries the source file path.
    pub header_key: String,

    pub file_source: Option<FileSource>,

    /// Directory that relative file names are resolved against.
    pub base_dir: Option<PathBuf>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_tag: None,
            read_tags_per_message: DEFAULT_TAGS_PER_MESSAGE,
            header_key: DEFAULT_HEADER_KEY.to_string(),
            file_source: None,
            base_dir: None,
        }
    }
}

impl ReaderConfig {
    /// Reader for one configured file.
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            file_source: Some(FileSource::Path(path.into())),
            ..Self::default()
        }
    }

    /// Reader that takes its file names from inbound messages.
    pub fn from_message() -> Self {
        Self {
            file_source: Some(FileSource::FromMessage),
            ..Self::default()
        }
    }

    /// Load configuration from `XMLSPLIT_*` environment variables.
    ///
    /// Unset variables keep their defaults; validation happens when the
    /// reader is built.
    pub fn from_env() -> Result<Self> {
        let read_tag = std::env::var("XMLSPLIT_READ_TAG")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let read_tags_per_message = match std::env::var("XMLSPLIT_TAGS_PER_MESSAGE") {
            Ok(v) => parse_tags_per_message(&v)?,
            Err(_) => DEFAULT_TAGS_PER_MESSAGE,
        };

        let header_key = std::env::var("XMLSPLIT_HEADER_KEY")
            .unwrap_or_else(|_| DEFAULT_HEADER_KEY.to_string());

        let base_dir = std::env::var("XMLSPLIT_BASE_DIR").ok().map(PathBuf::from);

        let from_message = std::env::var("XMLSPLIT_FILE_FROM_MESSAGE")
            .ok()
            .map(|v| v != "false" && v != "0")
            .unwrap_or(false);

        let file_source = if from_message {
            Some(FileSource::FromMessage)
        } else {
            std::env::var("XMLSPLIT_FILE").ok().map(FileSource::Path)
        };

        Ok(Self {
            read_tag,
            read_tags_per_message,
            header_key,
            file_source,
            base_dir,
        })
    }

    #[must_use]
    pub fn with_read_tag(mut self, tag: impl Into<String>) -> Self {
        self.read_tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn with_tags_per_message(mut self, per_message: NonZeroUsize) -> Self {
        self.read_tags_per_message = per_message;
        self
    }

    #[must_use]
    pub fn with_header_key(mut self, key: impl Into<String>) -> Self {
        self.header_key = key.into();
        self
    }

    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Check the configuration before any file is opened.
    pub fn validate(&self) -> Result<()> {
        match &self.file_source {
            None => {
                return Err(XmlSplitError::Config(
                    "no file source: configure a file path or read file names from the inbound message"
                        .to_string(),
                ))
            }
            Some(FileSource::Path(path)) if path.trim().is_empty() => {
                return Err(XmlSplitError::Config("configured file path is empty".to_string()))
            }
            Some(_) => {}
        }

        if let Some(tag) = &self.read_tag {
            validate_tag_name(tag)?;
        }

        if self.header_key.trim().is_empty() {
            return Err(XmlSplitError::Config("header key must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Validate an element name for use as the read tag.
///
/// # Examples
/// ```
/// use xmlsplit::config::validate_tag_name;
///
/// assert!(validate_tag_name("item").is_ok());
/// assert!(validate_tag_name("ns:item").is_ok());
/// assert!(validate_tag_name("1item").is_err());
/// ```
pub fn validate_tag_name(tag: &str) -> Result<()> {
    if TAG_NAME_PATTERN.is_match(tag) {
        Ok(())
    } else {
        Err(XmlSplitError::Config(format!(
            "invalid read tag '{tag}': expected an XML element name"
        )))
    }
}

/// Parse a fragments-per-batch value; must be a positive integer.
pub fn parse_tags_per_message(value: &str) -> Result<NonZeroUsize> {
    value.trim().parse::<NonZeroUsize>().map_err(|_| {
        XmlSplitError::Config(format!(
            "invalid tags per message '{value}': expected a positive integer"
        ))
    })
}
