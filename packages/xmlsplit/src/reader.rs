//! File-processing service that ties the scanner, tracker, extractor and
//! batcher together.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::PathBuf;

use crate::batch::{BatchAccumulator, BatchSink};
use crate::config::{FileSource, ReaderConfig};
use crate::error::{Result, XmlSplitError};
use crate::extract::VerbatimExtractor;
use crate::tracker::BoundaryTracker;
use crate::types::{Headers, ReadStats};
use crate::xml::{ScanEvent, TagScanner};

/// Opens a file by name. Called twice per file; both streams must yield the
/// same content.
pub trait SourceOpener {
    fn open(&self, name: &str) -> io::Result<Box<dyn BufRead + '_>>;
}

/// Opens files from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsOpener {
    base_dir: Option<PathBuf>,
}

impl FsOpener {
    #[must_use]
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    /// Resolve a file name against the base directory, if any.
    ///
    /// Absolute names are used as-is.
    #[must_use]
    pub fn resolve(&self, name: &str) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(name),
            None => PathBuf::from(name),
        }
    }
}

impl SourceOpener for FsOpener {
    fn open(&self, name: &str) -> io::Result<Box<dyn BufRead + '_>> {
        let file = File::open(self.resolve(name))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Serves file contents from memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryOpener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }
}

impl SourceOpener for MemoryOpener {
    fn open(&self, name: &str) -> io::Result<Box<dyn BufRead + '_>> {
        let content = self.files.get(name).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {name}"))
        })?;
        Ok(Box::new(Cursor::new(content.as_slice())))
    }
}

/// Extracts every occurrence of the read tag from a sequence of files.
#[derive(Debug, Clone)]
pub struct XmlReader {
    config: ReaderConfig,
}

impl XmlReader {
    /// Create a reader; fails if the configuration is unusable.
    pub fn new(config: ReaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Filesystem opener rooted at the configured base directory.
    #[must_use]
    pub fn fs_opener(&self) -> FsOpener {
        FsOpener::new(self.config.base_dir.clone())
    }

    /// Resolve the files to read for one inbound message.
    pub fn files_to_read(&self, message: Option<&[String]>) -> Result<Vec<String>> {
        match &self.config.file_source {
            Some(FileSource::Path(path)) => Ok(vec![path.clone()]),
            Some(FileSource::FromMessage) => message.map(<[String]>::to_vec).ok_or_else(|| {
                XmlSplitError::Config(
                    "configured to read file names from the message, but no message was given"
                        .to_string(),
                )
            }),
            None => Err(XmlSplitError::Config("no file source configured".to_string())),
        }
    }

    /// Handle one inbound message: resolve its files and process them.
    pub fn handle<O, S>(
        &self,
        message: Option<&[String]>,
        opener: &O,
        sink: &mut S,
        unit_of_work_last: bool,
    ) -> Result<ReadStats>
    where
        O: SourceOpener + ?Sized,
        S: BatchSink + ?Sized,
    {
        let files = self.files_to_read(message)?;
        self.process_files(&files, opener, sink, unit_of_work_last)
    }

    /// Process `files` in order, delivering batches to `sink`.
    ///
    /// The last batch of the last file is flagged final when
    /// `unit_of_work_last` is set. The first error aborts the run; batches
    /// already delivered stay delivered.
    pub fn process_files<O, S>(
        &self,
        files: &[String],
        opener: &O,
        sink: &mut S,
        unit_of_work_last: bool,
    ) -> Result<ReadStats>
    where
        O: SourceOpener + ?Sized,
        S: BatchSink + ?Sized,
    {
        let mut stats = ReadStats::default();
        // Resolved from the first root element when unset, then fixed for
        // the rest of the run.
        let mut read_tag = self.config.read_tag.clone();

        for (index, file) in files.iter().enumerate() {
            let is_last_file = index + 1 == files.len();
            tracing::info!(path = %file, "reading file");

            let file_stats = self.process_file(
                file,
                &mut read_tag,
                opener,
                sink,
                is_last_file && unit_of_work_last,
            )?;
            stats.merge(file_stats);
        }

        tracing::debug!(
            files = stats.files_read,
            fragments = stats.fragments_extracted,
            batches = stats.batches_emitted,
            "finished reading files"
        );
        Ok(stats)
    }

    fn process_file<O, S>(
        &self,
        path: &str,
        read_tag: &mut Option<String>,
        opener: &O,
        sink: &mut S,
        is_final: bool,
    ) -> Result<ReadStats>
    where
        O: SourceOpener + ?Sized,
        S: BatchSink + ?Sized,
    {
        let mut headers = Headers::new();
        headers.insert(self.config.header_key.clone(), path.to_string());

        let mut scanner = TagScanner::new(opener.open(path).map_err(|e| XmlSplitError::io(path, e))?);
        let mut extractor =
            VerbatimExtractor::new(opener.open(path).map_err(|e| XmlSplitError::io(path, e))?);
        let mut tracker = BoundaryTracker::new(read_tag.take());
        let mut batch = BatchAccumulator::new(self.config.read_tags_per_message, headers);
        let mut fragments_extracted = 0;

        loop {
            let event = match scanner.next_event().map_err(|e| XmlSplitError::scan(path, e))? {
                ScanEvent::Tag(event) => event,
                ScanEvent::EndDocument => break,
            };
            let Some(span) = tracker.on_event(&event) else {
                continue;
            };
            let fragment = extractor
                .extract(span)
                .map_err(|e| XmlSplitError::io(path, e))?;
            fragments_extracted += 1;
            batch.add(fragment, sink)?;
        }

        // Release both readers before handing off the last batch.
        drop(scanner);
        drop(extractor);

        *read_tag = tracker.into_target();
        if read_tag.is_none() {
            return Err(XmlSplitError::Config(format!(
                "no read tag configured and no root element found in {path}"
            )));
        }

        let batches_emitted = batch.finish(is_final, sink)?;
        tracing::debug!(path = %path, fragments = fragments_extracted, batches = batches_emitted, "file done");

        Ok(ReadStats {
            files_read: 1,
            fragments_extracted,
            batches_emitted,
        })
    }
}
