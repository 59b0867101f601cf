//! Batch sinks that write batches as YAML or JSON.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::batch::BatchSink;
use crate::error::{Result, XmlSplitError};
use crate::types::Batch;

/// Serialization format for written batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl OutputFormat {
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

/// Render one batch as a standalone document.
///
/// YAML output starts with a `---` document marker so several batches can
/// be concatenated into one stream; JSON output is a single line.
pub fn render_batch(batch: &Batch, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => {
            let yaml = serde_yaml_ng::to_string(batch)?;
            Ok(format!("---\n{yaml}"))
        }
        OutputFormat::Json => {
            let mut json = serde_json::to_string(batch)?;
            json.push('\n');
            Ok(json)
        }
    }
}

/// Writes each batch to its own numbered file in a directory.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    format: OutputFormat,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    /// Create the sink; the directory must already exist.
    pub fn new(dir: impl Into<PathBuf>, format: OutputFormat) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(XmlSplitError::Config(format!(
                "output directory does not exist: {}",
                dir.display()
            )));
        }
        Ok(Self {
            dir,
            format,
            written: Vec::new(),
        })
    }

    /// Files written so far, in delivery order.
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_atomic(&self, path: &Path, content: &str) -> std::io::Result<()> {
        let temp_file = path.with_extension(format!("{}.tmp", self.format.extension()));
        {
            let mut file = File::create(&temp_file)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        #[cfg(target_os = "windows")]
        if path.exists() {
            fs::remove_file(path)?;
        }

        fs::rename(&temp_file, path)
    }
}

impl BatchSink for DirectorySink {
    fn deliver(&mut self, batch: Batch) -> Result<()> {
        let content = render_batch(&batch, self.format)?;
        let path = self.dir.join(format!(
            "batch-{:05}.{}",
            self.written.len() + 1,
            self.format.extension()
        ));
        self.write_atomic(&path, &content)
            .map_err(|e| XmlSplitError::io(path.display().to_string(), e))?;
        tracing::debug!(path = %path.display(), fragments = batch.len(), "wrote batch");
        self.written.push(path);
        Ok(())
    }
}

/// Path reported for errors on a [`StreamSink`].
const STREAM_LABEL: &str = "<output stream>";

/// Writes batches one after another to a stream, e.g. stdout.
pub struct StreamSink<W> {
    writer: W,
    format: OutputFormat,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self { writer, format }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> BatchSink for StreamSink<W> {
    fn deliver(&mut self, batch: Batch) -> Result<()> {
        let content = render_batch(&batch, self.format)?;
        self.writer
            .write_all(content.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|e| XmlSplitError::io(STREAM_LABEL, e))
    }
}
