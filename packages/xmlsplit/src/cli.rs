//! Command-line interface for xmlsplit.

use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{FileSource, ReaderConfig};
use crate::error::Result;
use crate::output::{DirectorySink, OutputFormat, StreamSink};
use crate::reader::XmlReader;
use crate::types::ReadStats;

/// xmlsplit - Extract repeated XML elements verbatim, in batches.
#[derive(Parser)]
#[command(name = "xmlsplit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract every occurrence of an element from one or more XML files.
    Extract {
        /// XML files to read, in order
        #[arg(required = true)]
        files: Vec<String>,

        /// Element to extract (default: the root element of the first file)
        #[arg(short, long)]
        tag: Option<String>,

        /// Number of fragments per batch (default: 1)
        #[arg(short = 'n', long)]
        per_batch: Option<NonZeroUsize>,

        /// Header key for the source file path (default: source.file.path)
        #[arg(long)]
        header_key: Option<String>,

        /// Directory that relative file names are resolved against
        #[arg(short, long)]
        base_dir: Option<PathBuf>,

        /// Write one file per batch into this directory instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Batch serialization format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
}

/// Options for the extract command after parsing.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub files: Vec<String>,
    pub tag: Option<String>,
    pub per_batch: Option<NonZeroUsize>,
    pub header_key: Option<String>,
    pub base_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
}

impl ExtractOptions {
    /// Layer command-line options over the environment configuration.
    pub fn reader_config(&self) -> Result<ReaderConfig> {
        let mut config = ReaderConfig::from_env()?;
        config.file_source = Some(FileSource::FromMessage);
        if let Some(tag) = &self.tag {
            config.read_tag = Some(tag.clone());
        }
        if let Some(per_batch) = self.per_batch {
            config.read_tags_per_message = per_batch;
        }
        if let Some(key) = &self.header_key {
            config.header_key = key.clone();
        }
        if let Some(dir) = &self.base_dir {
            config.base_dir = Some(dir.clone());
        }
        Ok(config)
    }
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            files,
            tag,
            per_batch,
            header_key,
            base_dir,
            output,
            format,
        } => extract_command(&ExtractOptions {
            files,
            tag,
            per_batch,
            header_key,
            base_dir,
            output,
            format,
        }),
    }
}

/// Execute the extract command.
fn extract_command(options: &ExtractOptions) -> Result<()> {
    let reader = XmlReader::new(options.reader_config()?)?;
    let opener = reader.fs_opener();

    // Create the directory sink up front so a bad output path fails before
    // any file is read.
    let mut directory_sink = match &options.output {
        Some(dir) => Some(DirectorySink::new(dir, options.format)?),
        None => None,
    };

    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(format!("Reading {} file(s)...", options.files.len()));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = match directory_sink.as_mut() {
        Some(sink) => reader.handle(Some(options.files.as_slice()), &opener, sink, true),
        None => {
            let mut sink = StreamSink::new(io::stdout().lock(), options.format);
            reader.handle(Some(options.files.as_slice()), &opener, &mut sink, true)
        }
    };

    pb.finish_and_clear();
    let stats = result?;

    print_summary(&stats, options.output.as_deref());
    Ok(())
}

fn print_summary(stats: &ReadStats, output: Option<&Path>) {
    eprintln!(
        "{} {} fragment(s) from {} file(s) in {} batch(es)",
        style("Extracted").green().bold(),
        style(stats.fragments_extracted).cyan(),
        stats.files_read,
        stats.batches_emitted
    );
    if let Some(dir) = output {
        eprintln!("{} {}", style("Saved to:").green().bold(), dir.display());
    }
}
