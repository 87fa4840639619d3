//! The `convert` subcommand.

use clap::Args;
use tokio::io::BufReader;

use crate::{
    async_utils::io::{JsonlWriter, read_path_list},
    batch::convert_files,
    config::ConfigOpts,
    converter::FileConverter,
    prelude::*,
    selection::FileSelection,
    ui::Ui,
};

/// Convert command line arguments.
#[derive(Debug, Args)]
pub struct ConvertOpts {
    /// PDF files to OCR and compress in place. If none are given, paths are
    /// read from standard input, one per line.
    #[clap(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    #[clap(flatten)]
    pub config_opts: ConfigOpts,

    /// Write a JSONL record with the status of each file to this path.
    #[clap(long = "report", value_name = "PATH")]
    pub report_path: Option<PathBuf>,

    /// What portion of files should we allow to fail? Specified as a number
    /// between 0.0 and 1.0.
    #[clap(long, default_value = "0.0")]
    pub allowed_failure_rate: f32,
}

/// The `convert` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_convert(ui: Ui, opts: &ConvertOpts) -> Result<()> {
    let config = opts.config_opts.load().await?;
    let converter = FileConverter::from_config(&config);

    // Collect our files.
    let candidates = if opts.files.is_empty() {
        read_path_list(BufReader::new(tokio::io::stdin()), "stdin").await?
    } else {
        opts.files.clone()
    };
    let mut selection = FileSelection::new();
    selection.extend(candidates).await;
    if selection.is_empty() {
        warn!("None of the given paths are PDF files we can convert");
    } else {
        debug!(files = ?selection.files(), "Selected {} files", selection.len());
    }

    // Convert them one at a time.
    let mut report = match &opts.report_path {
        Some(path) => Some(JsonlWriter::create(Some(path)).await?),
        None => None,
    };
    let summary = convert_files(&ui, &converter, selection.take(), report.as_mut()).await?;
    if let Some(report) = report {
        report.finish().await?;
    }

    summary.finish(&ui, opts.allowed_failure_rate)
}
