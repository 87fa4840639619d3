//! I/O utilities.
//!
//! This module is responsible for reading our JSON or TOML config files,
//! reading lists of paths, and writing JSONL reports.

use tokio::{
    fs::File,
    io::{AsyncBufRead, AsyncBufReadExt as _, AsyncWrite, AsyncWriteExt as _, BufWriter},
};

use crate::prelude::*;

/// Read TOML or JSON from a file. Files ending in `.json` are parsed as JSON,
/// everything else as TOML.
pub async fn read_json_or_toml<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    // Read all at once because our parsing libraries don't do async I/O.
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at path: {:?}", path))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&data).with_context(|| {
            format!("Failed to parse JSON from file at path: {:?}", path)
        })
    } else {
        toml::from_str(&data).with_context(|| {
            format!("Failed to parse TOML from file at path: {:?}", path)
        })
    }
}

/// Read a newline-separated list of paths. Blank lines are skipped, and
/// surrounding whitespace is trimmed.
pub async fn read_path_list(
    reader: impl AsyncBufRead + Unpin,
    description: &str,
) -> Result<Vec<PathBuf>> {
    let mut lines = reader.lines();
    let mut paths = vec![];
    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("Failed to read paths from {}", description))?
    {
        let line = line.trim();
        if !line.is_empty() {
            paths.push(PathBuf::from(line));
        }
    }
    Ok(paths)
}

/// Create an [`AsyncWrite`] for a file or stdout.
pub async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Writes one JSON value per line.
pub struct JsonlWriter {
    writer: BufWriter<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>>,
}

impl JsonlWriter {
    /// Create a writer for a file or stdout.
    pub async fn create(path: Option<&Path>) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(create_writer(path).await?),
        })
    }

    /// Write a single record, and flush it so that readers can follow along.
    pub async fn write<T: Serialize + std::fmt::Debug>(&mut self, record: &T) -> Result<()> {
        let json = serde_json::to_string(record)
            .with_context(|| format!("Failed to serialize JSON from: {:?}", record))?;
        self.writer
            .write_all(json.as_bytes())
            .await
            .context("Failed to write JSON to output")?;
        self.writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline to output")?;
        self.writer.flush().await.context("Failed to flush output")
    }

    /// Flush and close our output.
    pub async fn finish(mut self) -> Result<()> {
        self.writer.flush().await.context("Failed to flush output")?;
        self.writer
            .shutdown()
            .await
            .context("Failed to close output")
    }
}
