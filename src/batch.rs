//! Converting a list of files, strictly one at a time.

use schemars::JsonSchema;

use crate::{
    async_utils::io::JsonlWriter,
    converter::FileConverter,
    prelude::*,
    ui::{ProgressConfig, Ui},
};

/// Did a file convert?
#[derive(Clone, Copy, Debug, JsonSchema, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    /// The file was replaced with an OCRed, compressed version.
    Ok,

    /// The file was left untouched. See the log for why.
    Failed,
}

/// One line of our JSONL report.
#[derive(Clone, Debug, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ConversionRecord {
    /// The file we tried to convert.
    pub path: PathBuf,

    /// What happened.
    pub status: ConversionStatus,
}

/// Counts for a finished batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// How many files did we try to convert?
    pub total_count: usize,

    /// How many of them failed?
    pub failure_count: usize,
}

impl BatchSummary {
    /// Count one file.
    fn update(&mut self, status: ConversionStatus) {
        self.total_count += 1;
        if status == ConversionStatus::Failed {
            self.failure_count += 1;
        }
    }

    /// Tell the user how things went, and fail if too many files failed.
    pub fn finish(&self, ui: &Ui, allowed_failure_rate: f32) -> Result<()> {
        if self.total_count == 0 {
            ui.display_message("🤷", "No files to convert");
            return Ok(());
        }
        let failure_rate = self.failure_count as f32 / self.total_count as f32;
        if failure_rate > allowed_failure_rate {
            return Err(anyhow!(
                "{}/{} ({:.2}%) of files failed to convert, but only {:.2}% were allowed",
                self.failure_count,
                self.total_count,
                failure_rate * 100.0,
                allowed_failure_rate * 100.0,
            ));
        }
        if self.failure_count > 0 {
            ui.display_message(
                "❌",
                &format!("{} files could not be converted", self.failure_count),
            );
        }
        ui.display_message(
            "✅",
            &format!(
                "{} of {} files converted",
                self.total_count - self.failure_count,
                self.total_count
            ),
        );
        Ok(())
    }
}

/// Convert each of `files` in order. Each file's whole pipeline finishes
/// before the next one starts, and a failed file doesn't stop the batch.
#[instrument(level = "debug", skip_all, fields(count = files.len()))]
pub async fn convert_files(
    ui: &Ui,
    converter: &FileConverter,
    files: Vec<PathBuf>,
    mut report: Option<&mut JsonlWriter>,
) -> Result<BatchSummary> {
    let pb = ui.new_progress_bar(
        &ProgressConfig {
            emoji: "📄",
            msg: "Converting PDFs",
            done_msg: "Converted PDFs",
        },
        files.len() as u64,
    );

    let mut summary = BatchSummary::default();
    for path in files {
        let status = if converter.convert_and_compress(&path).await {
            ConversionStatus::Ok
        } else {
            ConversionStatus::Failed
        };
        summary.update(status);
        if let Some(report) = report.as_deref_mut() {
            report.write(&ConversionRecord { path, status }).await?;
        }
        pb.inc(1);
    }
    pb.finish_using_style();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        sync::{Arc, Mutex},
    };

    use crate::engines::{Compressor, OcrEngine};

    use super::*;

    /// Records the order in which files are OCRed, and fails on `bad.pdf`.
    #[derive(Default)]
    struct OrderedOcr(Mutex<Vec<String>>);

    #[async_trait]
    impl OcrEngine for OrderedOcr {
        async fn ocr(&self, input: &Path, output: &Path) -> Result<()> {
            let name = input
                .file_name()
                .expect("input has a file name")
                .to_string_lossy()
                .into_owned();
            self.0.lock().expect("lock poisoned").push(name.clone());
            if name == "bad.pdf" {
                return Err(anyhow!("not a PDF"));
            }
            fs::copy(input, output)?;
            Ok(())
        }
    }

    struct CopyCompressor;

    #[async_trait]
    impl Compressor for CopyCompressor {
        async fn compress(&self, input: &Path, output: &Path) -> Result<()> {
            fs::copy(input, output)?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_batch() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let names = ["one.pdf", "bad.pdf", "two.pdf"];
        let files = names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, "%PDF-1.4")?;
                Ok(path)
            })
            .collect::<Result<Vec<_>>>()?;
        let report_path = dir.path().join("report.jsonl");

        let ocr = Arc::new(OrderedOcr::default());
        let converter = FileConverter::new(ocr.clone(), Arc::new(CopyCompressor));
        let ui = Ui::init_for_tests();
        let mut report = JsonlWriter::create(Some(&report_path)).await?;
        let summary = convert_files(&ui, &converter, files, Some(&mut report)).await?;
        report.finish().await?;

        assert_eq!(
            summary,
            BatchSummary {
                total_count: 3,
                failure_count: 1
            }
        );
        assert_eq!(*ocr.0.lock().expect("lock poisoned"), names);

        let statuses = fs::read_to_string(&report_path)?
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line)?;
                Ok(value["status"].as_str().unwrap_or_default().to_owned())
            })
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(statuses, ["ok", "failed", "ok"]);
        Ok(())
    }

    #[test]
    fn finish_enforces_allowed_failure_rate() {
        let ui = Ui::init_for_tests();
        let summary = BatchSummary {
            total_count: 4,
            failure_count: 1,
        };
        assert!(summary.finish(&ui, 0.0).is_err());
        assert!(summary.finish(&ui, 0.25).is_ok());
        assert!(BatchSummary::default().finish(&ui, 0.0).is_ok());
    }
}
