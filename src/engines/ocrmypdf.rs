//! OCR engine wrapping the `ocrmypdf` CLI tool.

use std::ffi::OsString;

use crate::{async_utils::task::WorkerTask, config::OcrSettings, prelude::*};

use super::{ExternalTool, OcrEngine};

/// Runs `ocrmypdf` as an isolated child process, so a crash in the OCR engine
/// only fails the current file.
pub struct OcrMyPdfEngine {
    tool: ExternalTool,
    settings: OcrSettings,
}

impl OcrMyPdfEngine {
    /// Create a new `ocrmypdf` engine.
    pub fn new(settings: &OcrSettings) -> Self {
        Self {
            tool: ExternalTool::new("ocrmypdf", &settings.program, &settings.prefix_args),
            settings: settings.to_owned(),
        }
    }

    /// The underlying tool, for version checks.
    pub fn tool(&self) -> &ExternalTool {
        &self.tool
    }

    /// Build our `ocrmypdf` arguments.
    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let settings = &self.settings;
        let mut args: Vec<OsString> =
            vec!["--language".into(), settings.language.as_str().into()];
        if settings.rotate_pages {
            args.push("--rotate-pages".into());
        }
        if settings.deskew {
            args.push("--deskew".into());
        }
        args.push("--output-type".into());
        args.push(settings.output_type.as_str().into());
        if settings.force_ocr {
            args.push("--force-ocr".into());
        }
        args.push(input.into());
        args.push(output.into());
        args
    }
}

#[async_trait]
impl OcrEngine for OcrMyPdfEngine {
    #[instrument(level = "debug", skip_all, fields(input = %input.display()))]
    async fn ocr(&self, input: &Path, output: &Path) -> Result<()> {
        let tool = self.tool.clone();
        let args = self.args(input, output);
        let task = WorkerTask::spawn("ocrmypdf", async move { tool.run(&args).await });
        task.join_with_timeout(self.settings.timeout()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_args_match_fixed_pipeline() {
        let engine = OcrMyPdfEngine::new(&OcrSettings::default());
        let args = engine.args(Path::new("/docs/a b.pdf"), Path::new("/docs/a b_ocr.pdf"));
        let expected: Vec<OsString> = [
            "--language",
            "deu",
            "--rotate-pages",
            "--deskew",
            "--output-type",
            "pdf",
            "--force-ocr",
            "/docs/a b.pdf",
            "/docs/a b_ocr.pdf",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn disabled_flags_are_omitted() {
        let settings = OcrSettings {
            language: "eng+fra".to_owned(),
            rotate_pages: false,
            deskew: false,
            force_ocr: false,
            ..OcrSettings::default()
        };
        let engine = OcrMyPdfEngine::new(&settings);
        let args = engine.args(Path::new("in.pdf"), Path::new("out.pdf"));
        let expected: Vec<OsString> =
            ["--language", "eng+fra", "--output-type", "pdf", "in.pdf", "out.pdf"]
                .into_iter()
                .map(OsString::from)
                .collect();
        assert_eq!(args, expected);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_hung_engine() {
        // Our own arguments land after the script, where `sh -c` ignores them.
        let settings = OcrSettings {
            program: "sh".to_owned(),
            prefix_args: vec![
                "-c".to_owned(),
                "exec sleep 3600".to_owned(),
                "sh".to_owned(),
            ],
            timeout_secs: Some(1),
            ..OcrSettings::default()
        };
        let engine = OcrMyPdfEngine::new(&settings);
        let err = engine
            .ocr(Path::new("/in.pdf"), Path::new("/out.pdf"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err:#}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_helper_processes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let marker = dir.path().join("helper-finished");
        // The background subshell stands in for a `tesseract` helper.
        let script = format!("(sleep 2; touch '{}') & wait", marker.display());
        let settings = OcrSettings {
            program: "sh".to_owned(),
            prefix_args: vec!["-c".to_owned(), script, "sh".to_owned()],
            timeout_secs: Some(1),
            ..OcrSettings::default()
        };
        let engine = OcrMyPdfEngine::new(&settings);
        let err = engine
            .ocr(Path::new("/in.pdf"), Path::new("/out.pdf"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err:#}");

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(!marker.exists(), "helper outlived the timeout");
        Ok(())
    }
}
