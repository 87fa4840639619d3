//! Converter configuration.
//!
//! Settings are layered. We start from built-in defaults for the standard
//! `ocrmypdf` and Ghostscript pipeline, then apply an optional TOML or JSON
//! file, environment variables, and finally command-line flags.

use std::{env, time::Duration};

use clap::Args;
use schemars::JsonSchema;

use crate::{async_utils::io::read_json_or_toml, prelude::*};

/// Environment variable which overrides the `ocrmypdf` program.
pub const OCRMYPDF_ENV_VAR: &str = "PDF_MANAGER_OCRMYPDF";

/// Environment variable which overrides the Ghostscript program.
pub const GS_ENV_VAR: &str = "PDF_MANAGER_GS";

/// Everything [`crate::converter::FileConverter`] needs to know about how to
/// run the external tools.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// OCR settings.
    pub ocr: OcrSettings,

    /// Compression settings.
    pub compress: CompressSettings,
}

/// Settings for the `ocrmypdf` step.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OcrSettings {
    /// The program to run.
    pub program: String,

    /// Extra arguments passed to `program` before any of ours. Useful for
    /// wrappers like `docker run ...` or `sh script.sh`.
    pub prefix_args: Vec<String>,

    /// Tesseract language code(s), such as `deu` or `eng+fra`.
    pub language: String,

    /// Automatically rotate pages based on detected text orientation.
    pub rotate_pages: bool,

    /// Deskew crooked pages before OCR.
    pub deskew: bool,

    /// Output container type passed to `--output-type`.
    pub output_type: String,

    /// OCR every page, even pages which already contain text.
    pub force_ocr: bool,

    /// Give up on a file if OCR takes longer than this. `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl OcrSettings {
    /// Our OCR timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            program: "ocrmypdf".to_owned(),
            prefix_args: vec![],
            language: "deu".to_owned(),
            rotate_pages: true,
            deskew: true,
            output_type: "pdf".to_owned(),
            force_ocr: true,
            timeout_secs: None,
        }
    }
}

/// Settings for the Ghostscript compression step.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressSettings {
    /// The program to run.
    pub program: String,

    /// Extra arguments passed to `program` before any of ours.
    pub prefix_args: Vec<String>,

    /// Ghostscript output device.
    pub device: String,

    /// PDF compatibility level of the output.
    pub compatibility_level: String,

    /// Name of the `-dPDFSETTINGS` preset, without the leading slash.
    pub pdf_settings: String,

    /// Share identical images between pages.
    pub detect_duplicate_images: bool,

    /// Compress embedded fonts.
    pub compress_fonts: bool,

    /// Resolution in DPI.
    pub resolution: u32,
}

impl Default for CompressSettings {
    fn default() -> Self {
        Self {
            program: "gs".to_owned(),
            prefix_args: vec![],
            device: "pdfwrite".to_owned(),
            compatibility_level: "1.4".to_owned(),
            pdf_settings: "default".to_owned(),
            detect_duplicate_images: true,
            compress_fonts: true,
            resolution: 300,
        }
    }
}

impl ConverterConfig {
    /// Apply overrides from environment variables. We take a lookup function
    /// instead of reading the environment directly so that tests don't need to
    /// mutate global process state.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(program) = lookup(OCRMYPDF_ENV_VAR).filter(|p| !p.is_empty()) {
            self.ocr.program = program;
        }
        if let Some(program) = lookup(GS_ENV_VAR).filter(|p| !p.is_empty()) {
            self.compress.program = program;
        }
    }
}

/// Command-line options controlling [`ConverterConfig`].
#[derive(Args, Clone, Debug, Default)]
pub struct ConfigOpts {
    /// A TOML or JSON file containing converter settings. Run `pdf-manager
    /// schema ConverterConfig` for the format.
    #[clap(long = "config", value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    /// OCR language(s), as Tesseract language codes. Defaults to `deu`.
    #[clap(long)]
    pub language: Option<String>,

    /// Give up on OCR for a file after this many seconds.
    #[clap(long = "ocr-timeout", value_name = "SECS")]
    pub ocr_timeout_secs: Option<u64>,

    /// The `ocrmypdf` program to run.
    #[clap(long = "ocrmypdf", value_name = "PROGRAM")]
    pub ocrmypdf_program: Option<String>,

    /// The Ghostscript program to run.
    #[clap(long = "gs", value_name = "PROGRAM")]
    pub gs_program: Option<String>,
}

impl ConfigOpts {
    /// Build our final configuration.
    #[instrument(level = "debug", skip_all)]
    pub async fn load(&self) -> Result<ConverterConfig> {
        let mut config = match &self.config_path {
            Some(path) => read_json_or_toml::<ConverterConfig>(path).await?,
            None => ConverterConfig::default(),
        };
        config.apply_env(|name| env::var(name).ok());
        self.apply_to(&mut config);
        debug!(?config, "Loaded converter configuration");
        Ok(config)
    }

    /// Apply command-line overrides to `config`.
    fn apply_to(&self, config: &mut ConverterConfig) {
        if let Some(language) = &self.language {
            config.ocr.language = language.clone();
        }
        if let Some(secs) = self.ocr_timeout_secs {
            config.ocr.timeout_secs = Some(secs);
        }
        if let Some(program) = &self.ocrmypdf_program {
            config.ocr.program = program.clone();
        }
        if let Some(program) = &self.gs_program {
            config.compress.program = program.clone();
        }
    }
}
