//! Compressor wrapping the Ghostscript CLI tool.

use std::ffi::{OsStr, OsString};

use crate::{config::CompressSettings, prelude::*};

use super::{Compressor, ExternalTool};

/// Rasterizes and recompresses PDFs using `gs -sDEVICE=pdfwrite`.
pub struct GhostscriptCompressor {
    tool: ExternalTool,
    settings: CompressSettings,
}

impl GhostscriptCompressor {
    /// Create a new Ghostscript compressor.
    pub fn new(settings: &CompressSettings) -> Self {
        Self {
            tool: ExternalTool::new("gs", &settings.program, &settings.prefix_args),
            settings: settings.to_owned(),
        }
    }

    /// The underlying tool, for version checks.
    pub fn tool(&self) -> &ExternalTool {
        &self.tool
    }

    /// Build our Ghostscript arguments. These are passed straight to the
    /// process without a shell, so paths need no shell quoting. The output path
    /// is a template, though, and gets its own escaping.
    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let settings = &self.settings;
        let mut args: Vec<OsString> = vec![
            format!("-sDEVICE={}", settings.device).into(),
            format!("-dCompatibilityLevel={}", settings.compatibility_level).into(),
            format!("-dPDFSETTINGS=/{}", settings.pdf_settings).into(),
            "-dNOPAUSE".into(),
            "-dBATCH".into(),
        ];
        if settings.detect_duplicate_images {
            args.push("-dDetectDuplicateImages".into());
        }
        args.push(format!("-dCompressFonts={}", settings.compress_fonts).into());
        args.push(format!("-r{}", settings.resolution).into());

        let mut output_arg = OsString::from("-sOutputFile=");
        output_arg.push(escape_output_template(output));
        args.push(output_arg);
        args.push(input.into());
        args
    }
}

/// Escape `%` as `%%`. Ghostscript expands `-sOutputFile` like `printf`,
/// so `scan%d.pdf` would otherwise become one file per page.
fn escape_output_template(path: &Path) -> OsString {
    let mut escaped = OsString::new();
    let bytes = path.as_os_str().as_encoded_bytes();
    for (i, part) in bytes.split(|&b| b == b'%').enumerate() {
        if i > 0 {
            escaped.push("%%");
        }
        // SAFETY: We split on an ASCII byte, which always leaves valid
        // encoded pieces of the original `OsStr`.
        escaped.push(unsafe { OsStr::from_encoded_bytes_unchecked(part) });
    }
    escaped
}

#[async_trait]
impl Compressor for GhostscriptCompressor {
    #[instrument(level = "debug", skip_all, fields(input = %input.display()))]
    async fn compress(&self, input: &Path, output: &Path) -> Result<()> {
        self.tool.run(&self.args(input, output)).await
    }
}
