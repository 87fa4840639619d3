//! The per-file OCR, compress and replace pipeline.
//!
//! For each file we:
//!
//! 1. OCR `<stem><suffix>` into a sibling `<stem>_ocr<suffix>`.
//! 2. Compress that into a sibling `<stem>_compressed<suffix>`.
//! 3. Delete the OCR sibling and rename the compressed sibling over the
//!    original.
//!
//! The original is only ever replaced by a rename within its own directory, so
//! it is always either the old file or the complete new one, with the old
//! file's permissions. On any failure we remove whatever siblings we created
//! and leave the original alone.

use std::{ffi::OsString, io, sync::Arc};

use crate::{
    config::ConverterConfig,
    engines::{
        Compressor, OcrEngine, ghostscript::GhostscriptCompressor,
        ocrmypdf::OcrMyPdfEngine,
    },
    prelude::*,
};

/// Tag appended to the stem of the OCR output.
pub const OCR_TAG: &str = "ocr";

/// Tag appended to the stem of the compressed output.
pub const COMPRESSED_TAG: &str = "compressed";

/// Build the path `<stem>_<tag><suffix>` in the same directory as `file`.
pub fn sibling_path(file: &Path, tag: &str) -> PathBuf {
    let mut name = file.file_stem().map(OsString::from).unwrap_or_default();
    name.push("_");
    name.push(tag);
    if let Some(ext) = file.extension() {
        name.push(".");
        name.push(ext);
    }
    file.with_file_name(name)
}

/// Delete a temporary file if it exists. Failures are logged, not returned.
async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed temporary file"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            path = %path.display(),
            "Could not remove temporary file: {}", err
        ),
    }
}

/// Converts one PDF at a time, replacing it in place.
pub struct FileConverter {
    ocr: Arc<dyn OcrEngine>,
    compressor: Arc<dyn Compressor>,
}

impl FileConverter {
    /// Create a converter from explicit engines.
    pub fn new(ocr: Arc<dyn OcrEngine>, compressor: Arc<dyn Compressor>) -> Self {
        Self { ocr, compressor }
    }

    /// Create a converter which runs `ocrmypdf` and Ghostscript.
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(
            Arc::new(OcrMyPdfEngine::new(&config.ocr)),
            Arc::new(GhostscriptCompressor::new(&config.compress)),
        )
    }

    /// OCR and compress `file`, replacing it in place.
    ///
    /// Returns `true` on success. On failure, the reason is logged, `file` is
    /// left untouched and no sibling files remain. The return value doesn't say
    /// which step failed.
    #[instrument(level = "debug", skip_all, fields(path = %file.display()))]
    pub async fn convert_and_compress(&self, file: &Path) -> bool {
        let file = match tokio::fs::canonicalize(file).await {
            Ok(file) => file,
            Err(err) => {
                error!("Error converting {}: {}", file.display(), err);
                return false;
            }
        };
        let ocr_file = sibling_path(&file, OCR_TAG);
        let compressed_file = sibling_path(&file, COMPRESSED_TAG);
        for sibling in [&ocr_file, &compressed_file] {
            if tokio::fs::try_exists(sibling).await.unwrap_or(false) {
                warn!(
                    path = %sibling.display(),
                    "Overwriting existing file, which will be deleted afterwards"
                );
            }
        }

        // Step 1: OCR. A killed or crashed engine may leave a partial file.
        if let Err(err) = self.ocr.ocr(&file, &ocr_file).await {
            remove_if_exists(&ocr_file).await;
            error!("Error converting {}: {:#}", file.display(), err);
            return false;
        }

        // Step 2: Compress.
        if let Err(err) = self.compressor.compress(&ocr_file, &compressed_file).await {
            remove_if_exists(&compressed_file).await;
            remove_if_exists(&ocr_file).await;
            error!("Error compressing {}: {:#}", ocr_file.display(), err);
            return false;
        }

        // Step 3: Finalize. The new file keeps the original's permissions.
        remove_if_exists(&ocr_file).await;
        let replaced = async {
            let permissions = tokio::fs::metadata(&file).await?.permissions();
            tokio::fs::set_permissions(&compressed_file, permissions).await?;
            tokio::fs::rename(&compressed_file, &file).await
        }
        .await;
        if let Err(err) = replaced {
            remove_if_exists(&compressed_file).await;
            error!("Error replacing {}: {}", file.display(), err);
            return false;
        }

        info!("Converted: {}", file.display());
        true
    }
}
