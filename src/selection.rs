//! Collecting the files to convert.
//!
//! The converter itself does no validation, so everything it is handed must
//! come through a [`FileSelection`] first.

use std::collections::HashSet;

use crate::prelude::*;

/// Why was a path rejected?
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Nothing exists at this path.
    Missing,
    /// Something exists, but it isn't a regular file.
    NotAFile,
    /// The file name doesn't end in `.pdf`.
    NotPdf,
    /// This file was already selected.
    Duplicate,
}

/// An ordered, de-duplicated list of PDF files waiting to be converted.
#[derive(Debug, Default)]
pub struct FileSelection {
    files: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl FileSelection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path if it names an existing regular file ending in `.pdf` (in any
    /// case). Rejected paths are logged and skipped.
    pub async fn add(&mut self, path: impl Into<PathBuf>) -> Result<(), Rejection> {
        let path = path.into();
        let rejection = match tokio::fs::metadata(&path).await {
            Err(_) => Some(Rejection::Missing),
            Ok(meta) if !meta.is_file() => Some(Rejection::NotAFile),
            Ok(_) if !has_pdf_extension(&path) => Some(Rejection::NotPdf),
            Ok(_) => None,
        };
        if let Some(rejection) = rejection {
            warn!(path = %path.display(), ?rejection, "Skipping file");
            return Err(rejection);
        }

        // Compare canonical paths, so `./a.pdf` and `a.pdf` count as one file.
        let key = tokio::fs::canonicalize(&path)
            .await
            .unwrap_or_else(|_| path.clone());
        if !self.seen.insert(key) {
            debug!(path = %path.display(), "Skipping duplicate file");
            return Err(Rejection::Duplicate);
        }
        self.files.push(path);
        Ok(())
    }

    /// Add several paths, returning how many were accepted.
    pub async fn extend<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut accepted = 0;
        for path in paths {
            if self.add(path).await.is_ok() {
                accepted += 1;
            }
        }
        accepted
    }

    /// The currently selected files.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Number of selected files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Is the selection empty?
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Hand off the selected files and clear the selection.
    pub fn take(&mut self) -> Vec<PathBuf> {
        self.seen.clear();
        std::mem::take(&mut self.files)
    }
}

/// Does `path` end in `.pdf`, ignoring case?
fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
