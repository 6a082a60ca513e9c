use common::{
    error::AppError,
    utils::{
        config::AppConfig,
        file_types::{has_accepted_extension, normalize_extension},
    },
};
use tempfile::NamedTempFile;

pub const NO_FILES_SELECTED: &str = "no files were selected";

/// One multipart entry, spooled to a temporary file by the extractor.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub contents: NamedTempFile,
}

#[derive(Debug, Default)]
pub struct FilteredUploads {
    pub accepted: Vec<UploadedFile>,
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FileFilter {
    accepted_extensions: Vec<String>,
    max_files: usize,
}

impl FileFilter {
    /// Extensions are stored without their leading dot, lowercased and deduplicated.
    pub fn new(accepted_extensions: Vec<String>, max_files: usize) -> Self {
        let mut normalized: Vec<String> = Vec::with_capacity(accepted_extensions.len());
        for ext in accepted_extensions.iter().filter_map(|ext| normalize_extension(ext)) {
            if !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        Self {
            accepted_extensions: normalized,
            max_files,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.accepted_extensions.clone(), config.ingest_max_files)
    }

    pub fn accepted_extensions(&self) -> &[String] {
        &self.accepted_extensions
    }

    /// Checks the selection as a whole before anything is filtered or written.
    pub fn validate_selection(&self, files: &[UploadedFile]) -> Result<(), AppError> {
        match files {
            [] => Err(AppError::Validation(NO_FILES_SELECTED.into())),
            [only] if only.file_name.trim().is_empty() => {
                Err(AppError::Validation(NO_FILES_SELECTED.into()))
            }
            _ if files.len() > self.max_files => Err(AppError::Validation(format!(
                "too many files: {} uploaded, at most {} allowed per request",
                files.len(),
                self.max_files
            ))),
            _ => Ok(()),
        }
    }

    /// Splits uploads into accepted and rejected, keeping input order in both.
    /// Accepted names are reduced to their final path component.
    pub fn partition(&self, files: Vec<UploadedFile>) -> FilteredUploads {
        let mut filtered = FilteredUploads::default();

        for mut file in files {
            match sanitize_file_name(&file.file_name) {
                Some(name) if has_accepted_extension(&name, &self.accepted_extensions) => {
                    file.file_name = name;
                    filtered.accepted.push(file);
                }
                _ => filtered.rejected.push(file.file_name),
            }
        }

        filtered
    }
}

/// Final path component of a client-supplied name, or `None` when nothing usable remains.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}
