use crate::{ChatError, SessionOptions, UploadedDocument};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Reads the given files in order; directories are expanded to the PDFs they
/// contain, recursively. Upload limits are checked against file metadata
/// before any file is read.
pub fn load_documents<P: AsRef<Path>>(
    paths: &[P],
    options: &SessionOptions,
) -> Result<Vec<UploadedDocument>, ChatError> {
    let mut files = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            let found = discover_pdf_files(path);
            if found.is_empty() {
                return Err(ChatError::InvalidConfig(format!(
                    "no pdf files found in {}",
                    path.display()
                )));
            }
            files.extend(found);
        } else {
            files.push(path.to_path_buf());
        }
    }

    enforce_document_count(files.len(), options)?;

    let mut total_bytes = 0u64;
    for file in &files {
        total_bytes = total_bytes.saturating_add(fs::metadata(file)?.len());
    }
    enforce_upload_bytes(total_bytes, options)?;

    files
        .iter()
        .map(|file| UploadedDocument::from_path(file))
        .collect()
}

pub fn check_upload_limits(
    documents: &[UploadedDocument],
    options: &SessionOptions,
) -> Result<(), ChatError> {
    enforce_document_count(documents.len(), options)?;

    let total_bytes: usize = documents.iter().map(|document| document.bytes.len()).sum();
    enforce_upload_bytes(total_bytes as u64, options)
}

fn enforce_document_count(count: usize, options: &SessionOptions) -> Result<(), ChatError> {
    if count > options.max_documents {
        return Err(ChatError::UploadTooLarge {
            details: format!(
                "{count} documents uploaded, at most {} allowed",
                options.max_documents
            ),
        });
    }
    Ok(())
}

fn enforce_upload_bytes(total_bytes: u64, options: &SessionOptions) -> Result<(), ChatError> {
    if total_bytes > options.max_upload_bytes as u64 {
        return Err(ChatError::UploadTooLarge {
            details: format!(
                "{total_bytes} bytes uploaded, at most {} allowed",
                options.max_upload_bytes
            ),
        });
    }
    Ok(())
}
