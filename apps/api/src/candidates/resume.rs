//! Résumé upload checks and PDF text extraction.

use anyhow::anyhow;

use crate::errors::AppError;

pub const MAX_RESUME_BYTES: usize = 10 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];

/// Checks extension and size, returning the content type to store.
pub fn check_upload(file_name: &str, len: usize) -> Result<&'static str, AppError> {
    if len == 0 {
        return Err(AppError::Validation("The uploaded file is empty".to_string()));
    }
    if len > MAX_RESUME_BYTES {
        return Err(AppError::Validation(
            "File too large. Maximum size is 10MB".to_string(),
        ));
    }
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AppError::Validation(
            "Invalid file type. Only PDF, DOC, DOCX files are allowed".to_string(),
        ));
    }
    Ok(match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        _ => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    })
}

pub fn is_pdf_key(key: &str) -> bool {
    key.to_ascii_lowercase().ends_with(".pdf")
}

/// Extracts text from a PDF on the blocking pool.
pub async fn pdf_text(bytes: Vec<u8>) -> Result<String, AppError> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| anyhow!("PDF extraction task failed: {e}"))?
        .map_err(|e| AppError::Validation(format!("Could not read text from the PDF: {e}")))?;
    Ok(text.trim().to_string())
}
