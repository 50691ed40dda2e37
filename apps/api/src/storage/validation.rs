use bytes::Bytes;

use crate::errors::AppError;

pub const MAX_RESUME_BYTES: usize = 16 * 1024 * 1024;
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

const JD_MIN_CHARS: usize = 20;
const JD_MAX_CHARS: usize = 10_000;

/// An uploaded resume that passed validation.
#[derive(Debug, Clone)]
pub struct ResumeFile {
    /// Sanitized name, safe to forward and store.
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ResumeFile {
    /// Display title: the file name without its extension.
    pub fn title(&self) -> String {
        match self.file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => self.file_name.clone(),
        }
    }

    pub fn size(&self) -> i64 {
        self.bytes.len() as i64
    }
}

/// PDF only, non-empty, at most 16 MB.
pub fn validate_resume_upload(
    file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: Bytes,
) -> Result<ResumeFile, AppError> {
    let file_name = file_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::Validation("No file selected".to_string()))?;

    if !has_pdf_extension(file_name) {
        return Err(AppError::Validation("Only PDF files are allowed".to_string()));
    }

    if let Some(ct) = content_type {
        let ct = ct.to_ascii_lowercase();
        if !(ct.contains("pdf") || ct == "application/octet-stream") {
            return Err(AppError::Validation(
                "Invalid file type. Please select a PDF file".to_string(),
            ));
        }
    }

    if bytes.is_empty() {
        return Err(AppError::Validation("File is empty".to_string()));
    }

    if bytes.len() > MAX_RESUME_BYTES {
        return Err(AppError::Validation(format!(
            "File size too large. Maximum allowed: {}MB",
            MAX_RESUME_BYTES / (1024 * 1024)
        )));
    }

    let file_name = sanitize_filename(file_name);
    if !has_pdf_extension(&file_name) {
        return Err(AppError::Validation("Invalid file name".to_string()));
    }

    Ok(ResumeFile {
        file_name,
        content_type: PDF_CONTENT_TYPE.to_string(),
        bytes,
    })
}

/// Optional; when given it must be between 20 and 10 000 characters.
pub fn validate_job_description(job_description: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(jd) = job_description.map(str::trim).filter(|jd| !jd.is_empty()) else {
        return Ok(None);
    };

    let len = jd.chars().count();
    if len < JD_MIN_CHARS {
        return Err(AppError::Validation(format!(
            "Job description too short. Minimum length: {JD_MIN_CHARS} characters"
        )));
    }
    if len > JD_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "Job description too long. Maximum length: {JD_MAX_CHARS} characters"
        )));
    }
    Ok(Some(jd.to_string()))
}

fn has_pdf_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
}

/// Drops path components and anything outside `[A-Za-z0-9._-]`; whitespace
/// becomes `_`. Leading dots and underscores are stripped.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    cleaned.trim_start_matches(['.', '_']).to_string()
}
