//! Reading `multipart/form-data` bodies.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::AppError;
use crate::storage::MAX_IMAGE_BYTES;
use crate::validation::ValidationError;

/// Request body limit for routes that accept an image upload.
pub const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

/// Text fields and file parts of a multipart body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
}

impl MultipartForm {
    /// Drain the body. Parts with a filename are kept as files.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for malformed bodies.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if field.file_name().is_some() {
                let bytes = field.bytes().await.map_err(malformed)?;
                if !bytes.is_empty() {
                    form.files.insert(name, bytes.to_vec());
                }
            } else {
                let text = field.text().await.map_err(malformed)?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    /// A non-empty, trimmed text field.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// A text field that must be present.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the field.
    pub fn required(&self, name: &'static str) -> Result<&str, ValidationError> {
        self.text(name)
            .ok_or_else(|| ValidationError::new(name, "field required"))
    }

    /// Remove and return a file part.
    pub fn take_file(&mut self, name: &str) -> Option<Vec<u8>> {
        self.files.remove(name)
    }

    /// A boolean field; `true`, `1` and `on` are true.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.text(name)
            .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "on"))
    }
}

fn malformed(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid form data: {}", err.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_flags() {
        let mut form = MultipartForm::default();
        form.fields.insert("name".into(), "  Ana ".into());
        form.fields.insert("blank".into(), "   ".into());
        form.fields.insert("is_primary".into(), "On".into());

        assert_eq!(form.text("name"), Some("Ana"));
        assert_eq!(form.text("blank"), None);
        assert!(form.required("blank").is_err());
        assert!(form.flag("is_primary"));
        assert!(!form.flag("missing"));
    }
}
