//! Image upload checks.

use super::StorageError;

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Formats accepted for profile and product images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// Detect the format from magic bytes.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(&b"WEBP"[..])
        {
            Some(Self::Webp)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

/// Check size and format of an upload.
///
/// # Errors
///
/// Returns `StorageError::EmptyUpload`, `StorageError::TooLarge`, or
/// `StorageError::UnsupportedFormat`.
pub fn validate_image(bytes: &[u8]) -> Result<ImageFormat, StorageError> {
    if bytes.is_empty() {
        return Err(StorageError::EmptyUpload);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(StorageError::TooLarge(bytes.len()));
    }
    ImageFormat::detect(bytes).ok_or(StorageError::UnsupportedFormat)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_formats() {
        assert_eq!(
            ImageFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::detect(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00]),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::detect(b"RIFF\x10\x00\x00\x00WEBPVP8 "),
            Some(ImageFormat::Webp)
        );
        assert_eq!(ImageFormat::detect(b"GIF89a"), None);
        assert_eq!(ImageFormat::detect(b"RIFF\x10\x00\x00\x00WAVE"), None);
    }

    #[test]
    fn test_validate_image_limits() {
        assert!(matches!(validate_image(&[]), Err(StorageError::EmptyUpload)));
        assert!(matches!(
            validate_image(b"not an image"),
            Err(StorageError::UnsupportedFormat)
        ));

        let mut big = vec![0xFF, 0xD8, 0xFF];
        big.resize(MAX_IMAGE_BYTES + 1, 0);
        assert!(matches!(validate_image(&big), Err(StorageError::TooLarge(_))));

        let mut exact = vec![0xFF, 0xD8, 0xFF];
        exact.resize(MAX_IMAGE_BYTES, 0);
        assert_eq!(validate_image(&exact).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_extension_and_content_type() {
        assert_eq!(ImageFormat::Webp.extension(), "webp");
        assert_eq!(ImageFormat::Png.content_type(), "image/png");
    }
}
