//! Amazon S3 storage for profile and product images.
//!
//! Objects are written with `PutObject` and removed with `DeleteObject`, both
//! signed with AWS Signature V4. Objects are served from the bucket's public
//! virtual-hosted URL.

mod image;
pub mod sigv4;

pub use image::{ImageFormat, MAX_IMAGE_BYTES, validate_image};

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use befit_core::{ProductId, UserId};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::S3Config;

use sigv4::{SignedRequest, Signer, sha256_hex};

/// Errors that can occur when storing objects.
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// S3 answered with an error status.
    #[error("S3 error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Upload has no bytes.
    #[error("empty upload")]
    EmptyUpload,

    /// Upload exceeds the size limit.
    #[error("upload too large: {0} bytes")]
    TooLarge(usize),

    /// Upload is not JPEG, PNG, or WEBP.
    #[error("unsupported image format")]
    UnsupportedFormat,
}

impl StorageError {
    /// HTTP status to answer with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::EmptyUpload | Self::UnsupportedFormat => StatusCode::BAD_REQUEST,
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Http(_) | Self::Api { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message safe to show the client.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::EmptyUpload => "Uploaded file is empty".to_string(),
            Self::TooLarge(_) => "Image exceeds the 5 MB limit".to_string(),
            Self::UnsupportedFormat => "Only JPEG, PNG and WEBP images are allowed".to_string(),
            Self::Http(_) | Self::Api { .. } => "External service error".to_string(),
        }
    }
}

/// Who an uploaded image belongs to; decides the key prefix.
#[derive(Debug, Clone, Copy)]
pub enum ImageOwner {
    Profile(UserId),
    Product(ProductId),
}

impl ImageOwner {
    /// Object key for a fresh upload.
    #[must_use]
    pub fn object_key(self, format: ImageFormat) -> String {
        let name = Uuid::new_v4();
        let ext = format.extension();
        match self {
            Self::Profile(id) => format!("profile_images/{id}/{name}.{ext}"),
            Self::Product(id) => format!("product_images/{id}/{name}.{ext}"),
        }
    }
}

/// S3 bucket client.
#[derive(Clone)]
pub struct S3Client {
    inner: Arc<S3ClientInner>,
}

struct S3ClientInner {
    client: reqwest::Client,
    host: String,
    region: String,
    access_key_id: String,
    secret_access_key: SecretString,
}

impl S3Client {
    /// Create a new S3 client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &S3Config) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(S3ClientInner {
                client,
                host: format!("{}.s3.{}.amazonaws.com", config.bucket, config.region),
                region: config.region.clone(),
                access_key_id: config.access_key_id.clone(),
                secret_access_key: config.secret_access_key.clone(),
            }),
        })
    }

    /// Public URL of an object.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        public_url(&self.inner.host, key)
    }

    /// Object key behind one of this bucket's public URLs.
    #[must_use]
    pub fn key_from_url(&self, url: &str) -> Option<String> {
        key_from_url(&self.inner.host, url)
    }

    fn signer(&self) -> Signer<'_> {
        Signer {
            access_key_id: &self.inner.access_key_id,
            secret_access_key: self.inner.secret_access_key.expose_secret(),
            region: &self.inner.region,
        }
    }

    /// Validate and upload an image. Returns its public URL.
    ///
    /// # Errors
    ///
    /// Returns a validation variant for bad uploads, or an HTTP/API error.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_image(
        &self,
        owner: ImageOwner,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let format = validate_image(&bytes)?;
        let key = owner.object_key(format);
        self.put_object(&key, bytes, format.content_type()).await?;
        info!(key = %key, "Uploaded image");
        Ok(self.public_url(&key))
    }

    /// Write an object.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Api` for a non-success status.
    #[instrument(skip(self, body), fields(size = body.len()))]
    pub async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let path = format!("/{key}");
        let payload_hash = sha256_hex(&body);
        let request = SignedRequest {
            method: "PUT",
            host: &self.inner.host,
            path: &path,
            payload_hash: &payload_hash,
            extra_headers: &[("content-type", content_type)],
        };
        let signed = self.signer().sign(&request, chrono::Utc::now());

        let response = self
            .inner
            .client
            .put(format!("https://{}{}", self.inner.host, sigv4::encode_path(&path)))
            .header("Authorization", signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256)
            .header("Content-Type", content_type)
            .body(body)
            .send()
            .await?;

        check(response).await
    }

    /// Delete an object. Missing objects are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Api` for a non-success status.
    #[instrument(skip(self))]
    pub async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        let path = format!("/{key}");
        let payload_hash = sha256_hex(b"");
        let request = SignedRequest {
            method: "DELETE",
            host: &self.inner.host,
            path: &path,
            payload_hash: &payload_hash,
            extra_headers: &[],
        };
        let signed = self.signer().sign(&request, chrono::Utc::now());

        let response = self
            .inner
            .client
            .delete(format!("https://{}{}", self.inner.host, sigv4::encode_path(&path)))
            .header("Authorization", signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256)
            .send()
            .await?;

        check(response).await
    }

    /// Delete the object behind a public URL, logging instead of failing.
    ///
    /// Used after the database no longer references the object.
    pub async fn delete_by_url(&self, url: &str) {
        let Some(key) = self.key_from_url(url) else {
            warn!(url, "Not an object of this bucket; skipping delete");
            return;
        };
        if let Err(e) = self.delete_object(&key).await {
            warn!(error = %e, key = %key, "Failed to delete object");
        }
    }
}

async fn check(response: reqwest::Response) -> Result<(), StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}

fn public_url(host: &str, key: &str) -> String {
    format!("https://{host}/{key}")
}

fn key_from_url(host: &str, url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    if parsed.host_str() != Some(host) {
        return None;
    }
    let key = parsed.path().trim_start_matches('/');
    (!key.is_empty()).then(|| key.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const HOST: &str = "befit-media.s3.us-east-2.amazonaws.com";

    #[test]
    fn test_object_keys() {
        let key = ImageOwner::Profile(UserId::new(12)).object_key(ImageFormat::Png);
        assert!(key.starts_with("profile_images/12/"));
        assert!(key.ends_with(".png"));

        let key = ImageOwner::Product(ProductId::new(3)).object_key(ImageFormat::Jpeg);
        assert!(key.starts_with("product_images/3/"));
        assert!(key.ends_with(".jpg"));
    }

    #[test]
    fn test_public_url_round_trips_to_key() {
        let url = public_url(HOST, "product_images/3/abc.webp");
        assert_eq!(
            url,
            "https://befit-media.s3.us-east-2.amazonaws.com/product_images/3/abc.webp"
        );
        assert_eq!(
            key_from_url(HOST, &url).as_deref(),
            Some("product_images/3/abc.webp")
        );
    }

    #[test]
    fn test_key_from_foreign_url_is_none() {
        assert_eq!(key_from_url(HOST, "https://cdn.example.com/a.png"), None);
        assert_eq!(key_from_url(HOST, "not a url"), None);
        assert_eq!(key_from_url(HOST, &format!("https://{HOST}/")), None);
    }

    #[test]
    fn test_storage_error_statuses() {
        assert_eq!(StorageError::TooLarge(10).status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(StorageError::UnsupportedFormat.status(), StatusCode::BAD_REQUEST);
        let err = StorageError::Api {
            status: 403,
            message: "AccessDenied".to_string(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.client_message(), "External service error");
    }
}
