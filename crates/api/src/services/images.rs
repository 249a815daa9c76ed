//! Product image uploads.
//!
//! Files are checked against the upload policy (type and size) and then sent
//! to the image host concurrently. The host returns one public URL per file.
//!
//! # Cloudinary
//!
//! - Endpoint: `https://api.cloudinary.com/v1_1/<cloud>/image/upload`
//! - Authentication: signed upload; the signature is the SHA-256 hex of the
//!   sorted signed parameters followed by the API secret

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join_all;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::CloudinaryConfig;
use crate::models::product::MAX_IMAGES;

/// Cloudinary API base URL.
const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Largest accepted file.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Accepted file extensions; the MIME subtype must be one of these too.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpeg", "jpg", "png", "webp"];

/// Errors that can occur while uploading images.
#[derive(Debug, Error)]
pub enum ImageHostError {
    /// The file breaks the upload policy.
    #[error("{0}")]
    Rejected(String),

    /// No image host credentials are configured.
    #[error("image uploads are not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A file received from a multipart request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl ImageUpload {
    /// Check the file against the upload policy.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` for empty or oversized files and for extensions or
    /// MIME types outside [`ALLOWED_EXTENSIONS`].
    pub fn check_policy(&self) -> Result<(), ImageHostError> {
        if self.data.is_empty() {
            return Err(ImageHostError::Rejected(format!(
                "{} is empty",
                self.file_name
            )));
        }
        if self.data.len() > MAX_UPLOAD_BYTES {
            return Err(ImageHostError::Rejected(format!(
                "{} exceeds the 5MB limit",
                self.file_name
            )));
        }

        let extension = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let subtype = self
            .content_type
            .strip_prefix("image/")
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let allowed = |s: &str| ALLOWED_EXTENSIONS.contains(&s);
        if !allowed(&extension) || !allowed(&subtype) {
            return Err(ImageHostError::Rejected(
                "Only image files (jpeg, jpg, png, webp) are allowed".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Somewhere to put product images.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store one file and return its public URL.
    async fn upload(&self, file: ImageUpload) -> Result<String, ImageHostError>;
}

/// Check every file, then upload them all concurrently.
///
/// URLs come back in the same order as `files`.
///
/// # Errors
///
/// Returns `Rejected` if there are more than [`MAX_IMAGES`] files or any file
/// breaks the policy (before anything is uploaded), otherwise the first
/// upload error.
#[instrument(skip_all, fields(files = files.len()))]
pub async fn upload_all(
    host: &dyn ImageHost,
    files: Vec<ImageUpload>,
) -> Result<Vec<String>, ImageHostError> {
    if files.len() > MAX_IMAGES {
        return Err(ImageHostError::Rejected(format!(
            "Maximum {MAX_IMAGES} images allowed"
        )));
    }
    for file in &files {
        file.check_policy()?;
    }

    try_join_all(files.into_iter().map(|file| host.upload(file))).await
}

/// Image host used when no credentials are configured; rejects every upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledImageHost;

#[async_trait]
impl ImageHost for DisabledImageHost {
    async fn upload(&self, _file: ImageUpload) -> Result<String, ImageHostError> {
        Err(ImageHostError::NotConfigured)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Cloudinary upload API client.
#[derive(Clone)]
pub struct CloudinaryClient {
    inner: Arc<CloudinaryClientInner>,
}

struct CloudinaryClientInner {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
    folder: String,
}

impl CloudinaryClient {
    /// Create a new Cloudinary client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CloudinaryConfig) -> Result<Self, ImageHostError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(CloudinaryClientInner {
                client,
                cloud_name: config.cloud_name.clone(),
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.clone(),
                folder: config.folder.clone(),
            }),
        })
    }

    /// Sign upload parameters: `k1=v1&k2=v2` sorted by key, then the secret.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut params = params.to_vec();
        params.sort_unstable_by_key(|(k, _)| *k);
        let to_sign = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.inner.api_secret.expose_secret().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Debug for CloudinaryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryClient")
            .field("cloud_name", &self.inner.cloud_name)
            .field("folder", &self.inner.folder)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    #[instrument(skip(self, file), fields(file = %file.file_name, bytes = file.data.len()))]
    async fn upload(&self, file: ImageUpload) -> Result<String, ImageHostError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("folder", self.inner.folder.as_str()),
            ("timestamp", timestamp.as_str()),
        ]);

        let part = Part::bytes(file.data)
            .file_name(file.file_name)
            .mime_str(&file.content_type)?;
        let form = Form::new()
            .text("api_key", self.inner.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.inner.folder.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
            .part("file", part);

        let url = format!("{API_BASE}/{}/image/upload", self.inner.cloud_name);
        let response = self.inner.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if status.is_success() {
            let body: UploadResponse = response
                .json()
                .await
                .map_err(|e| ImageHostError::Parse(format!("Failed to parse response: {e}")))?;
            debug!(url = %body.secure_url, "Image uploaded");
            return Ok(body.secure_url);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|e| e.error.message)
            .unwrap_or(text);
        Err(ImageHostError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn upload(name: &str, content_type: &str, len: usize) -> ImageUpload {
        ImageUpload {
            file_name: name.to_owned(),
            content_type: content_type.to_owned(),
            data: vec![0xAB; len],
        }
    }

    struct EchoHost;

    #[async_trait]
    impl ImageHost for EchoHost {
        async fn upload(&self, file: ImageUpload) -> Result<String, ImageHostError> {
            Ok(format!("https://cdn.example/{}", file.file_name))
        }
    }

    #[test]
    fn test_policy_accepts_allowed_types() {
        assert!(upload("a.png", "image/png", 10).check_policy().is_ok());
        assert!(upload("a.JPG", "image/jpeg", 10).check_policy().is_ok());
        assert!(upload("a.webp", "image/webp", 10).check_policy().is_ok());
    }

    #[test]
    fn test_policy_checks_extension_and_mime() {
        assert!(upload("a.gif", "image/gif", 10).check_policy().is_err());
        assert!(upload("a.png", "text/plain", 10).check_policy().is_err());
        assert!(upload("a.exe", "image/png", 10).check_policy().is_err());
        assert!(upload("noext", "image/png", 10).check_policy().is_err());
    }

    #[test]
    fn test_policy_size_limit() {
        assert!(upload("a.png", "image/png", MAX_UPLOAD_BYTES).check_policy().is_ok());
        assert!(
            upload("a.png", "image/png", MAX_UPLOAD_BYTES + 1)
                .check_policy()
                .is_err()
        );
        assert!(upload("a.png", "image/png", 0).check_policy().is_err());
    }

    #[tokio::test]
    async fn test_upload_all_keeps_order() {
        let files = vec![
            upload("1.png", "image/png", 1),
            upload("2.jpg", "image/jpeg", 1),
        ];
        let urls = upload_all(&EchoHost, files).await.unwrap();
        assert_eq!(
            urls,
            vec!["https://cdn.example/1.png", "https://cdn.example/2.jpg"]
        );
    }

    #[tokio::test]
    async fn test_upload_all_rejects_fourth_image() {
        let files = (0..4)
            .map(|i| upload(&format!("{i}.png"), "image/png", 1))
            .collect();
        assert!(matches!(
            upload_all(&EchoHost, files).await,
            Err(ImageHostError::Rejected(_))
        ));
    }

    #[test]
    fn test_signature_sorts_params() {
        let client = CloudinaryClient::new(&CloudinaryConfig {
            cloud_name: "demo".to_owned(),
            api_key: "1234".to_owned(),
            api_secret: SecretString::from("abcd"),
            folder: "products".to_owned(),
        })
        .unwrap();

        let a = client.sign(&[("timestamp", "1700000000"), ("folder", "products")]);
        let b = client.sign(&[("folder", "products"), ("timestamp", "1700000000")]);
        assert_eq!(a, b);

        let mut hasher = Sha256::new();
        hasher.update(b"folder=products&timestamp=1700000000abcd");
        assert_eq!(a, hex::encode(hasher.finalize()));
    }
}
