//! Image upload trigger for the reconstruction job.

use super::{UPLOAD_PATH, endpoint};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use tracing::{info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No images provided")]
    NoImages,
    #[error("Upload request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Upload rejected with HTTP {status}: {detail}")]
    Rejected { status: u16, detail: String },
}

/// Multipart field every image part is sent under.
const IMAGES_FIELD: &str = "images";

#[async_trait]
pub trait SplatUploader: Send + Sync {
    /// Submits the images. Success means the job was accepted, not finished.
    async fn upload(&self, images: Vec<Bytes>) -> Result<(), UploadError>;
}

/// Posts images as `multipart/form-data` to `{api}/api/splat`, one `images`
/// part per file.
pub struct HttpUploader {
    client: reqwest::Client,
    url: String,
}

impl HttpUploader {
    pub fn new(api_base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: endpoint(api_base_url, UPLOAD_PATH),
        }
    }
}

fn image_form(images: Vec<Bytes>) -> Form {
    images
        .into_iter()
        .enumerate()
        .fold(Form::new(), |form, (index, image)| {
            let part = Part::bytes(image.to_vec()).file_name(format!("image-{}", index + 1));
            form.part(IMAGES_FIELD, part)
        })
}

#[async_trait]
impl SplatUploader for HttpUploader {
    #[instrument(name = "splat_upload", skip_all, fields(url = %self.url, count = images.len()))]
    async fn upload(&self, images: Vec<Bytes>) -> Result<(), UploadError> {
        if images.is_empty() {
            return Err(UploadError::NoImages);
        }
        let total_kb: usize = images.iter().map(|img| img.len() / 1024).sum();

        let response = self
            .client
            .post(&self.url)
            .multipart(image_form(images))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }
        info!(total_kb, "Images uploaded, reconstruction started");
        Ok(())
    }
}
