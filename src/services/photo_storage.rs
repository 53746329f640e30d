//! Meter photo storage
//!
//! Photos are downscaled to at most 1280px wide and re-encoded as JPEG at
//! quality 70 before they leave the server.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType};
use reqwest::{multipart::Form, Client};
use serde::Deserialize;

use crate::config::PHOTO_TIMEOUT;
use crate::models::meter::PhotoUpload;

pub const MAX_PHOTO_WIDTH: u32 = 1280;
pub const JPEG_QUALITY: u8 = 70;

/// Reference to a stored photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPhoto {
    pub file_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoError {
    /// Bytes are not a readable image
    Decode(String),
    Upload(String),
    Delete(String),
}

impl std::fmt::Display for PhotoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhotoError::Decode(msg) => write!(f, "Invalid image: {}", msg),
            PhotoError::Upload(msg) => write!(f, "Photo upload failed: {}", msg),
            PhotoError::Delete(msg) => write!(f, "Photo delete failed: {}", msg),
        }
    }
}

impl std::error::Error for PhotoError {}

#[async_trait]
pub trait PhotoStorage: Send + Sync {
    async fn upload(&self, photo: PhotoUpload) -> Result<UploadedPhoto, PhotoError>;

    async fn delete(&self, file_id: &str) -> Result<(), PhotoError>;
}

/// Downscale wide images and re-encode as JPEG
pub fn prepare_photo(bytes: &[u8]) -> Result<Vec<u8>, PhotoError> {
    let mut img = image::load_from_memory(bytes).map_err(|e| PhotoError::Decode(e.to_string()))?;

    if img.width() > MAX_PHOTO_WIDTH {
        let height = ((img.height() as u64 * MAX_PHOTO_WIDTH as u64) / img.width() as u64).max(1) as u32;
        img = img.resize_exact(MAX_PHOTO_WIDTH, height, FilterType::Lanczos3);
    }

    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| PhotoError::Decode(e.to_string()))?;
    Ok(out)
}

/// Run image work off the async workers; a panicked task fails the upload
async fn run_blocking<F>(work: F) -> Result<Vec<u8>, PhotoError>
where
    F: FnOnce() -> Result<Vec<u8>, PhotoError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PhotoError::Upload(format!("image task failed: {}", e)))?
}

/// File name with its extension replaced by `.jpg`
pub fn jpeg_file_name(original: &str) -> String {
    let stem = original
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(original);
    let stem = if stem.trim().is_empty() { "photo" } else { stem };
    format!("{}.jpg", stem)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageKitUploadResponse {
    file_id: String,
    url: String,
}

/// ImageKit media API client
#[derive(Clone)]
pub struct ImageKitPhotoStorage {
    client: Client,
    private_key: String,
    upload_url: String,
    api_url: String,
}

impl ImageKitPhotoStorage {
    pub fn new(private_key: String, upload_url: String, api_url: String) -> Self {
        let client = Client::builder()
            .timeout(PHOTO_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            private_key,
            upload_url,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PhotoStorage for ImageKitPhotoStorage {
    async fn upload(&self, photo: PhotoUpload) -> Result<UploadedPhoto, PhotoError> {
        let original_size = photo.bytes.len();
        let bytes = photo.bytes;
        let jpeg = run_blocking(move || prepare_photo(&bytes)).await?;

        let file_name = jpeg_file_name(&photo.file_name);
        tracing::debug!(
            file_name = %file_name,
            original_size,
            compressed_size = jpeg.len(),
            "Uploading photo"
        );

        let form = Form::new()
            .text("file", format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg)))
            .text("fileName", file_name.clone())
            .text("useUniqueFileName", "true");

        let response = self
            .client
            .post(&self.upload_url)
            .basic_auth(&self.private_key, Some(""))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PhotoError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PhotoError::Upload(format!("ImageKit error {}: {}", status, body)));
        }

        let uploaded: ImageKitUploadResponse = response
            .json()
            .await
            .map_err(|e| PhotoError::Upload(e.to_string()))?;

        tracing::info!(file_id = %uploaded.file_id, file_name = %file_name, "Photo uploaded");

        Ok(UploadedPhoto {
            file_id: uploaded.file_id,
            url: uploaded.url,
        })
    }

    async fn delete(&self, file_id: &str) -> Result<(), PhotoError> {
        let url = format!("{}/files/{}", self.api_url, file_id);
        let response = self
            .client
            .delete(&url)
            .basic_auth(&self.private_key, Some(""))
            .send()
            .await
            .map_err(|e| PhotoError::Delete(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PhotoError::Delete(format!("ImageKit error {}: {}", status, body)));
        }

        tracing::info!(file_id = %file_id, "Photo deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([(x % 255) as u8, (y % 255) as u8, 128]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_panicked_image_task_is_an_upload_failure() {
        let err = run_blocking(|| panic!("encoder crashed")).await.unwrap_err();
        assert!(matches!(err, PhotoError::Upload(_)), "{:?}", err);

        let ok = run_blocking(|| Ok(vec![1, 2, 3])).await.unwrap();
        assert_eq!(ok, vec![1, 2, 3]);
    }

    #[test]
    fn test_wide_photo_is_downscaled_to_jpeg() {
        let out = prepare_photo(&png(2000, 1000)).unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width(), 1280);
        assert_eq!(decoded.height(), 640);
    }

    #[test]
    fn test_narrow_photo_keeps_dimensions() {
        let out = prepare_photo(&png(640, 480)).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 480));
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let err = prepare_photo(b"not an image").unwrap_err();
        assert!(matches!(err, PhotoError::Decode(_)));
    }

    #[test]
    fn test_jpeg_file_name() {
        assert_eq!(jpeg_file_name("meter.png"), "meter.jpg");
        assert_eq!(jpeg_file_name("IMG_001.HEIC.webp"), "IMG_001.HEIC.jpg");
        assert_eq!(jpeg_file_name("noext"), "noext.jpg");
        assert_eq!(jpeg_file_name(""), "photo.jpg");
    }
}
