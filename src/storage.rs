use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use image::{DynamicImage, ImageFormat, imageops::FilterType};

/// Widest image kept on disk; larger uploads are scaled down.
pub const MAX_IMAGE_WIDTH: u32 = 800;

/// URL prefix uploads are served under.
pub const UPLOADS_PREFIX: &str = "/uploads";

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("unsupported image type: {0}")]
    Unsupported(String),

    #[error("image could not be decoded: {0}")]
    Decode(#[source] image::ImageError),

    #[error("image could not be written: {0}")]
    Write(#[source] image::ImageError),

    #[error("upload directory unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("image worker failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Simulated(String),
}

// 1. ImageService Contract
/// ImageService
///
/// Turns an uploaded file into a stored, web-sized image and reports the public path to record
/// on the entity. Handlers only see this trait, so tests swap in [`MockImageStore`].
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Creates the backing directory when missing. Called once at startup.
    async fn ensure_ready(&self) -> Result<(), ImageError>;

    /// Stores `bytes` uploaded as `file_name` and returns its public path.
    async fn store_image(&self, file_name: &str, bytes: Bytes) -> Result<String, ImageError>;
}

/// sanitize_file_name
///
/// Reduces a client-supplied name to a safe basename: directory components are dropped and
/// anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let basename = name
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .unwrap_or("upload");

    basename
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

/// `{unix millis}_{basename}`, unique enough for a single admin panel.
fn stored_name(file_name: &str) -> String {
    format!("{}_{}", Utc::now().timestamp_millis(), sanitize_file_name(file_name))
}

fn resize_and_save(bytes: &[u8], target: &Path, max_width: u32) -> Result<(), ImageError> {
    let format = ImageFormat::from_path(target)
        .ok()
        .filter(|format| {
            matches!(
                format,
                ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP
            )
        })
        .ok_or_else(|| ImageError::Unsupported(target.display().to_string()))?;

    let image = image::load_from_memory(bytes).map_err(ImageError::Decode)?;
    let image = if image.width() > max_width {
        image.resize(max_width, u32::MAX, FilterType::Lanczos3)
    } else {
        image
    };

    // JPEG has no alpha channel.
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };

    image
        .save_with_format(target, format)
        .map_err(ImageError::Write)
}

// 2. The Real Implementation (local disk)
/// LocalImageStore
///
/// Writes processed uploads into a directory that the router serves under [`UPLOADS_PREFIX`].
#[derive(Clone)]
pub struct LocalImageStore {
    dir: PathBuf,
    max_width: u32,
}

impl LocalImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_width: MAX_IMAGE_WIDTH,
        }
    }
}

#[async_trait]
impl ImageService for LocalImageStore {
    async fn ensure_ready(&self) -> Result<(), ImageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    async fn store_image(&self, file_name: &str, bytes: Bytes) -> Result<String, ImageError> {
        let name = stored_name(file_name);
        let target = self.dir.join(&name);
        let max_width = self.max_width;

        tokio::task::spawn_blocking(move || resize_and_save(&bytes, &target, max_width)).await??;

        tracing::info!(file = %name, "stored uploaded image");
        Ok(format!("{UPLOADS_PREFIX}/{name}"))
    }
}

// 3. The Mock Implementation (For Tests)
/// MockImageStore
///
/// Accepts any bytes without decoding them and returns a deterministic path.
#[derive(Clone, Default)]
pub struct MockImageStore {
    /// When true, every upload fails.
    pub should_fail: bool,
}

impl MockImageStore {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl ImageService for MockImageStore {
    async fn ensure_ready(&self) -> Result<(), ImageError> {
        Ok(())
    }

    async fn store_image(&self, file_name: &str, _bytes: Bytes) -> Result<String, ImageError> {
        if self.should_fail {
            return Err(ImageError::Simulated(
                "mock image store configured to fail".to_owned(),
            ));
        }
        Ok(format!("{UPLOADS_PREFIX}/mock_{}", sanitize_file_name(file_name)))
    }
}

/// ImageState
///
/// Shared handle to the image service held in the application state.
pub type ImageState = Arc<dyn ImageService>;
