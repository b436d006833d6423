use crate::tools::{Frame, MediaBackend};
use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};
use log::debug;
use std::io::Cursor;
use std::path::Path;

/// RGB 排列的縮圖，縮放由顯示端處理
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    image: RgbImage,
}

impl Thumbnail {
    /// 將解碼器的 BGR 影格轉換為 RGB
    #[must_use]
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if !frame.is_complete() || frame.width == 0 || frame.height == 0 {
            return None;
        }

        let rgb: Vec<u8> = frame
            .data
            .chunks_exact(3)
            .flat_map(|bgr| [bgr[2], bgr[1], bgr[0]])
            .collect();

        RgbImage::from_raw(frame.width, frame.height, rgb).map(|image| Self { image })
    }

    pub fn from_png(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .context("無法解析快取的縮圖")?
            .to_rgb8();
        Ok(Self { image })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buffer, ImageFormat::Png)
            .context("無法編碼縮圖")?;
        Ok(buffer.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("無法儲存縮圖: {}", path.display()))
    }
}

/// 跳轉到 `seek_seconds` 後解碼一格作為縮圖，失敗時回傳 `None`
#[must_use]
pub fn extract_thumbnail(
    backend: &dyn MediaBackend,
    path: &Path,
    seek_seconds: f64,
) -> Option<Thumbnail> {
    let mut reader = match backend.open(path) {
        Ok(reader) => reader,
        Err(e) => {
            debug!("無法擷取縮圖 {}: {e}", path.display());
            return None;
        }
    };

    if let Err(e) = reader.seek(seek_seconds.max(0.0) * 1000.0) {
        debug!("跳轉失敗 {}: {e}", path.display());
        return None;
    }

    let frame = reader.read_frame()?;
    Thumbnail::from_frame(&frame)
}
