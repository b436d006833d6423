//! 解碼／編碼邊界
//!
//! 核心邏輯只透過這裡的 trait 存取影片，實際的解碼器（ffmpeg 子程序）
//! 實作在 `ffmpeg_backend`，測試則可以換成記憶體中的假實作。

use std::path::{Path, PathBuf};
use thiserror::Error;

/// 解碼後的單一影格，像素排列為 BGR24（每像素 3 bytes，逐列緊密排列）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// 指定尺寸下一個 BGR24 影格應有的位元組數
    #[must_use]
    pub const fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.data.len() == Self::byte_len(self.width, self.height)
    }
}

/// 可從已開啟的來源查詢的串流屬性，未知時回傳 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamProperty {
    FrameWidth,
    FrameHeight,
    Fps,
    FrameCount,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("無法開啟 {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("不支援的編碼器 {codec}: {reason}")]
    UnsupportedCodec { codec: String, reason: String },

    #[error("寫入影格失敗: {0}")]
    Write(String),

    #[error("編碼器執行失敗: {0}")]
    Encoder(String),
}

impl MediaError {
    pub fn open(path: &Path, reason: impl Into<String>) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn unsupported_codec(codec: &str, reason: impl Into<String>) -> Self {
        Self::UnsupportedCodec {
            codec: codec.to_string(),
            reason: reason.into(),
        }
    }
}

/// 已開啟的解碼來源
pub trait FrameReader: Send {
    /// 讀取下一個影格；串流結束或解碼失敗都回傳 `None`
    fn read_frame(&mut self) -> Option<Frame>;

    /// 跳到指定的毫秒位置，下一次 `read_frame` 從該處開始
    fn seek(&mut self, position_ms: f64) -> Result<(), MediaError>;

    fn property(&self, property: StreamProperty) -> f64;
}

/// 已開啟的編碼目的地
pub trait FrameWriter: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), MediaError>;

    /// 確認編碼器在收到資料後仍在執行；編碼器啟動失敗時回傳錯誤
    fn confirm_open(&mut self) -> Result<(), MediaError> {
        Ok(())
    }

    /// 關閉輸入並等待編碼器寫完檔案
    fn finish(&mut self) -> Result<(), MediaError>;
}

pub trait MediaBackend: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameReader>, MediaError>;

    fn open_writer(
        &self,
        path: &Path,
        codec: &str,
        fps: f64,
        size: (u32, u32),
    ) -> Result<Box<dyn FrameWriter>, MediaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_byte_len() {
        assert_eq!(Frame::byte_len(1920, 1080), 1920 * 1080 * 3);
        assert_eq!(Frame::byte_len(0, 1080), 0);
    }

    #[test]
    fn test_frame_is_complete() {
        let frame = Frame::new(2, 2, vec![0; 12]);
        assert!(frame.is_complete());

        let truncated = Frame::new(2, 2, vec![0; 11]);
        assert!(!truncated.is_complete());
    }

    #[test]
    fn test_media_error_messages() {
        let err = MediaError::open(Path::new("/videos/a.mp4"), "not found");
        assert!(err.to_string().contains("/videos/a.mp4"));

        let err = MediaError::unsupported_codec("VP90", "encoder missing");
        assert!(err.to_string().contains("VP90"));
    }
}
