use super::video_record::UNKNOWN_PLACEHOLDER;
use crate::tools::{MediaBackend, StreamProperty};
use log::debug;
use std::path::Path;

/// 影片長度與解析度，無法判斷時為 `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub duration: Option<String>,
    pub resolution: Option<String>,
}

impl VideoMetadata {
    #[must_use]
    pub fn duration_or_placeholder(&self) -> String {
        self.duration
            .clone()
            .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string())
    }

    #[must_use]
    pub fn resolution_or_placeholder(&self) -> String {
        self.resolution
            .clone()
            .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string())
    }
}

/// 讀取影片的長度與解析度，任何錯誤都只會得到未知值
#[must_use]
pub fn probe_metadata(backend: &dyn MediaBackend, path: &Path) -> VideoMetadata {
    let reader = match backend.open(path) {
        Ok(reader) => reader,
        Err(e) => {
            debug!("無法讀取中繼資料 {}: {e}", path.display());
            return VideoMetadata::default();
        }
    };

    let fps = reader.property(StreamProperty::Fps);
    let frame_count = reader.property(StreamProperty::FrameCount);
    let duration = (fps > 0.0).then(|| format_duration(frame_count / fps));

    let width = reader.property(StreamProperty::FrameWidth);
    let height = reader.property(StreamProperty::FrameHeight);

    VideoMetadata {
        duration,
        resolution: format_resolution(width, height),
    }
}

/// 四捨五入到秒，有小時時為 `HH:MM:SS`，否則為 `MM:SS`
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    let total = (seconds.max(0.0) + 0.5) as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

#[must_use]
pub fn format_resolution(width: f64, height: f64) -> Option<String> {
    let (width, height) = (width as u32, height as u32);
    (width > 0 && height > 0).then(|| format!("{width}x{height}"))
}
