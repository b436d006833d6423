use std::path::{Path, PathBuf};

/// 無法取得的中繼資料在資料庫中的表示
pub const UNKNOWN_PLACEHOLDER: &str = "-";

/// 影片庫中的一筆紀錄，`file_path` 為唯一鍵
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    pub id: i64,
    pub title: String,
    pub duration: String,
    pub resolution: String,
    pub file_path: PathBuf,
    /// 快取的縮圖（PNG）
    pub thumbnail: Option<Vec<u8>>,
}

/// 尚未寫入資料庫的紀錄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVideo {
    pub title: String,
    pub duration: String,
    pub resolution: String,
    pub file_path: PathBuf,
    pub thumbnail: Option<Vec<u8>>,
}

impl NewVideo {
    #[must_use]
    pub fn new(file_path: &Path) -> Self {
        Self {
            title: title_from_path(file_path),
            duration: UNKNOWN_PLACEHOLDER.to_string(),
            resolution: UNKNOWN_PLACEHOLDER.to_string(),
            file_path: file_path.to_path_buf(),
            thumbnail: None,
        }
    }
}

/// 以不含副檔名的檔名作為標題
#[must_use]
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// 標題包含關鍵字（不分大小寫）的紀錄
#[must_use]
pub fn filter_by_title<'a>(records: &'a [VideoRecord], query: &str) -> Vec<&'a VideoRecord> {
    let query = query.to_lowercase();
    records
        .iter()
        .filter(|record| record.title.to_lowercase().contains(&query))
        .collect()
}

/// 將 `HH:MM:SS` 或 `MM:SS` 轉換為秒數
#[must_use]
pub fn duration_to_seconds(duration: &str) -> Option<u64> {
    let parts: Vec<&str> = duration.trim().split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, *s),
        [m, s] => (0, m.parse::<u64>().ok()?, *s),
        _ => return None,
    };
    let seconds = seconds.parse::<f64>().ok().filter(|s| *s >= 0.0)? as u64;
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> VideoRecord {
        VideoRecord {
            id: 0,
            title: title.to_string(),
            duration: UNKNOWN_PLACEHOLDER.to_string(),
            resolution: UNKNOWN_PLACEHOLDER.to_string(),
            file_path: PathBuf::from(format!("/videos/{title}.mp4")),
            thumbnail: None,
        }
    }

    #[test]
    fn test_title_from_path() {
        assert_eq!(title_from_path(Path::new("/videos/Holiday 2024.mp4")), "Holiday 2024");
        assert_eq!(title_from_path(Path::new("/videos/a.b.mkv")), "a.b");
    }

    #[test]
    fn test_new_video_defaults() {
        let video = NewVideo::new(Path::new("/videos/clip.avi"));
        assert_eq!(video.title, "clip");
        assert_eq!(video.duration, UNKNOWN_PLACEHOLDER);
        assert_eq!(video.resolution, UNKNOWN_PLACEHOLDER);
        assert!(video.thumbnail.is_none());
    }

    #[test]
    fn test_filter_by_title_case_insensitive() {
        let records = vec![record("Summer Trip"), record("winter"), record("SUMMARY")];
        let found = filter_by_title(&records, "sum");
        assert_eq!(found.len(), 2);
        assert!(filter_by_title(&records, "autumn").is_empty());
        assert_eq!(filter_by_title(&records, "").len(), 3);
    }

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(duration_to_seconds("01:01:01"), Some(3661));
        assert_eq!(duration_to_seconds("02:05"), Some(125));
        assert_eq!(duration_to_seconds("00:07.5"), Some(7));
        assert_eq!(duration_to_seconds("-"), None);
        assert_eq!(duration_to_seconds("1:2:3:4"), None);
        assert_eq!(duration_to_seconds("aa:bb"), None);
    }

    #[test]
    fn test_duration_to_seconds_overflow() {
        assert_eq!(duration_to_seconds("9999999999999999:00:00"), None);
        assert_eq!(duration_to_seconds("18446744073709551615:00"), None);
        assert_eq!(duration_to_seconds("00:18446744073709551615:00"), None);
    }
}
