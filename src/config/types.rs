use super::codec_table::CodecTable;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// 最近使用路徑的保留數量
pub const MAX_RECENT_PATHS: usize = 10;

pub const DEFAULT_DATABASE_PATH: &str = "video_library.db";
pub const DEFAULT_THUMBNAIL_SEEK_SECONDS: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTypeTable {
    #[serde(rename = "VIDEO_FILE")]
    pub video_file: Vec<String>,
}

impl FileTypeTable {
    #[must_use]
    pub fn video_extensions_set(&self) -> HashSet<String> {
        self.video_file
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect()
    }

    #[must_use]
    pub fn is_video_file(&self, path: &Path) -> bool {
        let video_extensions = self.video_extensions_set();
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| video_extensions.contains(&format!(".{}", ext.to_lowercase())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "zh-TW")]
    ZhTw,
}

impl Language {
    pub const ALL: [Self; 2] = [Self::EnUs, Self::ZhTw];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnUs => "en-US",
            Self::ZhTw => "zh-TW",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::EnUs => "English",
            Self::ZhTw => "繁體中文",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub language: Language,
    pub database_path: PathBuf,
    /// 擷取縮圖時跳轉的秒數
    pub thumbnail_seek_seconds: f64,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub recent_paths: Vec<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            language: Language::default(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            thumbnail_seek_seconds: DEFAULT_THUMBNAIL_SEEK_SECONDS,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            recent_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub file_type_table: FileTypeTable,
    pub codec_table: CodecTable,
    pub settings: UserSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_file_case_insensitive() {
        let table = FileTypeTable {
            video_file: vec![".mp4".to_string(), ".MTS".to_string()],
        };
        assert!(table.is_video_file(Path::new("/a/b.MP4")));
        assert!(table.is_video_file(Path::new("/a/b.mts")));
        assert!(!table.is_video_file(Path::new("/a/b.txt")));
        assert!(!table.is_video_file(Path::new("/a/mp4")));
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: UserSettings = serde_json::from_str(r#"{"language": "zh-TW"}"#).unwrap();
        assert_eq!(settings.language, Language::ZhTw);
        assert_eq!(settings.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert!((settings.thumbnail_seek_seconds - 1.0).abs() < f64::EPSILON);
        assert_eq!(settings.ffmpeg_path, "ffmpeg");
    }

    #[test]
    fn test_language_round_trip_names() {
        assert_eq!(Language::EnUs.as_str(), "en-US");
        assert_eq!(Language::ZhTw.as_str(), "zh-TW");
        assert_eq!(
            serde_json::to_string(&Language::ZhTw).unwrap(),
            "\"zh-TW\""
        );
    }
}
