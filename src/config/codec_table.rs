use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatEntry {
    pub extension: String,
    pub codec: String,
}

/// 輸出容器（副檔名）到 codec tag 的對照表，建立後不再變動
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecTable {
    formats: Vec<FormatEntry>,
    default_codec: String,
    fallback_codec: String,
}

impl CodecTable {
    #[must_use]
    pub fn new(
        formats: Vec<FormatEntry>,
        default_codec: impl Into<String>,
        fallback_codec: impl Into<String>,
    ) -> Self {
        Self {
            formats,
            default_codec: default_codec.into(),
            fallback_codec: fallback_codec.into(),
        }
    }

    #[must_use]
    pub fn codec_for_extension(&self, extension: &str) -> Option<&str> {
        let extension = extension.trim_start_matches('.');
        self.formats
            .iter()
            .find(|entry| entry.extension.eq_ignore_ascii_case(extension))
            .map(|entry| entry.codec.as_str())
    }

    /// 依目的檔副檔名決定 codec，未知副檔名使用預設 codec
    #[must_use]
    pub fn resolve(&self, destination: &Path) -> &str {
        destination
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.codec_for_extension(ext))
            .unwrap_or(&self.default_codec)
    }

    #[must_use]
    pub fn default_codec(&self) -> &str {
        &self.default_codec
    }

    /// 寫入器開啟失敗時唯一重試的 codec
    #[must_use]
    pub fn fallback_codec(&self) -> &str {
        &self.fallback_codec
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.formats.iter().map(|entry| entry.extension.as_str())
    }

    /// 建議的轉檔格式：清單中緊接在目前格式之後的項目
    #[must_use]
    pub fn suggested_index(&self, current_extension: &str) -> usize {
        self.formats
            .iter()
            .position(|entry| entry.extension.eq_ignore_ascii_case(current_extension))
            .map_or(0, |index| (index + 1) % self.formats.len())
    }
}
