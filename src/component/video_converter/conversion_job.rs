use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// 一次轉檔請求，只存在於單一工作執行期間
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl ConversionJob {
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// 目的檔的容器格式（小寫副檔名）
    #[must_use]
    pub fn target_container(&self) -> Option<String> {
        container_of(&self.destination)
    }
}

#[must_use]
pub fn container_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// 預設輸出路徑：與來源同資料夾的 `<檔名>_conv.<格式>`
#[must_use]
pub fn default_target_path(source: &Path, format: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    source.with_file_name(format!("{stem}_conv.{format}"))
}

/// 路徑不是以 `.<格式>` 結尾時補上副檔名
#[must_use]
pub fn ensure_extension(path: &Path, format: &str) -> PathBuf {
    let suffix = format!(".{}", format.to_lowercase());
    if path.to_string_lossy().to_lowercase().ends_with(&suffix) {
        return path.to_path_buf();
    }

    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(format!(".{format}"));
    PathBuf::from(raw)
}
