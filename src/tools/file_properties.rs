use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::Path;

const NO_VALUE: &str = "—";

/// 影片檔案的檔案系統屬性
#[derive(Debug, Clone)]
pub struct FileProperties {
    pub name: String,
    pub location: String,
    pub size_bytes: u64,
    pub format: String,
    pub created: Option<DateTime<Local>>,
}

impl FileProperties {
    pub fn read(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("無法讀取檔案屬性: {}", path.display()))?;

        // 部分檔案系統不提供建立時間，退回修改時間
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .ok()
            .map(DateTime::<Local>::from);

        Ok(Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            location: path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            size_bytes: metadata.len(),
            format: format_of(path),
            created,
        })
    }

    #[must_use]
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    #[must_use]
    pub fn created_display(&self) -> String {
        self.created
            .map(|dt| dt.format("%d.%m.%Y %H:%M:%S").to_string())
            .unwrap_or_else(|| NO_VALUE.to_string())
    }
}

/// 以大寫副檔名表示的檔案格式
#[must_use]
pub fn format_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_uppercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| NO_VALUE.to_string())
}
