use super::library_store::LibraryStore;
use super::metadata_prober::probe_metadata;
use super::thumbnail_extractor::extract_thumbnail;
use super::video_record::NewVideo;
use crate::config::FileTypeTable;
use crate::tools::{MediaBackend, scan_video_files, validate_directory_exists};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 匯入結果統計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 使用者手動指定的欄位，優先於檔名與讀取到的中繼資料
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOverrides {
    pub title: Option<String>,
    pub duration: Option<String>,
    pub resolution: Option<String>,
}

impl ImportOverrides {
    /// 空白輸入視為未指定
    #[must_use]
    pub fn from_input(title: &str, duration: &str, resolution: &str) -> Self {
        let non_empty = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        Self {
            title: non_empty(title),
            duration: non_empty(duration),
            resolution: non_empty(resolution),
        }
    }
}

pub struct VideoImporter<'a> {
    backend: &'a dyn MediaBackend,
    thumbnail_seek_seconds: f64,
    shutdown_signal: Arc<AtomicBool>,
}

impl<'a> VideoImporter<'a> {
    pub fn new(
        backend: &'a dyn MediaBackend,
        thumbnail_seek_seconds: f64,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            backend,
            thumbnail_seek_seconds,
            shutdown_signal,
        }
    }

    /// 讀取中繼資料與縮圖，組成待寫入的紀錄
    #[must_use]
    pub fn prepare(&self, path: &Path) -> NewVideo {
        self.prepare_with(path, &ImportOverrides::default())
    }

    #[must_use]
    pub fn prepare_with(&self, path: &Path, overrides: &ImportOverrides) -> NewVideo {
        let metadata = probe_metadata(self.backend, path);
        let thumbnail = extract_thumbnail(self.backend, path, self.thumbnail_seek_seconds)
            .and_then(|thumb| match thumb.to_png() {
                Ok(png) => Some(png),
                Err(e) => {
                    warn!("縮圖編碼失敗 {}: {e:#}", path.display());
                    None
                }
            });

        let mut video = NewVideo::new(path);
        if let Some(title) = &overrides.title {
            video.title = title.clone();
        }
        video.duration = overrides
            .duration
            .clone()
            .unwrap_or_else(|| metadata.duration_or_placeholder());
        video.resolution = overrides
            .resolution
            .clone()
            .unwrap_or_else(|| metadata.resolution_or_placeholder());
        video.thumbnail = thumbnail;
        video
    }

    pub fn import_files(&self, store: &LibraryStore, paths: &[PathBuf]) -> Result<ImportSummary> {
        self.import_files_with(store, paths, &ImportOverrides::default())
    }

    /// 平行讀取中繼資料後依序寫入影片庫，收到中斷信號時跳過尚未處理的檔案
    pub fn import_files_with(
        &self,
        store: &LibraryStore,
        paths: &[PathBuf],
        overrides: &ImportOverrides,
    ) -> Result<ImportSummary> {
        let progress_bar = ProgressBar::new(paths.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
                .progress_chars("#>-"),
        );
        progress_bar.set_message("讀取影片資訊中...");

        let prepared: Vec<Option<NewVideo>> = paths
            .par_iter()
            .map(|path| {
                if self.shutdown_signal.load(Ordering::SeqCst) {
                    return None;
                }
                let video = if path.is_file() {
                    Some(self.prepare_with(path, overrides))
                } else {
                    warn!("略過不存在的檔案: {}", path.display());
                    None
                };
                progress_bar.inc(1);
                video
            })
            .collect();

        progress_bar.finish_with_message("完成");

        let mut summary = ImportSummary::default();
        for (path, video) in paths.iter().zip(prepared) {
            let Some(video) = video else {
                summary.skipped += 1;
                continue;
            };

            match store.add(&video) {
                Ok(id) => {
                    info!("已匯入影片 [{id}]: {}", path.display());
                    summary.imported += 1;
                }
                Err(e) => {
                    error!("匯入失敗 {}: {e:#}", path.display());
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    pub fn import_directory(
        &self,
        store: &LibraryStore,
        directory: &Path,
        file_type_table: &FileTypeTable,
    ) -> Result<ImportSummary> {
        validate_directory_exists(directory)?;
        let files = scan_video_files(directory, file_type_table)?;
        info!("在 {} 找到 {} 個影片檔案", directory.display(), files.len());
        self.import_files(store, &files)
    }
}
