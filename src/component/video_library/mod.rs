//! 影片庫元件
//!
//! 匯入影片時讀取長度、解析度並擷取縮圖，紀錄保存在本機 SQLite 資料庫，
//! 提供列表、搜尋、刪除與檔案屬性檢視。

mod importer;
mod library_store;
mod main;
mod metadata_prober;
mod thumbnail_extractor;
mod video_record;

pub use importer::{ImportOverrides, ImportSummary, VideoImporter};
pub use library_store::LibraryStore;
pub use main::VideoLibrary;
pub use metadata_prober::{VideoMetadata, format_duration, format_resolution, probe_metadata};
pub use thumbnail_extractor::{Thumbnail, extract_thumbnail};
pub use video_record::{
    NewVideo, UNKNOWN_PLACEHOLDER, VideoRecord, duration_to_seconds, filter_by_title,
    title_from_path,
};
