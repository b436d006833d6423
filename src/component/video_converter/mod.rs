//! 影片格式轉換元件
//!
//! 逐格讀取來源影片，依目的副檔名選擇 codec 寫入新檔案，
//! 轉檔在背景執行緒上進行，進度以事件回報。

mod conversion_job;
mod main;
mod transcode_worker;

pub use conversion_job::{ConversionJob, container_of, default_target_path, ensure_extension};
pub use main::VideoConverter;
pub use transcode_worker::{
    DEFAULT_FPS, ProgressUpdate, TranscodeEvent, TranscodeHandle, TranscodeOutcome,
    TranscodeWorker, WorkerState, progress_interval, progress_for,
};
