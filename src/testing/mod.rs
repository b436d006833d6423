//! 測試用的解碼／編碼後端
//!
//! 以記憶體中的影格模擬影片，不需要 ffmpeg 即可驗證中繼資料、縮圖與轉檔流程。

mod mock_backend;

pub use mock_backend::{MockBackend, MockOutput, MockVideo};
