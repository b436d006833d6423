pub mod codec_table;
pub mod load;
pub mod save;
pub mod types;

pub use codec_table::{CodecTable, FormatEntry};
pub use types::{
    Config, DEFAULT_DATABASE_PATH, DEFAULT_THUMBNAIL_SEEK_SECONDS, FileTypeTable, Language,
    MAX_RECENT_PATHS, UserSettings,
};
