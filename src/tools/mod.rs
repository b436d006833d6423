mod ffmpeg_backend;
mod ffprobe_info;
mod file_properties;
mod media_backend;
mod path_validator;
mod video_scanner;

pub use ffmpeg_backend::{
    EncoderSpec, FfmpegBackend, FfmpegReader, FfmpegWriter, build_decoder_args,
    build_encoder_args, encoder_for_codec, format_frame_rate,
};
pub use ffprobe_info::{VideoInfo, get_video_info};
pub use file_properties::{FileProperties, format_of};
pub use media_backend::{Frame, FrameReader, FrameWriter, MediaBackend, MediaError, StreamProperty};
pub use path_validator::{ensure_directory_exists, validate_directory_exists, validate_file_exists};
pub use video_scanner::scan_video_files;
