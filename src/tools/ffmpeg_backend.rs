//! 以 ffprobe / ffmpeg 子程序實作的解碼／編碼後端
//!
//! 解碼：ffmpeg 將視訊串流輸出為 BGR24 rawvideo 到 stdout，逐格讀取。
//! 編碼：將 BGR24 rawvideo 寫入 ffmpeg 的 stdin，由 ffmpeg 依指定編碼器封裝。

use super::ffprobe_info::{VideoInfo, get_video_info};
use super::media_backend::{
    Frame, FrameReader, FrameWriter, MediaBackend, MediaError, StreamProperty,
};
use log::{debug, warn};
use std::collections::HashSet;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// 寫入第一格後等待編碼器初始化的時間
const STARTUP_GRACE: Duration = Duration::from_millis(300);

/// codec tag 對應的 ffmpeg 編碼器設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSpec {
    pub encoder: &'static str,
    pub vtag: Option<&'static str>,
    pub pix_fmt: Option<&'static str>,
}

impl EncoderSpec {
    const fn new(encoder: &'static str) -> Self {
        Self {
            encoder,
            vtag: None,
            pix_fmt: None,
        }
    }

    const fn with_vtag(mut self, vtag: &'static str) -> Self {
        self.vtag = Some(vtag);
        self
    }

    const fn with_pix_fmt(mut self, pix_fmt: &'static str) -> Self {
        self.pix_fmt = Some(pix_fmt);
        self
    }
}

/// 將 FourCC 形式的 codec tag 轉換為 ffmpeg 編碼器
#[must_use]
pub fn encoder_for_codec(codec: &str) -> Option<EncoderSpec> {
    let spec = match codec.to_ascii_uppercase().as_str() {
        "MP4V" | "FMP4" => EncoderSpec::new("mpeg4"),
        "XVID" | "DIVX" => EncoderSpec::new("mpeg4").with_vtag("xvid"),
        "X264" | "H264" | "AVC1" => EncoderSpec::new("libx264").with_pix_fmt("yuv420p"),
        "X265" | "HEVC" | "HVC1" => EncoderSpec::new("libx265").with_pix_fmt("yuv420p"),
        "VP80" => EncoderSpec::new("libvpx").with_pix_fmt("yuv420p"),
        "VP90" => EncoderSpec::new("libvpx-vp9").with_pix_fmt("yuv420p"),
        "PIM1" => EncoderSpec::new("mpeg1video"),
        "MJPG" => EncoderSpec::new("mjpeg").with_pix_fmt("yuvj420p"),
        _ => return None,
    };
    Some(spec)
}

/// 將幀率轉成 ffmpeg 可接受的字串，NTSC 系列幀率以分數表示
#[must_use]
pub fn format_frame_rate(fps: f64) -> String {
    let rounded = fps.round();
    if (fps - rounded).abs() < 0.001 {
        return format!("{rounded:.0}");
    }

    let ntsc = (fps * 1.001).round();
    if (ntsc / 1.001 - fps).abs() < 0.001 {
        return format!("{:.0}/1001", ntsc * 1000.0);
    }

    format!("{fps:.3}")
}

fn parse_encoder_list(output: &str) -> HashSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            let name = parts.next()?;
            (flags.len() == 6 && flags.starts_with('V')).then(|| name.to_string())
        })
        .collect()
}

pub struct FfmpegBackend {
    ffmpeg: String,
    ffprobe: String,
    encoders: OnceLock<HashSet<String>>,
}

impl FfmpegBackend {
    #[must_use]
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            encoders: OnceLock::new(),
        }
    }

    /// ffmpeg 編譯時啟用的視訊編碼器，只查詢一次
    fn available_encoders(&self) -> &HashSet<String> {
        self.encoders.get_or_init(|| {
            match Command::new(&self.ffmpeg)
                .args(["-hide_banner", "-encoders"])
                .stdin(Stdio::null())
                .output()
            {
                Ok(output) => parse_encoder_list(&String::from_utf8_lossy(&output.stdout)),
                Err(e) => {
                    warn!("無法查詢 ffmpeg 編碼器清單: {e}");
                    HashSet::new()
                }
            }
        })
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl MediaBackend for FfmpegBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameReader>, MediaError> {
        if !path.is_file() {
            return Err(MediaError::open(path, "檔案不存在"));
        }

        let info = get_video_info(&self.ffprobe, path)
            .map_err(|e| MediaError::open(path, format!("{e:#}")))?;
        debug!(
            "開啟來源 {}: {}x{} {:.3}fps {} frames",
            path.display(),
            info.width,
            info.height,
            info.frame_rate,
            info.frame_count
        );

        Ok(Box::new(FfmpegReader::new(&self.ffmpeg, path, info)))
    }

    fn open_writer(
        &self,
        path: &Path,
        codec: &str,
        fps: f64,
        size: (u32, u32),
    ) -> Result<Box<dyn FrameWriter>, MediaError> {
        let spec = encoder_for_codec(codec)
            .ok_or_else(|| MediaError::unsupported_codec(codec, "沒有對應的 ffmpeg 編碼器"))?;

        if !self.available_encoders().contains(spec.encoder) {
            return Err(MediaError::unsupported_codec(
                codec,
                format!("ffmpeg 未提供編碼器 {}", spec.encoder),
            ));
        }

        let (width, height) = size;
        if width == 0 || height == 0 {
            return Err(MediaError::open(path, format!("影格尺寸無效: {width}x{height}")));
        }
        if fps <= 0.0 || !fps.is_finite() {
            return Err(MediaError::open(path, format!("幀率無效: {fps}")));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(MediaError::open(path, "目的資料夾不存在"));
            }
        }

        let writer = FfmpegWriter::spawn(&self.ffmpeg, path, spec, fps, size)?;
        Ok(Box::new(writer))
    }
}

#[must_use]
pub fn build_decoder_args(path: &Path, position_ms: f64, size: (u32, u32)) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ];

    if position_ms > 0.0 {
        args.push("-ss".to_string());
        args.push(format!("{:.3}", position_ms / 1000.0));
    }

    args.extend([
        "-i".to_string(),
        path.to_string_lossy().to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-an".to_string(),
        "-sn".to_string(),
        "-dn".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "bgr24".to_string(),
        "-s".to_string(),
        format!("{}x{}", size.0, size.1),
        "pipe:1".to_string(),
    ]);

    args
}

#[must_use]
pub fn build_encoder_args(
    path: &Path,
    spec: EncoderSpec,
    fps: f64,
    size: (u32, u32),
) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "bgr24".to_string(),
        "-s".to_string(),
        format!("{}x{}", size.0, size.1),
        "-r".to_string(),
        format_frame_rate(fps),
        "-i".to_string(),
        "pipe:0".to_string(),
        "-an".to_string(),
        "-c:v".to_string(),
        spec.encoder.to_string(),
    ];

    if let Some(vtag) = spec.vtag {
        args.push("-vtag".to_string());
        args.push(vtag.to_string());
    }
    if let Some(pix_fmt) = spec.pix_fmt {
        args.push("-pix_fmt".to_string());
        args.push(pix_fmt.to_string());
    }

    args.push(path.to_string_lossy().to_string());
    args
}

struct Decoder {
    child: Child,
    stdout: BufReader<ChildStdout>,
}

impl Drop for Decoder {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub struct FfmpegReader {
    ffmpeg: String,
    path: PathBuf,
    info: VideoInfo,
    position_ms: f64,
    decoder: Option<Decoder>,
    exhausted: bool,
}

impl FfmpegReader {
    fn new(ffmpeg: &str, path: &Path, info: VideoInfo) -> Self {
        Self {
            ffmpeg: ffmpeg.to_string(),
            path: path.to_path_buf(),
            info,
            position_ms: 0.0,
            decoder: None,
            exhausted: false,
        }
    }

    fn spawn_decoder(&self) -> std::io::Result<Decoder> {
        let size = (self.info.width, self.info.height);
        let args = build_decoder_args(&self.path, self.position_ms, size);
        debug!("啟動解碼程序: {} {}", self.ffmpeg, args.join(" "));

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("無法取得 ffmpeg stdout"))?;

        Ok(Decoder {
            child,
            stdout: BufReader::new(stdout),
        })
    }
}

impl FrameReader for FfmpegReader {
    fn read_frame(&mut self) -> Option<Frame> {
        if self.exhausted {
            return None;
        }

        let (width, height) = (self.info.width, self.info.height);
        let frame_len = Frame::byte_len(width, height);
        if frame_len == 0 {
            self.exhausted = true;
            return None;
        }

        if self.decoder.is_none() {
            match self.spawn_decoder() {
                Ok(decoder) => self.decoder = Some(decoder),
                Err(e) => {
                    warn!("無法啟動 ffmpeg 解碼 {}: {e}", self.path.display());
                    self.exhausted = true;
                    return None;
                }
            }
        }

        let decoder = self.decoder.as_mut()?;
        let mut data = vec![0u8; frame_len];
        match decoder.stdout.read_exact(&mut data) {
            Ok(()) => Some(Frame::new(width, height, data)),
            Err(e) => {
                if e.kind() != ErrorKind::UnexpectedEof {
                    debug!("解碼中止 {}: {e}", self.path.display());
                }
                self.exhausted = true;
                self.decoder = None;
                None
            }
        }
    }

    fn seek(&mut self, position_ms: f64) -> Result<(), MediaError> {
        self.decoder = None;
        self.position_ms = position_ms.max(0.0);
        self.exhausted = false;
        Ok(())
    }

    fn property(&self, property: StreamProperty) -> f64 {
        match property {
            StreamProperty::FrameWidth => f64::from(self.info.width),
            StreamProperty::FrameHeight => f64::from(self.info.height),
            StreamProperty::Fps => self.info.frame_rate,
            StreamProperty::FrameCount => self.info.frame_count as f64,
        }
    }
}

pub struct FfmpegWriter {
    path: PathBuf,
    size: (u32, u32),
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_reader: Option<JoinHandle<String>>,
    finished: bool,
}

impl FfmpegWriter {
    fn spawn(
        ffmpeg: &str,
        path: &Path,
        spec: EncoderSpec,
        fps: f64,
        size: (u32, u32),
    ) -> Result<Self, MediaError> {
        let args = build_encoder_args(path, spec, fps, size);
        debug!("啟動編碼程序: {ffmpeg} {}", args.join(" "));

        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediaError::open(path, format!("無法執行 ffmpeg: {e}")))?;

        let stdin = child.stdin.take();
        let stderr_reader = child.stderr.take().map(|stderr| {
            // 持續讀取 stderr，避免管線塞滿造成編碼器阻塞
            thread::spawn(move || {
                BufReader::new(stderr)
                    .lines()
                    .map_while(Result::ok)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        });

        Ok(Self {
            path: path.to_path_buf(),
            size,
            child,
            stdin,
            stderr_reader,
            finished: false,
        })
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr_reader
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

impl FrameWriter for FfmpegWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), MediaError> {
        if (frame.width, frame.height) != self.size || !frame.is_complete() {
            return Err(MediaError::Write(format!(
                "影格尺寸 {}x{} 與輸出 {}x{} 不符",
                frame.width, frame.height, self.size.0, self.size.1
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::Write("編碼器輸入已關閉".to_string()))?;

        stdin
            .write_all(&frame.data)
            .map_err(|e| MediaError::Write(format!("{}: {e}", self.path.display())))
    }

    /// ffmpeg 收到第一格才會初始化編碼器，參數不被接受時會立即結束
    fn confirm_open(&mut self) -> Result<(), MediaError> {
        if let Some(stdin) = self.stdin.as_mut() {
            let _ = stdin.flush();
        }

        let deadline = Instant::now() + STARTUP_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    drop(self.stdin.take());
                    let stderr = self.collect_stderr();
                    return Err(MediaError::Encoder(format!(
                        "編碼器提前結束 ({status}): {}",
                        stderr.trim()
                    )));
                }
                Ok(None) if Instant::now() >= deadline => return Ok(()),
                Ok(None) => thread::sleep(Duration::from_millis(20)),
                Err(e) => return Err(MediaError::Encoder(e.to_string())),
            }
        }
    }

    fn finish(&mut self) -> Result<(), MediaError> {
        if self.finished {
            return Ok(());
        }

        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| MediaError::Encoder(e.to_string()))?;
        self.finished = true;

        let stderr = self.collect_stderr();
        if !status.success() {
            return Err(MediaError::Encoder(format!("{status}: {}", stderr.trim())));
        }

        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if !self.finished {
            drop(self.stdin.take());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_for_known_codecs() {
        assert_eq!(encoder_for_codec("mp4v").unwrap().encoder, "mpeg4");
        let xvid = encoder_for_codec("XVID").unwrap();
        assert_eq!(xvid.encoder, "mpeg4");
        assert_eq!(xvid.vtag, Some("xvid"));
        assert_eq!(encoder_for_codec("VP90").unwrap().encoder, "libvpx-vp9");
        assert_eq!(encoder_for_codec("PIM1").unwrap().encoder, "mpeg1video");
    }

    #[test]
    fn test_encoder_for_unknown_codec() {
        assert!(encoder_for_codec("ABCD").is_none());
    }

    #[test]
    fn test_format_frame_rate() {
        assert_eq!(format_frame_rate(30.0), "30");
        assert_eq!(format_frame_rate(25.0004), "25");
        assert_eq!(format_frame_rate(29.97), "30000/1001");
        assert_eq!(format_frame_rate(23.976), "24000/1001");
        assert_eq!(format_frame_rate(12.5), "12.500");
    }

    #[test]
    fn test_parse_encoder_list() {
        let output = "Encoders:\n V..... = Video\n ------\n V....D libx264              libx264 H.264\n A....D aac                  AAC\n V....D mpeg4                MPEG-4 part 2\n";
        let encoders = parse_encoder_list(output);
        assert!(encoders.contains("libx264"));
        assert!(encoders.contains("mpeg4"));
        assert!(!encoders.contains("aac"));
    }

    #[test]
    fn test_build_decoder_args_with_seek() {
        let args = build_decoder_args(Path::new("/videos/a.mp4"), 1500.0, (640, 360));
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input, "-ss 應該在 -i 之前以快速跳轉");
        assert_eq!(args[ss + 1], "1.500");
        assert!(args.contains(&"bgr24".to_string()));
        assert!(args.contains(&"640x360".to_string()));
        assert_eq!(args.last().unwrap(), "pipe:1");
    }

    #[test]
    fn test_build_decoder_args_without_seek() {
        let args = build_decoder_args(Path::new("/videos/a.mp4"), 0.0, (640, 360));
        assert!(!args.contains(&"-ss".to_string()));
    }

    #[test]
    fn test_build_encoder_args() {
        let spec = encoder_for_codec("XVID").unwrap();
        let args = build_encoder_args(Path::new("/out/b.avi"), spec, 29.97, (1280, 720));

        assert!(args.contains(&"1280x720".to_string()));
        assert!(args.contains(&"30000/1001".to_string()));
        let vtag = args.iter().position(|a| a == "-vtag").unwrap();
        assert_eq!(args[vtag + 1], "xvid");
        assert_eq!(args.last().unwrap(), "/out/b.avi");
    }

    #[test]
    fn test_open_missing_file() {
        let backend = FfmpegBackend::default();
        let result = backend.open(Path::new("/nonexistent/video.mp4"));
        assert!(matches!(result, Err(MediaError::Open { .. })));
    }

    /// 列出編碼器但任何編碼都立即失敗的 ffmpeg 替身
    #[cfg(unix)]
    fn failing_ffmpeg(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("ffmpeg");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             for arg in \"$@\"; do\n\
               if [ \"$arg\" = \"-encoders\" ]; then\n\
                 echo ' V....D libx264              H.264'\n\
                 echo ' V....D mpeg4                MPEG-4 part 2'\n\
                 exit 0\n\
               fi\n\
             done\n\
             echo 'width not divisible by 2' >&2\n\
             exit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn test_encoder_startup_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = failing_ffmpeg(dir.path());
        let backend = FfmpegBackend::new(ffmpeg.to_string_lossy().to_string(), "ffprobe");

        let mut writer = backend
            .open_writer(&dir.path().join("out.mkv"), "X264", 30.0, (3, 2))
            .unwrap();

        let frame = Frame::new(3, 2, vec![0; Frame::byte_len(3, 2)]);
        let started = writer
            .write_frame(&frame)
            .and_then(|()| writer.confirm_open());
        assert!(started.is_err());
    }

    #[test]
    fn test_open_writer_unknown_codec() {
        let backend = FfmpegBackend::default();
        let result = backend.open_writer(Path::new("/tmp/out.xyz"), "ABCD", 30.0, (640, 360));
        assert!(matches!(result, Err(MediaError::UnsupportedCodec { .. })));
    }
}
