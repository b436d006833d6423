use crate::tools::{Frame, FrameReader, FrameWriter, MediaBackend, MediaError, StreamProperty};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// 模擬的來源影片
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockVideo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// 實際可讀出的影格數
    pub frames: usize,
    /// 容器回報的影格數，可與實際數量不同
    pub reported_frame_count: u64,
}

impl MockVideo {
    #[must_use]
    pub fn new(width: u32, height: u32, fps: f64, frames: usize) -> Self {
        Self {
            width,
            height,
            fps,
            frames,
            reported_frame_count: frames as u64,
        }
    }

    #[must_use]
    pub const fn with_reported_frame_count(mut self, count: u64) -> Self {
        self.reported_frame_count = count;
        self
    }

    /// 第 `index` 格的內容：每個 BGR 像素為 (index, index+1, index+2)
    #[must_use]
    pub fn frame(&self, index: usize) -> Frame {
        let pixel = [index as u8, index.wrapping_add(1) as u8, index.wrapping_add(2) as u8];
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take(Frame::byte_len(self.width, self.height))
            .collect();
        Frame::new(self.width, self.height, data)
    }
}

/// 寫入端收到的內容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockOutput {
    pub codec: String,
    pub fps: f64,
    pub size: (u32, u32),
    pub frames: Vec<Frame>,
    pub finished: bool,
}

#[derive(Debug, Default)]
struct MockState {
    sources: HashMap<PathBuf, MockVideo>,
    rejected_codecs: HashSet<String>,
    failing_codecs: HashSet<String>,
    writer_attempts: Vec<String>,
    outputs: HashMap<PathBuf, MockOutput>,
    fail_write_after: Option<usize>,
    fail_finish: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_video(&self, path: impl Into<PathBuf>, video: MockVideo) {
        lock(&self.state).sources.insert(path.into(), video);
    }

    /// 讓指定 codec 的寫入器開啟失敗
    pub fn reject_codec(&self, codec: &str) {
        lock(&self.state).rejected_codecs.insert(codec.to_string());
    }

    /// 指定 codec 的寫入器可以開啟，但編碼器收到影格後即失敗
    pub fn fail_codec_on_write(&self, codec: &str) {
        lock(&self.state).failing_codecs.insert(codec.to_string());
    }

    /// 寫入 `count` 格後，之後的寫入都失敗
    pub fn fail_writes_after(&self, count: usize) {
        lock(&self.state).fail_write_after = Some(count);
    }

    pub fn fail_finish(&self) {
        lock(&self.state).fail_finish = true;
    }

    #[must_use]
    pub fn writer_attempts(&self) -> Vec<String> {
        lock(&self.state).writer_attempts.clone()
    }

    #[must_use]
    pub fn output(&self, path: &Path) -> Option<MockOutput> {
        lock(&self.state).outputs.get(path).cloned()
    }
}

impl MediaBackend for MockBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameReader>, MediaError> {
        let video = lock(&self.state)
            .sources
            .get(path)
            .copied()
            .ok_or_else(|| MediaError::open(path, "mock source not registered"))?;

        Ok(Box::new(MockReader { video, position: 0 }))
    }

    fn open_writer(
        &self,
        path: &Path,
        codec: &str,
        fps: f64,
        size: (u32, u32),
    ) -> Result<Box<dyn FrameWriter>, MediaError> {
        let mut state = lock(&self.state);
        state.writer_attempts.push(codec.to_string());

        if state.rejected_codecs.contains(codec) {
            return Err(MediaError::unsupported_codec(codec, "rejected by mock"));
        }
        if size.0 == 0 || size.1 == 0 {
            return Err(MediaError::open(path, "invalid frame size"));
        }

        // 與真實編碼器相同，開啟即建立目的檔
        let _ = fs::write(path, b"");

        state.outputs.insert(
            path.to_path_buf(),
            MockOutput {
                codec: codec.to_string(),
                fps,
                size,
                frames: Vec::new(),
                finished: false,
            },
        );

        Ok(Box::new(MockWriter {
            state: Arc::clone(&self.state),
            path: path.to_path_buf(),
            codec: codec.to_string(),
        }))
    }
}

struct MockReader {
    video: MockVideo,
    position: usize,
}

impl FrameReader for MockReader {
    fn read_frame(&mut self) -> Option<Frame> {
        if self.position >= self.video.frames {
            return None;
        }
        let frame = self.video.frame(self.position);
        self.position += 1;
        Some(frame)
    }

    fn seek(&mut self, position_ms: f64) -> Result<(), MediaError> {
        self.position = (position_ms.max(0.0) / 1000.0 * self.video.fps) as usize;
        Ok(())
    }

    fn property(&self, property: StreamProperty) -> f64 {
        match property {
            StreamProperty::FrameWidth => f64::from(self.video.width),
            StreamProperty::FrameHeight => f64::from(self.video.height),
            StreamProperty::Fps => self.video.fps,
            StreamProperty::FrameCount => self.video.reported_frame_count as f64,
        }
    }
}

struct MockWriter {
    state: Arc<Mutex<MockState>>,
    path: PathBuf,
    codec: String,
}

impl FrameWriter for MockWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), MediaError> {
        let mut state = lock(&self.state);
        if state.failing_codecs.contains(&self.codec) {
            return Err(MediaError::Encoder(format!("{} encoder exited", self.codec)));
        }

        let limit = state.fail_write_after;
        let output = state
            .outputs
            .get_mut(&self.path)
            .ok_or_else(|| MediaError::Write("output missing".to_string()))?;

        if limit.is_some_and(|limit| output.frames.len() >= limit) {
            return Err(MediaError::Write("mock write failure".to_string()));
        }

        output.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), MediaError> {
        let mut state = lock(&self.state);
        if state.fail_finish {
            return Err(MediaError::Encoder("mock encoder failure".to_string()));
        }
        if let Some(output) = state.outputs.get_mut(&self.path) {
            output.finished = true;
        }
        Ok(())
    }
}
