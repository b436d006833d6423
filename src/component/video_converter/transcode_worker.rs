//! 逐格轉檔工作
//!
//! 狀態依序為 `Idle → Reading → Writing → Done`，不會回到先前的狀態。
//! 進度與完成事件透過 channel 傳回呼叫端。

use super::conversion_job::ConversionJob;
use crate::config::CodecTable;
use crate::tools::{Frame, FrameWriter, MediaBackend, MediaError, StreamProperty};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

/// 來源沒有回報幀率時寫入端使用的幀率
pub const DEFAULT_FPS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Reading,
    Writing,
    Done { success: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub eta_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutcome {
    pub success: bool,
    pub destination: PathBuf,
    pub frames_written: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeEvent {
    StateChanged(WorkerState),
    Progress(ProgressUpdate),
    Finished(TranscodeOutcome),
}

/// 每處理 N 格回報一次進度，約每秒兩次
#[must_use]
pub fn progress_interval(fps: f64) -> u64 {
    ((fps / 2.0).floor() as u64).max(1)
}

/// 總影格數未知（0）時不回報進度
#[must_use]
pub fn progress_for(processed: u64, total: u64, fps: f64) -> Option<ProgressUpdate> {
    if total == 0 {
        return None;
    }

    let percent = (processed.saturating_mul(100) / total).min(100) as u8;
    let eta_seconds = if fps > 0.0 {
        total.saturating_sub(processed) as f64 / fps
    } else {
        0.0
    };

    Some(ProgressUpdate {
        percent,
        eta_seconds,
    })
}

fn report_progress(
    processed: u64,
    interval: u64,
    total_frames: u64,
    fps: f64,
    events: &Sender<TranscodeEvent>,
) {
    if processed % interval != 0 {
        return;
    }
    if let Some(update) = progress_for(processed, total_frames, fps) {
        let _ = events.send(TranscodeEvent::Progress(update));
    }
}

pub struct TranscodeWorker {
    job: ConversionJob,
    backend: Arc<dyn MediaBackend>,
    codec_table: CodecTable,
    state: WorkerState,
}

impl TranscodeWorker {
    #[must_use]
    pub fn new(job: ConversionJob, backend: Arc<dyn MediaBackend>, codec_table: CodecTable) -> Self {
        Self {
            job,
            backend,
            codec_table,
            state: WorkerState::Idle,
        }
    }

    #[must_use]
    pub const fn state(&self) -> WorkerState {
        self.state
    }

    #[must_use]
    pub const fn job(&self) -> &ConversionJob {
        &self.job
    }

    /// 在獨立執行緒上執行，事件從回傳的 handle 讀取
    pub fn spawn(self) -> Result<TranscodeHandle> {
        let (sender, events) = mpsc::channel();
        let destination = self.job.destination.clone();

        let thread = thread::Builder::new()
            .name("transcode-worker".to_string())
            .spawn(move || self.run(&sender))
            .context("無法啟動轉檔執行緒")?;

        Ok(TranscodeHandle {
            events,
            thread,
            destination,
        })
    }

    /// 執行到完成或失敗為止；接收端關閉不影響轉檔
    pub fn run(mut self, events: &Sender<TranscodeEvent>) -> TranscodeOutcome {
        info!(
            "開始轉檔: {} -> {}",
            self.job.source.display(),
            self.job.destination.display()
        );

        self.transition(WorkerState::Reading, events);

        let mut reader = match self.backend.open(&self.job.source) {
            Ok(reader) => reader,
            Err(e) => {
                error!("無法開啟來源影片: {e}");
                return self.finish(false, 0, events);
            }
        };

        let source_fps = reader.property(StreamProperty::Fps);
        let fps = if source_fps > 0.0 { source_fps } else { DEFAULT_FPS };
        let size = (
            reader.property(StreamProperty::FrameWidth).max(0.0) as u32,
            reader.property(StreamProperty::FrameHeight).max(0.0) as u32,
        );
        let total_frames = reader.property(StreamProperty::FrameCount).max(0.0) as u64;
        debug!(
            "來源資訊: {}x{} @ {fps:.3} fps, {total_frames} 格",
            size.0, size.1
        );

        // 編碼器要到收到第一格後才知道能否運作，因此第一格在開啟時一併寫入
        let first_frame = reader.read_frame();
        let Some(mut writer) = self.open_writer(fps, size, first_frame.as_ref()) else {
            return self.finish(false, 0, events);
        };

        self.transition(WorkerState::Writing, events);

        let interval = progress_interval(fps);
        let mut processed: u64 = 0;
        if first_frame.is_some() {
            processed = 1;
            report_progress(processed, interval, total_frames, fps, events);
        }

        while let Some(frame) = reader.read_frame() {
            if let Err(e) = writer.write_frame(&frame) {
                error!("寫入第 {} 格失敗: {e}", processed + 1);
                drop(writer);
                self.remove_partial_output();
                return self.finish(false, processed, events);
            }
            processed += 1;
            report_progress(processed, interval, total_frames, fps, events);
        }
        drop(reader);

        if let Err(e) = writer.finish() {
            error!("編碼器無法完成輸出: {e}");
            drop(writer);
            self.remove_partial_output();
            return self.finish(false, processed, events);
        }

        let _ = events.send(TranscodeEvent::Progress(ProgressUpdate {
            percent: 100,
            eta_seconds: 0.0,
        }));
        self.finish(true, processed, events)
    }

    /// 依副檔名選擇 codec，失敗時只以固定的備用 codec 重試一次
    fn open_writer(
        &self,
        fps: f64,
        size: (u32, u32),
        first_frame: Option<&Frame>,
    ) -> Option<Box<dyn FrameWriter>> {
        let destination = &self.job.destination;
        let codec = self.codec_table.resolve(destination);

        match self.start_writer(codec, fps, size, first_frame) {
            Ok(writer) => return Some(writer),
            Err(e) => warn!("無法以 {codec} 開啟輸出，改用備用編碼: {e}"),
        }

        let fallback = self.codec_table.fallback_codec();
        match self.start_writer(fallback, fps, size, first_frame) {
            Ok(writer) => {
                info!("使用備用編碼 {fallback} 輸出: {}", destination.display());
                Some(writer)
            }
            Err(e) => {
                error!("備用編碼 {fallback} 也無法開啟輸出: {e}");
                None
            }
        }
    }

    /// 開啟寫入端並送入第一格；編碼器無法接受時視為開啟失敗
    fn start_writer(
        &self,
        codec: &str,
        fps: f64,
        size: (u32, u32),
        first_frame: Option<&Frame>,
    ) -> Result<Box<dyn FrameWriter>, MediaError> {
        let mut writer = self
            .backend
            .open_writer(&self.job.destination, codec, fps, size)?;

        let started = match first_frame {
            Some(frame) => writer
                .write_frame(frame)
                .and_then(|()| writer.confirm_open()),
            None => writer.confirm_open(),
        };

        if let Err(e) = started {
            drop(writer);
            self.remove_partial_output();
            return Err(MediaError::unsupported_codec(codec, e.to_string()));
        }

        Ok(writer)
    }

    fn remove_partial_output(&self) {
        let destination = &self.job.destination;
        if !destination.exists() {
            return;
        }

        match fs::remove_file(destination) {
            Ok(()) => info!("已刪除未完成的輸出檔案: {}", destination.display()),
            Err(e) => warn!("無法刪除未完成的輸出檔案 {}: {e}", destination.display()),
        }
    }

    fn transition(&mut self, next: WorkerState, events: &Sender<TranscodeEvent>) {
        debug!("轉檔狀態: {:?} -> {next:?}", self.state);
        self.state = next;
        let _ = events.send(TranscodeEvent::StateChanged(next));
    }

    fn finish(
        mut self,
        success: bool,
        frames_written: u64,
        events: &Sender<TranscodeEvent>,
    ) -> TranscodeOutcome {
        self.transition(WorkerState::Done { success }, events);

        let outcome = TranscodeOutcome {
            success,
            destination: self.job.destination.clone(),
            frames_written,
        };

        if success {
            info!(
                "轉檔完成 ({frames_written} 格): {}",
                outcome.destination.display()
            );
        } else {
            error!("轉檔失敗: {}", outcome.destination.display());
        }

        let _ = events.send(TranscodeEvent::Finished(outcome.clone()));
        outcome
    }
}

/// 執行中的轉檔工作
pub struct TranscodeHandle {
    events: Receiver<TranscodeEvent>,
    thread: JoinHandle<TranscodeOutcome>,
    destination: PathBuf,
}

impl TranscodeHandle {
    /// 工作結束後事件串流隨之關閉
    #[must_use]
    pub const fn events(&self) -> &Receiver<TranscodeEvent> {
        &self.events
    }

    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// 等待工作結束；執行緒異常結束時視為失敗
    pub fn wait(self) -> TranscodeOutcome {
        self.thread.join().unwrap_or_else(|_| {
            error!("轉檔執行緒異常結束: {}", self.destination.display());
            TranscodeOutcome {
                success: false,
                destination: self.destination,
                frames_written: 0,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::{MockBackend, MockVideo};
    use tempfile::tempdir;

    fn codec_table() -> CodecTable {
        Config::load_embedded_codec_table().unwrap()
    }

    fn run_job(
        backend: &MockBackend,
        source: &Path,
        destination: &Path,
    ) -> (TranscodeOutcome, Vec<TranscodeEvent>) {
        let (sender, receiver) = mpsc::channel();
        let worker = TranscodeWorker::new(
            ConversionJob::new(source, destination),
            Arc::new(backend.clone()),
            codec_table(),
        );
        let outcome = worker.run(&sender);
        drop(sender);
        (outcome, receiver.iter().collect())
    }

    fn states(events: &[TranscodeEvent]) -> Vec<WorkerState> {
        events
            .iter()
            .filter_map(|e| match e {
                TranscodeEvent::StateChanged(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    fn percents(events: &[TranscodeEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                TranscodeEvent::Progress(update) => Some(update.percent),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_progress_interval() {
        assert_eq!(progress_interval(30.0), 15);
        assert_eq!(progress_interval(25.0), 12);
        assert_eq!(progress_interval(29.97), 14);
        assert_eq!(progress_interval(1.0), 1);
        assert_eq!(progress_interval(0.0), 1);
    }

    #[test]
    fn test_progress_for() {
        let update = progress_for(50, 100, 25.0).unwrap();
        assert_eq!(update.percent, 50);
        assert!((update.eta_seconds - 2.0).abs() < f64::EPSILON);

        assert!(progress_for(10, 0, 25.0).is_none());

        // 容器回報的影格數偏少時不超過 100
        let update = progress_for(120, 100, 25.0).unwrap();
        assert_eq!(update.percent, 100);
        assert!(update.eta_seconds.abs() < f64::EPSILON);
    }

    #[test]
    fn test_successful_transcode() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let destination = dir.path().join("out.avi");

        let backend = MockBackend::new();
        let video = MockVideo::new(4, 2, 25.0, 50);
        backend.add_video(&source, video);

        let (outcome, events) = run_job(&backend, &source, &destination);

        assert!(outcome.success);
        assert_eq!(outcome.destination, destination);
        assert_eq!(outcome.frames_written, 50);

        let output = backend.output(&destination).unwrap();
        assert_eq!(output.codec, "XVID");
        assert_eq!(output.size, (4, 2));
        assert!(output.finished);
        assert_eq!(output.frames.len(), 50);
        assert_eq!(output.frames[7], video.frame(7));

        assert_eq!(
            states(&events),
            vec![
                WorkerState::Reading,
                WorkerState::Writing,
                WorkerState::Done { success: true }
            ]
        );
        assert_eq!(percents(&events), vec![24, 48, 72, 96, 100]);
        assert!(matches!(events.last(), Some(TranscodeEvent::Finished(o)) if o.success));
    }

    #[test]
    fn test_source_open_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("out.mp4");
        let backend = MockBackend::new();

        let (outcome, events) = run_job(&backend, &dir.path().join("missing.mp4"), &destination);

        assert!(!outcome.success);
        assert_eq!(outcome.destination, destination);
        assert!(!destination.exists());
        assert!(backend.writer_attempts().is_empty());
        assert_eq!(
            states(&events),
            vec![WorkerState::Reading, WorkerState::Done { success: false }]
        );
        assert!(percents(&events).is_empty());
    }

    #[test]
    fn test_fallback_codec_retry() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let destination = dir.path().join("out.mkv");

        let backend = MockBackend::new();
        backend.add_video(&source, MockVideo::new(2, 2, 30.0, 10));
        backend.reject_codec("X264");

        let (outcome, _) = run_job(&backend, &source, &destination);

        assert!(outcome.success);
        assert_eq!(backend.writer_attempts(), vec!["X264", "XVID"]);
        assert_eq!(backend.output(&destination).unwrap().codec, "XVID");
    }

    #[test]
    fn test_encoder_failing_on_first_frame_uses_fallback() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let destination = dir.path().join("out.mkv");

        let backend = MockBackend::new();
        let video = MockVideo::new(3, 2, 30.0, 20);
        backend.add_video(&source, video);
        backend.fail_codec_on_write("X264");

        let (outcome, events) = run_job(&backend, &source, &destination);

        assert!(outcome.success);
        assert_eq!(outcome.frames_written, 20);
        assert_eq!(backend.writer_attempts(), vec!["X264", "XVID"]);

        let output = backend.output(&destination).unwrap();
        assert_eq!(output.codec, "XVID");
        assert_eq!(output.frames.len(), 20);
        assert_eq!(output.frames[0], video.frame(0));
        assert_eq!(
            states(&events),
            vec![
                WorkerState::Reading,
                WorkerState::Writing,
                WorkerState::Done { success: true }
            ]
        );
    }

    #[test]
    fn test_encoder_failing_on_first_frame_without_fallback() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let destination = dir.path().join("out.mkv");

        let backend = MockBackend::new();
        backend.add_video(&source, MockVideo::new(3, 2, 30.0, 20));
        backend.fail_codec_on_write("X264");
        backend.fail_codec_on_write("XVID");

        let (outcome, events) = run_job(&backend, &source, &destination);

        assert!(!outcome.success);
        assert_eq!(outcome.frames_written, 0);
        assert_eq!(backend.writer_attempts(), vec!["X264", "XVID"]);
        assert!(!destination.exists());
        assert_eq!(
            states(&events),
            vec![WorkerState::Reading, WorkerState::Done { success: false }]
        );
    }

    #[test]
    fn test_fallback_failure() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let destination = dir.path().join("out.webm");

        let backend = MockBackend::new();
        backend.add_video(&source, MockVideo::new(2, 2, 30.0, 10));
        backend.reject_codec("VP90");
        backend.reject_codec("XVID");

        let (outcome, events) = run_job(&backend, &source, &destination);

        assert!(!outcome.success);
        assert_eq!(backend.writer_attempts(), vec!["VP90", "XVID"]);
        assert!(!destination.exists());
        assert_eq!(
            states(&events),
            vec![WorkerState::Reading, WorkerState::Done { success: false }]
        );
    }

    #[test]
    fn test_unknown_extension_uses_default_codec() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let destination = dir.path().join("out.xyz");

        let backend = MockBackend::new();
        backend.add_video(&source, MockVideo::new(2, 2, 30.0, 3));

        let (outcome, _) = run_job(&backend, &source, &destination);

        assert!(outcome.success);
        assert_eq!(backend.writer_attempts(), vec!["XVID"]);
    }

    #[test]
    fn test_write_failure_removes_partial_output() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let destination = dir.path().join("out.mp4");

        let backend = MockBackend::new();
        backend.add_video(&source, MockVideo::new(2, 2, 30.0, 40));
        backend.fail_writes_after(10);

        let (outcome, events) = run_job(&backend, &source, &destination);

        assert!(!outcome.success);
        assert_eq!(outcome.frames_written, 10);
        assert!(!destination.exists());
        assert_eq!(
            states(&events).last(),
            Some(&WorkerState::Done { success: false })
        );
        assert!(!percents(&events).contains(&100));
    }

    #[test]
    fn test_finish_failure_removes_partial_output() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let destination = dir.path().join("out.mp4");

        let backend = MockBackend::new();
        backend.add_video(&source, MockVideo::new(2, 2, 30.0, 5));
        backend.fail_finish();

        let (outcome, _) = run_job(&backend, &source, &destination);

        assert!(!outcome.success);
        assert!(!destination.exists());
    }

    #[test]
    fn test_unknown_frame_count_reports_only_final_progress() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.mkv");
        let destination = dir.path().join("out.mp4");

        let backend = MockBackend::new();
        backend.add_video(
            &source,
            MockVideo::new(2, 2, 30.0, 90).with_reported_frame_count(0),
        );

        let (outcome, events) = run_job(&backend, &source, &destination);

        assert!(outcome.success);
        assert_eq!(outcome.frames_written, 90);
        assert_eq!(percents(&events), vec![100]);
    }

    #[test]
    fn test_zero_fps_uses_default_writer_fps() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let destination = dir.path().join("out.mp4");

        let backend = MockBackend::new();
        backend.add_video(&source, MockVideo::new(2, 2, 0.0, 4));

        let (outcome, _) = run_job(&backend, &source, &destination);

        assert!(outcome.success);
        let output = backend.output(&destination).unwrap();
        assert!((output.fps - DEFAULT_FPS).abs() < f64::EPSILON);
    }

    #[test]
    fn test_spawn_delivers_events() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        let destination = dir.path().join("out.mov");

        let backend = MockBackend::new();
        backend.add_video(&source, MockVideo::new(2, 2, 30.0, 30));

        let worker = TranscodeWorker::new(
            ConversionJob::new(&source, &destination),
            Arc::new(backend.clone()),
            codec_table(),
        );
        assert_eq!(worker.state(), WorkerState::Idle);

        let handle = worker.spawn().unwrap();
        let events: Vec<TranscodeEvent> = handle.events().iter().collect();
        let outcome = handle.wait();

        assert!(outcome.success);
        assert_eq!(outcome.frames_written, 30);
        assert_eq!(percents(&events), vec![50, 100, 100]);
        assert!(matches!(events.last(), Some(TranscodeEvent::Finished(_))));
    }
}
