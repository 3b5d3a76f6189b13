use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::capture_controller::CaptureController;
use crate::capture::domain::session_state::SessionState;
use crate::pipeline::session_logger::SessionLogger;
use crate::rendering::domain::drawing_surface::DrawingSurface;
use crate::shared::clock::Clock;
use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

const DEFAULT_CHANNEL_CAPACITY: usize = 4;

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// A decoded frame with the timestamp taken when the reader produced it.
type StampedFrame = (Frame, Duration);

/// `(frames_processed, dwell_progress)`; return `false` to stop the session.
pub type SessionProgressFn = Box<dyn Fn(usize, f64) -> bool + Send>;

/// Rendered frames saved to disk while the session runs.
pub struct OverlayOutput {
    pub writer: Box<dyn ImageWriter>,
    pub dir: PathBuf,
    /// Save every n-th frame; 1 saves all of them.
    pub every: usize,
}

/// Drives one capture session from an opened frame source.
///
/// Layout: `reader thread [clock] → bounded channel → driver [step, overlay]`.
/// Frames are stamped as they leave the reader, so time spent queued behind a
/// slow detector still counts toward the dwell. The driver runs steps strictly
/// in order, so at most one detector call is in flight. Single use: `execute`
/// consumes the reader and the clock.
pub struct CaptureSessionUseCase {
    reader: Option<Box<dyn VideoReader>>,
    controller: CaptureController,
    surface: Box<dyn DrawingSurface>,
    clock: Option<Box<dyn Clock>>,
    logger: Box<dyn SessionLogger>,
    overlay: Option<OverlayOutput>,
    stop_on_capture: bool,
    on_progress: Option<SessionProgressFn>,
    cancelled: Arc<AtomicBool>,
    channel_capacity: usize,
}

impl CaptureSessionUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        controller: CaptureController,
        surface: Box<dyn DrawingSurface>,
        clock: Box<dyn Clock>,
        logger: Box<dyn SessionLogger>,
    ) -> Self {
        Self {
            reader: Some(reader),
            controller,
            surface,
            clock: Some(clock),
            logger,
            overlay: None,
            stop_on_capture: true,
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_overlay(mut self, overlay: OverlayOutput) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Keep consuming frames after capture; the latched session only redraws.
    pub fn with_stop_on_capture(mut self, stop: bool) -> Self {
        self.stop_on_capture = stop;
        self
    }

    pub fn with_progress(mut self, on_progress: SessionProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Shared flag that stops frame delivery when set. Never alters output.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Runs until the source ends, the session is cancelled or, with
    /// stop-on-capture, the output slot is written. Returns the final state.
    pub fn execute(&mut self) -> Result<SessionState, Box<dyn std::error::Error>> {
        let (Some(reader), Some(clock)) = (self.reader.take(), self.clock.take()) else {
            return Err("Session already executed".into());
        };

        let (frame_tx, frame_rx) =
            crossbeam_channel::bounded::<Result<StampedFrame, SendError>>(self.channel_capacity);
        let reader_handle = spawn_reader(reader, clock, frame_tx, Arc::clone(&self.cancelled));

        let result = self.run_driver_loop(frame_rx);

        let join_error = match reader_handle.join() {
            Ok(mut reader) => {
                reader.close();
                None
            }
            Err(_) => Some("Reader thread panicked"),
        };

        self.logger.summary();
        let state = result?;
        if let Some(e) = join_error {
            return Err(e.into());
        }
        Ok(state)
    }

    fn run_driver_loop(
        &mut self,
        frame_rx: crossbeam_channel::Receiver<Result<StampedFrame, SendError>>,
    ) -> Result<SessionState, Box<dyn std::error::Error>> {
        let mut state = SessionState::new();
        let mut processed = 0usize;

        for frame_result in frame_rx.iter() {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }
            self.logger.metric("reader_queue_depth", frame_rx.len() as f64);

            let (frame, now) = frame_result.map_err(|e| e.to_string())?;

            let t0 = Instant::now();
            let outcome = self
                .controller
                .step(state, &frame, now, self.surface.as_mut())?;
            self.logger
                .timing("step", t0.elapsed().as_secs_f64() * 1000.0);

            state = outcome.state;
            processed += 1;
            self.logger.frame(frame.index(), outcome.progress);

            self.write_overlay(frame.index())?;

            if outcome.captured.is_some() {
                self.logger
                    .info(&format!("Captured face at frame {}", frame.index()));
                if self.stop_on_capture {
                    break;
                }
            }

            if let Some(callback) = &self.on_progress {
                if !callback(processed, outcome.progress) {
                    self.logger.info("Session stopped by caller");
                    break;
                }
            }
        }

        // Unblocks the reader if it is waiting on a full channel.
        self.cancelled.store(true, Ordering::Relaxed);
        drop(frame_rx);
        Ok(state)
    }

    fn write_overlay(&mut self, index: usize) -> Result<(), Box<dyn std::error::Error>> {
        let Some(overlay) = &self.overlay else {
            return Ok(());
        };
        if index % overlay.every.max(1) != 0 {
            return Ok(());
        }
        let Some(snapshot) = self.surface.snapshot() else {
            return Ok(());
        };

        let t0 = Instant::now();
        let path = overlay.dir.join(format!("frame_{index:06}.png"));
        overlay.writer.write(&path, &snapshot)?;
        self.logger
            .timing("overlay", t0.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }
}

fn spawn_reader(
    mut reader: Box<dyn VideoReader>,
    mut clock: Box<dyn Clock>,
    frame_tx: crossbeam_channel::Sender<Result<StampedFrame, SendError>>,
    cancelled: Arc<AtomicBool>,
) -> std::thread::JoinHandle<Box<dyn VideoReader>> {
    std::thread::spawn(move || {
        for frame_result in reader.frames() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let mapped = frame_result
                .map(|frame| {
                    let now = clock.now(&frame);
                    (frame, now)
                })
                .map_err(|e| -> SendError { e.to_string().into() });
            if frame_tx.send(mapped).is_err() {
                break;
            }
        }
        reader
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::capture_output::CaptureOutput;
    use crate::detection::domain::detection::{BoundingBox, Detection, Keypoint};
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::pipeline::session_logger::NullSessionLogger;
    use crate::rendering::domain::progress_ring_renderer::ProgressRingRenderer;
    use crate::rendering::infrastructure::raster_surface::RasterSurface;
    use crate::shared::capture_config::CaptureConfig;
    use crate::shared::clock::FrameRateClock;
    use crate::shared::video_metadata::VideoMetadata;
    use crate::video::domain::image_encoder::ImageEncoder;
    use crate::video::infrastructure::image_file_writer::ImageFileWriter;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use approx::assert_relative_eq;
    use std::sync::Mutex;

    /// Yields `count` black frames, optionally failing at one index.
    struct StubReader {
        count: usize,
        fail_at: Option<usize>,
        closed: Arc<AtomicBool>,
    }

    impl StubReader {
        fn boxed(count: usize, fail_at: Option<usize>) -> (Box<dyn VideoReader>, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            let reader = Box::new(Self {
                count,
                fail_at,
                closed: Arc::clone(&closed),
            });
            (reader, closed)
        }
    }

    impl VideoReader for StubReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            Err("not used".into())
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            let fail_at = self.fail_at;
            Box::new((0..self.count).map(move |i| -> Result<Frame, Box<dyn std::error::Error>> {
                if Some(i) == fail_at {
                    Err("corrupt packet".into())
                } else {
                    Ok(Frame::new(vec![0; 32 * 24 * 3], 32, 24, 3, i))
                }
            }))
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct CenteredFace {
        calls: Arc<AtomicUsize>,
    }

    impl FaceDetector for CenteredFace {
        fn detect(&mut self, _: &Frame) -> Result<Option<Detection>, Box<dyn std::error::Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Detection::new(
                BoundingBox {
                    x_center: 0.5,
                    y_center: 0.5,
                    width: 0.3,
                    height: 0.4,
                },
                vec![
                    Keypoint::new(0.45, 0.45),
                    Keypoint::new(0.55, 0.45),
                    Keypoint::new(0.5, 0.52),
                ],
                0.9,
            )))
        }
    }

    /// Frame-rate clock that records which thread stamped each frame.
    struct ThreadRecordingClock {
        inner: FrameRateClock,
        threads: Arc<Mutex<Vec<std::thread::ThreadId>>>,
    }

    impl Clock for ThreadRecordingClock {
        fn now(&mut self, frame: &Frame) -> Duration {
            self.threads
                .lock()
                .unwrap()
                .push(std::thread::current().id());
            self.inner.now(frame)
        }
    }

    struct FixedEncoder;

    impl ImageEncoder for FixedEncoder {
        fn encode(&self, _: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
            Ok(b"jpeg".to_vec())
        }
    }

    struct Setup {
        session: CaptureSessionUseCase,
        detector_calls: Arc<AtomicUsize>,
        sunk: Arc<Mutex<Vec<CaptureOutput>>>,
        closed: Arc<AtomicBool>,
    }

    /// 10 fps source, so frame `i` is stamped at `i * 100ms`.
    fn setup(frames: usize, fail_at: Option<usize>, dwell_ms: u64) -> Setup {
        let (reader, closed) = StubReader::boxed(frames, fail_at);
        let detector_calls = Arc::new(AtomicUsize::new(0));
        let sunk = Arc::new(Mutex::new(Vec::new()));
        let sink_log = Arc::clone(&sunk);

        let surface = RasterSurface::new(32, 24).unwrap();
        let config = CaptureConfig {
            required_dwell_ms: dwell_ms,
            ..CaptureConfig::default()
        };
        let renderer = ProgressRingRenderer::for_surface(&surface, config.zone);
        let controller = CaptureController::new(
            Box::new(CenteredFace {
                calls: Arc::clone(&detector_calls),
            }),
            Box::new(FixedEncoder),
            renderer,
            &config,
        )
        .with_sink(Box::new(move |output: &CaptureOutput| {
            sink_log.lock().unwrap().push(output.clone())
        }));

        let session = CaptureSessionUseCase::new(
            reader,
            controller,
            Box::new(surface),
            Box::new(FrameRateClock::new(10.0).unwrap()),
            Box::new(NullSessionLogger),
        );
        Setup {
            session,
            detector_calls,
            sunk,
            closed,
        }
    }

    #[test]
    fn test_stops_at_capture_by_default() {
        let mut s = setup(20, None, 500);
        let state = s.session.execute().unwrap();

        assert!(state.is_latched());
        assert_eq!(state.output.image_base64, "data:image/jpeg;base64,anBlZw==");
        // frames 0..=5 reach 500ms of dwell
        assert_eq!(s.detector_calls.load(Ordering::SeqCst), 6);
        assert_eq!(s.sunk.lock().unwrap().len(), 1);
        assert!(s.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_frames_are_stamped_on_the_reader_thread() {
        let (reader, _) = StubReader::boxed(4, None);
        let threads = Arc::new(Mutex::new(Vec::new()));
        let config = CaptureConfig::default();
        let surface = RasterSurface::new(32, 24).unwrap();
        let renderer = ProgressRingRenderer::for_surface(&surface, config.zone);
        let controller = CaptureController::new(
            Box::new(CenteredFace {
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(FixedEncoder),
            renderer,
            &config,
        );
        let mut session = CaptureSessionUseCase::new(
            reader,
            controller,
            Box::new(surface),
            Box::new(ThreadRecordingClock {
                inner: FrameRateClock::new(10.0).unwrap(),
                threads: Arc::clone(&threads),
            }),
            Box::new(NullSessionLogger),
        );

        let state = session.execute().unwrap();

        // 4 frames at 10 fps: the window opened at 0ms and reached 300ms
        assert_relative_eq!(state.dwell.progress(), 0.15, epsilon = 1e-9);
        let threads = threads.lock().unwrap();
        assert_eq!(threads.len(), 4);
        assert!(threads.iter().all(|id| *id != std::thread::current().id()));
    }

    #[test]
    fn test_continues_after_capture_without_detecting() {
        let s = setup(12, None, 500);
        let mut session = s.session.with_stop_on_capture(false);
        let state = session.execute().unwrap();

        assert!(state.is_latched());
        assert_eq!(s.detector_calls.load(Ordering::SeqCst), 6);
        assert_eq!(s.sunk.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_source_ending_before_dwell_leaves_output_empty() {
        let mut s = setup(3, None, 2000);
        let state = s.session.execute().unwrap();

        assert!(!state.is_latched());
        assert!(state.output.is_empty());
        assert!(state.dwell.progress() > 0.0);
    }

    #[test]
    fn test_reader_error_aborts_session() {
        let mut s = setup(10, Some(2), 2000);
        let err = s.session.execute().unwrap_err();
        assert!(err.to_string().contains("corrupt packet"));
    }

    #[test]
    fn test_progress_callback_can_stop_session() {
        let s = setup(50, None, 2000);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = Arc::clone(&seen);
        let mut session = s.session.with_progress(Box::new(move |processed: usize, _: f64| {
            seen_cb.store(processed, Ordering::SeqCst);
            processed < 4
        }));

        let state = session.execute().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 4);
        assert!(!state.is_latched());
    }

    #[test]
    fn test_cancel_before_start_processes_nothing() {
        let s = setup(10, None, 2000);
        s.session.cancel_flag().store(true, Ordering::SeqCst);
        let mut session = s.session;

        let state = session.execute().unwrap();
        assert_eq!(s.detector_calls.load(Ordering::SeqCst), 0);
        assert_eq!(state, SessionState::new());
    }

    #[test]
    fn test_execute_twice_fails() {
        let mut s = setup(1, None, 2000);
        s.session.execute().unwrap();
        assert!(s.session.execute().is_err());
    }

    #[test]
    fn test_overlay_frames_written_at_interval() {
        let dir = tempfile::tempdir().unwrap();
        let s = setup(5, None, 2000);
        let mut session = s.session.with_overlay(OverlayOutput {
            writer: Box::new(ImageFileWriter::new()),
            dir: dir.path().to_path_buf(),
            every: 2,
        });
        session.execute().unwrap();

        for (index, expected) in [(0, true), (1, false), (2, true), (4, true)] {
            let path = dir.path().join(format!("frame_{index:06}.png"));
            assert_eq!(path.exists(), expected, "{}", path.display());
        }
    }
}
