use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use facecapture_core::capture::capture_controller::CaptureController;
use facecapture_core::capture::domain::capture_output::CaptureOutput;
use facecapture_core::capture::domain::session_state::SessionState;
use facecapture_core::detection::domain::face_detector::FaceDetector;
use facecapture_core::detection::infrastructure::model_resolver::{
    self, ModelResolveError, ModelSource,
};
use facecapture_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use facecapture_core::pipeline::capture_session_use_case::{CaptureSessionUseCase, OverlayOutput};
use facecapture_core::pipeline::session_logger::StdoutSessionLogger;
use facecapture_core::rendering::domain::progress_ring_renderer::ProgressRingRenderer;
use facecapture_core::rendering::infrastructure::raster_surface::RasterSurface;
use facecapture_core::shared::capture_config::CaptureConfig;
use facecapture_core::shared::clock::{Clock, FrameRateClock, MonotonicClock};
use facecapture_core::shared::constants::BLAZEFACE_MODEL_NAME;
use facecapture_core::shared::video_metadata::VideoMetadata;
use facecapture_core::video::domain::video_reader::VideoReader;
use facecapture_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use facecapture_core::video::infrastructure::image_file_writer::ImageFileWriter;
use facecapture_core::video::infrastructure::jpeg_encoder::JpegEncoder;

/// Guided frontal face capture from a video file or capture device.
///
/// Watches the source until a frontal, centered face has held still for the
/// dwell time, then emits that frame as a JPEG.
#[derive(Parser)]
#[command(name = "facecapture")]
struct Cli {
    /// Input video file, or device path/name when --device is given.
    input: PathBuf,

    /// Open the input through this ffmpeg capture format (v4l2, avfoundation, dshow).
    #[arg(long)]
    device: Option<String>,

    /// Write the captured JPEG to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the captured image on stdout as a `data:image/jpeg;base64,` URL.
    #[arg(long)]
    base64: bool,

    /// JSON config file (defaults to the per-user config if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Continuous frontal, centered time required before capture.
    #[arg(long)]
    dwell_ms: Option<u64>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Outline the detected face: green when frontal, red otherwise.
    #[arg(long)]
    show_face_box: bool,

    /// Save rendered overlay frames (PNG) to this directory.
    #[arg(long)]
    overlay_dir: Option<PathBuf>,

    /// Save every Nth overlay frame.
    #[arg(long, default_value = "1")]
    overlay_every: usize,

    /// Directory holding blazeface_short_range.onnx.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Download the detector model from this URL when no local copy exists.
    #[arg(long)]
    model_url: Option<String>,

    /// Keep reading the source after capture instead of stopping.
    #[arg(long)]
    keep_going: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let config = load_config(&cli)?;

    let mut reader = open_reader(&cli);
    let metadata = reader.open(&cli.input)?;

    let surface = RasterSurface::new(metadata.width, metadata.height)?;
    let renderer = ProgressRingRenderer::for_surface(&surface, config.zone);
    let encoder = JpegEncoder::new(config.jpeg_quality_percent())?;
    let detector = build_detector(&cli, &config)?;

    let controller = CaptureController::new(detector, Box::new(encoder), renderer, &config)
        .with_sink(Box::new(|output: &CaptureOutput| {
            eprintln!();
            log::info!("Capture ready ({} bytes of data URL)", output.image_base64.len());
        }));

    let mut use_case = CaptureSessionUseCase::new(
        reader,
        controller,
        Box::new(surface),
        build_clock(&metadata)?,
        Box::new(StdoutSessionLogger::default()),
    )
    .with_stop_on_capture(!cli.keep_going)
    .with_progress(Box::new(|frames: usize, progress: f64| {
        eprint!("\rFrame {frames}: dwell {:3.0}%", progress * 100.0);
        true
    }));

    if let Some(dir) = &cli.overlay_dir {
        use_case = use_case.with_overlay(OverlayOutput {
            writer: Box::new(ImageFileWriter::new()),
            dir: dir.clone(),
            every: cli.overlay_every,
        });
    }

    let state = use_case.execute()?;
    eprintln!();

    let mut stdout = io::stdout().lock();
    let data_url_out: Option<&mut dyn Write> = if cli.base64 {
        Some(&mut stdout)
    } else {
        None
    };
    write_output(&state, cli.output.as_deref(), data_url_out)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.device.is_none() && !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if cli.output.is_none() && !cli.base64 {
        return Err("Nothing to do: pass --output and/or --base64".into());
    }
    if cli.overlay_every == 0 {
        return Err("--overlay-every must be at least 1".into());
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<CaptureConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => CaptureConfig::load_from(path)?,
        None => CaptureConfig::load()?,
    };
    if let Some(ms) = cli.dwell_ms {
        config.required_dwell_ms = ms;
    }
    if let Some(confidence) = cli.confidence {
        config.min_detection_confidence = confidence;
    }
    if cli.show_face_box {
        config.show_face_box = true;
    }
    config.validate()?;
    Ok(config)
}

fn open_reader(cli: &Cli) -> Box<dyn VideoReader> {
    match &cli.device {
        Some(format) => Box::new(FfmpegReader::for_device(format)),
        None => Box::new(FfmpegReader::new()),
    }
}

/// Files replay on their own timeline; live devices use the wall clock.
fn build_clock(metadata: &VideoMetadata) -> Result<Box<dyn Clock>, Box<dyn std::error::Error>> {
    if metadata.has_frame_rate() {
        Ok(Box::new(FrameRateClock::new(metadata.fps)?))
    } else {
        Ok(Box::new(MonotonicClock::new()))
    }
}

fn build_detector(
    cli: &Cli,
    config: &CaptureConfig,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {BLAZEFACE_MODEL_NAME}");
    let source = ModelSource {
        name: BLAZEFACE_MODEL_NAME,
        bundled_dir: cli.model_dir.as_deref(),
        url: cli.model_url.as_deref(),
    };
    let model_path =
        model_resolver::resolve(&source, Some(Box::new(download_progress))).map_err(with_flag_hint)?;
    if cli.model_url.is_some() {
        eprintln!();
    }

    Ok(Box::new(OnnxBlazefaceDetector::new(
        &model_path,
        config.min_detection_confidence,
    )?))
}

/// Points a missing model at the flags that supply one.
fn with_flag_hint(e: ModelResolveError) -> Box<dyn std::error::Error> {
    match e {
        ModelResolveError::NotFound { .. } => format!(
            "{e}. Pass --model-dir <DIR> containing {BLAZEFACE_MODEL_NAME}, \
             or --model-url <URL> to download it"
        )
        .into(),
        other => other.into(),
    }
}

fn write_output(
    state: &SessionState,
    output: Option<&Path>,
    data_url_out: Option<&mut dyn Write>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !state.is_latched() {
        return Err("Source ended before a frontal, centered face was captured".into());
    }
    if let Some(path) = output {
        std::fs::write(path, state.output.image_bytes()?)?;
        log::info!("Capture written to {}", path.display());
    }
    if let Some(out) = data_url_out {
        writeln!(out, "{}", state.output.image_base64)?;
        out.flush()?;
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facecapture_core::capture::domain::session_state::CapturePhase;

    /// Stands in for a stdout whose reader has gone away.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    fn captured() -> SessionState {
        SessionState {
            phase: CapturePhase::Latched,
            output: CaptureOutput::from_jpeg(&[0xFF, 0xD8, 0xFF]),
            ..SessionState::new()
        }
    }

    #[test]
    fn test_write_output_prints_data_url_line() {
        let mut out = Vec::new();
        write_output(&captured(), None, Some(&mut out)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "data:image/jpeg;base64,/9j/\n");
    }

    #[test]
    fn test_write_output_fails_when_stdout_is_closed() {
        let mut out = ClosedPipe;
        let err = write_output(&captured(), None, Some(&mut out)).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("pipe"));
    }

    #[test]
    fn test_write_output_saves_raw_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.jpg");
        write_output(&captured(), Some(&path), None).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_write_output_without_capture_is_error() {
        let mut out = Vec::new();
        assert!(write_output(&SessionState::new(), None, Some(&mut out)).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_model_error_names_flags() {
        let err = with_flag_hint(ModelResolveError::NotFound {
            name: BLAZEFACE_MODEL_NAME.to_string(),
            searched: vec![PathBuf::from("/cache/blazeface_short_range.onnx")],
        });
        let message = err.to_string();
        assert!(message.contains("--model-dir"));
        assert!(message.contains("--model-url"));
    }

    #[test]
    fn test_other_model_errors_pass_through() {
        let err = with_flag_hint(ModelResolveError::NoCacheDir);
        assert_eq!(err.to_string(), "could not determine cache directory");
    }
}
