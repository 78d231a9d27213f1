// End-to-end recorder behavior over fake capture and encoding backends.
// The fakes let every lifecycle property run without a display, screen
// recording permission, or an ffmpeg install.

use screentape::recording::storage::load_metadata;
use screentape::{
    CaptureBackend, CaptureError, CaptureRegion, CaptureSource, EncoderError, Frame, RawImage,
    RecorderError, VideoEncoder, VideoRecorder,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Fakes
// =============================================================================

struct FakeSource {
    screen: (u32, u32),
    fail_after: Option<u64>,
    grabbed: u64,
}

impl CaptureSource for FakeSource {
    fn screen_size(&self) -> (u32, u32) {
        self.screen
    }

    fn grab(&mut self, region: CaptureRegion) -> Result<RawImage, CaptureError> {
        if let Some(limit) = self.fail_after {
            if self.grabbed >= limit {
                return Err(CaptureError::Frame("injected capture failure".into()));
            }
        }
        self.grabbed += 1;
        Ok(RawImage {
            width: region.width,
            height: region.height,
            data: vec![0u8; region.frame_len()],
        })
    }
}

struct FakeBackend {
    screen: (u32, u32),
    fail_after: Option<u64>,
    fail_open: bool,
    opens: Arc<AtomicU64>,
}

impl FakeBackend {
    fn new(screen: (u32, u32)) -> Self {
        Self {
            screen,
            fail_after: None,
            fail_open: false,
            opens: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl CaptureBackend for FakeBackend {
    fn open(&self, _frame_rate: u32) -> Result<Box<dyn CaptureSource>, CaptureError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(CaptureError::PermissionDenied);
        }
        Ok(Box::new(FakeSource {
            screen: self.screen,
            fail_after: self.fail_after,
            grabbed: 0,
        }))
    }
}

#[derive(Debug, Clone)]
struct EncodeCall {
    frame_count: usize,
    width: u32,
    height: u32,
    frame_rate: u32,
    output: PathBuf,
}

#[derive(Clone, Copy)]
enum EncoderMode {
    Succeed,
    FailExit,
    FailTarget,
}

struct FakeEncoder {
    mode: EncoderMode,
    calls: Arc<Mutex<Vec<EncodeCall>>>,
}

impl FakeEncoder {
    fn new(mode: EncoderMode) -> (Self, Arc<Mutex<Vec<EncodeCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                mode,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl VideoEncoder for FakeEncoder {
    fn encode(
        &self,
        frames: &[Frame],
        width: u32,
        height: u32,
        frame_rate: u32,
        output_path: &Path,
    ) -> Result<PathBuf, EncoderError> {
        self.calls.lock().unwrap().push(EncodeCall {
            frame_count: frames.len(),
            width,
            height,
            frame_rate,
            output: output_path.to_path_buf(),
        });

        if frames.is_empty() {
            return Err(EncoderError::NoFrames);
        }

        match self.mode {
            EncoderMode::Succeed => {
                std::fs::write(output_path, b"fake-mp4-container").unwrap();
                Ok(output_path.to_path_buf())
            }
            EncoderMode::FailExit => Err(EncoderError::Exit { code: Some(1) }),
            EncoderMode::FailTarget => Err(EncoderError::Target {
                path: output_path.to_path_buf(),
                source: std::io::Error::other("destination not writable"),
            }),
        }
    }
}

struct Fixture {
    _tmp: tempfile::TempDir,
    work_dir: PathBuf,
    out_dir: PathBuf,
    recorder: VideoRecorder,
    calls: Arc<Mutex<Vec<EncodeCall>>>,
    opens: Arc<AtomicU64>,
}

fn fixture(backend: FakeBackend, mode: EncoderMode) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let work_dir = tmp.path().join("work");
    let out_dir = tmp.path().join("out");
    let opens = backend.opens.clone();
    let (encoder, calls) = FakeEncoder::new(mode);

    let mut recorder = VideoRecorder::with_backends(Arc::new(backend), Box::new(encoder));
    recorder.set_temp_dir(&work_dir);
    recorder.set_output_dir(&out_dir);

    Fixture {
        _tmp: tmp,
        work_dir,
        out_dir,
        recorder,
        calls,
        opens,
    }
}

fn dir_entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|it| it.count()).unwrap_or(0)
}

// =============================================================================
// Lifecycle properties
// =============================================================================

#[test]
fn stop_while_idle_returns_none_without_touching_disk() {
    let mut f = fixture(FakeBackend::new((640, 480)), EncoderMode::Succeed);

    assert!(matches!(f.recorder.stop(), Ok(None)));

    assert_eq!(dir_entry_count(&f.work_dir), 0);
    assert_eq!(dir_entry_count(&f.out_dir), 0);
    assert!(f.calls.lock().unwrap().is_empty());
}

#[test]
fn double_start_is_idempotent() {
    let mut f = fixture(FakeBackend::new((640, 480)), EncoderMode::Succeed);
    f.recorder.set_capture_interval(10);

    f.recorder.start("twice").unwrap();
    f.recorder.start("twice").unwrap();
    assert!(f.recorder.status().recording);

    std::thread::sleep(Duration::from_millis(50));
    let artifact = f.recorder.stop().unwrap();
    assert!(artifact.is_some());

    // Only one worker ever ran
    assert_eq!(f.opens.load(Ordering::SeqCst), 1);

    // A second stop has nothing to do
    assert!(matches!(f.recorder.stop(), Ok(None)));
}

#[test]
fn recording_for_550ms_at_100ms_interval_yields_expected_frames() {
    let mut f = fixture(FakeBackend::new((640, 480)), EncoderMode::Succeed);
    f.recorder.set_capture_interval(100);

    f.recorder.start("clip").unwrap();
    std::thread::sleep(Duration::from_millis(550));
    let artifact = f.recorder.stop().unwrap().expect("artifact path");

    assert_eq!(artifact, f.out_dir.join("clip.mp4"));
    assert!(artifact.exists());
    assert!(std::fs::metadata(&artifact).unwrap().len() > 0);

    // floor(550/100) plus the leading capture, with scheduling jitter slack
    let calls = f.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(
        (3..=7).contains(&calls[0].frame_count),
        "unexpected frame count {}",
        calls[0].frame_count
    );
    assert_eq!(calls[0].frame_rate, 10);
    assert!(f.recorder.last_capture_failure().is_none());
}

#[test]
fn immediate_stop_still_produces_at_least_one_frame() {
    let mut f = fixture(FakeBackend::new((640, 480)), EncoderMode::Succeed);
    f.recorder.set_capture_interval(10);

    f.recorder.start("quick").unwrap();
    let artifact = f.recorder.stop().unwrap();

    // The sampling loop runs once before its first cancellation check
    assert!(artifact.is_some());
    assert!(f.calls.lock().unwrap()[0].frame_count >= 1);
}

#[test]
fn session_with_no_frames_fails_cleanly() {
    let mut backend = FakeBackend::new((640, 480));
    backend.fail_open = true;
    let mut f = fixture(backend, EncoderMode::Succeed);
    f.recorder.set_capture_interval(10);

    f.recorder.start("clip").unwrap();
    let result = f.recorder.stop();

    // Empty frame list degrades to an absent artifact, never a crash
    assert!(matches!(result, Ok(None)));
    assert_eq!(f.calls.lock().unwrap()[0].frame_count, 0);
    assert!(matches!(
        f.recorder.last_capture_failure(),
        Some(CaptureError::PermissionDenied)
    ));
    assert!(!f.recorder.status().recording);
}

// =============================================================================
// Frame retention
// =============================================================================

#[test]
fn session_directory_is_purged_by_default() {
    let mut f = fixture(FakeBackend::new((640, 480)), EncoderMode::Succeed);
    f.recorder.set_capture_interval(10);

    f.recorder.start("purged").unwrap();
    std::thread::sleep(Duration::from_millis(40));
    f.recorder.stop().unwrap();

    assert!(!f.work_dir.join("purged").exists());
}

#[test]
fn session_directory_survives_with_keep_frames() {
    let mut f = fixture(FakeBackend::new((64, 48)), EncoderMode::Succeed);
    f.recorder.set_capture_interval(10);
    f.recorder.set_keep_frames(true);

    f.recorder.start("kept").unwrap();
    std::thread::sleep(Duration::from_millis(40));
    f.recorder.stop().unwrap();

    let session_dir = f.work_dir.join("kept");
    assert!(session_dir.exists());
    assert!(dir_entry_count(&session_dir) >= 1);

    // Frame files are intact, sized for 64x48 BGRA
    let first = std::fs::read(session_dir.join("frame_000000.bgra")).unwrap();
    assert_eq!(first.len(), 64 * 48 * 4);
}

// =============================================================================
// Geometry
// =============================================================================

#[test]
fn oversized_region_is_clamped_to_screen_bounds() {
    let mut f = fixture(FakeBackend::new((800, 600)), EncoderMode::Succeed);
    f.recorder.set_capture_interval(10);
    f.recorder.set_region(700, 500, 200, 200);

    f.recorder.start("clamped").unwrap();
    f.recorder.stop().unwrap();

    let calls = f.calls.lock().unwrap();
    assert_eq!((calls[0].width, calls[0].height), (100, 100));
}

#[test]
fn full_screen_mode_captures_the_whole_screen() {
    let mut f = fixture(FakeBackend::new((800, 600)), EncoderMode::Succeed);
    f.recorder.set_capture_interval(10);

    f.recorder.start("full").unwrap();
    f.recorder.stop().unwrap();

    let calls = f.calls.lock().unwrap();
    assert_eq!((calls[0].width, calls[0].height), (800, 600));
}

// =============================================================================
// Failure semantics
// =============================================================================

#[test]
fn capture_failure_mid_session_still_encodes_prior_frames() {
    let mut backend = FakeBackend::new((64, 48));
    backend.fail_after = Some(3);
    let mut f = fixture(backend, EncoderMode::Succeed);
    f.recorder.set_capture_interval(5);

    f.recorder.start("partial").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    let artifact = f.recorder.stop().unwrap();

    // The three frames captured before the failure made it into the video
    assert!(artifact.is_some());
    assert_eq!(f.calls.lock().unwrap()[0].frame_count, 3);
    assert!(matches!(
        f.recorder.last_capture_failure(),
        Some(CaptureError::Frame(_))
    ));
}

#[test]
fn encoder_target_failure_escalates_out_of_stop() {
    let mut f = fixture(FakeBackend::new((64, 48)), EncoderMode::FailTarget);
    f.recorder.set_capture_interval(10);

    f.recorder.start("doomed").unwrap();
    let err = f.recorder.stop().unwrap_err();

    assert!(matches!(
        err,
        RecorderError::Encoder(EncoderError::Target { .. })
    ));

    // The recorder is reusable after the failure
    assert!(!f.recorder.status().recording);
    f.recorder.start("retry").unwrap();
    assert!(f.recorder.status().recording);
    let _ = f.recorder.stop();
}

#[test]
fn encoder_mux_failure_reports_absent_artifact() {
    let mut f = fixture(FakeBackend::new((64, 48)), EncoderMode::FailExit);
    f.recorder.set_capture_interval(10);

    f.recorder.start("muxfail").unwrap();
    let result = f.recorder.stop();

    assert!(matches!(result, Ok(None)));
    // Cleanup still ran
    assert!(!f.work_dir.join("muxfail").exists());
}

// =============================================================================
// Metadata sidecar
// =============================================================================

#[test]
fn successful_stop_writes_metadata_sidecar() {
    let mut f = fixture(FakeBackend::new((320, 240)), EncoderMode::Succeed);
    f.recorder.set_capture_interval(10);

    f.recorder.start("documented").unwrap();
    std::thread::sleep(Duration::from_millis(40));
    let artifact = f.recorder.stop().unwrap().expect("artifact path");

    let metadata = load_metadata(&f.out_dir.join("documented.json")).unwrap();
    assert_eq!(metadata.name, "documented.mp4");
    assert_eq!(metadata.format, "mp4");
    assert_eq!((metadata.width, metadata.height), (320, 240));
    assert_eq!(metadata.frame_rate, 100);
    assert_eq!(
        metadata.frame_count as usize,
        f.calls.lock().unwrap()[0].frame_count
    );
    assert_eq!(
        metadata.file_size_bytes,
        std::fs::metadata(&artifact).unwrap().len()
    );
    assert!(metadata.duration_seconds >= 0.0);
}
