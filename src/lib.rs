/**
 * ============================================================================
 * SCREENTAPE
 * ============================================================================
 *
 * PURPOSE: Record the screen while an automated activity (typically a test
 * run) executes, and produce a single MP4 artifact on demand.
 *
 * USAGE:
 *   let mut recorder = screentape::VideoRecorder::new();
 *   recorder.set_capture_interval(100);
 *   recorder.start("login-flow")?;
 *   // ... drive the activity under test ...
 *   let artifact = recorder.stop()?; // Some(path) on success
 *
 * ARCHITECTURE:
 * 1. start() spawns one capture worker thread for the session
 * 2. The worker grabs a screen still every interval and persists it as an
 *    ordered frame file under a session directory
 * 3. stop() signals the worker, joins it, and hands the ordered frames to
 *    the encoder, which assembles them into one MP4 at a frame rate derived
 *    from the capture interval
 * 4. Frame files are removed afterwards unless keep-frames is set
 *
 * REQUIREMENTS:
 * - An ffmpeg binary on PATH (or pointed at via SCREENTAPE_FFMPEG)
 * - Screen recording permission on platforms that gate it
 *
 * ============================================================================
 */

pub mod recording;

pub use recording::capture::{CaptureBackend, CaptureOutcome, CaptureSource, RawImage, ScreenBackend};
pub use recording::encoder::{FfmpegEncoder, VideoEncoder};
pub use recording::error::{CaptureError, EncoderError, RecorderError};
pub use recording::manager::VideoRecorder;
pub use recording::storage::{Frame, FrameStore};
pub use recording::types::{CaptureRegion, RecorderStatus, RecordingConfig, RecordingMetadata};
