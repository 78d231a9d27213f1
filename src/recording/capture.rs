/**
 * ============================================================================
 * RECORDING CAPTURE MODULE
 * ============================================================================
 *
 * PURPOSE: Screen capture sources and the sampling worker loop
 *
 * FUNCTIONALITY:
 * - Check platform support and permissions
 * - CaptureSource/CaptureBackend seams so capture is swappable in tests
 * - scap-backed screen source: dimensions discovered from the first frame,
 *   each grab cropped to the effective capture rectangle
 * - capture_session_frames: the per-session sampling loop run on a
 *   dedicated worker thread
 *
 * The capturer is created inside the worker thread and never crosses
 * threads; the resolved geometry travels back through CaptureOutcome at
 * join time.
 *
 * ============================================================================
 */

use crate::recording::error::CaptureError;
use crate::recording::storage::FrameStore;
use crate::recording::types::{CaptureRegion, RecordingConfig};
use scap::{
    capturer::{Capturer, Options, Resolution},
    frame::{Frame, FrameType},
    Target,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

// How long to wait for the capturer to deliver its first frame.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(15);

// Delay before retrying after an empty pull from the capturer.
const RETRY_DELAY: Duration = Duration::from_millis(20);

// Unusable pulls tolerated per grab before giving up.
const GRAB_ATTEMPTS: u32 = 5;

// =============================================================================
// Platform Support Checks
// =============================================================================

// Check if screen capture is supported on this platform
pub fn is_supported() -> bool {
    scap::is_supported()
}

// Check if we have screen recording permission
pub fn has_permission() -> bool {
    scap::has_permission()
}

// Request screen recording permission (opens system dialog on macOS)
pub fn request_permission() -> bool {
    scap::request_permission()
}

// =============================================================================
// Capture seams
// =============================================================================

// One still image pulled from a capture source. Pixel data is BGRA,
// 4 bytes per pixel, rows top to bottom.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

// A live capture source bound to one session. Created and used entirely on
// the worker thread.
pub trait CaptureSource {
    // Full screen size, known once the source is open.
    fn screen_size(&self) -> (u32, u32);

    // Take one still of the given region. The region must fit the screen;
    // sources clamp it to the frame bounds before cutting.
    fn grab(&mut self, region: CaptureRegion) -> Result<RawImage, CaptureError>;
}

// Opens a capture source for a session. Shared with the worker thread, so
// implementations carry their own synchronization if they keep state.
pub trait CaptureBackend: Send + Sync {
    fn open(&self, frame_rate: u32) -> Result<Box<dyn CaptureSource>, CaptureError>;
}

// =============================================================================
// scap-backed screen source
// =============================================================================

// Production backend capturing the primary display via scap.
#[derive(Debug, Default)]
pub struct ScreenBackend;

struct ScreenSource {
    capturer: Capturer,
    width: u32,
    height: u32,
    // Frame buffer for handling empty frames from scap
    last_frame: Vec<u8>,
    reused_frames: u64,
}

impl CaptureBackend for ScreenBackend {
    fn open(&self, frame_rate: u32) -> Result<Box<dyn CaptureSource>, CaptureError> {
        if !scap::is_supported() {
            return Err(CaptureError::Unsupported);
        }
        if !scap::has_permission() {
            return Err(CaptureError::PermissionDenied);
        }

        let target = scap::get_all_targets()
            .into_iter()
            .find(|t| matches!(t, Target::Display(_)))
            .ok_or(CaptureError::NoDisplay)?;

        let options = Options {
            fps: frame_rate,
            target: Some(target),
            show_cursor: true,
            show_highlight: false,
            excluded_targets: None,
            output_type: FrameType::BGRAFrame,
            output_resolution: Resolution::Captured,
            ..Default::default()
        };

        let mut capturer =
            Capturer::build(options).map_err(|e| CaptureError::Init(format!("{:?}", e)))?;
        capturer.start_capture();

        // Wait briefly for the capturer to initialize
        std::thread::sleep(Duration::from_millis(100));

        let (width, height, first_frame) = wait_for_first_frame(&mut capturer)?;
        log::info!("Screen capture initialized: {}x{}", width, height);

        Ok(Box::new(ScreenSource {
            capturer,
            width,
            height,
            last_frame: first_frame,
            reused_frames: 0,
        }))
    }
}

impl CaptureSource for ScreenSource {
    fn screen_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn grab(&mut self, region: CaptureRegion) -> Result<RawImage, CaptureError> {
        let expected = (self.width as usize) * (self.height as usize) * 4;
        let mut attempts = 0;

        let data = loop {
            attempts += 1;
            match self.capturer.get_next_frame() {
                Ok(frame) => match frame_parts(frame) {
                    Some((_, _, data)) if data.len() == expected => {
                        self.last_frame = data;
                        break self.last_frame.clone();
                    }
                    Some((_, _, data)) if data.is_empty() && !self.last_frame.is_empty() => {
                        // scap delivers empty frames when nothing changed on
                        // screen; reuse the previous good one
                        self.reused_frames += 1;
                        break self.last_frame.clone();
                    }
                    Some((w, h, data)) => {
                        if attempts >= GRAB_ATTEMPTS {
                            return Err(CaptureError::Frame(format!(
                                "wrong frame size: expected {} bytes, got {} ({}x{})",
                                expected,
                                data.len(),
                                w,
                                h
                            )));
                        }
                    }
                    None => {
                        if attempts >= GRAB_ATTEMPTS {
                            return Err(CaptureError::Frame("unsupported frame type".into()));
                        }
                    }
                },
                Err(e) => {
                    if attempts >= GRAB_ATTEMPTS {
                        return Err(CaptureError::Frame(format!("{:?}", e)));
                    }
                    std::thread::sleep(RETRY_DELAY);
                }
            }
        };

        Ok(RawImage {
            width: region.width,
            height: region.height,
            data: crop_bgra(&data, self.width, self.height, region),
        })
    }
}

impl Drop for ScreenSource {
    fn drop(&mut self) {
        self.capturer.stop_capture();
        if self.reused_frames > 0 {
            log::info!(
                "Reused previous frame {} times (empty frames from scap)",
                self.reused_frames
            );
        }
    }
}

// Extract dimensions and pixel data from a scap frame.
fn frame_parts(frame: Frame) -> Option<(u32, u32, Vec<u8>)> {
    match frame {
        Frame::BGRA(f) => Some((f.width as u32, f.height as u32, f.data)),
        Frame::BGR0(f) => Some((f.width as u32, f.height as u32, f.data)),
        Frame::RGB(f) => Some((f.width as u32, f.height as u32, f.data)),
        Frame::RGBx(f) => Some((f.width as u32, f.height as u32, f.data)),
        Frame::XBGR(f) => Some((f.width as u32, f.height as u32, f.data)),
        Frame::BGRx(f) => Some((f.width as u32, f.height as u32, f.data)),
        _ => None,
    }
}

// Wait for the first frame and return dimensions + data
fn wait_for_first_frame(capturer: &mut Capturer) -> Result<(u32, u32, Vec<u8>), CaptureError> {
    let start = Instant::now();
    let mut attempt = 0;

    while start.elapsed() < FIRST_FRAME_TIMEOUT {
        attempt += 1;

        match capturer.get_next_frame() {
            Ok(frame) => {
                if let Some((width, height, data)) = frame_parts(frame) {
                    if !data.is_empty() {
                        log::info!(
                            "Got first frame after {} attempts: {}x{}, {} bytes",
                            attempt,
                            width,
                            height,
                            data.len()
                        );
                        return Ok((width, height, data));
                    }
                }
            }
            Err(_) => {
                if attempt % 50 == 0 {
                    log::warn!(
                        "Still waiting for first frame (attempt {}, {:.1}s elapsed)",
                        attempt,
                        start.elapsed().as_secs_f32()
                    );
                }
                std::thread::sleep(RETRY_DELAY);
            }
        }
    }

    Err(CaptureError::Frame(format!(
        "timeout waiting for first frame after {:.1}s, check screen recording permissions",
        FIRST_FRAME_TIMEOUT.as_secs_f32()
    )))
}

// Cut a region out of a full BGRA frame. The region is clamped to the frame
// bounds before any row is read.
pub fn crop_bgra(data: &[u8], full_width: u32, full_height: u32, region: CaptureRegion) -> Vec<u8> {
    let region = region.clamp_to(full_width, full_height);

    if region.x == 0 && region.y == 0 && region.width == full_width && region.height == full_height
    {
        return data.to_vec();
    }

    let stride = full_width as usize * 4;
    let row_len = region.width as usize * 4;
    let mut out = Vec::with_capacity(row_len * region.height as usize);

    for row in 0..region.height as usize {
        let start = (region.y as usize + row) * stride + region.x as usize * 4;
        out.extend_from_slice(&data[start..start + row_len]);
    }
    out
}

// =============================================================================
// Sampling worker loop
// =============================================================================

// What one capture worker produced, returned through its join handle.
// Geometry is the resolved capture rectangle; failure carries the terminal
// capture error, if any.
#[derive(Debug, Default)]
pub struct CaptureOutcome {
    pub width: u32,
    pub height: u32,
    pub frame_count: u64,
    pub failure: Option<CaptureError>,
}

// Sampling loop for one session: grab a still, persist it, sleep, re-check
// the recording flag. The first iteration runs before the first flag check,
// so cancellation latency is bounded by one capture plus one interval. Any
// error ends the loop and forces the flag false.
pub fn capture_session_frames(
    backend: &dyn CaptureBackend,
    config: &RecordingConfig,
    store: &Mutex<FrameStore>,
    recording: &AtomicBool,
) -> CaptureOutcome {
    let mut outcome = CaptureOutcome::default();

    if let Err(e) = run_capture_loop(backend, config, store, recording, &mut outcome) {
        log::error!("Capture loop terminated: {}", e);
        recording.store(false, Ordering::SeqCst);
        outcome.failure = Some(e);
    }
    outcome
}

fn run_capture_loop(
    backend: &dyn CaptureBackend,
    config: &RecordingConfig,
    store: &Mutex<FrameStore>,
    recording: &AtomicBool,
    outcome: &mut CaptureOutcome,
) -> Result<(), CaptureError> {
    let mut source = backend.open(config.frame_rate())?;

    let (screen_width, screen_height) = source.screen_size();
    let region = config.effective_region(screen_width, screen_height);
    outcome.width = region.width;
    outcome.height = region.height;

    log::info!(
        "Capture started: screen {}x{}, region {}x{} at ({}, {}), interval {} ms",
        screen_width,
        screen_height,
        region.width,
        region.height,
        region.x,
        region.y,
        config.interval_ms
    );

    let interval = Duration::from_millis(config.interval_ms.max(1));

    loop {
        let image = source.grab(region)?;
        store.lock().unwrap().append(&image.data)?;
        outcome.frame_count += 1;

        if outcome.frame_count % 50 == 0 {
            log::info!("Captured {} frames", outcome.frame_count);
        }

        std::thread::sleep(interval);

        // Cancellation is observed only here, after the sleep
        if !recording.load(Ordering::SeqCst) {
            break;
        }
    }

    log::info!("Capture loop finished: {} frames", outcome.frame_count);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
