/**
 * ============================================================================
 * RECORDING MANAGER MODULE
 * ============================================================================
 *
 * PURPOSE: Session lifecycle and configuration for the screen recorder
 *
 * RESPONSIBILITIES:
 * - Idempotent start/stop of the single recording session
 * - Spawn and join the capture worker thread
 * - Hand the ordered frames to the encoder on stop
 * - Session directory cleanup and metadata sidecar
 * - Configuration setters with clamp/ignore validation
 *
 * RECORDING FLOW:
 * 1. start() creates the session frame store and spawns the worker
 * 2. The worker samples the screen every interval into the store
 * 3. stop() clears the shared flag, joins the worker, encodes the frames
 *    at 1000/interval fps, and purges the session directory unless frames
 *    are kept
 *
 * ============================================================================
 */

use crate::recording::capture::{self, CaptureBackend, CaptureOutcome, ScreenBackend};
use crate::recording::encoder::{FfmpegEncoder, VideoEncoder};
use crate::recording::error::{CaptureError, RecorderError};
use crate::recording::storage::{self, FrameStore};
use crate::recording::types::{
    self, CaptureRegion, RecorderStatus, RecordingConfig, RecordingMetadata,
};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

// Recording session state
enum RecorderState {
    Idle,
    Recording {
        // Normalized artifact name, e.g. "login-flow.mp4"
        name: String,
        // Config snapshot taken at start; later setter calls do not touch
        // the in-flight session
        config: RecordingConfig,
        store: Arc<Mutex<FrameStore>>,
        started_at: DateTime<Utc>,
        // Shared with the worker; the only cross-thread signal
        recording: Arc<AtomicBool>,
        worker: JoinHandle<CaptureOutcome>,
    },
    Finalizing,
}

impl std::fmt::Debug for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderState::Idle => write!(f, "Idle"),
            RecorderState::Recording { name, .. } => write!(f, "Recording({})", name),
            RecorderState::Finalizing => write!(f, "Finalizing"),
        }
    }
}

// The screen recorder. One instance owns one session at a time; a second
// start while recording is a no-op, and stop while idle returns None.
pub struct VideoRecorder {
    config: RecordingConfig,
    backend: Arc<dyn CaptureBackend>,
    encoder: Box<dyn VideoEncoder>,
    state: RecorderState,
    last_failure: Option<CaptureError>,
}

impl Default for VideoRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoRecorder {
    // Recorder over the production screen backend and ffmpeg encoder.
    pub fn new() -> Self {
        Self::with_backends(Arc::new(ScreenBackend), Box::new(FfmpegEncoder::new()))
    }

    // Recorder over caller-provided capture and encoding implementations.
    pub fn with_backends(backend: Arc<dyn CaptureBackend>, encoder: Box<dyn VideoEncoder>) -> Self {
        Self {
            config: RecordingConfig::default(),
            backend,
            encoder,
            state: RecorderState::Idle,
            last_failure: None,
        }
    }

    // Begin a recording session. No-op while one is already in progress.
    // The worker resolves geometry and opens the capture source itself, so
    // capture-environment problems surface through last_capture_failure()
    // after stop(), not here.
    pub fn start(&mut self, name: &str) -> Result<(), RecorderError> {
        if matches!(self.state, RecorderState::Recording { .. }) {
            log::warn!("start ignored: a recording is already in progress");
            return Ok(());
        }

        let config = self.config.clone();
        let name = types::normalize_video_name(name);
        let session_dir = config.temp_dir.join(types::video_base_name(&name));
        let store = Arc::new(Mutex::new(FrameStore::create(session_dir)?));

        self.last_failure = None;
        let recording = Arc::new(AtomicBool::new(true));

        let backend = self.backend.clone();
        let worker_config = config.clone();
        let worker_store = store.clone();
        let worker_flag = recording.clone();
        let worker = std::thread::spawn(move || {
            capture::capture_session_frames(
                backend.as_ref(),
                &worker_config,
                &worker_store,
                &worker_flag,
            )
        });

        log::info!("Recording started: {}", name);
        self.state = RecorderState::Recording {
            name,
            config,
            store,
            started_at: Utc::now(),
            recording,
            worker,
        };
        Ok(())
    }

    // End the active session and produce the artifact. Returns Ok(None)
    // while idle or when encoding failed; Err only when the encoder could
    // not even resolve its destination or binary.
    pub fn stop(&mut self) -> Result<Option<PathBuf>, RecorderError> {
        let (name, config, store, started_at, recording, worker) =
            match std::mem::replace(&mut self.state, RecorderState::Finalizing) {
                RecorderState::Recording {
                    name,
                    config,
                    store,
                    started_at,
                    recording,
                    worker,
                } => (name, config, store, started_at, recording, worker),
                other => {
                    self.state = other;
                    log::debug!("stop ignored: no recording in progress");
                    return Ok(None);
                }
            };

        // Signal the worker and wait for it to observe cancellation.
        // Bounded by one in-flight capture plus one sleep interval.
        recording.store(false, Ordering::SeqCst);
        let mut outcome = match worker.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                log::error!("Capture worker panicked");
                CaptureOutcome {
                    failure: Some(CaptureError::Panicked),
                    ..CaptureOutcome::default()
                }
            }
        };

        if let Some(failure) = outcome.failure.take() {
            log::error!("Capture ended early: {}", failure);
            self.last_failure = Some(failure);
        }

        let frames = store.lock().unwrap().ordered().to_vec();
        let ended_at = Utc::now();
        log::info!("Finalizing {}: {} frames captured", name, frames.len());

        let output_path = config.output_dir.join(&name);
        let encode_result = self.encoder.encode(
            &frames,
            outcome.width,
            outcome.height,
            config.frame_rate(),
            &output_path,
        );

        // Tear the session down regardless of how encoding went
        {
            let mut store = store.lock().unwrap();
            if config.keep_frames {
                store.clear();
            } else if !store.purge() {
                log::warn!("Session directory left behind at {:?}", store.dir());
            }
        }
        self.state = RecorderState::Idle;

        match encode_result {
            Ok(artifact) => {
                let metadata = RecordingMetadata {
                    name: name.clone(),
                    format: types::VIDEO_EXTENSION.to_string(),
                    codec: "h264".to_string(),
                    width: outcome.width,
                    height: outcome.height,
                    frame_rate: config.frame_rate(),
                    frame_count: frames.len() as u64,
                    start_time: started_at.to_rfc3339(),
                    end_time: ended_at.to_rfc3339(),
                    duration_seconds: (ended_at - started_at).num_milliseconds() as f64 / 1000.0,
                    file_size_bytes: std::fs::metadata(&artifact).map(|m| m.len()).unwrap_or(0),
                };
                if let Err(e) = storage::save_metadata(&artifact, &metadata) {
                    log::warn!("Failed to save metadata sidecar: {}", e);
                }

                log::info!("Recording finished: {:?}", artifact);
                Ok(Some(artifact))
            }
            Err(e) if e.is_setup_failure() => {
                log::error!("Encoder setup failed: {}", e);
                Err(e.into())
            }
            Err(e) => {
                log::error!("Encoding failed: {}", e);
                Ok(None)
            }
        }
    }

    // Terminal capture error of the most recent session, if its sampling
    // loop ended early.
    pub fn last_capture_failure(&self) -> Option<&CaptureError> {
        self.last_failure.as_ref()
    }

    // Point-in-time snapshot of the recorder.
    pub fn status(&self) -> RecorderStatus {
        match &self.state {
            RecorderState::Recording {
                store, started_at, ..
            } => {
                let store = store.lock().unwrap();
                RecorderStatus {
                    recording: true,
                    frame_count: store.len() as u64,
                    session_dir: Some(store.dir().to_path_buf()),
                    elapsed_seconds: Some(
                        (Utc::now() - *started_at).num_milliseconds() as f64 / 1000.0,
                    ),
                    frame_bytes: store.disk_usage(),
                }
            }
            _ => RecorderStatus {
                recording: false,
                frame_count: 0,
                session_dir: None,
                elapsed_seconds: None,
                frame_bytes: 0,
            },
        }
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    // =========================================================================
    // Configuration setters. Effective for future sessions only; the active
    // session keeps the snapshot taken at start.
    // =========================================================================

    // Delay between captures in milliseconds. Zero is ignored: the derived
    // frame rate (1000/interval) would be undefined.
    pub fn set_capture_interval(&mut self, interval_ms: u64) {
        if interval_ms == 0 {
            log::warn!("Ignoring non-positive capture interval");
            return;
        }
        self.config.interval_ms = interval_ms;
    }

    // Manually chosen capture rectangle; turns full-screen mode off. Zero
    // width or height is ignored. The rectangle is clamped to the screen at
    // session start.
    pub fn set_region(&mut self, x: u32, y: u32, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("Ignoring capture region with zero width or height");
            return;
        }
        self.config.region = CaptureRegion::new(x, y, width, height);
        self.config.full_screen = false;
    }

    // Move the capture origin without touching the size.
    pub fn set_coordinates(&mut self, x: u32, y: u32) {
        self.config.region.x = x;
        self.config.region.y = y;
    }

    // Record the whole screen, recomputed from the screen size at each
    // start; overrides any configured rectangle.
    pub fn set_full_screen(&mut self, full_screen: bool) {
        self.config.full_screen = full_screen;
    }

    // Directory holding per-session frame directories. Created on set;
    // ignored when it cannot be created.
    pub fn set_temp_dir(&mut self, path: impl Into<PathBuf>) {
        if let Some(dir) = usable_directory(path.into()) {
            self.config.temp_dir = dir;
        }
    }

    // Directory receiving finished artifacts. Created on set; ignored when
    // it cannot be created.
    pub fn set_output_dir(&mut self, path: impl Into<PathBuf>) {
        if let Some(dir) = usable_directory(path.into()) {
            self.config.output_dir = dir;
        }
    }

    // Keep the session frame directory after encoding.
    pub fn set_keep_frames(&mut self, keep: bool) {
        self.config.keep_frames = keep;
    }
}

impl Drop for VideoRecorder {
    fn drop(&mut self) {
        if let RecorderState::Recording {
            recording, worker, ..
        } = std::mem::replace(&mut self.state, RecorderState::Idle)
        {
            recording.store(false, Ordering::SeqCst);
            let _ = worker.join();
        }
    }
}

fn usable_directory(dir: PathBuf) -> Option<PathBuf> {
    if let Err(e) = std::fs::create_dir_all(&dir) {
        log::warn!("Ignoring directory {:?}: {}", dir, e);
        return None;
    }
    Some(dir)
}
