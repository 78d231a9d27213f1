/**
 * ============================================================================
 * RECORDING TYPES MODULE
 * ============================================================================
 *
 * PURPOSE: Data structures for the screen recording system
 *
 * TYPES:
 * - RecordingConfig: capture configuration with clamp/ignore validation
 * - CaptureRegion: screen rectangle with clamp-to-screen resolution
 * - RecordingMetadata: JSON sidecar written next to a finished artifact
 * - RecorderStatus: point-in-time snapshot for callers
 *
 * ============================================================================
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// Fixed container extension carried by every artifact name.
pub const VIDEO_EXTENSION: &str = "mp4";

// A screen rectangle in pixels. Origin is the top-left screen corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    // Truncate the rectangle so it fits a screen of the given size. Excess
    // width/height is cut, not rejected; an origin past the screen edge
    // degenerates to a zero-sized region.
    pub fn clamp_to(&self, screen_width: u32, screen_height: u32) -> CaptureRegion {
        let x = self.x.min(screen_width);
        let y = self.y.min(screen_height);
        CaptureRegion {
            x,
            y,
            width: self.width.min(screen_width - x),
            height: self.height.min(screen_height - y),
        }
    }

    // Byte length of one BGRA frame of this geometry.
    pub fn frame_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }
}

// Configuration for a recording session. Setter-level validation lives in
// the manager; values here are what the worker snapshot uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingConfig {
    // Delay between successive captures (milliseconds)
    pub interval_ms: u64,

    // Manually configured capture rectangle, used when full_screen is off
    pub region: CaptureRegion,

    // When set, the rectangle is recomputed from the screen size at start
    pub full_screen: bool,

    // Directory holding per-session frame directories
    pub temp_dir: PathBuf,

    // Directory receiving finished artifacts
    pub output_dir: PathBuf,

    // Keep the session frame directory after encoding
    pub keep_frames: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            region: CaptureRegion::new(0, 0, 0, 0),
            full_screen: true,
            temp_dir: std::env::temp_dir(),
            output_dir: std::env::temp_dir(),
            keep_frames: false,
        }
    }
}

impl RecordingConfig {
    // Frame rate fed to the encoder, derived from the capture interval.
    // Integer division, bottoming out at 1 fps for intervals above 1000 ms.
    pub fn frame_rate(&self) -> u32 {
        (1000 / self.interval_ms.max(1)).max(1) as u32
    }

    // Rectangle actually captured for a session on a screen of the given
    // size. Full-screen mode and a never-configured region both resolve to
    // the whole screen; anything else is clamped to fit.
    pub fn effective_region(&self, screen_width: u32, screen_height: u32) -> CaptureRegion {
        if self.full_screen || self.region.width == 0 || self.region.height == 0 {
            CaptureRegion::new(0, 0, screen_width, screen_height)
        } else {
            self.region.clamp_to(screen_width, screen_height)
        }
    }
}

// Carry the fixed video extension on a caller-chosen artifact name.
pub fn normalize_video_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return format!("output.{}", VIDEO_EXTENSION);
    }
    if name.ends_with(&format!(".{}", VIDEO_EXTENSION)) {
        name.to_string()
    } else {
        format!("{}.{}", name, VIDEO_EXTENSION)
    }
}

// Base name with the video extension stripped; names the session directory.
pub fn video_base_name(name: &str) -> &str {
    name.strip_suffix(".mp4").unwrap_or(name)
}

// Metadata for a finished recording (stored as JSON sidecar next to the
// artifact)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingMetadata {
    // Artifact file name
    pub name: String,

    // Video format (e.g., "mp4")
    #[serde(default = "default_format")]
    pub format: String,

    // Video codec (e.g., "h264")
    #[serde(default = "default_codec")]
    pub codec: String,

    // Frame width in pixels
    pub width: u32,

    // Frame height in pixels
    pub height: u32,

    // Encoded frame rate
    pub frame_rate: u32,

    // Number of frames that went into the artifact
    pub frame_count: u64,

    // ISO 8601 timestamp of recording start
    pub start_time: String,

    // ISO 8601 timestamp of recording end
    pub end_time: String,

    // Duration in seconds
    pub duration_seconds: f64,

    // Artifact file size in bytes
    pub file_size_bytes: u64,
}

fn default_format() -> String {
    VIDEO_EXTENSION.to_string()
}

fn default_codec() -> String {
    "h264".to_string()
}

// Recorder status snapshot for callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderStatus {
    pub recording: bool,
    pub frame_count: u64,
    pub session_dir: Option<PathBuf>,
    pub elapsed_seconds: Option<f64>,
    pub frame_bytes: u64,
}
