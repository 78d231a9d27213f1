/**
 * ============================================================================
 * RECORDING ENCODER MODULE
 * ============================================================================
 *
 * PURPOSE: Assemble an ordered frame sequence into one MP4 via ffmpeg
 *
 * FUNCTIONALITY:
 * - Resolve the ffmpeg binary (SCREENTAPE_FFMPEG override, else PATH)
 * - Probe the binary before use
 * - Pipe raw BGRA frames to ffmpeg stdin for H.264 MP4 encoding
 * - Verify exit status and a non-empty artifact
 *
 * Failures before any multiplexing begins (binary, destination, spawn) are
 * reported distinctly from failures while encoding; see error.rs. An empty
 * frame list fails before anything is spawned.
 *
 * ============================================================================
 */

use crate::recording::error::EncoderError;
use crate::recording::storage::Frame;
use once_cell::sync::Lazy;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

// Environment override for the ffmpeg binary location.
const FFMPEG_ENV: &str = "SCREENTAPE_FFMPEG";

// Resolved ffmpeg binary path, cached on first use
static FFMPEG_PATH: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

// Resolve the ffmpeg binary: env override first, then PATH lookup.
fn default_ffmpeg_path() -> PathBuf {
    let mut cached = FFMPEG_PATH.lock().unwrap();
    if let Some(path) = cached.as_ref() {
        return path.clone();
    }

    let path = std::env::var_os(FFMPEG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ffmpeg"));
    log::info!("Using ffmpeg binary: {:?}", path);

    *cached = Some(path.clone());
    path
}

// Consumes an ordered frame list plus target geometry and frame rate, and
// produces a single video container file. Swappable so tests can run
// without a codec installed.
pub trait VideoEncoder: Send {
    fn encode(
        &self,
        frames: &[Frame],
        width: u32,
        height: u32,
        frame_rate: u32,
        output_path: &Path,
    ) -> Result<PathBuf, EncoderError>;
}

// ffmpeg-backed encoder: raw BGRA frames in, H.264 MP4 out.
pub struct FfmpegEncoder {
    binary: Option<PathBuf>,
    // Constant Rate Factor (0-51, lower = better quality)
    crf: u8,
    // Encoding speed/compression trade-off
    preset: String,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self {
            binary: None,
            crf: 28,
            preset: "fast".to_string(),
        }
    }

    // Encoder bound to an explicit ffmpeg binary instead of the resolved
    // default.
    pub fn with_binary(path: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(path.into()),
            ..Self::new()
        }
    }

    fn binary_path(&self) -> PathBuf {
        self.binary.clone().unwrap_or_else(default_ffmpeg_path)
    }

    // Check that the binary exists and runs.
    fn check_binary(&self) -> Result<PathBuf, EncoderError> {
        let path = self.binary_path();

        Command::new(&path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| EncoderError::MissingBinary {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        Ok(path)
    }

    fn spawn_ffmpeg(
        &self,
        binary: &Path,
        width: u32,
        height: u32,
        frame_rate: u32,
        output_path: &Path,
    ) -> Result<Child, EncoderError> {
        log::info!(
            "Spawning ffmpeg: {}x{} @ {} fps, CRF {}, preset {} -> {:?}",
            width,
            height,
            frame_rate,
            self.crf,
            self.preset,
            output_path
        );

        Command::new(binary)
            .args([
                "-y",                           // Overwrite output
                "-f", "rawvideo",               // Input format
                "-pix_fmt", "bgra",             // Input pixel format
                "-s", &format!("{}x{}", width, height),
                "-r", &frame_rate.to_string(),  // Input framerate
                "-i", "pipe:0",                 // Read from stdin
                // yuv420p requires even dimensions
                "-vf", "scale=trunc(iw/2)*2:trunc(ih/2)*2",
                "-c:v", "libx264",              // H.264 codec
                "-preset", &self.preset,
                "-crf", &self.crf.to_string(),
                "-tune", "stillimage",          // Optimized for screen content
                "-pix_fmt", "yuv420p",          // Output pixel format (MP4 compatibility)
                "-movflags", "+faststart",
            ])
            .arg(output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())              // Discard stderr to prevent buffer blocking
            .spawn()
            .map_err(EncoderError::Spawn)
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(
        &self,
        frames: &[Frame],
        width: u32,
        height: u32,
        frame_rate: u32,
        output_path: &Path,
    ) -> Result<PathBuf, EncoderError> {
        if frames.is_empty() {
            return Err(EncoderError::NoFrames);
        }

        let binary = self.check_binary()?;

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| EncoderError::Target {
                    path: output_path.to_path_buf(),
                    source,
                })?;
            }
        }

        let mut child = self.spawn_ffmpeg(&binary, width, height, frame_rate, output_path)?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EncoderError::Spawn(io::Error::other("no stdin pipe")))?;

        let expected = (width as usize) * (height as usize) * 4;
        let mut skipped: u64 = 0;

        for frame in frames {
            let data = fs::read(&frame.path).map_err(EncoderError::Pipe)?;

            // Wrong-size frames would desync the raw stream; skip them
            if data.len() != expected {
                skipped += 1;
                if skipped <= 3 {
                    log::warn!(
                        "Skipping frame {}: expected {} bytes, got {}",
                        frame.sequence,
                        expected,
                        data.len()
                    );
                }
                continue;
            }

            if let Err(e) = stdin.write_all(&data) {
                // ffmpeg died early; its exit status is surfaced below
                log::error!("Failed to write frame {} to ffmpeg: {}", frame.sequence, e);
                break;
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {} frames with wrong size", skipped);
        }

        // Close stdin to signal EOF to ffmpeg
        drop(stdin);

        let status = child.wait().map_err(EncoderError::Pipe)?;
        if !status.success() {
            return Err(EncoderError::Exit {
                code: status.code(),
            });
        }

        let size = fs::metadata(output_path).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(EncoderError::EmptyArtifact(output_path.to_path_buf()));
        }

        log::info!(
            "Encoded {} frames into {:?} ({} bytes)",
            frames.len(),
            output_path,
            size
        );
        Ok(output_path.to_path_buf())
    }
}
