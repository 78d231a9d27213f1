/**
 * ============================================================================
 * RECORDING ERROR MODULE
 * ============================================================================
 *
 * PURPOSE: Typed error taxonomy for capture, encoding and orchestration
 *
 * A capture error ends the sampling loop and is retrievable from the
 * recorder after stop(). Encoder errors split into setup failures (the
 * destination or the binary could not be resolved), which escalate out of
 * stop(), and multiplexing failures, which are reported as an absent
 * artifact.
 *
 * ============================================================================
 */

use std::io;
use std::path::PathBuf;

// Errors raised by a capture source or the sampling loop.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("screen capture is not supported on this platform")]
    Unsupported,

    #[error("screen recording permission not granted")]
    PermissionDenied,

    #[error("no display available for capture")]
    NoDisplay,

    #[error("failed to initialize capturer: {0}")]
    Init(String),

    #[error("capturer delivered no usable frame: {0}")]
    Frame(String),

    #[error("frame persistence failed: {0}")]
    Io(#[from] io::Error),

    #[error("capture worker panicked")]
    Panicked,
}

// Errors raised while assembling frames into a video artifact.
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("no frames to encode")]
    NoFrames,

    #[error("encoder binary not usable at {path:?}: {reason}")]
    MissingBinary {
        // Resolved binary path that was probed.
        path: PathBuf,
        reason: String,
    },

    #[error("could not resolve encode target {path:?}: {source}")]
    Target {
        // Destination the artifact was supposed to land at.
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to spawn encoder process: {0}")]
    Spawn(io::Error),

    #[error("frame stream to encoder failed: {0}")]
    Pipe(io::Error),

    #[error("encoder exited with status {code:?}")]
    Exit { code: Option<i32> },

    #[error("encoder produced an empty artifact at {0:?}")]
    EmptyArtifact(PathBuf),
}

impl EncoderError {
    // True for failures that happened before any multiplexing could begin:
    // the binary or the destination could not be resolved. These escalate
    // out of stop() instead of degrading to an absent artifact.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            EncoderError::MissingBinary { .. } | EncoderError::Target { .. } | EncoderError::Spawn(_)
        )
    }
}

// Errors surfaced by the recorder itself.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("encoding failed: {0}")]
    Encoder(#[from] EncoderError),

    #[error("session storage failed: {0}")]
    Storage(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_error_display() {
        assert_eq!(
            CaptureError::Unsupported.to_string(),
            "screen capture is not supported on this platform"
        );
        assert_eq!(
            CaptureError::Frame("timeout".into()).to_string(),
            "capturer delivered no usable frame: timeout"
        );
    }

    #[test]
    fn encoder_error_display() {
        assert_eq!(EncoderError::NoFrames.to_string(), "no frames to encode");
        let e = EncoderError::Exit { code: Some(1) };
        assert_eq!(e.to_string(), "encoder exited with status Some(1)");
    }

    #[test]
    fn setup_failure_classification() {
        assert!(
            EncoderError::MissingBinary {
                path: PathBuf::from("ffmpeg"),
                reason: "not found".into(),
            }
            .is_setup_failure()
        );
        assert!(
            EncoderError::Target {
                path: PathBuf::from("/out/clip.mp4"),
                source: io::Error::other("denied"),
            }
            .is_setup_failure()
        );
        assert!(EncoderError::Spawn(io::Error::other("enoent")).is_setup_failure());

        assert!(!EncoderError::NoFrames.is_setup_failure());
        assert!(!EncoderError::Exit { code: None }.is_setup_failure());
        assert!(!EncoderError::Pipe(io::Error::other("broken pipe")).is_setup_failure());
        assert!(!EncoderError::EmptyArtifact(PathBuf::from("x")).is_setup_failure());
    }

    #[test]
    fn recorder_error_from_io() {
        let e: RecorderError = io::Error::other("mkdir failed").into();
        assert!(matches!(e, RecorderError::Storage(_)));
    }
}
