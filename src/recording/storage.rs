/**
 * ============================================================================
 * RECORDING STORAGE MODULE
 * ============================================================================
 *
 * PURPOSE: Ordered frame persistence for one recording session
 *
 * FUNCTIONALITY:
 * - Persist captured frames under a session-scoped directory
 * - Deterministic sequence-ordered file naming
 * - Enumerate frames in capture order
 * - Disk usage accounting and best-effort purge
 * - Metadata JSON sidecar next to a finished artifact
 *
 * FILE STRUCTURE:
 * <temp_dir>/<video base name>/
 * ├── frame_000000.bgra
 * ├── frame_000001.bgra
 * └── ...
 *
 * ============================================================================
 */

use crate::recording::types::RecordingMetadata;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// One persisted frame: its capture-order sequence number and file path.
// Immutable once written; owned by the store until handed to the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u64,
    pub path: PathBuf,
}

// File name carrying the sequence number; zero-padded so lexical and
// numeric order agree.
fn frame_file_name(sequence: u64) -> String {
    format!("frame_{:06}.bgra", sequence)
}

// Persists an ordered sequence of captured images under a session directory.
// Single writer (the capture worker); sequence numbers are assigned here, so
// ordering survives scheduling jitter in the sampling loop.
#[derive(Debug)]
pub struct FrameStore {
    dir: PathBuf,
    frames: Vec<Frame>,
    next_sequence: u64,
}

impl FrameStore {
    // Create the store and its session directory.
    pub fn create(dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        log::debug!("Frame store created at {:?}", dir);
        Ok(Self {
            dir,
            frames: Vec::new(),
            next_sequence: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Persist one captured image under the next sequence number.
    pub fn append(&mut self, data: &[u8]) -> io::Result<Frame> {
        let sequence = self.next_sequence;
        let path = self.dir.join(frame_file_name(sequence));
        fs::write(&path, data)?;
        self.next_sequence += 1;
        let frame = Frame { sequence, path };
        self.frames.push(frame.clone());
        Ok(frame)
    }

    // Frames in ascending sequence order. This ordering is the sole timing
    // signal the encoder sees.
    pub fn ordered(&self) -> &[Frame] {
        debug_assert!(self.frames.windows(2).all(|w| w[0].sequence < w[1].sequence));
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    // Drop the in-memory frame list; persisted files stay on disk.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    // Total bytes of persisted frames under the session directory.
    pub fn disk_usage(&self) -> u64 {
        if !self.dir.exists() {
            return 0;
        }

        let mut total: u64 = 0;
        for entry in WalkDir::new(&self.dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() {
                if let Ok(metadata) = entry.metadata() {
                    total += metadata.len();
                }
            }
        }
        total
    }

    // Remove all persisted frames and the session directory. Tolerates a
    // missing directory; failures are logged, never propagated.
    pub fn purge(&mut self) -> bool {
        self.frames.clear();

        if !self.dir.exists() {
            return true;
        }

        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                log::debug!("Purged session directory {:?}", self.dir);
                true
            }
            Err(e) => {
                log::warn!("Failed to purge session directory {:?}: {}", self.dir, e);
                false
            }
        }
    }
}

// =============================================================================
// Metadata sidecar
// =============================================================================

// Sidecar path for an artifact: same location, json extension.
pub fn metadata_path(artifact: &Path) -> PathBuf {
    artifact.with_extension("json")
}

// Save recording metadata next to the artifact.
pub fn save_metadata(artifact: &Path, metadata: &RecordingMetadata) -> io::Result<PathBuf> {
    let path = metadata_path(artifact);

    let contents = serde_json::to_string_pretty(metadata).map_err(io::Error::other)?;
    fs::write(&path, contents)?;

    log::info!("Saved metadata to {:?}", path);
    Ok(path)
}

// Load recording metadata from a sidecar file.
pub fn load_metadata(path: &Path) -> io::Result<RecordingMetadata> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> FrameStore {
        FrameStore::create(dir.join("session")).unwrap()
    }

    #[test]
    fn test_append_assigns_ordered_sequences() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());

        for _ in 0..5 {
            store.append(&[0u8; 16]).unwrap();
        }

        let frames = store.ordered();
        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.sequence, i as u64);
            assert!(frame.path.exists());
        }
        assert!(frames.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[test]
    fn test_frame_file_naming() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());

        let frame = store.append(&[1, 2, 3, 4]).unwrap();
        assert_eq!(
            frame.path.file_name().unwrap().to_str().unwrap(),
            "frame_000000.bgra"
        );
        assert_eq!(fs::read(&frame.path).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_disk_usage() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());

        assert_eq!(store.disk_usage(), 0);
        store.append(&[0u8; 100]).unwrap();
        store.append(&[0u8; 50]).unwrap();
        assert_eq!(store.disk_usage(), 150);
    }

    #[test]
    fn test_purge_removes_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());

        store.append(&[0u8; 8]).unwrap();
        let dir = store.dir().to_path_buf();
        assert!(dir.exists());

        assert!(store.purge());
        assert!(!dir.exists());
        assert!(store.is_empty());

        // A second purge tolerates the missing directory
        assert!(store.purge());
    }

    #[test]
    fn test_clear_keeps_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());

        let frame = store.append(&[0u8; 8]).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert!(frame.path.exists());
    }

    #[test]
    fn test_metadata_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact = tmp.path().join("clip.mp4");

        let metadata = RecordingMetadata {
            name: "clip.mp4".into(),
            format: "mp4".into(),
            codec: "h264".into(),
            width: 800,
            height: 600,
            frame_rate: 10,
            frame_count: 42,
            start_time: "2026-01-01T00:00:00+00:00".into(),
            end_time: "2026-01-01T00:00:05+00:00".into(),
            duration_seconds: 5.0,
            file_size_bytes: 1234,
        };

        let path = save_metadata(&artifact, &metadata).unwrap();
        assert_eq!(path, tmp.path().join("clip.json"));

        let loaded = load_metadata(&path).unwrap();
        assert_eq!(loaded.name, "clip.mp4");
        assert_eq!(loaded.frame_count, 42);
        assert_eq!(loaded.width, 800);
    }
}
