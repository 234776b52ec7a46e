//! Motion-JPEG frame store.
//!
//! A motion-JPEG container here is simply a concatenation of JPEG images.
//! Each frame is delimited by the start-of-image marker `FF D8` and the
//! end-of-image marker `FF D9` (inclusive). Bytes between frames are ignored.
//!
//! Scanning is greedy and sequential: the search for an end marker starts at
//! its start marker, and the next start-marker search resumes right after the
//! matched end marker, so frames never overlap or nest.

use std::fs;
use std::ops::Range;
use std::path::Path;

use crate::error::{Result, StreamError};

/// JPEG start-of-image marker.
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG end-of-image marker.
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Ordered, immutable collection of JPEG frames loaded from one file.
///
/// Frames are kept as byte ranges into the file contents. Playback indices
/// wrap modulo [`len`](Self::len), so the store loops forever.
#[derive(Debug, Clone)]
pub struct FrameStore {
    data: Vec<u8>,
    frames: Vec<Range<usize>>,
}

impl FrameStore {
    /// Read `path` and split it into frames.
    ///
    /// Fails with [`StreamError::FileUnavailable`] if the file cannot be read
    /// and [`StreamError::NoFramesFound`] if it holds no complete frame.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| StreamError::FileUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

        let store = Self::from_bytes(data).ok_or_else(|| StreamError::NoFramesFound {
            path: path.to_path_buf(),
        })?;

        tracing::info!(path = %path.display(), frames = store.len(), "MJPEG loaded");
        Ok(store)
    }

    /// Split an in-memory buffer. Returns `None` when no frame is found.
    pub fn from_bytes(data: Vec<u8>) -> Option<Self> {
        let frames = scan_frames(&data);
        if frames.is_empty() {
            return None;
        }
        Some(Self { data, frames })
    }

    /// Frame at `index % len()`.
    pub fn at(&self, index: usize) -> &[u8] {
        let range = &self.frames[index % self.frames.len()];
        &self.data[range.clone()]
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always `false` for a constructed store; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.frames.iter().map(|range| &self.data[range.clone()])
    }
}

fn scan_frames(data: &[u8]) -> Vec<Range<usize>> {
    let mut frames = Vec::new();
    let mut pos = 0;

    while let Some(start) = find_marker(data, pos, SOI) {
        let Some(end) = find_marker(data, start + SOI.len(), EOI) else {
            break;
        };
        let end = end + EOI.len();
        frames.push(start..end);
        pos = end;
    }

    frames
}

fn find_marker(data: &[u8], from: usize, marker: [u8; 2]) -> Option<usize> {
    data.get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn jpeg(body: &[u8]) -> Vec<u8> {
        let mut frame = SOI.to_vec();
        frame.extend_from_slice(body);
        frame.extend_from_slice(&EOI);
        frame
    }

    #[test]
    fn three_frames_in_file_order() {
        let mut data = b"junk".to_vec();
        data.extend(jpeg(&[1]));
        data.extend(jpeg(&[2, 2]));
        data.extend(b"between");
        data.extend(jpeg(&[3, 3, 3]));

        let store = FrameStore::from_bytes(data).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.at(0), jpeg(&[1]).as_slice());
        assert_eq!(store.at(1), jpeg(&[2, 2]).as_slice());
        assert_eq!(store.at(2), jpeg(&[3, 3, 3]).as_slice());
    }

    #[test]
    fn index_wraps() {
        let mut data = jpeg(&[1]);
        data.extend(jpeg(&[2]));
        let store = FrameStore::from_bytes(data).unwrap();
        assert_eq!(store.at(2), store.at(0));
        assert_eq!(store.at(5), store.at(1));
    }

    #[test]
    fn no_markers_is_none() {
        assert!(FrameStore::from_bytes(b"not a jpeg at all".to_vec()).is_none());
        assert!(FrameStore::from_bytes(Vec::new()).is_none());
    }

    #[test]
    fn unterminated_frame_is_dropped() {
        let mut data = jpeg(&[7]);
        data.extend_from_slice(&SOI);
        data.extend_from_slice(&[1, 2, 3]);
        let store = FrameStore::from_bytes(data).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn nested_start_marker_belongs_to_outer_frame() {
        let mut data = SOI.to_vec();
        data.extend_from_slice(&SOI);
        data.extend_from_slice(&EOI);
        data.extend(jpeg(&[4]));
        let store = FrameStore::from_bytes(data).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.at(0).len(), 6);
    }

    #[test]
    fn empty_frame_body() {
        let store = FrameStore::from_bytes(jpeg(&[])).unwrap();
        assert_eq!(store.at(0), &[0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..3u8 {
            file.write_all(&jpeg(&[i; 10])).unwrap();
        }
        let store = FrameStore::load(file.path()).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.iter().count(), 3);
    }

    #[test]
    fn load_missing_file() {
        let err = FrameStore::load("/definitely/not/here.mjpeg").unwrap_err();
        assert!(matches!(err, StreamError::FileUnavailable { .. }));
    }

    #[test]
    fn load_file_without_frames() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"plain text").unwrap();
        let err = FrameStore::load(file.path()).unwrap_err();
        assert!(matches!(err, StreamError::NoFramesFound { .. }));
    }
}
