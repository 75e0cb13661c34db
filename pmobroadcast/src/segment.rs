//! HLS segments and segment naming.

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

static SEGMENT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([^_]+)_([0-9]+)\.ts$").expect("segment name pattern is valid")
});

/// Song shown next to each `#EXTINF` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SongMetadata {
    pub title: String,
    pub artist: String,
}

impl SongMetadata {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }
}

impl fmt::Display for SongMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artist.is_empty() {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{} - {}", self.artist, self.title)
        }
    }
}

/// One fixed-duration chunk of a fragment.
///
/// The payload is shared, so cloning a segment never copies audio.
/// `sequence` is `0` until the stream manager hands the segment to its
/// pending queue.
#[derive(Debug, Clone)]
pub struct HlsSegment {
    pub sequence: u64,
    pub data: Bytes,
    /// Wall-clock creation time (epoch seconds)
    pub timestamp: i64,
    pub duration_secs: u32,
    pub bitrate_kbps: u32,
    pub metadata: SongMetadata,
    /// Id of the song this segment was cut from
    pub song_id: Uuid,
    /// Id of the play this segment belongs to, set at hand-off
    pub fragment_id: Uuid,
    pub first_of_fragment: bool,
}

impl HlsSegment {
    pub fn new(
        data: Bytes,
        duration_secs: u32,
        metadata: SongMetadata,
        song_id: Uuid,
    ) -> Self {
        let bitrate_kbps = derive_bitrate(data.len(), duration_secs);
        Self {
            sequence: 0,
            data,
            timestamp: chrono::Utc::now().timestamp(),
            duration_secs,
            bitrate_kbps,
            metadata,
            song_id,
            fragment_id: Uuid::nil(),
            first_of_fragment: false,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Sets the sequence number, play id and first-of-fragment flag at
    /// hand-off.
    pub fn assign(mut self, sequence: u64, fragment_id: Uuid, first_of_fragment: bool) -> Self {
        self.sequence = sequence;
        self.fragment_id = fragment_id;
        self.first_of_fragment = first_of_fragment;
        self
    }
}

/// `size * 8 / (duration * 1000)` kbps
pub fn derive_bitrate(size: usize, duration_secs: u32) -> u32 {
    if duration_secs == 0 {
        return 0;
    }
    let bits = size as u64 * 8;
    (bits / (u64::from(duration_secs) * 1000)) as u32
}

/// `<slug>_<sequence>.ts`
pub fn segment_file_name(slug: &str, sequence: u64) -> String {
    format!("{slug}_{sequence}.ts")
}

/// Recovers the sequence from a segment name or URL.
pub fn parse_segment_sequence(name: &str) -> Option<u64> {
    SEGMENT_NAME
        .captures(name)
        .and_then(|caps| caps.get(2))
        .and_then(|seq| seq.as_str().parse().ok())
}
