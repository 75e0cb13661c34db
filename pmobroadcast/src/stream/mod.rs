//! Per-station HLS stream: segment buffers, worker and playlist rendering.

pub mod hls;
mod manager;
mod worker;

pub use hls::{PLAYLIST_CONTENT_TYPE, SEGMENT_CONTENT_TYPE};
pub use manager::{LiveStatus, NowPlaying, SegmentTimeline, StreamManager, StreamStats};
