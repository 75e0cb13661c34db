//! Content collaborators of the stream manager.
//!
//! The manager only knows [`FragmentSource`]: "give me the next song, already
//! cut into segments". The provided implementation, [`AgendaPlaylist`],
//! walks the station's agenda and relies on two narrower seams:
//!
//! - [`AudioStore`] resolves a song to its audio bytes or file;
//! - [`Segmenter`] cuts that audio into fixed-duration [`HlsSegment`]s.
//!
//! [`PlayCountSink`] receives "song finished playing" notifications.

mod playlist;
mod segmenter;
mod storage;

pub use playlist::{AgendaPlaylist, AgendaPlaylistFactory};
pub use segmenter::{ChunkSegmenter, FfmpegSegmenter, Segmenter};
pub use storage::{AudioSource, AudioStore, FsAudioStore};

use crate::segment::HlsSegment;
use crate::station::{StationState, StreamKind};
use async_trait::async_trait;
use pmoagenda::SoundFragment;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A song ready for the pending queue.
#[derive(Debug, Clone)]
pub struct LiveFragment {
    /// Id of this play; the same song played twice gets two ids
    pub id: Uuid,
    pub song: SoundFragment,
    /// Ordered segments, sequences not yet assigned
    pub segments: Vec<HlsSegment>,
}

impl LiveFragment {
    pub fn new(song: SoundFragment, segments: Vec<HlsSegment>) -> Self {
        Self {
            id: Uuid::new_v4(),
            song,
            segments,
        }
    }
}

/// Supplies the next fragment to stream.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// `Ok(None)` when nothing is available right now.
    async fn next_fragment(&self) -> anyhow::Result<Option<LiveFragment>>;
}

/// Builds the fragment source of a station when the pool starts it.
pub trait PlaylistFactory: Send + Sync {
    fn create(&self, station: Arc<StationState>, kind: StreamKind) -> Arc<dyn FragmentSource>;
}

/// Receives play-count updates.
#[async_trait]
pub trait PlayCountSink: Send + Sync {
    async fn played(&self, brand_id: Uuid, song_id: Uuid, slug: &str) -> anyhow::Result<()>;
}

/// Play-count sink that only logs.
#[derive(Debug, Default, Clone)]
pub struct LoggingPlayCountSink;

#[async_trait]
impl PlayCountSink for LoggingPlayCountSink {
    async fn played(&self, brand_id: Uuid, song_id: Uuid, slug: &str) -> anyhow::Result<()> {
        info!(station = slug, %brand_id, %song_id, "Song played");
        Ok(())
    }
}
