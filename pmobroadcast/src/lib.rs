//! # pmobroadcast - Wall-clock aligned HLS streaming for radio stations
//!
//! `pmobroadcast` keeps one live HLS feed per running station. Songs picked
//! from the station's agenda are cut into fixed-duration segments, queued,
//! and released into a bounded live window on shared, wall-clock aligned
//! ticks.
//!
//! ## Features
//!
//! - **Shared tickers**: one hot publisher per period, aligned on absolute
//!   time so every station drips on the same boundaries
//! - **Drip feed**: at most one segment per feeder tick, live buffer capped at
//!   twice the visible window, oldest segments evicted on slider ticks
//! - **Station pool**: atomic create-or-reuse per brand, stop, hot config
//!   update, live status
//! - **Agenda playlist**: priority queue, then the scene on air, then the
//!   brand pool
//! - **Housekeeping**: agenda rebuild without downtime, idle station reaper
//!
//! ## Architecture
//!
//! ```text
//!                 TickerHub (feeder / slider)
//!                        │ ticks
//!                        ▼
//! RadioStationPool ──► StreamManager ──► worker ──► feed / slide
//!        │                   ▲
//!        │                   │ LiveFragment
//!        ▼                   │
//!   AgendaScheduler   AgendaPlaylist ──► AudioStore ──► Segmenter
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use pmobroadcast::{BroadcastConfig, RadioStationPool, TickerHub};
//! # use std::sync::Arc;
//! # async fn demo(
//! #     repository: Arc<dyn pmobroadcast::StationRepository>,
//! #     scheduler: Arc<pmoagenda::AgendaScheduler>,
//! #     playlists: Arc<dyn pmobroadcast::PlaylistFactory>,
//! # ) -> pmobroadcast::Result<()> {
//! let config = BroadcastConfig::default();
//! let tickers = Arc::new(TickerHub::from_config(&config.timers));
//! let pool = RadioStationPool::new(
//!     repository,
//!     scheduler,
//!     playlists,
//!     Arc::new(pmobroadcast::LoggingPlayCountSink),
//!     tickers,
//!     config,
//! );
//!
//! let station = pool.initialize_station("jazz-fm").await?;
//! println!("{}", station.manager().generate_playlist());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod config_ext;
pub mod error;
pub mod pool;
pub mod reaper;
pub mod rebuild;
pub mod segment;
pub mod source;
pub mod station;
pub mod stream;
pub mod ticker;

pub use config::BroadcastConfig;
pub use config_ext::BroadcastConfigExt;
pub use error::{BroadcastError, Result};
pub use pool::{RadioStationPool, StationRepository};
pub use reaper::InactivityReaper;
pub use rebuild::AgendaRebuildService;
pub use segment::{HlsSegment, SongMetadata};
pub use source::{
    AgendaPlaylist, AgendaPlaylistFactory, AudioSource, AudioStore, ChunkSegmenter,
    FfmpegSegmenter, FragmentSource, FsAudioStore, LiveFragment, LoggingPlayCountSink,
    PlayCountSink, PlaylistFactory, Segmenter,
};
pub use station::{
    ManagedBy, RadioStation, StationDefinition, StationState, StationStatus, StreamKind,
};
pub use stream::{LiveStatus, NowPlaying, SegmentTimeline, StreamManager, StreamStats};
pub use ticker::{TickSubscription, TickerHub, WallClockTicker};
