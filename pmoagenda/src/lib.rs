//! # pmoagenda - Scene based scheduling for radio stations
//!
//! `pmoagenda` decides *what plays when* on a station. A station runs a
//! [`Script`], an ordered set of [`Scene`]s; each scene has a duration, a
//! sourcing rule and a talk ratio. The [`AgendaScheduler`] turns a script into
//! an [`Agenda`]: scenes placed on the clock, each holding the songs picked
//! to fill it.
//!
//! ## Features
//!
//! - **Forward schedules**: scenes back to back from now, greedy song fitting
//!   with a one-minute gap tolerance
//! - **Looped schedules**: daily scenes anchored to their start times,
//!   wrapping across midnight, with a talk-ratio discounted music budget
//! - **Song supply**: [`ScheduleSongSupplier`] returns shuffled, size-capped
//!   pools from a [`SongRepository`]
//! - **Schedule view**: [`StreamScheduleView`] with per-scene warnings
//!
//! ## Architecture
//!
//! ```text
//! ScriptRepository ──► AgendaScheduler ──► Agenda ──► StreamScheduleView
//!                            ▲
//! SongRepository ──► ScheduleSongSupplier (SongSupplier)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use pmoagenda::{AgendaScheduler, BuildMode, ScheduleSongSupplier};
//! # use std::sync::Arc;
//! # async fn demo(
//! #     songs: Arc<dyn pmoagenda::SongRepository>,
//! #     scripts: Arc<dyn pmoagenda::ScriptRepository>,
//! #     brand_id: uuid::Uuid,
//! #     script_id: uuid::Uuid,
//! # ) -> pmoagenda::Result<()> {
//! let supplier = Arc::new(ScheduleSongSupplier::new(songs));
//! let scheduler = AgendaScheduler::new(supplier, scripts);
//!
//! let agenda = scheduler
//!     .build_for_script(brand_id, script_id, BuildMode::Looped)
//!     .await?;
//! println!("{} scenes, {} songs", agenda.total_scenes(), agenda.total_songs());
//! # Ok(())
//! # }
//! ```

pub mod agenda;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod supplier;
pub mod view;

pub use agenda::{Agenda, GeneratedContentStatus, LiveScene, ScheduledSongEntry};
pub use error::{AgendaError, Result};
pub use model::{
    PlaylistItemType, PlaylistRequest, Scene, Script, SongFilter, SoundFragment, SourceType,
    WayOfSourcing, DEFAULT_SONG_DURATION_SECS,
};
pub use scheduler::{AgendaScheduler, BuildMode, ScriptRepository};
pub use supplier::{ScheduleSongSupplier, SongRepository, SongSupplier};
pub use view::{SceneScheduleView, StreamScheduleView};
