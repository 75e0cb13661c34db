use super::segmenter::Segmenter;
use super::storage::AudioStore;
use super::{FragmentSource, LiveFragment, PlaylistFactory};
use crate::segment::HlsSegment;
use crate::station::{ManagedBy, StationState, StreamKind};
use async_trait::async_trait;
use chrono::Local;
use pmoagenda::{PlaylistItemType, SongSupplier, SoundFragment};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Default)]
struct PlaylistCursor {
    priority: VecDeque<SoundFragment>,
    /// Entries of the current scene already handed out
    played: HashSet<Uuid>,
    scene_id: Option<Uuid>,
}

/// Where a song came from, so a failed preparation can hand it back.
#[derive(Debug)]
enum Pick {
    Priority(SoundFragment),
    Scheduled { entry_id: Uuid, song: SoundFragment },
    Brand(SoundFragment),
}

impl Pick {
    fn song(&self) -> &SoundFragment {
        match self {
            Pick::Priority(song) | Pick::Brand(song) => song,
            Pick::Scheduled { song, .. } => song,
        }
    }

    fn into_song(self) -> SoundFragment {
        match self {
            Pick::Priority(song) | Pick::Brand(song) => song,
            Pick::Scheduled { song, .. } => song,
        }
    }
}

/// Fragment source following a station's agenda.
///
/// Selection order:
/// 1. songs queued with [`enqueue_priority`](Self::enqueue_priority);
/// 2. the next unplayed song of the scene on air;
/// 3. one random brand song, unless a DJ curates the station.
pub struct AgendaPlaylist {
    station: Arc<StationState>,
    kind: StreamKind,
    supplier: Arc<dyn SongSupplier>,
    store: Arc<dyn AudioStore>,
    segmenter: Arc<dyn Segmenter>,
    cursor: Mutex<PlaylistCursor>,
}

impl AgendaPlaylist {
    pub fn new(
        station: Arc<StationState>,
        kind: StreamKind,
        supplier: Arc<dyn SongSupplier>,
        store: Arc<dyn AudioStore>,
        segmenter: Arc<dyn Segmenter>,
    ) -> Self {
        Self {
            station,
            kind,
            supplier,
            store,
            segmenter,
            cursor: Mutex::new(PlaylistCursor::default()),
        }
    }

    /// Queues a song ahead of the agenda.
    pub async fn enqueue_priority(&self, song: SoundFragment) {
        info!(station = %self.station.slug(), song = %song.display_name(), "Song queued with priority");
        self.cursor.lock().await.priority.push_back(song);
    }

    pub async fn priority_len(&self) -> usize {
        self.cursor.lock().await.priority.len()
    }

    async fn next_song(&self) -> anyhow::Result<Option<Pick>> {
        let now = Local::now().naive_local();
        let agenda = self.station.agenda();
        {
            let mut cursor = self.cursor.lock().await;
            if let Some(song) = cursor.priority.pop_front() {
                return Ok(Some(Pick::Priority(song)));
            }

            if self.kind.is_completed(agenda.as_deref(), now) {
                debug!(station = %self.station.slug(), "Stream completed, nothing to play");
                return Ok(None);
            }

            if let Some(scene) = agenda
                .as_deref()
                .and_then(|agenda| self.kind.find_active_scene(agenda, now))
            {
                if cursor.scene_id != Some(scene.scene_id) {
                    debug!(station = %self.station.slug(), scene = %scene.title, "Entering scene");
                    cursor.scene_id = Some(scene.scene_id);
                    cursor.played.clear();
                }
                let next = scene
                    .songs
                    .iter()
                    .find(|entry| !cursor.played.contains(&entry.id));
                if let Some(entry) = next {
                    cursor.played.insert(entry.id);
                    return Ok(Some(Pick::Scheduled {
                        entry_id: entry.id,
                        song: entry.song.clone(),
                    }));
                }
            }
        }

        if self.station.managed_by() == ManagedBy::Dj {
            return Ok(None);
        }

        let mut songs = self
            .supplier
            .songs_for_brand(self.station.brand_id(), PlaylistItemType::Song, 1)
            .await?;
        Ok(songs.pop().map(Pick::Brand))
    }

    /// Puts a song whose audio could not be prepared back in line.
    async fn restore(&self, pick: Pick) {
        let mut cursor = self.cursor.lock().await;
        match pick {
            Pick::Priority(song) => cursor.priority.push_front(song),
            Pick::Scheduled { entry_id, .. } => {
                cursor.played.remove(&entry_id);
            }
            Pick::Brand(_) => {}
        }
    }

    async fn prepare(&self, song: &SoundFragment) -> anyhow::Result<Vec<HlsSegment>> {
        let bitrate = self.station.definition().bitrate_kbps;
        let audio = self.store.load(song).await?;
        self.segmenter.segment(song, audio, bitrate).await
    }
}

#[async_trait]
impl FragmentSource for AgendaPlaylist {
    async fn next_fragment(&self) -> anyhow::Result<Option<LiveFragment>> {
        let Some(pick) = self.next_song().await? else {
            return Ok(None);
        };

        let segments = match self.prepare(pick.song()).await {
            Ok(segments) => segments,
            Err(err) => {
                self.restore(pick).await;
                return Err(err);
            }
        };
        let song = pick.into_song();
        debug!(
            station = %self.station.slug(),
            song = %song.display_name(),
            segments = segments.len(),
            "Prepared fragment"
        );
        Ok(Some(LiveFragment::new(song, segments)))
    }
}

/// Creates an [`AgendaPlaylist`] per station.
#[derive(Clone)]
pub struct AgendaPlaylistFactory {
    supplier: Arc<dyn SongSupplier>,
    store: Arc<dyn AudioStore>,
    segmenter: Arc<dyn Segmenter>,
}

impl AgendaPlaylistFactory {
    pub fn new(
        supplier: Arc<dyn SongSupplier>,
        store: Arc<dyn AudioStore>,
        segmenter: Arc<dyn Segmenter>,
    ) -> Self {
        Self {
            supplier,
            store,
            segmenter,
        }
    }
}

impl PlaylistFactory for AgendaPlaylistFactory {
    fn create(&self, station: Arc<StationState>, kind: StreamKind) -> Arc<dyn FragmentSource> {
        Arc::new(AgendaPlaylist::new(
            station,
            kind,
            self.supplier.clone(),
            self.store.clone(),
            self.segmenter.clone(),
        ))
    }
}
