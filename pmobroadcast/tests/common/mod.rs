#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use pmoagenda::{
    AgendaScheduler, PlaylistItemType, PlaylistRequest, Scene, Script, ScriptRepository,
    SongSupplier, SoundFragment,
};
use pmobroadcast::{
    AgendaPlaylistFactory, AudioSource, AudioStore, BroadcastConfig, ChunkSegmenter,
    FragmentSource, HlsSegment, LiveFragment, PlayCountSink, RadioStationPool, SongMetadata,
    StationDefinition, StationRepository, TickerHub,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Bytes per second of audio at 128 kbps
pub const BYTES_PER_SEC: usize = 16_000;

/// Tickers that never fire during a test; cycles are driven by hand.
pub fn idle_tickers() -> Arc<TickerHub> {
    let year = Duration::from_secs(365 * 24 * 3600);
    Arc::new(TickerHub::new(year, year + Duration::from_secs(1)))
}

pub fn test_config(max_visible: usize) -> BroadcastConfig {
    let mut config = BroadcastConfig::default();
    config.hls.max_visible_segments = max_visible;
    config
}

pub fn song(title: &str, artist: &str, length_secs: u32) -> SoundFragment {
    SoundFragment::new(Uuid::new_v4(), title, artist).with_length(length_secs)
}

pub fn mock_segments(song: &SoundFragment, count: usize) -> Vec<HlsSegment> {
    (0..count)
        .map(|_| {
            HlsSegment::new(
                Bytes::from(vec![0u8; 10 * BYTES_PER_SEC]),
                10,
                SongMetadata::new(song.title.clone(), song.artist.clone()),
                song.id,
            )
        })
        .collect()
}

/// Fragment source yielding fixed-size fragments, optionally failing first.
pub struct ScriptedSource {
    segments_per_fragment: usize,
    failures: AtomicUsize,
    /// Served every time instead of a fresh track
    repeated: Option<SoundFragment>,
    served: Mutex<Vec<SoundFragment>>,
}

impl ScriptedSource {
    pub fn new(segments_per_fragment: usize) -> Arc<Self> {
        Self::failing(segments_per_fragment, 0)
    }

    pub fn failing(segments_per_fragment: usize, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            segments_per_fragment,
            failures: AtomicUsize::new(failures),
            repeated: None,
            served: Mutex::new(Vec::new()),
        })
    }

    /// Serves `song` over and over.
    pub fn repeating(song: SoundFragment, segments_per_fragment: usize) -> Arc<Self> {
        Arc::new(Self {
            segments_per_fragment,
            failures: AtomicUsize::new(0),
            repeated: Some(song),
            served: Mutex::new(Vec::new()),
        })
    }

    pub fn served(&self) -> Vec<SoundFragment> {
        self.served.lock().unwrap().clone()
    }
}

#[async_trait]
impl FragmentSource for ScriptedSource {
    async fn next_fragment(&self) -> anyhow::Result<Option<LiveFragment>> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("storage unavailable");
        }
        let index = self.served.lock().unwrap().len();
        let song = match &self.repeated {
            Some(song) => song.clone(),
            None => song(&format!("Track {index}"), "Trio", 10 * self.segments_per_fragment as u32),
        };
        self.served.lock().unwrap().push(song.clone());
        let segments = mock_segments(&song, self.segments_per_fragment);
        Ok(Some(LiveFragment::new(song, segments)))
    }
}

#[derive(Default)]
pub struct RecordingPlayCounts {
    played: Mutex<Vec<(Uuid, Uuid, String)>>,
}

impl RecordingPlayCounts {
    pub fn played_songs(&self) -> Vec<Uuid> {
        self.played.lock().unwrap().iter().map(|(_, song, _)| *song).collect()
    }

    /// Waits for spawned notifications to land.
    pub async fn wait_for(&self, count: usize) -> Vec<Uuid> {
        for _ in 0..100 {
            if self.played.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.played_songs()
    }
}

#[async_trait]
impl PlayCountSink for RecordingPlayCounts {
    async fn played(&self, brand_id: Uuid, song_id: Uuid, slug: &str) -> anyhow::Result<()> {
        self.played
            .lock()
            .unwrap()
            .push((brand_id, song_id, slug.to_string()));
        Ok(())
    }
}

/// Station definitions kept in memory; lookups yield once so concurrent
/// starts interleave.
#[derive(Default)]
pub struct MemoryStations {
    stations: Mutex<HashMap<String, StationDefinition>>,
}

impl MemoryStations {
    pub fn insert(&self, definition: StationDefinition) {
        self.stations
            .lock()
            .unwrap()
            .insert(definition.slug.clone(), definition);
    }

    pub fn remove(&self, slug: &str) {
        self.stations.lock().unwrap().remove(slug);
    }
}

#[async_trait]
impl StationRepository for MemoryStations {
    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<StationDefinition>> {
        tokio::task::yield_now().await;
        Ok(self.stations.lock().unwrap().get(slug).cloned())
    }
}

#[derive(Default)]
pub struct MemoryScripts {
    scripts: Mutex<HashMap<Uuid, Script>>,
}

impl MemoryScripts {
    pub fn insert(&self, script: Script) {
        self.scripts.lock().unwrap().insert(script.id, script);
    }
}

#[async_trait]
impl ScriptRepository for MemoryScripts {
    async fn find_script(&self, script_id: Uuid) -> anyhow::Result<Option<Script>> {
        Ok(self.scripts.lock().unwrap().get(&script_id).cloned())
    }
}

/// Returns the catalog in order, whatever the request.
pub struct FixedSupplier {
    songs: Vec<SoundFragment>,
}

impl FixedSupplier {
    pub fn new(songs: Vec<SoundFragment>) -> Arc<Self> {
        Arc::new(Self { songs })
    }

    fn take(&self, quantity: usize) -> Vec<SoundFragment> {
        self.songs.iter().take(quantity).cloned().collect()
    }
}

#[async_trait]
impl SongSupplier for FixedSupplier {
    async fn songs_for_brand(
        &self,
        _brand_id: Uuid,
        _item_type: PlaylistItemType,
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>> {
        Ok(self.take(quantity))
    }

    async fn songs_by_query(
        &self,
        _brand_id: Uuid,
        _request: &PlaylistRequest,
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>> {
        Ok(self.take(quantity))
    }

    async fn songs_from_static_list(
        &self,
        ids: &[Uuid],
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>> {
        Ok(self
            .songs
            .iter()
            .filter(|s| ids.contains(&s.id))
            .take(quantity)
            .cloned()
            .collect())
    }
}

/// Silent audio sized from the song length at 128 kbps.
pub struct MemoryAudio;

#[async_trait]
impl AudioStore for MemoryAudio {
    async fn load(&self, song: &SoundFragment) -> anyhow::Result<AudioSource> {
        let size = song.duration_secs() as usize * BYTES_PER_SEC;
        Ok(AudioSource::Memory(Bytes::from(vec![0u8; size])))
    }
}

pub fn scene(title: &str, seq_num: i32, duration_secs: u32) -> Scene {
    Scene {
        id: Uuid::new_v4(),
        title: title.into(),
        seq_num,
        start_time: None,
        duration_secs,
        talkativity: 0.0,
        one_time_run: false,
        playlist_request: None,
    }
}

pub fn script(title: &str, scenes: Vec<Scene>) -> Script {
    Script {
        id: Uuid::new_v4(),
        title: title.into(),
        scenes,
    }
}

/// A pool wired with in-memory collaborators.
pub struct TestPool {
    pub pool: Arc<RadioStationPool>,
    pub stations: Arc<MemoryStations>,
    pub scripts: Arc<MemoryScripts>,
    pub scheduler: Arc<AgendaScheduler>,
    pub play_counts: Arc<RecordingPlayCounts>,
}

pub fn mock_pool(config: BroadcastConfig, catalog: Vec<SoundFragment>) -> TestPool {
    let stations = Arc::new(MemoryStations::default());
    let scripts = Arc::new(MemoryScripts::default());
    let supplier = FixedSupplier::new(catalog);
    let scheduler = Arc::new(AgendaScheduler::new(supplier.clone(), scripts.clone()));
    let play_counts = Arc::new(RecordingPlayCounts::default());
    let playlists = Arc::new(AgendaPlaylistFactory::new(
        supplier,
        Arc::new(MemoryAudio),
        Arc::new(ChunkSegmenter::new(config.hls.segment_duration_secs)),
    ));

    let pool = Arc::new(RadioStationPool::new(
        stations.clone(),
        scheduler.clone(),
        playlists,
        play_counts.clone(),
        idle_tickers(),
        config,
    ));

    TestPool {
        pool,
        stations,
        scripts,
        scheduler,
        play_counts,
    }
}

/// Registers `slug` with a script built from `scenes`.
pub fn register_station(test: &TestPool, slug: &str, scenes: Vec<Scene>) -> StationDefinition {
    let script = script(&format!("{slug} schedule"), scenes);
    let mut definition = StationDefinition::new(Uuid::new_v4(), slug);
    definition.scripts.push(script.id);
    test.scripts.insert(script);
    test.stations.insert(definition.clone());
    definition
}

/// Sequences listed by a playlist, in order.
pub fn playlist_sequences(playlist: &str) -> Vec<u64> {
    playlist
        .lines()
        .filter(|line| line.starts_with("segments/"))
        .filter_map(pmobroadcast::segment::parse_segment_sequence)
        .collect()
}

pub fn media_sequence(playlist: &str) -> Option<u64> {
    playlist
        .lines()
        .find_map(|line| line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:"))
        .and_then(|value| value.parse().ok())
}
