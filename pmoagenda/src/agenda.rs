//! Built agendas: live scenes with their scheduled songs.

use crate::model::{PlaylistRequest, Scene, SoundFragment, WayOfSourcing};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progress of on-demand content for `GENERATED` scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeneratedContentStatus {
    Pending,
    Processing,
    Generated,
    Failed,
}

/// A song placed at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledSongEntry {
    pub id: Uuid,
    pub song: SoundFragment,
    pub scheduled_start: NaiveDateTime,
}

impl ScheduledSongEntry {
    pub fn new(song: SoundFragment, scheduled_start: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            song,
            scheduled_start,
        }
    }

    pub fn duration_secs(&self) -> u32 {
        self.song.duration_secs()
    }

    pub fn scheduled_end(&self) -> NaiveDateTime {
        self.scheduled_start + Duration::seconds(i64::from(self.duration_secs()))
    }
}

/// A scene instantiated inside an agenda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveScene {
    pub scene_id: Uuid,
    pub title: String,
    pub scheduled_start: NaiveDateTime,
    pub duration_secs: u32,
    pub talkativity: f64,
    pub one_time_run: bool,
    pub sourcing: Option<WayOfSourcing>,
    pub playlist_request: Option<PlaylistRequest>,
    pub songs: Vec<ScheduledSongEntry>,
    /// Daily start of the scene in looped schedules
    pub original_start: Option<NaiveTime>,
    /// Daily end (start of the following scene) in looped schedules
    pub original_end: Option<NaiveTime>,
    pub generated_status: Option<GeneratedContentStatus>,
    pub generated_fragment_id: Option<Uuid>,
}

impl LiveScene {
    /// Instantiates `scene` at `scheduled_start` for `duration_secs`.
    pub fn from_scene(scene: &Scene, scheduled_start: NaiveDateTime, duration_secs: u32) -> Self {
        let sourcing = scene.sourcing();
        Self {
            scene_id: scene.id,
            title: scene.title.clone(),
            scheduled_start,
            duration_secs,
            talkativity: scene.talkativity,
            one_time_run: scene.one_time_run,
            sourcing,
            playlist_request: scene.playlist_request.clone(),
            songs: Vec::new(),
            original_start: scene.start_time,
            original_end: None,
            generated_status: (sourcing == Some(WayOfSourcing::Generated))
                .then_some(GeneratedContentStatus::Pending),
            generated_fragment_id: None,
        }
    }

    pub fn with_original_window(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.original_start = Some(start);
        self.original_end = Some(end);
        self
    }

    /// Places songs back to back from the scene start.
    pub fn schedule_songs(&mut self, songs: Vec<SoundFragment>) {
        let mut cursor = self
            .songs
            .last()
            .map(ScheduledSongEntry::scheduled_end)
            .unwrap_or(self.scheduled_start);
        for song in songs {
            let entry = ScheduledSongEntry::new(song, cursor);
            cursor = entry.scheduled_end();
            self.songs.push(entry);
        }
    }

    pub fn add_song(&mut self, entry: ScheduledSongEntry) {
        self.songs.push(entry);
    }

    pub fn scheduled_end(&self) -> NaiveDateTime {
        self.scheduled_start + Duration::seconds(i64::from(self.duration_secs))
    }

    /// Share of a day covered by this scene
    pub fn day_percentage(&self) -> f64 {
        f64::from(self.duration_secs) / 86_400.0
    }

    /// Whether the scene's daily window contains `time`.
    ///
    /// The window ends at `original_end`, or at `next_start` when the scene
    /// has no end of its own; without either it is open-ended. A window whose
    /// end is not after its start wraps across midnight.
    pub fn is_active_at(&self, time: NaiveTime, next_start: Option<NaiveTime>) -> bool {
        let Some(start) = self.original_start else {
            return false;
        };
        match self.original_end.or(next_start) {
            None => time >= start,
            Some(end) if end > start => time >= start && time < end,
            Some(end) => time >= start || time < end,
        }
    }

    /// Whether the absolute schedule covers `now`
    pub fn is_scheduled_at(&self, now: NaiveDateTime) -> bool {
        now >= self.scheduled_start && now < self.scheduled_end()
    }
}

/// Ordered scenes covering a span of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agenda {
    pub created_at: NaiveDateTime,
    pub scenes: Vec<LiveScene>,
}

impl Agenda {
    pub fn new(created_at: NaiveDateTime) -> Self {
        Self {
            created_at,
            scenes: Vec::new(),
        }
    }

    pub fn add_scene(&mut self, scene: LiveScene) {
        self.scenes.push(scene);
    }

    pub fn total_scenes(&self) -> usize {
        self.scenes.len()
    }

    pub fn total_songs(&self) -> usize {
        self.scenes.iter().map(|s| s.songs.len()).sum()
    }

    /// End of the last scene, or the creation time of an empty agenda
    pub fn estimated_end_time(&self) -> NaiveDateTime {
        self.scenes
            .last()
            .map(LiveScene::scheduled_end)
            .unwrap_or(self.created_at)
    }

    pub fn scene(&self, scene_id: Uuid) -> Option<&LiveScene> {
        self.scenes.iter().find(|s| s.scene_id == scene_id)
    }

    pub fn scene_mut(&mut self, scene_id: Uuid) -> Option<&mut LiveScene> {
        self.scenes.iter_mut().find(|s| s.scene_id == scene_id)
    }

    /// Scene whose absolute slot contains `now`
    pub fn scene_scheduled_at(&self, now: NaiveDateTime) -> Option<&LiveScene> {
        self.scenes.iter().find(|s| s.is_scheduled_at(now))
    }

    /// Scene whose daily window contains the wall-clock `time`
    pub fn scene_active_at(&self, time: NaiveTime) -> Option<&LiveScene> {
        let count = self.scenes.len();
        self.scenes.iter().enumerate().find_map(|(i, scene)| {
            let next_start = self.scenes[(i + 1) % count].original_start;
            scene.is_active_at(time, next_start).then_some(scene)
        })
    }
}
