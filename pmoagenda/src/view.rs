//! Serializable projection of an [`Agenda`] for status and schedule endpoints.

use crate::agenda::{Agenda, LiveScene, ScheduledSongEntry};
use crate::scheduler::AVG_DJ_INTRO_SECS;
use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct StreamScheduleView {
    pub created_at: NaiveDateTime,
    pub estimated_end_time: NaiveDateTime,
    pub total_scenes: usize,
    pub total_songs: usize,
    pub scenes: Vec<SceneScheduleView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneScheduleView {
    pub scene_id: Uuid,
    pub scene_title: String,
    pub scheduled_start_time: NaiveDateTime,
    pub scheduled_end_time: NaiveDateTime,
    pub duration_seconds: u32,
    pub original_start_time: Option<NaiveTime>,
    pub original_end_time: Option<NaiveTime>,
    pub playlist_request: ScenePlaylistRequestView,
    pub songs: Vec<ScheduledSongView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenePlaylistRequestView {
    pub sourcing: Option<String>,
    pub playlist_title: Option<String>,
    pub artist: Option<String>,
    pub genres: Vec<Uuid>,
    pub labels: Vec<Uuid>,
    pub playlist_item_types: Vec<String>,
    pub source_types: Vec<String>,
    pub search_term: String,
    pub sound_fragments: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledSongView {
    pub id: Uuid,
    pub song_id: Uuid,
    pub title: String,
    pub artist: String,
    pub scheduled_start_time: NaiveDateTime,
    pub estimated_duration_seconds: u32,
}

impl From<&Agenda> for StreamScheduleView {
    fn from(agenda: &Agenda) -> Self {
        Self {
            created_at: agenda.created_at,
            estimated_end_time: agenda.estimated_end_time(),
            total_scenes: agenda.total_scenes(),
            total_songs: agenda.total_songs(),
            scenes: agenda.scenes.iter().map(SceneScheduleView::from).collect(),
        }
    }
}

impl From<&LiveScene> for SceneScheduleView {
    fn from(scene: &LiveScene) -> Self {
        Self {
            scene_id: scene.scene_id,
            scene_title: scene.title.clone(),
            scheduled_start_time: scene.scheduled_start,
            scheduled_end_time: scene.scheduled_end(),
            duration_seconds: scene.duration_secs,
            original_start_time: scene.original_start,
            original_end_time: scene.original_end,
            playlist_request: ScenePlaylistRequestView::from(scene),
            songs: scene.songs.iter().map(ScheduledSongView::from).collect(),
            warning: scene_warning(scene),
        }
    }
}

impl From<&LiveScene> for ScenePlaylistRequestView {
    fn from(scene: &LiveScene) -> Self {
        let Some(request) = scene.playlist_request.as_ref() else {
            return Self::default();
        };
        Self {
            sourcing: scene.sourcing.map(|s| s.as_str().to_string()),
            playlist_title: request.title.clone(),
            artist: request.artist.clone(),
            genres: request.genres.clone(),
            labels: request.labels.clone(),
            playlist_item_types: request
                .item_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            source_types: request
                .sources
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            search_term: request.search_term.clone().unwrap_or_default(),
            sound_fragments: request.sound_fragments.clone(),
        }
    }
}

impl From<&ScheduledSongEntry> for ScheduledSongView {
    fn from(entry: &ScheduledSongEntry) -> Self {
        Self {
            id: entry.id,
            song_id: entry.song.id,
            title: entry.song.title.clone(),
            artist: entry.song.artist.clone(),
            scheduled_start_time: entry.scheduled_start,
            estimated_duration_seconds: entry.duration_secs(),
        }
    }
}

/// Flags silent scenes and scenes whose songs plus intros run past their slot.
fn scene_warning(scene: &LiveScene) -> Option<String> {
    if scene.songs.is_empty() {
        return Some(
            "No songs scheduled: scene will be silent unless the DJ fills the entire duration."
                .to_string(),
        );
    }

    let music: i64 = scene.songs.iter().map(|s| i64::from(s.duration_secs())).sum();
    let with_intros = music + scene.songs.len() as i64 * AVG_DJ_INTRO_SECS;
    let slot = i64::from(scene.duration_secs);
    if with_intros <= slot {
        return None;
    }
    let overflow = with_intros - slot;
    Some(format!(
        "Songs extend beyond scene: total duration (~{:.1} min) exceeds scene duration ({:.1} min) by ~{:.1} min.",
        with_intros as f64 / 60.0,
        slot as f64 / 60.0,
        overflow as f64 / 60.0
    ))
}
