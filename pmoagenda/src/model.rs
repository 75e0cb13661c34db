//! Catalog models read from the persistence collaborators.
//!
//! These are plain data: songs, the playlist requests attached to scenes,
//! scenes and the scripts grouping them. The scheduler never writes them.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Duration assumed for a song whose length is unknown.
pub const DEFAULT_SONG_DURATION_SECS: u32 = 180;

/// Talk ratio given to scenes that do not specify one.
pub const DEFAULT_TALKATIVITY: f64 = 0.5;

/// Kind of playable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaylistItemType {
    #[default]
    Song,
    Jingle,
    Advertisement,
    Message,
}

/// Where an item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    #[default]
    Users,
    Storage,
    Generated,
    TextToSpeech,
}

/// How a scene obtains its candidate songs.
///
/// A scene without a sourcing mode uses the brand's default pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WayOfSourcing {
    Query,
    StaticList,
    Generated,
}

impl PlaylistItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Song => "SONG",
            Self::Jingle => "JINGLE",
            Self::Advertisement => "ADVERTISEMENT",
            Self::Message => "MESSAGE",
        }
    }
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "USERS",
            Self::Storage => "STORAGE",
            Self::Generated => "GENERATED",
            Self::TextToSpeech => "TEXT_TO_SPEECH",
        }
    }
}

impl WayOfSourcing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "QUERY",
            Self::StaticList => "STATIC_LIST",
            Self::Generated => "GENERATED",
        }
    }
}

/// A playable audio item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundFragment {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genres: Vec<Uuid>,
    #[serde(default)]
    pub labels: Vec<Uuid>,
    #[serde(default)]
    pub item_type: PlaylistItemType,
    #[serde(default)]
    pub source: SourceType,
    /// Length in seconds, when known
    #[serde(default)]
    pub length_secs: Option<u32>,
    /// Key under which the audio store keeps the bytes
    #[serde(default)]
    pub storage_key: Option<String>,
}

impl SoundFragment {
    pub fn new(id: Uuid, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
            album: None,
            genres: Vec::new(),
            labels: Vec::new(),
            item_type: PlaylistItemType::Song,
            source: SourceType::Users,
            length_secs: None,
            storage_key: None,
        }
    }

    pub fn with_length(mut self, secs: u32) -> Self {
        self.length_secs = Some(secs);
        self
    }

    /// Length used for scheduling (180s when unknown)
    pub fn duration_secs(&self) -> u32 {
        self.length_secs.unwrap_or(DEFAULT_SONG_DURATION_SECS)
    }

    /// "artist - title", or just the title for anonymous items
    pub fn display_name(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }
}

/// Repository filter derived from brand defaults or a scene's query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongFilter {
    #[serde(default)]
    pub genres: Vec<Uuid>,
    #[serde(default)]
    pub labels: Vec<Uuid>,
    #[serde(default)]
    pub item_types: Vec<PlaylistItemType>,
    #[serde(default)]
    pub sources: Vec<SourceType>,
    #[serde(default)]
    pub search_term: Option<String>,
}

impl SongFilter {
    pub fn for_type(item_type: PlaylistItemType) -> Self {
        Self {
            item_types: vec![item_type],
            ..Self::default()
        }
    }

    /// In-memory evaluation; empty criteria match everything.
    pub fn matches(&self, song: &SoundFragment) -> bool {
        if !self.item_types.is_empty() && !self.item_types.contains(&song.item_type) {
            return false;
        }
        if !self.sources.is_empty() && !self.sources.contains(&song.source) {
            return false;
        }
        if !self.genres.is_empty() && !song.genres.iter().any(|g| self.genres.contains(g)) {
            return false;
        }
        if !self.labels.is_empty() && !song.labels.iter().any(|l| self.labels.contains(l)) {
            return false;
        }
        match self.search_term.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                song.title.to_lowercase().contains(&term)
                    || song.artist.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}

/// Content request attached to a scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistRequest {
    #[serde(default)]
    pub sourcing: Option<WayOfSourcing>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub genres: Vec<Uuid>,
    #[serde(default)]
    pub labels: Vec<Uuid>,
    #[serde(default)]
    pub item_types: Vec<PlaylistItemType>,
    #[serde(default)]
    pub sources: Vec<SourceType>,
    #[serde(default)]
    pub search_term: Option<String>,
    #[serde(default)]
    pub sound_fragments: Vec<Uuid>,
}

impl PlaylistRequest {
    pub fn to_filter(&self) -> SongFilter {
        SongFilter {
            genres: self.genres.clone(),
            labels: self.labels.clone(),
            item_types: self.item_types.clone(),
            sources: self.sources.clone(),
            search_term: self.search_term.clone(),
        }
    }
}

/// A time box of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub seq_num: i32,
    /// Daily start time, required by looped schedules
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub duration_secs: u32,
    #[serde(default = "Scene::default_talkativity")]
    pub talkativity: f64,
    #[serde(default)]
    pub one_time_run: bool,
    #[serde(default)]
    pub playlist_request: Option<PlaylistRequest>,
}

impl Scene {
    const fn default_talkativity() -> f64 {
        DEFAULT_TALKATIVITY
    }

    pub fn sourcing(&self) -> Option<WayOfSourcing> {
        self.playlist_request.as_ref().and_then(|r| r.sourcing)
    }
}

/// An ordered set of scenes a station plays through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}
