//! Stations: persisted definition, live state and stream kind.
//!
//! A [`RadioStation`] is what the pool hands out. It is a cheap handle over
//! three pieces:
//!
//! - a shared [`StationState`] (definition, status, agenda) read by the
//!   stream manager, the playlist and the HTTP layer;
//! - its [`StreamKind`], fixed at construction;
//! - its [`StreamManager`].

use crate::stream::StreamManager;
use chrono::{DateTime, NaiveDateTime, Utc};
use pmoagenda::{Agenda, LiveScene};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;
use uuid::Uuid;

/// Status changes kept per station
pub const STATUS_HISTORY_LEN: usize = 50;

/// Popularity rate of one-time streams
pub const ONE_TIME_POPULARITY: f64 = 5.0;

const DEFAULT_POPULARITY: f64 = 1.0;

/// Station lifecycle.
///
/// `OffLine → WarmingUp | WaitingForCurator → OnLine → OffLine`.
/// `QueueSaturated` is only ever a projection of an online station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StationStatus {
    OffLine,
    WarmingUp,
    WaitingForCurator,
    OnLine,
    QueueSaturated,
    SystemError,
}

impl StationStatus {
    /// Statuses the pool reuses instead of restarting.
    pub fn is_active(self) -> bool {
        matches!(self, Self::OnLine | Self::WarmingUp)
    }
}

/// Who supplies a station's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManagedBy {
    #[default]
    Itself,
    Mix,
    /// External curator
    Dj,
}

impl ManagedBy {
    pub fn initial_status(self) -> StationStatus {
        match self {
            Self::Itself | Self::Mix => StationStatus::WarmingUp,
            Self::Dj => StationStatus::WaitingForCurator,
        }
    }
}

/// Announcer settings consumed by the (external) AI collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiOverride {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneTimeSettings {
    #[serde(default)]
    pub ends_at: Option<NaiveDateTime>,
}

/// Persisted station definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationDefinition {
    pub id: Uuid,
    pub slug: String,
    #[serde(default)]
    pub localized_name: BTreeMap<String, String>,
    #[serde(default)]
    pub managed_by: ManagedBy,
    #[serde(default = "StationDefinition::default_time_zone")]
    pub time_zone: String,
    #[serde(default = "StationDefinition::default_bitrate")]
    pub bitrate_kbps: u32,
    /// Scripts in priority order; the first one drives the agenda
    #[serde(default)]
    pub scripts: Vec<Uuid>,
    #[serde(default)]
    pub ai_override: Option<AiOverride>,
    #[serde(default)]
    pub popularity_rate: Option<f64>,
    /// Present for one-time streams
    #[serde(default)]
    pub one_time: Option<OneTimeSettings>,
}

impl StationDefinition {
    fn default_time_zone() -> String {
        "UTC".to_string()
    }

    const fn default_bitrate() -> u32 {
        128
    }

    pub fn new(id: Uuid, slug: impl Into<String>) -> Self {
        Self {
            id,
            slug: slug.into(),
            localized_name: BTreeMap::new(),
            managed_by: ManagedBy::default(),
            time_zone: Self::default_time_zone(),
            bitrate_kbps: Self::default_bitrate(),
            scripts: Vec::new(),
            ai_override: None,
            popularity_rate: None,
            one_time: None,
        }
    }

    /// English name, then any name, then the slug.
    pub fn display_name(&self) -> &str {
        self.localized_name
            .get("en")
            .or_else(|| self.localized_name.values().next())
            .map(String::as_str)
            .unwrap_or(&self.slug)
    }

    pub fn primary_script(&self) -> Option<Uuid> {
        self.scripts.first().copied()
    }
}

/// Radio or one-time stream, decided once from the definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamKind {
    Radio { popularity: f64 },
    OneTime { ends_at: Option<NaiveDateTime> },
}

impl StreamKind {
    pub fn from_definition(definition: &StationDefinition) -> Self {
        match &definition.one_time {
            Some(settings) => Self::OneTime {
                ends_at: settings.ends_at,
            },
            None => Self::Radio {
                popularity: definition.popularity_rate.unwrap_or(DEFAULT_POPULARITY),
            },
        }
    }

    /// Scene on air at `now`.
    ///
    /// Radio streams follow the daily windows of their looped agenda and
    /// fall back to absolute slots; one-time streams only use absolute slots.
    pub fn find_active_scene<'a>(
        &self,
        agenda: &'a Agenda,
        now: NaiveDateTime,
    ) -> Option<&'a LiveScene> {
        match self {
            Self::Radio { .. } => agenda
                .scene_active_at(now.time())
                .or_else(|| agenda.scene_scheduled_at(now)),
            Self::OneTime { .. } => agenda.scene_scheduled_at(now),
        }
    }

    pub fn popularity_rate(&self) -> f64 {
        match self {
            Self::Radio { popularity } => *popularity,
            Self::OneTime { .. } => ONE_TIME_POPULARITY,
        }
    }

    /// Radio streams never complete; a one-time stream completes at its
    /// end date or once its agenda has run out.
    pub fn is_completed(&self, agenda: Option<&Agenda>, now: NaiveDateTime) -> bool {
        match self {
            Self::Radio { .. } => false,
            Self::OneTime { ends_at } => {
                if ends_at.is_some_and(|end| now >= end) {
                    return true;
                }
                agenda.is_some_and(|a| a.total_scenes() > 0 && now >= a.estimated_end_time())
            }
        }
    }
}

/// One recorded status transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub at: DateTime<Utc>,
    pub from: StationStatus,
    pub to: StationStatus,
}

/// State shared between a station's manager, playlist and readers.
#[derive(Debug)]
pub struct StationState {
    definition: RwLock<Arc<StationDefinition>>,
    status: RwLock<StationStatus>,
    history: Mutex<VecDeque<StatusChange>>,
    agenda: RwLock<Option<Arc<Agenda>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StationState {
    pub fn new(definition: StationDefinition) -> Self {
        Self {
            definition: RwLock::new(Arc::new(definition)),
            status: RwLock::new(StationStatus::OffLine),
            history: Mutex::new(VecDeque::with_capacity(STATUS_HISTORY_LEN)),
            agenda: RwLock::new(None),
        }
    }

    pub fn definition(&self) -> Arc<StationDefinition> {
        read(&self.definition).clone()
    }

    pub fn replace_definition(&self, definition: StationDefinition) {
        *write(&self.definition) = Arc::new(definition);
    }

    pub fn slug(&self) -> String {
        read(&self.definition).slug.clone()
    }

    pub fn brand_id(&self) -> Uuid {
        read(&self.definition).id
    }

    pub fn managed_by(&self) -> ManagedBy {
        read(&self.definition).managed_by
    }

    pub fn status(&self) -> StationStatus {
        *read(&self.status)
    }

    /// Sets the status, recording the transition when it changes.
    pub fn set_status(&self, status: StationStatus) {
        let previous = {
            let mut current = write(&self.status);
            std::mem::replace(&mut *current, status)
        };
        if previous == status {
            return;
        }

        let mut history = lock(&self.history);
        if history.len() == STATUS_HISTORY_LEN {
            history.pop_front();
        }
        history.push_back(StatusChange {
            at: Utc::now(),
            from: previous,
            to: status,
        });
        drop(history);

        info!(station = %self.slug(), from = ?previous, to = ?status, "Station status changed");
    }

    pub fn status_history(&self) -> Vec<StatusChange> {
        lock(&self.history).iter().cloned().collect()
    }

    pub fn agenda(&self) -> Option<Arc<Agenda>> {
        read(&self.agenda).clone()
    }

    /// Replaces the agenda in one swap; readers keep their snapshot.
    pub fn install_agenda(&self, agenda: Agenda) -> Arc<Agenda> {
        let agenda = Arc::new(agenda);
        *write(&self.agenda) = Some(agenda.clone());
        agenda
    }

    /// Copy-on-write edit of the current agenda. Returns `false` when the
    /// station has none.
    pub fn update_agenda<F>(&self, edit: F) -> bool
    where
        F: FnOnce(&mut Agenda),
    {
        let mut slot = write(&self.agenda);
        match slot.as_ref() {
            Some(current) => {
                let mut next = Agenda::clone(current);
                edit(&mut next);
                *slot = Some(Arc::new(next));
                true
            }
            None => false,
        }
    }
}

/// A station owned by the pool.
#[derive(Clone)]
pub struct RadioStation {
    state: Arc<StationState>,
    kind: StreamKind,
    manager: StreamManager,
}

impl RadioStation {
    pub(crate) fn new(state: Arc<StationState>, kind: StreamKind, manager: StreamManager) -> Self {
        Self {
            state,
            kind,
            manager,
        }
    }

    pub fn slug(&self) -> String {
        self.state.slug()
    }

    pub fn brand_id(&self) -> Uuid {
        self.state.brand_id()
    }

    pub fn definition(&self) -> Arc<StationDefinition> {
        self.state.definition()
    }

    pub fn status(&self) -> StationStatus {
        self.state.status()
    }

    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn state(&self) -> &Arc<StationState> {
        &self.state
    }

    pub fn manager(&self) -> &StreamManager {
        &self.manager
    }

    pub fn agenda(&self) -> Option<Arc<Agenda>> {
        self.state.agenda()
    }
}

impl std::fmt::Debug for RadioStation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioStation")
            .field("slug", &self.slug())
            .field("status", &self.status())
            .field("kind", &self.kind)
            .field("manager", &self.manager.id())
            .finish()
    }
}
