//! Agenda construction.
//!
//! Two modes share the same sourcing rules but differ in how scenes are laid
//! out and how songs are fitted:
//!
//! - **Forward**: scenes in sequence order, back to back from `now`. Song
//!   selection tolerates one overflowing song while the remaining gap is
//!   larger than a minute.
//! - **Looped**: scenes anchored to their daily start times, walked once
//!   around the day from the scene currently on air. The music budget is
//!   reduced by the scene's talkativity and selection stops at the first
//!   overflow.
//!
//! Every scene's pool is fetched concurrently; one failure fails the build.

use crate::agenda::{Agenda, LiveScene};
use crate::error::{AgendaError, Result};
use crate::model::{PlaylistItemType, Scene, Script, SoundFragment, WayOfSourcing};
use crate::supplier::SongSupplier;
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDateTime, NaiveTime, Timelike};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Average DJ intro charged on top of every song.
pub const AVG_DJ_INTRO_SECS: i64 = 30;
/// Forward builds still admit an overflowing song while the gap exceeds this.
pub const GAP_TOLERANCE_SECS: i64 = 60;
/// Share of a scene a fully talkative DJ takes away from music.
pub const TALK_DISCOUNT: f64 = 0.3;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Read-only access to scripts and their scenes.
#[async_trait]
pub trait ScriptRepository: Send + Sync {
    async fn find_script(&self, script_id: Uuid) -> anyhow::Result<Option<Script>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Forward,
    Looped,
}

/// Builds agendas from scripts (the agenda service).
#[derive(Clone)]
pub struct AgendaScheduler {
    supplier: Arc<dyn SongSupplier>,
    scripts: Arc<dyn ScriptRepository>,
}

struct PlannedScene<'a> {
    scene: &'a Scene,
    start: NaiveDateTime,
    duration_secs: u32,
    pool_size: usize,
    window: Option<(NaiveTime, NaiveTime)>,
}

impl AgendaScheduler {
    pub fn new(supplier: Arc<dyn SongSupplier>, scripts: Arc<dyn ScriptRepository>) -> Self {
        Self { supplier, scripts }
    }

    /// Resolves `script_id` and builds it in `mode`, anchored on local time.
    pub async fn build_for_script(
        &self,
        brand_id: Uuid,
        script_id: Uuid,
        mode: BuildMode,
    ) -> Result<Agenda> {
        let script = self
            .scripts
            .find_script(script_id)
            .await
            .map_err(AgendaError::Repository)?
            .ok_or(AgendaError::ScriptNotFound(script_id))?;

        let now = Local::now().naive_local();
        let agenda = match mode {
            BuildMode::Forward => self.build_forward(brand_id, &script, now).await?,
            BuildMode::Looped => self.build_looped(brand_id, &script, now).await?,
        };
        info!(
            script = %script.title,
            ?mode,
            scenes = agenda.total_scenes(),
            songs = agenda.total_songs(),
            ends_at = %agenda.estimated_end_time(),
            "Built agenda"
        );
        Ok(agenda)
    }

    /// One-shot schedule: scenes ordered by `(seq_num, id)`, back to back from `now`.
    pub async fn build_forward(
        &self,
        brand_id: Uuid,
        script: &Script,
        now: NaiveDateTime,
    ) -> Result<Agenda> {
        let mut ordered: Vec<&Scene> = script.scenes.iter().collect();
        ordered.sort_by(|a, b| a.seq_num.cmp(&b.seq_num).then(a.id.cmp(&b.id)));

        let mut cursor = now;
        let plan: Vec<PlannedScene<'_>> = ordered
            .into_iter()
            .map(|scene| {
                let planned = PlannedScene {
                    scene,
                    start: cursor,
                    duration_secs: scene.duration_secs,
                    pool_size: forward_pool_size(scene.duration_secs),
                    window: None,
                };
                cursor += Duration::seconds(i64::from(scene.duration_secs));
                planned
            })
            .collect();

        self.assemble(brand_id, now, plan, |pool, planned| {
            select_songs_to_fit(pool, planned.duration_secs)
        })
        .await
    }

    /// Daily schedule walked once around from the scene on air at `now`.
    pub async fn build_looped(
        &self,
        brand_id: Uuid,
        script: &Script,
        now: NaiveDateTime,
    ) -> Result<Agenda> {
        let mut timed: Vec<(&Scene, NaiveTime)> = script
            .scenes
            .iter()
            .filter_map(|scene| scene.start_time.map(|start| (scene, start)))
            .collect();
        if timed.is_empty() {
            return Ok(Agenda::new(now));
        }
        timed.sort_by_key(|(_, start)| *start);

        let starts: Vec<NaiveTime> = timed.iter().map(|(_, start)| *start).collect();
        let clock = now.time();
        let active = find_active_scene_index(&starts, clock);
        let count = timed.len();

        let mut cursor = now;
        let mut plan = Vec::with_capacity(count);
        for step in 0..count {
            let index = (active + step) % count;
            let (scene, start) = timed[index];
            let next_start = starts[(index + 1) % count];

            let mut duration = seconds_until_next(start, next_start);
            if step == 0 {
                duration = (duration - elapsed_since(start, clock)).max(0);
            }

            let duration_secs = u32::try_from(duration).unwrap_or(0);
            plan.push(PlannedScene {
                scene,
                start: cursor,
                duration_secs,
                pool_size: looped_pool_size(duration_secs),
                window: Some((start, next_start)),
            });
            cursor += Duration::seconds(duration);
        }

        self.assemble(brand_id, now, plan, |pool, planned| {
            select_songs_with_talkativity(pool, planned.duration_secs, planned.scene.talkativity)
        })
        .await
    }

    async fn assemble<F>(
        &self,
        brand_id: Uuid,
        now: NaiveDateTime,
        plan: Vec<PlannedScene<'_>>,
        select: F,
    ) -> Result<Agenda>
    where
        F: Fn(Vec<SoundFragment>, &PlannedScene<'_>) -> Vec<SoundFragment>,
    {
        let select = &select;
        let scenes = try_join_all(plan.iter().map(|planned| async move {
            let pool = self
                .fetch_pool(brand_id, planned.scene, planned.pool_size)
                .await
                .map_err(|source| AgendaError::SongPool {
                    scene_id: planned.scene.id,
                    source,
                })?;
            let songs = select(pool, planned);

            let mut live = LiveScene::from_scene(planned.scene, planned.start, planned.duration_secs);
            if let Some((start, end)) = planned.window {
                live = live.with_original_window(start, end);
            }
            live.schedule_songs(songs);
            Ok::<_, AgendaError>(live)
        }))
        .await?;

        let mut agenda = Agenda::new(now);
        for scene in scenes {
            agenda.add_scene(scene);
        }
        Ok(agenda)
    }

    async fn fetch_pool(
        &self,
        brand_id: Uuid,
        scene: &Scene,
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>> {
        match scene.playlist_request.as_ref() {
            Some(request) if request.sourcing == Some(WayOfSourcing::Query) => {
                self.supplier
                    .songs_by_query(brand_id, request, quantity)
                    .await
            }
            Some(request) if request.sourcing == Some(WayOfSourcing::StaticList) => {
                self.supplier
                    .songs_from_static_list(&request.sound_fragments, quantity)
                    .await
            }
            _ => {
                self.supplier
                    .songs_for_brand(brand_id, PlaylistItemType::Song, quantity)
                    .await
            }
        }
    }
}

/// Pool size for forward scenes: `ceil(d / 120 * 1.5) + 2`
pub fn forward_pool_size(duration_secs: u32) -> usize {
    (f64::from(duration_secs) / 120.0 * 1.5).ceil() as usize + 2
}

/// Pool size for looped scenes: `d / 120 + 2`
pub fn looped_pool_size(duration_secs: u32) -> usize {
    (duration_secs / 120) as usize + 2
}

/// Music budget left once the DJ's share is removed
pub fn effective_music_time(duration_secs: u32, talkativity: f64) -> i64 {
    (f64::from(duration_secs) * (1.0 - talkativity * TALK_DISCOUNT)) as i64
}

fn song_cost(song: &SoundFragment) -> i64 {
    i64::from(song.duration_secs()) + AVG_DJ_INTRO_SECS
}

/// Greedy fit used by forward builds.
///
/// A lone first song is kept even if it overflows. Later songs that would
/// overflow are still admitted while the remaining gap exceeds
/// [`GAP_TOLERANCE_SECS`].
pub fn select_songs_to_fit(pool: Vec<SoundFragment>, scene_duration_secs: u32) -> Vec<SoundFragment> {
    let budget = i64::from(scene_duration_secs);
    let pool_size = pool.len();
    let mut selected = Vec::new();
    let mut used = 0i64;

    for song in pool {
        let cost = song_cost(&song);
        if used + cost <= budget {
            used += cost;
            selected.push(song);
        } else if selected.is_empty() {
            used += cost;
            selected.push(song);
            break;
        } else if budget - used > GAP_TOLERANCE_SECS {
            used += cost;
            selected.push(song);
        }
    }

    debug!(
        scene_duration = scene_duration_secs,
        pool_size,
        selected = selected.len(),
        used,
        gap = budget - used,
        "Selected songs for scene"
    );
    selected
}

/// Greedy fit used by looped builds: discounted budget, stop at first overflow.
pub fn select_songs_with_talkativity(
    pool: Vec<SoundFragment>,
    scene_duration_secs: u32,
    talkativity: f64,
) -> Vec<SoundFragment> {
    let budget = effective_music_time(scene_duration_secs, talkativity);
    let mut selected = Vec::new();
    let mut used = 0i64;

    for song in pool {
        let cost = song_cost(&song);
        if used + cost <= budget {
            used += cost;
            selected.push(song);
        } else {
            if selected.is_empty() {
                selected.push(song);
            }
            break;
        }
    }

    debug!(
        scene_duration = scene_duration_secs,
        budget,
        talkativity,
        selected = selected.len(),
        used,
        "Selected songs for looped scene"
    );
    selected
}

/// Last scene whose start is not after `now`, searching from the end.
/// When every scene starts later in the day, yesterday's last scene is
/// still on air.
pub fn find_active_scene_index(sorted_starts: &[NaiveTime], now: NaiveTime) -> usize {
    sorted_starts
        .iter()
        .rposition(|start| *start <= now)
        .unwrap_or(sorted_starts.len().saturating_sub(1))
}

/// Seconds from `start` to `next`, wrapping across midnight.
pub fn seconds_until_next(start: NaiveTime, next: NaiveTime) -> i64 {
    let start = i64::from(start.num_seconds_from_midnight());
    let next = i64::from(next.num_seconds_from_midnight());
    if next > start {
        next - start
    } else {
        (SECONDS_PER_DAY - start) + next
    }
}

/// Seconds elapsed since `start` at `now`, wrapping across midnight.
pub fn elapsed_since(start: NaiveTime, now: NaiveTime) -> i64 {
    let start = i64::from(start.num_seconds_from_midnight());
    let now = i64::from(now.num_seconds_from_midnight());
    if now >= start {
        now - start
    } else {
        (SECONDS_PER_DAY - start) + now
    }
}
