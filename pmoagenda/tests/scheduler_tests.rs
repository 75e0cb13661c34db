//! Integration tests for agenda building

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use pmoagenda::{
    AgendaError, AgendaScheduler, BuildMode, PlaylistItemType, PlaylistRequest, Scene, Script,
    ScriptRepository, SongSupplier, SoundFragment, StreamScheduleView, WayOfSourcing,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// Supplier returning the same ordered pool every time, so selection is deterministic.
struct FixedSupplier {
    pool: Vec<SoundFragment>,
    failing_query: bool,
    requested: AtomicUsize,
}

impl FixedSupplier {
    fn new(lengths: &[u32]) -> Self {
        let pool = lengths
            .iter()
            .enumerate()
            .map(|(i, len)| {
                SoundFragment::new(Uuid::new_v4(), format!("Take {i}"), "Dave Brubeck").with_length(*len)
            })
            .collect();
        Self {
            pool,
            failing_query: false,
            requested: AtomicUsize::new(0),
        }
    }

    fn take(&self, quantity: usize) -> Vec<SoundFragment> {
        self.requested.fetch_add(quantity, Ordering::SeqCst);
        self.pool.iter().take(quantity).cloned().collect()
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
        if self.failing_query {
            anyhow::bail!("catalog unavailable");
        }
        Ok(self.take(quantity))
    }

    async fn songs_from_static_list(
        &self,
        _ids: &[Uuid],
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>> {
        Ok(self.take(quantity))
    }
}

/// One call received by [`RecordingSupplier`].
#[derive(Debug, Clone, PartialEq)]
enum SupplierCall {
    Brand {
        brand_id: Uuid,
        item_type: PlaylistItemType,
        quantity: usize,
    },
    Query {
        brand_id: Uuid,
        quantity: usize,
    },
    StaticList {
        ids: Vec<Uuid>,
        quantity: usize,
    },
}

impl SupplierCall {
    fn quantity(&self) -> usize {
        match self {
            SupplierCall::Brand { quantity, .. }
            | SupplierCall::Query { quantity, .. }
            | SupplierCall::StaticList { quantity, .. } => *quantity,
        }
    }
}

/// Supplier that only records how it was asked for songs.
#[derive(Default)]
struct RecordingSupplier {
    calls: Mutex<Vec<SupplierCall>>,
}

impl RecordingSupplier {
    fn record(&self, call: SupplierCall) -> anyhow::Result<Vec<SoundFragment>> {
        self.calls.lock().unwrap().push(call);
        Ok(Vec::new())
    }

    /// Calls ordered by requested quantity, pools being fetched concurrently.
    fn calls(&self) -> Vec<SupplierCall> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort_by_key(SupplierCall::quantity);
        calls
    }
}

#[async_trait]
impl SongSupplier for RecordingSupplier {
    async fn songs_for_brand(
        &self,
        brand_id: Uuid,
        item_type: PlaylistItemType,
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>> {
        self.record(SupplierCall::Brand {
            brand_id,
            item_type,
            quantity,
        })
    }

    async fn songs_by_query(
        &self,
        brand_id: Uuid,
        _request: &PlaylistRequest,
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>> {
        self.record(SupplierCall::Query { brand_id, quantity })
    }

    async fn songs_from_static_list(
        &self,
        ids: &[Uuid],
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>> {
        self.record(SupplierCall::StaticList {
            ids: ids.to_vec(),
            quantity,
        })
    }
}

fn with_request(mut scene: Scene, request: PlaylistRequest) -> Scene {
    scene.playlist_request = Some(request);
    scene
}

#[derive(Default)]
struct MemoryScripts(HashMap<Uuid, Script>);

#[async_trait]
impl ScriptRepository for MemoryScripts {
    async fn find_script(&self, script_id: Uuid) -> anyhow::Result<Option<Script>> {
        Ok(self.0.get(&script_id).cloned())
    }
}

fn scene(title: &str, seq_num: i32, start: Option<(u32, u32)>, duration_secs: u32) -> Scene {
    Scene {
        id: Uuid::new_v4(),
        title: title.to_string(),
        seq_num,
        start_time: start.and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0)),
        duration_secs,
        talkativity: 0.0,
        one_time_run: false,
        playlist_request: None,
    }
}

fn day_at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 16)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn scheduler(supplier: FixedSupplier, scripts: MemoryScripts) -> AgendaScheduler {
    AgendaScheduler::new(Arc::new(supplier), Arc::new(scripts))
}

#[tokio::test]
async fn test_jazz_fm_forward_build() {
    let script = Script {
        id: Uuid::new_v4(),
        title: "jazz-fm".into(),
        scenes: vec![scene("Cool jazz", 1, None, 300)],
    };
    let scheduler = scheduler(FixedSupplier::new(&[120, 120, 120]), MemoryScripts::default());
    let now = day_at(9, 0);

    let agenda = scheduler
        .build_forward(Uuid::new_v4(), &script, now)
        .await
        .unwrap();

    assert_eq!(agenda.total_scenes(), 1);
    // (120 + 30) * 2 = 300 fills the slot exactly
    assert_eq!(agenda.total_songs(), 2);
    let songs = &agenda.scenes[0].songs;
    assert_eq!(songs[0].scheduled_start, now);
    assert_eq!(songs[1].scheduled_start, now + Duration::seconds(120));
    assert_eq!(agenda.estimated_end_time(), now + Duration::seconds(300));
}

#[tokio::test]
async fn test_forward_orders_scenes_by_sequence() {
    let script = Script {
        id: Uuid::new_v4(),
        title: "Morning show".into(),
        scenes: vec![
            scene("Third", 3, None, 600),
            scene("First", 1, None, 300),
            scene("Second", 2, None, 900),
        ],
    };
    let scheduler = scheduler(FixedSupplier::new(&[60; 10]), MemoryScripts::default());
    let now = day_at(6, 0);

    let agenda = scheduler
        .build_forward(Uuid::new_v4(), &script, now)
        .await
        .unwrap();

    let titles: Vec<_> = agenda.scenes.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["First", "Second", "Third"]);
    assert_eq!(agenda.scenes[1].scheduled_start, now + Duration::seconds(300));
    assert_eq!(agenda.scenes[2].scheduled_start, now + Duration::seconds(1200));
}

#[tokio::test]
async fn test_looped_build_wraps_midnight() {
    let script = Script {
        id: Uuid::new_v4(),
        title: "All day".into(),
        scenes: vec![
            scene("Afternoon", 2, Some((14, 0)), 0),
            scene("Morning", 1, Some((8, 0)), 0),
            scene("Evening", 3, Some((20, 0)), 0),
        ],
    };
    let scheduler = scheduler(FixedSupplier::new(&[200; 200]), MemoryScripts::default());
    let now = day_at(23, 0);

    let agenda = scheduler
        .build_looped(Uuid::new_v4(), &script, now)
        .await
        .unwrap();

    let titles: Vec<_> = agenda.scenes.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Evening", "Morning", "Afternoon"]);

    // 20:00 -> 08:00 is 12h, 3h already elapsed
    assert_eq!(agenda.scenes[0].duration_secs, 32_400);
    assert_eq!(agenda.scenes[1].scheduled_start, now + Duration::hours(9));
    assert_eq!(agenda.scenes[1].duration_secs, 6 * 3600);
    assert_eq!(agenda.scenes[2].duration_secs, 6 * 3600);
    assert_eq!(
        agenda.scenes[0].original_end,
        NaiveTime::from_hms_opt(8, 0, 0)
    );
}

#[tokio::test]
async fn test_looped_build_without_timed_scenes_is_empty() {
    let script = Script {
        id: Uuid::new_v4(),
        title: "Untimed".into(),
        scenes: vec![scene("Anything", 1, None, 600)],
    };
    let scheduler = scheduler(FixedSupplier::new(&[120]), MemoryScripts::default());

    let agenda = scheduler
        .build_looped(Uuid::new_v4(), &script, day_at(12, 0))
        .await
        .unwrap();
    assert_eq!(agenda.total_scenes(), 0);
}

#[tokio::test]
async fn test_one_failing_pool_fails_the_build() {
    let mut failing = scene("Broken query", 2, None, 600);
    failing.playlist_request = Some(PlaylistRequest {
        sourcing: Some(WayOfSourcing::Query),
        ..PlaylistRequest::default()
    });
    let failing_id = failing.id;
    let script = Script {
        id: Uuid::new_v4(),
        title: "Mixed".into(),
        scenes: vec![scene("Fine", 1, None, 600), failing],
    };
    let mut supplier = FixedSupplier::new(&[120; 10]);
    supplier.failing_query = true;
    let scheduler = scheduler(supplier, MemoryScripts::default());

    let err = scheduler
        .build_forward(Uuid::new_v4(), &script, day_at(10, 0))
        .await
        .unwrap_err();
    match err {
        AgendaError::SongPool { scene_id, .. } => assert_eq!(scene_id, failing_id),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unknown_script_is_reported() {
    let scheduler = scheduler(FixedSupplier::new(&[]), MemoryScripts::default());
    let missing = Uuid::new_v4();

    let err = scheduler
        .build_for_script(Uuid::new_v4(), missing, BuildMode::Forward)
        .await
        .unwrap_err();
    assert!(matches!(err, AgendaError::ScriptNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_build_for_script_and_view() {
    let script = Script {
        id: Uuid::new_v4(),
        title: "Late night".into(),
        scenes: vec![scene("Ballads", 1, None, 300), scene("Silence", 2, None, 0)],
    };
    let mut scripts = MemoryScripts::default();
    scripts.0.insert(script.id, script.clone());
    let scheduler = scheduler(FixedSupplier::new(&[]), scripts);

    let agenda = scheduler
        .build_for_script(Uuid::new_v4(), script.id, BuildMode::Forward)
        .await
        .unwrap();
    let view = StreamScheduleView::from(&agenda);

    assert_eq!(view.total_scenes, 2);
    assert_eq!(view.total_songs, 0);
    assert!(view.scenes.iter().all(|s| s.warning.is_some()));
}

#[tokio::test]
async fn test_forward_pools_follow_sourcing_mode() {
    let picks = vec![Uuid::new_v4(), Uuid::new_v4()];
    let script = Script {
        id: Uuid::new_v4(),
        title: "Sourcing".into(),
        scenes: vec![
            with_request(
                scene("Listener picks", 1, None, 600),
                PlaylistRequest {
                    sourcing: Some(WayOfSourcing::StaticList),
                    sound_fragments: picks.clone(),
                    ..PlaylistRequest::default()
                },
            ),
            with_request(
                scene("Rotation", 2, None, 240),
                PlaylistRequest {
                    sourcing: Some(WayOfSourcing::Generated),
                    ..PlaylistRequest::default()
                },
            ),
            scene("Default", 3, None, 300),
            with_request(
                scene("Bebop only", 4, None, 120),
                PlaylistRequest {
                    sourcing: Some(WayOfSourcing::Query),
                    search_term: Some("bebop".into()),
                    ..PlaylistRequest::default()
                },
            ),
        ],
    };
    let supplier = Arc::new(RecordingSupplier::default());
    let scheduler = AgendaScheduler::new(supplier.clone(), Arc::new(MemoryScripts::default()));
    let brand_id = Uuid::new_v4();

    scheduler
        .build_forward(brand_id, &script, day_at(7, 0))
        .await
        .unwrap();

    // ceil(d / 120 * 1.5) + 2 for 120, 240, 300 and 600 seconds
    assert_eq!(
        supplier.calls(),
        vec![
            SupplierCall::Query {
                brand_id,
                quantity: 4
            },
            SupplierCall::Brand {
                brand_id,
                item_type: PlaylistItemType::Song,
                quantity: 5
            },
            SupplierCall::Brand {
                brand_id,
                item_type: PlaylistItemType::Song,
                quantity: 6
            },
            SupplierCall::StaticList {
                ids: picks,
                quantity: 10
            },
        ]
    );
}

#[tokio::test]
async fn test_looped_pools_use_scene_window() {
    let picks = vec![Uuid::new_v4()];
    let script = Script {
        id: Uuid::new_v4(),
        title: "Daily".into(),
        scenes: vec![
            with_request(
                scene("Breakfast picks", 1, Some((8, 0)), 0),
                PlaylistRequest {
                    sourcing: Some(WayOfSourcing::StaticList),
                    sound_fragments: picks.clone(),
                    ..PlaylistRequest::default()
                },
            ),
            scene("Rest of day", 2, Some((9, 0)), 0),
        ],
    };
    let supplier = Arc::new(RecordingSupplier::default());
    let scheduler = AgendaScheduler::new(supplier.clone(), Arc::new(MemoryScripts::default()));
    let brand_id = Uuid::new_v4();

    scheduler
        .build_looped(brand_id, &script, day_at(8, 0))
        .await
        .unwrap();

    // d / 120 + 2 for one hour and for the 23 hours up to 08:00
    assert_eq!(
        supplier.calls(),
        vec![
            SupplierCall::StaticList {
                ids: picks,
                quantity: 32
            },
            SupplierCall::Brand {
                brand_id,
                item_type: PlaylistItemType::Song,
                quantity: 692
            },
        ]
    );
}
