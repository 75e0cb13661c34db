mod common;

use common::*;
use pmobroadcast::stream::hls::empty_playlist;
use pmobroadcast::{
    BroadcastConfig, FragmentSource, ManagedBy, PlayCountSink, StationDefinition, StationState,
    StationStatus, StreamManager,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    manager: StreamManager,
    state: Arc<StationState>,
    source: Arc<ScriptedSource>,
    play_counts: Arc<RecordingPlayCounts>,
}

fn harness_with(
    config: BroadcastConfig,
    managed_by: ManagedBy,
    source: Arc<ScriptedSource>,
) -> Harness {
    let mut definition = StationDefinition::new(Uuid::new_v4(), "jazz-fm");
    definition.managed_by = managed_by;
    let state = Arc::new(StationState::new(definition));
    let play_counts = Arc::new(RecordingPlayCounts::default());

    let manager = StreamManager::new(
        state.clone(),
        &config,
        source.clone() as Arc<dyn FragmentSource>,
        play_counts.clone() as Arc<dyn PlayCountSink>,
        idle_tickers(),
    );
    manager.initialize();

    Harness {
        manager,
        state,
        source,
        play_counts,
    }
}

fn harness(max_visible: usize, segments_per_fragment: usize) -> Harness {
    harness_with(
        test_config(max_visible),
        ManagedBy::Itself,
        ScriptedSource::new(segments_per_fragment),
    )
}

async fn feed(manager: &StreamManager, cycles: usize) {
    for _ in 0..cycles {
        assert!(manager.feed_now().await);
    }
}

#[tokio::test]
async fn test_starts_warming_up_with_empty_playlist() {
    let h = harness(20, 3);
    assert_eq!(h.state.status(), StationStatus::WarmingUp);
    assert!(h.manager.is_running());
    assert_eq!(h.manager.generate_playlist(), empty_playlist(10));

    // initialize twice keeps the same worker
    h.manager.initialize();
    assert_eq!(h.state.status_history().len(), 1);
}

#[tokio::test]
async fn test_first_drip_brings_station_online() {
    let h = harness(20, 3);

    // first cycle only refills
    feed(&h.manager, 1).await;
    assert_eq!(h.manager.live_len(), 0);
    assert_eq!(h.manager.pending_sequences(), vec![0, 1, 2]);
    assert_eq!(h.state.status(), StationStatus::WarmingUp);

    feed(&h.manager, 1).await;
    assert_eq!(h.manager.live_sequences(), vec![0]);
    assert_eq!(h.state.status(), StationStatus::OnLine);
    // pending fell below the threshold and was refilled
    assert_eq!(h.manager.pending_sequences(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_curated_station_waits_for_curator_until_first_drip() {
    let h = harness_with(test_config(20), ManagedBy::Dj, ScriptedSource::new(2));
    assert_eq!(h.state.status(), StationStatus::WaitingForCurator);
    feed(&h.manager, 2).await;
    assert_eq!(h.state.status(), StationStatus::OnLine);
}

#[tokio::test]
async fn test_sequences_are_monotonic_and_never_doubled() {
    let h = harness(4, 3);

    let mut previous_last = None;
    for _ in 0..40 {
        feed(&h.manager, 1).await;
        if h.manager.live_len() > 4 {
            h.manager.slide_now().await;
        }

        let live = h.manager.live_sequences();
        let pending = h.manager.pending_sequences();
        let live_set: HashSet<u64> = live.iter().copied().collect();
        assert!(pending.iter().all(|seq| !live_set.contains(seq)));

        let all: Vec<u64> = live.iter().chain(pending.iter()).copied().collect();
        assert!(all.windows(2).all(|pair| pair[0] < pair[1]));

        if let Some(&last) = all.last() {
            if let Some(previous) = previous_last {
                assert!(last >= previous);
            }
            previous_last = Some(last);
        }
    }
}

#[tokio::test]
async fn test_live_window_is_bounded() {
    let h = harness(4, 12);

    for _ in 0..20 {
        feed(&h.manager, 1).await;
        assert!(h.manager.live_len() <= 8);
    }
    // drip stops at twice the visible window, nothing is dropped
    assert_eq!(h.manager.live_len(), 8);
    assert!(h.manager.pending_len() > 0);

    assert_eq!(h.manager.slide_now().await, Some(4));
    assert_eq!(h.manager.live_sequences(), vec![4, 5, 6, 7]);
    assert_eq!(h.manager.slide_now().await, Some(0));
}

#[tokio::test]
async fn test_playlist_lists_visible_window() {
    let h = harness(4, 12);
    feed(&h.manager, 8).await;

    let playlist = h.manager.generate_playlist();
    assert!(playlist.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-ALLOW-CACHE:NO\n#EXT-X-PLAYLIST-TYPE:EVENT\n"));
    assert!(playlist.contains("#EXT-X-TARGETDURATION:10\n"));
    assert!(playlist.contains("#EXT-X-PROGRAM-DATE-TIME:"));
    assert_eq!(media_sequence(&playlist), Some(0));
    assert_eq!(playlist_sequences(&playlist), vec![0, 1, 2, 3]);
    assert!(playlist.contains("#EXTINF:10,Trio - Track 0\nsegments/jazz-fm_0.ts\n"));

    h.manager.slide_now().await;
    let playlist = h.manager.generate_playlist();
    assert_eq!(media_sequence(&playlist), Some(3));
    assert_eq!(playlist_sequences(&playlist), vec![3, 4, 5, 6]);
}

#[tokio::test]
async fn test_segment_lookup_and_request_stats() {
    let h = harness(20, 3);
    feed(&h.manager, 3).await;

    let segment = h.manager.get_segment("segments/jazz-fm_1.ts").unwrap();
    assert_eq!(segment.sequence, 1);
    assert_eq!(segment.bitrate_kbps, 128);
    assert!(h.manager.get_segment("jazz-fm_999.ts").is_none());
    assert!(h.manager.get_segment("playlist.m3u8").is_none());

    let stats = h.manager.stats();
    assert_eq!(stats.manager_id, h.manager.id());
    assert_eq!(stats.recent_requests, 2);
    assert_eq!(stats.listeners, 1);
    assert_eq!(stats.latest_requested_segment, Some(999));
    assert!(stats.heartbeat);
    assert_eq!(stats.first_live_sequence, Some(0));
    assert_eq!(stats.last_live_sequence, Some(1));
    assert_eq!(stats.now_playing.unwrap().title, "Track 0");
}

#[tokio::test]
async fn test_play_count_when_fragment_changes() {
    let h = harness(20, 1);

    // fragments of one segment: every drip starts a new song
    feed(&h.manager, 2).await;
    assert!(h.play_counts.played_songs().is_empty());

    feed(&h.manager, 1).await;
    let played = h.play_counts.wait_for(1).await;
    let served = h.source.served();
    assert_eq!(played, vec![served[0].id]);
    assert_eq!(h.manager.now_playing().unwrap().song_id, served[1].id);
}

#[tokio::test]
async fn test_same_song_back_to_back_counts_every_play() {
    let encore = song("So What", "Miles Davis", 10);
    let h = harness_with(
        test_config(20),
        ManagedBy::Itself,
        ScriptedSource::repeating(encore.clone(), 1),
    );

    // live gets sequences 0..=3, each the start of a new play
    feed(&h.manager, 5).await;
    assert_eq!(h.manager.live_sequences(), vec![0, 1, 2, 3]);

    let played = h.play_counts.wait_for(3).await;
    assert_eq!(played, vec![encore.id; 3]);
    let playing = h.manager.now_playing().unwrap();
    assert_eq!(playing.song_id, encore.id);
    assert_eq!(playing.first_sequence, 3);
}

#[tokio::test]
async fn test_failed_fetch_is_retried_next_cycle() {
    let h = harness_with(test_config(20), ManagedBy::Itself, ScriptedSource::failing(3, 2));

    feed(&h.manager, 2).await;
    assert_eq!(h.manager.pending_len(), 0);
    assert_eq!(h.state.status(), StationStatus::WarmingUp);

    feed(&h.manager, 1).await;
    assert_eq!(h.manager.pending_sequences(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_shutdown_clears_state_and_flushes_play_count() {
    let h = harness(20, 3);
    feed(&h.manager, 3).await;
    let playing = h.manager.now_playing().unwrap();

    h.manager.shutdown().await;
    assert_eq!(h.state.status(), StationStatus::OffLine);
    assert_eq!(h.manager.live_len(), 0);
    assert_eq!(h.manager.pending_len(), 0);
    assert_eq!(h.manager.stats().next_sequence, 0);
    assert!(h.manager.now_playing().is_none());
    assert!(!h.manager.is_running());
    assert!(!h.manager.feed_now().await);
    assert_eq!(h.manager.generate_playlist(), empty_playlist(10));

    assert_eq!(h.play_counts.wait_for(1).await, vec![playing.song_id]);
}

#[tokio::test]
async fn test_segment_timeline_around_window() {
    let h = harness(4, 12);
    feed(&h.manager, 8).await;
    h.manager.slide_now().await;

    let timeline = h.manager.segment_timeline(2, 3);
    assert_eq!(timeline.past, vec![1, 2]);
    assert_eq!(timeline.visible, vec![3, 4, 5, 6]);
    assert_eq!(timeline.upcoming, vec![7, 8, 9]);
}

#[tokio::test]
async fn test_queue_saturation_is_projected_on_online_station() {
    let mut config = test_config(20);
    config.hls.queue_saturation_segments = 10;
    let h = harness_with(config, ManagedBy::Itself, ScriptedSource::new(30));

    feed(&h.manager, 1).await;
    assert_eq!(h.manager.live_status().status, StationStatus::WarmingUp);

    feed(&h.manager, 1).await;
    assert_eq!(h.state.status(), StationStatus::OnLine);
    assert_eq!(h.manager.live_status().status, StationStatus::QueueSaturated);
}
