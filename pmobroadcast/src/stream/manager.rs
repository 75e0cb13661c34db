use super::hls;
use super::worker::{StreamWorker, WorkerCommand};
use crate::config::{BroadcastConfig, HlsConfig};
use crate::segment::{parse_segment_sequence, HlsSegment};
use crate::source::{FragmentSource, PlayCountSink};
use crate::station::{StationState, StationStatus};
use crate::ticker::TickerHub;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Song currently on air.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlaying {
    pub song_id: Uuid,
    /// Play id, distinct for back-to-back plays of the same song
    pub fragment_id: Uuid,
    pub title: String,
    pub artist: String,
    pub started_at: DateTime<Utc>,
    pub first_sequence: u64,
}

/// Snapshot of a stream manager's buffers and audience.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStats {
    pub manager_id: Uuid,
    pub slug: String,
    pub status: StationStatus,
    pub live_segments: usize,
    pub pending_segments: usize,
    pub first_live_sequence: Option<u64>,
    pub last_live_sequence: Option<u64>,
    pub next_sequence: u64,
    /// Segment requests inside the rolling window
    pub recent_requests: usize,
    pub listeners: usize,
    /// `true` while the live buffer is non-empty
    pub heartbeat: bool,
    pub latest_requested_segment: Option<u64>,
    pub now_playing: Option<NowPlaying>,
}

/// Read-only status projection served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct LiveStatus {
    pub status: StationStatus,
    pub listeners: usize,
    pub recent_requests: usize,
    pub now_playing: Option<NowPlaying>,
}

impl LiveStatus {
    pub fn offline() -> Self {
        Self {
            status: StationStatus::OffLine,
            listeners: 0,
            recent_requests: 0,
            now_playing: None,
        }
    }
}

/// Sequences around the visible window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SegmentTimeline {
    /// Evicted sequences just before the window
    pub past: Vec<u64>,
    /// Sequences listed by the playlist
    pub visible: Vec<u64>,
    /// Buffered sequences after the window (live, then pending)
    pub upcoming: Vec<u64>,
}

type WorkerSlot = Option<(StreamWorker, mpsc::Sender<WorkerCommand>)>;

pub(crate) struct StreamManagerInner {
    id: Uuid,
    station: Arc<StationState>,
    hls: HlsConfig,
    request_window: Duration,
    source: Arc<dyn FragmentSource>,
    play_counts: Arc<dyn PlayCountSink>,
    tickers: Arc<TickerHub>,
    pending: Mutex<VecDeque<HlsSegment>>,
    live: RwLock<BTreeMap<u64, Arc<HlsSegment>>>,
    next_sequence: AtomicU64,
    requests: Mutex<VecDeque<Instant>>,
    last_activity: Mutex<Instant>,
    latest_requested: Mutex<Option<u64>>,
    now_playing: Mutex<Option<NowPlaying>>,
    cancel: CancellationToken,
    initialized: AtomicBool,
    worker: Mutex<WorkerSlot>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StreamManagerInner {
    fn slug(&self) -> String {
        self.station.slug()
    }

    fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// One feed cycle: drip, status flip, refill.
    pub(crate) async fn feed_cycle(&self) {
        if self.cancel.is_cancelled() {
            return;
        }

        let dripped = self.drip();
        if !dripped.is_empty() {
            if self.station.status() != StationStatus::OnLine && !read(&self.live).is_empty() {
                self.station.set_status(StationStatus::OnLine);
            }
            for segment in dripped.iter().filter(|s| s.first_of_fragment) {
                self.on_fragment_started(segment);
            }
        }

        if self.pending_len() < self.hls.refill_threshold {
            self.refill().await;
        }
    }

    /// Moves up to `drip_per_feed` segments from pending to live, never
    /// beyond the live buffer cap.
    fn drip(&self) -> Vec<Arc<HlsSegment>> {
        let cap = self.hls.live_buffer_cap();
        let mut pending = lock(&self.pending);
        let mut live = write(&self.live);

        let mut dripped = Vec::with_capacity(self.hls.drip_per_feed);
        for _ in 0..self.hls.drip_per_feed {
            if live.len() >= cap {
                debug!(station = %self.slug(), live = live.len(), "Live buffer full, drip paused");
                break;
            }
            let Some(segment) = pending.pop_front() else {
                break;
            };
            let segment = Arc::new(segment);
            live.insert(segment.sequence, segment.clone());
            dripped.push(segment);
        }
        dripped
    }

    async fn refill(&self) {
        let slug = self.slug();
        let fragment = match self.source.next_fragment().await {
            Ok(Some(fragment)) => fragment,
            Ok(None) => {
                debug!(station = %slug, "No fragment available");
                return;
            }
            Err(err) => {
                warn!(station = %slug, "Failed to fetch next fragment: {err:?}");
                return;
            }
        };

        if fragment.segments.is_empty() {
            warn!(station = %slug, song = %fragment.song.display_name(), "Fragment has no segment");
            return;
        }
        if self.cancel.is_cancelled() {
            return;
        }

        let count = fragment.segments.len();
        let first = {
            let mut pending = lock(&self.pending);
            let first = self.next_sequence.load(Ordering::SeqCst);
            for (index, segment) in fragment.segments.into_iter().enumerate() {
                let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
                pending.push_back(segment.assign(sequence, fragment.id, index == 0));
            }
            first
        };
        debug!(
            station = %slug,
            song = %fragment.song.display_name(),
            segments = count,
            first_sequence = first,
            "Queued fragment"
        );
    }

    fn on_fragment_started(&self, segment: &HlsSegment) {
        let previous = lock(&self.now_playing).replace(NowPlaying {
            song_id: segment.song_id,
            fragment_id: segment.fragment_id,
            title: segment.metadata.title.clone(),
            artist: segment.metadata.artist.clone(),
            started_at: Utc::now(),
            first_sequence: segment.sequence,
        });
        debug!(station = %self.slug(), song = %segment.metadata, "Now playing");

        if let Some(previous) = previous {
            if previous.fragment_id != segment.fragment_id {
                self.notify_played(previous.song_id);
            }
        }
    }

    /// Fire-and-forget play-count update.
    fn notify_played(&self, song_id: Uuid) {
        let sink = self.play_counts.clone();
        let brand_id = self.station.brand_id();
        let slug = self.slug();
        tokio::spawn(async move {
            if let Err(err) = sink.played(brand_id, song_id, &slug).await {
                warn!(station = %slug, %song_id, "Failed to update play count: {err:?}");
            }
        });
    }

    /// Evicts the oldest live segments beyond the visible window.
    pub(crate) fn slide(&self) -> usize {
        let mut live = write(&self.live);
        let mut evicted = 0;
        while live.len() > self.hls.max_visible_segments {
            live.pop_first();
            evicted += 1;
        }
        drop(live);

        if evicted > 0 {
            debug!(station = %self.slug(), evicted, "Slid live window");
        }
        evicted
    }

    fn record_request(&self, sequence: u64) {
        let now = Instant::now();
        {
            let mut requests = lock(&self.requests);
            requests.push_back(now);
            prune_requests(&mut requests, now, self.request_window);
        }
        *lock(&self.last_activity) = now;
        *lock(&self.latest_requested) = Some(sequence);
    }

    fn recent_requests(&self) -> usize {
        let mut requests = lock(&self.requests);
        prune_requests(&mut requests, Instant::now(), self.request_window);
        requests.len()
    }

    fn listeners(&self, recent_requests: usize) -> usize {
        let per_listener = (self.request_window.as_secs()
            / u64::from(self.hls.segment_duration_secs.max(1)))
        .max(1) as usize;
        recent_requests.div_ceil(per_listener)
    }
}

impl Drop for StreamManagerInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn prune_requests(requests: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = requests.front() {
        if now.duration_since(*oldest) > window {
            requests.pop_front();
        } else {
            break;
        }
    }
}

/// Live segment buffer of one station.
///
/// Segments flow from the fragment source into a FIFO pending queue (where
/// they receive their sequence numbers), are dripped into the live buffer
/// on feeder ticks, and are evicted on slider ticks once the live buffer
/// exceeds the visible window. Readers (`generate_playlist`,
/// `get_segment`) take short read locks and never wait on a feed.
#[derive(Clone)]
pub struct StreamManager {
    inner: Arc<StreamManagerInner>,
}

impl StreamManager {
    pub fn new(
        station: Arc<StationState>,
        config: &BroadcastConfig,
        source: Arc<dyn FragmentSource>,
        play_counts: Arc<dyn PlayCountSink>,
        tickers: Arc<TickerHub>,
    ) -> Self {
        Self {
            inner: Arc::new(StreamManagerInner {
                id: Uuid::new_v4(),
                station,
                hls: config.hls.clone(),
                request_window: config.stats.request_window(),
                source,
                play_counts,
                tickers,
                pending: Mutex::new(VecDeque::new()),
                live: RwLock::new(BTreeMap::new()),
                next_sequence: AtomicU64::new(0),
                requests: Mutex::new(VecDeque::new()),
                last_activity: Mutex::new(Instant::now()),
                latest_requested: Mutex::new(None),
                now_playing: Mutex::new(None),
                cancel: CancellationToken::new(),
                initialized: AtomicBool::new(false),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Identity of this manager instance.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Sets the initial status and starts the worker. Idempotent.
    pub fn initialize(&self) {
        let inner = &self.inner;
        let slug = inner.slug();
        if inner.initialized.swap(true, Ordering::SeqCst) {
            debug!(station = %slug, "Stream manager already initialized");
            return;
        }
        if inner.cancel.is_cancelled() {
            warn!(station = %slug, "Stream manager was shut down, not starting");
            return;
        }

        inner
            .station
            .set_status(inner.station.managed_by().initial_status());

        let feeder = inner.tickers.feeder().subscribe();
        let slider = inner.tickers.slider().subscribe();
        let (worker, commands) = StreamWorker::spawn(
            Arc::downgrade(inner),
            slug.clone(),
            feeder,
            slider,
            inner.cancel.clone(),
        );
        *lock(&inner.worker) = Some((worker, commands));
        *lock(&inner.last_activity) = Instant::now();

        info!(station = %slug, manager = %inner.id, "📡 Stream manager initialized");
    }

    pub fn is_running(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst) && !self.inner.cancel.is_cancelled()
    }

    fn command_sender(&self) -> Option<mpsc::Sender<WorkerCommand>> {
        lock(&self.inner.worker)
            .as_ref()
            .map(|(_, commands)| commands.clone())
    }

    /// Runs one feed cycle on the worker now. Returns `false` when the
    /// manager is not running.
    pub async fn feed_now(&self) -> bool {
        let Some(commands) = self.command_sender() else {
            return false;
        };
        let (done, finished) = oneshot::channel();
        if commands.send(WorkerCommand::Feed { done }).await.is_err() {
            return false;
        }
        finished.await.is_ok()
    }

    /// Runs one slide cycle on the worker now; returns the evicted count.
    pub async fn slide_now(&self) -> Option<usize> {
        let commands = self.command_sender()?;
        let (done, evicted) = oneshot::channel();
        commands.send(WorkerCommand::Slide { done }).await.ok()?;
        evicted.await.ok()
    }

    /// HLS playlist over the visible window.
    pub fn generate_playlist(&self) -> String {
        let inner = &self.inner;
        let window: Vec<Arc<HlsSegment>> = read(&inner.live)
            .values()
            .take(inner.hls.max_visible_segments)
            .cloned()
            .collect();
        hls::render_playlist(
            &inner.slug(),
            inner.hls.segment_duration_secs,
            Utc::now(),
            window.iter().map(Arc::as_ref),
            inner.hls.max_visible_segments,
        )
    }

    /// Live segment named `<anything>_<sequence>.ts`, if still buffered.
    pub fn get_segment(&self, name: &str) -> Option<Arc<HlsSegment>> {
        let inner = &self.inner;
        let Some(sequence) = parse_segment_sequence(name) else {
            debug!(station = %inner.slug(), name, "Segment name doesn't match expected pattern");
            return None;
        };
        inner.record_request(sequence);

        let segment = read(&inner.live).get(&sequence).cloned();
        if segment.is_none() {
            debug!(station = %inner.slug(), sequence, "Segment not found in live buffer");
        }
        segment
    }

    /// Stops the worker, clears every buffer and sets the station offline.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        let slug = inner.slug();
        info!(station = %slug, "Shutting down stream manager");

        inner.cancel.cancel();
        let worker = lock(&inner.worker).take();
        if let Some((worker, _commands)) = worker {
            if let Err(err) = worker.wait().await {
                warn!(station = %slug, "Stream worker ended with error: {err:?}");
            }
        }

        lock(&inner.pending).clear();
        write(&inner.live).clear();
        inner.next_sequence.store(0, Ordering::SeqCst);
        lock(&inner.requests).clear();
        inner.station.set_status(StationStatus::OffLine);

        if let Some(playing) = lock(&inner.now_playing).take() {
            inner.notify_played(playing.song_id);
        }
        info!(station = %slug, "Stream manager shut down, all queues cleared");
    }

    pub fn live_len(&self) -> usize {
        read(&self.inner.live).len()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending_len()
    }

    /// Sequences currently in the live buffer, ascending.
    pub fn live_sequences(&self) -> Vec<u64> {
        read(&self.inner.live).keys().copied().collect()
    }

    /// Sequences waiting in the pending queue, in drip order.
    pub fn pending_sequences(&self) -> Vec<u64> {
        lock(&self.inner.pending).iter().map(|s| s.sequence).collect()
    }

    pub fn now_playing(&self) -> Option<NowPlaying> {
        lock(&self.inner.now_playing).clone()
    }

    pub fn stats(&self) -> StreamStats {
        let inner = &self.inner;
        let (live_segments, first, last) = {
            let live = read(&inner.live);
            (
                live.len(),
                live.keys().next().copied(),
                live.keys().next_back().copied(),
            )
        };
        let recent_requests = inner.recent_requests();

        StreamStats {
            manager_id: inner.id,
            slug: inner.slug(),
            status: inner.station.status(),
            live_segments,
            pending_segments: inner.pending_len(),
            first_live_sequence: first,
            last_live_sequence: last,
            next_sequence: inner.next_sequence.load(Ordering::SeqCst),
            recent_requests,
            listeners: inner.listeners(recent_requests),
            heartbeat: live_segments > 0,
            latest_requested_segment: *lock(&inner.latest_requested),
            now_playing: self.now_playing(),
        }
    }

    /// Status with `QueueSaturated` projected over an online station whose
    /// pending queue exceeds the saturation threshold.
    pub fn live_status(&self) -> LiveStatus {
        let inner = &self.inner;
        let mut status = inner.station.status();
        if status == StationStatus::OnLine
            && inner.pending_len() > inner.hls.queue_saturation_segments
        {
            status = StationStatus::QueueSaturated;
        }
        let recent_requests = inner.recent_requests();
        LiveStatus {
            status,
            listeners: inner.listeners(recent_requests),
            recent_requests,
            now_playing: self.now_playing(),
        }
    }

    /// `past` evicted sequences, the visible window, and up to `upcoming`
    /// buffered sequences after it.
    pub fn segment_timeline(&self, past: usize, upcoming: usize) -> SegmentTimeline {
        let inner = &self.inner;
        let live = self.live_sequences();
        let split = live.len().min(inner.hls.max_visible_segments);
        let (visible, beyond) = live.split_at(split);

        let past = match visible.first() {
            Some(&first) => (first.saturating_sub(past as u64)..first).collect(),
            None => Vec::new(),
        };
        let upcoming = beyond
            .iter()
            .copied()
            .chain(self.pending_sequences())
            .take(upcoming)
            .collect();

        SegmentTimeline {
            past,
            visible: visible.to_vec(),
            upcoming,
        }
    }

    /// Time since the last segment request, or since start without any.
    pub fn idle_for(&self) -> Duration {
        let last = *lock(&self.inner.last_activity);
        Instant::now().duration_since(last)
    }
}

impl std::fmt::Debug for StreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("id", &self.inner.id)
            .field("slug", &self.inner.slug())
            .finish()
    }
}
