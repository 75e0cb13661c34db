//! Wall-clock aligned tickers shared by every station.
//!
//! A [`WallClockTicker`] owns one publisher task that fires on absolute
//! multiples of its period (every station sees the same 10s boundaries,
//! whatever its start time). Ticks are published through a `watch`
//! channel: the publisher never waits on subscribers, and a slow
//! subscriber only ever observes the latest tick.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Delay from `now` to the next instant divisible by `period`.
pub fn aligned_delay(now: SystemTime, period: Duration) -> Duration {
    let period_ms = period.as_millis().max(1);
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    let remaining = period_ms - since_epoch % period_ms;
    Duration::from_millis(remaining as u64)
}

/// Epoch seconds truncated to the period boundary
pub fn aligned_timestamp(now: SystemTime, period: Duration) -> i64 {
    let period_secs = period.as_secs().max(1) as i64;
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();
    secs - secs % period_secs
}

/// Hot publisher of aligned ticks.
pub struct WallClockTicker {
    period: Duration,
    ticks: watch::Receiver<i64>,
    cancel: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl WallClockTicker {
    /// Starts the publisher. Must be called from within a tokio runtime.
    pub fn spawn(period: Duration) -> Self {
        let period = period.max(Duration::from_secs(1));
        let (tx, ticks) = watch::channel(0i64);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let join_handle = tokio::spawn(async move {
            let start = Instant::now() + aligned_delay(SystemTime::now(), period);
            let mut interval = interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(period_secs = period.as_secs(), "Ticker started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let timestamp = aligned_timestamp(SystemTime::now(), period);
                        tx.send_replace(timestamp);
                    }
                }
            }

            debug!(period_secs = period.as_secs(), "Ticker stopped");
        });

        Self {
            period,
            ticks,
            cancel,
            join_handle,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Independent subscription that only sees ticks published from now on.
    pub fn subscribe(&self) -> TickSubscription {
        let mut ticks = self.ticks.clone();
        ticks.borrow_and_update();
        TickSubscription { ticks }
    }

    /// Stops the publisher; subscribers then receive `None`.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.join_handle.is_finished()
    }
}

impl Drop for WallClockTicker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A subscriber's view of a ticker.
#[derive(Debug, Clone)]
pub struct TickSubscription {
    ticks: watch::Receiver<i64>,
}

impl TickSubscription {
    /// Waits for the next tick; `None` once the ticker is stopped.
    pub async fn next_tick(&mut self) -> Option<i64> {
        self.ticks.changed().await.ok()?;
        Some(*self.ticks.borrow_and_update())
    }
}

/// Registry of tickers keyed by period.
pub struct TickerHub {
    feeder_period: Duration,
    slider_period: Duration,
    tickers: Mutex<HashMap<Duration, Arc<WallClockTicker>>>,
}

impl TickerHub {
    pub fn new(feeder_period: Duration, slider_period: Duration) -> Self {
        Self {
            feeder_period,
            slider_period,
            tickers: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &crate::config::TimersConfig) -> Self {
        Self::new(config.feeder_interval(), config.slider_interval())
    }

    pub fn feeder(&self) -> Arc<WallClockTicker> {
        self.ticker(self.feeder_period)
    }

    pub fn slider(&self) -> Arc<WallClockTicker> {
        self.ticker(self.slider_period)
    }

    /// Ticker for `period`, spawned on first use.
    pub fn ticker(&self, period: Duration) -> Arc<WallClockTicker> {
        let mut tickers = self
            .tickers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tickers
            .entry(period)
            .or_insert_with(|| {
                info!(period_secs = period.as_secs(), "⏱️ Creating wall-clock ticker");
                Arc::new(WallClockTicker::spawn(period))
            })
            .clone()
    }

    pub fn shutdown(&self) {
        let mut tickers = self
            .tickers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for ticker in tickers.values() {
            ticker.stop();
        }
        tickers.clear();
        info!("Tickers stopped");
    }
}
