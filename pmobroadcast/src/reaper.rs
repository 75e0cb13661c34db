//! Stops stations nobody listens to.

use crate::config::InactivityConfig;
use crate::pool::RadioStationPool;
use crate::ticker::TickerHub;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct InactivityReaper {
    pool: Arc<RadioStationPool>,
    config: InactivityConfig,
}

impl InactivityReaper {
    pub fn new(pool: Arc<RadioStationPool>, config: InactivityConfig) -> Self {
        Self { pool, config }
    }

    /// Stops and removes every idle, non-whitelisted station. Returns the
    /// reaped slugs.
    pub async fn sweep(&self) -> Vec<String> {
        let idle_timeout = self.config.idle_timeout();
        let mut reaped = Vec::new();

        for station in self.pool.online_stations_snapshot() {
            let slug = station.slug();
            if self.config.whitelist.contains(&slug) {
                continue;
            }
            let idle_for = station.manager().idle_for();
            if idle_for < idle_timeout {
                continue;
            }

            let manager_id = station.manager().id();
            if self.pool.stop_and_remove_if(&slug, manager_id).await.is_some() {
                info!(station = %slug, idle_minutes = idle_for.as_secs() / 60, "Reaped idle station");
                reaped.push(slug);
            }
        }

        if !reaped.is_empty() {
            debug!(count = reaped.len(), "Inactivity sweep done");
        }
        reaped
    }

    /// Sweeps on every tick of the check interval until `cancel` fires.
    pub fn spawn(self, tickers: &TickerHub, cancel: CancellationToken) -> JoinHandle<()> {
        let mut ticks = tickers.ticker(self.config.check_interval()).subscribe();
        tokio::spawn(async move {
            if !self.config.enabled {
                info!("Inactivity reaper disabled");
                return;
            }
            info!(
                idle_minutes = self.config.idle_minutes,
                whitelist = ?self.config.whitelist,
                "Inactivity reaper started"
            );
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    tick = ticks.next_tick() => {
                        if tick.is_none() {
                            break;
                        }
                        self.sweep().await;
                    }
                }
            }
            info!("Inactivity reaper stopped");
        })
    }
}
