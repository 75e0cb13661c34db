//! Registry of running stations.
//!
//! The pool maps a brand slug to its [`RadioStation`]. It is an explicit
//! value shared through an `Arc`: whoever builds it decides its
//! collaborators.
//!
//! Starting a station is a two-step affair. The definition lookup, the
//! candidate construction and its agenda build run without any lock held;
//! the create-or-reuse decision is then taken in a single critical section
//! on the map, so two concurrent starts for the same brand always end up
//! sharing one [`StreamManager`](crate::StreamManager).

use crate::config::BroadcastConfig;
use crate::error::{BroadcastError, Result};
use crate::rebuild::build_station_agenda;
use crate::source::{PlayCountSink, PlaylistFactory};
use crate::station::{RadioStation, StationDefinition, StationState, StreamKind};
use crate::stream::{LiveStatus, StreamManager};
use crate::ticker::TickerHub;
use async_trait::async_trait;
use pmoagenda::AgendaScheduler;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Read-only access to persisted station definitions.
#[async_trait]
pub trait StationRepository: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<StationDefinition>>;
}

pub struct RadioStationPool {
    stations: Mutex<HashMap<String, RadioStation>>,
    repository: Arc<dyn StationRepository>,
    scheduler: Arc<AgendaScheduler>,
    playlists: Arc<dyn PlaylistFactory>,
    play_counts: Arc<dyn PlayCountSink>,
    tickers: Arc<TickerHub>,
    config: BroadcastConfig,
}

impl RadioStationPool {
    pub fn new(
        repository: Arc<dyn StationRepository>,
        scheduler: Arc<AgendaScheduler>,
        playlists: Arc<dyn PlaylistFactory>,
        play_counts: Arc<dyn PlayCountSink>,
        tickers: Arc<TickerHub>,
        config: BroadcastConfig,
    ) -> Self {
        Self {
            stations: Mutex::new(HashMap::new()),
            repository,
            scheduler,
            playlists,
            play_counts,
            tickers,
            config,
        }
    }

    fn stations(&self) -> MutexGuard<'_, HashMap<String, RadioStation>> {
        self.stations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<AgendaScheduler> {
        &self.scheduler
    }

    /// Starts `brand`, or returns it unchanged when it is already active.
    pub async fn initialize_station(&self, brand: &str) -> Result<RadioStation> {
        if let Some(existing) = self.get(brand) {
            if existing.is_active() {
                debug!(station = brand, status = ?existing.status(), "Station already active");
                return Ok(existing);
            }
        }

        let definition = self
            .repository
            .find_by_slug(brand)
            .await
            .map_err(BroadcastError::Repository)?;
        let Some(definition) = definition else {
            let stale = self.stations().remove(brand);
            if let Some(stale) = stale {
                warn!(station = brand, "Station no longer exists, removing stale entry");
                stale.manager().shutdown().await;
            }
            return Err(BroadcastError::StationNotFound(brand.to_string()));
        };

        let candidate = self.build_station(definition);
        match build_station_agenda(&self.scheduler, &candidate.definition()).await {
            Ok(agenda) => {
                candidate.state().install_agenda(agenda);
            }
            Err(err) => {
                warn!(station = brand, "Starting without agenda: {err}");
            }
        }

        let (station, replaced) = {
            let mut stations = self.stations();
            match stations.get(brand) {
                Some(current) if current.is_active() => (current.clone(), None),
                _ => {
                    candidate.manager().initialize();
                    let replaced = stations.insert(brand.to_string(), candidate.clone());
                    (candidate, replaced)
                }
            }
        };

        if let Some(replaced) = replaced {
            if replaced.manager().id() != station.manager().id() {
                debug!(station = brand, "Shutting down replaced stream manager");
                replaced.manager().shutdown().await;
            }
        }

        info!(station = brand, manager = %station.manager().id(), status = ?station.status(), "Station ready");
        Ok(station)
    }

    fn build_station(&self, definition: StationDefinition) -> RadioStation {
        let kind = StreamKind::from_definition(&definition);
        let state = Arc::new(StationState::new(definition));
        let source = self.playlists.create(state.clone(), kind);
        let manager = StreamManager::new(
            state.clone(),
            &self.config,
            source,
            self.play_counts.clone(),
            self.tickers.clone(),
        );
        RadioStation::new(state, kind, manager)
    }

    /// Shuts the station down and leaves it parked offline in the pool.
    pub async fn stop(&self, brand: &str) -> Option<RadioStation> {
        let station = self.get(brand);
        match &station {
            Some(station) => {
                info!(station = brand, "Stopping station");
                station.manager().shutdown().await;
            }
            None => warn!(station = brand, "Station not found in pool during stop"),
        }
        station
    }

    /// Shuts the station down and removes it from the pool.
    pub async fn stop_and_remove(&self, brand: &str) -> Option<RadioStation> {
        let removed = self.stations().remove(brand);
        match &removed {
            Some(station) => {
                info!(station = brand, "Station removed from pool, shutting it down");
                station.manager().shutdown().await;
            }
            None => warn!(station = brand, "Station not found in pool during stop_and_remove"),
        }
        removed
    }

    /// Removes `brand` only while its manager is still `manager_id`.
    /// A station restarted in the meantime is left alone.
    pub async fn stop_and_remove_if(&self, brand: &str, manager_id: Uuid) -> Option<RadioStation> {
        let removed = {
            let mut stations = self.stations();
            match stations.get(brand) {
                Some(station) if station.manager().id() == manager_id => stations.remove(brand),
                Some(_) => {
                    debug!(station = brand, "Station replaced since snapshot, keeping it");
                    None
                }
                None => None,
            }
        };
        if let Some(station) = &removed {
            info!(station = brand, "Station removed from pool, shutting it down");
            station.manager().shutdown().await;
        }
        removed
    }

    pub fn get(&self, brand: &str) -> Option<RadioStation> {
        self.stations().get(brand).cloned()
    }

    /// Every pooled station, parked ones included.
    pub fn online_stations_snapshot(&self) -> Vec<RadioStation> {
        self.stations().values().cloned().collect()
    }

    pub fn active_slugs_snapshot(&self) -> HashSet<String> {
        self.stations().keys().cloned().collect()
    }

    /// Forces one feed cycle. Returns `false` when the station is not active.
    pub async fn feed_station(&self, brand: &str) -> bool {
        match self.get(brand) {
            Some(station) if station.is_active() => station.manager().feed_now().await,
            _ => {
                debug!(station = brand, "Feed skipped, station not active");
                false
            }
        }
    }

    pub fn live_status(&self, brand: &str) -> LiveStatus {
        self.get(brand)
            .map(|station| station.manager().live_status())
            .unwrap_or_else(LiveStatus::offline)
    }

    /// Swaps the definition of a pooled station without restarting it.
    pub fn update_station_config(
        &self,
        brand: &str,
        definition: StationDefinition,
    ) -> Option<RadioStation> {
        let Some(station) = self.get(brand) else {
            warn!(station = brand, "Station not found in pool during config update");
            return None;
        };
        station.state().replace_definition(definition);
        info!(station = brand, "Station configuration updated without downtime");
        Some(station)
    }

    /// Stops and removes every station.
    pub async fn shutdown_all(&self) {
        let stations: Vec<RadioStation> = self.stations().drain().map(|(_, s)| s).collect();
        info!(count = stations.len(), "Shutting down all stations");
        for station in stations {
            station.manager().shutdown().await;
        }
    }
}
