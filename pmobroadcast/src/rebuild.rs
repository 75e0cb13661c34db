//! Agenda refresh for running stations.

use crate::error::{BroadcastError, Result};
use crate::pool::RadioStationPool;
use crate::station::StationDefinition;
use pmoagenda::{Agenda, AgendaScheduler, BuildMode};
use std::sync::Arc;
use tracing::info;

/// Looped agenda of the station's primary script.
pub(crate) async fn build_station_agenda(
    scheduler: &AgendaScheduler,
    definition: &StationDefinition,
) -> Result<Agenda> {
    let script_id = definition
        .primary_script()
        .ok_or_else(|| BroadcastError::NoScript(definition.slug.clone()))?;
    let agenda = scheduler
        .build_for_script(definition.id, script_id, BuildMode::Looped)
        .await?;
    Ok(agenda)
}

/// Rebuilds a running station's agenda without restarting its stream.
#[derive(Clone)]
pub struct AgendaRebuildService {
    pool: Arc<RadioStationPool>,
}

impl AgendaRebuildService {
    pub fn new(pool: Arc<RadioStationPool>) -> Self {
        Self { pool }
    }

    /// Builds a fresh agenda and swaps it in. On failure the current agenda
    /// stays installed.
    pub async fn rebuild(&self, brand: &str) -> Result<Arc<Agenda>> {
        let station = self
            .pool
            .get(brand)
            .ok_or_else(|| BroadcastError::StationNotFound(brand.to_string()))?;

        let agenda = build_station_agenda(self.pool.scheduler(), &station.definition()).await?;
        let agenda = station.state().install_agenda(agenda);
        info!(
            station = brand,
            scenes = agenda.total_scenes(),
            songs = agenda.total_songs(),
            "Agenda rebuilt"
        );
        Ok(agenda)
    }
}
