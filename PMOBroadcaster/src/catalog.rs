//! Catalogue en mémoire chargé depuis un fichier YAML
//!
//! Le fichier décrit les stations, les scripts et les morceaux. Il alimente
//! les trois dépôts dont le moteur a besoin : stations pour le pool, scripts
//! pour le planificateur, morceaux pour le fournisseur de chansons.
//!
//! ```yaml
//! stations:
//!   - id: 6f1c...
//!     slug: jazz-fm
//!     scripts: [9a2b...]
//! scripts:
//!   - id: 9a2b...
//!     title: Jazz day
//!     scenes: [...]
//! songs:
//!   - id: 1d4e...
//!     title: So What
//!     artist: Miles Davis
//!     length_secs: 545
//!     brands: [6f1c...]
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use pmoagenda::{Script, ScriptRepository, SongFilter, SongRepository, SoundFragment};
use pmobroadcast::{StationDefinition, StationRepository};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Morceau du catalogue et stations autorisées à le diffuser
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSong {
    /// Stations autorisées (toutes si vide)
    #[serde(default)]
    pub brands: Vec<Uuid>,
    #[serde(flatten)]
    pub song: SoundFragment,
}

impl CatalogSong {
    fn available_for(&self, brand_id: Uuid) -> bool {
        self.brands.is_empty() || self.brands.contains(&brand_id)
    }
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    stations: Vec<StationDefinition>,
    #[serde(default)]
    scripts: Vec<Script>,
    #[serde(default)]
    songs: Vec<CatalogSong>,
}

/// Catalogue complet, en lecture seule après chargement
#[derive(Debug, Default)]
pub struct Catalog {
    stations: HashMap<String, StationDefinition>,
    scripts: HashMap<Uuid, Script>,
    songs: Vec<CatalogSong>,
}

impl Catalog {
    /// Charge le catalogue ; un fichier absent donne un catalogue vide
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("⚠️ Catalog file {} not found, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let catalog = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;

        info!(
            "📚 Catalog loaded: {} station(s), {} script(s), {} song(s)",
            catalog.stations.len(),
            catalog.scripts.len(),
            catalog.songs.len()
        );
        Ok(catalog)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Ok(Self {
            stations: file
                .stations
                .into_iter()
                .map(|station| (station.slug.clone(), station))
                .collect(),
            scripts: file
                .scripts
                .into_iter()
                .map(|script| (script.id, script))
                .collect(),
            songs: file.songs,
        })
    }

    pub fn station_slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.stations.keys().cloned().collect();
        slugs.sort();
        slugs
    }
}

#[async_trait]
impl StationRepository for Catalog {
    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<StationDefinition>> {
        Ok(self.stations.get(slug).cloned())
    }
}

#[async_trait]
impl ScriptRepository for Catalog {
    async fn find_script(&self, script_id: Uuid) -> anyhow::Result<Option<Script>> {
        Ok(self.scripts.get(&script_id).cloned())
    }
}

#[async_trait]
impl SongRepository for Catalog {
    async fn find_by_filter(
        &self,
        brand_id: Uuid,
        filter: &SongFilter,
        limit: usize,
    ) -> anyhow::Result<Vec<SoundFragment>> {
        let matching = self
            .songs
            .iter()
            .filter(|entry| entry.available_for(brand_id) && filter.matches(&entry.song))
            .map(|entry| entry.song.clone());

        Ok(if limit == 0 {
            matching.collect()
        } else {
            matching.take(limit).collect()
        })
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<SoundFragment>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.songs.iter().find(|entry| entry.song.id == *id))
            .map(|entry| entry.song.clone())
            .collect())
    }
}
