//! Extension pour intégrer le moteur de diffusion dans pmoconfig
//!
//! Ce module fournit le trait `BroadcastConfigExt` qui résout les chemins
//! gérés par le moteur (stockage audio, répertoire de travail du
//! segmenteur, catalogue) relativement au répertoire de configuration.
//!
//! # Exemple
//!
//! ```rust,ignore
//! use pmoconfig::get_config;
//! use pmobroadcast::BroadcastConfigExt;
//!
//! let config = get_config();
//! let audio_dir = config.get_audio_dir()?;
//! let catalog = config.get_catalog_file()?;
//! ```

use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::Value;
use std::path::PathBuf;

/// Répertoire par défaut des fichiers audio (relatif au config_dir)
const DEFAULT_AUDIO_DIR: &str = "audio";

/// Répertoire de travail par défaut du segmenteur
const DEFAULT_SEGMENT_WORK_DIR: &str = "segments";

/// Fichier catalogue par défaut
const DEFAULT_CATALOG_FILE: &str = "catalog.yaml";

const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// Trait d'extension pour les chemins du moteur de diffusion
pub trait BroadcastConfigExt {
    /// Répertoire des fichiers audio (créé si absent)
    fn get_audio_dir(&self) -> Result<String>;

    fn set_audio_dir(&self, path: String) -> Result<()>;

    /// Répertoire de travail du segmenteur ffmpeg (créé si absent)
    fn get_segment_work_dir(&self) -> Result<String>;

    /// Fichier YAML décrivant stations, scripts et morceaux
    fn get_catalog_file(&self) -> Result<PathBuf>;

    /// Exécutable ffmpeg
    fn get_ffmpeg_path(&self) -> String;
}

impl BroadcastConfigExt for Config {
    fn get_audio_dir(&self) -> Result<String> {
        self.get_managed_dir(&["broadcast", "storage", "audio_dir"], DEFAULT_AUDIO_DIR)
    }

    fn set_audio_dir(&self, path: String) -> Result<()> {
        self.set_managed_dir(&["broadcast", "storage", "audio_dir"], path)
    }

    fn get_segment_work_dir(&self) -> Result<String> {
        self.get_managed_dir(
            &["broadcast", "segmenter", "work_dir"],
            DEFAULT_SEGMENT_WORK_DIR,
        )
    }

    fn get_catalog_file(&self) -> Result<PathBuf> {
        self.get_managed_file(&["broadcast", "catalog", "file"], DEFAULT_CATALOG_FILE)
    }

    fn get_ffmpeg_path(&self) -> String {
        match self.get_value(&["broadcast", "segmenter", "ffmpeg_path"]) {
            Ok(Value::String(path)) if !path.is_empty() => path,
            _ => DEFAULT_FFMPEG_PATH.to_string(),
        }
    }
}
