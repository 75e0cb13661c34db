use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bytes::Bytes;
use pmoagenda::SoundFragment;
use std::path::PathBuf;

/// Audio of a song, either on disk or in memory.
#[derive(Debug, Clone)]
pub enum AudioSource {
    File(PathBuf),
    Memory(Bytes),
}

impl AudioSource {
    pub async fn read_bytes(&self) -> anyhow::Result<Bytes> {
        match self {
            Self::File(path) => {
                let data = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read audio file {}", path.display()))?;
                Ok(Bytes::from(data))
            }
            Self::Memory(data) => Ok(data.clone()),
        }
    }
}

/// Resolves songs to their audio.
#[async_trait]
pub trait AudioStore: Send + Sync {
    async fn load(&self, song: &SoundFragment) -> anyhow::Result<AudioSource>;
}

/// Audio files under a directory, named by storage key or song id.
#[derive(Debug, Clone)]
pub struct FsAudioStore {
    root: PathBuf,
}

impl FsAudioStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, song: &SoundFragment) -> PathBuf {
        match &song.storage_key {
            Some(key) => self.root.join(key),
            None => self.root.join(song.id.to_string()),
        }
    }
}

#[async_trait]
impl AudioStore for FsAudioStore {
    async fn load(&self, song: &SoundFragment) -> anyhow::Result<AudioSource> {
        let path = self.path_for(song);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(anyhow!(
                "No audio for '{}' at {}",
                song.display_name(),
                path.display()
            ));
        }
        Ok(AudioSource::File(path))
    }
}
