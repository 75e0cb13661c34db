use super::storage::AudioSource;
use crate::segment::{HlsSegment, SongMetadata};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bytes::Bytes;
use pmoagenda::SoundFragment;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

/// Cuts a song's audio into fixed-duration segments.
#[async_trait]
pub trait Segmenter: Send + Sync {
    async fn segment(
        &self,
        song: &SoundFragment,
        audio: AudioSource,
        bitrate_kbps: u32,
    ) -> anyhow::Result<Vec<HlsSegment>>;
}

fn metadata_of(song: &SoundFragment) -> SongMetadata {
    SongMetadata::new(song.title.clone(), song.artist.clone())
}

/// Seconds of audio in `size` bytes at `bitrate_kbps`, rounded up.
fn estimated_duration(size: usize, bitrate_kbps: u32) -> u32 {
    let bytes_per_sec = u64::from(bitrate_kbps.max(1)) * 1000 / 8;
    (size as u64).div_ceil(bytes_per_sec).max(1) as u32
}

/// Splits the encoded stream into byte chunks of `duration × bitrate`.
///
/// No re-encoding: this only suits constant-bitrate input already in a
/// streamable container.
#[derive(Debug, Clone)]
pub struct ChunkSegmenter {
    segment_duration_secs: u32,
}

impl ChunkSegmenter {
    pub fn new(segment_duration_secs: u32) -> Self {
        Self {
            segment_duration_secs: segment_duration_secs.max(1),
        }
    }

    pub fn chunk_size(&self, bitrate_kbps: u32) -> usize {
        (u64::from(bitrate_kbps.max(1)) * 1000 / 8 * u64::from(self.segment_duration_secs)) as usize
    }
}

#[async_trait]
impl Segmenter for ChunkSegmenter {
    async fn segment(
        &self,
        song: &SoundFragment,
        audio: AudioSource,
        bitrate_kbps: u32,
    ) -> anyhow::Result<Vec<HlsSegment>> {
        let data = audio.read_bytes().await?;
        if data.is_empty() {
            return Err(anyhow!("Empty audio for '{}'", song.display_name()));
        }

        let chunk_size = self.chunk_size(bitrate_kbps);
        let metadata = metadata_of(song);
        let mut segments = Vec::with_capacity(data.len().div_ceil(chunk_size));
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + chunk_size).min(data.len());
            let chunk = data.slice(offset..end);
            let duration = if chunk.len() == chunk_size {
                self.segment_duration_secs
            } else {
                estimated_duration(chunk.len(), bitrate_kbps)
            };
            segments.push(HlsSegment::new(chunk, duration, metadata.clone(), song.id));
            offset = end;
        }

        debug!(song = %song.display_name(), segments = segments.len(), "Chunked fragment");
        Ok(segments)
    }
}

/// Re-encodes through `ffmpeg -f segment` into MPEG-TS files.
#[derive(Debug, Clone)]
pub struct FfmpegSegmenter {
    ffmpeg_path: String,
    work_dir: PathBuf,
    segment_duration_secs: u32,
}

impl FfmpegSegmenter {
    pub fn new(
        ffmpeg_path: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        segment_duration_secs: u32,
    ) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            work_dir: work_dir.into(),
            segment_duration_secs: segment_duration_secs.max(1),
        }
    }

    async fn run_ffmpeg(&self, input: &Path, out_dir: &Path, bitrate_kbps: u32) -> anyhow::Result<()> {
        let pattern = out_dir.join("seg_%05d.ts");
        let output = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .args(["-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args(["-vn", "-c:a", "aac", "-b:a"])
            .arg(format!("{bitrate_kbps}k"))
            .args(["-f", "segment", "-segment_format", "mpegts", "-segment_time"])
            .arg(self.segment_duration_secs.to_string())
            .arg(&pattern)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.ffmpeg_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("ffmpeg segmentation failed: {}", stderr.trim()));
        }
        Ok(())
    }

    async fn collect_segments(
        &self,
        song: &SoundFragment,
        out_dir: &Path,
        bitrate_kbps: u32,
    ) -> anyhow::Result<Vec<HlsSegment>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(out_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "ts") {
                files.push(path);
            }
        }
        files.sort();

        let metadata = metadata_of(song);
        let last = files.len().saturating_sub(1);
        let mut segments = Vec::with_capacity(files.len());
        for (index, path) in files.iter().enumerate() {
            let data = Bytes::from(tokio::fs::read(path).await?);
            let duration = if index == last {
                estimated_duration(data.len(), bitrate_kbps).min(self.segment_duration_secs)
            } else {
                self.segment_duration_secs
            };
            segments.push(HlsSegment::new(data, duration, metadata.clone(), song.id));
        }
        Ok(segments)
    }
}

#[async_trait]
impl Segmenter for FfmpegSegmenter {
    async fn segment(
        &self,
        song: &SoundFragment,
        audio: AudioSource,
        bitrate_kbps: u32,
    ) -> anyhow::Result<Vec<HlsSegment>> {
        let out_dir = self.work_dir.join(format!("{}-{}", song.id, Uuid::new_v4()));
        tokio::fs::create_dir_all(&out_dir)
            .await
            .with_context(|| format!("Failed to create {}", out_dir.display()))?;

        let result = async {
            let input = match audio {
                AudioSource::File(path) => path,
                AudioSource::Memory(data) => {
                    let path = out_dir.join("input");
                    tokio::fs::write(&path, &data).await?;
                    path
                }
            };
            self.run_ffmpeg(&input, &out_dir, bitrate_kbps).await?;
            self.collect_segments(song, &out_dir, bitrate_kbps).await
        }
        .await;

        if let Err(err) = tokio::fs::remove_dir_all(&out_dir).await {
            warn!("Failed to clean segment dir {}: {err}", out_dir.display());
        }

        let segments = result?;
        if segments.is_empty() {
            return Err(anyhow!("ffmpeg produced no segment for '{}'", song.display_name()));
        }
        debug!(song = %song.display_name(), segments = segments.len(), "Segmented fragment with ffmpeg");
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chunks_follow_bitrate() {
        // 128 kbps * 10 s = 160 000 bytes per segment
        let segmenter = ChunkSegmenter::new(10);
        assert_eq!(segmenter.chunk_size(128), 160_000);

        let song = SoundFragment::new(Uuid::new_v4(), "Naima", "John Coltrane");
        let audio = AudioSource::Memory(Bytes::from(vec![1u8; 400_000]));
        let segments = segmenter.segment(&song, audio, 128).await.unwrap();

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].duration_secs, 10);
        assert_eq!(segments[2].size(), 80_000);
        assert_eq!(segments[2].duration_secs, 5);
        assert!(segments.iter().all(|s| s.song_id == song.id));
    }

    #[tokio::test]
    async fn test_empty_audio_is_an_error() {
        let segmenter = ChunkSegmenter::new(10);
        let song = SoundFragment::new(Uuid::new_v4(), "Silence", "");
        let result = segmenter
            .segment(&song, AudioSource::Memory(Bytes::new()), 128)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_fails_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = FfmpegSegmenter::new("/nonexistent/ffmpeg", dir.path(), 10);
        let song = SoundFragment::new(Uuid::new_v4(), "Naima", "John Coltrane");
        let result = segmenter
            .segment(&song, AudioSource::Memory(Bytes::from_static(b"x")), 128)
            .await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
