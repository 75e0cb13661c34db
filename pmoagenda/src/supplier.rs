//! Song supply for the scheduler.
//!
//! [`ScheduleSongSupplier`] turns repository lookups into randomized,
//! size-capped candidate pools. The builders only see the [`SongSupplier`]
//! trait so tests can hand them deterministic pools.

use crate::model::{PlaylistItemType, PlaylistRequest, SongFilter, SoundFragment};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::sync::Arc;
use uuid::Uuid;

/// Read-only access to the song catalog.
#[async_trait]
pub trait SongRepository: Send + Sync {
    /// Songs of `brand_id` matching `filter`, at most `limit` when non-zero
    async fn find_by_filter(
        &self,
        brand_id: Uuid,
        filter: &SongFilter,
        limit: usize,
    ) -> anyhow::Result<Vec<SoundFragment>>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<SoundFragment>>;
}

/// Candidate pools consumed by the agenda builders.
#[async_trait]
pub trait SongSupplier: Send + Sync {
    async fn songs_for_brand(
        &self,
        brand_id: Uuid,
        item_type: PlaylistItemType,
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>>;

    async fn songs_by_query(
        &self,
        brand_id: Uuid,
        request: &PlaylistRequest,
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>>;

    async fn songs_from_static_list(
        &self,
        ids: &[Uuid],
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>>;
}

/// Repository backed supplier returning shuffled pools.
#[derive(Clone)]
pub struct ScheduleSongSupplier {
    repository: Arc<dyn SongRepository>,
}

impl ScheduleSongSupplier {
    pub fn new(repository: Arc<dyn SongRepository>) -> Self {
        Self { repository }
    }

    fn select_random(mut songs: Vec<SoundFragment>, quantity: usize) -> Vec<SoundFragment> {
        songs.shuffle(&mut rand::rng());
        songs.truncate(quantity);
        songs
    }
}

#[async_trait]
impl SongSupplier for ScheduleSongSupplier {
    async fn songs_for_brand(
        &self,
        brand_id: Uuid,
        item_type: PlaylistItemType,
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>> {
        let filter = SongFilter::for_type(item_type);
        let songs = self
            .repository
            .find_by_filter(brand_id, &filter, quantity)
            .await?;
        Ok(Self::select_random(songs, quantity))
    }

    async fn songs_by_query(
        &self,
        brand_id: Uuid,
        request: &PlaylistRequest,
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>> {
        let songs = self
            .repository
            .find_by_filter(brand_id, &request.to_filter(), quantity)
            .await?;
        Ok(Self::select_random(songs, quantity))
    }

    async fn songs_from_static_list(
        &self,
        ids: &[Uuid],
        quantity: usize,
    ) -> anyhow::Result<Vec<SoundFragment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let songs = self.repository.find_by_ids(ids).await?;
        Ok(Self::select_random(songs, quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRepository {
        songs: Vec<SoundFragment>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SongRepository for FakeRepository {
        async fn find_by_filter(
            &self,
            _brand_id: Uuid,
            filter: &SongFilter,
            _limit: usize,
        ) -> anyhow::Result<Vec<SoundFragment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .songs
                .iter()
                .filter(|s| filter.matches(s))
                .cloned()
                .collect())
        }

        async fn find_by_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<SoundFragment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .songs
                .iter()
                .filter(|s| ids.contains(&s.id))
                .cloned()
                .collect())
        }
    }

    fn mock_repository(count: usize) -> Arc<FakeRepository> {
        let songs = (0..count)
            .map(|i| SoundFragment::new(Uuid::new_v4(), format!("Track {i}"), "Various"))
            .collect();
        Arc::new(FakeRepository {
            songs,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_brand_pool_is_capped() {
        let repo = mock_repository(10);
        let supplier = ScheduleSongSupplier::new(repo.clone());
        let songs = supplier
            .songs_for_brand(Uuid::new_v4(), PlaylistItemType::Song, 4)
            .await
            .unwrap();
        assert_eq!(songs.len(), 4);

        let all = supplier
            .songs_for_brand(Uuid::new_v4(), PlaylistItemType::Song, 50)
            .await
            .unwrap();
        assert_eq!(all.len(), 10);
    }

    #[tokio::test]
    async fn test_empty_static_list_skips_repository() {
        let repo = mock_repository(3);
        let supplier = ScheduleSongSupplier::new(repo.clone());
        let songs = supplier.songs_from_static_list(&[], 5).await.unwrap();
        assert!(songs.is_empty());
        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_static_list_only_returns_listed_songs() {
        let repo = mock_repository(6);
        let wanted: Vec<Uuid> = repo.songs.iter().take(2).map(|s| s.id).collect();
        let supplier = ScheduleSongSupplier::new(repo.clone());
        let songs = supplier.songs_from_static_list(&wanted, 5).await.unwrap();
        assert_eq!(songs.len(), 2);
        assert!(songs.iter().all(|s| wanted.contains(&s.id)));
    }
}
