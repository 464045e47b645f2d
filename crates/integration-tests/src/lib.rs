//! Shared fixtures for the cross-crate test suites.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pb_core::{GroupId, GroupRepo, NewGroup, NewPhoto, NewVote, Photo, PhotoRepo, Vote};
use pb_db_sqlite::SqliteStore;

/// A fresh in-memory store.
pub async fn memory_store() -> Arc<SqliteStore> {
    Arc::new(
        SqliteStore::connect("sqlite::memory:", 1)
            .await
            .expect("in-memory sqlite"),
    )
}

/// Creates a group holding `photos` freshly uploaded photos.
pub async fn seed_group(store: &SqliteStore, photos: usize) -> (GroupId, Vec<Photo>) {
    let group = store
        .create_group(NewGroup {
            name: "Arena".into(),
            description: None,
            is_public: true,
            created_by: "owner".into(),
        })
        .await
        .expect("group");

    let mut seeded = Vec::with_capacity(photos);
    for i in 0..photos {
        let photo = store
            .insert_photo(NewPhoto {
                group_id: group.id.clone(),
                owner_id: format!("owner-{i}").into(),
                title: Some(format!("Photo {i}")),
                image_url: format!("/uploads/{i}.jpg"),
            })
            .await
            .expect("photo");
        seeded.push(photo);
    }
    (group.id, seeded)
}

/// Wraps a real store and fails vote writes while `offline` is set.
pub struct FlakyStore {
    pub inner: Arc<SqliteStore>,
    offline: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<SqliteStore>) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl PhotoRepo for FlakyStore {
    async fn fetch_candidate_pool(&self, group_id: &GroupId, limit: usize) -> anyhow::Result<Vec<Photo>> {
        self.inner.fetch_candidate_pool(group_id, limit).await
    }

    async fn record_vote(&self, vote: NewVote) -> anyhow::Result<Vote> {
        if self.offline.load(Ordering::SeqCst) {
            anyhow::bail!("network unreachable");
        }
        self.inner.record_vote(vote).await
    }

    async fn leaderboard(&self, group_id: &GroupId, limit: usize) -> anyhow::Result<Vec<Photo>> {
        self.inner.leaderboard(group_id, limit).await
    }
}
