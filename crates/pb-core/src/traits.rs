//! # Core Traits (Ports)
//!
//! Any storage plugin must implement these traits to be used by the binary.

use async_trait::async_trait;

use crate::models::{Group, GroupId, NewGroup, NewVote, Photo, Vote};

/// Persistence contract for photos and the vote log.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PhotoRepo: Send + Sync {
    /// Returns at most `limit` photos of the group. Order is not meaningful.
    async fn fetch_candidate_pool(&self, group_id: &GroupId, limit: usize) -> anyhow::Result<Vec<Photo>>;

    /// Durably appends the vote and moves both photos' counters with it.
    /// On error nothing may have been written.
    async fn record_vote(&self, vote: NewVote) -> anyhow::Result<Vote>;

    /// Photos of the group ordered by wins, then votes, both descending.
    async fn leaderboard(&self, group_id: &GroupId, limit: usize) -> anyhow::Result<Vec<Photo>>;
}

/// Persistence contract for groups.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait GroupRepo: Send + Sync {
    async fn list_groups(&self) -> anyhow::Result<Vec<Group>>;
    async fn get_group(&self, id: &GroupId) -> anyhow::Result<Option<Group>>;
    async fn create_group(&self, group: NewGroup) -> anyhow::Result<Group>;
}
