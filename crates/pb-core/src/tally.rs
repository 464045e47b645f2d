//! # Tally
//!
//! The vote log is the source of truth. A photo's counters are a projection
//! of it: every vote adds one battle to both photos and one win to the winner.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::models::{NewVote, PhotoId, Vote};
use crate::traits::PhotoRepo;

/// Aggregate counters for one photo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub votes_count: u32,
    pub wins_count: u32,
}

impl Tally {
    pub fn record_win(&mut self) {
        self.votes_count = self.votes_count.saturating_add(1);
        self.wins_count = self.wins_count.saturating_add(1);
    }

    pub fn record_loss(&mut self) {
        self.votes_count = self.votes_count.saturating_add(1);
    }

    pub fn is_consistent(&self) -> bool {
        self.wins_count <= self.votes_count
    }
}

/// Folds a vote log into per-photo tallies.
pub fn project<'a>(votes: impl IntoIterator<Item = &'a Vote>) -> HashMap<PhotoId, Tally> {
    let mut tallies: HashMap<PhotoId, Tally> = HashMap::new();
    for vote in votes {
        tallies.entry(vote.winner_photo_id.clone()).or_default().record_win();
        tallies.entry(vote.loser_photo_id.clone()).or_default().record_loss();
    }
    tallies
}

/// Persists battle outcomes through a [`PhotoRepo`].
#[derive(Clone)]
pub struct TallyEngine {
    repo: Arc<dyn PhotoRepo>,
}

impl TallyEngine {
    pub fn new(repo: Arc<dyn PhotoRepo>) -> Self {
        Self { repo }
    }

    /// Appends `vote` to the log.
    ///
    /// Invalid votes never reach storage. Storage failures come back as
    /// [`AppError::VoteWriteFailure`]; the repo guarantees nothing was written.
    pub async fn record(&self, vote: NewVote) -> Result<Vote> {
        vote.validate()?;

        let recorded = self.repo.record_vote(vote.clone()).await.map_err(|err| {
            warn!(
                group_id = %vote.group_id,
                winner = %vote.winner_photo_id,
                loser = %vote.loser_photo_id,
                error = %err,
                "vote write failed"
            );
            AppError::vote_write(err)
        })?;

        info!(
            vote_id = %recorded.id,
            group_id = %recorded.group_id,
            winner = %recorded.winner_photo_id,
            loser = %recorded.loser_photo_id,
            "vote recorded"
        );
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{new_vote, vote};
    use crate::traits::MockPhotoRepo;

    #[test]
    fn projection_counts_wins_and_battles() {
        let log = vec![vote("a", "b"), vote("a", "c"), vote("c", "a")];
        let tallies = project(&log);

        assert_eq!(tallies[&PhotoId::from("a")], Tally { votes_count: 3, wins_count: 2 });
        assert_eq!(tallies[&PhotoId::from("b")], Tally { votes_count: 1, wins_count: 0 });
        assert_eq!(tallies[&PhotoId::from("c")], Tally { votes_count: 2, wins_count: 1 });
        assert!(tallies.values().all(Tally::is_consistent));
    }

    #[tokio::test]
    async fn self_battle_never_reaches_storage() {
        let mut repo = MockPhotoRepo::new();
        repo.expect_record_vote().never();
        let engine = TallyEngine::new(Arc::new(repo));

        let err = engine.record(new_vote("a", "a")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn storage_failure_is_a_vote_write_failure() {
        let mut repo = MockPhotoRepo::new();
        repo.expect_record_vote()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection reset")));
        let engine = TallyEngine::new(Arc::new(repo));

        let err = engine.record(new_vote("a", "b")).await.unwrap_err();
        assert_eq!(err, AppError::VoteWriteFailure("connection reset".into()));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn recorded_vote_is_returned() {
        let mut repo = MockPhotoRepo::new();
        repo.expect_record_vote()
            .withf(|v| v.winner_photo_id.as_str() == "a" && v.loser_photo_id.as_str() == "b")
            .times(1)
            .returning(|_| Ok(vote("a", "b")));
        let engine = TallyEngine::new(Arc::new(repo));

        let recorded = engine.record(new_vote("a", "b")).await.unwrap();
        assert_eq!(recorded.winner_photo_id.as_str(), "a");
        assert_eq!(recorded.loser_photo_id.as_str(), "b");
    }
}
