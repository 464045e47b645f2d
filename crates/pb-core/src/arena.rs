//! # Arena
//!
//! Drives [`BattleSession`]s against storage. Session locks are held only
//! while the state machine moves, never across a storage call, so a session
//! stays readable while its fetch or vote is in flight.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::BattleConfig;
use crate::error::{AppError, Result};
use crate::models::{GroupId, Photo, PhotoId, UserId, Vote};
use crate::selector::BattleSelector;
use crate::session::{BattleSession, RoundTicket, VoteResolution, VoteTicket};
use crate::tally::TallyEngine;
use crate::traits::PhotoRepo;

/// A session shared between request handlers and background work.
pub type SharedSession = Arc<Mutex<BattleSession>>;

#[derive(Clone)]
pub struct Arena {
    repo: Arc<dyn PhotoRepo>,
    tally: TallyEngine,
    config: BattleConfig,
}

impl Arena {
    pub fn new(repo: Arc<dyn PhotoRepo>, config: BattleConfig) -> Self {
        Self {
            tally: TallyEngine::new(repo.clone()),
            repo,
            config,
        }
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn open_session(&self, group_id: GroupId, voter_id: UserId) -> SharedSession {
        self.open_session_with(group_id, voter_id, BattleSelector::from_entropy())
    }

    pub fn open_session_with(
        &self,
        group_id: GroupId,
        voter_id: UserId,
        selector: BattleSelector,
    ) -> SharedSession {
        Arc::new(Mutex::new(BattleSession::new(group_id, voter_id, selector)))
    }

    /// Fetches a fresh pool and draws the next pair ("Next Battle").
    pub async fn next_round(&self, session: &Mutex<BattleSession>) -> Result<()> {
        let ticket = session.lock().await.begin_round()?;
        self.load_round(session, ticket).await;
        Ok(())
    }

    /// Moves the session to `Voting`. Fails fast on bad choices or a vote in flight.
    pub async fn start_vote(&self, session: &Mutex<BattleSession>, winner: &PhotoId) -> Result<VoteTicket> {
        session.lock().await.begin_vote(winner)
    }

    /// Persists a started vote, then paces into the next round.
    pub async fn settle_vote(&self, session: &Mutex<BattleSession>, ticket: VoteTicket) -> Result<Vote> {
        let outcome = self.tally.record(ticket.vote().clone()).await;
        let resolution = session.lock().await.finish_vote(ticket, outcome);

        match resolution {
            VoteResolution::Recorded { vote, next_round } => {
                tokio::time::sleep(self.config.next_round_delay()).await;
                self.load_round(session, next_round).await;
                Ok(vote)
            }
            VoteResolution::Failed(err) => Err(err),
            VoteResolution::Ignored(outcome) => outcome,
        }
    }

    /// Start and settle in one go.
    pub async fn vote(&self, session: &Mutex<BattleSession>, winner: &PhotoId) -> Result<Vote> {
        let ticket = self.start_vote(session, winner).await?;
        self.settle_vote(session, ticket).await
    }

    pub async fn leaderboard(&self, group_id: &GroupId) -> Result<Vec<Photo>> {
        self.repo
            .leaderboard(group_id, self.config.leaderboard_limit)
            .await
            .map_err(AppError::fetch)
    }

    async fn load_round(&self, session: &Mutex<BattleSession>, ticket: RoundTicket) {
        let group_id = {
            let guard = session.lock().await;
            if guard.is_closed() {
                return;
            }
            guard.group_id().clone()
        };

        let pool = self
            .repo
            .fetch_candidate_pool(&group_id, self.config.pool_limit)
            .await
            .map_err(|err| {
                warn!(group_id = %group_id, error = %err, "candidate pool fetch failed");
                AppError::fetch(err)
            });

        if let Ok(pool) = &pool {
            info!(group_id = %group_id, candidates = pool.len(), "candidate pool fetched");
        }
        session.lock().await.finish_round(ticket, pool);
    }
}
