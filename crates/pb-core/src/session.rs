//! # Battle Session
//!
//! One user's walk through one group's arena, modeled as an explicit state
//! machine owned by the session:
//!
//! ```text
//! Loading ──▶ BattleReady ──▶ Voting ──▶ Loading ──▶ BattleReady ...
//!    │                          │
//!    ├──▶ Empty                 └──▶ Failed (same pair, vote again to retry)
//!    └──▶ Failed (fetch)
//! ```
//!
//! Work that suspends (fetching a pool, writing a vote) is split in two:
//! `begin_*` hands out a ticket and `finish_*` applies the result. A result
//! whose ticket is stale, or that lands after [`BattleSession::close`], is
//! dropped without touching the state.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{AppError, FailureKind, Result};
use crate::models::{BattlePair, GroupId, NewVote, Photo, PhotoId, UserId, Vote};
use crate::selector::BattleSelector;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    /// Fetching candidates. `previous` is the pair on screen before the fetch.
    Loading { previous: Option<BattlePair> },
    /// Fewer than two photos in the group; stays until the next refresh.
    Empty,
    BattleReady { pair: BattlePair },
    /// A vote is awaiting confirmation; controls are disabled.
    Voting { pair: BattlePair, winner: PhotoId },
    /// The last operation failed. With a pair, voting again retries.
    Failed {
        pair: Option<BattlePair>,
        kind: FailureKind,
        message: String,
    },
    Closed,
}

impl SessionState {
    /// The pair currently on screen, if any.
    pub fn pair(&self) -> Option<&BattlePair> {
        match self {
            SessionState::BattleReady { pair } | SessionState::Voting { pair, .. } => Some(pair),
            SessionState::Loading { previous } => previous.as_ref(),
            SessionState::Failed { pair, .. } => pair.as_ref(),
            SessionState::Empty | SessionState::Closed => None,
        }
    }

    pub fn can_vote(&self) -> bool {
        matches!(
            self,
            SessionState::BattleReady { .. } | SessionState::Failed { pair: Some(_), .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A dismissible message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    fn success(title: &str, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.to_string(),
            description: description.into(),
        }
    }

    fn error(title: &str, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.to_string(),
            description: description.into(),
        }
    }
}

/// Proof that a pool fetch was requested for a given round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTicket {
    round: u64,
}

/// Proof that a vote was submitted; carries the vote to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTicket {
    round: u64,
    vote: NewVote,
}

impl VoteTicket {
    pub fn vote(&self) -> &NewVote {
        &self.vote
    }
}

/// What became of a submitted vote.
#[derive(Debug)]
pub enum VoteResolution {
    /// Persisted. The session is loading; `next_round` fetches the new pair.
    Recorded { vote: Vote, next_round: RoundTicket },
    /// Not persisted. The pair stays up for a retry.
    Failed(AppError),
    /// The session moved on (closed) before the result arrived.
    Ignored(Result<Vote>),
}

/// Point-in-time view handed to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub group_id: GroupId,
    pub voter_id: UserId,
    pub state: SessionState,
    pub can_vote: bool,
    pub notifications: Vec<Notification>,
}

pub struct BattleSession {
    group_id: GroupId,
    voter_id: UserId,
    state: SessionState,
    selector: BattleSelector,
    notifications: Vec<Notification>,
    round: u64,
    last_active: Instant,
}

impl BattleSession {
    pub fn new(group_id: GroupId, voter_id: UserId, selector: BattleSelector) -> Self {
        Self {
            group_id,
            voter_id,
            state: SessionState::Loading { previous: None },
            selector,
            notifications: Vec::new(),
            round: 0,
            last_active: Instant::now(),
        }
    }

    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    pub fn voter_id(&self) -> &UserId {
        &self.voter_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }

    /// Time since the voter last started a round, voted or looked at the session.
    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Starts a new round. Refused while a vote is in flight.
    pub fn begin_round(&mut self) -> Result<RoundTicket> {
        match self.state {
            SessionState::Closed => return Err(AppError::SessionClosed),
            SessionState::Voting { .. } => return Err(AppError::VoteInFlight),
            _ => {}
        }
        self.touch();
        self.round += 1;
        let previous = self.state.pair().cloned();
        self.state = SessionState::Loading { previous };
        Ok(RoundTicket { round: self.round })
    }

    /// Applies a fetched pool. Returns `false` when the ticket was stale.
    pub fn finish_round(&mut self, ticket: RoundTicket, pool: Result<Vec<Photo>>) -> bool {
        if self.is_closed() || ticket.round != self.round {
            debug!(group_id = %self.group_id, round = ticket.round, "dropping stale round result");
            return false;
        }
        let previous = match &self.state {
            SessionState::Loading { previous } => previous.clone(),
            _ => return false,
        };

        self.state = match pool.and_then(|pool| self.selector.select(pool)) {
            Ok(pair) => SessionState::BattleReady { pair },
            Err(AppError::EmptyPool) => {
                self.notifications.push(Notification::error(
                    "Not enough photos",
                    "This group needs at least 2 photos to start battles!",
                ));
                SessionState::Empty
            }
            Err(err) => {
                let message = err.to_string();
                self.notifications
                    .push(Notification::error("Failed to load photos", message.clone()));
                SessionState::Failed {
                    pair: previous,
                    kind: FailureKind::Fetch,
                    message,
                }
            }
        };
        true
    }

    /// Locks in the user's choice and disables voting until it resolves.
    pub fn begin_vote(&mut self, winner: &PhotoId) -> Result<VoteTicket> {
        let pair = match &self.state {
            SessionState::Closed => return Err(AppError::SessionClosed),
            SessionState::Voting { .. } => return Err(AppError::VoteInFlight),
            SessionState::BattleReady { pair } | SessionState::Failed { pair: Some(pair), .. } => {
                pair.clone()
            }
            _ => {
                return Err(AppError::ValidationError(
                    "no battle is ready to vote on".to_string(),
                ))
            }
        };

        let vote = NewVote::from_choice(self.group_id.clone(), self.voter_id.clone(), &pair, winner)?;
        self.touch();
        self.state = SessionState::Voting {
            pair,
            winner: winner.clone(),
        };
        Ok(VoteTicket {
            round: self.round,
            vote,
        })
    }

    /// Applies the outcome of the vote write.
    pub fn finish_vote(&mut self, ticket: VoteTicket, outcome: Result<Vote>) -> VoteResolution {
        if self.is_closed() || ticket.round != self.round {
            debug!(group_id = %self.group_id, round = ticket.round, "dropping stale vote result");
            return VoteResolution::Ignored(outcome);
        }
        let pair = match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Voting { pair, .. } => pair,
            other => {
                self.state = other;
                return VoteResolution::Ignored(outcome);
            }
        };

        match outcome {
            Ok(vote) => {
                self.notifications.push(Notification::success(
                    "Vote recorded!",
                    "Your battle choice has been saved",
                ));
                self.round += 1;
                self.state = SessionState::Loading {
                    previous: Some(pair),
                };
                VoteResolution::Recorded {
                    vote,
                    next_round: RoundTicket { round: self.round },
                }
            }
            Err(err) => {
                let message = err.to_string();
                self.notifications
                    .push(Notification::error("Failed to record vote", message.clone()));
                self.state = SessionState::Failed {
                    pair: Some(pair),
                    kind: FailureKind::VoteWrite,
                    message,
                };
                VoteResolution::Failed(err)
            }
        }
    }

    /// Tears the session down; anything still in flight is ignored on arrival.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
        self.notifications.clear();
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Current state plus any notifications not yet shown.
    pub fn snapshot(&mut self) -> SessionSnapshot {
        self.touch();
        SessionSnapshot {
            group_id: self.group_id.clone(),
            voter_id: self.voter_id.clone(),
            state: self.state.clone(),
            can_vote: self.state.can_vote(),
            notifications: self.take_notifications(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{photo, vote};

    fn session() -> BattleSession {
        BattleSession::new("g1".into(), "u1".into(), BattleSelector::seeded(11))
    }

    fn ready_session() -> (BattleSession, BattlePair) {
        let mut s = session();
        let t = s.begin_round().unwrap();
        assert!(s.finish_round(t, Ok(vec![photo("p1", "g1"), photo("p2", "g1")])));
        let pair = s.state().pair().cloned().unwrap();
        (s, pair)
    }

    #[test]
    fn starts_loading() {
        let s = session();
        assert_eq!(s.state(), &SessionState::Loading { previous: None });
        assert!(!s.state().can_vote());
    }

    #[test]
    fn small_pool_lands_in_empty() {
        let mut s = session();
        let t = s.begin_round().unwrap();
        s.finish_round(t, Ok(vec![photo("p1", "g1")]));

        assert_eq!(s.state(), &SessionState::Empty);
        let notes = s.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Not enough photos");
    }

    #[test]
    fn fetch_failure_keeps_previous_pair() {
        let (mut s, pair) = ready_session();
        let t = s.begin_round().unwrap();
        s.finish_round(t, Err(AppError::FetchFailure("timeout".into())));

        match s.state() {
            SessionState::Failed { pair: shown, kind, .. } => {
                assert_eq!(shown.as_ref(), Some(&pair));
                assert_eq!(*kind, FailureKind::Fetch);
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert!(s.state().can_vote());
    }

    #[test]
    fn vote_for_photo_outside_pair_is_rejected() {
        let (mut s, pair) = ready_session();
        let err = s.begin_vote(&"p9".into()).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(s.state(), &SessionState::BattleReady { pair });
    }

    #[test]
    fn second_vote_while_voting_is_refused() {
        let (mut s, _) = ready_session();
        let ticket = s.begin_vote(&"p1".into()).unwrap();
        assert_eq!(ticket.vote().loser_photo_id.as_str(), "p2");

        assert_eq!(s.begin_vote(&"p2".into()), Err(AppError::VoteInFlight));
        assert_eq!(s.begin_round(), Err(AppError::VoteInFlight));
        assert!(!s.state().can_vote());
    }

    #[test]
    fn failed_vote_keeps_pair_and_allows_retry() {
        let (mut s, pair) = ready_session();
        let ticket = s.begin_vote(&"p1".into()).unwrap();
        let resolution = s.finish_vote(ticket, Err(AppError::VoteWriteFailure("offline".into())));

        assert!(matches!(resolution, VoteResolution::Failed(AppError::VoteWriteFailure(_))));
        assert_eq!(s.state().pair(), Some(&pair));
        assert!(s.state().can_vote());
        assert_eq!(s.take_notifications()[0].title, "Failed to record vote");

        let retry = s.begin_vote(&"p1".into()).unwrap();
        assert_eq!(retry.vote().winner_photo_id.as_str(), "p1");
    }

    #[test]
    fn recorded_vote_moves_to_next_round() {
        let (mut s, pair) = ready_session();
        let ticket = s.begin_vote(&"p2".into()).unwrap();
        let resolution = s.finish_vote(ticket, Ok(vote("p2", "p1")));

        let next_round = match resolution {
            VoteResolution::Recorded { vote, next_round } => {
                assert_eq!(vote.winner_photo_id.as_str(), "p2");
                next_round
            }
            other => panic!("unexpected resolution {other:?}"),
        };
        assert_eq!(s.state(), &SessionState::Loading { previous: Some(pair) });
        assert_eq!(s.take_notifications()[0].title, "Vote recorded!");

        assert!(s.finish_round(
            next_round,
            Ok(vec![photo("p3", "g1"), photo("p4", "g1")])
        ));
        assert!(s.state().can_vote());
    }

    #[test]
    fn superseded_round_is_dropped() {
        let mut s = session();
        let stale = s.begin_round().unwrap();
        let fresh = s.begin_round().unwrap();

        assert!(!s.finish_round(stale, Ok(vec![photo("p1", "g1"), photo("p2", "g1")])));
        assert_eq!(s.state(), &SessionState::Loading { previous: None });
        assert!(s.finish_round(fresh, Ok(vec![photo("p3", "g1"), photo("p4", "g1")])));
    }

    #[test]
    fn results_after_close_are_ignored() {
        let (mut s, _) = ready_session();
        let ticket = s.begin_vote(&"p1".into()).unwrap();
        s.close();

        let resolution = s.finish_vote(ticket, Ok(vote("p1", "p2")));
        assert!(matches!(resolution, VoteResolution::Ignored(Ok(_))));
        assert_eq!(s.state(), &SessionState::Closed);
        assert_eq!(s.begin_round(), Err(AppError::SessionClosed));
        assert!(s.take_notifications().is_empty());
    }

    #[test]
    fn snapshot_drains_notifications() {
        let mut s = session();
        let t = s.begin_round().unwrap();
        s.finish_round(t, Ok(vec![]));

        let first = s.snapshot();
        assert_eq!(first.notifications.len(), 1);
        assert!(!first.can_vote);
        assert!(s.snapshot().notifications.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn activity_resets_the_idle_clock() {
        let (mut s, _) = ready_session();
        tokio::time::advance(Duration::from_secs(90)).await;
        assert!(s.idle_for() >= Duration::from_secs(90));

        s.snapshot();
        assert!(s.idle_for() < Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(30)).await;
        s.begin_vote(&"p2".into()).unwrap();
        assert!(s.idle_for() < Duration::from_secs(1));
    }
}
