//! photo-battle/crates/pb-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Photo Battle:
//! pairing photos for head-to-head battles and tallying the outcomes.

pub mod arena;
pub mod config;
pub mod error;
pub mod models;
pub mod selector;
pub mod session;
pub mod tally;
pub mod traits;

// Re-exporting for easier access in other crates
pub use arena::*;
pub use config::*;
pub use error::*;
pub use models::*;
pub use selector::*;
pub use session::*;
pub use tally::*;
pub use traits::*;

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{NewVote, Photo, Vote, VoteId};

    pub fn photo(id: &str, group: &str) -> Photo {
        Photo {
            id: id.into(),
            group_id: group.into(),
            owner_id: "owner".into(),
            title: None,
            image_url: format!("https://img.example/{id}.jpg"),
            votes_count: 0,
            wins_count: 0,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn new_vote(winner: &str, loser: &str) -> NewVote {
        NewVote {
            group_id: "g1".into(),
            voter_id: "u1".into(),
            winner_photo_id: winner.into(),
            loser_photo_id: loser.into(),
        }
    }

    pub fn vote(winner: &str, loser: &str) -> Vote {
        let draft = new_vote(winner, loser);
        Vote {
            id: VoteId::generate(),
            group_id: draft.group_id,
            voter_id: draft.voter_id,
            winner_photo_id: draft.winner_photo_id,
            loser_photo_id: draft.loser_photo_id,
            created_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::photo;
    use super::models::*;

    #[test]
    fn pair_of_same_photo_is_refused() {
        assert!(BattlePair::new(photo("p1", "g1"), photo("p1", "g1")).is_none());
    }

    #[test]
    fn opponent_is_the_other_side() {
        let pair = BattlePair::new(photo("p1", "g1"), photo("p2", "g1")).unwrap();
        assert_eq!(pair.opponent_of(&"p1".into()).map(|p| p.id.as_str()), Some("p2"));
        assert_eq!(pair.opponent_of(&"p2".into()).map(|p| p.id.as_str()), Some("p1"));
        assert!(pair.opponent_of(&"p3".into()).is_none());
    }

    #[test]
    fn blank_ids_fail_validation() {
        let vote = NewVote {
            group_id: "g1".into(),
            voter_id: " ".into(),
            winner_photo_id: "a".into(),
            loser_photo_id: "b".into(),
        };
        assert!(vote.validate().is_err());
    }

    #[test]
    fn group_search_is_case_insensitive() {
        let group = Group {
            id: GroupId::generate(),
            name: "Sunset Shooters".into(),
            description: Some("Golden hour only".into()),
            is_public: true,
            created_by: "u1".into(),
            created_at: chrono::Utc::now(),
            photo_count: 0,
        };
        assert!(group.matches("sunset"));
        assert!(group.matches("GOLDEN"));
        assert!(group.matches("  "));
        assert!(!group.matches("macro"));
        assert_eq!(search_groups(vec![group], "hour").len(), 1);
    }

    #[test]
    fn new_group_is_trimmed() {
        let group = NewGroup {
            name: "  Street  ".into(),
            description: Some("   ".into()),
            is_public: false,
            created_by: "u1".into(),
        }
        .normalized()
        .unwrap();
        assert_eq!(group.name, "Street");
        assert_eq!(group.description, None);

        let blank = NewGroup {
            name: "   ".into(),
            description: None,
            is_public: true,
            created_by: "u1".into(),
        };
        assert!(blank.normalized().is_err());
    }
}
