//! # Domain Models
//!
//! These structs represent the core entities of Photo Battle.
//! Identifiers are opaque strings; freshly minted ones are UUID v7 so they
//! sort by creation time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::tally::Tally;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mints a new time-ordered identifier.
            pub fn generate() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

opaque_id!(
    /// Identifier of an uploaded photo.
    PhotoId
);
opaque_id!(
    /// Identifier of a group (one voting arena).
    GroupId
);
opaque_id!(
    /// Identifier of a user profile (uploader or voter).
    UserId
);
opaque_id!(
    /// Identifier of a recorded vote.
    VoteId
);

/// A photo competing in its group's battles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    pub group_id: GroupId,
    pub owner_id: UserId,
    pub title: Option<String>,
    pub image_url: String,
    /// Battles this photo appeared in with a recorded outcome
    pub votes_count: u32,
    /// Battles this photo won; never exceeds `votes_count`
    pub wins_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    pub fn tally(&self) -> Tally {
        Tally {
            votes_count: self.votes_count,
            wins_count: self.wins_count,
        }
    }
}

/// Payload for storing a freshly uploaded photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPhoto {
    pub group_id: GroupId,
    pub owner_id: UserId,
    pub title: Option<String>,
    pub image_url: String,
}

/// An immutable entry of the append-only vote log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub group_id: GroupId,
    pub voter_id: UserId,
    pub winner_photo_id: PhotoId,
    pub loser_photo_id: PhotoId,
    pub created_at: DateTime<Utc>,
}

/// A vote that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVote {
    pub group_id: GroupId,
    pub voter_id: UserId,
    pub winner_photo_id: PhotoId,
    pub loser_photo_id: PhotoId,
}

impl NewVote {
    /// Builds the vote for picking `winner` out of `pair`; the other photo loses.
    pub fn from_choice(
        group_id: GroupId,
        voter_id: UserId,
        pair: &BattlePair,
        winner: &PhotoId,
    ) -> Result<Self> {
        let loser = pair.opponent_of(winner).ok_or_else(|| {
            AppError::ValidationError(format!("photo {winner} is not part of the current battle"))
        })?;
        Ok(Self {
            group_id,
            voter_id,
            winner_photo_id: winner.clone(),
            loser_photo_id: loser.id.clone(),
        })
    }

    /// Checks the parts of the vote invariant that need no storage lookup.
    pub fn validate(&self) -> Result<()> {
        if self.group_id.is_blank() || self.voter_id.is_blank() {
            return Err(AppError::ValidationError(
                "group and voter are required".to_string(),
            ));
        }
        if self.winner_photo_id.is_blank() || self.loser_photo_id.is_blank() {
            return Err(AppError::ValidationError(
                "winner and loser photos are required".to_string(),
            ));
        }
        if self.winner_photo_id == self.loser_photo_id {
            return Err(AppError::ValidationError(format!(
                "photo {} cannot battle itself",
                self.winner_photo_id
            )));
        }
        Ok(())
    }
}

/// Two distinct photos presented together for a single vote.
///
/// Order carries no meaning; `first`/`second` only reflect the shuffle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BattlePair {
    first: Photo,
    second: Photo,
}

impl BattlePair {
    /// Returns `None` when both photos share an id.
    pub fn new(first: Photo, second: Photo) -> Option<Self> {
        if first.id == second.id {
            return None;
        }
        Some(Self { first, second })
    }

    pub fn photos(&self) -> [&Photo; 2] {
        [&self.first, &self.second]
    }

    pub fn contains(&self, id: &PhotoId) -> bool {
        self.first.id == *id || self.second.id == *id
    }

    /// The other photo of the pair, if `id` is one of them.
    pub fn opponent_of(&self, id: &PhotoId) -> Option<&Photo> {
        if self.first.id == *id {
            Some(&self.second)
        } else if self.second.id == *id {
            Some(&self.first)
        } else {
            None
        }
    }

    /// True when both pairs hold the same two photos, in any order.
    pub fn same_matchup(&self, other: &BattlePair) -> bool {
        self.contains(&other.first.id) && self.contains(&other.second.id)
    }
}

/// A named voting arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub photo_count: u32,
}

impl Group {
    /// Case-insensitive substring match on name or description.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}

/// Keeps the groups whose name or description contains `query`.
pub fn search_groups(groups: Vec<Group>, query: &str) -> Vec<Group> {
    groups.into_iter().filter(|g| g.matches(query)).collect()
}

/// Payload for creating a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_public")]
    pub is_public: bool,
    pub created_by: UserId,
}

fn default_public() -> bool {
    true
}

impl NewGroup {
    /// Trims the text fields, rejects a blank name, drops a blank description.
    pub fn normalized(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::ValidationError("group name is required".into()));
        }
        if self.created_by.is_blank() {
            return Err(AppError::ValidationError("group creator is required".into()));
        }
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Ok(Self {
            name,
            description,
            is_public: self.is_public,
            created_by: self.created_by,
        })
    }
}
