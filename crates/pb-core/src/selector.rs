//! Battle selection: draws two distinct photos from a candidate pool.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::{AppError, Result};
use crate::models::{BattlePair, Photo};

/// Shuffles the pool uniformly and takes the first two photos.
///
/// Photos sharing an id are collapsed first, so a pool needs two *distinct*
/// photos; anything less yields [`AppError::EmptyPool`].
pub fn select_pair<R: Rng + ?Sized>(pool: Vec<Photo>, rng: &mut R) -> Result<BattlePair> {
    let mut seen = HashSet::with_capacity(pool.len());
    let mut candidates: Vec<Photo> = pool
        .into_iter()
        .filter(|photo| seen.insert(photo.id.clone()))
        .collect();

    if candidates.len() < 2 {
        return Err(AppError::EmptyPool);
    }

    candidates.shuffle(rng);

    let mut drawn = candidates.into_iter();
    match (drawn.next(), drawn.next()) {
        (Some(first), Some(second)) => BattlePair::new(first, second).ok_or(AppError::EmptyPool),
        _ => Err(AppError::EmptyPool),
    }
}

/// Owns the randomness for one session's selections.
#[derive(Debug, Clone)]
pub struct BattleSelector {
    rng: StdRng,
}

impl BattleSelector {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic selector, for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn select(&mut self, pool: Vec<Photo>) -> Result<BattlePair> {
        select_pair(pool, &mut self.rng)
    }
}

impl Default for BattleSelector {
    fn default() -> Self {
        Self::from_entropy()
    }
}
