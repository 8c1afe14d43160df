// 🔢 Account Number Generator
//
// Produces an account number that is free within one bank. Candidates come
// from either a per-bank sequence or a 12-digit random draw; every candidate
// is checked against the bank's existing numbers and the search gives up
// after a bounded number of attempts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::entities::AccountNumber;

/// Smallest and largest 12-digit account numbers
pub const RANDOM_MIN: AccountNumber = 100_000_000_000;
pub const RANDOM_MAX: AccountNumber = 999_999_999_999;

// ============================================================================
// STRATEGY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberingStrategy {
    /// max(existing) + 1, then +1 on every collision
    #[default]
    Sequential,

    /// Uniform 12-digit draw, redrawn on collision
    Random,
}

impl std::str::FromStr for NumberingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(NumberingStrategy::Sequential),
            "random" => Ok(NumberingStrategy::Random),
            other => Err(format!("unknown numbering strategy: {}", other)),
        }
    }
}

/// The generator could not find a free number within `attempts` tries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted {
    pub attempts: u32,
}

// ============================================================================
// GENERATOR
// ============================================================================

pub struct AccountNumberGenerator {
    strategy: NumberingStrategy,
    first_number: AccountNumber,
    max_attempts: u32,
    rng: Mutex<StdRng>,
}

impl AccountNumberGenerator {
    /// Generator with an entropy-seeded random source
    pub fn new(
        strategy: NumberingStrategy,
        first_number: AccountNumber,
        max_attempts: u32,
    ) -> Self {
        Self::with_rng(strategy, first_number, max_attempts, StdRng::from_entropy())
    }

    /// Generator with a fixed seed, for reproducible tests
    pub fn seeded(
        strategy: NumberingStrategy,
        first_number: AccountNumber,
        max_attempts: u32,
        seed: u64,
    ) -> Self {
        Self::with_rng(strategy, first_number, max_attempts, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        strategy: NumberingStrategy,
        first_number: AccountNumber,
        max_attempts: u32,
        rng: StdRng,
    ) -> Self {
        AccountNumberGenerator {
            strategy,
            first_number,
            max_attempts: max_attempts.max(1),
            rng: Mutex::new(rng),
        }
    }

    /// Pick a number not in `existing`.
    ///
    /// The caller must hold whatever lock keeps `existing` current for the
    /// bank until the new account is saved.
    pub fn allocate(&self, existing: &HashSet<AccountNumber>) -> Result<AccountNumber, Exhausted> {
        match self.strategy {
            NumberingStrategy::Sequential => self.allocate_sequential(existing),
            NumberingStrategy::Random => self.allocate_random(existing),
        }
    }

    fn allocate_sequential(
        &self,
        existing: &HashSet<AccountNumber>,
    ) -> Result<AccountNumber, Exhausted> {
        let mut candidate = match existing.iter().max() {
            Some(max) => max.checked_add(1),
            None => Some(self.first_number),
        };

        for _ in 0..self.max_attempts {
            let Some(number) = candidate else { break };
            if !existing.contains(&number) {
                return Ok(number);
            }
            candidate = number.checked_add(1);
        }

        Err(Exhausted {
            attempts: self.max_attempts,
        })
    }

    fn allocate_random(
        &self,
        existing: &HashSet<AccountNumber>,
    ) -> Result<AccountNumber, Exhausted> {
        // A poisoned rng is still a valid rng
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());

        for _ in 0..self.max_attempts {
            let number = rng.gen_range(RANDOM_MIN..=RANDOM_MAX);
            if !existing.contains(&number) {
                return Ok(number);
            }
        }

        Err(Exhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for AccountNumberGenerator {
    fn default() -> Self {
        Self::new(NumberingStrategy::Sequential, 1000, 32)
    }
}

// ============================================================================
// TESTS
// ============================================================================
