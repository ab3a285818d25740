//! Fan-in join: merge keyed, independently completing fetches into one
//! aggregate.
//!
//! A join is created for a fixed key set and a generation token. Branch
//! results may arrive in any order; the aggregate is promoted exactly once,
//! when the last outstanding key resolves, and is concatenated in key
//! issue order regardless of arrival order. When the key set changes the
//! caller builds a fresh join under a new token, so branches of the old
//! join are discarded before they reach this type.

use crate::error::ApiError;
use crate::staleness::Token;
use std::collections::HashMap;
use std::hash::Hash;

/// What a branch result did to the join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinProgress<T> {
    /// Merged; `remaining` branches are still outstanding.
    Pending { remaining: usize },
    /// Last branch merged: the aggregate in key order.
    Complete(Vec<T>),
    /// A branch failed before the aggregate was committed.
    Failed(ApiError),
    /// Duplicate key, unknown key, or the join already settled.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Open,
    Committed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanInJoin<K: Eq + Hash, T> {
    token: Token,
    keys: Vec<K>,
    partial: HashMap<K, Vec<T>>,
    remaining: usize,
    outcome: Outcome,
}

impl<K, T> FanInJoin<K, T>
where
    K: Clone + Eq + Hash,
    T: Clone,
{
    /// Start a join over `keys` (duplicates are collapsed, first position
    /// wins).
    pub fn new(token: Token, keys: impl IntoIterator<Item = K>) -> Self {
        let mut unique: Vec<K> = Vec::new();
        for key in keys {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }
        let remaining = unique.len();
        Self {
            token,
            keys: unique,
            partial: HashMap::new(),
            remaining,
            outcome: Outcome::Open,
        }
    }

    #[must_use]
    pub const fn token(&self) -> &Token {
        &self.token
    }

    #[must_use]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }

    /// An empty key set completes without any network round trip.
    #[must_use]
    pub fn immediate(&self) -> Option<Vec<T>> {
        self.keys.is_empty().then(Vec::new)
    }

    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !matches!(self.outcome, Outcome::Open)
    }

    /// Merge one branch result.
    pub fn accept(&mut self, key: &K, result: Result<Vec<T>, ApiError>) -> JoinProgress<T> {
        if !self.keys.contains(key) || self.partial.contains_key(key) {
            return JoinProgress::Ignored;
        }

        self.remaining = self.remaining.saturating_sub(1);

        match result {
            Ok(items) => {
                self.partial.insert(key.clone(), items);
            }
            Err(err) => {
                self.partial.insert(key.clone(), Vec::new());
                if matches!(self.outcome, Outcome::Open) {
                    self.outcome = Outcome::Failed;
                    return JoinProgress::Failed(err);
                }
                return JoinProgress::Ignored;
            }
        }

        match self.outcome {
            Outcome::Open if self.remaining == 0 => {
                self.outcome = Outcome::Committed;
                JoinProgress::Complete(self.flatten())
            }
            Outcome::Open => JoinProgress::Pending {
                remaining: self.remaining,
            },
            Outcome::Committed | Outcome::Failed => JoinProgress::Ignored,
        }
    }

    fn flatten(&self) -> Vec<T> {
        self.keys
            .iter()
            .filter_map(|key| self.partial.get(key))
            .flat_map(|items| items.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staleness::{Generations, Stream};

    fn join(keys: &[u32]) -> FanInJoin<u32, &'static str> {
        let mut generations = Generations::default();
        FanInJoin::new(generations.next(Stream::MemberRefresh), keys.iter().copied())
    }

    #[test]
    fn completes_in_key_order_regardless_of_arrival() {
        let mut j = join(&[1, 2]);
        assert_eq!(
            j.accept(&2, Ok(vec!["b1", "b2"])),
            JoinProgress::Pending { remaining: 1 }
        );
        assert_eq!(
            j.accept(&1, Ok(vec!["a1"])),
            JoinProgress::Complete(vec!["a1", "b1", "b2"])
        );
        assert!(j.is_settled());
    }

    #[test]
    fn empty_key_set_is_immediately_loaded() {
        let j = join(&[]);
        assert_eq!(j.immediate(), Some(Vec::new()));
        assert_eq!(j.remaining(), 0);
    }

    #[test]
    fn duplicate_and_unknown_keys_are_ignored() {
        let mut j = join(&[1, 2]);
        assert_eq!(j.accept(&1, Ok(vec!["a"])), JoinProgress::Pending { remaining: 1 });
        assert_eq!(j.accept(&1, Ok(vec!["again"])), JoinProgress::Ignored);
        assert_eq!(j.accept(&9, Ok(vec!["x"])), JoinProgress::Ignored);
        assert_eq!(j.remaining(), 1);
    }

    #[test]
    fn first_failure_wins_and_blocks_promotion() {
        let mut j = join(&[1, 2, 3]);
        assert_eq!(j.accept(&1, Ok(vec!["a"])), JoinProgress::Pending { remaining: 2 });
        assert!(matches!(
            j.accept(&2, Err(ApiError::new(500, "boom"))),
            JoinProgress::Failed(_)
        ));
        assert_eq!(j.accept(&3, Ok(vec!["c"])), JoinProgress::Ignored);
        assert_eq!(j.remaining(), 0);
    }

    #[test]
    fn duplicate_keys_in_key_set_collapse() {
        let j = join(&[3, 1, 3]);
        assert_eq!(j.keys(), &[3, 1]);
        assert_eq!(j.remaining(), 2);
    }
}
