//! # leaderboard
//!
//! A live leaderboard over a bounded score range, shared between request
//! handlers and background updaters.
//!
//! ## Architecture
//!
//! - [`RankIndex`]: one [`bucket_rank::ScoreBook`] behind a reader/writer lock.
//!   Updates take the lock exclusively; rank, lookup, listing and search
//!   queries share it.
//! - [`seed`]: fills an index at startup.
//! - [`simulate`]: background thread issuing random updates on a timer.
//! - [`service`] and [`server`]: the HTTP surface.
//!
//! ## Example
//!
//! ```rust
//! use leaderboard::RankIndex;
//!
//! let index = RankIndex::new();
//! index.upsert("rahul", 4600);
//! index.upsert("rahul_burman", 3900);
//! index.upsert("rahul_mathur", 3900);
//!
//! assert_eq!(index.get_user("rahul_mathur").map(|u| u.rank), Some(2));
//! assert_eq!(index.rank(4000), 2);
//! assert_eq!(index.top_users(10).len(), 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod seed;
pub mod server;
pub mod service;
pub mod simulate;

pub use bucket_rank::{
    Score, ScoreBook, ScoreRange, MAX_RANGE_LEN, MAX_SCORE, MIN_SCORE, SEARCH_LIMIT,
};

use std::sync::atomic::{AtomicUsize, Ordering};

use bucket_rank::Ranked;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A user as reported to callers: current rating and the rank it earns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique key
    pub username: String,
    /// Current score, always inside the index's range
    pub rating: Score,
    /// 1-based competition rank
    pub rank: usize,
}

impl From<Ranked> for User {
    fn from(r: Ranked) -> Self {
        Self {
            username: r.username,
            rating: r.rating,
            rank: r.rank,
        }
    }
}

/// Errors raised while building an index configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The score bounds do not form a usable interval.
    #[error(
        "invalid score range [{min}, {max}]: need min <= max and at most {} scores",
        MAX_RANGE_LEN
    )]
    InvalidRange {
        /// Requested lower bound
        min: Score,
        /// Requested upper bound
        max: Score,
    },
}

/// Configuration for a [`RankIndex`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Score interval; ratings outside it are clamped
    pub range: ScoreRange,
    /// Maximum matches returned by [`RankIndex::search_users`]
    pub search_limit: usize,
    /// Initial capacity hint for number of users
    pub initial_capacity: usize,
}

impl Config {
    /// Default configuration over `[min, max]`.
    pub fn with_range(min: Score, max: Score) -> Result<Self, ConfigError> {
        let range = ScoreRange::new(min, max).ok_or(ConfigError::InvalidRange { min, max })?;
        Ok(Self {
            range,
            ..Self::default()
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            range: ScoreRange::DEFAULT,
            search_limit: SEARCH_LIMIT,
            initial_capacity: 1024,
        }
    }
}

/// Concurrency-safe ranking index.
///
/// All state lives in a single [`ScoreBook`] guarded by one lock, so every
/// public operation observes the user map, histogram and buckets as one
/// consistent unit. No sequence of calls is atomic as a whole.
pub struct RankIndex {
    inner: RwLock<ScoreBook>,
    /// Number of users, readable without taking the lock
    len: AtomicUsize,
    config: Config,
}

impl RankIndex {
    /// Create a new empty index with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new index with the given configuration.
    pub fn with_config(config: Config) -> Self {
        Self {
            inner: RwLock::new(ScoreBook::with_capacity(config.range, config.initial_capacity)),
            len: AtomicUsize::new(0),
            config,
        }
    }

    /// The configuration this index was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Score interval of this index.
    pub fn range(&self) -> ScoreRange {
        self.config.range
    }

    /// Set a user's rating, creating the user if needed.
    ///
    /// The rating is clamped into the range without complaint. Returns the
    /// previous rating if the user already existed.
    pub fn upsert(&self, username: &str, rating: Score) -> Option<Score> {
        let mut inner = self.inner.write();
        let old = inner.upsert(username, rating);
        if old.is_none() {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
        old
    }

    /// Remove a user. Returns the rating it held.
    pub fn remove(&self, username: &str) -> Option<Score> {
        let mut inner = self.inner.write();
        let old = inner.remove(username);
        if old.is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        old
    }

    /// Rank of an arbitrary rating, whether or not anyone holds it.
    pub fn rank(&self, rating: Score) -> usize {
        self.inner.read().rank(rating)
    }

    /// Look up a user's rating and rank.
    pub fn get_user(&self, username: &str) -> Option<User> {
        self.inner.read().get(username).map(User::from)
    }

    /// The best `limit` users, best first; ties share a rank.
    pub fn top_users(&self, limit: usize) -> Vec<User> {
        let inner = self.inner.read();
        inner.top(limit).into_iter().map(User::from).collect()
    }

    /// Case-insensitive substring search, capped at
    /// [`Config::search_limit`] matches in no particular order.
    pub fn search_users(&self, query: &str) -> Vec<User> {
        let inner = self.inner.read();
        inner
            .search(query, self.config.search_limit)
            .into_iter()
            .map(User::from)
            .collect()
    }

    /// Get the number of users in the index.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against a consistent snapshot of the whole book.
    pub fn with_book<R>(&self, f: impl FnOnce(&ScoreBook) -> R) -> R {
        let inner = self.inner.read();
        f(&*inner)
    }
}

impl Default for RankIndex {
    fn default() -> Self {
        Self::new()
    }
}
