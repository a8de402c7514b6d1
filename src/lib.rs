//! # bucket-rank
//!
//! A ranking index over a bounded integer score range.
//!
//! Every possible score owns one cell of a fixed-size histogram, so the rank
//! of any score is the number of users in the cells above it plus one. A
//! Fenwick tree over the histogram answers that sum in O(log range), and a
//! reverse index from score to usernames lets top-N listings walk the
//! histogram from the best score down without ever sorting the user set.
//!
//! Ranks use standard competition ranking: equal scores share a rank and the
//! next distinct score skips ahead by the size of the tie ("1, 1, 3").
//!
//! ## Example
//!
//! ```rust
//! use bucket_rank::ScoreBook;
//!
//! let mut book = ScoreBook::new();
//! book.upsert("a", 4600);
//! book.upsert("b", 3900);
//! book.upsert("c", 3900);
//! book.upsert("d", 1234);
//!
//! assert_eq!(book.rank(4600), 1);
//! assert_eq!(book.rank(3900), 2);
//! assert_eq!(book.rank(1234), 4);
//!
//! let ranks: Vec<usize> = book.top(4).iter().map(|u| u.rank).collect();
//! assert_eq!(ranks, vec![1, 2, 2, 4]);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Integer score. Stored scores always lie inside the book's [`ScoreRange`].
pub type Score = i64;

// =============================================================================
// Configuration
// =============================================================================

/// Lowest score of the default range.
pub const MIN_SCORE: Score = 100;
/// Highest score of the default range.
pub const MAX_SCORE: Score = 5000;
/// Default cap on the number of matches returned by a search.
pub const SEARCH_LIMIT: usize = 50;
/// Most distinct scores a range may hold. Each one costs a histogram cell and
/// a Fenwick cell.
pub const MAX_RANGE_LEN: usize = 1 << 24;

/// Closed interval `[min, max]` of representable scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScoreRange {
    min: Score,
    max: Score,
}

impl ScoreRange {
    /// `[100, 5000]`.
    pub const DEFAULT: ScoreRange = ScoreRange {
        min: MIN_SCORE,
        max: MAX_SCORE,
    };

    /// Returns `None` if `min > max` or the range holds more than
    /// [`MAX_RANGE_LEN`] scores.
    pub fn new(min: Score, max: Score) -> Option<Self> {
        if min > max {
            return None;
        }
        let span = usize::try_from(max.checked_sub(min)?).ok()?;
        if span >= MAX_RANGE_LEN {
            return None;
        }
        Some(Self { min, max })
    }

    #[inline]
    pub fn min(&self) -> Score {
        self.min
    }

    #[inline]
    pub fn max(&self) -> Score {
        self.max
    }

    /// Number of distinct scores in the range.
    #[inline]
    pub fn len(&self) -> usize {
        (self.max - self.min) as usize + 1
    }

    /// A range always holds at least one score.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn contains(&self, score: Score) -> bool {
        (self.min..=self.max).contains(&score)
    }

    /// Clamp an arbitrary rating into the range. Out-of-range input is never rejected.
    #[inline]
    pub fn clamp(&self, rating: Score) -> Score {
        rating.clamp(self.min, self.max)
    }

    /// Histogram cell of an in-range score.
    #[inline]
    fn index(&self, score: Score) -> usize {
        debug_assert!(self.contains(score));
        (score - self.min) as usize
    }

    #[inline]
    fn score_at(&self, idx: usize) -> Score {
        self.min + idx as Score
    }
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// =============================================================================
// Prefix sums
// =============================================================================

#[inline]
fn lowbit(i: usize) -> usize {
    i & i.wrapping_neg()
}

/// Fenwick tree mirroring the histogram, 1-indexed (`tree[0]` unused).
#[derive(Clone, Debug)]
struct PrefixSums {
    tree: Vec<usize>,
}

impl PrefixSums {
    fn new(n: usize) -> Self {
        Self {
            tree: vec![0; n + 1],
        }
    }

    #[inline]
    fn n(&self) -> usize {
        self.tree.len() - 1
    }

    fn increment(&mut self, i: usize) {
        let mut idx = i + 1;
        while idx <= self.n() {
            self.tree[idx] += 1;
            idx += lowbit(idx);
        }
    }

    fn decrement(&mut self, i: usize) {
        let mut idx = i + 1;
        while idx <= self.n() {
            self.tree[idx] -= 1;
            idx += lowbit(idx);
        }
    }

    /// Sum of cells `[0..=i]`.
    fn prefix(&self, i: usize) -> usize {
        let mut sum = 0;
        let mut idx = i + 1;
        while idx > 0 {
            sum += self.tree[idx];
            idx -= lowbit(idx);
        }
        sum
    }
}

// =============================================================================
// ScoreBook
// =============================================================================

/// A user with the rank derived from the book at the time of the query.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ranked {
    pub username: String,
    pub rating: Score,
    pub rank: usize,
}

/// Single-threaded ranking index.
///
/// Holds three views of the same data that are kept in lockstep by every
/// mutation:
///
/// - `scores`: username to current score.
/// - `counts`: histogram, one cell per score in the range (plus `sums`, the
///   Fenwick tree over it).
/// - `buckets`: score to the set of usernames holding it. Empty buckets are
///   pruned, so `buckets[s].len() == counts[s]` for every present bucket and
///   `counts[s] == 0` for every absent one.
#[derive(Clone, Debug)]
pub struct ScoreBook {
    range: ScoreRange,
    scores: HashMap<Arc<str>, Score>,
    counts: Vec<usize>,
    sums: PrefixSums,
    buckets: HashMap<Score, HashSet<Arc<str>>>,
}

impl ScoreBook {
    /// Book over the default `[100, 5000]` range.
    pub fn new() -> Self {
        Self::with_range(ScoreRange::DEFAULT)
    }

    pub fn with_range(range: ScoreRange) -> Self {
        Self::with_capacity(range, 0)
    }

    /// `capacity` is a hint for the number of users.
    pub fn with_capacity(range: ScoreRange, capacity: usize) -> Self {
        let n = range.len();
        Self {
            range,
            scores: HashMap::with_capacity(capacity),
            counts: vec![0; n],
            sums: PrefixSums::new(n),
            buckets: HashMap::new(),
        }
    }

    #[inline]
    pub fn range(&self) -> ScoreRange {
        self.range
    }

    /// Number of distinct users.
    #[inline]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Set `username`'s score to `rating` clamped into the range, creating the
    /// user on first sight.
    ///
    /// Returns the user's previous score.
    pub fn upsert(&mut self, username: &str, rating: Score) -> Option<Score> {
        let score = self.range.clamp(rating);

        let (name, prev) = match self.scores.get_key_value(username) {
            Some((name, &prev)) => (Arc::clone(name), Some(prev)),
            None => (Arc::from(username), None),
        };

        if let Some(prev) = prev {
            if prev == score {
                return Some(prev);
            }
            self.detach(prev, &name);
        }

        self.attach(score, Arc::clone(&name));
        self.scores.insert(name, score);
        prev
    }

    /// Delete `username`. Returns the score it held.
    pub fn remove(&mut self, username: &str) -> Option<Score> {
        let (name, score) = self.scores.remove_entry(username)?;
        self.detach(score, &name);
        Some(score)
    }

    fn attach(&mut self, score: Score, name: Arc<str>) {
        let idx = self.range.index(score);
        self.counts[idx] += 1;
        self.sums.increment(idx);
        self.buckets.entry(score).or_default().insert(name);
    }

    fn detach(&mut self, score: Score, name: &str) {
        let idx = self.range.index(score);
        self.counts[idx] -= 1;
        self.sums.decrement(idx);
        if let Some(bucket) = self.buckets.get_mut(&score) {
            bucket.remove(name);
            if bucket.is_empty() {
                self.buckets.remove(&score);
            }
        }
    }

    /// Current score of `username`.
    pub fn score(&self, username: &str) -> Option<Score> {
        self.scores.get(username).copied()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.scores.contains_key(username)
    }

    /// Rank an arbitrary score, held by a user or not.
    ///
    /// Below the range ranks after everyone (`len() + 1`); above it ranks first.
    ///
    /// Complexity: O(log range)
    pub fn rank(&self, rating: Score) -> usize {
        if rating < self.range.min {
            return self.len() + 1;
        }
        if rating > self.range.max {
            return 1;
        }
        let at_or_below = self.sums.prefix(self.range.index(rating));
        1 + self.len() - at_or_below
    }

    /// Same contract as [`rank`](Self::rank), computed by scanning histogram
    /// cells from the top down.
    ///
    /// Complexity: O(max - rating)
    pub fn rank_by_scan(&self, rating: Score) -> usize {
        if rating < self.range.min {
            return self.len() + 1;
        }
        if rating > self.range.max {
            return 1;
        }
        let above = &self.counts[self.range.index(rating) + 1..];
        1 + above.iter().sum::<usize>()
    }

    /// Current rating and rank of `username`.
    pub fn get(&self, username: &str) -> Option<Ranked> {
        let (name, &rating) = self.scores.get_key_value(username)?;
        Some(Ranked {
            username: name.to_string(),
            rating,
            rank: self.rank(rating),
        })
    }

    /// The best `limit` users, best first.
    ///
    /// Users sharing a score share a rank and are emitted in username order.
    /// The listing may stop part-way through a tie.
    pub fn top(&self, limit: usize) -> Vec<Ranked> {
        let limit = limit.min(self.len());
        let mut out = Vec::with_capacity(limit);
        let mut rank = 1;

        for idx in (0..self.counts.len()).rev() {
            if out.len() >= limit {
                break;
            }
            let count = self.counts[idx];
            if count == 0 {
                continue;
            }

            let score = self.range.score_at(idx);
            let mut names: Vec<&Arc<str>> = self
                .buckets
                .get(&score)
                .map(|bucket| bucket.iter().collect())
                .unwrap_or_default();
            names.sort_unstable();

            for name in names.into_iter().take(limit - out.len()) {
                out.push(Ranked {
                    username: name.to_string(),
                    rating: score,
                    rank,
                });
            }
            rank += count;
        }
        out
    }

    /// Case-insensitive substring search over usernames.
    ///
    /// Stops after `limit` matches, so the result is neither complete nor in
    /// any particular order.
    pub fn search(&self, query: &str, limit: usize) -> Vec<Ranked> {
        let needle = query.to_lowercase();
        let mut out = Vec::new();
        if limit == 0 {
            return out;
        }
        for (name, &rating) in &self.scores {
            if name.to_lowercase().contains(&needle) {
                out.push(Ranked {
                    username: name.to_string(),
                    rating,
                    rank: self.rank(rating),
                });
                if out.len() >= limit {
                    break;
                }
            }
        }
        out
    }

    /// Histogram cell for `score`. Zero outside the range.
    pub fn count_at(&self, score: Score) -> usize {
        if !self.range.contains(score) {
            return 0;
        }
        self.counts[self.range.index(score)]
    }

    /// Size of the reverse bucket for `score`.
    pub fn bucket_len(&self, score: Score) -> usize {
        self.buckets.get(&score).map_or(0, HashSet::len)
    }

    /// Whether a reverse bucket exists for `score`. Emptied buckets are pruned.
    pub fn has_bucket(&self, score: Score) -> bool {
        self.buckets.contains_key(&score)
    }

    /// Usernames currently at `score`, in no particular order.
    pub fn users_at(&self, score: Score) -> impl Iterator<Item = &str> + '_ {
        self.buckets
            .get(&score)
            .into_iter()
            .flat_map(|bucket| bucket.iter().map(|name| &**name))
    }

    /// All `(username, score)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Score)> + '_ {
        self.scores.iter().map(|(name, &score)| (&**name, score))
    }
}

impl Default for ScoreBook {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod proptests;
