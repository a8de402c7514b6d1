//! Startup data for an empty index.
//!
//! The index keeps nothing across restarts, so the service fills it from a
//! [`SeedPlan`] before accepting traffic.

use std::time::Instant;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{RankIndex, Score};

/// What to put into a fresh index.
#[derive(Debug, Clone)]
pub struct SeedPlan {
    /// Users inserted first with fixed ratings
    pub featured: Vec<(String, Score)>,
    /// Number of generated users with uniformly random ratings
    pub random_users: usize,
    /// Generated users are named `{name_prefix}{n}` for `n` in `1..=random_users`
    pub name_prefix: String,
    /// Fixed RNG seed for reproducible ratings
    pub rng_seed: Option<u64>,
}

impl Default for SeedPlan {
    fn default() -> Self {
        Self {
            featured: vec![
                ("rahul".to_string(), 4600),
                ("rahul_burman".to_string(), 3900),
                ("rahul_mathur".to_string(), 3900),
                ("rahul_kumar".to_string(), 1234),
            ],
            random_users: 10_000,
            name_prefix: "user_".to_string(),
            rng_seed: None,
        }
    }
}

pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Insert every user of `plan` into `index`.
///
/// Returns the roster of seeded usernames in insertion order, which the
/// update simulator draws from.
pub fn seed(index: &RankIndex, plan: &SeedPlan) -> Vec<String> {
    let start = Instant::now();
    let range = index.range();
    let mut rng = make_rng(plan.rng_seed);
    let mut roster = Vec::with_capacity(plan.featured.len() + plan.random_users);

    info!(
        "Seeding {} featured and {} generated users",
        plan.featured.len(),
        plan.random_users
    );

    for (name, rating) in &plan.featured {
        index.upsert(name, *rating);
        roster.push(name.clone());
    }

    for n in 1..=plan.random_users {
        let name = format!("{}{}", plan.name_prefix, n);
        let rating = rng.gen_range(range.min()..=range.max());
        index.upsert(&name, rating);
        roster.push(name);
    }

    debug!("Seeded {} users in {:?}", roster.len(), start.elapsed());
    info!("Seeding complete: {} users in index", index.len());
    roster
}
