use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

fn validate_book(b: &ScoreBook) {
    let hist_total: usize = b.counts.iter().sum();
    assert_eq!(hist_total, b.len(), "histogram must sum to user count");

    let mut running = 0usize;
    for (idx, &count) in b.counts.iter().enumerate() {
        let score = b.range.score_at(idx);
        running += count;
        assert_eq!(
            b.bucket_len(score),
            count,
            "bucket size must match histogram at {score}"
        );
        if count == 0 {
            assert!(!b.has_bucket(score), "empty bucket at {score} must be pruned");
        }
        assert_eq!(b.sums.prefix(idx), running, "prefix sums out of sync at {score}");
    }

    for score in b.buckets.keys() {
        assert!(b.range.contains(*score), "bucket outside range: {score}");
    }

    for (name, score) in b.iter() {
        assert!(b.range.contains(score), "stored score outside range");
        assert!(
            b.buckets.get(&score).is_some_and(|bucket| bucket.contains(name)),
            "{name} missing from bucket {score}"
        );
    }
}

/// Rank computed from first principles: one plus everyone strictly above.
fn naive_rank(m: &BTreeMap<String, Score>, rating: Score) -> usize {
    if rating < MIN_SCORE {
        return m.len() + 1;
    }
    1 + m.values().filter(|&&s| s > rating).count()
}

#[derive(Clone, Debug)]
enum Op {
    Upsert(String, Score),
    Remove(String),
    Get(String),
    Rank(Score),
}

fn name_strategy() -> impl Strategy<Value = String> + Clone {
    // A small alphabet keeps collisions (re-upserts, ties) frequent.
    "[a-e]{1,3}"
}

fn rating_strategy() -> impl Strategy<Value = Score> + Clone {
    prop_oneof![
        8 => MIN_SCORE..=MAX_SCORE,
        1 => (MIN_SCORE - 50)..MIN_SCORE,
        1 => (MAX_SCORE + 1)..=(MAX_SCORE + 50),
        1 => prop::sample::select(vec![MIN_SCORE, MAX_SCORE, 2500]),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let name = name_strategy();
    let rating = rating_strategy();
    let op = prop_oneof![
        50 => (name.clone(), rating.clone()).prop_map(|(n, r)| Op::Upsert(n, r)),
        10 => name.clone().prop_map(Op::Remove),
        20 => name.clone().prop_map(Op::Get),
        20 => rating.clone().prop_map(Op::Rank),
    ];
    prop::collection::vec(op, 0..=500)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut b = ScoreBook::new();
        let mut m: BTreeMap<String, Score> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Upsert(name, rating) => {
                    let old_b = b.upsert(&name, rating);
                    let old_m = m.insert(name, rating.clamp(MIN_SCORE, MAX_SCORE));
                    prop_assert_eq!(old_b, old_m);
                }
                Op::Remove(name) => {
                    prop_assert_eq!(b.remove(&name), m.remove(&name));
                }
                Op::Get(name) => {
                    let got = b.get(&name).map(|u| (u.rating, u.rank));
                    let expected = m.get(&name).map(|&s| (s, naive_rank(&m, s)));
                    prop_assert_eq!(got, expected);
                }
                Op::Rank(rating) => {
                    prop_assert_eq!(b.rank(rating), naive_rank(&m, rating));
                    prop_assert_eq!(b.rank(rating), b.rank_by_scan(rating));
                }
            }

            prop_assert_eq!(b.len(), m.len());
        }

        validate_book(&b);

        let mut expected: Vec<(String, Score)> = m.iter().map(|(n, &s)| (n.clone(), s)).collect();
        expected.sort_by(|x, y| y.1.cmp(&x.1).then_with(|| x.0.cmp(&y.0)));
        let got: Vec<(String, Score)> = b
            .top(usize::MAX)
            .into_iter()
            .map(|u| (u.username, u.rating))
            .collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_rank_monotonic(ops in ops_strategy(), a in rating_strategy(), c in rating_strategy()) {
        let mut b = ScoreBook::new();
        for op in ops {
            if let Op::Upsert(name, rating) = op {
                b.upsert(&name, rating);
            }
        }
        let (lo, hi) = if a <= c { (a, c) } else { (c, a) };
        prop_assert!(b.rank(lo) >= b.rank(hi));
    }

    #[test]
    fn prop_ties_share_rank(ops in ops_strategy(), limit in 0usize..64) {
        let mut b = ScoreBook::new();
        for op in ops {
            if let Op::Upsert(name, rating) = op {
                b.upsert(&name, rating);
            }
        }

        let top = b.top(limit);
        prop_assert_eq!(top.len(), limit.min(b.len()));
        for (i, u) in top.iter().enumerate() {
            prop_assert_eq!(u.rank, b.rank(u.rating));
            prop_assert_eq!(Some(u.rank), b.get(&u.username).map(|g| g.rank));
            if i > 0 {
                let prev = &top[i - 1];
                if prev.rating == u.rating {
                    prop_assert_eq!(prev.rank, u.rank);
                } else {
                    prop_assert!(prev.rating > u.rating);
                    prop_assert!(prev.rank < u.rank);
                }
            }
        }
    }

    #[test]
    fn prop_clamped_upserts_equivalent(
        name in name_strategy(),
        below in 1i64..1_000_000,
        above in 1i64..1_000_000
    ) {
        let mut clamped = ScoreBook::new();
        let mut exact = ScoreBook::new();

        clamped.upsert(&name, MIN_SCORE - below);
        exact.upsert(&name, MIN_SCORE);
        prop_assert_eq!(clamped.get(&name), exact.get(&name));
        prop_assert_eq!(clamped.count_at(MIN_SCORE), exact.count_at(MIN_SCORE));

        clamped.upsert(&name, MAX_SCORE + above);
        exact.upsert(&name, MAX_SCORE);
        prop_assert_eq!(clamped.get(&name), exact.get(&name));
        prop_assert_eq!(clamped.count_at(MAX_SCORE), exact.count_at(MAX_SCORE));
        prop_assert!(!clamped.has_bucket(MIN_SCORE));
    }
}

#[test]
fn exhaustive_tie_groups_small_set() {
    // Every assignment of four users to three scores.
    let scores = [MIN_SCORE, 2500, MAX_SCORE];
    let names = ["w", "x", "y", "z"];

    for code in 0..3usize.pow(names.len() as u32) {
        let mut b = ScoreBook::new();
        let mut m: BTreeMap<String, Score> = BTreeMap::new();
        let mut c = code;
        for name in names {
            let score = scores[c % 3];
            c /= 3;
            b.upsert(name, score);
            m.insert(name.to_string(), score);
        }

        validate_book(&b);
        for s in scores {
            assert_eq!(b.rank(s), naive_rank(&m, s), "code {code} score {s}");
        }
        for u in b.top(names.len()) {
            assert_eq!(u.rank, naive_rank(&m, u.rating));
        }
    }
}
