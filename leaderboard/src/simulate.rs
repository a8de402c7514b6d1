//! Background driver that keeps the leaderboard moving.
//!
//! On every tick one random roster member gets a new uniformly random rating
//! through the ordinary [`RankIndex::upsert`] path. The index lock is the
//! only coordination.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, trace};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::seed::make_rng;
use crate::RankIndex;

/// Default tick interval (5 updates per second).
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// Running simulator. Dropping the handle stops the thread.
pub struct SimulatorHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    updates: Arc<AtomicU64>,
}

impl SimulatorHandle {
    /// Number of updates applied so far.
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Disconnecting the channel wakes the thread immediately.
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start issuing one random update per `interval` against `index`.
///
/// An empty roster ticks without updating anything.
pub fn spawn(
    index: Arc<RankIndex>,
    roster: Vec<String>,
    interval: Duration,
    rng_seed: Option<u64>,
) -> io::Result<SimulatorHandle> {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let updates = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&updates);

    let thread = thread::Builder::new()
        .name("rank-simulator".to_string())
        .spawn(move || {
            let mut rng = make_rng(rng_seed);
            let range = index.range();
            info!(
                "Simulator started: {} users, one update every {:?}",
                roster.len(),
                interval
            );

            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                let Some(name) = roster.choose(&mut rng) else {
                    continue;
                };
                let rating = rng.gen_range(range.min()..=range.max());
                index.upsert(name, rating);
                counter.fetch_add(1, Ordering::Relaxed);
                trace!("Simulated update: {} -> {}", name, rating);
            }

            debug!(
                "Simulator stopped after {} updates",
                counter.load(Ordering::Relaxed)
            );
        })?;

    Ok(SimulatorHandle {
        stop: Some(stop_tx),
        thread: Some(thread),
        updates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn wait_for(handle: &SimulatorHandle, n: u64) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while handle.updates() < n {
            assert!(Instant::now() < deadline, "simulator made no progress");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_updates_roster_members() {
        let index = Arc::new(RankIndex::new());
        let roster: Vec<String> = (0..10).map(|i| format!("sim_{i}")).collect();
        for name in &roster {
            index.upsert(name, 100);
        }

        let tick = Duration::from_millis(1);
        let handle = spawn(Arc::clone(&index), roster.clone(), tick, Some(3)).unwrap();
        wait_for(&handle, 20);
        handle.stop();

        // Only existing users are touched; nothing is added.
        assert_eq!(index.len(), 10);
        index.with_book(|book| {
            assert!(book.iter().all(|(name, _)| roster.iter().any(|r| r == name)));
        });
    }

    #[test]
    fn test_stop_freezes_counter() {
        let index = Arc::new(RankIndex::new());
        let handle = spawn(
            Arc::clone(&index),
            vec!["solo".to_string()],
            Duration::from_millis(1),
            None,
        )
        .unwrap();
        wait_for(&handle, 3);
        let counter = Arc::clone(&handle.updates);
        handle.stop();

        let after_stop = counter.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::Relaxed), after_stop);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_empty_roster() {
        let index = Arc::new(RankIndex::new());
        let tick = Duration::from_millis(1);
        let handle = spawn(Arc::clone(&index), Vec::new(), tick, Some(0)).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(handle.updates(), 0);
        drop(handle);
        assert!(index.is_empty());
    }
}
