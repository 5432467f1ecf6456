//! Ingestion counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide ingestion counters, shared by the scheduler and its workers.
#[derive(Debug, Default)]
pub struct IngestStats {
    ticks: AtomicU64,
    cycles_started: AtomicU64,
    cycles_succeeded: AtomicU64,
    cycles_failed: AtomicU64,
    posts_created: AtomicU64,
    duplicates_skipped: AtomicU64,
    in_flight: AtomicU64,
    max_in_flight: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStatsSnapshot {
    pub ticks: u64,
    pub cycles_started: u64,
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
    pub posts_created: u64,
    pub duplicates_skipped: u64,
    pub in_flight: u64,
    pub max_in_flight: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cycle entering `Fetching`.
    pub fn cycle_started(&self) {
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_flight.fetch_max(now, Ordering::AcqRel);
    }

    /// Record a cycle reaching a terminal state.
    pub fn cycle_finished(&self, succeeded: bool) {
        if succeeded {
            self.cycles_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn record_posts(&self, created: usize, duplicates: usize) {
        self.posts_created
            .fetch_add(created as u64, Ordering::Relaxed);
        self.duplicates_skipped
            .fetch_add(duplicates as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_succeeded: self.cycles_succeeded.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            posts_created: self.posts_created.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Acquire),
            max_in_flight: self.max_in_flight.load(Ordering::Acquire),
        }
    }
}
