//! Interval bookkeeping and elapsed-time accounting.
//!
//! The ledger owns the running/idle state and the list of completed
//! intervals. Every effective mutation writes a full [`Snapshot`] to the
//! injected store. Store failures are returned to the caller after the
//! in-memory change has been applied; memory stays the source of truth.

use crate::persistence::{is_representable, Snapshot, SnapshotStore, StoreError};
use chrono::Utc;
use stint_ipc::{Interval, TimerState, TimerStatus};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("interval cannot end ({end}) before it starts ({start})")]
    InvalidRange { start: i64, end: i64 },

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),

    #[error("failed to persist timer state: {0}")]
    Store(#[from] StoreError),
}

/// Wall-clock source in milliseconds since the Unix epoch.
pub trait Clock: Send {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

pub struct TimerLedger {
    intervals: Vec<Interval>,
    /// `Some` iff the timer is running.
    current_start_time: Option<i64>,
    next_id: u64,
    clock: Box<dyn Clock>,
    store: Box<dyn SnapshotStore>,
}

impl TimerLedger {
    pub fn new(clock: Box<dyn Clock>, store: Box<dyn SnapshotStore>) -> Self {
        Self {
            intervals: Vec::new(),
            current_start_time: None,
            next_id: 1,
            clock,
            store,
        }
    }

    /// Rebuilds a ledger from a snapshot, rejecting one that fails validation.
    /// A running snapshot resumes running from its original start time.
    pub fn restore(
        snapshot: Snapshot,
        clock: Box<dyn Clock>,
        store: Box<dyn SnapshotStore>,
    ) -> std::result::Result<Self, StoreError> {
        let mut ledger = Self::new(clock, store);
        ledger.hydrate(snapshot)?;
        Ok(ledger)
    }

    /// Loads whatever the store holds. An unreadable or invalid snapshot is
    /// logged and the ledger starts empty; the stored copy stays in place
    /// until the next mutation overwrites it.
    pub fn open(clock: Box<dyn Clock>, store: Box<dyn SnapshotStore>) -> Self {
        let loaded = store.load();
        let mut ledger = Self::new(clock, store);
        match loaded {
            Ok(Some(snapshot)) => {
                if let Err(e) = ledger.hydrate(snapshot) {
                    error!(error = %e, "stored state invalid, starting empty");
                }
            }
            Ok(None) => debug!("no stored state"),
            Err(e) => error!(error = %e, "stored state unreadable, starting empty"),
        }
        ledger
    }

    fn hydrate(&mut self, snapshot: Snapshot) -> std::result::Result<(), StoreError> {
        snapshot.validate()?;
        let next_id = match snapshot.intervals.iter().map(|interval| interval.id).max() {
            Some(max) => max.checked_add(1).ok_or_else(|| {
                StoreError::Corrupt(format!("interval id {} leaves no room for new ids", max))
            })?,
            None => 1,
        };
        if let Some(start) = snapshot.current_start_time {
            info!(start_time = start, "resuming running timer");
        }
        self.intervals = snapshot.intervals;
        self.current_start_time = snapshot.current_start_time;
        self.next_id = next_id;
        Ok(())
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn is_running(&self) -> bool {
        self.current_start_time.is_some()
    }

    pub fn current_start_time(&self) -> Option<i64> {
        self.current_start_time
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn get(&self, id: u64) -> Option<&Interval> {
        self.intervals.iter().find(|interval| interval.id == id)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            intervals: self.intervals.clone(),
            is_running: self.is_running(),
            current_start_time: self.current_start_time,
        }
    }

    /// Starts a new segment. Returns `false` if already running.
    pub fn start(&mut self) -> Result<bool> {
        if self.is_running() {
            debug!("start ignored: timer already running");
            return Ok(false);
        }
        let now = self.clock.now();
        self.current_start_time = Some(now);
        info!(start_time = now, "timer started");
        self.persist()?;
        Ok(true)
    }

    /// Closes the running segment into a new interval. Returns `None` if idle.
    pub fn pause(&mut self) -> Result<Option<Interval>> {
        let Some(start) = self.current_start_time.take() else {
            debug!("pause ignored: timer not running");
            return Ok(None);
        };
        // A clock that stepped backwards must not produce a negative interval.
        let end = self.clock.now().max(start);
        let interval = Interval::new(self.next_id, start, end);
        self.next_id += 1;
        self.intervals.push(interval.clone());
        info!(id = interval.id, duration = interval.duration, "interval recorded");
        self.persist()?;
        Ok(Some(interval))
    }

    /// Drops all history, stops the timer and erases the stored snapshot.
    pub fn reset(&mut self) -> Result<()> {
        self.intervals.clear();
        self.current_start_time = None;
        self.next_id = 1;
        info!("timer reset");
        self.store.clear().map_err(|e| {
            warn!(error = %e, "failed to clear stored snapshot");
            LedgerError::from(e)
        })
    }

    pub fn delete_interval(&mut self, id: u64) -> Result<Option<Interval>> {
        let Some(index) = self.position(id) else {
            debug!(id, "delete ignored: no such interval");
            return Ok(None);
        };
        let removed = self.intervals.remove(index);
        info!(id, "interval deleted");
        self.persist()?;
        Ok(Some(removed))
    }

    pub fn update_comment(&mut self, id: u64, text: impl Into<String>) -> Result<Option<Interval>> {
        let Some(index) = self.position(id) else {
            debug!(id, "comment ignored: no such interval");
            return Ok(None);
        };
        self.intervals[index].comment = text.into();
        self.persist()?;
        Ok(Some(self.intervals[index].clone()))
    }

    /// Moves both bounds of an interval. Rejects unrepresentable timestamps and
    /// ranges that end before they start, leaving the interval untouched.
    pub fn edit_interval(&mut self, id: u64, start: i64, end: i64) -> Result<Option<Interval>> {
        for timestamp in [start, end] {
            if !is_representable(timestamp) {
                return Err(LedgerError::InvalidTimestamp(timestamp));
            }
        }
        if end < start {
            return Err(LedgerError::InvalidRange { start, end });
        }
        let Some(index) = self.position(id) else {
            debug!(id, "edit ignored: no such interval");
            return Ok(None);
        };
        let interval = &mut self.intervals[index];
        interval.start_time = start;
        interval.end_time = end;
        interval.duration = end - start;
        info!(id, start, end, "interval edited");
        self.persist()?;
        Ok(Some(self.intervals[index].clone()))
    }

    /// Sum of recorded durations plus the running segment.
    pub fn total_elapsed(&self, now: i64) -> i64 {
        self.intervals
            .iter()
            .map(|interval| interval.duration)
            .chain([self.current_segment_elapsed(now)])
            .fold(0i64, i64::saturating_add)
    }

    pub fn current_segment_elapsed(&self, now: i64) -> i64 {
        self.current_start_time
            .map_or(0, |start| now.saturating_sub(start).max(0))
    }

    pub fn status(&self, now: i64) -> TimerStatus {
        TimerStatus {
            state: if self.is_running() {
                TimerState::Running
            } else {
                TimerState::Idle
            },
            total_ms: self.total_elapsed(now),
            current_ms: self.current_segment_elapsed(now),
            current_start_time: self.current_start_time,
            intervals: self.intervals.len(),
        }
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.intervals.iter().position(|interval| interval.id == id)
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.snapshot()).map_err(|e| {
            warn!(error = %e, "failed to persist snapshot");
            LedgerError::from(e)
        })
    }
}

#[cfg(test)]
pub mod testing {
    use super::Clock;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    /// Clock driven by the test. Clones share the same time.
    #[derive(Clone, Default)]
    pub struct ManualClock(Arc<AtomicI64>);

    impl ManualClock {
        pub fn at(ms: i64) -> Self {
            Self(Arc::new(AtomicI64::new(ms)))
        }

        pub fn set(&self, ms: i64) {
            self.0.store(ms, Ordering::SeqCst);
        }

        pub fn advance(&self, ms: i64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }
}
