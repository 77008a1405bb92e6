// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-mailbox queue statistics
//!
//! The collector is driven by the mailbox's own worker thread. Snapshots
//! may be taken from any thread; rates cover the window since the previous
//! snapshot, and a window shorter than [`MIN_REFRESH_PERIOD`] is reported
//! but not consumed.
//!
//! Per-message bookkeeping is atomic. The window mutex is taken only on
//! busy/idle edges and by snapshots.

use crate::clock::{Clock, Stopwatch, SystemClock};
use crate::message::UNKNOWN_TYPE;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Stored in the type slots when no message is recorded
const NO_TYPE: usize = 0;

/// Snapshots closer together than this share a rate window
pub const MIN_REFRESH_PERIOD: Duration = Duration::from_millis(100);

/// Point-in-time view of one mailbox
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStats {
    pub name: String,
    pub group_name: Option<String>,
    pub length: usize,
    pub avg_items_per_second: u64,
    pub avg_processing_time_ms: f64,
    pub idle_time_percent: f64,
    #[serde(with = "humantime_serde")]
    pub current_busy_time: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub current_idle_time: Option<Duration>,
    pub total_items_processed: u64,
    pub length_current_try_peak: usize,
    pub length_lifetime_peak: usize,
    pub last_processed_message_type: Option<&'static str>,
    pub in_progress_message_type: Option<&'static str>,
}

struct Window {
    busy: Stopwatch,
    idle: Stopwatch,
    total_busy: Stopwatch,
    total_idle: Stopwatch,
    total_time: Stopwatch,
    last_total_busy: Duration,
    last_total_idle: Duration,
    last_total_time: Duration,
    last_total_items: u64,
    was_idle: bool,
}

/// Collects busy/idle timing, throughput and backlog peaks for one queue
pub struct QueueStatsCollector<C: Clock = SystemClock> {
    name: String,
    group: Option<String>,
    clock: C,
    type_names: &'static [&'static str],
    total_items: AtomicU64,
    lifetime_peak: AtomicUsize,
    current_peak: AtomicUsize,
    // Type index plus one, or NO_TYPE
    in_progress_type: AtomicUsize,
    last_type: AtomicUsize,
    window: Mutex<Window>,
}

impl QueueStatsCollector<SystemClock> {
    pub fn new(
        name: impl Into<String>,
        group: Option<String>,
        type_names: &'static [&'static str],
    ) -> Self {
        Self::with_clock(name, group, type_names, SystemClock)
    }
}

impl<C: Clock> QueueStatsCollector<C> {
    /// `type_names` is the message family's table; types are recorded by index into it
    pub fn with_clock(
        name: impl Into<String>,
        group: Option<String>,
        type_names: &'static [&'static str],
        clock: C,
    ) -> Self {
        Self {
            name: name.into(),
            group,
            clock,
            type_names,
            total_items: AtomicU64::new(0),
            lifetime_peak: AtomicUsize::new(0),
            current_peak: AtomicUsize::new(0),
            in_progress_type: AtomicUsize::new(NO_TYPE),
            last_type: AtomicUsize::new(NO_TYPE),
            window: Mutex::new(Window {
                busy: Stopwatch::new(),
                idle: Stopwatch::new(),
                total_busy: Stopwatch::new(),
                total_idle: Stopwatch::new(),
                total_time: Stopwatch::new(),
                last_total_busy: Duration::ZERO,
                last_total_idle: Duration::ZERO,
                last_total_time: Duration::ZERO,
                last_total_items: 0,
                was_idle: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) {
        {
            let mut window = self.lock();
            window.total_time.start(self.clock.now());
        }
        self.enter_idle();
    }

    pub fn stop(&self) {
        self.enter_idle();
        let mut window = self.lock();
        window.total_time.stop(self.clock.now());
    }

    /// Record that a message with `type_index` is about to be handled
    pub fn processing_started(&self, type_index: usize, queue_length: usize) {
        self.lifetime_peak.fetch_max(queue_length, Ordering::Relaxed);
        self.current_peak.fetch_max(queue_length, Ordering::Relaxed);
        self.in_progress_type
            .store(type_index.saturating_add(1), Ordering::Relaxed);
    }

    pub fn processing_ended(&self, items_processed: u64) {
        self.total_items
            .fetch_add(items_processed, Ordering::Relaxed);
        let finished = self.in_progress_type.swap(NO_TYPE, Ordering::Relaxed);
        self.last_type.store(finished, Ordering::Relaxed);
    }

    pub fn enter_idle(&self) {
        let now = self.clock.now();
        let mut window = self.lock();
        if window.was_idle {
            return;
        }
        window.was_idle = true;
        window.total_idle.start(now);
        window.idle.restart(now);
        window.total_busy.stop(now);
        window.busy.reset();
    }

    pub fn enter_busy(&self) {
        let now = self.clock.now();
        let mut window = self.lock();
        if !window.was_idle {
            return;
        }
        window.was_idle = false;
        window.total_idle.stop(now);
        window.idle.reset();
        window.total_busy.start(now);
        window.busy.restart(now);
    }

    pub fn total_items(&self) -> u64 {
        self.total_items.load(Ordering::Relaxed)
    }

    /// Snapshot the statistics, given the queue's current length
    pub fn statistics(&self, current_length: usize) -> QueueStats {
        let now = self.clock.now();
        let total_items = self.total_items();
        let mut window = self.lock();

        let total_time = window.total_time.elapsed(now);
        let total_idle = window.total_idle.elapsed(now);
        let total_busy = window.total_busy.elapsed(now);

        let span = total_time.saturating_sub(window.last_total_time);
        let items = total_items.saturating_sub(window.last_total_items);

        let avg_items_per_second = if span.is_zero() {
            0
        } else {
            (items as f64 / span.as_secs_f64()) as u64
        };
        let avg_processing_time_ms = if items == 0 {
            0.0
        } else {
            total_busy
                .saturating_sub(window.last_total_busy)
                .as_secs_f64()
                * 1000.0
                / items as f64
        };
        let idle_time_percent = if span.is_zero() {
            100.0
        } else {
            let idle = total_idle.saturating_sub(window.last_total_idle);
            (100.0 * idle.as_secs_f64() / span.as_secs_f64()).min(100.0)
        };

        let stats = QueueStats {
            name: self.name.clone(),
            group_name: self.group.clone(),
            length: current_length,
            avg_items_per_second,
            avg_processing_time_ms,
            idle_time_percent,
            current_busy_time: window.busy.is_running().then(|| window.busy.elapsed(now)),
            current_idle_time: window.idle.is_running().then(|| window.idle.elapsed(now)),
            total_items_processed: total_items,
            length_current_try_peak: self.current_peak.load(Ordering::Relaxed),
            length_lifetime_peak: self.lifetime_peak.load(Ordering::Relaxed),
            last_processed_message_type: self.type_name(self.last_type.load(Ordering::Relaxed)),
            in_progress_message_type: self
                .type_name(self.in_progress_type.load(Ordering::Relaxed)),
        };

        if span >= MIN_REFRESH_PERIOD {
            window.last_total_time = total_time;
            window.last_total_idle = total_idle;
            window.last_total_busy = total_busy;
            window.last_total_items = total_items;
            self.current_peak.store(0, Ordering::Relaxed);
        }

        stats
    }

    fn type_name(&self, slot: usize) -> Option<&'static str> {
        let index = slot.checked_sub(1)?;
        Some(self.type_names.get(index).copied().unwrap_or(UNKNOWN_TYPE))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
