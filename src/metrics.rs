// Runtime metrics module
//
// Lightweight counters for monitoring the content engine of a long-running kiosk

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Engine-wide runtime metrics
///
/// Uses atomic operations for thread-safe metric tracking without locks.
/// One instance is shared (behind an `Arc`) by the aggregator, the rotation
/// engine and the image loader, and logged periodically and on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Refresh cycles started (startup, timer and manual)
    pub refresh_started: AtomicU64,

    /// Refresh cycles whose combined result was published
    pub refresh_completed: AtomicU64,

    /// Source reports dropped because a newer refresh had started
    pub stale_reports: AtomicU64,

    /// News items published across all completed cycles
    pub news_published: AtomicU64,

    /// Announcements published across all completed cycles
    pub announcements_published: AtomicU64,

    /// Completed cycles that produced no content at all
    pub empty_cycles: AtomicU64,

    /// Cursor moves (timer, manual and list replacement)
    pub rotations: AtomicU64,

    /// Images decoded and applied to the current item
    pub images_loaded: AtomicU64,

    /// Image fetches that ended without a usable image
    pub images_failed: AtomicU64,

    /// Image results discarded or aborted because the item changed
    pub images_discarded: AtomicU64,

    /// Engine events broadcast to subscribers
    pub events_broadcast: AtomicU64,

    /// Engine events sent while nobody was subscribed
    pub events_unobserved: AtomicU64,

    /// Engine start time
    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            refresh_started: AtomicU64::new(0),
            refresh_completed: AtomicU64::new(0),
            stale_reports: AtomicU64::new(0),
            news_published: AtomicU64::new(0),
            announcements_published: AtomicU64::new(0),
            empty_cycles: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            images_loaded: AtomicU64::new(0),
            images_failed: AtomicU64::new(0),
            images_discarded: AtomicU64::new(0),
            events_broadcast: AtomicU64::new(0),
            events_unobserved: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record the start of a refresh cycle
    pub fn record_refresh_started(&self) {
        self.refresh_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a published combined result with its composition
    pub fn record_refresh_completed(&self, announcements: usize, news: usize) {
        self.refresh_completed.fetch_add(1, Ordering::Relaxed);
        self.announcements_published
            .fetch_add(announcements as u64, Ordering::Relaxed);
        self.news_published.fetch_add(news as u64, Ordering::Relaxed);
        if announcements + news == 0 {
            self.empty_cycles.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a source report dropped by generation mismatch
    pub fn record_stale_report(&self) {
        self.stale_reports.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cursor move
    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image_loaded(&self) {
        self.images_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image_failed(&self) {
        self.images_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image_discarded(&self) {
        self.images_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an event broadcast; `observed` is false when no receiver existed
    pub fn record_event(&self, observed: bool) {
        if observed {
            self.events_broadcast.fetch_add(1, Ordering::Relaxed);
        } else {
            self.events_unobserved.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average number of items per completed refresh cycle
    pub fn avg_items_per_cycle(&self) -> f64 {
        let completed = self.refresh_completed.load(Ordering::Relaxed);
        if completed == 0 {
            return 0.0;
        }
        let items = self.news_published.load(Ordering::Relaxed)
            + self.announcements_published.load(Ordering::Relaxed);
        items as f64 / completed as f64
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Engine Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Refresh cycles: {} started, {} completed, {} empty, {} stale reports dropped",
            self.refresh_started.load(Ordering::Relaxed),
            self.refresh_completed.load(Ordering::Relaxed),
            self.empty_cycles.load(Ordering::Relaxed),
            self.stale_reports.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Content published: {} news, {} announcements (avg {:.1} items per cycle)",
            self.news_published.load(Ordering::Relaxed),
            self.announcements_published.load(Ordering::Relaxed),
            self.avg_items_per_cycle()
        );
        tracing::info!(
            "Rotations: {}, images: {} loaded, {} failed, {} discarded",
            self.rotations.load(Ordering::Relaxed),
            self.images_loaded.load(Ordering::Relaxed),
            self.images_failed.load(Ordering::Relaxed),
            self.images_discarded.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Events: {} broadcast, {} without subscribers",
            self.events_broadcast.load(Ordering::Relaxed),
            self.events_unobserved.load(Ordering::Relaxed)
        );
    }

    /// Log periodic metrics (once per refresh interval)
    pub fn log_periodic(&self) {
        tracing::info!(
            "Metrics: {} refresh cycles, {} rotations, {} images loaded, uptime {:.0}s",
            self.refresh_completed.load(Ordering::Relaxed),
            self.rotations.load(Ordering::Relaxed),
            self.images_loaded.load(Ordering::Relaxed),
            self.uptime().as_secs_f64()
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
