use crate::metrics::Metrics;
use crate::models::{ContentItem, ContentList};
use crate::services::{AnnouncementSource, NewsSource};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Which fetcher a [`SourceReport`] came from, with its (possibly empty) items
#[derive(Debug, Clone)]
pub enum SourcePayload {
    News(Vec<ContentItem>),
    Announcements(Vec<ContentItem>),
}

/// One fetcher's result for one refresh generation
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub generation: u64,
    pub payload: SourcePayload,
}

/// Merged result of one refresh generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedContent {
    pub generation: u64,
    pub items: ContentList,
}

/// Callback invoked with every published [`CombinedContent`]
pub type CombinedHandler = Box<dyn Fn(&CombinedContent) + Send + Sync>;

/// Slots for the two reports a generation waits for
#[derive(Debug)]
struct PendingCycle {
    generation: u64,
    news: Option<Vec<ContentItem>>,
    announcements: Option<Vec<ContentItem>>,
}

impl PendingCycle {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            news: None,
            announcements: None,
        }
    }

    /// Both slots filled: take them, leaving the cycle spent
    fn take_complete(&mut self) -> Option<(Vec<ContentItem>, Vec<ContentItem>)> {
        if self.news.is_some() && self.announcements.is_some() {
            Some((self.announcements.take()?, self.news.take()?))
        } else {
            None
        }
    }
}

/// Joins the feed and announcement fetches of one refresh into one list
///
/// Each [`refresh()`](Self::refresh) starts a new generation: both fetchers run
/// concurrently as tokio tasks and report back over a channel. The combined
/// list is published exactly once per generation, after both have reported,
/// whatever the order and whether either came back empty. Starting a new
/// generation aborts the previous generation's tasks; any report that still
/// slips through is dropped by generation mismatch.
///
/// # Related Types
///
/// - [`crate::engine::ContentEngine`]: drives [`next_combined()`](Self::next_combined)
///   from its event loop
/// - [`crate::engine::rotation::RotationEngine`]: consumes the published list
pub struct ContentAggregator {
    news: Arc<dyn NewsSource>,
    announcements: Arc<dyn AnnouncementSource>,

    /// Last generation handed out by `refresh()`; 0 means never refreshed
    generation: u64,

    /// The one generation still waiting for reports
    pending: Option<PendingCycle>,

    /// Fetch tasks of the pending generation
    in_flight: Vec<JoinHandle<()>>,

    report_tx: mpsc::UnboundedSender<SourceReport>,
    report_rx: mpsc::UnboundedReceiver<SourceReport>,

    handlers: Vec<CombinedHandler>,
    metrics: Arc<Metrics>,
}

impl ContentAggregator {
    pub fn new(
        news: Arc<dyn NewsSource>,
        announcements: Arc<dyn AnnouncementSource>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        Self {
            news,
            announcements,
            generation: 0,
            pending: None,
            in_flight: Vec::new(),
            report_tx,
            report_rx,
            handlers: Vec::new(),
            metrics,
        }
    }

    /// Register a callback for every published combined result
    pub fn on_combined<F>(&mut self, handler: F)
    where
        F: Fn(&CombinedContent) + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Start a new fetch cycle and return its generation
    ///
    /// Must be called from within a tokio runtime.
    pub fn refresh(&mut self) -> u64 {
        let superseded = self.abort_in_flight();
        if let Some(old) = self.pending.take() {
            tracing::info!(
                "Refresh requested while generation {} was pending, superseding it ({} task(s) aborted)",
                old.generation,
                superseded
            );
        }

        self.generation += 1;
        let generation = self.generation;
        self.pending = Some(PendingCycle::new(generation));
        self.metrics.record_refresh_started();

        tracing::info!("Starting content refresh, generation {}", generation);

        let news = Arc::clone(&self.news);
        let tx = self.report_tx.clone();
        self.in_flight.push(tokio::spawn(async move {
            let items = news.fetch_news().await;
            let _ = tx.send(SourceReport {
                generation,
                payload: SourcePayload::News(items),
            });
        }));

        let announcements = Arc::clone(&self.announcements);
        let tx = self.report_tx.clone();
        self.in_flight.push(tokio::spawn(async move {
            let items = announcements.fetch_announcements().await;
            let _ = tx.send(SourceReport {
                generation,
                payload: SourcePayload::Announcements(items),
            });
        }));

        generation
    }

    /// Apply one source report
    ///
    /// Returns the combined result when this report completes the pending
    /// generation. Reports for any other generation are dropped.
    pub fn accept(&mut self, report: SourceReport) -> Option<CombinedContent> {
        let Some(pending) = self
            .pending
            .as_mut()
            .filter(|p| p.generation == report.generation)
        else {
            self.metrics.record_stale_report();
            tracing::debug!(
                "Dropping stale report for generation {} (current {})",
                report.generation,
                self.generation
            );
            return None;
        };

        let (slot, items) = match report.payload {
            SourcePayload::News(items) => (&mut pending.news, items),
            SourcePayload::Announcements(items) => (&mut pending.announcements, items),
        };
        if slot.is_some() {
            tracing::warn!(
                "Duplicate source report for generation {}, keeping the first",
                report.generation
            );
            return None;
        }
        *slot = Some(items);

        let (announcements, news) = pending.take_complete()?;
        self.pending = None;
        self.in_flight.clear();

        let combined = CombinedContent {
            generation: report.generation,
            items: ContentList::merge(announcements, news),
        };

        self.metrics.record_refresh_completed(
            combined.items.announcement_count(),
            combined.items.news_count(),
        );
        tracing::info!(
            "Generation {} complete: {} announcement(s), {} news item(s)",
            combined.generation,
            combined.items.announcement_count(),
            combined.items.news_count()
        );

        for handler in &self.handlers {
            handler(&combined);
        }

        Some(combined)
    }

    /// Wait for the next completed generation
    ///
    /// Cancel-safe: a report received before cancellation has already been
    /// applied, so dropping this future inside `tokio::select!` loses nothing.
    pub async fn next_combined(&mut self) -> CombinedContent {
        loop {
            // The aggregator owns a sender, so the channel never closes
            let Some(report) = self.report_rx.recv().await else {
                return std::future::pending().await;
            };
            if let Some(combined) = self.accept(report) {
                return combined;
            }
        }
    }

    /// Generation of the most recent `refresh()` call
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a generation is still waiting for reports
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn abort_in_flight(&mut self) -> usize {
        let mut aborted = 0;
        for task in self.in_flight.drain(..) {
            if !task.is_finished() {
                task.abort();
                aborted += 1;
            }
        }
        aborted
    }
}

impl Drop for ContentAggregator {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{MockAnnouncementSource, MockNewsSource};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    fn news(title: &str) -> ContentItem {
        ContentItem::news(title, "Texto", None, None, "01/03/2025 às 10:00", false)
    }

    fn announcement(title: &str, day: u32) -> ContentItem {
        let start = NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        ContentItem::announcement(title, None, None, None, "Aviso", start)
    }

    fn titles(content: &CombinedContent) -> Vec<&str> {
        content.items.iter().map(|i| i.title.as_str()).collect()
    }

    /// Sources whose latency differs per call, so generations can overlap
    struct DelayedNews {
        calls: AtomicUsize,
        delays: Vec<Duration>,
    }

    #[async_trait]
    impl NewsSource for DelayedNews {
        async fn fetch_news(&self) -> Vec<ContentItem> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delays[call.min(self.delays.len() - 1)]).await;
            vec![news(&format!("Notícia da chamada {}", call + 1))]
        }
    }

    struct DelayedAnnouncements(Duration);

    #[async_trait]
    impl AnnouncementSource for DelayedAnnouncements {
        async fn fetch_announcements(&self) -> Vec<ContentItem> {
            tokio::time::sleep(self.0).await;
            vec![announcement("Aviso", 1)]
        }
    }

    #[tokio::test]
    async fn test_combined_announcements_first() {
        let mut news_source = MockNewsSource::new();
        news_source
            .expect_fetch_news()
            .times(1)
            .returning(|| vec![news("N1"), news("N2")]);

        let mut announcement_source = MockAnnouncementSource::new();
        announcement_source
            .expect_fetch_announcements()
            .times(1)
            .returning(|| vec![announcement("Antigo", 1), announcement("Novo", 5)]);

        let mut aggregator = ContentAggregator::new(
            Arc::new(news_source),
            Arc::new(announcement_source),
            Arc::new(Metrics::new()),
        );

        let generation = aggregator.refresh();
        let combined = aggregator.next_combined().await;

        assert_eq!(combined.generation, generation);
        assert_eq!(titles(&combined), vec!["Novo", "Antigo", "N1", "N2"]);
        assert!(!aggregator.is_pending());
    }

    #[tokio::test]
    async fn test_both_empty_still_publishes() {
        let mut news_source = MockNewsSource::new();
        news_source.expect_fetch_news().returning(Vec::new);
        let mut announcement_source = MockAnnouncementSource::new();
        announcement_source
            .expect_fetch_announcements()
            .returning(Vec::new);

        let mut aggregator = ContentAggregator::new(
            Arc::new(news_source),
            Arc::new(announcement_source),
            Arc::new(Metrics::new()),
        );

        aggregator.refresh();
        let combined = aggregator.next_combined().await;
        assert!(combined.items.is_empty());
    }

    #[tokio::test]
    async fn test_handlers_called_once_per_generation() {
        let mut news_source = MockNewsSource::new();
        news_source.expect_fetch_news().returning(|| vec![news("N1")]);
        let mut announcement_source = MockAnnouncementSource::new();
        announcement_source
            .expect_fetch_announcements()
            .returning(Vec::new);

        let mut aggregator = ContentAggregator::new(
            Arc::new(news_source),
            Arc::new(announcement_source),
            Arc::new(Metrics::new()),
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        aggregator.on_combined(move |combined| {
            sink.lock().unwrap().push(combined.generation);
        });

        aggregator.refresh();
        aggregator.next_combined().await;
        aggregator.refresh();
        aggregator.next_combined().await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_both_sources() {
        let news_source = DelayedNews {
            calls: AtomicUsize::new(0),
            delays: vec![Duration::from_secs(1)],
        };
        let mut aggregator = ContentAggregator::new(
            Arc::new(news_source),
            Arc::new(DelayedAnnouncements(Duration::from_secs(5))),
            Arc::new(Metrics::new()),
        );
        aggregator.refresh();

        let mut next = task::spawn(aggregator.next_combined());
        assert_pending!(next.poll());

        // News reported, announcements still outstanding
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_pending!(next.poll());

        tokio::time::sleep(Duration::from_secs(4)).await;
        let combined = assert_ready!(next.poll());
        assert_eq!(titles(&combined), vec!["Aviso", "Notícia da chamada 1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_refresh_supersedes_first() {
        // First call is slow, second is fast: only the second may be published
        let news_source = DelayedNews {
            calls: AtomicUsize::new(0),
            delays: vec![Duration::from_secs(10), Duration::from_secs(1)],
        };
        let metrics = Arc::new(Metrics::new());
        let mut aggregator = ContentAggregator::new(
            Arc::new(news_source),
            Arc::new(DelayedAnnouncements(Duration::from_millis(100))),
            Arc::clone(&metrics),
        );

        let first = aggregator.refresh();
        tokio::task::yield_now().await;
        let second = aggregator.refresh();
        assert!(second > first);

        let combined = aggregator.next_combined().await;
        assert_eq!(combined.generation, second);
        assert_eq!(combined.items.len(), 2);

        // Nothing further arrives for the superseded generation
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(aggregator.report_rx.try_recv().is_err());
        assert_eq!(
            metrics
                .refresh_completed
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_stale_and_duplicate_reports_ignored() {
        let mut news_source = MockNewsSource::new();
        news_source.expect_fetch_news().returning(Vec::new);
        let mut announcement_source = MockAnnouncementSource::new();
        announcement_source
            .expect_fetch_announcements()
            .returning(Vec::new);

        let metrics = Arc::new(Metrics::new());
        let mut aggregator = ContentAggregator::new(
            Arc::new(news_source),
            Arc::new(announcement_source),
            Arc::clone(&metrics),
        );
        let generation = aggregator.refresh();

        let stale = SourceReport {
            generation: generation + 10,
            payload: SourcePayload::News(vec![news("Velha")]),
        };
        assert!(aggregator.accept(stale).is_none());
        assert_eq!(
            metrics
                .stale_reports
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );

        let first = SourceReport {
            generation,
            payload: SourcePayload::News(vec![news("Primeira")]),
        };
        let duplicate = SourceReport {
            generation,
            payload: SourcePayload::News(vec![news("Repetida")]),
        };
        assert!(aggregator.accept(first).is_none());
        assert!(aggregator.accept(duplicate).is_none());

        let combined = aggregator
            .accept(SourceReport {
                generation,
                payload: SourcePayload::Announcements(Vec::new()),
            })
            .unwrap();
        assert_eq!(titles(&combined), vec!["Primeira"]);
    }
}
