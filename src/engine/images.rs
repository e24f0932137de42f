use crate::metrics::Metrics;
use crate::services::ImageSource;
use crate::services::image::decode_to_fit;
use image::RgbaImage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Identifies which displayed item an image fetch belongs to
///
/// A result is applied only while its ticket still equals the rotation
/// engine's current `(generation, index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageTicket {
    pub generation: u64,
    pub index: usize,
}

/// Result of one image fetch
#[derive(Debug, Clone)]
pub enum ImageOutcome {
    Ready(Arc<RgbaImage>),
    /// Transport error, timeout, non-success status or undecodable payload
    Failed,
}

/// Completed fetch delivered back to the engine
#[derive(Debug, Clone)]
pub struct ImageReport {
    pub ticket: ImageTicket,
    pub url: String,
    pub outcome: ImageOutcome,
}

/// Fetches and decodes at most one image at a time
///
/// Starting a request aborts the previous one, so a slow image for an item
/// the carousel already left never competes with the current one. Results
/// arrive on the receiver returned by [`ImageLoader::new`].
pub struct ImageLoader {
    source: Arc<dyn ImageSource>,
    max_width: u32,
    max_height: u32,
    report_tx: mpsc::UnboundedSender<ImageReport>,
    in_flight: Option<(ImageTicket, JoinHandle<()>)>,
    metrics: Arc<Metrics>,
}

impl ImageLoader {
    pub fn new(
        source: Arc<dyn ImageSource>,
        max_width: u32,
        max_height: u32,
        metrics: Arc<Metrics>,
    ) -> (Self, mpsc::UnboundedReceiver<ImageReport>) {
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let loader = Self {
            source,
            max_width,
            max_height,
            report_tx,
            in_flight: None,
            metrics,
        };
        (loader, report_rx)
    }

    /// Start fetching `url` for `ticket`, superseding any in-flight fetch
    pub fn request(&mut self, ticket: ImageTicket, url: String) {
        self.cancel();

        let source = Arc::clone(&self.source);
        let report_tx = self.report_tx.clone();
        let (max_width, max_height) = (self.max_width, self.max_height);

        tracing::debug!(
            "Fetching image for item {} (generation {}): {}",
            ticket.index,
            ticket.generation,
            url
        );

        let task = tokio::spawn(async move {
            let outcome = match source.fetch_image(&url).await {
                Ok(bytes) => {
                    let decode_url = url.clone();
                    let decoded = tokio::task::spawn_blocking(move || {
                        decode_to_fit(&bytes, max_width, max_height, &decode_url)
                    })
                    .await;

                    match decoded {
                        Ok(Ok(img)) => ImageOutcome::Ready(Arc::new(img)),
                        Ok(Err(e)) => {
                            tracing::warn!(
                                source = "image",
                                url = %url,
                                "Image could not be decoded: {}",
                                e
                            );
                            ImageOutcome::Failed
                        }
                        Err(e) => {
                            tracing::error!(
                                source = "image",
                                url = %url,
                                "Image decode task failed: {}",
                                e
                            );
                            ImageOutcome::Failed
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(source = "image", url = %url, "Failed to fetch image: {}", e);
                    ImageOutcome::Failed
                }
            };

            // The engine may have shut down; nothing left to notify then
            let _ = report_tx.send(ImageReport {
                ticket,
                url,
                outcome,
            });
        });

        self.in_flight = Some((ticket, task));
    }

    /// Abort the in-flight fetch, if any; no report is delivered for it
    ///
    /// Returns the ticket of the aborted fetch when one was still running.
    pub fn cancel(&mut self) -> Option<ImageTicket> {
        let (ticket, task) = self.in_flight.take()?;
        if task.is_finished() {
            return None;
        }

        task.abort();
        self.metrics.record_image_discarded();
        tracing::debug!(
            "Cancelled image fetch for item {} (generation {})",
            ticket.index,
            ticket.generation
        );
        Some(ticket)
    }

    /// Ticket of the most recent request, while its task is still running
    pub fn in_flight(&self) -> Option<ImageTicket> {
        self.in_flight
            .as_ref()
            .filter(|(_, task)| !task.is_finished())
            .map(|(ticket, _)| *ticket)
    }
}

impl Drop for ImageLoader {
    fn drop(&mut self) {
        if let Some((_, task)) = self.in_flight.take() {
            task.abort();
        }
    }
}
