//! Content engine - the single-writer actor behind the carousel.
//!
//! The engine owns the [`ContentAggregator`], the [`RotationEngine`] and the
//! [`ImageLoader`] and is the only task that mutates them. Everything else talks
//! to it through an [`EngineHandle`]:
//!
//! - commands go in over an `mpsc` queue
//! - [`EngineEvent`]s come out over a `broadcast` channel
//!
//! # Event loop
//!
//! One `tokio::select!` multiplexes:
//! - handle commands (refresh, manual navigation, snapshot, shutdown)
//! - combined results from the aggregator (replace the rotation list)
//! - image reports (applied only if their ticket is still current)
//! - the rotation timer (only while there is content to rotate)
//! - the refresh timer (its first tick is the startup refresh)
//!
//! Fetches run as separate tasks and report by message, so the loop never
//! blocks on the network.

pub mod aggregator;
pub mod idle;
pub mod images;
pub mod rotation;

pub use aggregator::{CombinedContent, ContentAggregator};
pub use idle::{IdleEvent, IdleMonitor};
pub use images::{ImageLoader, ImageOutcome, ImageReport, ImageTicket};
pub use rotation::{
    CurrentItem, EngineEvent, ImageRequest, ImageState, RotationEngine, RotationError,
    RotationPhase,
};

use crate::metrics::Metrics;
use crate::models::PanelConfig;
use crate::services::{AnnouncementSource, ImageSource, NewsSource};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

/// Errors returned by [`EngineHandle`] operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Content engine is not running")]
    Stopped,

    #[error(transparent)]
    Rotation(#[from] RotationError),
}

/// Timing and sizing parameters the engine reads at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub rotation_interval: Duration,
    pub refresh_interval: Duration,
    pub image_max_width: u32,
    pub image_max_height: u32,
    pub qr_size: u32,
}

impl EngineSettings {
    pub fn from_config(config: &PanelConfig) -> Self {
        Self {
            rotation_interval: config.rotation_interval(),
            refresh_interval: config.refresh_interval(),
            image_max_width: config.image_max_width,
            image_max_height: config.image_max_height,
            qr_size: config.qr_size,
        }
    }
}

/// Messages from an [`EngineHandle`] to the actor
#[derive(Debug)]
enum EngineCommand {
    Refresh {
        reply: oneshot::Sender<u64>,
    },
    ForceAdvance,
    ForceIndex {
        index: usize,
        reply: oneshot::Sender<Result<(), RotationError>>,
    },
    Current {
        reply: oneshot::Sender<Option<CurrentItem>>,
    },
    Shutdown,
}

/// Content engine builder
///
/// Holds the sources and settings until [`spawn()`](Self::spawn) moves them
/// into the actor task.
pub struct ContentEngine {
    settings: EngineSettings,
    news: Arc<dyn NewsSource>,
    announcements: Arc<dyn AnnouncementSource>,
    images: Arc<dyn ImageSource>,
    metrics: Arc<Metrics>,
}

impl ContentEngine {
    pub fn new(
        settings: EngineSettings,
        news: Arc<dyn NewsSource>,
        announcements: Arc<dyn AnnouncementSource>,
        images: Arc<dyn ImageSource>,
    ) -> Self {
        Self {
            settings,
            news,
            announcements,
            images,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Start the actor task
    ///
    /// The first refresh happens immediately. Must be called from within a
    /// tokio runtime.
    pub fn spawn(self) -> EngineHandle {
        let metrics = self.metrics;
        let aggregator =
            ContentAggregator::new(self.news, self.announcements, Arc::clone(&metrics));
        let rotation = RotationEngine::new(self.settings.qr_size, Arc::clone(&metrics));
        let (loader, image_rx) = ImageLoader::new(
            self.images,
            self.settings.image_max_width,
            self.settings.image_max_height,
            Arc::clone(&metrics),
        );

        let events = rotation.event_sender();
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = EngineActor {
            settings: self.settings,
            aggregator,
            rotation,
            loader,
            image_rx,
            command_rx,
            metrics: Arc::clone(&metrics),
        };
        let task = tokio::spawn(actor.run());

        EngineHandle {
            commands: command_tx,
            events,
            metrics,
            task,
        }
    }
}

/// Handle to a running content engine
///
/// Dropping the handle stops the engine once its command queue is drained;
/// [`shutdown()`](Self::shutdown) stops it and waits for the task to finish.
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    events: broadcast::Sender<EngineEvent>,
    metrics: Arc<Metrics>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Start a refresh cycle now, superseding any pending one
    ///
    /// # Returns
    /// The generation of the new cycle
    pub async fn refresh(&self) -> Result<u64, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Refresh { reply }).await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    /// Show the next item now; a no-op while there is no content
    pub async fn force_advance(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::ForceAdvance).await
    }

    /// Show the item at `index`
    ///
    /// # Errors
    ///
    /// [`EngineError::Rotation`] when there is no content or `index` is out of
    /// range; [`EngineError::Stopped`] when the engine is gone.
    pub async fn force_index(&self, index: usize) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::ForceIndex { index, reply }).await?;
        rx.await.map_err(|_| EngineError::Stopped)??;
        Ok(())
    }

    /// Snapshot of the item currently displayed
    pub async fn current(&self) -> Result<Option<CurrentItem>, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Current { reply }).await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    /// Stop the engine and wait for it to finish
    pub async fn shutdown(self) {
        if self.commands.send(EngineCommand::Shutdown).await.is_err() {
            tracing::debug!("Content engine already stopped");
        }
        if let Err(e) = self.task.await {
            tracing::error!("Content engine task failed: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Resolves once the actor has exited, for whatever reason
    ///
    /// Event subscribers never see the channel close while this handle is
    /// alive, so hosts watch this instead.
    pub async fn stopped(&self) {
        self.commands.closed().await;
    }

    async fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| EngineError::Stopped)
    }
}

/// State owned by the actor task
struct EngineActor {
    settings: EngineSettings,
    aggregator: ContentAggregator,
    rotation: RotationEngine,
    loader: ImageLoader,
    image_rx: mpsc::UnboundedReceiver<ImageReport>,
    command_rx: mpsc::Receiver<EngineCommand>,
    metrics: Arc<Metrics>,
}

impl EngineActor {
    async fn run(mut self) {
        tracing::info!(
            "Content engine started: rotation every {:?}, refresh every {:?}",
            self.settings.rotation_interval,
            self.settings.refresh_interval
        );

        let mut rotation_timer = timer(self.settings.rotation_interval);
        let mut refresh_timer = timer(self.settings.refresh_interval);
        let mut refresh_ticks: u64 = 0;

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(EngineCommand::Shutdown) | None => break,
                        Some(command) => self.handle_command(command, &mut rotation_timer),
                    }
                }

                combined = self.aggregator.next_combined() => {
                    let request = self.rotation.replace(combined.items);
                    self.load_image(request);
                    // The first item gets a full interval
                    rotation_timer.reset();
                }

                Some(report) = self.image_rx.recv() => {
                    if self.rotation.resolve_image(report.ticket, report.outcome) {
                        tracing::debug!(
                            "Image ready for item {}: {}",
                            report.ticket.index,
                            report.url
                        );
                    }
                }

                _ = rotation_timer.tick(), if self.rotation.is_displaying() => {
                    let request = self.rotation.advance();
                    self.load_image(request);
                }

                _ = refresh_timer.tick() => {
                    refresh_ticks += 1;
                    if refresh_ticks > 1 {
                        self.metrics.log_periodic();
                    }
                    self.aggregator.refresh();
                }
            }
        }

        self.loader.cancel();
        tracing::info!("Content engine stopped");
    }

    fn handle_command(&mut self, command: EngineCommand, rotation_timer: &mut Interval) {
        match command {
            EngineCommand::Refresh { reply } => {
                let generation = self.aggregator.refresh();
                let _ = reply.send(generation);
            }
            EngineCommand::ForceAdvance => {
                let request = self.rotation.force_advance();
                self.load_image(request);
                rotation_timer.reset();
            }
            EngineCommand::ForceIndex { index, reply } => {
                let result = self.rotation.force_index(index).map(|request| {
                    self.load_image(request);
                });
                if result.is_ok() {
                    rotation_timer.reset();
                }
                let _ = reply.send(result);
            }
            EngineCommand::Current { reply } => {
                let _ = reply.send(self.rotation.current());
            }
            EngineCommand::Shutdown => {}
        }
    }

    /// Start the fetch for a newly selected item, or cancel the previous one
    fn load_image(&mut self, request: Option<ImageRequest>) {
        match request {
            Some(request) => self.loader.request(request.ticket, request.url),
            None => {
                self.loader.cancel();
            }
        }
    }
}

fn timer(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
