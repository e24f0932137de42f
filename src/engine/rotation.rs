// Rotation module
//
// This module provides the RotationEngine which owns the carousel cursor and
// emits EngineEvent notifications for the UI layer.

use super::images::{ImageOutcome, ImageTicket};
use crate::metrics::Metrics;
use crate::models::{ContentItem, ContentList};
use crate::services::qr;
use image::{GrayImage, RgbaImage};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Image status of the displayed item
#[derive(Debug, Clone, PartialEq)]
pub enum ImageState {
    /// A fetch for this item is in flight
    Loading,
    /// The item has no image
    Absent,
    /// Decoded and scaled to the configured bounds
    Ready(Arc<RgbaImage>),
    /// The item has an image URL but it could not be fetched or decoded
    Failed,
}

/// Everything a renderer needs to draw the current carousel slide
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentItem {
    pub generation: u64,
    pub index: usize,
    pub total: usize,
    pub item: ContentItem,
    pub image: ImageState,
    /// QR code for the item's link, when it has one
    pub qr: Option<Arc<GrayImage>>,
}

/// Notifications emitted to the UI layer
///
/// Delivered over a `tokio::sync::broadcast` channel so any number of
/// renderers or loggers can listen without the engine knowing about them.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A refresh produced a new non-empty list; an `ItemChanged` for index 0 follows
    ContentReplaced {
        generation: u64,
        total: usize,
        announcements: usize,
        news: usize,
    },

    /// A refresh produced nothing to show; check connectivity
    ContentUnavailable { generation: u64 },

    /// The displayed item, its position or its image changed
    ItemChanged(CurrentItem),
}

/// Errors from manual navigation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RotationError {
    #[error("No content to navigate")]
    Empty,

    #[error("Index {index} is out of range for {len} item(s)")]
    OutOfRange { index: usize, len: usize },
}

/// Rotation state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPhase {
    /// No content; the rotation timer is disabled
    Empty,
    /// Cycling through a non-empty list
    Displaying,
}

/// Cursor over the published content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationState {
    pub items: ContentList,
    pub current_index: Option<usize>,
    /// Bumped on every list replacement
    pub generation: u64,
}

/// Image fetch the caller must start for the newly selected item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub ticket: ImageTicket,
    pub url: String,
}

/// Carousel cursor with event emission
///
/// Owns the [`RotationState`] exclusively; the UI only sees it through
/// [`EngineEvent`]s. Every operation that selects an item returns the
/// [`ImageRequest`] for it (if the item has an image) instead of fetching
/// itself, so the caller decides how fetches are run and cancelled.
///
/// # State machine
///
/// - `Empty → Displaying` on a non-empty list, cursor at 0
/// - `Displaying → Empty` on an empty list, cursor cleared
/// - `Displaying → Displaying` on advance, or on a new list (cursor back to 0)
///
/// # Related Types
///
/// - [`crate::engine::aggregator::ContentAggregator`]: produces the lists
/// - [`crate::engine::images::ImageLoader`]: runs the returned image requests
/// - [`crate::engine::ContentEngine`]: the actor that owns this engine
pub struct RotationEngine {
    state: RotationState,
    image: ImageState,
    qr: Option<Arc<GrayImage>>,
    qr_size: u32,

    /// Broadcast channel for engine events
    /// Multiple subscribers can listen simultaneously
    events: broadcast::Sender<EngineEvent>,

    metrics: Arc<Metrics>,
}

impl RotationEngine {
    /// Create an empty engine with a broadcast buffer of 100 events
    pub fn new(qr_size: u32, metrics: Arc<Metrics>) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            state: RotationState::default(),
            image: ImageState::Absent,
            qr: None,
            qr_size,
            events,
            metrics,
        }
    }

    /// Subscribe to engine events
    ///
    /// Returns a receiver that will get notified of all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Sender half of the event channel, for handles that subscribe later
    pub fn event_sender(&self) -> broadcast::Sender<EngineEvent> {
        self.events.clone()
    }

    pub fn phase(&self) -> RotationPhase {
        if self.state.current_index.is_some() {
            RotationPhase::Displaying
        } else {
            RotationPhase::Empty
        }
    }

    pub fn is_displaying(&self) -> bool {
        self.phase() == RotationPhase::Displaying
    }

    pub fn state(&self) -> &RotationState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Ticket identifying the displayed item, if any
    pub fn current_ticket(&self) -> Option<ImageTicket> {
        self.state.current_index.map(|index| ImageTicket {
            generation: self.state.generation,
            index,
        })
    }

    /// Snapshot of the displayed item
    pub fn current(&self) -> Option<CurrentItem> {
        let index = self.state.current_index?;
        let item = self.state.items.get(index)?.clone();
        Some(CurrentItem {
            generation: self.state.generation,
            index,
            total: self.state.items.len(),
            item,
            image: self.image.clone(),
            qr: self.qr.clone(),
        })
    }

    /// Replace the whole list and reset the cursor
    ///
    /// Always bumps the generation, so image results for the old list can no
    /// longer match. An empty list moves to `Empty` and emits
    /// [`EngineEvent::ContentUnavailable`].
    pub fn replace(&mut self, items: ContentList) -> Option<ImageRequest> {
        self.state.generation += 1;
        let generation = self.state.generation;

        if items.is_empty() {
            tracing::warn!(
                "No content available (generation {}), check connectivity",
                generation
            );
            self.state.items = items;
            self.state.current_index = None;
            self.image = ImageState::Absent;
            self.qr = None;
            self.emit(EngineEvent::ContentUnavailable { generation });
            return None;
        }

        tracing::info!(
            "Rotation list replaced: {} item(s), generation {}",
            items.len(),
            generation
        );
        self.emit(EngineEvent::ContentReplaced {
            generation,
            total: items.len(),
            announcements: items.announcement_count(),
            news: items.news_count(),
        });
        self.state.items = items;
        self.select(0)
    }

    /// Move to the next item, wrapping around
    ///
    /// A no-op returning `None` while `Empty`.
    pub fn advance(&mut self) -> Option<ImageRequest> {
        let current = self.state.current_index?;
        let next = (current + 1) % self.state.items.len();
        self.select(next)
    }

    /// Manual "next" from the UI; identical to a timer advance
    pub fn force_advance(&mut self) -> Option<ImageRequest> {
        tracing::debug!("Manual advance requested");
        self.advance()
    }

    /// Jump to `index`
    ///
    /// # Errors
    ///
    /// [`RotationError::Empty`] with no content, [`RotationError::OutOfRange`]
    /// for an index past the end. The cursor is unchanged on error.
    pub fn force_index(&mut self, index: usize) -> Result<Option<ImageRequest>, RotationError> {
        let len = self.state.items.len();
        if self.state.current_index.is_none() {
            return Err(RotationError::Empty);
        }
        if index >= len {
            return Err(RotationError::OutOfRange { index, len });
        }
        Ok(self.select(index))
    }

    /// Apply a finished image fetch
    ///
    /// Returns `false` (and changes nothing) when the ticket no longer matches
    /// the displayed item.
    pub fn resolve_image(&mut self, ticket: ImageTicket, outcome: ImageOutcome) -> bool {
        if self.current_ticket() != Some(ticket) || self.image != ImageState::Loading {
            self.metrics.record_image_discarded();
            tracing::debug!(
                "Discarding late image for item {} (generation {})",
                ticket.index,
                ticket.generation
            );
            return false;
        }

        self.image = match outcome {
            ImageOutcome::Ready(img) => {
                self.metrics.record_image_loaded();
                ImageState::Ready(img)
            }
            ImageOutcome::Failed => {
                self.metrics.record_image_failed();
                ImageState::Failed
            }
        };

        if let Some(current) = self.current() {
            self.emit(EngineEvent::ItemChanged(current));
        }
        true
    }

    fn select(&mut self, index: usize) -> Option<ImageRequest> {
        let item = self.state.items.get(index)?;
        let image_url = item.image_url.clone();

        self.qr = item.link.as_deref().and_then(|link| {
            qr::encode_url(link, self.qr_size)
                .map(Arc::new)
                .map_err(|e| tracing::warn!("No QR code for {}: {}", link, e))
                .ok()
        });
        self.image = if image_url.is_some() {
            ImageState::Loading
        } else {
            ImageState::Absent
        };
        self.state.current_index = Some(index);
        self.metrics.record_rotation();

        if let Some(current) = self.current() {
            tracing::debug!(
                "Showing item {}/{} ({}): {}",
                index + 1,
                current.total,
                current.item.kind.label(),
                current.item.title
            );
            self.emit(EngineEvent::ItemChanged(current));
        }

        image_url.map(|url| ImageRequest {
            ticket: ImageTicket {
                generation: self.state.generation,
                index,
            },
            url,
        })
    }

    fn emit(&self, event: EngineEvent) {
        // Ignore send errors - it's OK if no one is listening
        let observed = self.events.send(event).is_ok();
        self.metrics.record_event(observed);
    }
}
