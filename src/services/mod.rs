//! Services module - network fetchers and pure content transformations.
//!
//! The services are **framework-agnostic**: they know nothing about the engine
//! actor or the host, take explicit settings at construction and return plain
//! values.
//!
//! # Components
//!
//! - [`FeedFetcher`]: RSS feed → news [`ContentItem`]s (markup stripped, truncated,
//!   first image extracted and repaired)
//! - [`AnnouncementFetcher`]: announcement API → time-windowed announcement items
//! - [`ImageFetcher`]: raw bytes of one remote image
//! - [`qr::encode_url`]: URL → QR code bitmap
//! - [`text`]: markup stripping, entity decoding, word-boundary truncation
//!
//! # Failure policy
//!
//! Every fetcher exposes `fetch()` returning [`FetchError`] and
//! `fetch_or_empty()` which logs the error (source name, URL, cause) and
//! degrades to an empty list. The source traits below are implemented with the
//! degraded form, so the aggregator never observes an error.
//!
//! # Source traits
//!
//! [`NewsSource`], [`AnnouncementSource`] and [`ImageSource`] are the seams the
//! engine depends on; tests substitute in-memory implementations.

pub mod announcements;
pub mod error;
pub mod feed;
pub mod http;
pub mod image;
pub mod qr;
pub mod text;

pub use announcements::AnnouncementFetcher;
pub use error::FetchError;
pub use feed::{FeedFetcher, FeedSettings};
pub use image::ImageFetcher;

use crate::models::ContentItem;
use async_trait::async_trait;

/// Supplier of news items for one refresh cycle
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Fetch the current news; failures degrade to an empty list
    async fn fetch_news(&self) -> Vec<ContentItem>;
}

/// Supplier of active announcements for one refresh cycle
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnnouncementSource: Send + Sync {
    /// Fetch the announcements active now; failures degrade to an empty list
    async fn fetch_announcements(&self) -> Vec<ContentItem>;
}

/// Supplier of raw image bytes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
