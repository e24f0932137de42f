//! Data models for the painel engine.
//!
//! This module contains the core data structures shared by the fetchers, the
//! engine and the host:
//! - [`ContentItem`]: a single news entry or announcement, immutable once built
//! - [`ContentList`]: the ordered list a fetch cycle publishes (announcements first)
//! - [`PanelConfig`]: kiosk settings loaded from `painel.yaml`
//! - [`PageEntry`]: a side-menu page shown in the embedded browser
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: config structs derive `Serialize`/`Deserialize` for YAML persistence
//! - **Immutable**: content is replaced wholesale on every refresh, never patched in place

pub mod config;
pub mod content;

pub use config::{PageEntry, PanelConfig};
pub use content::{
    ContentItem, ContentKind, ContentList, DESCRIPTION_PLACEHOLDER, TITLE_PLACEHOLDER,
};
