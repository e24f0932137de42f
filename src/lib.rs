// Painel - content engine for the FCT/UFG interactive kiosk display
//
// This is the library crate containing the fetchers, the rotation engine and the
// host view model. The binary crate (main.rs) provides a headless console host.

pub mod config;
pub mod engine;
pub mod host;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use engine::{ContentEngine, EngineEvent, EngineHandle, EngineSettings, IdleMonitor};
pub use host::{PanelView, View};
pub use metrics::Metrics;
pub use models::{ContentItem, ContentKind, ContentList, PanelConfig};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
