//! Host view routing.
//!
//! Models what the kiosk screen shows without drawing anything: the carousel
//! or one of the full-page websites from the side menu, whether the menu
//! drawer is open, and whether the attract animation is running. A renderer
//! reads this state; the idle monitor and user input drive it.

pub mod command;

pub use command::{CommandError, HostCommand};

use crate::models::{PageEntry, PanelConfig};
use indexmap::IndexMap;
use thiserror::Error;

/// Errors from menu navigation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("Unknown page: {0}")]
    UnknownPage(String),

    #[error("Page {0} is not available yet")]
    PageUnavailable(String),
}

/// Main area of the screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// The content carousel (home)
    Carousel,
    /// An embedded website from the menu
    Page { key: String, url: String },
}

/// One side-menu button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuEntry<'a> {
    pub key: &'a str,
    pub label: &'a str,
    /// Pages without a URL are shown greyed out ("em breve")
    pub enabled: bool,
}

/// Screen state of the kiosk host
///
/// Starts on the carousel with the menu open, like a freshly booted kiosk.
#[derive(Debug, Clone)]
pub struct PanelView {
    pages: IndexMap<String, PageEntry>,
    attract_enabled: bool,
    view: View,
    menu_open: bool,
    attract_visible: bool,
}

impl PanelView {
    pub fn new(pages: IndexMap<String, PageEntry>, attract_enabled: bool) -> Self {
        Self {
            pages,
            attract_enabled,
            view: View::Carousel,
            menu_open: true,
            attract_visible: false,
        }
    }

    pub fn from_config(config: &PanelConfig) -> Self {
        Self::new(config.pages.clone(), config.attract_animation)
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn menu_open(&self) -> bool {
        self.menu_open
    }

    pub fn attract_visible(&self) -> bool {
        self.attract_visible
    }

    /// Menu buttons in configuration order, "home" not included
    pub fn menu_entries(&self) -> impl Iterator<Item = MenuEntry<'_>> {
        self.pages.iter().map(|(key, page)| MenuEntry {
            key,
            label: &page.label,
            enabled: page.url.is_some(),
        })
    }

    /// Return to the carousel; the menu drawer is left as it is
    pub fn show_home(&mut self) -> &View {
        if self.view != View::Carousel {
            tracing::info!("Showing carousel");
        }
        self.view = View::Carousel;
        &self.view
    }

    /// Show the page registered under `key`
    ///
    /// # Errors
    ///
    /// [`ViewError::UnknownPage`] for a key not in the menu,
    /// [`ViewError::PageUnavailable`] for a disabled entry. The view is
    /// unchanged on error.
    pub fn open_page(&mut self, key: &str) -> Result<&View, ViewError> {
        let page = self
            .pages
            .get(key)
            .ok_or_else(|| ViewError::UnknownPage(key.to_string()))?;
        let url = page
            .url
            .clone()
            .ok_or_else(|| ViewError::PageUnavailable(key.to_string()))?;

        tracing::info!("Opening page {} ({})", key, url);
        self.view = View::Page {
            key: key.to_string(),
            url,
        };
        Ok(&self.view)
    }

    /// Open or close the menu drawer; returns the new state
    pub fn toggle_menu(&mut self) -> bool {
        self.menu_open = !self.menu_open;
        self.menu_open
    }

    /// Any user input; returns true if the attract animation was stopped
    pub fn note_activity(&mut self) -> bool {
        std::mem::replace(&mut self.attract_visible, false)
    }

    /// Idle timeout: back to the carousel, menu open, attract animation on
    pub fn on_idle(&mut self) {
        tracing::info!("Returning to home after inactivity");
        self.view = View::Carousel;
        self.menu_open = true;
        self.attract_visible = self.attract_enabled;
    }
}
