//! Painel - content engine for the FCT/UFG interactive kiosk display
//!
//! Main entry point for the headless console host.
//!
//! # Overview
//!
//! This binary runs the complete content engine without a window. It
//! initializes:
//! - Configuration loading ([`ConfigManager`], `painel.yaml` + `PAINEL_*` env)
//! - Logging infrastructure (file rotation + console output)
//! - Tokio async runtime (2 worker threads for fetches and timers)
//! - The content engine actor ([`ContentEngine`]) and the idle monitor ([`IdleMonitor`])
//! - The view model ([`PanelView`]) a renderer would draw from
//!
//! Every engine event and view change is logged the way a renderer would
//! draw it. Lines on stdin stand in for touch input: each one counts as
//! activity and may carry a command (`next`, `goto <n>`, `refresh`, `menu`,
//! `open <key>`, `home`, `quit`).
//!
//! # Execution Flow
//!
//! 1. Load configuration from the directory given as first argument (default `.`)
//! 2. Initialize logging → logs/painel.<date>
//! 3. Create tokio runtime with 2 worker threads
//! 4. Spawn the engine (first refresh immediately) and the idle monitor
//! 5. Process stdin, engine events and idle timeouts until `quit`, EOF or Ctrl+C
//! 6. Stop the engine, log metrics, shut the runtime down with a 5s timeout

use anyhow::{Context, Result};
use painel::engine::{CurrentItem, IdleEvent, ImageState};
use painel::host::{HostCommand, View};
use painel::logging::{self, LoggingOptions};
use painel::services::{AnnouncementFetcher, FeedFetcher, FeedSettings, ImageFetcher, http};
use painel::{
    APP_NAME, ConfigManager, ContentEngine, EngineEvent, EngineHandle, EngineSettings,
    IdleMonitor, PanelConfig, PanelView, VERSION,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

/// Main entry point for the headless kiosk host
///
/// # Errors
///
/// This function can fail if:
/// - The configuration directory cannot be created or `painel.yaml` is invalid
/// - Logging initialization fails (disk space, permissions)
/// - Tokio runtime or HTTP client creation fails
fn main() -> Result<()> {
    let config_dir = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());

    let config_manager = ConfigManager::new(&config_dir)?;
    if config_manager.ensure_default_config()? {
        eprintln!("Wrote default configuration to {}", config_manager.config_path());
    }
    let config = config_manager.load_config()?;

    // The guard keeps the non-blocking file writer alive until main returns
    let _log_guard = logging::setup_logging(&LoggingOptions::from_config(&config, true))?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("painel-worker")
        .build()
        .context("Failed to build the tokio runtime")?;

    tracing::info!("Tokio runtime initialized with {} worker threads", 2);

    let result = runtime.block_on(run(config));

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Application shutdown complete");

    result
}

/// Wire the engine, the idle monitor and the view model and run until asked to stop
async fn run(config: PanelConfig) -> Result<()> {
    let client = http::build_client(config.http_timeout()).context("Failed to build HTTP client")?;
    let image_client =
        http::build_client(config.image_timeout()).context("Failed to build image HTTP client")?;

    let feed = FeedFetcher::new(client.clone(), FeedSettings::from_config(&config));
    let announcements = AnnouncementFetcher::new(client, config.announcements_url.clone());
    let images = ImageFetcher::new(image_client);

    tracing::info!(
        "Sources: feed {} (up to {} items), announcements {}",
        feed.settings().url,
        feed.settings().max_items,
        announcements.url()
    );

    let engine = ContentEngine::new(
        EngineSettings::from_config(&config),
        Arc::new(feed),
        Arc::new(announcements),
        Arc::new(images),
    )
    .spawn();
    let mut events = engine.subscribe();

    let idle = IdleMonitor::spawn(config.idle_timeout());
    let mut idle_events = idle.subscribe();
    tracing::info!("Returning home after {:?} without interaction", idle.timeout());

    let mut view = PanelView::from_config(&config);
    log_menu(&view);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        idle.note_activity();
                        if view.note_activity() {
                            tracing::info!("Attract animation stopped");
                        }
                        if !handle_line(&line, &engine, &mut view).await {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::info!("Input closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to read input: {}", e);
                        break;
                    }
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => render_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Renderer lagged behind, {} event(s) skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            _ = engine.stopped() => {
                tracing::error!("Content engine stopped unexpectedly");
                break;
            }

            Ok(idle_event) = idle_events.recv() => {
                if idle_event == IdleEvent::TimedOut {
                    view.on_idle();
                    log_view(&view);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    let metrics = engine.metrics();
    engine.shutdown().await;
    metrics.log_summary();

    Ok(())
}

/// Apply one input line; returns false when the host should stop
async fn handle_line(line: &str, engine: &EngineHandle, view: &mut PanelView) -> bool {
    if line.trim().is_empty() {
        // A bare tap only counts as activity
        return true;
    }

    let command = match line.parse::<HostCommand>() {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!("{}", e);
            return true;
        }
    };

    let outcome = match &command {
        HostCommand::Quit => return false,
        HostCommand::Next => engine.force_advance().await.map_err(anyhow::Error::from),
        HostCommand::Goto(_) => match command.index() {
            Some(index) => engine.force_index(index).await.map_err(anyhow::Error::from),
            None => Ok(()),
        },
        HostCommand::Refresh => engine
            .refresh()
            .await
            .map(|generation| tracing::info!("Manual refresh, generation {}", generation))
            .map_err(anyhow::Error::from),
        HostCommand::Menu => {
            let open = view.toggle_menu();
            tracing::info!("Menu {}", if open { "opened" } else { "closed" });
            Ok(())
        }
        HostCommand::Open(key) => view
            .open_page(key)
            .map(|_| ())
            .map_err(anyhow::Error::from),
        HostCommand::Home => {
            view.show_home();
            Ok(())
        }
    };

    match outcome {
        Ok(()) => {
            if matches!(command, HostCommand::Open(_) | HostCommand::Home) {
                log_view(view);
            }
        }
        Err(e) => tracing::warn!("Command {:?} failed: {}", command, e),
    }
    true
}

fn render_event(event: &EngineEvent) {
    match event {
        EngineEvent::ContentReplaced {
            generation,
            total,
            announcements,
            news,
        } => tracing::info!(
            "New content (generation {}): {} item(s), {} announcement(s), {} news",
            generation,
            total,
            announcements,
            news
        ),
        EngineEvent::ContentUnavailable { generation } => tracing::warn!(
            "Nenhum conteúdo disponível no momento. Verifique a conexão (generation {})",
            generation
        ),
        EngineEvent::ItemChanged(current) => render_item(current),
    }
}

fn render_item(current: &CurrentItem) {
    let image = match &current.image {
        ImageState::Loading => "loading".to_string(),
        ImageState::Absent => "none".to_string(),
        ImageState::Ready(img) => format!("{}x{}", img.width(), img.height()),
        ImageState::Failed => "unavailable".to_string(),
    };

    tracing::info!(
        "[{}/{}] {} | {} | {} | image: {} | qr: {}",
        current.index + 1,
        current.total,
        current.item.kind.label(),
        current.item.title,
        current.item.display_date,
        image,
        current.item.link.as_deref().filter(|_| current.qr.is_some()).unwrap_or("-")
    );
    tracing::debug!("{}", current.item.description);
}

fn log_view(view: &PanelView) {
    let screen = match view.view() {
        View::Carousel => "carousel".to_string(),
        View::Page { key, url } => format!("page {} ({})", key, url),
    };
    tracing::info!(
        "View: {}, menu {}, attract animation {}",
        screen,
        if view.menu_open() { "open" } else { "closed" },
        if view.attract_visible() { "on" } else { "off" }
    );
}

fn log_menu(view: &PanelView) {
    for entry in view.menu_entries() {
        tracing::info!(
            "Menu: {} ({}){}",
            entry.label,
            entry.key,
            if entry.enabled { "" } else { " [em breve]" }
        );
    }
}
