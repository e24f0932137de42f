//! End-to-end tests for the content engine with real fetchers and mock servers
//!
//! These tests verify that the engine:
//! - Publishes announcements before news, newest announcement first
//! - Survives a failing or timing-out source without surfacing an error
//! - Reports "no content" when both sources fail
//! - Never applies a superseded item's image
//! - Produces identical lists for unchanged upstream data

use chrono::{Duration as ChronoDuration, Local};
use image::{ImageFormat, Rgb, RgbImage};
use painel::engine::{ContentAggregator, CurrentItem, EngineError, ImageState, RotationError};
use painel::services::announcements::WINDOW_DATE_FORMAT;
use painel::services::{AnnouncementFetcher, FeedFetcher, FeedSettings, ImageFetcher, http};
use painel::{
    ContentEngine, ContentKind, EngineEvent, EngineHandle, EngineSettings, Metrics, PanelConfig,
};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(10);

fn at(offset: ChronoDuration) -> String {
    (Local::now().naive_local() + offset)
        .format(WINDOW_DATE_FORMAT)
        .to_string()
}

fn rss_with_items(count: usize, image_for: impl Fn(usize) -> Option<String>) -> String {
    let items: String = (1..=count)
        .map(|i| {
            let img = image_for(i)
                .map(|src| format!(r#"&lt;img src="{src}"&gt;"#))
                .unwrap_or_default();
            format!(
                "<item><title>Notícia {i}</title><link>https://fct.ufg.br/n/{i}</link>\
                 <description>{img}Texto da notícia {i}</description>\
                 <pubDate>Mon, 03 Mar 2025 10:00:00 -0300</pubDate></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>FCT</title><link>https://fct.ufg.br</link><description>Notícias</description>{items}</channel></rss>"#
    )
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([0, 90, 158]));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

async fn mount(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

fn config_for(server: &MockServer) -> PanelConfig {
    PanelConfig {
        feed_url: format!("{}/feed", server.uri()),
        announcements_url: format!("{}/api/avisos", server.uri()),
        // Long enough that no timer fires during a test
        rotation_interval_secs: 3600,
        refresh_interval_secs: 3600,
        ..PanelConfig::default()
    }
}

fn spawn_engine(config: &PanelConfig, http_timeout: Duration) -> EngineHandle {
    let client = http::build_client(http_timeout).unwrap();
    let feed = FeedFetcher::new(client.clone(), FeedSettings::from_config(config));
    let announcements = AnnouncementFetcher::new(client.clone(), config.announcements_url.clone());
    let images = ImageFetcher::new(client);

    ContentEngine::new(
        EngineSettings::from_config(config),
        Arc::new(feed),
        Arc::new(announcements),
        Arc::new(images),
    )
    .spawn()
}

/// Wait for the next list replacement, returning its event
async fn next_replacement(rx: &mut broadcast::Receiver<EngineEvent>) -> EngineEvent {
    loop {
        let event = timeout(WAIT, rx.recv())
            .await
            .expect("Timeout waiting for content")
            .expect("Channel closed");
        if matches!(
            event,
            EngineEvent::ContentReplaced { .. } | EngineEvent::ContentUnavailable { .. }
        ) {
            return event;
        }
    }
}

/// Walk the whole list through manual navigation
async fn all_items(engine: &EngineHandle, total: usize) -> Vec<CurrentItem> {
    let mut items = Vec::new();
    for index in 0..total {
        engine.force_index(index).await.unwrap();
        items.push(engine.current().await.unwrap().unwrap());
    }
    items
}

#[tokio::test]
async fn test_six_news_and_two_active_announcements() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/feed",
        ResponseTemplate::new(200).set_body_string(rss_with_items(8, |_| None)),
    )
    .await;
    mount(
        &server,
        "/api/avisos",
        ResponseTemplate::new(200).set_body_json(json!([
            {"titulo": "Aviso antigo", "data_inicio": at(-ChronoDuration::days(5)), "data_fim": at(ChronoDuration::days(5))},
            {"titulo": "Aviso expirado", "data_inicio": at(-ChronoDuration::days(9)), "data_fim": at(-ChronoDuration::days(2))},
            {"titulo": "Aviso sem datas"},
            {"titulo": "Aviso recente", "link": "https://fct.ufg.br/aviso",
             "data_inicio": at(-ChronoDuration::days(1)), "data_fim": at(ChronoDuration::days(1))},
        ])),
    )
    .await;

    let config = config_for(&server);
    let engine = spawn_engine(&config, Duration::from_secs(5));
    let mut rx = engine.subscribe();

    let replaced = next_replacement(&mut rx).await;
    assert!(
        matches!(
            replaced,
            EngineEvent::ContentReplaced {
                total: 8,
                announcements: 2,
                news: 6,
                ..
            }
        ),
        "unexpected event {replaced:?}"
    );

    let items = all_items(&engine, 8).await;
    let titles: Vec<_> = items.iter().map(|c| c.item.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Aviso recente",
            "Aviso antigo",
            "Notícia 1",
            "Notícia 2",
            "Notícia 3",
            "Notícia 4",
            "Notícia 5",
            "Notícia 6",
        ]
    );
    assert!(items[..2].iter().all(|c| c.item.kind == ContentKind::Announcement));
    assert!(items[0].qr.is_some());
    assert!(items[1].qr.is_none());
    assert!(items.iter().all(|c| c.total == 8));

    assert_eq!(
        engine.force_index(8).await,
        Err(EngineError::Rotation(RotationError::OutOfRange {
            index: 8,
            len: 8
        }))
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn test_announcement_timeout_still_shows_news() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/feed",
        ResponseTemplate::new(200).set_body_string(rss_with_items(3, |_| None)),
    )
    .await;
    mount(
        &server,
        "/api/avisos",
        ResponseTemplate::new(200)
            .set_body_json(json!([]))
            .set_delay(Duration::from_secs(5)),
    )
    .await;

    let config = config_for(&server);
    let engine = spawn_engine(&config, Duration::from_secs(1));
    let mut rx = engine.subscribe();

    let replaced = next_replacement(&mut rx).await;
    assert!(
        matches!(
            replaced,
            EngineEvent::ContentReplaced {
                total: 3,
                announcements: 0,
                news: 3,
                ..
            }
        ),
        "unexpected event {replaced:?}"
    );

    let current = engine.current().await.unwrap().unwrap();
    assert_eq!(current.item.title, "Notícia 1");
    assert_eq!(current.item.kind, ContentKind::News);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_both_sources_failing_reports_unavailable() {
    let server = MockServer::start().await;
    mount(&server, "/feed", ResponseTemplate::new(500)).await;
    mount(&server, "/api/avisos", ResponseTemplate::new(404)).await;

    let config = config_for(&server);
    let engine = spawn_engine(&config, Duration::from_secs(5));
    let mut rx = engine.subscribe();

    let event = next_replacement(&mut rx).await;
    assert!(matches!(event, EngineEvent::ContentUnavailable { .. }));

    assert_eq!(engine.current().await.unwrap(), None);
    // Advancing with nothing to show is a no-op
    engine.force_advance().await.unwrap();
    assert_eq!(engine.current().await.unwrap(), None);
    assert_eq!(
        engine.force_index(0).await,
        Err(EngineError::Rotation(RotationError::Empty))
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn test_superseded_image_never_applied() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount(
        &server,
        "/feed",
        ResponseTemplate::new(200).set_body_string(rss_with_items(2, |i| {
            Some(format!("{uri}/img/{i}.png"))
        })),
    )
    .await;
    mount(&server, "/api/avisos", ResponseTemplate::new(200).set_body_json(json!([]))).await;
    mount(
        &server,
        "/img/1.png",
        ResponseTemplate::new(200)
            .set_body_bytes(png(32, 32))
            .set_delay(Duration::from_secs(2)),
    )
    .await;
    mount(
        &server,
        "/img/2.png",
        ResponseTemplate::new(200).set_body_bytes(png(16, 8)),
    )
    .await;

    let config = config_for(&server);
    let engine = spawn_engine(&config, Duration::from_secs(5));
    let mut rx = engine.subscribe();

    next_replacement(&mut rx).await;
    // Item 0 is loading its slow image; move on before it arrives
    engine.force_advance().await.unwrap();

    let mut item_one_ready = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(4);
    while let Ok(Ok(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        if let EngineEvent::ItemChanged(current) = event {
            match (current.index, &current.image) {
                (0, ImageState::Ready(_)) => panic!("superseded image was applied"),
                (1, ImageState::Ready(img)) => {
                    assert_eq!(img.dimensions(), (16, 8));
                    item_one_ready = true;
                }
                _ => {}
            }
        }
    }
    assert!(item_one_ready);

    let current = engine.current().await.unwrap().unwrap();
    assert_eq!(current.index, 1);
    assert!(matches!(current.image, ImageState::Ready(_)));
    assert!(engine.metrics().images_discarded.load(Ordering::Relaxed) >= 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_missing_image_reports_failed() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount(
        &server,
        "/feed",
        ResponseTemplate::new(200)
            .set_body_string(rss_with_items(1, |_| Some(format!("{uri}/img/gone.png")))),
    )
    .await;
    mount(&server, "/api/avisos", ResponseTemplate::new(200).set_body_json(json!([]))).await;
    mount(&server, "/img/gone.png", ResponseTemplate::new(404)).await;

    let config = config_for(&server);
    let engine = spawn_engine(&config, Duration::from_secs(5));
    let mut rx = engine.subscribe();
    next_replacement(&mut rx).await;

    let failed = timeout(WAIT, async {
        loop {
            if let Ok(EngineEvent::ItemChanged(current)) = rx.recv().await {
                if current.image == ImageState::Failed {
                    return current;
                }
            }
        }
    })
    .await
    .expect("Timeout waiting for the image failure");

    assert_eq!(failed.index, 0);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_manual_refresh_bumps_generation_and_republishes() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/feed",
        ResponseTemplate::new(200).set_body_string(rss_with_items(2, |_| None)),
    )
    .await;
    mount(&server, "/api/avisos", ResponseTemplate::new(200).set_body_json(json!([]))).await;

    let config = config_for(&server);
    let engine = spawn_engine(&config, Duration::from_secs(5));
    let mut rx = engine.subscribe();
    next_replacement(&mut rx).await;

    engine.force_advance().await.unwrap();
    assert_eq!(engine.current().await.unwrap().unwrap().index, 1);

    let first = engine.refresh().await.unwrap();
    let second = engine.refresh().await.unwrap();
    assert!(second > first);

    next_replacement(&mut rx).await;
    // A new list always restarts from the first item
    assert_eq!(engine.current().await.unwrap().unwrap().index, 0);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_unchanged_upstream_gives_equal_lists() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/feed",
        ResponseTemplate::new(200).set_body_string(rss_with_items(4, |_| None)),
    )
    .await;
    mount(
        &server,
        "/api/avisos",
        ResponseTemplate::new(200).set_body_json(json!([
            {"titulo": "Aviso", "data_inicio": at(-ChronoDuration::days(1)), "data_fim": at(ChronoDuration::days(1))},
        ])),
    )
    .await;

    let config = config_for(&server);
    let client = http::build_client(Duration::from_secs(5)).unwrap();
    let mut aggregator = ContentAggregator::new(
        Arc::new(FeedFetcher::new(client.clone(), FeedSettings::from_config(&config))),
        Arc::new(AnnouncementFetcher::new(client, config.announcements_url.clone())),
        Arc::new(Metrics::new()),
    );

    aggregator.refresh();
    let first = aggregator.next_combined().await;
    aggregator.refresh();
    let second = aggregator.next_combined().await;

    assert_eq!(first.items.len(), 5);
    assert_eq!(first.items, second.items);
    assert_eq!(second.generation, first.generation + 1);
}

#[tokio::test]
async fn test_shutdown_stops_engine() {
    let server = MockServer::start().await;
    let config = config_for(&server);
    let engine = spawn_engine(&config, Duration::from_secs(1));
    assert!(engine.is_running());

    engine.refresh().await.unwrap();
    let metrics = engine.metrics();
    engine.shutdown().await;

    assert!(metrics.refresh_started.load(Ordering::Relaxed) >= 1);
}
