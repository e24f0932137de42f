//! Integration tests for FeedFetcher against a mock HTTP server
//!
//! These tests verify that the feed fetcher:
//! - Normalises real RSS documents served over HTTP
//! - Resolves relative image references against the feed URL
//! - Classifies HTTP, parse and timeout failures
//! - Degrades every failure to an empty list in `fetch_or_empty`

use painel::PanelConfig;
use painel::services::feed::DATE_UNAVAILABLE;
use painel::services::{FeedFetcher, FeedSettings, FetchError, NewsSource, http};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss(items: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>FCT - Faculdade de Ciências e Tecnologia</title>
    <link>https://fct.ufg.br</link>
    <description>Notícias da FCT</description>
    {items}
  </channel>
</rss>"#
    )
}

fn fetcher(server: &MockServer, timeout: Duration) -> FeedFetcher {
    let settings = FeedSettings {
        url: format!("{}/feed", server.uri()),
        ..FeedSettings::from_config(&PanelConfig::default())
    };
    FeedFetcher::new(http::build_client(timeout).unwrap(), settings)
}

async fn serve(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_normalizes_feed_entries() {
    let server = MockServer::start().await;
    let body = rss(r#"
    <item>
      <title>Inscrições abertas para o Programa de Monitoria 2025</title>
      <link>https://fct.ufg.br/n/180001</link>
      <description><![CDATA[<p><img class="wp-image" src="/up/monitoria.jpg" alt="" /></p><p>Estão abertas as inscrições para monitoria &ndash; confira o edital.</p>]]></description>
      <pubDate>Wed, 05 Mar 2025 09:15:00 -0300</pubDate>
    </item>
    <item>
      <title>Sem data</title>
      <link>https://fct.ufg.br/n/180002</link>
      <description>Texto simples</description>
      <pubDate>amanhã</pubDate>
    </item>"#);
    serve(
        &server,
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/rss+xml")
            .set_body_string(body),
    )
    .await;

    let items = fetcher(&server, Duration::from_secs(5)).fetch().await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(
        items[0].title,
        "Inscrições abertas para o Programa de Monitoria 2025"
    );
    assert_eq!(
        items[0].description,
        "Estão abertas as inscrições para monitoria – confira o edital."
    );
    assert_eq!(
        items[0].image_url.as_deref(),
        Some(format!("{}/up/monitoria.jpg", server.uri()).as_str())
    );
    assert_eq!(items[0].display_date, "05/03/2025 às 09:15");
    assert!(!items[0].truncated);

    assert_eq!(items[1].display_date, DATE_UNAVAILABLE);
    assert_eq!(items[1].image_url, None);
}

#[tokio::test]
async fn test_long_description_gets_hint() {
    let server = MockServer::start().await;
    let long_text = "palavra ".repeat(100);
    let body = rss(&format!(
        "<item><title>Longa</title><description>{long_text}</description></item>"
    ));
    serve(&server, ResponseTemplate::new(200).set_body_string(body)).await;

    let items = fetcher(&server, Duration::from_secs(5)).fetch().await.unwrap();
    let description = &items[0].description;

    assert!(items[0].truncated);
    assert!(description.ends_with("... (Leia a notícia completa no QR Code)"));
    assert!(description.starts_with("palavra palavra"));
    assert!(!description.contains("palavr..."));
}

#[tokio::test]
async fn test_http_error_is_status_and_degrades_to_empty() {
    let server = MockServer::start().await;
    serve(&server, ResponseTemplate::new(503)).await;

    let fetcher = fetcher(&server, Duration::from_secs(5));
    let err = fetcher.fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 503, .. }));

    assert!(fetcher.fetch_news().await.is_empty());
}

#[tokio::test]
async fn test_malformed_feed_is_parse_error() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200).set_body_string("<html><body>manutenção</body></html>"),
    )
    .await;

    let fetcher = fetcher(&server, Duration::from_secs(5));
    let err = fetcher.fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Parse { .. }));
    assert!(fetcher.fetch_or_empty().await.is_empty());
}

#[tokio::test]
async fn test_slow_feed_times_out() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200)
            .set_body_string(rss(""))
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let fetcher = fetcher(&server, Duration::from_millis(300));
    let err = fetcher.fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
    assert!(fetcher.fetch_news().await.is_empty());
}

#[tokio::test]
async fn test_unreachable_feed_is_network_error() {
    let settings = FeedSettings {
        url: "http://127.0.0.1:9/feed".to_string(),
        ..FeedSettings::from_config(&PanelConfig::default())
    };
    let fetcher = FeedFetcher::new(http::build_client(Duration::from_secs(2)).unwrap(), settings);

    let err = fetcher.fetch().await.unwrap_err();
    assert!(err.is_network());
    assert!(fetcher.fetch_news().await.is_empty());
}
