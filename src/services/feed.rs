use super::text::{ELLIPSIS, TextCleaner, resolve_image_url, truncate_words};
use super::{FetchError, NewsSource, http};
use crate::models::{ContentItem, PanelConfig};
use async_trait::async_trait;
use chrono::DateTime;

/// Shown instead of a publish date that cannot be parsed
pub const DATE_UNAVAILABLE: &str = "Data indisponível";

/// Presentation format for publish dates (`19/10/2026 às 14:30`)
const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y às %H:%M";

/// Settings consumed by [`FeedFetcher`], taken from [`PanelConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub url: String,
    pub max_items: usize,
    pub title_limit: usize,
    pub description_limit: usize,
    pub description_hint: String,
    pub date_format: String,
}

impl FeedSettings {
    pub fn from_config(config: &PanelConfig) -> Self {
        Self {
            url: config.feed_url.clone(),
            max_items: config.max_news_items,
            title_limit: config.title_limit,
            description_limit: config.description_limit,
            description_hint: config.description_hint.clone(),
            date_format: config.feed_date_format.clone(),
        }
    }
}

/// Fetches the institution's RSS feed and normalises its entries into news items
///
/// For each of the first `max_items` entries (feed order, no re-sorting):
/// - title and description are stripped to plain text and truncated at word
///   boundaries; a truncated description gets the "read more via QR code" hint
/// - the first `<img>` of the raw description becomes the item image, after
///   repairing doubled-base URLs and resolving relative ones against the feed URL
/// - the publish date is reformatted, or replaced by [`DATE_UNAVAILABLE`]
///
/// No caching: every call performs one HTTP request.
pub struct FeedFetcher {
    client: reqwest::Client,
    settings: FeedSettings,
    base_url: Option<reqwest::Url>,
    cleaner: TextCleaner,
}

impl FeedFetcher {
    pub fn new(client: reqwest::Client, settings: FeedSettings) -> Self {
        let base_url = reqwest::Url::parse(&settings.url).ok();
        Self {
            client,
            settings,
            base_url,
            cleaner: TextCleaner::new(),
        }
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    /// Retrieve and parse the feed
    ///
    /// # Errors
    ///
    /// [`FetchError`] on transport failure, non-success status or malformed XML.
    pub async fn fetch(&self) -> Result<Vec<ContentItem>, FetchError> {
        let body = http::get_bytes(&self.client, &self.settings.url).await?;
        self.parse(&body)
    }

    /// Fetch, logging and degrading any failure to an empty list
    pub async fn fetch_or_empty(&self) -> Vec<ContentItem> {
        match self.fetch().await {
            Ok(items) => {
                tracing::info!("Feed: {} news item(s) from {}", items.len(), self.settings.url);
                items
            }
            Err(e) => {
                tracing::warn!(
                    source = "feed",
                    url = %self.settings.url,
                    "Failed to fetch news, continuing without them: {}",
                    e
                );
                Vec::new()
            }
        }
    }

    /// Parse an RSS document into at most `max_items` news items
    pub fn parse(&self, body: &[u8]) -> Result<Vec<ContentItem>, FetchError> {
        let channel = rss::Channel::read_from(body)
            .map_err(|e| FetchError::parse("RSS feed", &self.settings.url, e))?;

        Ok(channel
            .items()
            .iter()
            .take(self.settings.max_items)
            .map(|entry| self.normalize(entry))
            .collect())
    }

    fn normalize(&self, entry: &rss::Item) -> ContentItem {
        let raw_description = entry.description().unwrap_or_default();

        // The image must be found before the markup is stripped
        let image_url = self
            .cleaner
            .first_image_src(raw_description)
            .and_then(|src| resolve_image_url(&src, self.base_url.as_ref()));

        let title_text = self.cleaner.strip_markup(entry.title().unwrap_or_default());
        let title = truncate_words(&title_text, self.settings.title_limit).with_ellipsis();

        let description_text = self.cleaner.strip_markup(raw_description);
        let cut = truncate_words(&description_text, self.settings.description_limit);
        let description = if cut.truncated {
            format!("{}{} {}", cut.head, ELLIPSIS, self.settings.description_hint)
        } else {
            cut.head.to_string()
        };

        let display_date = format_publish_date(entry.pub_date(), &self.settings.date_format);

        ContentItem::news(
            title,
            description,
            entry.link().map(str::to_string),
            image_url,
            display_date,
            cut.truncated,
        )
    }
}

#[async_trait]
impl NewsSource for FeedFetcher {
    async fn fetch_news(&self) -> Vec<ContentItem> {
        self.fetch_or_empty().await
    }
}

/// Reformat a feed timestamp for display, never failing
///
/// Tries `format` first and RFC 2822 second; anything else yields
/// [`DATE_UNAVAILABLE`].
pub fn format_publish_date(raw: Option<&str>, format: &str) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return DATE_UNAVAILABLE.to_string();
    };

    match DateTime::parse_from_str(raw, format).or_else(|_| DateTime::parse_from_rfc2822(raw)) {
        Ok(published) => published.format(DISPLAY_DATE_FORMAT).to_string(),
        Err(e) => {
            tracing::debug!("Unparseable publish date {:?}: {}", raw, e);
            DATE_UNAVAILABLE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fetcher(max_items: usize) -> FeedFetcher {
        let settings = FeedSettings {
            max_items,
            title_limit: 30,
            description_limit: 60,
            ..FeedSettings::from_config(&PanelConfig::default())
        };
        let client = http::build_client(Duration::from_secs(1)).unwrap();
        FeedFetcher::new(client, settings)
    }

    fn rss(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>FCT</title><link>https://fct.ufg.br</link>
<description>Notícias</description>{items}</channel></rss>"#
        )
    }

    #[test]
    fn test_parse_normalizes_entry() {
        let body = rss(r#"<item>
            <title>Semana de Engenharia &amp; Tecnologia começa nesta segunda-feira</title>
            <link>https://fct.ufg.br/n/1</link>
            <description><![CDATA[<p><img src="https://fct.ufg.brhttps://files.cercomp.ufg.br/weby/up/1.jpg" />A <b>Semana</b> traz palestras, minicursos e oficinas para toda a comunidade acadêmica.</p>]]></description>
            <pubDate>Mon, 03 Mar 2025 14:30:00 -0300</pubDate>
        </item>"#);

        let items = fetcher(6).parse(body.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.title, "Semana de Engenharia &...");
        assert_eq!(
            item.image_url.as_deref(),
            Some("https://files.cercomp.ufg.br/weby/up/1.jpg")
        );
        assert_eq!(item.link.as_deref(), Some("https://fct.ufg.br/n/1"));
        assert_eq!(item.display_date, "03/03/2025 às 14:30");
        assert!(item.truncated);
        assert!(
            item.description
                .starts_with("A Semana traz palestras, minicursos e oficinas para toda a... ")
        );
        assert!(item.description.ends_with("(Leia a notícia completa no QR Code)"));
        assert!(!item.description.contains('<'));
    }

    #[test]
    fn test_parse_keeps_feed_order_and_limit() {
        let entries: String = (1..=8)
            .map(|i| {
                format!("<item><title>Notícia {i}</title><description>Texto {i}</description></item>")
            })
            .collect();

        let items = fetcher(6).parse(rss(&entries).as_bytes()).unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Notícia 1", "Notícia 2", "Notícia 3", "Notícia 4", "Notícia 5", "Notícia 6"]
        );
    }

    #[test]
    fn test_parse_missing_fields_use_placeholders() {
        let body = rss("<item><link>https://fct.ufg.br/n/2</link></item>");
        let items = fetcher(6).parse(body.as_bytes()).unwrap();

        assert_eq!(items[0].title, crate::models::TITLE_PLACEHOLDER);
        assert_eq!(items[0].description, crate::models::DESCRIPTION_PLACEHOLDER);
        assert_eq!(items[0].display_date, DATE_UNAVAILABLE);
        assert_eq!(items[0].image_url, None);
        assert!(!items[0].truncated);
    }

    #[test]
    fn test_relative_image_resolved_against_feed_url() {
        let body = rss(
            r#"<item><title>T</title><description>&lt;img src="/up/foto.png"&gt;Texto</description></item>"#,
        );
        let items = fetcher(6).parse(body.as_bytes()).unwrap();
        assert_eq!(
            items[0].image_url.as_deref(),
            Some("https://fct.ufg.br/up/foto.png")
        );
        assert_eq!(items[0].description, "Texto");
    }

    #[test]
    fn test_malformed_feed_is_parse_error() {
        let err = fetcher(6).parse(b"<html>not a feed").unwrap_err();
        assert!(matches!(err, FetchError::Parse { what: "RSS feed", .. }));
    }

    #[test]
    fn test_format_publish_date() {
        let format = "%a, %d %b %Y %H:%M:%S %z";
        assert_eq!(
            format_publish_date(Some("Tue, 10 Jun 2025 09:05:00 +0000"), format),
            "10/06/2025 às 09:05"
        );
        // RFC 2822 fallback accepts named zones
        assert_eq!(
            format_publish_date(Some("Tue, 10 Jun 2025 09:05:00 GMT"), format),
            "10/06/2025 às 09:05"
        );
        assert_eq!(format_publish_date(Some("ontem"), format), DATE_UNAVAILABLE);
        assert_eq!(format_publish_date(None, format), DATE_UNAVAILABLE);
    }
}
