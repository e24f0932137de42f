use super::{AnnouncementSource, FetchError, http};
use crate::models::ContentItem;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;

/// Wire format of `data_inicio` / `data_fim`
pub const WINDOW_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One element of the announcement API response, before validation
#[derive(Debug, Deserialize)]
struct RawAnnouncement {
    titulo: String,
    #[serde(default)]
    descricao: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    url_imagem: Option<String>,
    data_inicio: String,
    data_fim: String,
    #[serde(default, rename = "targetScreens")]
    target_screens: Option<Value>,
}

/// Fetches administrator-authored announcements from the panel API
///
/// `GET <url>` must answer with a JSON array. Elements are validated one by
/// one: a missing field or an unparseable date skips that element only.
/// Elements addressed to specific screens (`targetScreens` non-empty) are
/// excluded because this installation is a generic, unaddressed screen.
pub struct AnnouncementFetcher {
    client: reqwest::Client,
    url: String,
}

impl AnnouncementFetcher {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Retrieve the announcements active right now (local wall-clock time)
    pub async fn fetch(&self) -> Result<Vec<ContentItem>, FetchError> {
        self.fetch_at(Local::now().naive_local()).await
    }

    /// Retrieve the announcements active at `now`
    pub async fn fetch_at(&self, now: NaiveDateTime) -> Result<Vec<ContentItem>, FetchError> {
        let body = http::get_bytes(&self.client, &self.url).await?;
        parse_announcements(&body, now, &self.url)
    }

    /// Fetch, logging and degrading any failure to an empty list
    pub async fn fetch_or_empty(&self) -> Vec<ContentItem> {
        match self.fetch().await {
            Ok(items) => {
                tracing::info!("Announcements: {} active from {}", items.len(), self.url);
                items
            }
            Err(e) => {
                tracing::warn!(
                    source = "announcements",
                    url = %self.url,
                    "Failed to fetch announcements, continuing without them: {}",
                    e
                );
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl AnnouncementSource for AnnouncementFetcher {
    async fn fetch_announcements(&self) -> Vec<ContentItem> {
        self.fetch_or_empty().await
    }
}

/// Parse an API response body into the announcements active at `now`
///
/// The window check is inclusive on both ends and evaluated once, here.
/// The result is sorted by window start, newest first.
///
/// # Errors
///
/// [`FetchError::Parse`] when the body is not a JSON array. Invalid
/// elements never fail the batch.
pub fn parse_announcements(
    body: &[u8],
    now: NaiveDateTime,
    url: &str,
) -> Result<Vec<ContentItem>, FetchError> {
    let elements: Vec<Value> = serde_json::from_slice(body)
        .map_err(|e| FetchError::parse("announcement list", url, e))?;

    let mut active = Vec::new();
    for (position, element) in elements.into_iter().enumerate() {
        match validate_element(element, now) {
            Ok(Some(item)) => active.push(item),
            Ok(None) => {}
            Err(e) => tracing::warn!("Skipping announcement #{} from {}: {}", position, url, e),
        }
    }

    // Stable: equal start dates keep API order
    active.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));
    Ok(active)
}

/// Validate one element; `Ok(None)` means valid but not shown on this screen now
fn validate_element(element: Value, now: NaiveDateTime) -> Result<Option<ContentItem>, FetchError> {
    let raw: RawAnnouncement =
        serde_json::from_value(element).map_err(|e| FetchError::Validation(e.to_string()))?;

    if raw.titulo.trim().is_empty() {
        return Err(FetchError::Validation("empty titulo".to_string()));
    }

    let start = parse_window_date(&raw.data_inicio, "data_inicio")?;
    let end = parse_window_date(&raw.data_fim, "data_fim")?;

    if is_targeted(raw.target_screens.as_ref()) {
        tracing::debug!("Announcement {:?} is addressed to specific screens, skipping", raw.titulo);
        return Ok(None);
    }

    if !(start <= now && now <= end) {
        tracing::debug!(
            "Announcement {:?} outside its window ({} - {})",
            raw.titulo,
            raw.data_inicio,
            raw.data_fim
        );
        return Ok(None);
    }

    let display_date = format!("Aviso válido até {}", end.format("%d/%m/%Y às %H:%M"));

    Ok(Some(ContentItem::announcement(
        raw.titulo,
        raw.descricao,
        raw.link,
        raw.url_imagem,
        display_date,
        start,
    )))
}

fn parse_window_date(value: &str, field: &str) -> Result<NaiveDateTime, FetchError> {
    NaiveDateTime::parse_from_str(value.trim(), WINDOW_DATE_FORMAT)
        .map_err(|e| FetchError::Validation(format!("{field} {value:?}: {e}")))
}

fn is_targeted(target_screens: Option<&Value>) -> bool {
    match target_screens {
        None | Some(Value::Null) => false,
        Some(Value::Array(screens)) => !screens.is_empty(),
        Some(Value::String(screen)) => !screen.trim().is_empty(),
        Some(Value::Object(screens)) => !screens.is_empty(),
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
    }
}
