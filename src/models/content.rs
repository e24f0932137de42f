use chrono::NaiveDateTime;

/// Placeholder used when a feed entry or announcement has no usable title.
pub const TITLE_PLACEHOLDER: &str = "Sem título";

/// Placeholder used when a feed entry or announcement has no usable description.
pub const DESCRIPTION_PLACEHOLDER: &str = "Sem descrição disponível.";

/// Where a [`ContentItem`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Entry from the institution's RSS feed
    News,
    /// Administrator-authored item from the announcement API
    Announcement,
}

impl ContentKind {
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::News => "notícia",
            ContentKind::Announcement => "aviso",
        }
    }
}

/// A single carousel entry, immutable once built.
///
/// Items are only produced by the fetchers in [`crate::services`]; the
/// constructors enforce the display invariants:
/// - `title` and `description` are never empty (placeholders substitute
///   missing source data)
/// - `image_url`, when present, is an absolute `http(s)` URL
///
/// # Related Types
///
/// - [`ContentList`]: the ordered list the rotation engine cycles through
/// - [`crate::engine::rotation::RotationEngine`]: owns the cursor over items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub kind: ContentKind,
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub image_url: Option<String>,
    pub display_date: String,
    /// Start of the validity window (announcements only)
    pub sort_key: Option<NaiveDateTime>,
    /// Whether the description was cut to fit the configured limit
    pub truncated: bool,
}

impl ContentItem {
    /// Build a news item from already-normalised feed fields
    pub fn news(
        title: impl Into<String>,
        description: impl Into<String>,
        link: Option<String>,
        image_url: Option<String>,
        display_date: impl Into<String>,
        truncated: bool,
    ) -> Self {
        Self {
            kind: ContentKind::News,
            title: non_empty_or(title.into(), TITLE_PLACEHOLDER),
            description: non_empty_or(description.into(), DESCRIPTION_PLACEHOLDER),
            link: non_blank(link),
            image_url: absolute_or_none(image_url),
            display_date: display_date.into(),
            sort_key: None,
            truncated,
        }
    }

    /// Build an announcement item; `valid_from` becomes the sort key
    pub fn announcement(
        title: impl Into<String>,
        description: Option<String>,
        link: Option<String>,
        image_url: Option<String>,
        display_date: impl Into<String>,
        valid_from: NaiveDateTime,
    ) -> Self {
        Self {
            kind: ContentKind::Announcement,
            title: non_empty_or(title.into(), TITLE_PLACEHOLDER),
            description: non_empty_or(description.unwrap_or_default(), DESCRIPTION_PLACEHOLDER),
            link: non_blank(link),
            image_url: absolute_or_none(image_url),
            display_date: display_date.into(),
            sort_key: Some(valid_from),
            truncated: false,
        }
    }

    pub fn is_announcement(&self) -> bool {
        self.kind == ContentKind::Announcement
    }
}

fn non_empty_or(value: String, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn absolute_or_none(value: Option<String>) -> Option<String> {
    non_blank(value).filter(|url| {
        reqwest::Url::parse(url)
            .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
            .unwrap_or(false)
    })
}

/// Ordered carousel content: announcements first, then news.
///
/// A list is built wholesale by each fetch cycle and never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentList {
    items: Vec<ContentItem>,
}

impl ContentList {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self { items }
    }

    /// Merge one cycle's results: announcements sorted newest-start first,
    /// followed by news in feed order.
    pub fn merge(mut announcements: Vec<ContentItem>, news: Vec<ContentItem>) -> Self {
        // Stable sort keeps API order for equal start dates
        announcements.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));
        announcements.extend(news);
        Self {
            items: announcements,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ContentItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContentItem> {
        self.items.iter()
    }

    pub fn announcement_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_announcement()).count()
    }

    pub fn news_count(&self) -> usize {
        self.len() - self.announcement_count()
    }
}

impl From<Vec<ContentItem>> for ContentList {
    fn from(items: Vec<ContentItem>) -> Self {
        Self::new(items)
    }
}
