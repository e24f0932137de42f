use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Panel configuration loaded from `painel.yaml`
///
/// A flat set of named options consumed read-only by the engine at
/// construction time. Every field has a default so a partial file (or no
/// file at all) still yields a working kiosk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    // Sources
    pub feed_url: String,
    pub announcements_url: String,

    // Text normalisation
    pub max_news_items: usize,
    pub title_limit: usize,
    pub description_limit: usize,
    pub description_hint: String,
    pub feed_date_format: String,

    // Timers (seconds)
    pub rotation_interval_secs: u64,
    pub refresh_interval_secs: u64,
    pub idle_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub image_timeout_secs: u64,

    // Images
    pub image_max_width: u32,
    pub image_max_height: u32,
    pub qr_size: u32,

    // Host
    pub attract_animation: bool,
    pub pages: IndexMap<String, PageEntry>,

    // Logging
    pub log_dir: String,
    pub debug_mode: bool,
    pub json_logs: bool,
}

/// A side-menu entry that opens a full-page website
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    pub label: String,

    /// Pages without a URL are listed but disabled
    #[serde(default)]
    pub url: Option<String>,
}

impl PageEntry {
    fn new(label: &str, url: Option<&str>) -> Self {
        Self {
            label: label.to_string(),
            url: url.map(str::to_string),
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            feed_url: "https://fct.ufg.br/feed".to_string(),
            announcements_url: "http://localhost:3000/api/avisos".to_string(),
            max_news_items: 6,
            title_limit: 80,
            description_limit: 400,
            description_hint: "(Leia a notícia completa no QR Code)".to_string(),
            feed_date_format: "%a, %d %b %Y %H:%M:%S %z".to_string(),
            rotation_interval_secs: 12,
            refresh_interval_secs: 1800,
            idle_timeout_secs: 120,
            http_timeout_secs: 10,
            image_timeout_secs: 15,
            image_max_width: 1280,
            image_max_height: 720,
            qr_size: 150,
            attract_animation: true,
            pages: default_pages(),
            log_dir: "logs".to_string(),
            debug_mode: false,
            json_logs: false,
        }
    }
}

fn default_pages() -> IndexMap<String, PageEntry> {
    let mut pages = IndexMap::new();
    pages.insert(
        "campus".to_string(),
        PageEntry::new("Conheça o Campus", Some("https://prezi.com/view/MZjulFdzyMstq9zoDLVX/")),
    );
    pages.insert(
        "onibus".to_string(),
        PageEntry::new(
            "Linha de Ônibus",
            Some("https://rmtcgoiania.com.br/index.php/linhas-e-trajetos/area-sul?buscar=555"),
        ),
    );
    pages.insert(
        "horarios".to_string(),
        PageEntry::new("Horário de Aulas", Some("https://ti-fct.github.io/horariosFCT/")),
    );
    pages.insert(
        "agenda".to_string(),
        PageEntry::new(
            "Agenda FCT",
            Some("https://calendar.google.com/calendar/embed?src=c_851e8fcd8b81aa4d25fe7044895c1fa3bd8422912a043548c0291dd9a1b28e3f%40group.calendar.google.com&ctz=America%2FSao_Paulo"),
        ),
    );
    pages.insert(
        "mapa".to_string(),
        PageEntry::new(
            "Mapa de Salas",
            Some("https://ti-fct.github.io/Painel-Interativo/mapa.html"),
        ),
    );
    pages.insert("quiz".to_string(), PageEntry::new("Quiz FCT (Em breve)", None));
    pages
}

impl PanelConfig {
    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }

    /// Check values that would make the engine misbehave at runtime
    ///
    /// Returns a list of human-readable problems; empty means valid.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for (name, url) in [
            ("feed_url", &self.feed_url),
            ("announcements_url", &self.announcements_url),
        ] {
            if reqwest::Url::parse(url).is_err() {
                problems.push(format!("{name} is not a valid URL: {url:?}"));
            }
        }

        for (name, secs) in [
            ("rotation_interval_secs", self.rotation_interval_secs),
            ("refresh_interval_secs", self.refresh_interval_secs),
            ("idle_timeout_secs", self.idle_timeout_secs),
            ("http_timeout_secs", self.http_timeout_secs),
            ("image_timeout_secs", self.image_timeout_secs),
        ] {
            if secs == 0 {
                problems.push(format!("{name} must be greater than zero"));
            }
        }

        if self.title_limit == 0 || self.description_limit == 0 {
            problems.push("text limits must be greater than zero".to_string());
        }

        if self.image_max_width == 0 || self.image_max_height == 0 || self.qr_size == 0 {
            problems.push("image dimensions must be greater than zero".to_string());
        }

        for (key, page) in &self.pages {
            if let Some(url) = &page.url {
                if reqwest::Url::parse(url).is_err() {
                    problems.push(format!("page {key} has an invalid URL: {url:?}"));
                }
            }
        }

        problems
    }
}
