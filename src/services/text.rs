//! Text normalisation for feed markup.
//!
//! Feed descriptions arrive as HTML fragments (WordPress output, usually with a
//! leading `<img>`). The kiosk shows them as plain text, so this module:
//! - strips `<script>`/`<style>` blocks, comments and tags
//! - decodes the common HTML entities
//! - collapses whitespace runs to single spaces
//! - finds the first image reference and repairs doubled-base URLs
//! - truncates at word boundaries

use regex::{Captures, Regex};

/// Marker appended to text that was cut short
pub const ELLIPSIS: &str = "...";

/// Result of cutting a text to a character limit.
///
/// `head` borrows from the input and never ends inside a word unless the
/// text had no whitespace to cut at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncated<'a> {
    pub head: &'a str,
    pub truncated: bool,
}

impl Truncated<'_> {
    /// The head with [`ELLIPSIS`] appended when truncation happened
    pub fn with_ellipsis(&self) -> String {
        if self.truncated {
            format!("{}{}", self.head, ELLIPSIS)
        } else {
            self.head.to_string()
        }
    }
}

/// Cut `text` to at most `limit` characters.
///
/// The cut happens at the last whitespace at or before the limit when one
/// exists, otherwise it is a hard cut at `limit` characters.
pub fn truncate_words(text: &str, limit: usize) -> Truncated<'_> {
    if text.chars().count() <= limit {
        return Truncated {
            head: text,
            truncated: false,
        };
    }

    // Byte offset of the first character past the limit
    let cut = text
        .char_indices()
        .nth(limit)
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    // A whitespace character sitting exactly at the limit is a clean boundary too
    let window_end = cut + text[cut..].chars().next().map_or(0, char::len_utf8);

    let boundary = text[..window_end]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, _)| text[..i].trim_end())
        .filter(|head| !head.is_empty());

    Truncated {
        head: boundary.unwrap_or(&text[..cut]),
        truncated: true,
    }
}

/// Repair an image URL produced by concatenating a base site URL with an
/// already absolute URL.
///
/// `https://fct.ufg.brhttps://cdn.example/x.jpg` becomes
/// `https://cdn.example/x.jpg`. Anything else is returned unchanged.
pub fn repair_image_url(url: &str) -> &str {
    let lower = url.to_ascii_lowercase();

    let Some(rest_start) = lower.find("://").map(|i| i + 3) else {
        return url;
    };
    if !lower.starts_with("http") {
        return url;
    }

    let rest = &lower[rest_start..];
    let nested = ["https://", "http://"]
        .iter()
        .filter_map(|scheme| rest.find(scheme))
        .min();

    match nested {
        // Only a bare host may precede the second scheme
        Some(offset) if !rest[..offset].contains(|c: char| matches!(c, '/' | '?' | '#')) => {
            &url[rest_start + offset..]
        }
        _ => url,
    }
}

/// Resolve an image reference to an absolute `http(s)` URL.
///
/// Applies [`repair_image_url`] first, then resolves relative references
/// against `base`. Returns `None` for anything that does not end up as an
/// absolute web URL (data URIs, garbage).
pub fn resolve_image_url(raw: &str, base: Option<&reqwest::Url>) -> Option<String> {
    let repaired = repair_image_url(raw.trim());
    if repaired.is_empty() {
        return None;
    }

    let parsed = match reqwest::Url::parse(repaired) {
        Ok(url) => url,
        Err(_) => base?.join(repaired).ok()?,
    };

    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

/// Compiled patterns for markup cleanup
///
/// Patterns are compiled once at construction; the feed fetcher keeps one
/// instance for its whole lifetime.
pub struct TextCleaner {
    /// `<script>`/`<style>` blocks and HTML comments, removed with their content
    hidden_blocks: Regex,

    /// Any remaining tag
    tag: Regex,

    /// First `src` attribute of an `<img>` tag (double, single or unquoted)
    img_src: Regex,

    /// Named and numeric character references
    entity: Regex,
}

impl TextCleaner {
    /// Create a new TextCleaner with compiled regex patterns
    pub fn new() -> Self {
        Self {
            hidden_blocks: Regex::new(
                r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->",
            )
            .expect("Invalid hidden block regex"),
            tag: Regex::new(r"(?s)<[^>]*>").expect("Invalid tag regex"),
            img_src: Regex::new(
                r#"(?is)<img\b[^>]*?\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#,
            )
            .expect("Invalid img regex"),
            entity: Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});")
                .expect("Invalid entity regex"),
        }
    }

    /// Convert an HTML fragment to a single line of plain text
    pub fn strip_markup(&self, html: &str) -> String {
        let visible = self.hidden_blocks.replace_all(html, " ");
        let untagged = self.tag.replace_all(&visible, " ");
        let decoded = self.decode_entities(&untagged);
        collapse_whitespace(&decoded)
    }

    /// Locate the first `<img src>` in raw markup
    pub fn first_image_src(&self, html: &str) -> Option<String> {
        let caps = self.img_src.captures(html)?;
        let raw = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))?
            .as_str();

        let src = self.decode_entities(raw).trim().to_string();
        (!src.is_empty()).then_some(src)
    }

    /// Decode named and numeric character references; unknown names are kept verbatim
    pub fn decode_entities(&self, text: &str) -> String {
        self.entity
            .replace_all(text, |caps: &Captures| {
                let body = &caps[1];
                decode_entity(body).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_entity(body: &str) -> Option<String> {
    if let Some(numeric) = body.strip_prefix('#') {
        let code = match numeric.strip_prefix(|c: char| c == 'x' || c == 'X') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    let decoded = match body {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "hellip" => "…",
        "ndash" => "–",
        "mdash" => "—",
        "lsquo" => "‘",
        "rsquo" => "’",
        "ldquo" => "“",
        "rdquo" => "”",
        "laquo" => "«",
        "raquo" => "»",
        "ordm" => "º",
        "ordf" => "ª",
        "aacute" => "á",
        "eacute" => "é",
        "iacute" => "í",
        "oacute" => "ó",
        "uacute" => "ú",
        "atilde" => "ã",
        "otilde" => "õ",
        "acirc" => "â",
        "ecirc" => "ê",
        "ocirc" => "ô",
        "agrave" => "à",
        "ccedil" => "ç",
        "Aacute" => "Á",
        "Eacute" => "É",
        "Iacute" => "Í",
        "Oacute" => "Ó",
        "Uacute" => "Ú",
        "Atilde" => "Ã",
        "Ccedil" => "Ç",
        _ => return None,
    };
    Some(decoded.to_string())
}

/// Collapse every whitespace run (including non-breaking spaces) to one space
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
