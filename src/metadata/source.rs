//! Supplementary metadata sites consulted after the chapter source.

use std::path::Path;

use async_trait::async_trait;
use scraper::{ElementRef, Node};
use serde_json::{Map, Value};
use url::Url;

/// A search result offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub url: String,
    /// Short hint shown next to the title (media type, snippet).
    pub note: Option<String>,
}

/// An image worth keeping next to the title's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// `cover`, `infobox_image_1`, ...
    pub kind: String,
    pub url: String,
}

/// What a source knows about one title.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceRecord {
    /// Title as the source spells it; may steer the next source's search.
    pub title: Option<String>,
    pub images: Vec<SourceImage>,
    /// Stored under `<name>_data` in `metadata.json`.
    pub data: Map<String, Value>,
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Lowercase key used in file names and `metadata.json`.
    fn name(&self) -> &'static str;

    async fn search(&self, term: &str) -> anyhow::Result<Vec<Candidate>>;

    async fn details(&self, candidate: &Candidate) -> anyhow::Result<SourceRecord>;

    async fn download(&self, url: &str, dest: &Path) -> anyhow::Result<u64>;
}

/// Trimmed text with whitespace runs folded to single spaces.
pub(crate) fn squeeze(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    squeeze(&element.text().collect::<String>())
}

/// Text of `element` with every `<br>` replaced by `separator`. Script and
/// style contents are dropped.
pub(crate) fn text_with_breaks(element: ElementRef<'_>, separator: &str) -> String {
    let mut lines = vec![String::new()];
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = node
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .any(|parent| matches!(parent.value().name(), "script" | "style"));
                if !hidden && let Some(line) = lines.last_mut() {
                    line.push_str(text);
                }
            }
            Node::Element(el) if el.name() == "br" => lines.push(String::new()),
            _ => {}
        }
    }
    lines
        .iter()
        .map(|line| squeeze(line))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Absolute form of an image or link reference; protocol-relative URLs get
/// `https:`.
pub(crate) fn absolute_url(page: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    match reference.strip_prefix("//") {
        Some(rest) => Some(format!("https://{rest}")),
        None => page.join(reference).ok().map(String::from),
    }
}
