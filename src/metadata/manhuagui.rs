//! Manhuagui search and detail pages.
//!
//! Fetching goes through [`ManhuaguiClient`]; the parsers are plain
//! functions over HTML text so they can be exercised without a network.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context as _;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use super::http::SiteHttp;
use crate::ledger::ChapterRecord;

pub const BASE_URL: &str = "https://www.manhuagui.com";

const DETAIL_LINK_TEXT: &str = "详情";

static SEARCH_ENTRIES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.book-result li dt, ul.book-list li dt, div.book-detail dt")
        .expect("search entry selector should compile")
});
static COMIC_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[href^="/comic/"]"#).expect("comic link selector should compile")
});
static ALIAS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("small").expect("alias selector should compile"));
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("anchor selector should compile"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.book-title h1").expect("title selector should compile"));
static COVER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.book-cover img").expect("cover selector should compile"));
static INTRO: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#intro-all, #intro-cut").expect("intro selector should compile")
});
static DETAIL_ITEMS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("ul.detail-list li strong").expect("detail selector should compile")
});
static CHAPTER_SECTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.chapter").expect("chapter selector should compile"));
static HEADING_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span").expect("span selector should compile"));
static CHAPTER_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"ul a[href^="/comic/"]"#).expect("chapter link selector should compile")
});

/// One search result. `title` includes the alias in parentheses when the
/// site lists one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// Everything the detail page says about a title.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TitleDetails {
    pub source_url: String,
    pub title: Option<String>,
    pub cover_url: Option<String>,
    pub introduction: Option<String>,
    /// `label -> value` pairs from the detail list, in page order.
    pub details: Map<String, Value>,
    /// Chapter groups in page order.
    pub chapters: Vec<(String, Vec<ChapterRecord>)>,
}

/// The part of [`TitleDetails`] kept in `metadata.json`.
#[derive(Debug, Clone, Serialize)]
pub struct TitleSummary<'a> {
    pub source_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introduction: Option<&'a str>,
    pub details: &'a Map<String, Value>,
    pub chapter_counts: Map<String, Value>,
}

impl TitleDetails {
    pub fn summary(&self) -> TitleSummary<'_> {
        TitleSummary {
            source_url: &self.source_url,
            title: self.title.as_deref(),
            cover_image_url: self.cover_url.as_deref(),
            introduction: self.introduction.as_deref(),
            details: &self.details,
            chapter_counts: self
                .chapters
                .iter()
                .map(|(group, records)| (group.clone(), Value::from(records.len())))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManhuaguiClient {
    http: SiteHttp,
    base_url: Url,
}

impl ManhuaguiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("parse base url: {base_url}"))?;
        let http = SiteHttp::new(base_url.clone()).context("build manhuagui http client")?;
        Ok(Self { http, base_url })
    }

    pub fn search_url(&self, query: &str) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("base url cannot hold a path: {}", self.base_url))?
            .pop_if_empty()
            .push("s")
            .push(&format!("{query}.html"));
        Ok(url)
    }

    pub async fn search(&self, query: &str) -> anyhow::Result<Vec<SearchHit>> {
        let url = self.search_url(query)?;
        tracing::info!(query, url = %url, "searching manhuagui");
        let html = self.http.get_text(&url).await?;
        let hits = parse_search(&html, &self.base_url);
        tracing::info!(query, hits = hits.len(), "search finished");
        Ok(hits)
    }

    pub async fn details(&self, url: &str) -> anyhow::Result<TitleDetails> {
        let url = Url::parse(url).with_context(|| format!("parse detail url: {url}"))?;
        tracing::info!(url = %url, "fetching title details");
        let html = self.http.get_text(&url).await?;
        Ok(parse_details(&html, &url))
    }

    /// Downloads `url` to `dest`, replacing any existing file.
    pub async fn download(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        self.http.download(url, dest).await
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

fn link_title(link: ElementRef<'_>) -> String {
    link.value()
        .attr("title")
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| text_of(link))
}

fn absolute(base: &Url, href: &str) -> Option<String> {
    base.join(href).ok().map(String::from)
}

fn inside_dt(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == "dt")
}

/// Link texts that name a chapter or a reading action rather than a title.
fn is_reading_link(text: &str) -> bool {
    ["开始阅读", "在线观看", "最新章节"]
        .iter()
        .any(|prefix| text.starts_with(prefix))
        || (text.starts_with('第') && text.ends_with('话'))
}

pub fn parse_search(html: &str, base: &Url) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut hits = Vec::new();

    for entry in document.select(&SEARCH_ENTRIES) {
        let Some(link) = entry
            .select(&COMIC_LINK)
            .find(|link| link.value().attr("title").is_some())
            .or_else(|| entry.select(&COMIC_LINK).next())
        else {
            continue;
        };
        let title = link_title(link);
        if title.is_empty() || title == DETAIL_LINK_TEXT {
            continue;
        }
        let alias = entry
            .select(&ALIAS)
            .next()
            .map(|small| {
                small
                    .select(&ANCHOR)
                    .next()
                    .map(text_of)
                    .unwrap_or_else(|| text_of(small))
            })
            .map(|alias| alias.trim_matches(|c: char| matches!(c, '(' | ')' | '（' | '）')).trim().to_owned())
            .filter(|alias| !alias.is_empty() && *alias != title);
        let Some(url) = link.value().attr("href").and_then(|href| absolute(base, href)) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        let title = match alias {
            Some(alias) => format!("{title} ({alias})"),
            None => title,
        };
        hits.push(SearchHit { title, url });
    }

    if !hits.is_empty() {
        return hits;
    }

    tracing::debug!("no structured search results; scanning all comic links");
    for link in document.select(&COMIC_LINK) {
        let title = link_title(link);
        if title.chars().count() < 2 || title == DETAIL_LINK_TEXT {
            continue;
        }
        if is_reading_link(&title) && !inside_dt(link) {
            continue;
        }
        let Some(url) = link.value().attr("href").and_then(|href| absolute(base, href)) else {
            continue;
        };
        if seen.insert(url.clone()) {
            hits.push(SearchHit { title, url });
        }
    }
    hits
}

pub fn parse_details(html: &str, page_url: &Url) -> TitleDetails {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty());

    let cover_url = document
        .select(&COVER)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .and_then(|src| match src.strip_prefix("//") {
            Some(rest) => Some(format!("https://{rest}")),
            None => absolute(page_url, src),
        });

    let introduction = document
        .select(&INTRO)
        .map(text_of)
        .find(|text| !text.is_empty());

    let mut details = Map::new();
    for label in document.select(&DETAIL_ITEMS) {
        let key = text_of(label)
            .trim_end_matches([':', '：'])
            .trim()
            .to_owned();
        if key.is_empty() || details.contains_key(&key) {
            continue;
        }
        let Some(container) = label.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        let links = container
            .select(&ANCHOR)
            .map(text_of)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>();
        let value = if links.is_empty() {
            let whole = text_of(container);
            whole
                .strip_prefix(text_of(label).as_str())
                .unwrap_or(&whole)
                .trim()
                .to_owned()
        } else {
            links.join(", ")
        };
        details.insert(key, Value::String(value));
    }

    TitleDetails {
        source_url: page_url.to_string(),
        title,
        cover_url,
        introduction,
        details,
        chapters: parse_chapter_groups(&document, page_url),
    }
}

fn parse_chapter_groups(document: &Html, page_url: &Url) -> Vec<(String, Vec<ChapterRecord>)> {
    let mut groups: Vec<(String, Vec<ChapterRecord>, HashSet<String>)> = Vec::new();

    for section in document.select(&CHAPTER_SECTION) {
        let mut current: Option<usize> = None;
        for child in section.children().filter_map(ElementRef::wrap) {
            let element = child.value();
            if element.name() == "h4" {
                current = child
                    .select(&HEADING_SPAN)
                    .next()
                    .map(text_of)
                    .filter(|name| !name.is_empty())
                    .map(|name| match groups.iter().position(|(g, _, _)| *g == name) {
                        Some(index) => index,
                        None => {
                            groups.push((name, Vec::new(), HashSet::new()));
                            groups.len() - 1
                        }
                    });
                continue;
            }
            if !element.classes().any(|class| class == "chapter-list") {
                continue;
            }
            let Some(index) = current else {
                tracing::debug!("chapter list without a group heading; skipping");
                continue;
            };
            let (_, records, seen) = &mut groups[index];
            for link in child.select(&CHAPTER_LINK) {
                let title = chapter_link_title(link);
                let Some(url) = link.value().attr("href").and_then(|href| absolute(page_url, href))
                else {
                    continue;
                };
                if title.is_empty() || !seen.insert(url.clone()) {
                    continue;
                }
                records.push(ChapterRecord::new(title, url));
            }
        }
    }

    groups
        .into_iter()
        .filter(|(_, records, _)| !records.is_empty())
        .map(|(name, records, _)| (name, records))
        .collect()
}

/// Chapter title from the `title` attribute, else the link text without the
/// page-count badge (`<i>24p</i>`).
fn chapter_link_title(link: ElementRef<'_>) -> String {
    if let Some(title) = link
        .value()
        .attr("title")
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return title.to_owned();
    }
    link.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let in_badge = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .take_while(|ancestor| ancestor.id() != link.id())
                .any(|ancestor| ancestor.value().name() == "i");
            (!in_badge).then_some(&**text)
        })
        .collect::<String>()
        .trim()
        .to_owned()
}
