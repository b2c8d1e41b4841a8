//! Wikipedia search (MediaWiki API) and article infoboxes.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context as _;
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use super::http::SiteHttp;
use super::source::{
    Candidate, MetadataSource, SourceImage, SourceRecord, absolute_url, element_text, squeeze,
    text_with_breaks,
};

pub const API_URL: &str = "https://zh.wikipedia.org/w/api.php";

const SEARCH_LIMIT: &str = "5";
/// Infobox images narrower than this are icons and flags.
const MIN_IMAGE_WIDTH: u32 = 50;
const ICON_MARKERS: &[&str] = &["/Icon_", "/Flag_of_", "icon_"];

static FOOTNOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]").expect("footnote pattern should compile"));
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1#firstHeading").expect("heading selector should compile"));
static INFOBOX: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"table[class*="infobox"]"#).expect("infobox selector should compile")
});
static LINKED_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.image img").expect("image selector should compile"));
static CELL_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td img").expect("cell image selector should compile"));
static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("row selector should compile"));
static HEADER_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th").expect("header selector should compile"));
static DATA_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("cell selector should compile"));
static LIST_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("list item selector should compile"));

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Clone)]
pub struct WikipediaClient {
    http: SiteHttp,
    api_url: Url,
    /// Site root articles live under, derived from the API endpoint.
    site: Url,
}

impl WikipediaClient {
    pub fn new(api_url: &str) -> anyhow::Result<Self> {
        let api_url =
            Url::parse(api_url).with_context(|| format!("parse wikipedia api url: {api_url}"))?;
        let mut site = api_url.clone();
        site.set_path("/");
        site.set_query(None);
        site.set_fragment(None);
        let http = SiteHttp::new(site.clone()).context("build wikipedia http client")?;
        Ok(Self {
            http,
            api_url,
            site,
        })
    }

    pub fn article_url(&self, title: &str) -> anyhow::Result<Url> {
        article_url(&self.site, title)
    }
}

fn article_url(site: &Url, title: &str) -> anyhow::Result<Url> {
    let mut url = site.clone();
    url.path_segments_mut()
        .map_err(|()| anyhow::anyhow!("site url cannot hold a path: {site}"))?
        .pop_if_empty()
        .push("wiki")
        .push(title);
    Ok(url)
}

#[async_trait]
impl MetadataSource for WikipediaClient {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    async fn search(&self, term: &str) -> anyhow::Result<Vec<Candidate>> {
        tracing::info!(term, api = %self.api_url, "searching wikipedia");
        let response: SearchResponse = self
            .http
            .get_json(
                &self.api_url,
                &[
                    ("action", "query"),
                    ("list", "search"),
                    ("srsearch", term),
                    ("srlimit", SEARCH_LIMIT),
                    ("format", "json"),
                ],
            )
            .await?;
        let found = candidates(response, &self.site)?;
        tracing::info!(term, hits = found.len(), "wikipedia search finished");
        Ok(found)
    }

    async fn details(&self, candidate: &Candidate) -> anyhow::Result<SourceRecord> {
        let url = Url::parse(&candidate.url)
            .with_context(|| format!("parse article url: {}", candidate.url))?;
        tracing::info!(url = %url, "fetching wikipedia article");
        let html = self.http.get_text(&url).await?;
        Ok(parse_article(&html, &url))
    }

    async fn download(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        self.http.download(url, dest).await
    }
}

/// Search hits as candidates; snippets arrive as HTML and are reduced to text.
pub fn candidates(response: SearchResponse, site: &Url) -> anyhow::Result<Vec<Candidate>> {
    let items = response.query.map(|query| query.search).unwrap_or_default();
    items
        .into_iter()
        .map(|item| {
            let url = article_url(site, &item.title)?;
            let snippet = element_text(Html::parse_fragment(&item.snippet).root_element());
            Ok(Candidate {
                title: item.title,
                url: url.into(),
                note: (!snippet.is_empty()).then_some(snippet),
            })
        })
        .collect()
}

/// Reads the article title and its infobox. Pages without an infobox yield
/// only the title.
pub fn parse_article(html: &str, page_url: &Url) -> SourceRecord {
    let document = Html::parse_document(html);
    let mut data = Map::new();
    data.insert("source_url".to_owned(), Value::from(page_url.as_str()));

    let title = document
        .select(&HEADING)
        .next()
        .map(element_text)
        .filter(|title| !title.is_empty());
    if let Some(title) = &title {
        data.insert("title".to_owned(), Value::from(title.as_str()));
    }

    let Some(infobox) = document.select(&INFOBOX).next() else {
        tracing::info!(url = %page_url, "article has no infobox");
        return SourceRecord {
            title,
            images: Vec::new(),
            data,
        };
    };

    let image_urls = infobox_images(infobox, page_url);
    data.insert(
        "infobox_image_urls".to_owned(),
        Value::from(image_urls.clone()),
    );
    data.insert("infobox".to_owned(), Value::Object(infobox_rows(infobox)));

    SourceRecord {
        title,
        images: image_urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| SourceImage {
                kind: format!("infobox_image_{}", index + 1),
                url,
            })
            .collect(),
        data,
    }
}

fn infobox_images(infobox: ElementRef<'_>, page_url: &Url) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let mut keep = |src: Option<&str>| {
        if let Some(url) = src.and_then(|src| absolute_url(page_url, src))
            && !urls.contains(&url)
        {
            urls.push(url);
        }
    };

    for img in infobox.select(&LINKED_IMAGE) {
        keep(img.value().attr("src"));
    }
    for img in infobox.select(&CELL_IMAGE) {
        let src = img.value().attr("src").unwrap_or_default();
        let narrow = img
            .value()
            .attr("width")
            .and_then(|width| width.trim().parse::<u32>().ok())
            .is_some_and(|width| width < MIN_IMAGE_WIDTH);
        if narrow || ICON_MARKERS.iter().any(|marker| src.contains(marker)) || in_image_link(img) {
            continue;
        }
        keep(Some(src));
    }
    urls
}

fn in_image_link(img: ElementRef<'_>) -> bool {
    img.ancestors().filter_map(ElementRef::wrap).any(|parent| {
        parent.value().name() == "a" && parent.value().classes().any(|class| class == "image")
    })
}

/// `header -> value` for every row with both a header and a data cell. List
/// cells become arrays unless they hold a single item.
fn infobox_rows(infobox: ElementRef<'_>) -> Map<String, Value> {
    let mut rows = Map::new();
    for row in infobox.select(&ROW) {
        let (Some(header), Some(cell)) =
            (row.select(&HEADER_CELL).next(), row.select(&DATA_CELL).next())
        else {
            continue;
        };
        let key = element_text(header);
        if key.is_empty() {
            continue;
        }

        let mut items = cell
            .select(&LIST_ITEM)
            .map(|item| clean(&text_with_breaks(item, " ")))
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>();
        let value = match items.len() {
            0 => clean(&text_with_breaks(cell, ", ")),
            1 => items.remove(0),
            _ => {
                rows.insert(key, Value::from(items));
                continue;
            }
        };
        if !value.is_empty() {
            rows.insert(key, Value::from(value));
        }
    }
    rows
}

/// Drops footnote markers such as `[3]` and folds whitespace.
fn clean(text: &str) -> String {
    squeeze(&FOOTNOTE.replace_all(text, ""))
}
