//! Bangumi subject search and subject pages.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context as _;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::{Map, Value};
use url::Url;

use super::http::SiteHttp;
use super::source::{
    Candidate, MetadataSource, SourceImage, SourceRecord, absolute_url, element_text, squeeze,
    text_with_breaks,
};

pub const BASE_URL: &str = "https://bangumi.tv";

/// Bangumi's category id for books, which covers manga.
const BOOK_CATEGORY: &str = "1";
const UNKNOWN_TYPE: &str = "Unknown Type";
const ASSUMED_TYPE: &str = "Manga/Book (assumed)";

static RESULT_ITEMS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("ul#browserItemList li.item").expect("result selector should compile")
});
static RESULT_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3 a.l").expect("result link selector should compile"));
static RESULT_ALIAS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3 small.grey").expect("alias selector should compile"));
static RESULT_INFO: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.info").expect("info selector should compile"));
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3").expect("heading selector should compile"));
static SUBJECT_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a.l[href^="/subject/"]"#).expect("subject link selector should compile")
});
static SMALL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("small").expect("small selector should compile"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1#headerSubject a").expect("title selector should compile"));
static COVER_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.infobox a.thickbox.cover").expect("cover link selector should compile")
});
static COVER_IMAGE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.infobox img.cover").expect("cover image selector should compile")
});
static SUMMARY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#subject_summary").expect("summary selector should compile"));
static TAGS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.subject_tag_section a.l.meta span").expect("tag selector should compile")
});
static SCORE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"span.number[property="v:average"]"#).expect("score selector should compile")
});
static VOTES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"small.grey span[property="v:votes"]"#)
        .expect("votes selector should compile")
});
static INFOBOX_ITEMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul#infobox > li").expect("infobox selector should compile"));
static TIP: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.tip").expect("tip selector should compile"));
static GROUP_TAGS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("span.tag.group_tag:not(.more)").expect("group tag selector should compile")
});

#[derive(Debug, Clone)]
pub struct BangumiClient {
    http: SiteHttp,
    base_url: Url,
}

impl BangumiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("parse bangumi url: {base_url}"))?;
        let http = SiteHttp::new(base_url.clone()).context("build bangumi http client")?;
        Ok(Self { http, base_url })
    }

    pub fn search_url(&self, term: &str) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("base url cannot hold a path: {}", self.base_url))?
            .pop_if_empty()
            .push("subject_search")
            .push(term);
        url.query_pairs_mut().clear().append_pair("cat", BOOK_CATEGORY);
        Ok(url)
    }
}

#[async_trait]
impl MetadataSource for BangumiClient {
    fn name(&self) -> &'static str {
        "bangumi"
    }

    async fn search(&self, term: &str) -> anyhow::Result<Vec<Candidate>> {
        let url = self.search_url(term)?;
        tracing::info!(term, url = %url, "searching bangumi");
        let html = self.http.get_text(&url).await?;
        let found = parse_search(&html, &self.base_url);
        tracing::info!(term, hits = found.len(), "bangumi search finished");
        Ok(found)
    }

    async fn details(&self, candidate: &Candidate) -> anyhow::Result<SourceRecord> {
        let url = Url::parse(&candidate.url)
            .with_context(|| format!("parse subject url: {}", candidate.url))?;
        tracing::info!(url = %url, "fetching bangumi subject");
        let html = self.http.get_text(&url).await?;
        Ok(parse_subject(&html, &url))
    }

    async fn download(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        self.http.download(url, dest).await
    }
}

pub fn parse_search(html: &str, base: &Url) -> Vec<Candidate> {
    let document = Html::parse_document(html);

    let listed = document
        .select(&RESULT_ITEMS)
        .filter_map(|item| {
            let link = item.select(&RESULT_LINK).next()?;
            let url = subject_url(link, base)?;
            let kind = item
                .select(&RESULT_INFO)
                .next()
                .map(element_text)
                .and_then(|info| info.split('/').next().map(|kind| kind.trim().to_owned()))
                .filter(|kind| !kind.is_empty())
                .unwrap_or_else(|| UNKNOWN_TYPE.to_owned());
            Some(Candidate {
                title: with_alias(element_text(link), item.select(&RESULT_ALIAS).next()),
                url,
                note: Some(kind),
            })
        })
        .collect::<Vec<_>>();
    if !listed.is_empty() {
        return listed;
    }

    // Layouts without the result list still lead with the best match.
    let Some(heading) = document.select(&HEADING).next() else {
        return Vec::new();
    };
    let Some(link) = heading.select(&SUBJECT_LINK).next() else {
        return Vec::new();
    };
    subject_url(link, base)
        .map(|url| Candidate {
            title: with_alias(element_text(link), heading.select(&SMALL).next()),
            url,
            note: Some(ASSUMED_TYPE.to_owned()),
        })
        .into_iter()
        .collect()
}

fn subject_url(link: ElementRef<'_>, base: &Url) -> Option<String> {
    let href = link.value().attr("href")?;
    href.starts_with("/subject/")
        .then(|| absolute_url(base, href))
        .flatten()
}

fn with_alias(title: String, alias: Option<ElementRef<'_>>) -> String {
    match alias.map(element_text).filter(|alias| !alias.is_empty()) {
        Some(alias) => format!("{title} ({alias})"),
        None => title,
    }
}

/// Reads a subject page into `bangumi_data`. The cover, when present, is the
/// only image.
pub fn parse_subject(html: &str, page_url: &Url) -> SourceRecord {
    let document = Html::parse_document(html);
    let mut data = Map::new();
    data.insert("source_url".to_owned(), Value::from(page_url.as_str()));

    let title_link = document.select(&TITLE).next();
    // The link also wraps the original-language title in `<small>`.
    let title = title_link
        .map(own_text)
        .filter(|title| !title.is_empty());
    if let Some(title) = &title {
        data.insert("title".to_owned(), Value::from(title.as_str()));
    }
    if let Some(original) = title_link
        .and_then(|link| link.select(&SMALL).next())
        .map(element_text)
        .filter(|original| !original.is_empty())
    {
        data.insert("title_original".to_owned(), Value::from(original));
    }

    let cover = document
        .select(&COVER_LINK)
        .next()
        .and_then(|link| link.value().attr("href"))
        .or_else(|| {
            document
                .select(&COVER_IMAGE)
                .next()
                .and_then(|img| img.value().attr("src"))
        })
        .and_then(|reference| absolute_url(page_url, reference));
    if let Some(cover) = &cover {
        data.insert("cover_image_url".to_owned(), Value::from(cover.as_str()));
    }

    if let Some(summary) = document.select(&SUMMARY).next() {
        data.insert(
            "summary".to_owned(),
            Value::from(text_with_breaks(summary, "\n")),
        );
    }

    let tags = document
        .select(&TAGS)
        .map(element_text)
        .filter(|tag| !tag.is_empty())
        .map(Value::from)
        .collect::<Vec<_>>();
    data.insert("tags".to_owned(), Value::Array(tags));

    if let Some(score) = document.select(&SCORE).next().map(element_text) {
        data.insert("rating_score".to_owned(), Value::from(score));
    }
    if let Some(votes) = document.select(&VOTES).next().map(element_text) {
        data.insert("rating_votes".to_owned(), Value::from(votes));
    }

    data.insert("infobox".to_owned(), Value::Object(parse_infobox(&document)));

    SourceRecord {
        title,
        images: cover
            .into_iter()
            .map(|url| SourceImage {
                kind: "cover".to_owned(),
                url,
            })
            .collect(),
        data,
    }
}

fn parse_infobox(document: &Html) -> Map<String, Value> {
    let mut infobox = Map::new();
    for item in document.select(&INFOBOX_ITEMS) {
        let Some(tip) = item.select(&TIP).next() else {
            continue;
        };
        let key = element_text(tip).replace([':', '：'], "").trim().to_owned();
        if key.is_empty() {
            continue;
        }

        let value = if item.value().classes().any(|class| class == "sub_group") {
            let tags = item
                .select(&GROUP_TAGS)
                .map(element_text)
                .filter(|tag| !tag.is_empty())
                .map(Value::from)
                .collect::<Vec<_>>();
            if tags.is_empty() {
                continue;
            }
            Value::Array(tags)
        } else {
            let text = sibling_text(tip);
            if text.is_empty() {
                continue;
            }
            Value::from(text)
        };
        merge_entry(&mut infobox, key, value);
    }

    for value in infobox.values_mut() {
        if let Value::Array(items) = value
            && items.len() == 1
        {
            *value = items.remove(0);
        }
    }
    infobox
}

fn own_text(element: ElementRef<'_>) -> String {
    let text = element
        .children()
        .filter_map(|node| node.value().as_text().map(|text| &**text))
        .collect::<String>();
    squeeze(&text)
}

/// Text and link values that follow the label inside one infobox row.
fn sibling_text(tip: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in tip.next_siblings() {
        match node.value() {
            Node::Text(text) => parts.push(squeeze(text)),
            Node::Element(el)
                if el.name() == "a" || (el.name() == "span" && el.classes().any(|c| c == "tag")) =>
            {
                if let Some(element) = ElementRef::wrap(node) {
                    parts.push(element_text(element));
                }
            }
            _ => {}
        }
    }
    parts.retain(|part| !part.is_empty());
    parts.join(" ")
}

/// Repeated labels collect their values into one list.
fn merge_entry(infobox: &mut Map<String, Value>, key: String, value: Value) {
    let Some(existing) = infobox.get_mut(&key) else {
        infobox.insert(key, value);
        return;
    };
    if !existing.is_array() {
        *existing = Value::Array(vec![existing.take()]);
    }
    if let Value::Array(items) = existing {
        match value {
            Value::Array(more) => items.extend(more),
            other => items.push(other),
        }
    }
}
