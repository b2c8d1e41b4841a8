//! Title metadata: finds a title on the chapter site, lays out its
//! directory and writes the chapter ledger the runner consumes. Bangumi and
//! Wikipedia are consulted afterwards for descriptive data and images.

pub mod bangumi;
pub mod http;
pub mod manhuagui;
pub mod source;
pub mod wikipedia;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ledger::{Ledger, write_json_atomic};
use crate::pacing::Pacer;
use crate::prompt::Prompt;
use crate::sanitize::sanitize_dir_name;

use self::manhuagui::{ManhuaguiClient, SearchHit, TitleDetails};
use self::source::{Candidate, MetadataSource, SourceRecord};

pub const LEDGER_FILE: &str = "chapters_manhuagui.json";
pub const METADATA_FILE: &str = "metadata.json";
const COVER_STEM: &str = "manhuagui_cover";

/// A title ready for capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTitle {
    /// Directory name under the base directory; also the display name.
    pub confirmed_name: String,
    pub title_dir: PathBuf,
    pub ledger_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedImage {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
struct MetadataFile<'a> {
    initial_search_term: &'a str,
    confirmed_name_for_dir: &'a str,
    downloaded_images_log: Vec<DownloadedImage>,
    manhuagui_data: manhuagui::TitleSummary<'a>,
    /// `bangumi_data`, `wikipedia_data`; only sources that returned data.
    #[serde(flatten)]
    source_data: Map<String, Value>,
    fetched_at: DateTime<Utc>,
}

/// Only the field read back when a title directory is reused.
#[derive(Debug, Deserialize)]
struct StoredMetadata {
    confirmed_name_for_dir: Option<String>,
}

/// Finds titles and writes everything a title directory holds.
pub struct MetadataFetcher {
    manhuagui: ManhuaguiClient,
    sources: Vec<Box<dyn MetadataSource>>,
    pacer: Arc<dyn Pacer>,
    /// Pause before each search and detail request to a supplementary source.
    pub request_pause: Duration,
    /// Pause after each supplementary image download.
    pub image_pause: Duration,
}

impl MetadataFetcher {
    pub fn new(manhuagui: ManhuaguiClient, pacer: Arc<dyn Pacer>) -> Self {
        Self {
            manhuagui,
            sources: Vec::new(),
            pacer,
            request_pause: Duration::from_secs(1),
            image_pause: Duration::from_millis(500),
        }
    }

    /// Adds a source consulted after the chapter site, in call order.
    pub fn with_source(mut self, source: impl MetadataSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    /// Returns the title for `query`, reusing a previous fetch when its
    /// ledger exists. `Ok(None)` means nothing was found or the user declined
    /// every candidate. Supplementary sources never fail the fetch.
    pub async fn get_or_fetch(
        &self,
        prompt: &mut dyn Prompt,
        query: &str,
        base_dir: &Path,
    ) -> anyhow::Result<Option<FetchedTitle>> {
        if let Some(existing) = existing_title(query, base_dir).await {
            tracing::info!(
                title = %existing.confirmed_name,
                ledger = %existing.ledger_path.display(),
                "reusing existing ledger"
            );
            return Ok(Some(existing));
        }

        let hits = self
            .manhuagui
            .search(query)
            .await
            .with_context(|| format!("search for {query:?}"))?;
        let Some(hit) = pick_hit(query, hits, prompt)? else {
            return Ok(None);
        };

        let confirmed_name = sanitize_dir_name(&hit.title);
        let title_dir = base_dir.join(&confirmed_name);
        tokio::fs::create_dir_all(&title_dir)
            .await
            .with_context(|| format!("create title dir: {}", title_dir.display()))?;

        let details = self
            .manhuagui
            .details(&hit.url)
            .await
            .with_context(|| format!("fetch details for {}", hit.title))?;
        if details.chapters.is_empty() {
            anyhow::bail!("no chapters listed on {}", hit.url);
        }

        let ledger_path = title_dir.join(LEDGER_FILE);
        Ledger::new(&ledger_path, details.chapters.clone())
            .save()
            .await?;
        tracing::info!(
            ledger = %ledger_path.display(),
            groups = details.chapters.len(),
            "chapter ledger written"
        );

        let mut downloaded = download_cover(&self.manhuagui, &details, &title_dir).await;
        let source_data = self
            .consult_sources(prompt, query, &hit.title, &title_dir, &mut downloaded)
            .await?;
        let metadata = MetadataFile {
            initial_search_term: query,
            confirmed_name_for_dir: &confirmed_name,
            downloaded_images_log: downloaded,
            manhuagui_data: details.summary(),
            source_data,
            fetched_at: Utc::now(),
        };
        write_metadata(&title_dir, &metadata).await?;

        Ok(Some(FetchedTitle {
            confirmed_name,
            title_dir,
            ledger_path,
        }))
    }

    /// Runs every supplementary source in turn. Each may hand its own title
    /// to the next one as the search term. Only prompt failures are errors.
    async fn consult_sources(
        &self,
        prompt: &mut dyn Prompt,
        query: &str,
        chosen_title: &str,
        title_dir: &Path,
        downloaded: &mut Vec<DownloadedImage>,
    ) -> anyhow::Result<Map<String, Value>> {
        let mut data = Map::new();
        if self.sources.is_empty() {
            return Ok(data);
        }

        let mut term = follow_up_term(query, chosen_title, prompt)?;
        for (index, source) in self.sources.iter().enumerate() {
            let Some(record) = self.consult(source.as_ref(), &term, prompt).await? else {
                continue;
            };
            downloaded.extend(self.download_images(source.as_ref(), &record, title_dir).await);

            let next = self.sources.get(index + 1);
            if let (Some(next), Some(title)) = (next, record.title.as_deref())
                && title.to_lowercase() != term.to_lowercase()
            {
                let question = format!(
                    "{} calls it \"{title}\". Search {} with that instead of \"{term}\"?",
                    source.name(),
                    next.name()
                );
                if prompt.confirm(&question)? {
                    term = title.to_owned();
                }
            }
            data.insert(format!("{}_data", source.name()), Value::Object(record.data));
        }
        Ok(data)
    }

    async fn consult(
        &self,
        source: &dyn MetadataSource,
        term: &str,
        prompt: &mut dyn Prompt,
    ) -> anyhow::Result<Option<SourceRecord>> {
        let name = source.name();
        self.pacer.pause(self.request_pause).await;
        let found = match source.search(term).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(source = name, term, "search failed, skipping source: {err:#}");
                return Ok(None);
            }
        };
        let Some(candidate) = pick_candidate(name, term, found, prompt)? else {
            tracing::info!(source = name, term, "nothing chosen, skipping source");
            return Ok(None);
        };

        self.pacer.pause(self.request_pause).await;
        match source.details(&candidate).await {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                tracing::warn!(
                    source = name,
                    url = %candidate.url,
                    "details failed, skipping source: {err:#}"
                );
                Ok(None)
            }
        }
    }

    async fn download_images(
        &self,
        source: &dyn MetadataSource,
        record: &SourceRecord,
        title_dir: &Path,
    ) -> Vec<DownloadedImage> {
        let mut downloaded = Vec::new();
        for image in &record.images {
            let extension = image_extension(&image.url);
            let path = title_dir.join(format!("{}_{}{extension}", source.name(), image.kind));
            match source.download(&image.url, &path).await {
                Ok(bytes) => {
                    tracing::info!(
                        source = source.name(),
                        path = %path.display(),
                        bytes,
                        "image downloaded"
                    );
                    downloaded.push(DownloadedImage {
                        source: source.name().to_owned(),
                        kind: image.kind.clone(),
                        path: path.display().to_string(),
                        url: image.url.clone(),
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        source = source.name(),
                        url = %image.url,
                        "image download failed: {err:#}"
                    );
                }
            }
            self.pacer.pause(self.image_pause).await;
        }
        downloaded
    }
}

/// The term handed to the supplementary sources: the chosen title, unless
/// it differs from what the user typed and they prefer their own input.
fn follow_up_term(
    query: &str,
    chosen_title: &str,
    prompt: &mut dyn Prompt,
) -> anyhow::Result<String> {
    if chosen_title.to_lowercase() == query.to_lowercase() {
        return Ok(chosen_title.to_owned());
    }
    let options = [
        format!("Title from the chapter site: {chosen_title}"),
        format!("Original input: {query}"),
    ];
    let index = prompt.choose(
        "Which title should the other sources be searched with?",
        &options,
    )?;
    let term = if index == 1 { query } else { chosen_title };
    tracing::info!(term, "searching the other sources");
    Ok(term.to_owned())
}

/// A single result is taken as is; several are offered with a skip option.
fn pick_candidate(
    source: &str,
    term: &str,
    mut found: Vec<Candidate>,
    prompt: &mut dyn Prompt,
) -> anyhow::Result<Option<Candidate>> {
    match found.len() {
        0 => Ok(None),
        1 => {
            let candidate = found.remove(0);
            tracing::info!(source, title = %candidate.title, "single result selected");
            Ok(Some(candidate))
        }
        _ => {
            let options = found
                .iter()
                .map(|candidate| match &candidate.note {
                    Some(note) => format!("{} [{note}] ({})", candidate.title, candidate.url),
                    None => format!("{} ({})", candidate.title, candidate.url),
                })
                .collect::<Vec<_>>();
            let question = format!("{source} results for \"{term}\":");
            Ok(prompt
                .select(&question, &options)?
                .map(|index| found.swap_remove(index)))
        }
    }
}

async fn existing_title(query: &str, base_dir: &Path) -> Option<FetchedTitle> {
    let dir_name = sanitize_dir_name(query);
    let title_dir = base_dir.join(&dir_name);
    let ledger_path = title_dir.join(LEDGER_FILE);
    if !tokio::fs::try_exists(&ledger_path).await.unwrap_or(false) {
        return None;
    }

    let metadata_path = title_dir.join(METADATA_FILE);
    let stored = match tokio::fs::read(&metadata_path).await {
        Ok(data) => match serde_json::from_slice::<StoredMetadata>(&data) {
            Ok(stored) => stored.confirmed_name_for_dir,
            Err(err) => {
                tracing::warn!(path = %metadata_path.display(), "unreadable metadata: {err}");
                None
            }
        },
        Err(_) => None,
    };

    Some(FetchedTitle {
        confirmed_name: stored
            .filter(|name| !name.is_empty())
            .unwrap_or(dir_name),
        title_dir,
        ledger_path,
    })
}

fn pick_hit(
    query: &str,
    mut hits: Vec<SearchHit>,
    prompt: &mut dyn Prompt,
) -> anyhow::Result<Option<SearchHit>> {
    match hits.len() {
        0 => {
            tracing::warn!(query, "no titles found");
            Ok(None)
        }
        1 => {
            let hit = hits.remove(0);
            if hit.title.to_lowercase() == query.to_lowercase() {
                tracing::info!(title = %hit.title, "exact match");
                return Ok(Some(hit));
            }
            let question = format!("Found \"{}\" for \"{query}\". Use it?", hit.title);
            if prompt.confirm(&question)? {
                Ok(Some(hit))
            } else {
                tracing::info!(query, "match declined");
                Ok(None)
            }
        }
        _ => {
            let options = hits
                .iter()
                .map(|hit| format!("{} ({})", hit.title, hit.url))
                .collect::<Vec<_>>();
            let question = format!("Several titles match \"{query}\":");
            match prompt.select(&question, &options)? {
                Some(index) => Ok(Some(hits.swap_remove(index))),
                None => {
                    tracing::info!(query, "selection skipped");
                    Ok(None)
                }
            }
        }
    }
}

/// Best effort: a failed cover download is logged and left out of the log.
async fn download_cover(
    client: &ManhuaguiClient,
    details: &TitleDetails,
    title_dir: &Path,
) -> Vec<DownloadedImage> {
    let Some(url) = details.cover_url.as_deref() else {
        return Vec::new();
    };
    let path = title_dir.join(format!("{COVER_STEM}{}", image_extension(url)));
    match client.download(url, &path).await {
        Ok(bytes) => {
            tracing::info!(path = %path.display(), bytes, "cover downloaded");
            vec![DownloadedImage {
                source: "manhuagui".to_owned(),
                kind: "cover".to_owned(),
                path: path.display().to_string(),
                url: url.to_owned(),
            }]
        }
        Err(err) => {
            tracing::warn!(url, "cover download failed: {err:#}");
            Vec::new()
        }
    }
}

/// `.jpg` unless the URL path ends in a short extension.
fn image_extension(url: &str) -> String {
    let path = url::Url::parse(url)
        .map(|url| url.path().to_owned())
        .unwrap_or_default();
    Path::new(&path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5)
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_else(|| ".jpg".to_owned())
}

async fn write_metadata(title_dir: &Path, metadata: &MetadataFile<'_>) -> anyhow::Result<()> {
    let path = title_dir.join(METADATA_FILE);
    write_json_atomic(&path, metadata)
        .await
        .with_context(|| format!("write metadata: {}", path.display()))?;
    tracing::info!(path = %path.display(), "metadata written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::metadata::source::SourceImage;
    use crate::pacing::RecordingPacer;

    #[derive(Default)]
    struct ScriptedPrompt {
        confirms: VecDeque<bool>,
        selections: VecDeque<Option<usize>>,
        choices: VecDeque<usize>,
        asked: Vec<String>,
    }

    impl Prompt for ScriptedPrompt {
        fn confirm(&mut self, question: &str) -> anyhow::Result<bool> {
            self.asked.push(question.to_owned());
            Ok(self.confirms.pop_front().unwrap_or(false))
        }

        fn select(&mut self, question: &str, _options: &[String]) -> anyhow::Result<Option<usize>> {
            self.asked.push(question.to_owned());
            Ok(self.selections.pop_front().flatten())
        }

        fn choose(&mut self, question: &str, _options: &[String]) -> anyhow::Result<usize> {
            self.asked.push(question.to_owned());
            Ok(self.choices.pop_front().unwrap_or(0))
        }
    }

    /// Serves fixed candidates and one record; remembers the search terms.
    struct CannedSource {
        name: &'static str,
        candidates: Vec<Candidate>,
        record: Option<SourceRecord>,
        searched: Mutex<Vec<String>>,
    }

    impl CannedSource {
        fn new(name: &'static str, titles: &[&str], record_title: Option<&str>) -> Self {
            let candidates = titles
                .iter()
                .map(|title| Candidate {
                    title: (*title).to_owned(),
                    url: format!("https://{name}.test/{title}"),
                    note: None,
                })
                .collect();
            let mut data = Map::new();
            data.insert("from".to_owned(), Value::from(name));
            Self {
                name,
                candidates,
                record: Some(SourceRecord {
                    title: record_title.map(str::to_owned),
                    images: vec![SourceImage {
                        kind: "cover".to_owned(),
                        url: format!("https://{name}.test/cover.png"),
                    }],
                    data,
                }),
                searched: Mutex::new(Vec::new()),
            }
        }

        fn searched(&self) -> Vec<String> {
            self.searched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetadataSource for Arc<CannedSource> {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search(&self, term: &str) -> anyhow::Result<Vec<Candidate>> {
            self.searched.lock().unwrap().push(term.to_owned());
            Ok(self.candidates.clone())
        }

        async fn details(&self, _candidate: &Candidate) -> anyhow::Result<SourceRecord> {
            self.record
                .clone()
                .ok_or_else(|| anyhow::anyhow!("no record"))
        }

        async fn download(&self, _url: &str, dest: &Path) -> anyhow::Result<u64> {
            tokio::fs::write(dest, b"img").await?;
            Ok(3)
        }
    }

    fn fetcher_with(sources: &[Arc<CannedSource>]) -> (MetadataFetcher, Arc<RecordingPacer>) {
        let pacer = Arc::new(RecordingPacer::new());
        let client = ManhuaguiClient::new("http://127.0.0.1:9").unwrap();
        let fetcher = sources
            .iter()
            .cloned()
            .fold(MetadataFetcher::new(client, pacer.clone()), MetadataFetcher::with_source);
        (fetcher, pacer)
    }

    fn hit(title: &str, url: &str) -> SearchHit {
        SearchHit {
            title: title.to_owned(),
            url: url.to_owned(),
        }
    }

    #[test]
    fn single_case_insensitive_match_needs_no_prompt() {
        let mut prompt = ScriptedPrompt::default();
        let picked = pick_hit("one piece", vec![hit("One Piece", "u")], &mut prompt).unwrap();
        assert_eq!(picked, Some(hit("One Piece", "u")));
        assert!(prompt.asked.is_empty());
    }

    #[test]
    fn single_other_match_asks_for_confirmation() {
        let mut prompt = ScriptedPrompt::default();
        let picked = pick_hit("海贼", vec![hit("海贼王", "u")], &mut prompt).unwrap();
        assert_eq!(picked, None);
        assert_eq!(prompt.asked.len(), 1);

        let mut prompt = ScriptedPrompt {
            confirms: VecDeque::from([true]),
            ..ScriptedPrompt::default()
        };
        let picked = pick_hit("海贼", vec![hit("海贼王", "u")], &mut prompt).unwrap();
        assert_eq!(picked, Some(hit("海贼王", "u")));
    }

    #[test]
    fn several_matches_use_selection_with_skip() {
        let hits = vec![hit("a", "1"), hit("b", "2"), hit("c", "3")];
        let mut prompt = ScriptedPrompt {
            selections: VecDeque::from([Some(1)]),
            ..ScriptedPrompt::default()
        };
        assert_eq!(
            pick_hit("x", hits.clone(), &mut prompt).unwrap(),
            Some(hit("b", "2"))
        );

        let mut prompt = ScriptedPrompt {
            selections: VecDeque::from([None]),
            ..ScriptedPrompt::default()
        };
        assert_eq!(pick_hit("x", hits, &mut prompt).unwrap(), None);
    }

    #[test]
    fn no_hits_is_not_found() {
        let mut prompt = ScriptedPrompt::default();
        assert_eq!(pick_hit("x", Vec::new(), &mut prompt).unwrap(), None);
    }

    #[test]
    fn image_extension_from_url_path() {
        assert_eq!(image_extension("https://cf.example.com/cpic/g/1.PNG?v=2"), ".png");
        assert_eq!(image_extension("https://cf.example.com/cpic/g/1"), ".jpg");
        assert_eq!(image_extension("not a url"), ".jpg");
    }

    #[tokio::test]
    async fn existing_ledger_is_reused_with_stored_name() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("进击_巨人");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(LEDGER_FILE), "{}").unwrap();
        std::fs::write(
            dir.join(METADATA_FILE),
            r#"{"confirmed_name_for_dir": "进击的巨人"}"#,
        )
        .unwrap();

        let (fetcher, _) = fetcher_with(&[]);
        let mut prompt = ScriptedPrompt::default();
        let fetched = fetcher
            .get_or_fetch(&mut prompt, "进击 巨人", tmp.path())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fetched.confirmed_name, "进击的巨人");
        assert_eq!(fetched.ledger_path, dir.join(LEDGER_FILE));
        assert!(prompt.asked.is_empty());
    }

    #[tokio::test]
    async fn title_dirs_keep_every_character_position() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("Re_Zero__kara");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(LEDGER_FILE), "{}").unwrap();

        let (fetcher, _) = fetcher_with(&[]);
        let mut prompt = ScriptedPrompt::default();
        let fetched = fetcher
            .get_or_fetch(&mut prompt, "Re:Zero  kara", tmp.path())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fetched.confirmed_name, "Re_Zero__kara");
        assert_eq!(fetched.title_dir, dir);
    }

    #[test]
    fn follow_up_term_asks_only_when_titles_differ() {
        let mut prompt = ScriptedPrompt::default();
        assert_eq!(follow_up_term("one piece", "One Piece", &mut prompt).unwrap(), "One Piece");
        assert!(prompt.asked.is_empty());

        let mut prompt = ScriptedPrompt {
            choices: VecDeque::from([1]),
            ..ScriptedPrompt::default()
        };
        assert_eq!(follow_up_term("海贼", "海贼王", &mut prompt).unwrap(), "海贼");
        assert_eq!(prompt.asked.len(), 1);

        let mut prompt = ScriptedPrompt::default();
        assert_eq!(follow_up_term("海贼", "海贼王", &mut prompt).unwrap(), "海贼王");
    }

    #[test]
    fn several_candidates_are_offered_with_skip() {
        let candidates = ["a", "b"]
            .map(|title| Candidate {
                title: title.to_owned(),
                url: format!("u/{title}"),
                note: Some("Manga".to_owned()),
            })
            .to_vec();

        let mut prompt = ScriptedPrompt {
            selections: VecDeque::from([Some(1)]),
            ..ScriptedPrompt::default()
        };
        let picked = pick_candidate("bangumi", "x", candidates.clone(), &mut prompt).unwrap();
        assert_eq!(picked.map(|c| c.title), Some("b".to_owned()));

        let mut prompt = ScriptedPrompt::default();
        assert_eq!(pick_candidate("bangumi", "x", candidates, &mut prompt).unwrap(), None);
        assert_eq!(pick_candidate("bangumi", "x", Vec::new(), &mut prompt).unwrap(), None);
    }

    #[tokio::test]
    async fn sources_run_in_order_and_may_retarget_the_next_search() {
        let tmp = TempDir::new().unwrap();
        let first = Arc::new(CannedSource::new("bangumi", &["only"], Some("Shingeki")));
        let second = Arc::new(CannedSource::new("wikipedia", &["w1", "w2"], None));
        let (fetcher, pacer) = fetcher_with(&[first.clone(), second.clone()]);
        let mut prompt = ScriptedPrompt {
            confirms: VecDeque::from([true]),
            selections: VecDeque::from([Some(0)]),
            ..ScriptedPrompt::default()
        };
        let mut downloaded = Vec::new();

        let data = fetcher
            .consult_sources(&mut prompt, "attack", "Attack", tmp.path(), &mut downloaded)
            .await
            .unwrap();

        assert_eq!(first.searched(), vec!["Attack"]);
        assert_eq!(second.searched(), vec!["Shingeki"]);
        assert_eq!(
            data.keys().collect::<Vec<_>>(),
            vec!["bangumi_data", "wikipedia_data"]
        );
        assert_eq!(data["wikipedia_data"]["from"], "wikipedia");
        assert_eq!(
            downloaded
                .iter()
                .map(|image| (image.source.as_str(), image.kind.as_str()))
                .collect::<Vec<_>>(),
            vec![("bangumi", "cover"), ("wikipedia", "cover")]
        );
        assert!(tmp.path().join("bangumi_cover.png").is_file());
        assert_eq!(
            pacer.pauses(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_millis(500),
            ]
        );
    }

    #[tokio::test]
    async fn skipped_source_leaves_no_data() {
        let tmp = TempDir::new().unwrap();
        let only = Arc::new(CannedSource::new("bangumi", &["a", "b"], Some("A")));
        let (fetcher, _) = fetcher_with(&[only.clone()]);
        let mut prompt = ScriptedPrompt::default();
        let mut downloaded = Vec::new();

        let data = fetcher
            .consult_sources(&mut prompt, "a", "a", tmp.path(), &mut downloaded)
            .await
            .unwrap();

        assert!(data.is_empty());
        assert!(downloaded.is_empty());
        assert_eq!(prompt.asked.len(), 1);
    }
}
