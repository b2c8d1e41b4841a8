use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use comic_capture::metadata::bangumi::BangumiClient;
use comic_capture::metadata::manhuagui::ManhuaguiClient;
use comic_capture::metadata::wikipedia::WikipediaClient;
use comic_capture::metadata::{LEDGER_FILE, METADATA_FILE, MetadataFetcher};
use comic_capture::pacing::RecordingPacer;
use comic_capture::prompt::Prompt;

const SEARCH_ONE: &str = r#"<!doctype html>
<html><body>
<div class="book-result"><ul>
  <li><div class="book-detail"><dl>
    <dt><a href="/comic/7/" title="Blue Period">Blue Period</a></dt>
  </dl></div></li>
</ul></div>
</body></html>
"#;

const SEARCH_MANY: &str = r#"<!doctype html>
<html><body>
<div class="book-result"><ul>
  <li><dl><dt><a href="/comic/7/" title="Blue Period">Blue Period</a></dt></dl></li>
  <li><dl><dt><a href="/comic/8/" title="Blue Giant">Blue Giant</a></dt></dl></li>
</ul></div>
</body></html>
"#;

const DETAIL: &str = r#"<!doctype html>
<html><body>
<div class="book-cover"><p class="hcover"><img src="/cover.png"></p></div>
<div class="book-title"><h1>Blue Period</h1></div>
<ul class="detail-list cf">
  <li><span><strong>漫画作者：</strong><a href="/author/1/">山口飞翔</a></span></li>
</ul>
<div id="intro-cut">A student discovers painting.</div>
<div class="chapter cf mt16">
  <h4><span>单行本</span></h4>
  <div class="chapter-list cf mt10"><ul>
    <li><a href="/comic/7/200.html" title="第02卷"><span>第02卷<i>180p</i></span></a></li>
    <li><a href="/comic/7/100.html" title="第01卷"><span>第01卷<i>190p</i></span></a></li>
  </ul></div>
  <h4><span>单话</span></h4>
  <div class="chapter-list cf mt10"><ul>
    <li><a href="/comic/7/1.html"><span>第1话<i>40p</i></span></a></li>
  </ul></div>
</div>
</body></html>
"#;

const BANGUMI_SEARCH: &str = r#"<!doctype html>
<html><body>
<ul id="browserItemList">
  <li class="item"><h3><a href="/subject/42" class="l">Blue Period</a> <small class="grey">蓝色时期</small></h3>
    <p class="info tip">漫画 / 山口つばさ</p></li>
</ul>
</body></html>
"#;

const BANGUMI_SUBJECT: &str = r#"<!doctype html>
<html><body>
<h1 class="nameSingle" id="headerSubject"><a href="/subject/42">Blue Period<small>ブルーピリオド</small></a></h1>
<div class="infobox">
  <a href="/bgm_cover.jpg" class="thickbox cover"><img src="/bgm_cover_small.jpg" class="cover"></a>
  <ul id="infobox"><li><span class="tip">作者: </span><a href="/person/1">山口つばさ</a></li></ul>
</div>
<div id="subject_summary">Art school.</div>
</body></html>
"#;

const WIKI_SEARCH: &str = r#"{"query": {"search": [{"title": "Blue Period", "snippet": "<span>Blue</span> Period manga"}]}}"#;

const WIKI_ARTICLE: &str = r#"<!doctype html>
<html><body>
<h1 id="firstHeading">Blue Period</h1>
<table class="infobox">
  <tr><td><a class="image" href="/wiki/File:BP.png"><img src="/wiki_image.png" width="200"></a></td></tr>
  <tr><th>作者</th><td>山口飞翔[1]</td></tr>
</table>
</body></html>
"#;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really";
const JPEG_BYTES: &[u8] = b"\xff\xd8\xffnot really";

fn spawn_site_server() -> (String, mpsc::Sender<()>, thread::JoinHandle<()>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let base_url = format!("http://{}", server.server_addr());

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };

            let url = request.url().to_owned();
            let (status, body, content_type): (u16, &[u8], &str) = match url.as_str() {
                "/s/blue%20period.html" | "/s/Blue%20Period.html" => {
                    (200, SEARCH_ONE.as_bytes(), "text/html; charset=utf-8")
                }
                "/s/blue.html" => (200, SEARCH_MANY.as_bytes(), "text/html; charset=utf-8"),
                "/s/nothing.html" => (
                    200,
                    b"<html><body>no results</body></html>".as_slice(),
                    "text/html; charset=utf-8",
                ),
                "/comic/7/" => (200, DETAIL.as_bytes(), "text/html; charset=utf-8"),
                "/cover.png" | "/wiki_image.png" => (200, PNG_BYTES, "image/png"),
                "/bgm_cover.jpg" => (200, JPEG_BYTES, "image/jpeg"),
                "/subject_search/Blue%20Period?cat=1" => {
                    (200, BANGUMI_SEARCH.as_bytes(), "text/html; charset=utf-8")
                }
                "/subject/42" => (200, BANGUMI_SUBJECT.as_bytes(), "text/html; charset=utf-8"),
                "/wiki/Blue%20Period" => (200, WIKI_ARTICLE.as_bytes(), "text/html; charset=utf-8"),
                api if api.starts_with("/w/api.php?") && api.contains("srsearch=Blue+Period") => {
                    (200, WIKI_SEARCH.as_bytes(), "application/json")
                }
                _ => (404, b"not found".as_slice(), "text/plain"),
            };

            let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
                .expect("build header");
            let response = tiny_http::Response::from_data(body.to_vec())
                .with_status_code(status)
                .with_header(header);
            let _ = request.respond(response);
        }
    });

    (base_url, shutdown_tx, handle)
}

fn fetcher(base_url: &str) -> anyhow::Result<MetadataFetcher> {
    fetcher_with_bangumi(base_url, base_url)
}

fn fetcher_with_bangumi(base_url: &str, bangumi_url: &str) -> anyhow::Result<MetadataFetcher> {
    Ok(
        MetadataFetcher::new(ManhuaguiClient::new(base_url)?, Arc::new(RecordingPacer::new()))
            .with_source(BangumiClient::new(bangumi_url)?)
            .with_source(WikipediaClient::new(&format!("{base_url}/w/api.php"))?),
    )
}

/// Answers every question with the same fixed choices.
struct FixedAnswers {
    confirm: bool,
    select: Option<usize>,
    questions: usize,
}

impl FixedAnswers {
    fn new(confirm: bool, select: Option<usize>) -> Self {
        Self {
            confirm,
            select,
            questions: 0,
        }
    }
}

impl Prompt for FixedAnswers {
    fn confirm(&mut self, _question: &str) -> anyhow::Result<bool> {
        self.questions += 1;
        Ok(self.confirm)
    }

    fn select(&mut self, _question: &str, _options: &[String]) -> anyhow::Result<Option<usize>> {
        self.questions += 1;
        Ok(self.select)
    }

    fn choose(&mut self, _question: &str, _options: &[String]) -> anyhow::Result<usize> {
        self.questions += 1;
        Ok(0)
    }
}

#[tokio::test]
async fn exact_match_writes_ledger_cover_and_metadata() -> anyhow::Result<()> {
    let (base_url, shutdown, handle) = spawn_site_server();
    let tmp = tempfile::TempDir::new()?;
    let fetcher = fetcher(&base_url)?;
    let mut prompt = FixedAnswers::new(false, None);

    let fetched = fetcher
        .get_or_fetch(&mut prompt, "blue period", tmp.path())
        .await?
        .expect("title found");

    assert_eq!(prompt.questions, 0);
    assert_eq!(fetched.confirmed_name, "Blue_Period");
    let title_dir = tmp.path().join("Blue_Period");
    assert_eq!(fetched.ledger_path, title_dir.join(LEDGER_FILE));

    let ledger: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&fetched.ledger_path)?)?;
    let groups = ledger
        .as_object()
        .expect("ledger object")
        .keys()
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(groups, vec!["单行本", "单话"]);
    assert_eq!(ledger["单行本"][0]["title"], "第02卷");
    assert_eq!(
        ledger["单行本"][0]["url"],
        format!("{base_url}/comic/7/200.html")
    );
    assert_eq!(ledger["单话"][0]["title"], "第1话");
    assert_eq!(ledger["单话"][0]["completed"], false);

    assert_eq!(std::fs::read(title_dir.join("manhuagui_cover.png"))?, PNG_BYTES);

    let metadata: serde_json::Value =
        serde_json::from_slice(&std::fs::read(title_dir.join(METADATA_FILE))?)?;
    assert_eq!(metadata["initial_search_term"], "blue period");
    assert_eq!(metadata["confirmed_name_for_dir"], "Blue_Period");
    assert_eq!(metadata["downloaded_images_log"][0]["type"], "cover");
    assert_eq!(metadata["manhuagui_data"]["title"], "Blue Period");
    assert_eq!(metadata["manhuagui_data"]["details"]["漫画作者"], "山口飞翔");
    assert_eq!(
        metadata["manhuagui_data"]["introduction"],
        "A student discovers painting."
    );
    assert!(metadata["fetched_at"].is_string());

    assert_eq!(metadata["bangumi_data"]["title"], "Blue Period");
    assert_eq!(metadata["bangumi_data"]["title_original"], "ブルーピリオド");
    assert_eq!(metadata["bangumi_data"]["infobox"]["作者"], "山口つばさ");
    assert_eq!(metadata["wikipedia_data"]["title"], "Blue Period");
    assert_eq!(metadata["wikipedia_data"]["infobox"]["作者"], "山口飞翔");
    let images = metadata["downloaded_images_log"]
        .as_array()
        .expect("image log")
        .iter()
        .map(|entry| {
            (
                entry["source"].as_str().unwrap_or_default().to_owned(),
                entry["type"].as_str().unwrap_or_default().to_owned(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        images,
        vec![
            ("manhuagui".to_owned(), "cover".to_owned()),
            ("bangumi".to_owned(), "cover".to_owned()),
            ("wikipedia".to_owned(), "infobox_image_1".to_owned()),
        ]
    );
    assert_eq!(std::fs::read(title_dir.join("bangumi_cover.jpg"))?, JPEG_BYTES);
    assert_eq!(
        std::fs::read(title_dir.join("wikipedia_infobox_image_1.png"))?,
        PNG_BYTES
    );

    let keys = metadata
        .as_object()
        .expect("metadata object")
        .keys()
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(
        keys,
        vec![
            "initial_search_term",
            "confirmed_name_for_dir",
            "downloaded_images_log",
            "manhuagui_data",
            "bangumi_data",
            "wikipedia_data",
            "fetched_at",
        ]
    );

    shutdown.send(()).ok();
    handle.join().expect("join server thread");
    Ok(())
}

#[tokio::test]
async fn unavailable_source_is_skipped() -> anyhow::Result<()> {
    let (base_url, shutdown, handle) = spawn_site_server();
    let tmp = tempfile::TempDir::new()?;
    let fetcher = fetcher_with_bangumi(&base_url, &format!("{base_url}/offline/"))?;
    let mut prompt = FixedAnswers::new(false, None);

    let fetched = fetcher
        .get_or_fetch(&mut prompt, "Blue Period", tmp.path())
        .await?
        .expect("title found");

    let metadata: serde_json::Value =
        serde_json::from_slice(&std::fs::read(fetched.title_dir.join(METADATA_FILE))?)?;
    assert!(metadata.get("bangumi_data").is_none());
    assert_eq!(metadata["wikipedia_data"]["title"], "Blue Period");
    assert_eq!(metadata["downloaded_images_log"].as_array().map(Vec::len), Some(2));
    assert!(!fetched.title_dir.join("bangumi_cover.jpg").exists());

    shutdown.send(()).ok();
    handle.join().expect("join server thread");
    Ok(())
}

#[tokio::test]
async fn several_matches_are_selected_and_skippable() -> anyhow::Result<()> {
    let (base_url, shutdown, handle) = spawn_site_server();
    let tmp = tempfile::TempDir::new()?;
    let fetcher = fetcher(&base_url)?;

    let mut skip = FixedAnswers::new(false, None);
    assert!(fetcher.get_or_fetch(&mut skip, "blue", tmp.path()).await?.is_none());
    assert_eq!(skip.questions, 1);
    assert!(std::fs::read_dir(tmp.path())?.next().is_none());

    let mut pick_first = FixedAnswers::new(false, Some(0));
    let fetched = fetcher
        .get_or_fetch(&mut pick_first, "blue", tmp.path())
        .await?
        .expect("title selected");
    assert_eq!(fetched.confirmed_name, "Blue_Period");
    assert!(fetched.ledger_path.is_file());

    shutdown.send(()).ok();
    handle.join().expect("join server thread");
    Ok(())
}

#[tokio::test]
async fn no_results_is_not_found() -> anyhow::Result<()> {
    let (base_url, shutdown, handle) = spawn_site_server();
    let tmp = tempfile::TempDir::new()?;
    let fetcher = fetcher(&base_url)?;
    let mut prompt = FixedAnswers::new(true, Some(0));

    assert!(fetcher.get_or_fetch(&mut prompt, "nothing", tmp.path()).await?.is_none());
    assert_eq!(prompt.questions, 0);

    shutdown.send(()).ok();
    handle.join().expect("join server thread");
    Ok(())
}

#[tokio::test]
async fn second_fetch_reuses_the_existing_ledger() -> anyhow::Result<()> {
    let (base_url, shutdown, handle) = spawn_site_server();
    let tmp = tempfile::TempDir::new()?;
    let fetcher = fetcher(&base_url)?;

    let mut prompt = FixedAnswers::new(false, None);
    let first = fetcher
        .get_or_fetch(&mut prompt, "Blue Period", tmp.path())
        .await?
        .expect("title found");
    std::fs::write(&first.ledger_path, "{\"单话\": []}")?;

    shutdown.send(()).ok();
    handle.join().expect("join server thread");

    // Server is gone; only the on-disk ledger can satisfy this.
    let again = fetcher
        .get_or_fetch(&mut prompt, "Blue Period", tmp.path())
        .await?
        .expect("reused");
    assert_eq!(again, first);
    assert_eq!(std::fs::read_to_string(&again.ledger_path)?, "{\"单话\": []}");
    Ok(())
}
