//! HTTP plumbing shared by the metadata sites: one client, browser-like
//! headers, and a `Referer` pinned to the site being scraped.

use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use serde::de::DeserializeOwned;
use url::Url;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const LANGUAGES: &str = "zh-CN,zh;q=0.9,en;q=0.8";

#[derive(Debug, Clone)]
pub struct SiteHttp {
    http: reqwest::Client,
    referer: Url,
}

impl SiteHttp {
    pub fn new(referer: Url) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .with_context(|| format!("build http client for {}", referer.host_str().unwrap_or("site")))?;
        Ok(Self { http, referer })
    }

    pub async fn get_text(&self, url: &Url) -> anyhow::Result<String> {
        let response = self
            .get(url.as_str())
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        response
            .text()
            .await
            .with_context(|| format!("read body: {url}"))
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, &str)],
    ) -> anyhow::Result<T> {
        let response = self
            .get(url.as_str())
            .query(query)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("decode json: {url}"))
    }

    /// Downloads `url` to `dest`, replacing any existing file.
    pub async fn download(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        let response = self
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("read body: {url}"))?;
        tokio::fs::write(dest, &bytes)
            .await
            .with_context(|| format!("write {}", dest.display()))?;
        Ok(bytes.len() as u64)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT_LANGUAGE, LANGUAGES)
            .header(REFERER, self.referer.as_str())
    }
}
