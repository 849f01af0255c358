use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::config::MwdumpConfig;
use crate::filename::bare_image_name;

/// One page of `list=allpages` results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageBatch {
    pub titles: Vec<String>,
    pub continuation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub title: String,
    pub html: String,
    pub image_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Image name without its namespace prefix.
    pub name: String,
    pub url: String,
}

pub trait WikiApi {
    fn list_pages(&mut self, continuation: Option<&str>) -> Result<PageBatch>;
    fn render_page(&mut self, title: &str) -> Result<RenderedPage>;
    /// Resolve bare image names to source URLs in a single request. Images the
    /// wiki cannot resolve are left out of the result.
    fn image_info(&mut self, image_names: &[String]) -> Result<Vec<ImageReference>>;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct MediaWikiClientConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl MediaWikiClientConfig {
    pub fn from_config(config: &MwdumpConfig, api_url: String) -> Self {
        Self {
            api_url,
            user_agent: config.user_agent(),
            timeout_ms: config.timeout_ms(),
        }
    }
}

pub struct MediaWikiClient {
    client: Client,
    config: MediaWikiClientConfig,
    request_count: usize,
}

impl MediaWikiClient {
    pub fn new(config: MediaWikiClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build MediaWiki HTTP client")?;

        Ok(Self {
            client,
            config,
            request_count: 0,
        })
    }

    fn request_json_get(&mut self, params: &[(&str, String)]) -> Result<Value> {
        let base_url = Url::parse(&self.config.api_url)
            .with_context(|| format!("invalid MediaWiki API URL: {}", self.config.api_url))?;

        let mut pairs = Vec::with_capacity(params.len() + 2);
        pairs.push(("format".to_string(), "json".to_string()));
        pairs.push(("formatversion".to_string(), "2".to_string()));
        for (key, value) in params {
            if !value.is_empty() {
                pairs.push(((*key).to_string(), value.clone()));
            }
        }

        self.request_count += 1;
        log::debug!("GET {} {:?}", self.config.api_url, pairs);
        let response = self
            .client
            .get(base_url)
            .header("User-Agent", self.config.user_agent.clone())
            .query(&pairs)
            .send()
            .context("failed to call MediaWiki API")?;

        let status = response.status();
        if !status.is_success() {
            bail!("MediaWiki API request failed with HTTP {status}");
        }

        let payload: Value = response
            .json()
            .context("failed to decode MediaWiki API JSON response")?;
        check_api_error(&payload)?;
        Ok(payload)
    }
}

impl WikiApi for MediaWikiClient {
    fn list_pages(&mut self, continuation: Option<&str>) -> Result<PageBatch> {
        let mut params = vec![
            ("action", "query".to_string()),
            ("list", "allpages".to_string()),
            ("aplimit", "max".to_string()),
        ];
        if let Some(token) = continuation {
            params.push(("apcontinue", token.to_string()));
        }

        let response = self.request_json_get(&params)?;
        parse_allpages(response)
    }

    fn render_page(&mut self, title: &str) -> Result<RenderedPage> {
        let response = self.request_json_get(&[
            ("action", "parse".to_string()),
            ("page", title.to_string()),
            ("prop", "text|images".to_string()),
        ])?;
        parse_rendered_page(response)
            .with_context(|| format!("failed to decode parse API response for {title}"))
    }

    fn image_info(&mut self, image_names: &[String]) -> Result<Vec<ImageReference>> {
        if image_names.is_empty() {
            return Ok(Vec::new());
        }
        let titles = image_names
            .iter()
            .map(|name| format!("File:{name}"))
            .collect::<Vec<_>>()
            .join("|");
        let response = self.request_json_get(&[
            ("action", "query".to_string()),
            ("prop", "imageinfo".to_string()),
            ("iiprop", "url".to_string()),
            ("titles", titles),
        ])?;
        parse_image_info(response)
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

fn check_api_error(payload: &Value) -> Result<()> {
    if let Some(error) = payload.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        let info = error
            .get("info")
            .and_then(Value::as_str)
            .unwrap_or("unknown info");
        bail!("MediaWiki API error [{code}]: {info}");
    }
    Ok(())
}

fn parse_allpages(response: Value) -> Result<PageBatch> {
    let parsed: QueryResponse =
        serde_json::from_value(response).context("failed to decode allpages API response")?;
    Ok(PageBatch {
        titles: parsed
            .query
            .allpages
            .into_iter()
            .map(|item| item.title)
            .collect(),
        continuation: parsed.continuation.and_then(|cont| cont.apcontinue),
    })
}

fn parse_rendered_page(response: Value) -> Result<RenderedPage> {
    let parsed: ParseResponse = serde_json::from_value(response)?;
    Ok(RenderedPage {
        title: parsed.parse.title,
        html: parsed.parse.text,
        image_names: parsed.parse.images,
    })
}

fn parse_image_info(response: Value) -> Result<Vec<ImageReference>> {
    let parsed: QueryResponse =
        serde_json::from_value(response).context("failed to decode imageinfo API response")?;
    let mut references = Vec::new();
    for page in parsed.query.pages {
        match page.imageinfo.into_iter().next() {
            Some(info) => references.push(ImageReference {
                name: bare_image_name(&page.title).to_string(),
                url: info.url,
            }),
            None => log::warn!("no image info for {}; skipping", page.title),
        }
    }
    Ok(references)
}

#[derive(Debug, Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    query: QueryPayload,
    #[serde(default, rename = "continue")]
    continuation: Option<ContinuationPayload>,
}

#[derive(Debug, Deserialize, Default)]
struct QueryPayload {
    #[serde(default)]
    allpages: Vec<TitleQueryItem>,
    #[serde(default)]
    pages: Vec<ImagePageItem>,
}

#[derive(Debug, Deserialize, Default)]
struct ContinuationPayload {
    apcontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TitleQueryItem {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ImagePageItem {
    title: String,
    #[serde(default)]
    imageinfo: Vec<ImageInfoItem>,
}

#[derive(Debug, Deserialize)]
struct ImageInfoItem {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: ParsePayload,
}

#[derive(Debug, Deserialize)]
struct ParsePayload {
    title: String,
    text: String,
    #[serde(default)]
    images: Vec<String>,
}
