use std::collections::BTreeMap;

use anyhow::{Result, bail};

use crate::api::{ImageReference, PageBatch, RenderedPage, WikiApi};

/// In-memory wiki. `batches` is keyed by the continuation token that
/// requests it; the first batch uses the empty key.
#[derive(Default)]
pub struct MockApi {
    pub batches: BTreeMap<String, PageBatch>,
    pub pages: BTreeMap<String, RenderedPage>,
    pub images: BTreeMap<String, String>,
    pub failing_list_token: Option<String>,
    pub list_calls: Vec<Option<String>>,
    pub render_calls: Vec<String>,
    pub image_info_calls: Vec<Vec<String>>,
    pub request_count: usize,
}

impl MockApi {
    pub fn with_pages(pages: &[(&str, &str, &[&str])]) -> Self {
        let mut api = Self::default();
        api.batches.insert(
            String::new(),
            PageBatch {
                titles: pages.iter().map(|(title, _, _)| title.to_string()).collect(),
                continuation: None,
            },
        );
        for (title, html, images) in pages {
            api.pages.insert(
                title.to_string(),
                RenderedPage {
                    title: title.to_string(),
                    html: html.to_string(),
                    image_names: images.iter().map(|name| name.to_string()).collect(),
                },
            );
        }
        api
    }
}

impl WikiApi for MockApi {
    fn list_pages(&mut self, continuation: Option<&str>) -> Result<PageBatch> {
        self.request_count += 1;
        self.list_calls.push(continuation.map(str::to_string));
        let key = continuation.unwrap_or_default();
        if self.failing_list_token.as_deref() == Some(key) {
            bail!("MediaWiki API request failed with HTTP 503 Service Unavailable");
        }
        Ok(self.batches.get(key).cloned().unwrap_or_default())
    }

    fn render_page(&mut self, title: &str) -> Result<RenderedPage> {
        self.request_count += 1;
        self.render_calls.push(title.to_string());
        match self.pages.get(title) {
            Some(page) => Ok(page.clone()),
            None => bail!("MediaWiki API error [missingtitle]: {title}"),
        }
    }

    fn image_info(&mut self, image_names: &[String]) -> Result<Vec<ImageReference>> {
        self.request_count += 1;
        self.image_info_calls.push(image_names.to_vec());
        Ok(image_names
            .iter()
            .filter_map(|name| {
                self.images.get(name).map(|url| ImageReference {
                    name: name.clone(),
                    url: url.clone(),
                })
            })
            .collect())
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

