use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::api::WikiApi;
use crate::config::DEFAULT_LINK_PREFIX;
use crate::enumerate::PageEnumerator;
use crate::fetch::ImageFetcher;
use crate::filename::{FilenameRegistry, image_filename, page_filename};
use crate::transform::PageTransformer;

pub const IMAGE_DIR_NAME: &str = "img";

/// Everything one export run writes to, plus the per-page inputs that stay
/// fixed for the whole run.
#[derive(Debug, Clone)]
pub struct ExportContext {
    pub out_dir: PathBuf,
    pub image_dir: PathBuf,
    pub head: Option<String>,
    pub link_prefix: String,
}

impl ExportContext {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        let out_dir = out_dir.into();
        let image_dir = out_dir.join(IMAGE_DIR_NAME);
        Self {
            out_dir,
            image_dir,
            head: None,
            link_prefix: DEFAULT_LINK_PREFIX.to_string(),
        }
    }

    pub fn with_head(mut self, head: Option<String>) -> Self {
        self.head = head;
        self
    }

    pub fn with_link_prefix(mut self, link_prefix: impl Into<String>) -> Self {
        self.link_prefix = link_prefix.into();
        self
    }

    pub fn page_path(&self, title: &str) -> PathBuf {
        self.out_dir.join(page_filename(title))
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.image_dir.join(image_filename(name))
    }

    pub fn transformer(&self) -> PageTransformer {
        PageTransformer::new(self.link_prefix.clone(), IMAGE_DIR_NAME)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    Created,
    /// The directory exists and `force` was not given; nothing was touched.
    AlreadyExists,
}

/// Create the output directory and its image directory. With `force`, an
/// existing output directory is removed first.
pub fn prepare_output_dir(context: &ExportContext, force: bool) -> Result<PrepareOutcome> {
    if context.out_dir.exists() {
        if !force {
            return Ok(PrepareOutcome::AlreadyExists);
        }
        fs::remove_dir_all(&context.out_dir)
            .with_context(|| format!("failed to remove {}", context.out_dir.display()))?;
    }
    fs::create_dir_all(&context.out_dir)
        .with_context(|| format!("failed to create {}", context.out_dir.display()))?;
    fs::create_dir(&context.image_dir)
        .with_context(|| format!("failed to create {}", context.image_dir.display()))?;
    Ok(PrepareOutcome::Created)
}

#[derive(Debug, Clone)]
pub struct ExportedPage {
    pub title: String,
    pub path: PathBuf,
    pub images: Vec<String>,
}

/// Where and why a run stopped. `title` is `None` when the page listing
/// itself failed.
#[derive(Debug)]
pub struct ExportHalt {
    pub title: Option<String>,
    pub error: anyhow::Error,
}

#[derive(Debug)]
pub struct ExportReport {
    pub pages: Vec<ExportedPage>,
    pub images_written: usize,
    pub request_count: usize,
    pub halted: Option<ExportHalt>,
}

impl ExportReport {
    pub fn success(&self) -> bool {
        self.halted.is_none()
    }
}

/// Export every page the wiki lists, one at a time. The first failure stops
/// the run; pages written before it stay on disk and are listed in the report.
pub fn export_wiki<A, F>(api: &mut A, fetcher: &F, context: &ExportContext) -> ExportReport
where
    A: WikiApi,
    F: ImageFetcher,
{
    let transformer = context.transformer();
    let mut enumerator = PageEnumerator::new();
    let mut registry = FilenameRegistry::default();
    let mut report = ExportReport {
        pages: Vec::new(),
        images_written: 0,
        request_count: 0,
        halted: None,
    };

    loop {
        let title = match enumerator.next_title(api) {
            Ok(Some(title)) => title,
            Ok(None) => break,
            Err(error) => {
                log::error!("page listing failed: {error:#}");
                report.halted = Some(ExportHalt { title: None, error });
                break;
            }
        };

        log::info!("exporting {title}");
        match export_page(api, fetcher, context, &transformer, &mut registry, &title) {
            Ok(page) => {
                report.images_written += page.images.len();
                report.pages.push(page);
            }
            Err(error) => {
                log::error!("export halted at {title}: {error:#}");
                report.halted = Some(ExportHalt {
                    title: Some(title),
                    error,
                });
                break;
            }
        }
    }

    report.request_count = api.request_count();
    report
}

fn export_page<A, F>(
    api: &mut A,
    fetcher: &F,
    context: &ExportContext,
    transformer: &PageTransformer,
    registry: &mut FilenameRegistry,
    title: &str,
) -> Result<ExportedPage>
where
    A: WikiApi,
    F: ImageFetcher,
{
    let page = api.render_page(title)?;

    let mut images = Vec::new();
    if !page.image_names.is_empty() {
        for image in api.image_info(&page.image_names)? {
            let path = context.image_path(&image.name);
            log::debug!("fetching {} -> {}", image.url, path.display());
            fetcher.fetch(&path, &image.url)?;
            images.push(image.name);
        }
    }

    let html = transformer
        .transform(&page.html, context.head.as_deref())
        .with_context(|| format!("failed to transform {title}"))?;

    let path = context.page_path(title);
    registry.claim(&page_filename(title), title)?;
    write_page(&path, &html)?;

    Ok(ExportedPage {
        title: title.to_string(),
        path,
        images,
    })
}

fn write_page(path: &Path, html: &str) -> Result<()> {
    fs::write(path, html).with_context(|| format!("failed to write {}", path.display()))
}
