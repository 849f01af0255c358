//! Static HTML export of a MediaWiki site: enumerate every page, fetch its
//! rendered HTML and images, rewrite links for offline browsing.

pub mod api;
pub mod config;
pub mod enumerate;
pub mod export;
pub mod fetch;
pub mod filename;
pub mod transform;

#[cfg(test)]
mod test_support;

pub use api::{
    ImageReference, MediaWikiClient, MediaWikiClientConfig, PageBatch, RenderedPage, WikiApi,
};
pub use export::{ExportContext, ExportReport, PrepareOutcome, export_wiki, prepare_output_dir};
pub use fetch::{HttpImageFetcher, ImageFetcher};
