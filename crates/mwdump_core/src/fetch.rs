use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;

pub const TLS_ADVICE: &str = "SSL error. Pass --skip-cert-verification to ignore.";

pub trait ImageFetcher {
    /// Download `url` and write the whole body to `filename`.
    fn fetch(&self, filename: &Path, url: &str) -> Result<()>;
}

pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    /// `skip_cert_verification` turns off TLS certificate checks for every
    /// download made by this fetcher.
    pub fn new(user_agent: &str, timeout_ms: u64, skip_cert_verification: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_millis(timeout_ms))
            .danger_accept_invalid_certs(skip_cert_verification)
            .build()
            .context("failed to build image HTTP client")?;
        Ok(Self { client })
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|error| download_failure(error, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("image download {url} failed with HTTP {status}"));
        }

        let body = response
            .bytes()
            .map_err(|error| download_failure(error, url))?;
        Ok(body.to_vec())
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(&self, filename: &Path, url: &str) -> Result<()> {
        let body = self.download(url)?;
        fs::write(filename, &body)
            .with_context(|| format!("failed to write {}", filename.display()))?;
        log::debug!("wrote {} ({} bytes)", filename.display(), body.len());
        Ok(())
    }
}

/// Wrap a transport error. Certificate failures get the operator advice
/// logged and attached before the error is handed back.
fn download_failure<E>(error: E, url: &str) -> anyhow::Error
where
    E: StdError + Send + Sync + 'static,
{
    if is_certificate_error(&error) {
        log::error!("{TLS_ADVICE}");
        return anyhow::Error::new(error)
            .context(format!("failed to download {url}"))
            .context(TLS_ADVICE);
    }
    anyhow::Error::new(error).context(format!("failed to download {url}"))
}

fn is_certificate_error(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        let message = err.to_string().to_ascii_lowercase();
        if message.contains("certificate") || message.contains("unknownissuer") {
            return true;
        }
        current = err.source();
    }
    false
}
