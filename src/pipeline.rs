use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::article::Article;
use crate::download::Downloader;
use crate::fetcher::{self, FetchError, Fetcher};
use crate::images::ImageReferences;
use crate::sanitize::sanitize_filename;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("URL must start with http:// or https://, got {0:?}")]
    InvalidScheme(String),
    #[error("HTTP client error: {0}")]
    ClientError(#[source] FetchError),
    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

const DOWNLOAD_DELAY: Duration = Duration::from_millis(500);

/// Run parameters. `Default` is what the command line tool uses.
#[derive(Debug, Clone)]
pub struct Config {
    pub user_agent: String,
    pub timeout: Duration,
    /// Pause between two consecutive image downloads.
    pub delay: Duration,
    /// Directory the article directory is created in.
    pub output_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: fetcher::USER_AGENT.to_string(),
            timeout: fetcher::TIMEOUT,
            delay: DOWNLOAD_DELAY,
            output_root: PathBuf::from("."),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// The article page could not be fetched, nothing was written.
    FetchFailed(FetchError),
    NoImages { title: String, directory: PathBuf },
    Completed(Summary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub title: String,
    pub directory: PathBuf,
    pub succeeded: usize,
    pub attempted: usize,
}

/// Only the scheme prefix is checked here; an address that still does not
/// parse is reported as a failed fetch.
pub fn validate_url(url: &str) -> Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(PipelineError::InvalidScheme(url.to_string()));
    }
    Ok(())
}

/// Fetches the article at `url` and saves its content images under a
/// directory named after the title.
pub async fn run(url: &str, config: &Config) -> Result<Outcome> {

    validate_url(url)?;
    let fetcher = Fetcher::new(&config.user_agent, config.timeout)
        .map_err(PipelineError::ClientError)?;

    tracing::info!("Fetching {}", url);
    let fetched = match Url::parse(url) {
        Ok(url) => fetcher.fetch_html(&url).await.map(|html| (url, html)),
        Err(e) => Err(FetchError::from(e)),
    };
    let (url, html) = match fetched {
        Ok(fetched) => fetched,
        Err(e) => {
            tracing::error!("Could not fetch the page: {}", e);
            return Ok(Outcome::FetchFailed(e));
        }
    };

    tracing::info!("Parsing article content");
    let (title, dir_name, directory, images, scope) = {
        let article = Article::parse(&html);
        tracing::info!("Title: {}", article.title);

        let dir_name = sanitize_filename(&article.title);
        let directory = prepare_directory(&config.output_root, &dir_name)?;

        tracing::info!("Extracting images");
        let images = ImageReferences::from(article.content(), &url);
        let scope = if article.has_content_region() { "article body" } else { "whole page" };
        (article.title, dir_name, directory, images, scope)
    };

    tracing::info!("Found {} images in the {}", images.len(), scope);
    if images.is_empty() {
        tracing::info!("No images found, nothing to download");
        return Ok(Outcome::NoImages { title, directory });
    }

    let downloader = Downloader::new(fetcher, &url);
    let attempted = images.len();
    let mut succeeded = 0;

    for (idx, image) in images.iter().enumerate() {
        if idx > 0 {
            tokio::time::sleep(config.delay).await;
        }

        let stem = directory.join(format!("{}_{}", dir_name, idx));
        tracing::info!("[{}/{}] Downloading {}", idx + 1, attempted, image.url);

        match downloader.download(&image.url, &stem).await {
            Ok(saved) => {
                tracing::info!("  saved {}", saved.display());
                succeeded += 1;
            }
            Err(e) => tracing::warn!("  failed to download {}: {}", image.url, e),
        }
    }

    tracing::info!("Done! {}/{} images saved in {}", succeeded, attempted, directory.display());

    Ok(Outcome::Completed(Summary {
        title,
        directory,
        succeeded,
        attempted,
    }))
}

fn prepare_directory(root: &Path, name: &str) -> Result<PathBuf> {
    let directory = root.join(name);

    if directory.is_dir() {
        tracing::info!("Directory already exists: {}", directory.display());
    } else {
        std::fs::create_dir_all(&directory)?;
        tracing::info!("Created directory: {}", directory.display());
    }

    Ok(directory)
}
