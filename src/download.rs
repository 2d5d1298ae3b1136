use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, REFERER};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

use crate::fetcher::Fetcher;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("ReqwestError: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("Server answered {0}")]
    StatusError(StatusCode),
    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DownloadError>;

const CHUNK_SIZE: usize = 8 * 1024;

const DEFAULT_EXTENSION: &str = ".jpg";

/// Saves images one at a time, sending the article site as `Referer`.
pub struct Downloader {
    fetcher: Fetcher,
    referer: String,
}

impl Downloader {

    /// `site` is the article URL; only its origin ends up in the header.
    pub fn new(fetcher: Fetcher, site: &Url) -> Self {
        Self {
            fetcher,
            referer: site_root(site),
        }
    }

    /// Downloads `url` to `stem` plus the resolved extension and returns
    /// the path written.
    pub async fn download(&self, url: &Url, stem: &Path) -> Result<PathBuf> {

        let response = self.fetcher
            .client()
            .get(url.clone())
            .header(REFERER, &self.referer)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::StatusError(status));
        }

        let extension = path_extension(url).unwrap_or_else(|| {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            extension_for_content_type(content_type).to_string()
        });

        let output_path = with_extension(stem, &extension);

        let file = tokio::fs::File::create(&output_path).await?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            writer.write_all(&chunk?).await?;
        }
        writer.flush().await?;

        Ok(output_path)
    }
}

/// `scheme://host[:port]/` of the given address.
pub fn site_root(url: &Url) -> String {
    format!("{}/", url.origin().ascii_serialization())
}

/// Extension of the last path segment, dot included. Leading dots of a
/// hidden-file style name do not count. A bare trailing dot (`name.`)
/// gives `None` rather than `"."`, leaving the choice to the content type.
pub fn path_extension(url: &Url) -> Option<String> {
    let name = url.path_segments()?.next_back()?;
    let stripped = name.trim_start_matches('.');
    let dot = stripped.rfind('.')?;
    let extension = &stripped[dot..];

    (extension.len() > 1).then(|| extension.to_string())
}

pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let content_type = content_type.to_ascii_lowercase();

    if content_type.contains("jpeg") || content_type.contains("jpg") {
        ".jpg"
    } else if content_type.contains("png") {
        ".png"
    } else if content_type.contains("gif") {
        ".gif"
    } else if content_type.contains("webp") {
        ".webp"
    } else {
        DEFAULT_EXTENSION
    }
}

fn with_extension(stem: &Path, extension: &str) -> PathBuf {
    let mut path = stem.as_os_str().to_owned();
    if !stem.to_string_lossy().ends_with(extension) {
        path.push(extension);
    }
    PathBuf::from(path)
}
