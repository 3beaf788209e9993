//! Cancellable installer downloads with streaming SHA256.
//!
//! Bytes land in `<dest>.partial` and are renamed onto `dest` only after the
//! last chunk, so a file at `dest` is always complete. Cancellation and errors
//! remove the partial file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use pim_schema::{PackageId, Sha256Digest, Version};
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::reporter::Reporter;

/// Why a download did not complete.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Request failed or the server answered with an error status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Writing the file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cancellation was requested mid-transfer.
    #[error("Download cancelled")]
    Cancelled,

    /// Neither http(s), `file://` nor a bare path.
    #[error("Unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),
}

/// Request for a download operation
pub struct DownloadRequest<'a> {
    /// Package being downloaded, for progress.
    pub id: &'a PackageId,
    /// Its version, for progress.
    pub version: &'a Version,
    /// Where to fetch from.
    pub url: &'a str,
    /// Final file path; a `.partial` sibling is used while writing.
    pub dest: &'a Path,
    /// Receives progress.
    pub reporter: &'a dyn Reporter,
    /// Checked between chunks.
    pub cancel: &'a CancellationToken,
}

impl std::fmt::Debug for DownloadRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("id", self.id)
            .field("url", &self.url)
            .field("dest", &self.dest)
            .finish_non_exhaustive()
    }
}

/// Fetches installer bytes to disk.
#[async_trait]
pub trait Downloader: Send + Sync + std::fmt::Debug {
    /// Download `req.url` to `req.dest`, returning the digest of the bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on transfer failure or cancellation.
    async fn download(&self, req: DownloadRequest<'_>) -> Result<Sha256Digest, DownloadError>;
}

/// Downloads over HTTP(S), and copies `file://` URLs and bare paths.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// Download with `client`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, req: DownloadRequest<'_>) -> Result<Sha256Digest, DownloadError> {
        if req.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        if let Some(parent) = req.dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let local = match req.url.split_once("://") {
            Some((scheme, rest)) => match scheme.to_ascii_lowercase().as_str() {
                "http" | "https" => None,
                "file" => Some(rest),
                other => return Err(DownloadError::UnsupportedScheme(other.to_string())),
            },
            None => Some(req.url),
        };

        if let Some(path) = local {
            tracing::debug!("Copying {} to {}", path, req.dest.display());
            let file = File::open(path).await?;
            let total = file.metadata().await.ok().map(|m| m.len());
            let stream = ReaderStream::new(file).map(|r| r.map_err(DownloadError::from));
            return write_stream(&req, total, stream).await;
        }

        tracing::debug!("Downloading {} to {}", req.url, req.dest.display());
        let response = tokio::select! {
            biased;
            () = req.cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self
                .client
                .get(req.url)
                .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
                .send() => response?.error_for_status()?,
        };
        let total = response.content_length();
        let stream = response
            .bytes_stream()
            .map(|r| r.map_err(DownloadError::from));
        write_stream(&req, total, stream).await
    }
}

/// `<dest>.partial`
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

async fn write_stream<S>(
    req: &DownloadRequest<'_>,
    total: Option<u64>,
    stream: S,
) -> Result<Sha256Digest, DownloadError>
where
    S: Stream<Item = Result<Bytes, DownloadError>> + Unpin,
{
    let partial = partial_path(req.dest);
    let outcome = async {
        let digest = copy_into(&partial, req, total, stream).await?;
        tokio::fs::rename(&partial, req.dest).await?;
        Ok::<_, DownloadError>(digest)
    }
    .await;

    if outcome.is_err() {
        tokio::fs::remove_file(&partial).await.ok();
    }
    outcome
}

async fn copy_into<S>(
    partial: &Path,
    req: &DownloadRequest<'_>,
    total: Option<u64>,
    mut stream: S,
) -> Result<Sha256Digest, DownloadError>
where
    S: Stream<Item = Result<Bytes, DownloadError>> + Unpin,
{
    let mut file = File::create(partial).await?;
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;

    req.reporter.downloading(req.id, req.version, 0, total);

    loop {
        let next = tokio::select! {
            biased;
            () = req.cancel.cancelled() => {
                tracing::debug!("Download of {} cancelled after {downloaded} bytes", req.id);
                return Err(DownloadError::Cancelled);
            }
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
        req.reporter
            .downloading(req.id, req.version, downloaded, total);
    }

    file.flush().await?;
    Ok(Sha256Digest::from_bytes(&hasher.finalize()))
}
