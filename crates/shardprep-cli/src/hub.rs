//! Shard acquisition from the Hugging Face Hub.
//!
//! Downloads dataset shard files into a local directory, skipping files that
//! are already materialized so repeated runs never re-fetch and always
//! return the same stable path. Response bodies stream straight to disk
//! through a temp file that is renamed into place once the transfer
//! completes; an interrupted download therefore never leaves a
//! plausible-looking partial shard behind.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use snafu::prelude::*;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const HUB_BASE_URL: &str = "https://huggingface.co";

const CLIENT_USER_AGENT: &str = concat!("shardprep/", env!("CARGO_PKG_VERSION"));

/// Total per-request timeout. Metadata shards run to a gigabyte, so this is
/// deliberately generous.
const REQUEST_TIMEOUT_SECS: u64 = 1_800;

/// Errors raised while materializing shards from the hub.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FetchError {
    /// The HTTP client could not be constructed.
    #[snafu(display("Failed to build HTTP client: {source}"))]
    BuildClient { source: reqwest::Error },

    /// The access token contains bytes that cannot go into a header.
    #[snafu(display("Access token is not a valid header value"))]
    InvalidToken,

    /// The request failed before a response arrived.
    #[snafu(display("Request failed for {url}: {source}"))]
    Network { url: String, source: reqwest::Error },

    /// The hub answered with a non-success status.
    #[snafu(display("Hub returned {status} for {url}"))]
    Status { status: StatusCode, url: String },

    /// A filesystem operation on the destination failed.
    #[snafu(display("I/O error at {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result alias for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// A shard materialized on local disk.
#[derive(Debug, Clone)]
pub struct FetchedShard {
    /// Stable local path of the shard file.
    pub path: PathBuf,
    /// False when the file was already present and no request was made.
    pub downloaded: bool,
}

/// Removes the temp file on drop unless the download completed.
struct TempFileGuard {
    path: Option<PathBuf>,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// HTTP client scoped to one dataset repository.
#[derive(Debug)]
pub struct HubClient {
    http: reqwest::Client,
    repo_id: String,
}

impl HubClient {
    /// Build a client for `repo_id`, attaching `token` to every request when given.
    pub fn new(repo_id: impl Into<String>, token: Option<String>) -> FetchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .ok()
                .context(InvalidTokenSnafu)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context(BuildClientSnafu)?;

        Ok(Self {
            http,
            repo_id: repo_id.into(),
        })
    }

    fn shard_url(&self, shard: &str) -> String {
        format!(
            "{HUB_BASE_URL}/datasets/{}/resolve/main/{shard}",
            self.repo_id
        )
    }

    /// Materialize `shard` under `out_dir`, downloading it if absent.
    ///
    /// Idempotent: an already-present destination file short-circuits without
    /// any network traffic.
    pub async fn fetch(&self, shard: &str, out_dir: &Path) -> FetchResult<FetchedShard> {
        let dst = out_dir.join(shard);
        if fs::try_exists(&dst).await.context(IoSnafu { path: &dst })? {
            return Ok(FetchedShard {
                path: dst,
                downloaded: false,
            });
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .await
                .context(IoSnafu { path: parent })?;
        }

        let url = self.shard_url(shard);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context(NetworkSnafu { url: &url })?;
        if !resp.status().is_success() {
            return StatusSnafu {
                status: resp.status(),
                url,
            }
            .fail();
        }

        let tmp = dst.with_extension("download");
        let mut guard = TempFileGuard::new(tmp.clone());
        let mut file = fs::File::create(&tmp).await.context(IoSnafu { path: &tmp })?;

        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context(NetworkSnafu { url: &url })?;
            file.write_all(&chunk)
                .await
                .context(IoSnafu { path: &tmp })?;
        }
        file.flush().await.context(IoSnafu { path: &tmp })?;
        drop(file);

        fs::rename(&tmp, &dst).await.context(IoSnafu { path: &dst })?;
        guard.disarm();

        Ok(FetchedShard {
            path: dst,
            downloaded: true,
        })
    }
}
