//! Minimal WebDAV client: just enough to keep one file in one directory.

use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Client, Method, RequestBuilder, Response, StatusCode};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::progress::ProgressFn;
use crate::storage::Credentials;

pub struct WebDavClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

fn propfind() -> Result<Method> {
    Ok(Method::from_bytes(b"PROPFIND")?)
}

fn mkcol() -> Result<Method> {
    Ok(Method::from_bytes(b"MKCOL")?)
}

fn check_status(response: &Response, action: &str) -> Result<()> {
    let status = response.status();
    if !status.is_success() {
        bail!(
            "{action} failed: HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        );
    }
    Ok(())
}

/// Where a download is written before it replaces the real file.
pub fn staging_path(local_path: &Path) -> PathBuf {
    let mut name = OsString::from(local_path.as_os_str());
    name.push(".download");
    PathBuf::from(name)
}

impl WebDavClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("memo/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: credentials.url.trim_end_matches('/').to_string(),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url_for(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Checks that the root collection answers with our credentials.
    pub async fn ping(&self) -> Result<()> {
        let response = self
            .request(propfind()?, "")
            .header("Depth", "0")
            .send()
            .await?;
        check_status(&response, "PROPFIND /")
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        let response = self
            .request(propfind()?, path)
            .header("Depth", "0")
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(&response, &format!("PROPFIND {path}"))?;
        Ok(true)
    }

    /// Create a collection. An existing collection counts as success.
    pub async fn mkdir(&self, path: &str) -> Result<()> {
        let dir = format!("{}/", path.trim_end_matches('/'));
        let response = self.request(mkcol()?, &dir).send().await?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            debug!(path, "Collection already exists");
            return Ok(());
        }
        check_status(&response, &format!("MKCOL {dir}"))
    }

    /// Upload `data` to `path`, reporting progress once per chunk.
    pub async fn write(
        &self,
        data: Vec<u8>,
        path: &str,
        progress: Option<ProgressFn>,
        chunk_size: usize,
    ) -> Result<()> {
        let total = data.len() as u64;
        let chunks: Vec<Vec<u8>> = data.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect();

        let mut sent: u64 = 0;
        let stream = futures_util::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            if let Some(report) = &progress {
                report(sent, total);
            }
            Ok::<_, std::io::Error>(chunk)
        });

        let response = self
            .request(Method::PUT, path)
            .header(CONTENT_LENGTH, total)
            .body(Body::wrap_stream(stream))
            .send()
            .await?;
        check_status(&response, &format!("PUT {path}"))
    }

    /// Download `path` over `local_path`.
    ///
    /// The body is streamed into a staging file which is renamed into place
    /// only once complete.
    pub async fn read_to_file(
        &self,
        path: &str,
        local_path: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<u64> {
        let response = self.request(Method::GET, path).send().await?;
        check_status(&response, &format!("GET {path}"))?;

        let total = response.content_length().unwrap_or(0);
        let staging = staging_path(local_path);

        let written = match stream_to_file(response, &staging, total, progress.as_ref()).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&staging, local_path)
            .await
            .with_context(|| format!("Failed to move download into place at {local_path:?}"))?;
        Ok(written)
    }
}

async fn stream_to_file(
    response: Response,
    target: &Path,
    total: u64,
    progress: Option<&ProgressFn>,
) -> Result<u64> {
    let mut file = tokio::fs::File::create(target)
        .await
        .with_context(|| format!("Failed to create {target:?}"))?;
    let mut stream = response.bytes_stream();
    let mut received: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;
        if let Some(report) = progress {
            report(received, total);
        }
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> WebDavClient {
        WebDavClient::new(&Credentials::new(url, "alice", "s3cret")).unwrap()
    }

    #[test]
    fn test_url_for_joins_cleanly() {
        let dav = client("https://dav.example.com/remote.php/webdav/");
        assert_eq!(
            dav.url_for("memo/memo.db"),
            "https://dav.example.com/remote.php/webdav/memo/memo.db"
        );
        assert_eq!(dav.url_for("/memo/"), "https://dav.example.com/remote.php/webdav/memo/");
        assert_eq!(dav.url_for(""), "https://dav.example.com/remote.php/webdav/");
    }

    #[test]
    fn test_staging_path() {
        let path = staging_path(Path::new("/data/memo/memo.db"));
        assert_eq!(path, PathBuf::from("/data/memo/memo.db.download"));
    }
}
