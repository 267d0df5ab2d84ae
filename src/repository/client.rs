// src/repository/client.rs

//! HTTP access to Supermarket sites
//!
//! [`SiteClient`] is the seam between the mirror logic and the network.
//! [`HttpSiteClient`] implements it with reqwest, retrying metadata fetches
//! and streaming artifact downloads straight to disk.

use crate::config::Credentials;
use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response, multipart};
use serde_json::Value;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for a failed metadata fetch
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Header naming the uploading client
const USER_ID_HEADER: &str = "X-Ops-Userid";

/// Status and body returned by an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    pub body: String,
}

/// Network operations the mirror needs from a Supermarket site
///
/// Fetches and downloads fail with [`Error::NotFoundError`] on 404 and
/// [`Error::TransportError`] otherwise. An upload that reaches the server
/// returns its status and body whatever the status; only failing to deliver
/// the request is an error.
pub trait SiteClient {
    /// GET a JSON document
    fn get_json(&self, url: &str) -> Result<Value>;

    /// GET an artifact and write it to `dest`, returning the byte count
    fn download(&self, url: &str, dest: &mut File) -> Result<u64>;

    /// POST a cookbook artifact and its manifest
    fn upload(
        &self,
        url: &str,
        credentials: &Credentials,
        tarball: &Path,
        manifest: &str,
    ) -> Result<UploadResponse>;
}

/// Stream an HTTP response to a file, optionally updating a progress bar
fn stream_response_to_file(
    mut response: Response,
    file: &mut File,
    progress_bar: Option<&ProgressBar>,
) -> Result<u64> {
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| Error::TransportError(format!("Failed to read response: {e}")))?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| Error::IoError(format!("Failed to write data: {e}")))?;

        downloaded += bytes_read as u64;

        if let Some(pb) = progress_bar {
            pb.set_position(downloaded);
        }
    }

    file.flush()
        .map_err(|e| Error::IoError(format!("Failed to flush download: {e}")))?;

    Ok(downloaded)
}

/// Map a non-success status to the matching error
fn status_error(status: StatusCode, url: &str) -> Error {
    if status == StatusCode::NOT_FOUND {
        Error::NotFoundError(url.to_string())
    } else {
        Error::TransportError(format!("HTTP {} from {}", status, url))
    }
}

/// reqwest-backed [`SiteClient`]
pub struct HttpSiteClient {
    client: Client,
    max_retries: u32,
    show_progress: bool,
}

impl HttpSiteClient {
    /// Create a new client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("supermarket-mirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
            show_progress: false,
        })
    }

    /// Draw a byte progress bar while downloading
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Send a GET, retrying transport failures
    fn get_with_retry(&self, url: &str) -> Result<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(status_error(status, url));
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::TransportError(format!(
                            "Failed to fetch {url} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Fetch attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    fn progress_bar(&self, total_size: Option<u64>, url: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = match total_size {
            Some(size) if size > 0 => {
                let pb = ProgressBar::new(size);
                if let Ok(style) = ProgressStyle::with_template(
                    "  {msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})",
                ) {
                    pb.set_style(style.progress_chars("=> "));
                }
                pb
            }
            _ => ProgressBar::new_spinner(),
        };
        pb.set_message(url.to_string());
        Some(pb)
    }
}

impl SiteClient for HttpSiteClient {
    fn get_json(&self, url: &str) -> Result<Value> {
        debug!("Fetching {}", url);
        let response = self.get_with_retry(url)?;
        response
            .json()
            .map_err(|e| Error::ParseError(format!("Invalid JSON from {url}: {e}")))
    }

    fn download(&self, url: &str, dest: &mut File) -> Result<u64> {
        info!("Downloading {}", url);
        let response = self.get_with_retry(url)?;
        let pb = self.progress_bar(response.content_length(), url);
        let downloaded = stream_response_to_file(response, dest, pb.as_ref())?;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        debug!("Downloaded {} bytes from {}", downloaded, url);
        Ok(downloaded)
    }

    fn upload(
        &self,
        url: &str,
        credentials: &Credentials,
        tarball: &Path,
        manifest: &str,
    ) -> Result<UploadResponse> {
        info!("Uploading {} to {}", tarball.display(), url);

        let form = multipart::Form::new()
            .text("cookbook", manifest.to_string())
            .file("tarball", tarball)
            .map_err(|e| {
                Error::IoError(format!("Failed to attach {}: {e}", tarball.display()))
            })?;

        let response = self
            .client
            .post(url)
            .header(USER_ID_HEADER, &credentials.user_id)
            .multipart(form)
            .send()
            .map_err(|e| Error::TransportError(format!("Upload to {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| Error::TransportError(format!("Failed to read upload response: {e}")))?;

        debug!("Upload to {} answered {}", url, status);
        Ok(UploadResponse { status, body })
    }
}
