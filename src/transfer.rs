// src/transfer.rs

//! Moving one cookbook version from the source site to the target site
//!
//! A transfer fetches the version record, downloads the artifact into a
//! staging file, uploads it with a minimal manifest and classifies the
//! target's answer. Only a failure to deliver the upload (or to reach the
//! source at all) is an `Err`; everything the target says back is a
//! [`TransferOutcome`].
//!
//! The staging file is a [`NamedTempFile`], so it disappears on every exit
//! path unless the keep policy moves it into the download directory.

use crate::catalog::{CookbookMetadata, VersionDetail};
use crate::config::MirrorConfig;
use crate::error::{Error, Result};
use crate::progress::{MirrorEvent, MirrorReporter};
use crate::repository::{SiteClient, UploadResponse, endpoints};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Extension of cookbook artifacts
pub const ARTIFACT_EXTENSION: &str = "tar.gz";

/// Status the target answers a successful upload with
const UPLOAD_CREATED: u16 = 201;

/// How a single transfer ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Success,
    /// The target refused the cookbook and said why
    UploadRejected(String),
    /// The target failed without a usable explanation; holds the raw body
    UploadError(String),
    /// The source has no such version, or no artifact for it
    NotFound,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success)
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOutcome::Success => write!(f, "success"),
            TransferOutcome::UploadRejected(message) => write!(f, "rejected: {}", message),
            TransferOutcome::UploadError(body) => write!(f, "upload error: {}", body),
            TransferOutcome::NotFound => write!(f, "not found"),
        }
    }
}

/// Which version of a cookbook to transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRef {
    /// Whatever the cookbook record's `latest_version` points at
    Latest,
    Exact(String),
}

impl VersionRef {
    pub fn exact(version: impl Into<String>) -> Self {
        VersionRef::Exact(version.into())
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRef::Latest => write!(f, "latest"),
            VersionRef::Exact(version) => write!(f, "{}", version),
        }
    }
}

/// Manifest sent alongside the tarball
///
/// Supermarket only accepts the category through this part, so that is all
/// we send.
#[derive(Debug, Default, Serialize)]
struct UploadManifest<'a> {
    category: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    #[serde(default)]
    error_messages: Vec<Value>,
}

/// Turn an upload response into an outcome
///
/// `201` is success. A `5xx` keeps the raw body. Anything else is searched
/// for a JSON `error_messages` array whose first entry becomes the rejection
/// message, falling back to the raw body.
pub fn classify_upload(response: &UploadResponse) -> TransferOutcome {
    match response.status {
        UPLOAD_CREATED => TransferOutcome::Success,
        500..=599 => TransferOutcome::UploadError(response.body.clone()),
        _ => serde_json::from_str::<UploadErrorBody>(&response.body)
            .ok()
            .and_then(|body| body.error_messages.into_iter().next())
            .map(|first| match first {
                Value::String(message) => TransferOutcome::UploadRejected(message),
                other => TransferOutcome::UploadRejected(other.to_string()),
            })
            .unwrap_or_else(|| TransferOutcome::UploadError(response.body.clone())),
    }
}

/// Runs transfers for one mirror configuration
pub struct TransferExecutor<'a> {
    client: &'a dyn SiteClient,
    config: &'a MirrorConfig,
    reporter: &'a dyn MirrorReporter,
}

impl<'a> TransferExecutor<'a> {
    pub fn new(
        client: &'a dyn SiteClient,
        config: &'a MirrorConfig,
        reporter: &'a dyn MirrorReporter,
    ) -> Self {
        Self {
            client,
            config,
            reporter,
        }
    }

    /// Transfer one version of `cookbook`
    ///
    /// `metadata` is the source site's record for the cookbook; it supplies
    /// the latest-version pointer for [`VersionRef::Latest`].
    pub fn transfer(
        &self,
        cookbook: &str,
        metadata: &CookbookMetadata,
        version: &VersionRef,
    ) -> Result<TransferOutcome> {
        let source = &self.config.source_site;

        let Some(detail) = self.fetch_version(cookbook, metadata, version)? else {
            debug!("No {} metadata for {} on {}", version, cookbook, source);
            return Ok(self.finish(cookbook, &version.to_string(), TransferOutcome::NotFound));
        };
        let resolved = if detail.version.is_empty() {
            version.to_string()
        } else {
            detail.version.clone()
        };

        self.reporter.report(&MirrorEvent::VersionStarted {
            cookbook: cookbook.to_string(),
            version: resolved.clone(),
        });

        let Some(artifact_url) = detail.artifact_url() else {
            debug!("{} ({}) has no artifact URL", cookbook, resolved);
            return Ok(self.finish(cookbook, &resolved, TransferOutcome::NotFound));
        };

        let mut staging = self.staging_file(cookbook)?;
        match self.client.download(artifact_url, staging.as_file_mut()) {
            Ok(bytes) => debug!("Staged {} bytes at {}", bytes, staging.path().display()),
            Err(e) if e.is_not_found() => {
                return Ok(self.finish(cookbook, &resolved, TransferOutcome::NotFound));
            }
            Err(e) => {
                return Err(Error::TransportError(format!(
                    "Failed to download {} ({}) from {}: {}",
                    cookbook, resolved, source, e
                )));
            }
        }

        let manifest = serde_json::to_string(&UploadManifest::default())
            .map_err(|e| Error::ParseError(format!("Failed to encode upload manifest: {e}")))?;
        let target = &self.config.target_site;

        let response = match self.client.upload(
            &endpoints::cookbooks_url(target),
            &self.config.credentials,
            staging.path(),
            &manifest,
        ) {
            Ok(response) => response,
            Err(e) => {
                debug!("Upload of {} ({}) failed: {:?}", cookbook, resolved, e);
                if let Err(cleanup) = self.dispose(staging, cookbook, &resolved) {
                    warn!("Failed to clean up {} ({}): {}", cookbook, resolved, cleanup);
                }
                return Err(Error::UploadTransport {
                    cookbook: cookbook.to_string(),
                    version: resolved,
                    site: target.clone(),
                    message: e.to_string(),
                });
            }
        };

        let outcome = self.finish(cookbook, &resolved, classify_upload(&response));
        if !outcome.is_success() {
            debug!("Server response for {} ({}): {}", cookbook, resolved, response.body);
            self.dispose(staging, cookbook, &resolved)?;
        }
        Ok(outcome)
    }

    /// Fetch the version record, `None` when the source has none
    fn fetch_version(
        &self,
        cookbook: &str,
        metadata: &CookbookMetadata,
        version: &VersionRef,
    ) -> Result<Option<VersionDetail>> {
        let source = &self.config.source_site;
        let url = match version {
            VersionRef::Latest => match metadata.latest_version.as_deref() {
                Some(url) => url.to_string(),
                None => return Ok(None),
            },
            VersionRef::Exact(version) => endpoints::version_url(source, cookbook, version),
        };

        match self.client.get_json(&url) {
            Ok(value) => VersionDetail::from_value(value).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(Error::MetadataFetch {
                cookbook: cookbook.to_string(),
                site: source.clone(),
                message: e.to_string(),
            }),
        }
    }

    fn staging_file(&self, cookbook: &str) -> Result<NamedTempFile> {
        let prefix = format!("{}-", cookbook);
        let suffix = format!(".{}", ARTIFACT_EXTENSION);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(&suffix);

        let staged = match &self.config.work_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        staged.map_err(|e| Error::IoError(format!("Failed to create staging file: {e}")))
    }

    /// Keep or delete the artifact of a failed upload
    fn dispose(&self, staging: NamedTempFile, cookbook: &str, version: &str) -> Result<()> {
        if !self.config.keep_failed {
            let path = staging.path().to_path_buf();
            staging
                .close()
                .map_err(|e| Error::IoError(format!("Failed to remove {}: {e}", path.display())))?;
            debug!("Removed {}", path.display());
            return Ok(());
        }

        let dir = &self.config.download_dir;
        fs::create_dir_all(dir)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", dir.display())))?;
        let dest = self.config.kept_artifact_path(cookbook, version);

        if let Err(persist) = staging.persist(&dest) {
            // rename fails across filesystems
            debug!("Rename to {} failed ({}), copying", dest.display(), persist.error);
            fs::copy(persist.file.path(), &dest).map_err(|e| {
                Error::IoError(format!("Failed to keep artifact at {}: {e}", dest.display()))
            })?;
        }

        self.reporter.report(&MirrorEvent::ArtifactKept {
            cookbook: cookbook.to_string(),
            version: version.to_string(),
            path: dest,
        });
        Ok(())
    }

    fn finish(&self, cookbook: &str, version: &str, outcome: TransferOutcome) -> TransferOutcome {
        self.reporter.report(&MirrorEvent::VersionFinished {
            cookbook: cookbook.to_string(),
            version: version.to_string(),
            site: self.config.target_site.clone(),
            outcome: outcome.clone(),
        });
        outcome
    }
}
