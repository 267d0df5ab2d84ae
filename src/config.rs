// src/config.rs

//! Mirror configuration
//!
//! Settings come from three places, highest precedence first: command-line
//! flags ([`MirrorOptions`]), an optional TOML file ([`ConfigFile`]), and
//! built-in defaults. The result is a [`MirrorConfig`] value handed to the
//! orchestrator; nothing is read from ambient state after that.
//!
//! # Example config.toml
//!
//! ```toml
//! supermarket_site = "https://supermarket.chef.io"
//! target_site = "https://supermarket.example.com"
//! download_directory = "/var/tmp/failed-cookbooks"
//! delay = 2
//! node_name = "mirror-bot"
//! client_key = "/etc/supermarket-mirror/mirror-bot.pem"
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Public Supermarket used as the source when none is configured
pub const DEFAULT_SOURCE_SITE: &str = "https://supermarket.chef.io";

/// Directory name under the user config dir
const CONFIG_DIR_NAME: &str = "supermarket-mirror";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Identity used for uploads to the target site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Client (node) name known to the target site
    pub user_id: String,
    /// Private key belonging to `user_id`
    pub client_key: PathBuf,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, client_key: impl Into<PathBuf>) -> Self {
        Self {
            user_id: user_id.into(),
            client_key: client_key.into(),
        }
    }
}

/// Everything a mirror run needs to know
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Site cookbooks are read from
    pub source_site: String,
    /// Site cookbooks are uploaded to
    pub target_site: String,
    /// Where artifacts that failed to upload are kept (with `keep_failed`)
    pub download_dir: PathBuf,
    /// Where artifacts are staged while in flight; system temp dir if unset
    pub work_dir: Option<PathBuf>,
    /// Pause after each processed version
    pub delay: Option<Duration>,
    /// Keep artifacts whose upload failed instead of deleting them
    pub keep_failed: bool,
    /// Also mirror the direct dependencies of a cookbook's latest version
    pub include_dependencies: bool,
    /// Also mirror replacements of deprecated cookbooks (not implemented)
    pub include_replacements: bool,
    pub credentials: Credentials,
}

impl MirrorConfig {
    /// Configuration with defaults for everything but the sites and identity
    pub fn new(
        source_site: impl Into<String>,
        target_site: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            source_site: normalize_site(&source_site.into()),
            target_site: normalize_site(&target_site.into()),
            download_dir: PathBuf::from("."),
            work_dir: None,
            delay: None,
            keep_failed: false,
            include_dependencies: false,
            include_replacements: false,
            credentials,
        }
    }

    /// Merge command-line options over a config file
    pub fn resolve(options: &MirrorOptions, file: &ConfigFile) -> Result<Self> {
        let (source_site, target_site) = resolve_sites(options, file)?;

        let user_id = options
            .user
            .clone()
            .or_else(|| file.node_name.clone())
            .ok_or_else(|| {
                Error::ConfigError(
                    "no client name configured (use --user or node_name in the config file)"
                        .to_string(),
                )
            })?;
        let client_key = options
            .client_key
            .clone()
            .or_else(|| file.client_key.clone())
            .ok_or_else(|| {
                Error::ConfigError(
                    "no client key configured (use --key or client_key in the config file)"
                        .to_string(),
                )
            })?;
        if !client_key.is_file() {
            return Err(Error::ConfigError(format!(
                "client key {} does not exist",
                client_key.display()
            )));
        }

        let download_dir = match options
            .download_dir
            .clone()
            .or_else(|| file.download_directory.clone())
        {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(|e| {
                Error::IoError(format!("Failed to determine current directory: {e}"))
            })?,
        };

        let delay = options.delay.or(file.delay).map(Duration::from_secs);

        Ok(Self {
            source_site,
            target_site,
            download_dir,
            work_dir: options.work_dir.clone().or_else(|| file.work_directory.clone()),
            delay,
            keep_failed: options.keep,
            include_dependencies: options.deps,
            include_replacements: options.reps,
            credentials: Credentials {
                user_id,
                client_key,
            },
        })
    }

    /// Path a failed artifact is kept under
    pub fn kept_artifact_path(&self, cookbook: &str, version: &str) -> PathBuf {
        self.download_dir
            .join(format!("{}-{}.{}", cookbook, version, crate::transfer::ARTIFACT_EXTENSION))
    }
}

/// Settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct MirrorOptions {
    pub source_site: Option<String>,
    pub target_site: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub delay: Option<u64>,
    pub keep: bool,
    pub deps: bool,
    pub reps: bool,
    pub user: Option<String>,
    pub client_key: Option<PathBuf>,
}

/// On-disk configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub supermarket_site: Option<String>,
    pub target_site: Option<String>,
    pub download_directory: Option<PathBuf>,
    pub work_directory: Option<PathBuf>,
    /// Seconds
    pub delay: Option<u64>,
    pub node_name: Option<String>,
    pub client_key: Option<PathBuf>,
}

impl ConfigFile {
    /// Default location: `<config dir>/supermarket-mirror/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load an explicit path, or the default path when it exists
    ///
    /// A missing default file yields an empty configuration; a missing
    /// explicit file is an error.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                debug!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

/// Source and target site after precedence rules
///
/// The target has no default.
pub fn resolve_sites(options: &MirrorOptions, file: &ConfigFile) -> Result<(String, String)> {
    let source = options
        .source_site
        .clone()
        .or_else(|| file.supermarket_site.clone())
        .unwrap_or_else(|| DEFAULT_SOURCE_SITE.to_string());
    let target = options
        .target_site
        .clone()
        .or_else(|| file.target_site.clone())
        .ok_or_else(|| {
            Error::ConfigError(
                "no target site configured (use --target-site or target_site in the config file)"
                    .to_string(),
            )
        })?;
    Ok((normalize_site(&source), normalize_site(&target)))
}

/// Strip trailing slashes so URLs can be joined with `/`
pub fn normalize_site(site: &str) -> String {
    site.trim().trim_end_matches('/').to_string()
}
