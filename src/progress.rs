// src/progress.rs

//! Mirror run reporting
//!
//! The orchestrator and transfer executor describe what they are doing as a
//! stream of [`MirrorEvent`]s handed to a [`MirrorReporter`]. The reporter
//! decides where they go:
//! - `ConsoleReporter`: human-readable lines on stdout/stderr
//! - `LogReporter`: tracing events
//! - `CallbackReporter`: a closure, for tests and embedding
//! - `SilentReporter`: nowhere
//!
//! # Example
//!
//! ```ignore
//! use supermarket_mirror::progress::{CallbackReporter, MirrorEvent};
//!
//! let reporter = CallbackReporter::new(|event: &MirrorEvent| {
//!     if let MirrorEvent::VersionFinished { cookbook, version, outcome, .. } = event {
//!         println!("{cookbook} {version}: {outcome}");
//!     }
//! });
//! ```

use crate::transfer::TransferOutcome;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Which side of the mirror a site is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteRole {
    Source,
    Target,
}

impl fmt::Display for SiteRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteRole::Source => write!(f, "source"),
            SiteRole::Target => write!(f, "target"),
        }
    }
}

/// How loudly an event should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

/// Something that happened during a mirror run
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorEvent {
    /// What the run is about to do
    Banner(String),
    /// A pause will follow every processed version
    Throttle { delay: Duration },
    FetchingIndex { site: String, role: SiteRole },
    FetchingCookbook {
        cookbook: String,
        site: String,
        role: SiteRole,
    },
    /// The last fetch finished
    Fetched { site: String, role: SiteRole },
    /// Source cookbooks with at least one version the target lacks
    MissingCookbooks { missing: usize, total: usize },
    /// Target cookbooks the source no longer has; nothing is done about them
    RemovedCookbooks { count: usize },
    /// `"<cookbook> <version>"` whose dependencies differ between the sites
    DependencyDrift { entry: String },
    CookbookStarted { cookbook: String, versions: usize },
    Deprecated {
        cookbook: String,
        replacement: Option<String>,
    },
    VersionStarted { cookbook: String, version: String },
    VersionFinished {
        cookbook: String,
        version: String,
        /// Target site the upload went to
        site: String,
        outcome: TransferOutcome,
    },
    /// A failed artifact was kept on disk
    ArtifactKept {
        cookbook: String,
        version: String,
        path: PathBuf,
    },
    DependencyResolved {
        cookbook: String,
        constraint: String,
        version: String,
    },
    DependencyUnresolved {
        cookbook: String,
        constraint: String,
        reason: String,
    },
    Notice(String),
}

impl MirrorEvent {
    pub fn level(&self) -> EventLevel {
        match self {
            MirrorEvent::DependencyDrift { .. }
            | MirrorEvent::Deprecated { .. }
            | MirrorEvent::DependencyUnresolved { .. } => EventLevel::Warning,
            MirrorEvent::VersionFinished { outcome, .. } => match outcome {
                TransferOutcome::Success => EventLevel::Info,
                TransferOutcome::NotFound => EventLevel::Warning,
                TransferOutcome::UploadRejected(_) | TransferOutcome::UploadError(_) => {
                    EventLevel::Error
                }
            },
            _ => EventLevel::Info,
        }
    }
}

impl fmt::Display for MirrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorEvent::Banner(text) | MirrorEvent::Notice(text) => write!(f, "{}", text),
            MirrorEvent::Throttle { delay } => {
                write!(f, "Delaying by {} seconds per version.", delay.as_secs_f64())
            }
            MirrorEvent::FetchingIndex { site, role } => {
                write!(f, "Fetching cookbook index from {} ({})...", site, role)
            }
            MirrorEvent::FetchingCookbook {
                cookbook,
                site,
                role,
            } => write!(f, "Fetching {} metadata from {} ({})...", cookbook, site, role),
            MirrorEvent::Fetched { site, role } => write!(f, "Fetched {} data from {}", role, site),
            MirrorEvent::MissingCookbooks { missing, total } => write!(
                f,
                "We are still missing {} cookbooks (out of {}) on the target Supermarket.",
                missing, total
            ),
            MirrorEvent::RemovedCookbooks { count } => write!(
                f,
                "{} cookbooks on the target are no longer present on the source; leaving them alone.",
                count
            ),
            MirrorEvent::DependencyDrift { entry } => {
                write!(f, "Dependencies of {} changed without a version bump", entry)
            }
            MirrorEvent::CookbookStarted { cookbook, versions } => {
                write!(f, "Mirroring {} version(s) for {} cookbook:", versions, cookbook)
            }
            MirrorEvent::Deprecated {
                cookbook,
                replacement: Some(replacement),
            } => write!(
                f,
                "Cookbook {} has been deprecated. It has been replaced by {}.",
                cookbook, replacement
            ),
            MirrorEvent::Deprecated {
                cookbook,
                replacement: None,
            } => write!(f, "Cookbook {} has been deprecated.", cookbook),
            MirrorEvent::VersionStarted { cookbook, version } => {
                write!(f, "Processing {} version {}", cookbook, version)
            }
            MirrorEvent::VersionFinished {
                cookbook,
                version,
                site,
                outcome,
            } => match outcome {
                TransferOutcome::Success => write!(f, "{} ({}) done", cookbook, version),
                TransferOutcome::NotFound => {
                    write!(f, "{} ({}) not found on the source", cookbook, version)
                }
                TransferOutcome::UploadRejected(message) => {
                    write!(f, "{} ({}) failed on {}: {}", cookbook, version, site, message)
                }
                TransferOutcome::UploadError(body) => write!(
                    f,
                    "{} ({}) failed on {}: unknown error while uploading cookbook. Server response: {}",
                    cookbook, version, site, body
                ),
            },
            MirrorEvent::ArtifactKept { path, .. } => {
                write!(f, "Saving failed cookbook ({})", path.display())
            }
            MirrorEvent::DependencyResolved {
                cookbook,
                constraint,
                version,
            } => write!(
                f,
                "Most recent version matching constraint ({}) for cookbook {}: {}",
                constraint, cookbook, version
            ),
            MirrorEvent::DependencyUnresolved {
                cookbook,
                constraint,
                reason,
            } => write!(
                f,
                "Skipping dependency {} ({}): {}",
                cookbook, constraint, reason
            ),
        }
    }
}

/// Receiver of mirror events
///
/// Implementations should be thread-safe (Send + Sync) so a reporter can be
/// shared with whatever drives the run.
pub trait MirrorReporter: Send + Sync {
    fn report(&self, event: &MirrorEvent);
}

/// Prints events for a person watching the terminal
///
/// Informational lines go to stdout, warnings and errors to stderr.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

impl MirrorReporter for ConsoleReporter {
    fn report(&self, event: &MirrorEvent) {
        match event.level() {
            EventLevel::Info => println!("{}", event),
            EventLevel::Warning => eprintln!("WARNING: {}", event),
            EventLevel::Error => eprintln!("ERROR: {}", event),
        }
    }
}

/// Sends events to tracing
///
/// Useful for non-interactive environments where everything should end up
/// in the log.
#[derive(Debug, Default)]
pub struct LogReporter;

impl LogReporter {
    pub fn new() -> Self {
        Self
    }
}

impl MirrorReporter for LogReporter {
    fn report(&self, event: &MirrorEvent) {
        match event.level() {
            EventLevel::Info => info!("{}", event),
            EventLevel::Warning => warn!("{}", event),
            EventLevel::Error => error!("{}", event),
        }
    }
}

/// Calls a user-provided function for every event
pub struct CallbackReporter<F>
where
    F: Fn(&MirrorEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackReporter<F>
where
    F: Fn(&MirrorEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> MirrorReporter for CallbackReporter<F>
where
    F: Fn(&MirrorEvent) + Send + Sync,
{
    fn report(&self, event: &MirrorEvent) {
        (self.callback)(event);
    }
}

/// Drops every event
#[derive(Debug, Default)]
pub struct SilentReporter;

impl SilentReporter {
    pub fn new() -> Self {
        Self
    }
}

impl MirrorReporter for SilentReporter {
    fn report(&self, _event: &MirrorEvent) {}
}
