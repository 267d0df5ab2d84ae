// src/lib.rs

//! Supermarket Mirror
//!
//! Copies Chef cookbooks from one Supermarket site to another.
//!
//! # Architecture
//!
//! - Catalogs: each site's universe, kept as a JSON tree with typed views
//! - Diff: one structural delta, limited to cookbook/version for catalogs
//! - Versions: numeric ordering and Chef-style constraints
//! - Transfers: fetch, download, upload and classify one cookbook version
//! - Mirror: the four run shapes, sequential and throttled

pub mod catalog;
pub mod config;
pub mod diff;
mod error;
pub mod mirror;
pub mod progress;
pub mod repository;
pub mod transfer;
pub mod version;

pub use catalog::{Catalog, CookbookMetadata, PackageEntry, VersionDetail, VersionMetadata};
pub use config::{ConfigFile, Credentials, MirrorConfig, MirrorOptions};
pub use diff::{CatalogDiff, Depth, LeafRule, TreeDiff, delta, diff_catalogs, diff_trees};
pub use error::{Error, Result};
pub use mirror::{Mirror, MirrorRequest, MirrorSummary};
pub use progress::{
    CallbackReporter, ConsoleReporter, LogReporter, MirrorEvent, MirrorReporter, SilentReporter,
    SiteRole,
};
pub use repository::{HttpSiteClient, SiteClient, UploadResponse};
pub use transfer::{TransferExecutor, TransferOutcome, VersionRef, classify_upload};
pub use version::{
    CookbookVersion, VersionConstraint, compare_versions, constraint_matches,
    select_latest_matching, sort_versions,
};
