// src/mirror.rs

//! Mirror orchestration
//!
//! A run is one of four shapes ([`MirrorRequest`]):
//! 1. everything the target is missing, found by diffing both catalogs
//! 2. every version of one cookbook the target is missing
//! 3. one exact version
//! 4. the latest version, optionally followed by its direct dependencies
//!
//! Work items are processed strictly in order, one at a time. A per-item
//! failure is counted and the run moves on; any `Err` ends the run.

use crate::catalog::{Catalog, CookbookMetadata, VersionDetail};
use crate::config::MirrorConfig;
use crate::diff::{CatalogDiff, Depth, LeafRule, TreeDiff, delta, diff_catalogs, diff_trees};
use crate::error::{Error, Result};
use crate::progress::{MirrorEvent, MirrorReporter, SiteRole};
use crate::repository::{SiteClient, endpoints};
use crate::transfer::{TransferExecutor, TransferOutcome, VersionRef};
use crate::version::{VersionConstraint, select_latest_matching, sort_versions};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::thread;
use tracing::{debug, info};

/// Name standing for "every cookbook" or "every version"
pub const ALL: &str = "all";

/// What to mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorRequest {
    /// Every cookbook version the target lacks
    Everything,
    /// Every version of one cookbook the target lacks
    AllVersions { cookbook: String },
    /// One version of one cookbook
    Exact { cookbook: String, version: String },
    /// The newest version of one cookbook
    Latest { cookbook: String },
}

impl MirrorRequest {
    /// Interpret `<cookbook|all> [<version|all>]`
    pub fn from_args(cookbook: &str, version: Option<&str>) -> Self {
        match (cookbook, version) {
            (ALL, _) => MirrorRequest::Everything,
            (cookbook, Some(ALL)) => MirrorRequest::AllVersions {
                cookbook: cookbook.to_string(),
            },
            (cookbook, Some(version)) => MirrorRequest::Exact {
                cookbook: cookbook.to_string(),
                version: version.to_string(),
            },
            (cookbook, None) => MirrorRequest::Latest {
                cookbook: cookbook.to_string(),
            },
        }
    }

    fn banner(&self) -> String {
        match self {
            MirrorRequest::Everything => "Mirroring all versions for all cookbooks".to_string(),
            MirrorRequest::AllVersions { cookbook } => {
                format!("Mirroring all versions for {}.", cookbook)
            }
            MirrorRequest::Exact { cookbook, version } => {
                format!("Mirroring {} ({}).", cookbook, version)
            }
            MirrorRequest::Latest { cookbook } => {
                format!("Mirroring {} (latest version).", cookbook)
            }
        }
    }
}

/// Transfer counts for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorSummary {
    pub succeeded: usize,
    pub rejected: usize,
    pub errored: usize,
    pub not_found: usize,
}

impl MirrorSummary {
    pub fn record(&mut self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Success => self.succeeded += 1,
            TransferOutcome::UploadRejected(_) => self.rejected += 1,
            TransferOutcome::UploadError(_) => self.errored += 1,
            TransferOutcome::NotFound => self.not_found += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.rejected + self.errored + self.not_found
    }

    /// Transfers that reached the target and failed there
    pub fn failed(&self) -> usize {
        self.rejected + self.errored
    }
}

impl fmt::Display for MirrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed: {} succeeded, {} rejected, {} errored, {} not found",
            self.total(),
            self.succeeded,
            self.rejected,
            self.errored,
            self.not_found
        )
    }
}

/// Mutable bookkeeping for one run
#[derive(Default)]
struct RunState {
    summary: MirrorSummary,
    deprecation_shown: HashSet<String>,
}

/// Drives transfers from the source site to the target site
pub struct Mirror<'a> {
    client: &'a dyn SiteClient,
    config: &'a MirrorConfig,
    reporter: &'a dyn MirrorReporter,
}

impl<'a> Mirror<'a> {
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

    /// Run one request to completion
    pub fn run(&self, request: &MirrorRequest) -> Result<MirrorSummary> {
        info!(
            "Mirroring from {} to {}",
            self.config.source_site, self.config.target_site
        );
        self.reporter.report(&MirrorEvent::Banner(request.banner()));
        if self.config.include_replacements {
            self.reporter.report(&MirrorEvent::Notice(
                "Mirroring replacements of deprecated cookbooks is not supported; ignoring."
                    .to_string(),
            ));
        }

        let mut state = RunState::default();
        match request {
            MirrorRequest::Everything => self.mirror_everything(&mut state)?,
            MirrorRequest::AllVersions { cookbook } => {
                self.mirror_all_versions(&mut state, cookbook)?
            }
            MirrorRequest::Exact { cookbook, version } => {
                let metadata = self.source_cookbook(cookbook)?;
                self.transfer(&mut state, cookbook, &metadata, VersionRef::exact(version))?;
            }
            MirrorRequest::Latest { cookbook } => {
                let metadata = self.source_cookbook(cookbook)?;
                self.transfer(&mut state, cookbook, &metadata, VersionRef::Latest)?;
                if self.config.include_dependencies {
                    self.mirror_dependencies(&mut state, cookbook, &metadata)?;
                }
            }
        }

        debug!("Mirror run finished: {}", state.summary);
        Ok(state.summary)
    }

    fn mirror_everything(&self, state: &mut RunState) -> Result<()> {
        self.announce_throttle();
        let source = self.catalog(&self.config.source_site, SiteRole::Source)?;
        let target = self.catalog(&self.config.target_site, SiteRole::Target)?;

        // Diffing target against source: "added" is what the target lacks
        let diff = diff_catalogs(Some(&target), Some(&source));
        self.reporter.report(&MirrorEvent::MissingCookbooks {
            missing: diff.added.len(),
            total: source.len(),
        });
        if !diff.removed.is_empty() {
            self.reporter.report(&MirrorEvent::RemovedCookbooks {
                count: diff.removed.len(),
            });
        }
        for entry in &diff.invalid_dependency_changes {
            self.reporter.report(&MirrorEvent::DependencyDrift {
                entry: entry.clone(),
            });
        }

        let work = diff
            .added
            .packages()
            .map(|(cookbook, entry)| entry.sorted_versions().map(|versions| (cookbook, versions)))
            .collect::<Result<Vec<_>>>()?;

        for (cookbook, versions) in work {
            self.reporter.report(&MirrorEvent::CookbookStarted {
                cookbook: cookbook.to_string(),
                versions: versions.len(),
            });
            let metadata = self.source_cookbook(cookbook)?;
            for version in versions {
                self.transfer(state, cookbook, &metadata, VersionRef::exact(version))?;
                self.throttle();
            }
        }
        Ok(())
    }

    fn mirror_all_versions(&self, state: &mut RunState, cookbook: &str) -> Result<()> {
        self.announce_throttle();
        let source = self.cookbook(cookbook, &self.config.source_site, SiteRole::Source)?;
        let target = self.cookbook(cookbook, &self.config.target_site, SiteRole::Target)?;

        let remaining = delta(
            target.known_versions(),
            source.known_versions(),
            Depth::Limited(1),
            LeafRule::ARTIFACT,
        );
        let mut versions: Vec<&str> = remaining.keys().map(String::as_str).collect();
        sort_versions(&mut versions)?;

        self.reporter.report(&MirrorEvent::CookbookStarted {
            cookbook: cookbook.to_string(),
            versions: versions.len(),
        });
        for version in versions {
            self.transfer(state, cookbook, &source, VersionRef::exact(version))?;
            self.throttle();
        }
        Ok(())
    }

    /// Mirror the best match for each direct dependency of the latest version
    ///
    /// Only one level deep: dependencies of dependencies are not followed.
    fn mirror_dependencies(
        &self,
        state: &mut RunState,
        cookbook: &str,
        metadata: &CookbookMetadata,
    ) -> Result<()> {
        let Some(latest_url) = metadata.latest_version.as_deref() else {
            self.reporter.report(&MirrorEvent::Notice(format!(
                "No latest version of {} on the source; no dependencies to mirror.",
                cookbook
            )));
            return Ok(());
        };
        let detail = match self.client.get_json(latest_url) {
            Ok(value) => VersionDetail::from_value(value)?,
            Err(e) if e.is_not_found() => {
                debug!("Latest version record of {} disappeared: {}", cookbook, e);
                return Ok(());
            }
            Err(e) => return Err(self.metadata_error(cookbook, &self.config.source_site, e)),
        };

        self.reporter
            .report(&MirrorEvent::Notice("Mirroring dependencies as well...".to_string()));
        if detail.dependencies.is_empty() {
            return Ok(());
        }
        let universe = self.catalog(&self.config.source_site, SiteRole::Source)?;

        for (dependency, constraint) in &detail.dependencies {
            let unresolved = |reason: String| MirrorEvent::DependencyUnresolved {
                cookbook: dependency.clone(),
                constraint: constraint.clone(),
                reason,
            };

            let Some(entry) = universe.get(dependency) else {
                self.reporter
                    .report(&unresolved("not present in the source catalog".to_string()));
                continue;
            };
            let parsed = match VersionConstraint::parse(constraint) {
                Ok(parsed) => parsed,
                Err(e) => {
                    self.reporter.report(&unresolved(e.to_string()));
                    continue;
                }
            };

            let candidates = entry.sorted_versions()?;
            let Some(version) = select_latest_matching(&parsed, &candidates)?.map(str::to_string)
            else {
                self.reporter
                    .report(&unresolved("no version satisfies the constraint".to_string()));
                continue;
            };

            self.reporter.report(&MirrorEvent::DependencyResolved {
                cookbook: dependency.clone(),
                constraint: constraint.clone(),
                version: version.clone(),
            });
            let dependency_metadata = self.source_cookbook(dependency)?;
            self.transfer(state, dependency, &dependency_metadata, VersionRef::Exact(version))?;
            self.throttle();
        }
        Ok(())
    }

    fn transfer(
        &self,
        state: &mut RunState,
        cookbook: &str,
        metadata: &CookbookMetadata,
        version: VersionRef,
    ) -> Result<()> {
        if metadata.is_deprecated() && state.deprecation_shown.insert(cookbook.to_string()) {
            self.reporter.report(&MirrorEvent::Deprecated {
                cookbook: cookbook.to_string(),
                replacement: metadata.replacement_name().map(str::to_string),
            });
        }

        let executor = TransferExecutor::new(self.client, self.config, self.reporter);
        let outcome = executor.transfer(cookbook, metadata, &version)?;
        state.summary.record(&outcome);
        Ok(())
    }

    fn announce_throttle(&self) {
        if let Some(delay) = self.config.delay {
            self.reporter.report(&MirrorEvent::Throttle { delay });
        }
    }

    fn throttle(&self) {
        if let Some(delay) = self.config.delay {
            debug!("Sleeping {:?}", delay);
            thread::sleep(delay);
        }
    }

    fn catalog(&self, site: &str, role: SiteRole) -> Result<Catalog> {
        self.reporter.report(&MirrorEvent::FetchingIndex {
            site: site.to_string(),
            role,
        });
        let catalog = fetch_catalog(self.client, site)?;
        self.reporter.report(&MirrorEvent::Fetched {
            site: site.to_string(),
            role,
        });
        Ok(catalog)
    }

    fn cookbook(&self, cookbook: &str, site: &str, role: SiteRole) -> Result<CookbookMetadata> {
        self.reporter.report(&MirrorEvent::FetchingCookbook {
            cookbook: cookbook.to_string(),
            site: site.to_string(),
            role,
        });
        let metadata = fetch_cookbook(self.client, site, cookbook)?;
        self.reporter.report(&MirrorEvent::Fetched {
            site: site.to_string(),
            role,
        });
        Ok(metadata)
    }

    /// Source record without fetch notices
    fn source_cookbook(&self, cookbook: &str) -> Result<CookbookMetadata> {
        fetch_cookbook(self.client, &self.config.source_site, cookbook)
    }

    fn metadata_error(&self, cookbook: &str, site: &str, e: Error) -> Error {
        Error::MetadataFetch {
            cookbook: cookbook.to_string(),
            site: site.to_string(),
            message: e.to_string(),
        }
    }
}

/// Fetch a site's catalog
///
/// Any failure, 404 included, is fatal: without a catalog there is no run.
pub fn fetch_catalog(client: &dyn SiteClient, site: &str) -> Result<Catalog> {
    let value = client
        .get_json(&endpoints::universe_url(site))
        .map_err(|e| Error::MetadataFetch {
            cookbook: "universe".to_string(),
            site: site.to_string(),
            message: e.to_string(),
        })?;
    Catalog::from_value(value)
}

/// Fetch a cookbook record as raw JSON, `None` when the site answers 404
pub fn fetch_cookbook_record(
    client: &dyn SiteClient,
    site: &str,
    cookbook: &str,
) -> Result<Option<Value>> {
    match client.get_json(&endpoints::cookbook_url(site, cookbook)) {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => {
            debug!("{} is unknown to {}", cookbook, site);
            Ok(None)
        }
        Err(e) => Err(Error::MetadataFetch {
            cookbook: cookbook.to_string(),
            site: site.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Fetch a cookbook record
///
/// A cookbook the site does not know yields an empty record: no versions,
/// no latest pointer, not deprecated.
pub fn fetch_cookbook(
    client: &dyn SiteClient,
    site: &str,
    cookbook: &str,
) -> Result<CookbookMetadata> {
    match fetch_cookbook_record(client, site, cookbook)? {
        Some(value) => CookbookMetadata::from_value(value),
        None => Ok(CookbookMetadata::default()),
    }
}

/// Compare the catalogs of two sites
///
/// `added` holds what the target lacks, `removed` what only the target has.
pub fn compare_catalogs(
    client: &dyn SiteClient,
    source_site: &str,
    target_site: &str,
) -> Result<CatalogDiff> {
    let source = fetch_catalog(client, source_site)?;
    let target = fetch_catalog(client, target_site)?;
    Ok(diff_catalogs(Some(&target), Some(&source)))
}

/// Structurally compare one cookbook's records on two sites
///
/// Recurses through the whole record; a site without the cookbook
/// contributes an empty tree.
pub fn compare_cookbook(
    client: &dyn SiteClient,
    source_site: &str,
    target_site: &str,
    cookbook: &str,
) -> Result<TreeDiff> {
    let source = fetch_cookbook_record(client, source_site, cookbook)?;
    let target = fetch_cookbook_record(client, target_site, cookbook)?;
    Ok(diff_trees(
        target.as_ref(),
        source.as_ref(),
        Depth::Unlimited,
        LeafRule::ARTIFACT,
    ))
}
