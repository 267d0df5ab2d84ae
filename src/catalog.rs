// src/catalog.rs

//! Supermarket catalog ("universe") and cookbook metadata records
//!
//! The universe endpoint returns JSON shaped like:
//!
//! ```json
//! {
//!   "apache2": {
//!     "1.0.0": {
//!       "dependencies": { "iptables": ">= 0.0.0" },
//!       "download_url": "https://.../apache2/versions/1.0.0/download",
//!       "location_path": "https://.../api/v1",
//!       "location_type": "opscode"
//!     }
//!   }
//! }
//! ```
//!
//! A [`Catalog`] keeps that tree as JSON so the diff engine can walk it
//! generically, and hands out typed views for the attributes we act on.

use crate::error::{Error, Result};
use crate::version::sort_versions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Attribute holding a version's dependency constraints
pub const DEPENDENCIES: &str = "dependencies";
/// Attribute holding a version's artifact URL in the catalog
pub const DOWNLOAD_URL: &str = "download_url";
/// Attribute naming where the version record lives
pub const LOCATION_PATH: &str = "location_path";
/// Attribute naming the kind of index holding the version
pub const LOCATION_TYPE: &str = "location_type";

/// Snapshot of every cookbook and version one site knows about
///
/// Keys iterate in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    root: Map<String, Value>,
}

impl Catalog {
    /// An empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a universe response
    ///
    /// Every cookbook must map to an object of versions, and every version
    /// to an object of attributes.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(root) = value else {
            return Err(Error::ParseError(
                "catalog must be a JSON object of cookbooks".to_string(),
            ));
        };

        for (cookbook, versions) in &root {
            let Value::Object(versions) = versions else {
                return Err(Error::ParseError(format!(
                    "catalog entry for {} is not an object of versions",
                    cookbook
                )));
            };
            if let Some((version, _)) = versions.iter().find(|(_, meta)| !meta.is_object()) {
                return Err(Error::ParseError(format!(
                    "catalog metadata for {} {} is not an object",
                    cookbook, version
                )));
            }
        }

        Ok(Self { root })
    }

    /// Wrap a tree already known to have catalog shape
    pub(crate) fn from_map_unchecked(root: Map<String, Value>) -> Self {
        Self { root }
    }

    /// The underlying JSON tree
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Number of cookbooks
    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Look up one cookbook's versions
    pub fn get(&self, cookbook: &str) -> Option<PackageEntry<'_>> {
        self.root
            .get(cookbook)
            .and_then(Value::as_object)
            .map(|versions| PackageEntry { versions })
    }

    /// Cookbooks in lexicographic order
    pub fn packages(&self) -> impl Iterator<Item = (&str, PackageEntry<'_>)> {
        self.root.iter().filter_map(|(name, versions)| {
            versions
                .as_object()
                .map(|versions| (name.as_str(), PackageEntry { versions }))
        })
    }

    /// Total number of (cookbook, version) pairs
    pub fn version_count(&self) -> usize {
        self.packages().map(|(_, entry)| entry.len()).sum()
    }
}

/// Versions of one cookbook inside a [`Catalog`]
#[derive(Debug, Clone, Copy)]
pub struct PackageEntry<'a> {
    versions: &'a Map<String, Value>,
}

impl<'a> PackageEntry<'a> {
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn get(&self, version: &str) -> Option<VersionMetadata<'a>> {
        self.versions
            .get(version)
            .and_then(Value::as_object)
            .map(|attributes| VersionMetadata { attributes })
    }

    /// Version strings in map order
    pub fn versions(self) -> impl Iterator<Item = &'a str> {
        self.versions.keys().map(String::as_str)
    }

    /// Version strings in ascending numeric order
    pub fn sorted_versions(&self) -> Result<Vec<&'a str>> {
        let mut versions: Vec<&str> = self.versions().collect();
        sort_versions(&mut versions)?;
        Ok(versions)
    }
}

/// Attributes of one version inside a [`Catalog`]
#[derive(Debug, Clone, Copy)]
pub struct VersionMetadata<'a> {
    attributes: &'a Map<String, Value>,
}

impl<'a> VersionMetadata<'a> {
    /// Raw attribute lookup
    pub fn attribute(&self, name: &str) -> Option<&'a Value> {
        self.attributes.get(name)
    }

    /// The raw `dependencies` value, compared structurally by the diff engine
    pub fn dependencies_value(&self) -> Option<&'a Value> {
        self.attribute(DEPENDENCIES)
    }

    pub fn download_url(&self) -> Option<&'a str> {
        self.attribute(DOWNLOAD_URL).and_then(Value::as_str)
    }

    pub fn location_path(&self) -> Option<&'a str> {
        self.attribute(LOCATION_PATH).and_then(Value::as_str)
    }

    pub fn location_type(&self) -> Option<&'a str> {
        self.attribute(LOCATION_TYPE).and_then(Value::as_str)
    }
}

/// Single-cookbook record from `/api/v1/cookbooks/<name>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookbookMetadata {
    #[serde(default)]
    pub name: Option<String>,
    /// URL of the newest version's record
    #[serde(default)]
    pub latest_version: Option<String>,
    #[serde(default)]
    pub deprecated: Option<bool>,
    /// URL of the cookbook replacing this one, when deprecated
    #[serde(default)]
    pub replacement: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub metrics: CookbookMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookbookMetrics {
    #[serde(default)]
    pub downloads: DownloadMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadMetrics {
    /// Download count per version; the keys are the versions that exist
    #[serde(default)]
    pub versions: Map<String, Value>,
}

impl CookbookMetadata {
    /// Parse a cookbook record
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::ParseError(format!("Invalid cookbook metadata: {e}")))
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated == Some(true)
    }

    /// Name of the replacement cookbook (last segment of its URL)
    pub fn replacement_name(&self) -> Option<&str> {
        self.replacement
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .and_then(|url| url.rsplit('/').next())
            .filter(|name| !name.is_empty())
    }

    /// Versions known to this site, keyed by version string
    pub fn known_versions(&self) -> &Map<String, Value> {
        &self.metrics.downloads.versions
    }
}

/// Single-version record from `/api/v1/cookbooks/<name>/versions/<version>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionDetail {
    /// Empty when the record omits it
    #[serde(default)]
    pub version: String,
    /// Artifact URL
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl VersionDetail {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::ParseError(format!("Invalid cookbook version metadata: {e}")))
    }

    /// Where to download the artifact from
    pub fn artifact_url(&self) -> Option<&str> {
        self.file.as_deref().or(self.download_url.as_deref())
    }
}
