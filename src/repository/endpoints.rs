// src/repository/endpoints.rs

//! Supermarket API URLs
//!
//! Site arguments may carry a trailing `/`; it is dropped before joining.

/// Path prefix of the cookbook API
const COOKBOOKS_API: &str = "api/v1/cookbooks";

fn base(site: &str) -> &str {
    site.trim_end_matches('/')
}

/// Catalog of every cookbook and version on a site
pub fn universe_url(site: &str) -> String {
    format!("{}/universe", base(site))
}

/// Collection endpoint; uploads are POSTed here
pub fn cookbooks_url(site: &str) -> String {
    format!("{}/{}", base(site), COOKBOOKS_API)
}

/// Single-cookbook record
pub fn cookbook_url(site: &str, cookbook: &str) -> String {
    format!("{}/{}", cookbooks_url(site), cookbook)
}

/// Single-version record
///
/// Supermarket addresses versions with underscores in place of dots.
pub fn version_url(site: &str, cookbook: &str, version: &str) -> String {
    format!(
        "{}/versions/{}",
        cookbook_url(site, cookbook),
        version.replace('.', "_")
    )
}
