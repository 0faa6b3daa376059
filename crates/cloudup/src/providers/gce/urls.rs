//! Compute resource URLs.
//!
//! The API returns cross-resource references as full URLs. Tasks store only
//! the referenced name, recovered with [`last_component`].

use url::Url;

/// Prefix of fully qualified compute resource URLs.
pub const COMPUTE_URL_PREFIX: &str = "https://www.googleapis.com/compute/v1";

/// Last non-empty path segment of a URL or partial resource path.
///
/// ```
/// use cto_cloudup::providers::gce::urls::last_component;
///
/// assert_eq!(
///     last_component("https://www.googleapis.com/compute/v1/projects/p/regions/r/targetPools/api"),
///     "api"
/// );
/// assert_eq!(last_component("global/networks/default"), "default");
/// assert_eq!(last_component("default"), "default");
/// ```
#[must_use]
pub fn last_component(s: &str) -> String {
    if let Ok(url) = Url::parse(s) {
        if let Some(segment) = url
            .path_segments()
            .and_then(|mut segments| segments.rfind(|p| !p.is_empty()))
        {
            return segment.to_string();
        }
    }
    s.rsplit('/')
        .find(|p| !p.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// `…/projects/{project}/regions/{region}/{kind}/{name}`
#[must_use]
pub fn regional_url(project: &str, region: &str, kind: &str, name: &str) -> String {
    format!("{COMPUTE_URL_PREFIX}/projects/{project}/regions/{region}/{kind}/{name}")
}

/// `…/projects/{project}/global/{kind}/{name}`
#[must_use]
pub fn global_url(project: &str, kind: &str, name: &str) -> String {
    format!("{COMPUTE_URL_PREFIX}/projects/{project}/global/{kind}/{name}")
}
