//! Version manifests and the URLs they live at.
//!
//! A manifest is a tiny JSON document, `{"Version": "1.2.0"}`, published per
//! application and platform at `{base}/{app}/{platform}.json`. Artifacts live beside it
//! at `{base}/{app}/{version}/{platform}.zst`. Every path segment is percent-encoded.

use crate::core::{Result, SelfswapError};
use crate::fetch::Fetcher;
use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Latest version advertised for one application on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionManifest {
    /// Advertised version string, compared verbatim against the running version
    #[serde(rename = "Version", alias = "version")]
    pub version: String,
}

impl VersionManifest {
    /// Manifest advertising `version`.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    /// Parse manifest JSON.
    ///
    /// # Errors
    ///
    /// [`SelfswapError::Decode`] when the JSON is malformed or has no `Version`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| SelfswapError::decode("manifest", e))
    }

    /// Render as pretty JSON, the format the packager publishes.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SelfswapError::decode("manifest", e))
    }
}

/// Join `base` and already-encoded `segments` with exactly one `/` between each.
pub(crate) fn join_url(base: &str, segments: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        url.push_str(segment);
    }
    url
}

/// `{base}/{app}/{platform}.json`
pub fn manifest_url(base_url: &str, app_id: &str, platform: &Platform) -> String {
    let app = urlencoding::encode(app_id);
    let file = format!("{}.json", urlencoding::encode(&platform.id()));
    join_url(base_url, &[app.as_ref(), file.as_str()])
}

/// Fetch and decode the manifest for `app_id` on `platform`.
///
/// # Errors
///
/// [`SelfswapError::Fetch`] / [`SelfswapError::HttpStatus`] from the fetcher, or
/// [`SelfswapError::Decode`] for an invalid body.
pub fn resolve_manifest(
    fetcher: &dyn Fetcher,
    base_url: &str,
    app_id: &str,
    platform: &Platform,
) -> Result<VersionManifest> {
    let url = manifest_url(base_url, app_id, platform);
    debug!("Resolving manifest from {}", url);

    let mut body = fetcher.fetch(&url)?;
    let mut bytes = Vec::new();
    std::io::Read::read_to_end(&mut body, &mut bytes).map_err(|e| SelfswapError::Fetch {
        url: url.clone(),
        reason: e.to_string(),
    })?;

    let manifest = VersionManifest::from_slice(&bytes)?;
    debug!("Manifest at {} advertises version {}", url, manifest.version);
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryFetcher;

    #[test]
    fn test_manifest_url() {
        let platform = Platform::new("linux", "amd64");
        assert_eq!(
            manifest_url("https://updates.example.com/", "myapp", &platform),
            "https://updates.example.com/myapp/linux-amd64.json"
        );
        assert_eq!(
            manifest_url("https://updates.example.com", "myapp", &platform),
            "https://updates.example.com/myapp/linux-amd64.json"
        );
    }

    #[test]
    fn test_manifest_url_encodes_segments() {
        let platform = Platform::new("linux", "amd64");
        assert_eq!(
            manifest_url("http://h", "my app/x", &platform),
            "http://h/my%20app%2Fx/linux-amd64.json"
        );
    }

    #[test]
    fn test_manifest_json_shape() {
        let manifest = VersionManifest::from_slice(br#"{"Version":"1.2.0"}"#).unwrap();
        assert_eq!(manifest.version, "1.2.0");

        let json = manifest.to_json_pretty().unwrap();
        assert!(json.contains("\"Version\": \"1.2.0\""));

        // Unknown fields are tolerated
        let manifest =
            VersionManifest::from_slice(br#"{"Version":"2.0","Sha256":"abc"}"#).unwrap();
        assert_eq!(manifest.version, "2.0");

        let manifest = VersionManifest::from_slice(br#"{"version":"2.1"}"#).unwrap();
        assert_eq!(manifest.version, "2.1");
    }

    #[test]
    fn test_manifest_decode_errors() {
        for body in [&b"not json"[..], &br#"{}"#[..], &br#"{"Version":3}"#[..]] {
            let err = VersionManifest::from_slice(body).unwrap_err();
            assert!(matches!(err, SelfswapError::Decode { .. }), "body {body:?}");
        }
    }

    #[test]
    fn test_resolve_manifest() {
        let fetcher = MemoryFetcher::new()
            .with_body("http://u/myapp/linux-amd64.json", br#"{"Version":"1.2.0"}"#.to_vec());

        let manifest =
            resolve_manifest(&fetcher, "http://u", "myapp", &Platform::new("linux", "amd64"))
                .unwrap();
        assert_eq!(manifest, VersionManifest::new("1.2.0"));
        assert_eq!(fetcher.requests(), vec!["http://u/myapp/linux-amd64.json".to_string()]);
    }

    #[test]
    fn test_resolve_manifest_missing_is_status_error() {
        let fetcher = MemoryFetcher::new();
        let err = resolve_manifest(&fetcher, "http://u", "myapp", &Platform::new("linux", "amd64"))
            .unwrap_err();
        assert!(matches!(err, SelfswapError::HttpStatus { status: 404, .. }));
    }
}
