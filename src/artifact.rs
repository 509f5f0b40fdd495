//! Binary fetcher: download an artifact and decode it into an executable image.

use crate::core::Result;
use crate::decode::decode_artifact;
use crate::fetch::Fetcher;
use crate::manifest::join_url;
use crate::platform::Platform;
use tracing::{debug, info};

/// `{base}/{app}/{version}/{platform}.zst`
pub fn artifact_url(base_url: &str, app_id: &str, version: &str, platform: &Platform) -> String {
    let app = urlencoding::encode(app_id);
    let version = urlencoding::encode(version);
    let file = format!("{}.zst", urlencoding::encode(&platform.id()));
    join_url(base_url, &[app.as_ref(), version.as_ref(), file.as_str()])
}

/// Fetch the artifact for `version` and return the decompressed executable image.
///
/// The whole image is held in memory; nothing touches the disk here.
///
/// # Errors
///
/// [`SelfswapError::Fetch`](crate::core::SelfswapError::Fetch) /
/// [`SelfswapError::HttpStatus`](crate::core::SelfswapError::HttpStatus) from the
/// fetcher, [`SelfswapError::Decode`](crate::core::SelfswapError::Decode) for a corrupt
/// stream.
pub fn fetch_binary(
    fetcher: &dyn Fetcher,
    base_url: &str,
    app_id: &str,
    version: &str,
    platform: &Platform,
) -> Result<Vec<u8>> {
    let url = artifact_url(base_url, app_id, version, platform);
    debug!("Fetching artifact from {}", url);

    let body = fetcher.fetch(&url)?;
    let image = decode_artifact(body)?;

    info!("Downloaded {} ({} bytes decompressed)", url, image.len());
    Ok(image)
}
