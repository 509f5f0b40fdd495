//! Whether to update, and to what.
//!
//! Versions are opaque strings compared for exact equality. There is no ordering:
//! a manifest advertising `1.0` while `2.0` is running counts as available, which
//! is what lets a server roll clients back by republishing an older build.

/// Running version that disables updating entirely (local and CI builds).
pub const DEV_VERSION: &str = "dev";

/// False iff `current_version` is [`DEV_VERSION`].
#[must_use]
pub fn wants_update(current_version: &str) -> bool {
    current_version != DEV_VERSION
}

/// The advertised version if it differs from the running one.
#[must_use]
pub fn available_version<'a>(current_version: &str, advertised: &'a str) -> Option<&'a str> {
    (advertised != current_version).then_some(advertised)
}
