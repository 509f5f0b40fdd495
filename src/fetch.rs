//! Fetch capability: "give me the bytes at this URL".
//!
//! The updater never talks to the network directly. It calls a [`Fetcher`], which makes
//! the transport swappable: tests use an in-memory map, embedders can route through
//! their own client, and [`HttpFetcher`] covers the common case.
//!
//! # Contract
//!
//! - A non-success HTTP status is an error ([`SelfswapError::HttpStatus`]), never a body.
//! - An `Ok` always carries a readable body.
//! - No retries. Timeouts belong to the implementation.
//!
//! # TLS
//!
//! [`HttpFetcher`] verifies server certificates. Verification can be turned off with
//! [`HttpFetcher::accept_invalid_certs`], for update servers on private networks with
//! self-signed certificates. Doing so lets anyone on the network path substitute the
//! binary, so it is logged at `warn` level every time a client is built with it.

use crate::core::{Result, SelfswapError};
use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

/// A response body being streamed from a [`Fetcher`].
pub type FetchBody = Box<dyn Read + Send>;

/// Retrieve the bytes behind a URL.
pub trait Fetcher: Send + Sync {
    /// Start fetching `url`, returning its body as a stream.
    ///
    /// # Errors
    ///
    /// [`SelfswapError::Fetch`] on transport failure, [`SelfswapError::HttpStatus`]
    /// when the server does not answer with a success status.
    fn fetch(&self, url: &str) -> Result<FetchBody>;
}

impl<F: Fetcher + ?Sized> Fetcher for std::sync::Arc<F> {
    fn fetch(&self, url: &str) -> Result<FetchBody> {
        (**self).fetch(url)
    }
}

/// Default request timeout for [`HttpFetcher`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// [`Fetcher`] backed by a blocking `reqwest` client.
///
/// The client is built on first use so an `HttpFetcher` can be constructed anywhere,
/// including inside an async runtime, as long as fetching happens on a blocking thread.
pub struct HttpFetcher {
    timeout: Duration,
    accept_invalid_certs: bool,
    client: OnceLock<reqwest::blocking::Client>,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
            client: OnceLock::new(),
        }
    }
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout and certificate verification on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overall deadline for each request, body included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip TLS certificate verification.
    ///
    /// Only for update servers with self-signed certificates on trusted networks.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    fn client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        if self.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for update downloads");
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .user_agent(concat!("selfswap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SelfswapError::Fetch {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(self.client.get_or_init(|| client))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchBody> {
        debug!("GET {}", url);

        let response = self.client()?.get(url).send().map_err(|e| SelfswapError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SelfswapError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(Box::new(response))
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("timeout", &self.timeout)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}
