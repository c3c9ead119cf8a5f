//! Transport for remote archives.
//!
//! Fetching only returns bytes. Integrity is checked by the installer
//! afterwards, so a failed or corrupted download can simply be retried.

use crate::error::{Error, Result};

/// Something that can turn a URL into archive bytes.
pub trait Fetcher {
    /// Download the full body at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] when the transfer fails or the server
    /// answers with a non-success status.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP(S) fetcher.
#[cfg(feature = "network")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "network")]
impl HttpFetcher {
    /// Build a client identifying itself as [`crate::USER_AGENT`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| Error::Fetch {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[cfg(feature = "network")]
impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let fetch_err = |e: reqwest::Error| Error::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };

        tracing::info!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(fetch_err)?;
        let bytes = response.bytes().map_err(fetch_err)?;
        tracing::debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

/// Fetcher that refuses every request. Used when networking is compiled out
/// or deliberately disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl Fetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        Err(Error::Fetch {
            url: url.to_string(),
            message: "network access is disabled".to_string(),
        })
    }
}

impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch(url)
    }
}

/// The fetcher installs use by default: HTTP when the `network` feature is
/// enabled, otherwise [`OfflineFetcher`].
///
/// # Errors
///
/// Propagates [`HttpFetcher::new`] failures.
pub fn default_fetcher() -> Result<Box<dyn Fetcher>> {
    #[cfg(feature = "network")]
    {
        Ok(Box::new(HttpFetcher::new()?))
    }
    #[cfg(not(feature = "network"))]
    {
        Ok(Box::new(OfflineFetcher))
    }
}
