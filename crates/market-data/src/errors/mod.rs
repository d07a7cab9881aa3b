//! Error types and client/provider classification for the market data crate.
//!
//! This module provides:
//! - [`FetchError`]: The error enum returned by every bar fetcher
//! - [`FetchErrorKind`]: Structural tag telling who is at fault

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who a failed retrieval is attributable to.
///
/// The tag is produced by the fetcher that observed the failure and travels
/// with the error; it is never recovered from message text.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum FetchErrorKind {
    /// Caller-attributable: bad symbol, exchange or interval (4xx-equivalent).
    Client,
    /// The external source failed, timed out or returned unexpected data (5xx-equivalent).
    Provider,
}

/// Errors that can occur while fetching bars from an external source.
///
/// Each variant is classified into a [`FetchErrorKind`] via [`kind`](Self::kind)
/// and into an HTTP-like code via [`status_code`](Self::status_code).
#[derive(Error, Debug)]
pub enum FetchError {
    /// The source does not know the requested symbol.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The request was rejected as malformed by the source.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The interval is unknown or not served by the source.
    #[error("Unsupported interval: {0}")]
    UnsupportedInterval(String),

    /// The source rate limited the request (HTTP 429 or an in-body notice).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the source timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The source rejected our credentials.
    #[error("Unauthorized: {provider} - {message}")]
    Unauthorized {
        /// The provider that rejected the key
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// A provider-specific error occurred.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The source answered with a body we could not interpret.
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        /// The provider that sent the body
        provider: String,
        /// What was wrong with it
        message: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl FetchError {
    /// Returns who the failure is attributable to.
    ///
    /// # Examples
    ///
    /// ```
    /// use stockproxy_market_data::errors::{FetchError, FetchErrorKind};
    ///
    /// let error = FetchError::SymbolNotFound("ZZZZ".to_string());
    /// assert_eq!(error.kind(), FetchErrorKind::Client);
    ///
    /// let error = FetchError::Timeout { provider: "MARKETSTACK".to_string() };
    /// assert_eq!(error.kind(), FetchErrorKind::Provider);
    /// ```
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::SymbolNotFound(_) | Self::InvalidRequest(_) | Self::UnsupportedInterval(_) => {
                FetchErrorKind::Client
            }

            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::Unauthorized { .. }
            | Self::ProviderError { .. }
            | Self::InvalidResponse { .. }
            | Self::Network(_) => FetchErrorKind::Provider,
        }
    }

    /// HTTP-like status code recorded in the job ledger for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::SymbolNotFound(_) => 404,
            Self::InvalidRequest(_) | Self::UnsupportedInterval(_) => 400,
            Self::RateLimited { .. } => 503,
            Self::Timeout { .. } => 504,
            Self::Unauthorized { .. }
            | Self::ProviderError { .. }
            | Self::InvalidResponse { .. }
            | Self::Network(_) => 502,
        }
    }

    pub(crate) fn provider(provider: &str, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_response(provider: &str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}
