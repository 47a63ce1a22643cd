//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Create an HTTP client with the standard codeqa configuration.
///
/// Config: 30s connect timeout, 120s request timeout, rustls TLS,
/// `codeqa/{version}` user-agent, redirect limit 10.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn default_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(120))
        .user_agent(concat!("codeqa/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}
