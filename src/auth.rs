//! Platform credentials
//!
//! The upload platform wants a bearer token on every request. The token file
//! is produced out-of-band by a one-time interactive consent flow; this module
//! only loads it and builds an HTTP client that attaches it. A missing or
//! unreadable token file aborts the run before any item is touched.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use crate::error::{Error, Result};

/// Token material loaded from the token file
///
/// The file usually carries the whole consent-flow state (refresh token,
/// client id, expiry); only the access token and its expiry matter here and
/// unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredToken {
    /// Bearer token attached to outbound platform requests
    pub access_token: String,

    /// When the consent flow said the token stops working, if recorded
    #[serde(default)]
    pub token_expiry: Option<DateTime<Utc>>,
}

/// Load the bearer token from a JSON token file
///
/// An expired token is loaded anyway, with a warning: the platform is the
/// authority on token validity, and a stale expiry field must not block an
/// otherwise working run.
///
/// # Errors
/// Returns [`Error::Credentials`] naming the path if the file is missing,
/// unreadable, not valid JSON, or carries an empty token.
pub async fn load_token(path: &Path) -> Result<StoredToken> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        Error::Credentials(format!("cannot read token file {}: {}", path.display(), e))
    })?;

    let token: StoredToken = serde_json::from_str(&content)
        .map_err(|e| Error::Credentials(format!("invalid token file {}: {}", path.display(), e)))?;

    if token.access_token.is_empty() {
        return Err(Error::Credentials(format!(
            "empty access token in {}",
            path.display()
        )));
    }

    if let Some(expiry) = token.token_expiry
        && expiry < Utc::now()
    {
        warn!(
            expiry = %expiry,
            path = %path.display(),
            "Stored token looks expired, the platform may reject the upload"
        );
    }

    Ok(token)
}

/// Build an HTTP client that sends `Authorization: Bearer …` on every request
///
/// # Errors
/// Returns error if the token is not a valid header value or the client
/// cannot be created
pub fn authorized_client(token: &StoredToken) -> Result<reqwest::Client> {
    let mut auth_value =
        reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.access_token)).map_err(
            |e| Error::Credentials(format!("access token is not a valid header value: {}", e)),
        )?;
    // Keep the token out of debug output
    auth_value.set_sensitive(true);

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(reqwest::header::AUTHORIZATION, auth_value);

    // Connect timeout only; a chunk upload can legitimately take minutes.
    // Redirects stay visible to the caller: the resumable protocol answers
    // chunks with 308, which must reach the session loop, not the client.
    let client = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::none())
        .user_agent("pod2tube uploader")
        .build()
        .map_err(Error::Network)?;

    Ok(client)
}
