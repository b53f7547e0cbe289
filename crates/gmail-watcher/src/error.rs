//! Error types for the watcher.
//!
//! Only [`AuthError`] is allowed to stop the process. Failures inside a poll
//! iteration travel as `anyhow::Error` and are logged by the loop, and
//! [`NotifyError`] never leaves the notifier.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while obtaining or refreshing the OAuth credential
#[derive(Debug, Error)]
pub enum AuthError {
    /// The bundled client secret could not be read or parsed
    #[error("Failed to read client secret {path}: {source}")]
    ClientSecret {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing the token cache failed
    #[error("Token cache error at {path}: {source}")]
    TokenCache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The authenticator could not be set up
    #[error("Failed to build authenticator: {0}")]
    Authenticator(#[source] std::io::Error),

    /// The user did not finish the browser login in time
    #[error("Timed out after {0}s waiting for the browser login")]
    Timeout(u64),

    /// Refreshing or obtaining a token failed
    #[error("Token request failed: {0}")]
    Token(#[from] google_gmail1::yup_oauth2::Error),

    /// The token endpoint answered without an access token
    #[error("No access token in token response")]
    MissingAccessToken,

    /// Building the Gmail API client failed
    #[error("Failed to build Gmail client: {0}")]
    Client(String),
}

/// Failure raised by the platform notification backend
#[derive(Debug, Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(#[from] pub notify_rust::error::Error);
