//! OAuth credential management.
//!
//! Built on yup-oauth2's installed flow: the token cache is reused while it
//! holds a usable token, refreshed when it has expired, and replaced through
//! a browser login (see [`LoginDelegate`]) otherwise.

mod login;

use std::path::{Path, PathBuf};
use std::time::Duration;

use google_gmail1::yup_oauth2::authenticator::DefaultAuthenticator;
use google_gmail1::yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use google_gmail1::yup_oauth2::storage::{TokenInfo, TokenStorage};
use google_gmail1::yup_oauth2::{self, InstalledFlowAuthenticator, InstalledFlowReturnMethod};
use serde::Deserialize;

use crate::config::WatcherPaths;
use crate::error::AuthError;
use crate::gmail_client::GmailClient;

pub use login::LoginDelegate;

/// Read-only Gmail scope requested during login
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Where the authenticator keeps its tokens
enum TokenStore {
    Disk(PathBuf),
    #[cfg_attr(not(test), allow(dead_code))]
    Custom(Box<dyn TokenStorage>),
}

/// Entry of the on-disk token cache, as written by yup-oauth2
#[derive(Deserialize)]
struct CachedToken {
    scopes: Vec<String>,
    token: TokenInfo,
}

/// Owns the token cache and the login delegate, and hands out an
/// authenticator holding a usable token
pub struct CredentialManager {
    client_secret_path: PathBuf,
    store: TokenStore,
    delegate: Box<dyn InstalledFlowDelegate>,
    login_timeout: Duration,
}

impl CredentialManager {
    pub fn new<D>(paths: &WatcherPaths, delegate: D, login_timeout: Duration) -> Self
    where
        D: InstalledFlowDelegate + 'static,
    {
        Self {
            client_secret_path: paths.client_secret.clone(),
            store: TokenStore::Disk(paths.token_cache.clone()),
            delegate: Box::new(delegate),
            login_timeout,
        }
    }

    /// Keep tokens in `storage` instead of the cache file
    #[cfg(test)]
    fn with_storage(mut self, storage: Box<dyn TokenStorage>) -> Self {
        self.store = TokenStore::Custom(storage);
        self
    }

    /// Produce a Gmail client backed by a valid credential
    pub async fn authenticate(self) -> Result<GmailClient, AuthError> {
        let auth = self.authenticator().await?;
        GmailClient::new(auth)
    }

    /// Build the authenticator and make sure it holds a token for the Gmail
    /// scope, running the browser login if the cache cannot provide one
    pub async fn authenticator(self) -> Result<DefaultAuthenticator, AuthError> {
        tracing::info!("Checking for client secret at: {}", self.client_secret_path.display());
        let secret = yup_oauth2::read_application_secret(&self.client_secret_path)
            .await
            .map_err(|source| AuthError::ClientSecret {
                path: self.client_secret_path.clone(),
                source,
            })?;

        let builder = InstalledFlowAuthenticator::builder(
            secret,
            InstalledFlowReturnMethod::HTTPRedirect,
        )
        .flow_delegate(self.delegate);

        let token_path = match &self.store {
            TokenStore::Disk(path) => Some(path.clone()),
            TokenStore::Custom(_) => None,
        };
        let builder = match self.store {
            TokenStore::Disk(path) => {
                tracing::info!("Checking for token cache at: {}", path.display());
                discard_unreadable_cache(&path).await?;
                builder.persist_tokens_to_disk(path)
            }
            TokenStore::Custom(storage) => builder.with_storage(storage),
        };

        let auth = builder.build().await.map_err(AuthError::Authenticator)?;

        let token = tokio::time::timeout(self.login_timeout, auth.token(&[GMAIL_READONLY_SCOPE]))
            .await
            .map_err(|_| AuthError::Timeout(self.login_timeout.as_secs()))??;
        if token.token().is_none() {
            return Err(AuthError::MissingAccessToken);
        }

        if let Some(path) = token_path {
            restrict_permissions(&path).await?;
            tracing::info!("Token cache ready at {}", path.display());
        }

        Ok(auth)
    }
}

/// Remove a cache file yup-oauth2 would refuse to load, so the user is sent
/// through login instead of failing at startup
async fn discard_unreadable_cache(path: &Path) -> Result<(), AuthError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(AuthError::TokenCache {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    match serde_json::from_slice::<Vec<CachedToken>>(&raw) {
        Ok(entries) => {
            for entry in &entries {
                tracing::debug!(
                    "Cached token for {:?} (refreshable: {})",
                    entry.scopes,
                    entry.token.refresh_token.is_some()
                );
            }
            Ok(())
        }
        Err(e) => {
            tracing::warn!("Ignoring unreadable token cache: {}", e);
            tokio::fs::remove_file(path)
                .await
                .map_err(|source| AuthError::TokenCache {
                    path: path.to_path_buf(),
                    source,
                })
        }
    }
}

/// The cache holds a refresh token, so only the owner may read it
#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), AuthError> {
    use std::os::unix::fs::PermissionsExt;

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(());
    }
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|source| AuthError::TokenCache {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), AuthError> {
    Ok(())
}
