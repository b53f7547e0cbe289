//! Browser login for the installed-app flow.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use google_gmail1::yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use tokio::process::Command;

use crate::notifier::Notifier;

/// Opens the consent page in a browser and tells the user about it.
///
/// The redirect back to the local listener is handled by yup-oauth2.
pub struct LoginDelegate {
    notifier: Arc<dyn Notifier>,
    preferred_browsers: Vec<PathBuf>,
    system_browser: bool,
}

impl LoginDelegate {
    pub fn new(notifier: Arc<dyn Notifier>, preferred_browsers: Vec<PathBuf>) -> Self {
        Self {
            notifier,
            preferred_browsers,
            system_browser: true,
        }
    }

    /// Never fall back to the platform's default browser
    #[cfg(test)]
    fn without_system_browser(mut self) -> Self {
        self.system_browser = false;
        self
    }

    /// Try each preferred browser binary that exists, then the system default.
    /// Returns whether a browser was launched.
    fn open_browser(&self, url: &str) -> bool {
        match self.preferred_browsers.iter().find(|path| path.exists()) {
            // The runtime reaps the dropped child once it exits
            Some(browser) => match Command::new(browser).arg(url).spawn() {
                Ok(_) => {
                    tracing::info!("Opened login page in {}", browser.display());
                    return true;
                }
                Err(e) => tracing::warn!("Failed to launch {}: {}", browser.display(), e),
            },
            None => tracing::warn!("Preferred browser not found. Falling back to system default browser."),
        }

        if !self.system_browser {
            tracing::error!("Could not open a browser. Open this URL to log in: {}", url);
            return false;
        }

        let launched = if cfg!(target_os = "windows") {
            Command::new("rundll32")
                .arg("url.dll,FileProtocolHandler")
                .arg(url)
                .spawn()
        } else if cfg!(target_os = "macos") {
            Command::new("open").arg(url).spawn()
        } else {
            Command::new("xdg-open").arg(url).spawn()
        };

        match launched {
            Ok(_) => {
                tracing::info!("Opened login page in the default browser");
                true
            }
            Err(e) => {
                tracing::error!("Could not open a browser ({}). Open this URL to log in: {}", e, url);
                false
            }
        }
    }
}

impl InstalledFlowDelegate for LoginDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            if need_code {
                return Err("browser login needs the HTTP redirect flow".to_string());
            }

            tracing::info!("No valid token found. Starting interactive login...");
            self.open_browser(url);
            self.notifier.notify(
                "🔐 Gmail Login Required",
                "Check your browser to complete login",
                10,
            );

            // The code arrives through the redirect listener, not from here
            Ok(String::new())
        })
    }
}
