use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable holding the comma-separated sender allow-list
pub const TARGET_SENDERS_VAR: &str = "TARGET_SENDERS";

/// Overrides the directory holding `.env`, credentials, token cache and log
pub const HOME_VAR: &str = "GMAIL_WATCHER_HOME";

/// Normalized set of sender addresses that should raise a notification.
///
/// Entries are trimmed and lower-cased; membership is an exact string test,
/// so `boss@company.com` does not match `company.com` or `*@company.com`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    senders: HashSet<String>,
}

impl AllowList {
    /// Normalize a raw comma-separated list
    pub fn parse(raw: &str) -> Self {
        let senders = raw
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Self { senders }
    }

    /// Read `TARGET_SENDERS` from the process environment.
    ///
    /// A missing variable is not an error: the list is empty and nothing
    /// will ever match.
    pub fn load_senders() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        match lookup(TARGET_SENDERS_VAR) {
            Some(raw) => {
                tracing::info!("Loaded {} raw: {}", TARGET_SENDERS_VAR, raw);
                Self::parse(&raw)
            }
            None => {
                tracing::warn!("{} is not set. No senders loaded.", TARGET_SENDERS_VAR);
                Self::default()
            }
        }
    }

    /// Case-insensitive exact membership test
    pub fn matches(&self, address: &str) -> bool {
        self.senders.contains(&address.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Sorted entries, for log output
    pub fn sorted(&self) -> Vec<&str> {
        let mut senders: Vec<&str> = self.senders.iter().map(String::as_str).collect();
        senders.sort_unstable();
        senders
    }
}

/// Fixed file locations, all relative to one base directory
#[derive(Debug, Clone)]
pub struct WatcherPaths {
    pub base_dir: PathBuf,
    pub env_file: PathBuf,
    pub client_secret: PathBuf,
    pub token_cache: PathBuf,
    pub log_file: PathBuf,
}

impl WatcherPaths {
    /// Resolve the base directory: `GMAIL_WATCHER_HOME`, else the directory of
    /// the running executable, else the current directory.
    pub fn resolve() -> Self {
        let base_dir = std::env::var_os(HOME_VAR)
            .map(PathBuf::from)
            .or_else(|| {
                std::env::current_exe()
                    .ok()
                    .and_then(|exe| exe.parent().map(Path::to_path_buf))
            })
            .unwrap_or_else(|| PathBuf::from("."));

        Self::in_dir(base_dir)
    }

    pub fn in_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            env_file: base_dir.join(".env"),
            client_secret: base_dir.join("credentials.json"),
            token_cache: base_dir.join("token.json"),
            log_file: base_dir.join("watcher_log.txt"),
            base_dir,
        }
    }
}

/// Which notification backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    /// Native desktop popup
    Desktop,
    /// Log line only, for headless machines
    Log,
}

impl FromStr for NotifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(NotifierKind::Desktop),
            "log" => Ok(NotifierKind::Log),
            other => Err(format!("unknown notifier '{}'", other)),
        }
    }
}

/// Runtime configuration for the watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Senders that trigger a notification
    pub allow_list: AllowList,

    /// Sleep between poll iterations (default: 30 seconds)
    pub poll_interval: Duration,

    /// How long a mail notification stays up, in seconds
    pub notify_duration_secs: u32,

    /// Pause after each matched notification so popups don't overlap
    pub match_pause: Duration,

    /// Upper bound on waiting for the browser login redirect
    pub login_timeout: Duration,

    /// Browser binaries tried before the system default, in order
    pub preferred_browsers: Vec<PathBuf>,

    pub notifier: NotifierKind,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            allow_list: AllowList::default(),
            poll_interval: Duration::from_secs(30),
            notify_duration_secs: 10,
            match_pause: Duration::from_millis(1000),
            login_timeout: Duration::from_secs(300),
            preferred_browsers: default_browser_paths(),
            notifier: NotifierKind::Desktop,
        }
    }
}

impl WatcherConfig {
    /// Apply the `.env` file next to the executable, then read the environment
    pub fn load(paths: &WatcherPaths) -> Self {
        tracing::debug!("Trying to load .env from: {}", paths.env_file.display());

        if paths.env_file.exists() {
            if let Err(e) = dotenvy::from_path(&paths.env_file) {
                tracing::warn!("Failed to load {}: {}", paths.env_file.display(), e);
            }
        } else {
            tracing::info!(".env file not found at {}", paths.env_file.display());
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let poll_interval_secs = parse_or(&lookup, "POLL_INTERVAL_SECS", 30u64);
        let notify_duration_secs = parse_or(&lookup, "NOTIFY_DURATION_SECS", 10u32);
        let match_pause_millis = parse_or(&lookup, "MATCH_PAUSE_MILLIS", 1000u64);
        let login_timeout_secs = parse_or(&lookup, "LOGIN_TIMEOUT_SECS", 300u64);
        let notifier = parse_or(&lookup, "WATCHER_NOTIFIER", NotifierKind::Desktop);

        let mut preferred_browsers = defaults.preferred_browsers;
        if let Some(browser) = lookup("PREFERRED_BROWSER").filter(|b| !b.trim().is_empty()) {
            preferred_browsers.insert(0, PathBuf::from(browser.trim()));
        }

        Self {
            allow_list: AllowList::from_lookup(&lookup),
            poll_interval: Duration::from_secs(poll_interval_secs),
            notify_duration_secs,
            match_pause: Duration::from_millis(match_pause_millis),
            login_timeout: Duration::from_secs(login_timeout_secs),
            preferred_browsers,
            notifier,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid {}={:?}, using default {:?}", key, raw, default);
                default
            }
        },
        None => default,
    }
}

/// Known Chrome install locations for this platform
fn default_browser_paths() -> Vec<PathBuf> {
    let paths: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &["/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"]
    } else {
        &["/usr/bin/google-chrome", "/usr/bin/google-chrome-stable"]
    };

    paths.iter().map(PathBuf::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_normalizes_entries() {
        let list = AllowList::parse(" A@x.com ,, B@Y.com");
        assert_eq!(list.sorted(), vec!["a@x.com", "b@y.com"]);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(AllowList::parse("").is_empty());
        assert!(AllowList::parse(" , ,").is_empty());
    }

    #[test]
    fn test_matches_is_case_insensitive_and_exact() {
        let list = AllowList::parse("jane@example.com");
        assert!(list.matches("JANE@EXAMPLE.COM"));
        assert!(list.matches(" jane@example.com "));
        assert!(!list.matches("example.com"));
        assert!(!list.matches("jane@example.co"));
    }

    #[test]
    fn test_matches_is_idempotent() {
        let list = AllowList::parse("boss@company.com");
        let first = list.matches("Boss@Company.com");
        let second = list.matches("Boss@Company.com");
        assert_eq!(first, second);
        assert!(first);
    }

    #[test]
    fn test_missing_senders_var_gives_empty_list() {
        let list = AllowList::from_lookup(lookup_from(&[]));
        assert!(list.is_empty());
        assert!(!list.matches("anyone@example.com"));
    }

    #[test]
    fn test_config_defaults() {
        let config = WatcherConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.notify_duration_secs, 10);
        assert_eq!(config.match_pause, Duration::from_secs(1));
        assert_eq!(config.notifier, NotifierKind::Desktop);
    }

    #[test]
    fn test_config_overrides_and_bad_values() {
        let config = WatcherConfig::from_lookup(lookup_from(&[
            ("TARGET_SENDERS", "Boss@Company.com"),
            ("POLL_INTERVAL_SECS", "5"),
            ("NOTIFY_DURATION_SECS", "not-a-number"),
            ("WATCHER_NOTIFIER", "LOG"),
            ("PREFERRED_BROWSER", "/opt/browser/bin"),
        ]));

        assert!(config.allow_list.matches("boss@company.com"));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.notify_duration_secs, 10);
        assert_eq!(config.notifier, NotifierKind::Log);
        assert_eq!(
            config.preferred_browsers.first(),
            Some(&PathBuf::from("/opt/browser/bin"))
        );
    }

    /// Only test that touches the process environment
    #[test]
    fn test_load_applies_env_file_next_to_executable() {
        let dir = tempfile::tempdir().unwrap();
        let paths = WatcherPaths::in_dir(dir.path());
        std::fs::write(
            &paths.env_file,
            "# watcher settings\n\
             TARGET_SENDERS=\"Boss@Company.com, jane@example.com\"\n\
             LOGIN_TIMEOUT_SECS=90\n\
             MATCH_PAUSE_MILLIS=250\n",
        )
        .unwrap();
        for key in ["TARGET_SENDERS", "LOGIN_TIMEOUT_SECS", "MATCH_PAUSE_MILLIS"] {
            std::env::remove_var(key);
        }

        let config = WatcherConfig::load(&paths);

        assert_eq!(config.allow_list.sorted(), vec!["boss@company.com", "jane@example.com"]);
        assert_eq!(config.login_timeout, Duration::from_secs(90));
        assert_eq!(config.match_pause, Duration::from_millis(250));
    }

    #[test]
    fn test_paths_live_in_base_dir() {
        let paths = WatcherPaths::in_dir("/srv/watcher");
        assert_eq!(paths.token_cache, PathBuf::from("/srv/watcher/token.json"));
        assert_eq!(
            paths.client_secret,
            PathBuf::from("/srv/watcher/credentials.json")
        );
        assert_eq!(
            paths.log_file,
            PathBuf::from("/srv/watcher/watcher_log.txt")
        );
    }
}
