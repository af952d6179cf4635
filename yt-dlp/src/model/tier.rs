//! Retrieval tiers: which client profile and which credentials an invocation uses.

use std::fmt;
use std::path::PathBuf;

/// A client profile 'yt-dlp' presents to the platform, passed as `player_client`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessMethod {
    /// The Android app client.
    Android,
    /// The iOS app client.
    Ios,
    /// The TV (living room) client.
    Tv,
    /// The desktop browser client.
    Web,
    /// The desktop Safari client.
    WebSafari,
    /// The mobile browser client.
    MWeb,
    /// Any other client name understood by 'yt-dlp'.
    Custom(String),
}

impl AccessMethod {
    /// The name 'yt-dlp' expects in `--extractor-args youtube:player_client=<name>`.
    pub fn player_client(&self) -> &str {
        match self {
            AccessMethod::Android => "android",
            AccessMethod::Ios => "ios",
            AccessMethod::Tv => "tv",
            AccessMethod::Web => "web",
            AccessMethod::WebSafari => "web_safari",
            AccessMethod::MWeb => "mweb",
            AccessMethod::Custom(name) => name,
        }
    }

    /// The extractor arguments selecting this client.
    pub fn args(&self) -> Vec<String> {
        vec![
            "--extractor-args".to_string(),
            format!("youtube:player_client={}", self.player_client()),
        ]
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.player_client())
    }
}

/// Where 'yt-dlp' takes its cookies from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Credentials {
    /// A browser profile, e.g. `firefox` or `chrome:Profile 1`.
    Browser(String),
    /// A Netscape-format cookie file.
    CookieFile(PathBuf),
}

impl Credentials {
    /// The arguments forwarding these credentials.
    pub fn args(&self) -> Vec<String> {
        match self {
            Credentials::Browser(browser) => {
                vec!["--cookies-from-browser".to_string(), browser.clone()]
            }
            Credentials::CookieFile(path) => {
                vec!["--cookies".to_string(), path.display().to_string()]
            }
        }
    }
}

/// How much a playlist listing asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingMode {
    /// The whole playlist document, including its title.
    Full,
    /// Ids and display titles only, much faster, no playlist title.
    Flat,
}

/// One (access method, credential mode) combination attempted during resolution or fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tier {
    /// A short name used in logs.
    pub label: String,
    /// The client profile, `None` lets 'yt-dlp' choose.
    pub access_method: Option<AccessMethod>,
    /// Whether the configured credentials are forwarded.
    pub with_credentials: bool,
}

impl Tier {
    /// Creates a new tier.
    pub fn new(
        label: impl Into<String>,
        access_method: Option<AccessMethod>,
        with_credentials: bool,
    ) -> Self {
        Self {
            label: label.into(),
            access_method,
            with_credentials,
        }
    }

    /// The per-item fetch tiers, from the most reliable and fast to the most permissive.
    pub fn fetch_defaults() -> Vec<Tier> {
        vec![
            Tier::new("android+cookies", Some(AccessMethod::Android), true),
            Tier::new("tv+cookies", Some(AccessMethod::Tv), true),
            Tier::new("web+cookies", Some(AccessMethod::Web), true),
            Tier::new("android", Some(AccessMethod::Android), false),
            Tier::new("web", Some(AccessMethod::Web), false),
        ]
    }

    /// The arguments for this tier, given the credentials configured for the run.
    pub fn args(&self, credentials: Option<&Credentials>) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(credentials) = self.effective_credentials(credentials) {
            args.extend(credentials.args());
        }
        if let Some(method) = &self.access_method {
            args.extend(method.args());
        }

        args
    }

    fn effective_credentials<'a>(
        &self,
        credentials: Option<&'a Credentials>,
    ) -> Option<&'a Credentials> {
        credentials.filter(|_| self.with_credentials)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Drops tiers that would run the exact same invocation as an earlier one.
///
/// Without credentials a "with cookies" tier is identical to its cookie-less twin,
/// trying it twice only doubles the time spent on a dead item.
pub fn effective_tiers<T, F>(tiers: Vec<T>, has_credentials: bool, tier_of: F) -> Vec<T>
where
    F: Fn(&T) -> (&Tier, Option<ListingMode>),
{
    let mut seen: Vec<(Option<AccessMethod>, bool, Option<ListingMode>)> = Vec::new();
    let mut kept = Vec::with_capacity(tiers.len());

    for item in tiers {
        let (tier, mode) = tier_of(&item);
        let key = (
            tier.access_method.clone(),
            tier.with_credentials && has_credentials,
            mode,
        );
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        kept.push(item);
    }

    kept
}
