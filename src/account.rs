use regex::Regex;
use std::sync::OnceLock;

use crate::error::ExtractionError;
use crate::session::Candidate;

/// Site routes that look like a single path segment but are not accounts.
const NON_IDENTITY_ROUTES: &[&str] = &[
    "home",
    "explore",
    "search",
    "notifications",
    "messages",
    "settings",
    "login",
    "i",
];

/// Everything we know about an account besides its username. The
/// collector never looks inside this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub display_name: String,
    pub user_id: String,
    pub bio: String,
    pub location: String,
    pub followers_count: u64,
    pub following_count: u64,
    pub tweet_count: u64,
    pub verified: bool,
    pub blue_verified: bool,
    pub profile_url: String,
    pub profile_image: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub username: String,
    pub profile: Profile,
}

impl Account {
    pub fn new(username: impl Into<String>, display_name: impl Into<String>) -> Self {
        Account {
            username: username.into(),
            profile: Profile {
                display_name: display_name.into(),
                ..Profile::default()
            },
        }
    }

    /// Validates the candidate's link and turns it into an account.
    pub fn from_candidate(candidate: Candidate) -> Result<Self, ExtractionError> {
        let link = candidate.link.ok_or(ExtractionError::MissingLink)?;
        let username = parse_identity(&link)?;
        Ok(Account {
            username,
            profile: candidate.profile,
        })
    }

    pub fn display_name(&self) -> &str {
        &self.profile.display_name
    }
}

/// Directed "source follows target" relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub target_display_name: String,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        target_display_name: impl Into<String>,
    ) -> Self {
        Edge {
            source: source.into(),
            target: target.into(),
            target_display_name: target_display_name.into(),
        }
    }

    pub fn from_account(source: &str, account: &Account) -> Self {
        Edge::new(source, account.username.clone(), account.display_name())
    }
}

/// Accepts `"/name"`, `"name/"`, `"@name"` and plain `"name"`. A query
/// string or fragment is dropped. What remains must be a bare handle.
pub fn parse_identity(raw: &str) -> Result<String, ExtractionError> {
    static HANDLE: OnceLock<Option<Regex>> = OnceLock::new();

    let raw = raw.trim();
    if raw.contains("/status/") {
        return Err(ExtractionError::NonIdentity(raw.to_string()));
    }

    let path = raw.split(['?', '#']).next().unwrap_or_default();
    let name = path.trim_matches('/');
    let name = name.strip_prefix('@').unwrap_or(name);

    let handle = HANDLE
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name));
    if !handle {
        return Err(ExtractionError::Malformed(raw.to_string()));
    }
    if NON_IDENTITY_ROUTES.contains(&name.to_lowercase().as_str()) {
        return Err(ExtractionError::NonIdentity(raw.to_string()));
    }

    Ok(name.to_string())
}

/// Parses counts rendered as `"34.2K followers"`, `"1,204 followers"` or `"3M"`.
pub fn parse_follower_count(text: &str) -> Option<u64> {
    static COUNT: OnceLock<Option<Regex>> = OnceLock::new();
    let re = COUNT
        .get_or_init(|| Regex::new(r"(?i)([\d][\d,]*(?:\.\d+)?)\s*([KMB]?)\b").ok())
        .as_ref()?;

    let caps = re.captures(text)?;
    let number: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_uppercase()).as_deref() {
        Some("K") => 1_000.0,
        Some("M") => 1_000_000.0,
        Some("B") => 1_000_000_000.0,
        _ => 1.0,
    };
    Some((number * multiplier).round() as u64)
}
