// Scripted collaborators for driving the collector and scheduler without a
// network. ScriptedSession plays back per-URL frames: frame N is what the
// view renders after N reveals. ScriptedExtractor hands back whatever the
// frame holds.

use std::cell::Cell;
use std::collections::HashMap;

use crate::error::{ExtractionError, SessionError};
use crate::session::{Candidate, ItemExtractor, SessionProvider};

pub type Frame = Vec<Result<Candidate, ExtractionError>>;

#[derive(Debug, Clone, Default)]
pub struct ScriptedFeed {
    frames: Vec<Frame>,
    /// `reveal_more` fails once this many reveals have happened.
    fail_after: Option<usize>,
    fatal: bool,
}

impl ScriptedFeed {
    pub fn frames(frames: Vec<Frame>) -> Self {
        ScriptedFeed {
            frames,
            ..ScriptedFeed::default()
        }
    }

    /// Frame k shows the first `min((k + 1) * per_cycle, n)` usernames.
    pub fn growing(usernames: &[String], per_cycle: usize) -> Self {
        let per_cycle = per_cycle.max(1);
        let mut frames = Vec::new();
        let mut shown = 0;
        loop {
            shown = (shown + per_cycle).min(usernames.len());
            frames.push(
                usernames[..shown]
                    .iter()
                    .map(|u| Ok(Candidate::new(format!("/{}", u), u.to_uppercase())))
                    .collect(),
            );
            if shown == usernames.len() {
                break;
            }
        }
        ScriptedFeed::frames(frames)
    }

    pub fn of(usernames: &[&str]) -> Self {
        let owned: Vec<String> = usernames.iter().map(|u| u.to_string()).collect();
        ScriptedFeed::growing(&owned, usernames.len().max(1))
    }

    /// Navigation error after `reveals` reveals. Costs the target only.
    pub fn failing_after(mut self, reveals: usize) -> Self {
        self.fail_after = Some(reveals);
        self
    }

    /// Authentication error after `reveals` reveals. Ends the run.
    pub fn fatal_after(mut self, reveals: usize) -> Self {
        self.fail_after = Some(reveals);
        self.fatal = true;
        self
    }
}

pub struct ScriptedPage(pub Frame);

#[derive(Debug, Default)]
pub struct ScriptedSession {
    feeds: HashMap<String, ScriptedFeed>,
    current: Option<String>,
    depth: usize,
    pub navigations: Vec<String>,
    pub reveals: usize,
    pub snapshots: usize,
}

impl ScriptedSession {
    pub fn new() -> Self {
        ScriptedSession::default()
    }

    pub fn with_feed(mut self, url: &str, feed: ScriptedFeed) -> Self {
        self.feeds.insert(url.to_string(), feed);
        self
    }

    /// Every network-touching call made so far.
    pub fn calls(&self) -> usize {
        self.navigations.len() + self.reveals + self.snapshots
    }

    fn feed(&self) -> Result<&ScriptedFeed, SessionError> {
        let url = self.current.as_ref().ok_or(SessionError::NoPage)?;
        self.feeds.get(url).ok_or(SessionError::NoPage)
    }
}

impl SessionProvider for ScriptedSession {
    type Page = ScriptedPage;

    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.navigations.push(url.to_string());
        if !self.feeds.contains_key(url) {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            });
        }
        self.current = Some(url.to_string());
        self.depth = 0;
        Ok(())
    }

    fn snapshot(&mut self) -> Result<ScriptedPage, SessionError> {
        self.snapshots += 1;
        let feed = self.feed()?;
        let frame = match feed.frames.len() {
            0 => Vec::new(),
            n => feed.frames[self.depth.min(n - 1)].clone(),
        };
        Ok(ScriptedPage(frame))
    }

    fn reveal_more(&mut self) -> Result<(), SessionError> {
        self.reveals += 1;
        let feed = self.feed()?;
        if let Some(limit) = feed.fail_after {
            if self.depth >= limit {
                let url = self.current.clone().unwrap_or_default();
                return Err(if feed.fatal {
                    SessionError::Auth(format!("session expired at {}", url))
                } else {
                    SessionError::Navigation {
                        url,
                        reason: "timed out".to_string(),
                    }
                });
            }
        }
        self.depth += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ScriptedExtractor {
    pub calls: Cell<usize>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        ScriptedExtractor::default()
    }
}

impl ItemExtractor<ScriptedPage> for ScriptedExtractor {
    fn extract(&self, page: &ScriptedPage) -> Frame {
        self.calls.set(self.calls.get() + 1);
        page.0.clone()
    }
}
