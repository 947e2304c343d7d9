//! Convergence-bounded collection of one list view.
//!
//! List views are infinite-scroll: there is no total count and no last-page
//! marker. The collector keeps revealing more content until the number of
//! distinct accounts stops growing for `max_stall` consecutive cycles, or the
//! item cap is hit.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::account::Account;
use crate::delay_manager::{pause, StopSignal};
use crate::error::{CollectError, ExtractionError};
use crate::session::{Candidate, ItemExtractor, SessionProvider};

/// Identities already accepted during one collection.
#[derive(Debug, Default)]
pub struct SeenSet {
    keys: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        SeenSet::default()
    }

    /// Returns `true` when the username was not seen before.
    pub fn insert(&mut self, username: &str) -> bool {
        if self.keys.contains(username) {
            return false;
        }
        self.keys.insert(username.to_string())
    }
}

/// Which list is being collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListView {
    Following(String),
    ListMembers(String),
}

impl ListView {
    pub fn url(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        match self {
            ListView::Following(username) => format!("{}/{}/following", base, username),
            ListView::ListMembers(list_id) => format!("{}/i/lists/{}/members", base, list_id),
        }
    }

    pub fn label(&self) -> String {
        match self {
            ListView::Following(username) => format!("@{}", username),
            ListView::ListMembers(list_id) => format!("list {}", list_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub max_items: usize,
    /// Consecutive cycles without a new account before giving up.
    pub max_stall: usize,
    pub max_cycles: Option<usize>,
    pub settle: Duration,
    /// How long the view may take to show its first candidate.
    pub load_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        CollectorOptions {
            max_items: 500,
            max_stall: 3,
            max_cycles: None,
            settle: Duration::from_millis(2000),
            load_timeout: Duration::from_millis(5000),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl CollectorOptions {
    /// List member views re-render slowly and stall often.
    pub fn list_members() -> Self {
        CollectorOptions {
            max_items: usize::MAX,
            max_stall: 10,
            max_cycles: Some(200),
            settle: Duration::from_millis(1500),
            ..CollectorOptions::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Converged,
    Capped,
    CycleLimit,
}

#[derive(Debug, Clone)]
pub struct CollectOutcome {
    /// First-seen order, no duplicate usernames.
    pub accounts: Vec<Account>,
    pub stop: StopReason,
    pub cycles: usize,
    /// Candidates rejected during validation.
    pub skipped: usize,
}

pub struct Collector<'a, S, E> {
    session: &'a mut S,
    extractor: &'a E,
    base_url: String,
    stop: StopSignal,
}

impl<'a, S, E> Collector<'a, S, E>
where
    S: SessionProvider,
    E: ItemExtractor<S::Page>,
{
    pub fn new(session: &'a mut S, extractor: &'a E, base_url: &str, stop: StopSignal) -> Self {
        Collector {
            session,
            extractor,
            base_url: base_url.to_string(),
            stop,
        }
    }

    pub fn collect(
        &mut self,
        view: &ListView,
        options: &CollectorOptions,
    ) -> Result<CollectOutcome, CollectError> {
        let label = view.label();
        info!("Collecting {}...", label);

        self.session.navigate(&view.url(&self.base_url))?;
        let mut batch = self.wait_for_first(&label, options)?;

        let max_stall = options.max_stall.max(1);
        let mut accounts: Vec<Account> = Vec::new();
        let mut seen = SeenSet::new();
        let mut stall = 0;
        let mut cycles = 0;
        let mut skipped = 0;

        let stop = loop {
            cycles += 1;
            let before = accounts.len();

            for candidate in batch {
                if accounts.len() >= options.max_items {
                    break;
                }
                match candidate.and_then(Account::from_candidate) {
                    Ok(account) => {
                        if seen.insert(&account.username) {
                            debug!("Found user: @{}", account.username);
                            accounts.push(account);
                        }
                    }
                    Err(e) => {
                        skipped += 1;
                        debug!("Skipping candidate: {}", e);
                    }
                }
            }

            info!("Extracted {} unique users so far...", accounts.len());

            if accounts.len() == before {
                stall += 1;
            } else {
                stall = 0;
            }

            if stall >= max_stall {
                info!(
                    "No new users for {} after {} cycles, stopping at {}",
                    label,
                    cycles,
                    accounts.len()
                );
                break StopReason::Converged;
            }
            if accounts.len() >= options.max_items {
                info!("Reached cap of {} for {}", options.max_items, label);
                break StopReason::Capped;
            }
            if options.max_cycles.is_some_and(|max| cycles >= max) {
                info!("Cycle limit reached for {}, stopping at {}", label, accounts.len());
                break StopReason::CycleLimit;
            }

            self.stop.check()?;
            self.session.reveal_more()?;
            pause(options.settle, &self.stop)?;
            batch = self.extract()?;
        };

        info!("Extracted {} users total for {}", accounts.len(), label);
        Ok(CollectOutcome {
            accounts,
            stop,
            cycles,
            skipped,
        })
    }

    fn extract(&mut self) -> Result<Vec<Result<Candidate, ExtractionError>>, CollectError> {
        let page = self.session.snapshot()?;
        Ok(self.extractor.extract(&page))
    }

    /// Polls until the view shows at least one usable candidate. The batch
    /// that satisfied the wait is the first collection cycle.
    fn wait_for_first(
        &mut self,
        label: &str,
        options: &CollectorOptions,
    ) -> Result<Vec<Result<Candidate, ExtractionError>>, CollectError> {
        let deadline = Instant::now() + options.load_timeout;
        loop {
            let batch = self.extract()?;
            if batch.iter().any(Result::is_ok) {
                return Ok(batch);
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("Could not load list for {}", label);
                return Err(CollectError::TargetUnavailable {
                    target: label.to_string(),
                });
            }
            pause(options.poll_interval.min(deadline - now), &self.stop)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedExtractor, ScriptedFeed, ScriptedSession};

    const BASE: &str = "https://social.example";

    fn options(max_items: usize, max_stall: usize) -> CollectorOptions {
        CollectorOptions {
            max_items,
            max_stall,
            max_cycles: None,
            settle: Duration::ZERO,
            load_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
        }
    }

    fn names(outcome: &CollectOutcome) -> Vec<&str> {
        outcome.accounts.iter().map(|a| a.username.as_str()).collect()
    }

    #[test]
    fn stops_after_stall_window() {
        // 10 accounts, 3 new per cycle: growth stops at cycle 4.
        let feed = ScriptedFeed::growing(&names_for(10), 3);
        let view = ListView::Following("carol".into());
        let mut session = ScriptedSession::new().with_feed(&view.url(BASE), feed);
        let extractor = ScriptedExtractor::new();

        let outcome = Collector::new(&mut session, &extractor, BASE, StopSignal::new())
            .collect(&view, &options(5000, 3))
            .unwrap();

        assert_eq!(outcome.stop, StopReason::Converged);
        assert_eq!(outcome.cycles, 4 + 3);
        assert_eq!(names(&outcome), names_for(10));
        assert_eq!(session.reveals, 6);
    }

    #[test]
    fn cap_is_exact_even_mid_cycle() {
        let feed = ScriptedFeed::growing(&names_for(20), 4);
        let view = ListView::Following("carol".into());
        let mut session = ScriptedSession::new().with_feed(&view.url(BASE), feed);
        let extractor = ScriptedExtractor::new();

        let outcome = Collector::new(&mut session, &extractor, BASE, StopSignal::new())
            .collect(&view, &options(6, 3))
            .unwrap();

        assert_eq!(outcome.stop, StopReason::Capped);
        assert_eq!(outcome.accounts.len(), 6);
        assert_eq!(outcome.cycles, 2);
    }

    #[test]
    fn repeated_rows_are_kept_once() {
        let frame = vec![
            Ok(Candidate::new("/a", "A")),
            Ok(Candidate::new("/b", "B")),
            Ok(Candidate::new("/a", "A again")),
        ];
        let feed = ScriptedFeed::frames(vec![frame.clone(), frame]);
        let view = ListView::Following("carol".into());
        let mut session = ScriptedSession::new().with_feed(&view.url(BASE), feed);
        let extractor = ScriptedExtractor::new();

        let outcome = Collector::new(&mut session, &extractor, BASE, StopSignal::new())
            .collect(&view, &options(100, 2))
            .unwrap();

        assert_eq!(names(&outcome), vec!["a", "b"]);
        assert_eq!(outcome.accounts[0].display_name(), "A");
        let unique: HashSet<&str> = names(&outcome).into_iter().collect();
        assert_eq!(unique.len(), outcome.accounts.len());
    }

    #[test]
    fn query_and_fragment_links_name_the_same_account() {
        let frame = vec![
            Ok(Candidate::new("/alice", "Alice")),
            Ok(Candidate::new("/alice?x=1", "Alice")),
            Ok(Candidate::new("/alice#top", "Alice")),
            Ok(Candidate::new("/..", "")),
        ];
        let feed = ScriptedFeed::frames(vec![frame]);
        let view = ListView::Following("carol".into());
        let mut session = ScriptedSession::new().with_feed(&view.url(BASE), feed);
        let extractor = ScriptedExtractor::new();

        let outcome = Collector::new(&mut session, &extractor, BASE, StopSignal::new())
            .collect(&view, &options(100, 1))
            .unwrap();

        assert_eq!(names(&outcome), vec!["alice"]);
        assert_eq!(outcome.skipped, outcome.cycles);
    }

    #[test]
    fn malformed_candidate_is_skipped() {
        let frame = vec![
            Ok(Candidate::new("/a", "")),
            Ok(Candidate::new("/b", "")),
            Err(ExtractionError::MissingLink),
            Ok(Candidate::new("/c", "")),
            Ok(Candidate::new("/d", "")),
            Ok(Candidate::new("/e", "")),
        ];
        let feed = ScriptedFeed::frames(vec![frame]);
        let view = ListView::Following("carol".into());
        let mut session = ScriptedSession::new().with_feed(&view.url(BASE), feed);
        let extractor = ScriptedExtractor::new();

        let outcome = Collector::new(&mut session, &extractor, BASE, StopSignal::new())
            .collect(&view, &options(100, 1))
            .unwrap();

        assert_eq!(names(&outcome), vec!["a", "b", "c", "d", "e"]);
        // The bad entry is rejected again on every cycle it is still rendered.
        assert_eq!(outcome.skipped, outcome.cycles);
    }

    #[test]
    fn status_links_are_not_accounts() {
        let frame = vec![
            Ok(Candidate::new("/a", "")),
            Ok(Candidate::new("/a/status/99", "")),
            Ok(Candidate::new("/", "")),
        ];
        let feed = ScriptedFeed::frames(vec![frame]);
        let view = ListView::Following("carol".into());
        let mut session = ScriptedSession::new().with_feed(&view.url(BASE), feed);
        let extractor = ScriptedExtractor::new();

        let outcome = Collector::new(&mut session, &extractor, BASE, StopSignal::new())
            .collect(&view, &options(100, 1))
            .unwrap();

        assert_eq!(names(&outcome), vec!["a"]);
    }

    #[test]
    fn empty_view_is_unavailable() {
        let view = ListView::Following("ghost".into());
        let mut session =
            ScriptedSession::new().with_feed(&view.url(BASE), ScriptedFeed::frames(vec![]));
        let extractor = ScriptedExtractor::new();

        let err = Collector::new(&mut session, &extractor, BASE, StopSignal::new())
            .collect(&view, &options(100, 3))
            .unwrap_err();

        assert!(matches!(err, CollectError::TargetUnavailable { .. }));
        assert_eq!(session.reveals, 0);
    }

    #[test]
    fn cycle_limit_bounds_a_view_that_keeps_growing() {
        let feed = ScriptedFeed::growing(&names_for(100), 1);
        let view = ListView::ListMembers("42".into());
        let mut session = ScriptedSession::new().with_feed(&view.url(BASE), feed);
        let extractor = ScriptedExtractor::new();
        let opts = CollectorOptions {
            max_cycles: Some(5),
            ..options(usize::MAX, 10)
        };

        let outcome = Collector::new(&mut session, &extractor, BASE, StopSignal::new())
            .collect(&view, &opts)
            .unwrap();

        assert_eq!(outcome.stop, StopReason::CycleLimit);
        assert_eq!(outcome.accounts.len(), 5);
    }

    #[test]
    fn raised_stop_signal_discards_progress() {
        let feed = ScriptedFeed::growing(&names_for(10), 2);
        let view = ListView::Following("carol".into());
        let mut session = ScriptedSession::new().with_feed(&view.url(BASE), feed);
        let extractor = ScriptedExtractor::new();
        let stop = StopSignal::new();
        stop.raise();

        let err = Collector::new(&mut session, &extractor, BASE, stop)
            .collect(&view, &options(100, 3))
            .unwrap_err();

        assert!(matches!(err, CollectError::Cancelled));
    }

    #[test]
    fn list_view_urls() {
        assert_eq!(
            ListView::Following("carol".into()).url("https://social.example/"),
            "https://social.example/carol/following"
        );
        assert_eq!(
            ListView::ListMembers("42".into()).url(BASE),
            "https://social.example/i/lists/42/members"
        );
    }

    fn names_for(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("user{:02}", i)).collect()
    }
}
