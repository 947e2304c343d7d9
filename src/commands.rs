//! The run modes behind the CLI, generic over the session so they can be
//! driven by scripted collaborators.

use std::collections::HashSet;

use log::{error, info};

use crate::account::Account;
use crate::collector::{Collector, ListView};
use crate::config::Config;
use crate::delay_manager::StopSignal;
use crate::error::RunError;
use crate::export::{print_summary, write_self_following};
use crate::input_loader::{load_selected, write_target_set};
use crate::network::{assemble, read_aggregate, write_aggregate, Assembly};
use crate::resume_manager::CsvCheckpointStore;
use crate::scheduler::Scheduler;
use crate::session::{ItemExtractor, SessionProvider};

const TOP_N: usize = 20;

/// Collects the configured account's own following with full metadata
/// and writes the selection export.
pub fn collect_self<S, E>(
    session: &mut S,
    extractor: &E,
    config: &Config,
    stop: &StopSignal,
) -> Result<Vec<Account>, RunError>
where
    S: SessionProvider,
    E: ItemExtractor<S::Page>,
{
    let username = config.require_username()?.to_string();
    info!("Navigating to following page for @{}...", username);

    let outcome = Collector::new(session, extractor, &config.base_url, stop.clone())
        .collect(&ListView::Following(username), &config.self_options())?;

    if outcome.accounts.is_empty() {
        error!("No following data collected");
        return Ok(outcome.accounts);
    }

    let path = config.export_path();
    write_self_following(&path, &outcome.accounts)?;
    print_summary(&outcome.accounts, &path);
    Ok(outcome.accounts)
}

/// Batch-collects `targets` under `namespace` and rewrites that namespace's
/// aggregate. With `merge`, the prior aggregate is unioned in and sources it
/// already holds are not visited again.
pub fn run_targets<S, E>(
    session: &mut S,
    extractor: &E,
    config: &Config,
    targets: &[String],
    namespace: &str,
    merge: bool,
    stop: &StopSignal,
) -> Result<Assembly, RunError>
where
    S: SessionProvider,
    E: ItemExtractor<S::Page>,
{
    let store = CsvCheckpointStore::open(config.checkpoint_dir())?;
    let aggregate_path = config.aggregate_path(namespace);

    let prior = if merge {
        Some(read_aggregate(&aggregate_path)?)
    } else {
        None
    };

    let pending: Vec<String> = match &prior {
        Some(prior) => {
            let done: HashSet<String> = prior.sources().into_iter().collect();
            info!("Found {} already scraped users", done.len());
            targets.iter().filter(|t| !done.contains(*t)).cloned().collect()
        }
        None => targets.to_vec(),
    };
    info!("New targets to scrape: {}", pending.len());

    let report = {
        let collector = Collector::new(session, extractor, &config.base_url, stop.clone());
        Scheduler::new(
            collector,
            &store,
            config.target_options(),
            config.pacing(),
            stop.clone(),
        )
        .run(&pending)?
    };

    let assembly = assemble(&report.edges, &report.sources, prior.as_ref());
    // Rewritten even when empty.
    write_aggregate(&aggregate_path, &assembly.graph)?;
    if assembly.graph.is_empty() {
        info!("No relationships collected for {}", namespace);
    } else {
        assembly.ranking.print(
            TOP_N,
            &format!("TOP {} MOST FOLLOWED ACCOUNTS ({})", TOP_N, namespace),
            "sources",
        );
    }
    Ok(assembly)
}

/// Collects the members of a list, then batch-collects every member the
/// namespace's aggregate does not hold yet.
pub fn run_list_members<S, E>(
    session: &mut S,
    extractor: &E,
    config: &Config,
    list_id: &str,
    namespace: &str,
    stop: &StopSignal,
) -> Result<Assembly, RunError>
where
    S: SessionProvider,
    E: ItemExtractor<S::Page>,
{
    let view = ListView::ListMembers(list_id.to_string());
    let outcome = Collector::new(&mut *session, extractor, &config.base_url, stop.clone())
        .collect(&view, &config.list_member_options())?;

    if outcome.accounts.is_empty() {
        return Err(RunError::Unavailable(view.label()));
    }
    info!("Found {} members in the list", outcome.accounts.len());

    let members: Vec<String> = outcome.accounts.into_iter().map(|a| a.username).collect();
    run_targets(session, extractor, config, &members, namespace, true, stop)
}

/// Recomputes the ranking of a namespace from its aggregate alone.
pub fn rank(config: &Config, namespace: &str, top: usize) -> Result<Assembly, RunError> {
    let graph = read_aggregate(&config.aggregate_path(namespace))?;
    let assembly = assemble(&[], &[], Some(&graph));
    assembly.ranking.print(
        top,
        &format!("TOP {} MOST FOLLOWED ACCOUNTS ({})", top, namespace),
        "sources",
    );
    Ok(assembly)
}

/// Turns the hand-edited export into a target list.
pub fn select(config: &Config) -> Result<Vec<String>, RunError> {
    let selected = load_selected(config.export_path())?;
    let path = config.selected_path();
    write_target_set(&path, &selected)?;
    info!("Wrote {} selected users to {:?}", selected.len(), path);
    Ok(selected)
}
