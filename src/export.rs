use std::fs;
use std::path::Path;

use log::info;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::account::Account;
use crate::error::PersistenceError;

/// One row of the self-following export. `fetch_followers` starts out
/// false and is edited by hand to pick targets for a later run.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    fetch_followers: bool,
    username: &'a str,
    display_name: &'a str,
    user_id: &'a str,
    bio: &'a str,
    location: &'a str,
    followers_count: u64,
    following_count: u64,
    tweet_count: u64,
    verified: bool,
    blue_verified: bool,
    profile_url: &'a str,
    profile_image: &'a str,
    created_at: &'a str,
}

impl<'a> From<&'a Account> for ExportRow<'a> {
    fn from(account: &'a Account) -> Self {
        let p = &account.profile;
        ExportRow {
            fetch_followers: false,
            username: &account.username,
            display_name: &p.display_name,
            user_id: &p.user_id,
            bio: &p.bio,
            location: &p.location,
            followers_count: p.followers_count,
            following_count: p.following_count,
            tweet_count: p.tweet_count,
            verified: p.verified,
            blue_verified: p.blue_verified,
            profile_url: &p.profile_url,
            profile_image: &p.profile_image,
            created_at: &p.created_at,
        }
    }
}

/// Accounts ordered by follower count, highest first. Equal counts keep
/// collection order.
pub fn sort_by_followers(accounts: &[Account]) -> Vec<&Account> {
    let mut sorted: Vec<&Account> = accounts.iter().collect();
    sorted.sort_by(|a, b| b.profile.followers_count.cmp(&a.profile.followers_count));
    sorted
}

pub fn write_self_following(path: &Path, accounts: &[Account]) -> Result<(), PersistenceError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;
    let tmp = NamedTempFile::new_in(dir).map_err(|e| PersistenceError::io(dir, e))?;
    {
        let mut wtr = csv::Writer::from_writer(tmp.as_file());
        for account in sort_by_followers(accounts) {
            wtr.serialize(ExportRow::from(account))
                .map_err(|e| PersistenceError::csv(path, e))?;
        }
        wtr.flush().map_err(|e| PersistenceError::io(path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| PersistenceError::io(path, e))?;
    tmp.persist(path).map_err(|e| PersistenceError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    info!("Saved {} users to {:?}", accounts.len(), path);
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total: usize,
    pub verified: usize,
    pub blue_verified: usize,
}

pub fn summarize(accounts: &[Account]) -> Summary {
    Summary {
        total: accounts.len(),
        verified: accounts.iter().filter(|a| a.profile.verified).count(),
        blue_verified: accounts.iter().filter(|a| a.profile.blue_verified).count(),
    }
}

pub fn print_summary(accounts: &[Account], path: &Path) {
    let summary = summarize(accounts);
    println!("\n{}", "=".repeat(50));
    println!("SUMMARY STATISTICS");
    println!("{}", "=".repeat(50));
    println!("Total users you follow: {}", summary.total);
    println!("Verified users: {}", summary.verified);
    println!("Blue verified users: {}", summary.blue_verified);
    println!("\nTop 10 most followed users:");
    println!("{}", "-".repeat(50));

    for account in sort_by_followers(accounts).into_iter().take(10) {
        let p = &account.profile;
        println!("{} (@{})", p.display_name, account.username);
        println!("  Followers: {}", p.followers_count);
        if !p.bio.is_empty() {
            let bio: String = p.bio.chars().take(100).collect();
            let more = if p.bio.chars().count() > 100 { "..." } else { "" };
            println!("  Bio: {}{}", bio, more);
        }
        println!();
    }

    println!("\n{}", "=".repeat(50));
    println!("Data saved to: {}", path.display());
    println!("Edit the 'fetch_followers' column to select users");
    println!("{}", "=".repeat(50));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_loader::load_selected;

    fn account(name: &str, followers: u64, verified: bool) -> Account {
        let mut a = Account::new(name, name.to_uppercase());
        a.profile.followers_count = followers;
        a.profile.verified = verified;
        a
    }

    #[test]
    fn export_is_sorted_and_unselected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my_following.csv");
        let accounts = vec![
            account("small", 10, false),
            account("big", 5_000, true),
            account("mid", 300, false),
            account("mid2", 300, false),
        ];

        write_self_following(&path, &accounts).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("fetch_followers,username,display_name,user_id,bio"));
        let order: Vec<&str> = lines.map(|l| l.split(',').nth(1).unwrap()).collect();
        assert_eq!(order, vec!["big", "mid", "mid2", "small"]);
        assert!(content.lines().skip(1).all(|l| l.starts_with("false,")));
        assert!(load_selected(&path).unwrap().is_empty());
    }

    #[test]
    fn summary_counts_badges() {
        let mut blue = account("b", 1, false);
        blue.profile.blue_verified = true;
        let accounts = vec![account("a", 1, true), blue, account("c", 1, false)];
        assert_eq!(
            summarize(&accounts),
            Summary {
                total: 3,
                verified: 1,
                blue_verified: 1
            }
        );
    }
}
