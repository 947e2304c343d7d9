use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use crate::account::parse_identity;
use crate::error::RunError;

/// Reads a plain-text list of identities, one per line. Blank lines and
/// `#` comments are ignored, a leading `@` is dropped, and repeats keep
/// their first position.
pub fn load_target_set<P: AsRef<Path>>(filename: P) -> Result<Vec<String>, RunError> {
    let path = filename.as_ref();
    if !path.exists() {
        return Err(RunError::Input {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        });
    }

    let content = fs::read_to_string(path).map_err(|e| RunError::Input {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let targets = parse_target_lines(&content);
    info!("Found {} targets to process in {:?}", targets.len(), path);
    Ok(targets)
}

fn parse_target_lines(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_identity(line) {
            Ok(name) => {
                if seen.insert(name.clone()) {
                    targets.push(name);
                }
            }
            Err(e) => warn!("Ignoring list entry {:?}: {}", line, e),
        }
    }
    targets
}

#[derive(Debug, Deserialize)]
struct SelectionRow {
    #[serde(default)]
    fetch_followers: String,
    username: String,
}

/// Usernames whose `fetch_followers` column was set in the self-following
/// export. Accepts `true`, `1`, `yes` and `x`, case-insensitively.
pub fn load_selected<P: AsRef<Path>>(export: P) -> Result<Vec<String>, RunError> {
    let path = export.as_ref();
    let file = File::open(path).map_err(|e| RunError::Input {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let mut selected = Vec::new();
    for result in rdr.deserialize::<SelectionRow>() {
        match result {
            Ok(row) => {
                let flag = row.fetch_followers.to_lowercase();
                if matches!(flag.as_str(), "true" | "1" | "yes" | "x") && !row.username.is_empty() {
                    selected.push(row.username);
                }
            }
            Err(e) => warn!("Error parsing export record: {}", e),
        }
    }
    info!("Loaded {} selected users from {:?}", selected.len(), path);
    Ok(selected)
}

pub fn write_target_set<P: AsRef<Path>>(path: P, targets: &[String]) -> Result<(), RunError> {
    let path = path.as_ref();
    let mut content = targets.join("\n");
    content.push('\n');
    fs::write(path, content).map_err(|e| RunError::Input {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
