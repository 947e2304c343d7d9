//! Combined relationship graph and follow-frequency ranking.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::account::Edge;
use crate::error::PersistenceError;

/// Edges unique on `(source, target)`, in first-seen order. A repeated key
/// replaces the stored display name and keeps the original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipGraph {
    edges: Vec<Edge>,
    index: HashMap<(String, String), usize>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        RelationshipGraph::default()
    }

    pub fn from_edges<I: IntoIterator<Item = Edge>>(edges: I) -> Self {
        let mut graph = RelationshipGraph::new();
        graph.extend(edges);
        graph
    }

    /// Returns `true` when the key was new.
    pub fn insert(&mut self, edge: Edge) -> bool {
        let key = (edge.source.clone(), edge.target.clone());
        match self.index.get(&key) {
            Some(&pos) => {
                self.edges[pos].target_display_name = edge.target_display_name;
                false
            }
            None => {
                self.index.insert(key, self.edges.len());
                self.edges.push(edge);
                true
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = Edge>>(&mut self, edges: I) {
        for edge in edges {
            self.insert(edge);
        }
    }

    /// Union with `other`; `other` wins on display names.
    pub fn merge(&self, other: &RelationshipGraph) -> RelationshipGraph {
        let mut merged = self.clone();
        merged.extend(other.edges.iter().cloned());
        merged
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Distinct sources in first-seen order.
    pub fn sources(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .filter(|e| seen.insert(e.source.as_str()))
            .map(|e| e.source.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub username: String,
    pub display_name: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub entries: Vec<RankEntry>,
    pub sources_considered: usize,
}

impl Ranking {
    /// Counts distinct sources per followed account. Ties keep the order in
    /// which the followed accounts first appear in the graph.
    pub fn compute(graph: &RelationshipGraph, sources_considered: usize) -> Ranking {
        let mut order: Vec<&str> = Vec::new();
        let mut followers: HashMap<&str, HashSet<&str>> = HashMap::new();
        let mut names: HashMap<&str, &str> = HashMap::new();

        for edge in graph.edges() {
            let target = edge.target.as_str();
            let sources = followers.entry(target).or_insert_with(|| {
                order.push(target);
                HashSet::new()
            });
            sources.insert(edge.source.as_str());
            if !edge.target_display_name.is_empty() {
                names.insert(target, edge.target_display_name.as_str());
            }
        }

        let mut entries: Vec<RankEntry> = order
            .into_iter()
            .map(|target| {
                let count = followers.get(target).map_or(0, HashSet::len);
                let percentage = if sources_considered == 0 {
                    0.0
                } else {
                    count as f64 / sources_considered as f64 * 100.0
                };
                RankEntry {
                    username: target.to_string(),
                    display_name: names.get(target).copied().unwrap_or_default().to_string(),
                    count,
                    percentage,
                }
            })
            .collect();
        // Stable sort keeps first-seen order between equal counts.
        entries.sort_by(|a, b| b.count.cmp(&a.count));

        Ranking {
            entries,
            sources_considered,
        }
    }

    pub fn top(&self, n: usize) -> &[RankEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn print(&self, n: usize, title: &str, noun: &str) {
        println!("\n{}", "=".repeat(50));
        println!("{}", title);
        println!("{}", "=".repeat(50));
        for entry in self.top(n) {
            println!(
                "{:3} {} ({:5.1}%) follow @{}",
                entry.count, noun, entry.percentage, entry.username
            );
        }
    }
}

/// Result of one assembly step.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub graph: RelationshipGraph,
    pub ranking: Ranking,
}

/// Builds the combined graph from a run's edges, unioned with `prior` when
/// given, and ranks it. `sources` are the identities the run considered,
/// including ones that produced no edges.
pub fn assemble(edges: &[Edge], sources: &[String], prior: Option<&RelationshipGraph>) -> Assembly {
    let run = RelationshipGraph::from_edges(edges.iter().cloned());
    let graph = match prior {
        Some(prior) => prior.merge(&run),
        None => run,
    };

    let mut considered: HashSet<String> = sources.iter().cloned().collect();
    considered.extend(graph.sources());

    let ranking = Ranking::compute(&graph, considered.len());
    Assembly { graph, ranking }
}

#[derive(Debug, Deserialize)]
struct AggregateRow {
    #[serde(alias = "operator", alias = "researcher")]
    source_identity: String,
    follows: String,
    #[serde(default)]
    follows_display_name: String,
}

/// Reads a previously written aggregate. A missing file is an empty graph.
pub fn read_aggregate(path: &Path) -> Result<RelationshipGraph, PersistenceError> {
    if !path.exists() {
        info!("No existing network data found at {:?}", path);
        return Ok(RelationshipGraph::new());
    }

    let file = File::open(path).map_err(|e| PersistenceError::io(path, e))?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let mut graph = RelationshipGraph::new();
    for result in rdr.deserialize::<AggregateRow>() {
        match result {
            Ok(row) if !row.source_identity.is_empty() && !row.follows.is_empty() => {
                graph.insert(Edge::new(row.source_identity, row.follows, row.follows_display_name));
            }
            Ok(_) => warn!("Skipping incomplete row in {:?}", path),
            Err(e) => warn!("Skipping unreadable row in {:?}: {}", path, e),
        }
    }
    info!(
        "Found {} relationships from {} sources in {:?}",
        graph.len(),
        graph.sources().len(),
        path
    );
    Ok(graph)
}

/// Rewrites the aggregate in full. The old file stays intact until the new
/// one is completely written.
pub fn write_aggregate(path: &Path, graph: &RelationshipGraph) -> Result<(), PersistenceError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir).map_err(|e| PersistenceError::io(&dir, e))?;

    let tmp = NamedTempFile::new_in(&dir).map_err(|e| PersistenceError::io(&dir, e))?;
    {
        let mut wtr = csv::Writer::from_writer(tmp.as_file());
        wtr.write_record(["source_identity", "follows", "follows_display_name"])
            .map_err(|e| PersistenceError::csv(path, e))?;
        for edge in graph.edges() {
            wtr.write_record([&edge.source, &edge.target, &edge.target_display_name])
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
    info!("Saved {} total relationships to {:?}", graph.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(source: &str, target: &str) -> Edge {
        Edge::new(source, target, "")
    }

    #[test]
    fn duplicate_keys_collapse_and_later_name_wins() {
        let graph = RelationshipGraph::from_edges(vec![
            Edge::new("a", "x", "Old"),
            e("a", "y"),
            Edge::new("a", "x", "New"),
        ]);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.edges()[0].target_display_name, "New");
        assert_eq!(graph.edges()[1].target, "y");
    }

    #[test]
    fn merge_with_itself_is_identity() {
        let graph = RelationshipGraph::from_edges(vec![e("a", "x"), e("b", "x"), e("a", "y")]);
        let merged = graph.merge(&graph);
        assert_eq!(merged, graph);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn ranking_counts_distinct_sources() {
        let graph = RelationshipGraph::from_edges(vec![e("A", "x"), e("B", "x"), e("A", "y")]);
        let ranking = Ranking::compute(&graph, graph.sources().len());

        assert_eq!(ranking.entries.len(), 2);
        assert_eq!(ranking.entries[0].username, "x");
        assert_eq!(ranking.entries[0].count, 2);
        assert!((ranking.entries[0].percentage - 100.0).abs() < 1e-9);
        assert_eq!(ranking.entries[1].username, "y");
        assert_eq!(ranking.entries[1].count, 1);
        assert!((ranking.entries[1].percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn ranking_ties_keep_first_seen_order() {
        let graph = RelationshipGraph::from_edges(vec![
            e("A", "late"),
            e("A", "early"),
            e("B", "popular"),
            e("C", "popular"),
        ]);
        let ranking = Ranking::compute(&graph, 3);
        let names: Vec<&str> = ranking.entries.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, vec!["popular", "late", "early"]);
        assert_eq!(ranking.top(1).len(), 1);
        assert_eq!(ranking.top(10).len(), 3);
    }

    #[test]
    fn aggregate_round_trip_and_legacy_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.csv");

        let graph = RelationshipGraph::from_edges(vec![Edge::new("a", "x", "X, Inc."), e("b", "x")]);
        write_aggregate(&path, &graph).unwrap();
        assert_eq!(read_aggregate(&path).unwrap(), graph);

        let legacy = dir.path().join("legacy.csv");
        fs::write(&legacy, "researcher,follows\nr1,x\nr1,x\nr2,y\n").unwrap();
        let loaded = read_aggregate(&legacy).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.sources(), vec!["r1".to_string(), "r2".to_string()]);
    }

    #[test]
    fn assemble_unions_prior_and_counts_empty_sources() {
        let prior = RelationshipGraph::from_edges(vec![e("A", "x"), e("A", "y")]);
        let run = vec![e("B", "x"), e("A", "x"), e("B", "x")];
        let sources = vec!["B".to_string(), "C".to_string()];

        let assembly = assemble(&run, &sources, Some(&prior));

        assert_eq!(assembly.graph.len(), 3);
        assert_eq!(assembly.ranking.sources_considered, 3);
        assert_eq!(assembly.ranking.entries[0].username, "x");
        assert_eq!(assembly.ranking.entries[0].count, 2);

        let again = assemble(assembly.graph.edges(), &sources, Some(&assembly.graph));
        assert_eq!(again.graph, assembly.graph);
    }

    #[test]
    fn missing_aggregate_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_aggregate(&dir.path().join("none.csv")).unwrap().is_empty());
    }
}
