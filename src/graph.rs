//! Graph topology: nodes, edges, and adjacency (spec §3, §4.2, C2).
//!
//! The graph is read-only once built and never mutated during a run. Label
//! indices (which nodes/edges currently carry which labels) live on
//! [`crate::facts::FactsIndex`] instead of here -- see `DESIGN.md` for why:
//! in short, the set of labeled targets grows as rules derive new facts,
//! and `FactsIndex` already exposes the sorted `iter(label)` contract the
//! grounder needs (spec §4.3), so duplicating it here would just be a
//! second, staler copy of the same information.

use std::collections::{HashMap, HashSet};

/// Dense, immutable node/edge topology with sorted adjacency views.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<String>,
    node_index: HashMap<String, usize>,
    edges: Vec<(String, String)>,
    edge_index: HashMap<(String, String), usize>,
    out_adj: HashMap<String, Vec<String>>,
    in_adj: HashMap<String, Vec<String>>,
}

impl Graph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn has_edge(&self, u: &str, v: &str) -> bool {
        self.edge_index.contains_key(&(u.to_string(), v.to_string()))
    }

    /// Node ids in ingestion (insertion) order.
    pub fn node_ids(&self) -> &[String] {
        &self.nodes
    }

    /// Edge pairs in ingestion (insertion) order.
    pub fn edge_pairs(&self) -> &[(String, String)] {
        &self.edges
    }

    /// Sorted successors of `u` (empty slice if `u` has none).
    pub fn out_neighbors(&self, u: &str) -> &[String] {
        self.out_adj.get(u).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sorted predecessors of `v` (empty slice if `v` has none).
    pub fn in_neighbors(&self, v: &str) -> &[String] {
        self.in_adj.get(v).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Accumulates nodes/edges from ingestion, deduplicating and sorting
/// adjacency lists once at [`GraphBuilder::build`] time.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<String>,
    edges: Vec<(String, String)>,
}

impl GraphBuilder {
    pub fn add_node(mut self, id: impl Into<String>) -> Self {
        self.nodes.push(id.into());
        self
    }

    pub fn add_edge(mut self, u: impl Into<String>, v: impl Into<String>) -> Self {
        self.edges.push((u.into(), v.into()));
        self
    }

    pub fn build(self) -> Graph {
        let mut nodes = Vec::new();
        let mut node_index = HashMap::new();
        let mut seen = HashSet::new();
        for id in self.nodes {
            if seen.insert(id.clone()) {
                node_index.insert(id.clone(), nodes.len());
                nodes.push(id);
            }
        }

        let mut edges = Vec::new();
        let mut edge_index = HashMap::new();
        let mut eseen = HashSet::new();
        for e in self.edges {
            if eseen.insert(e.clone()) {
                edge_index.insert(e.clone(), edges.len());
                edges.push(e);
            }
        }

        let mut out_adj: HashMap<String, Vec<String>> = HashMap::new();
        let mut in_adj: HashMap<String, Vec<String>> = HashMap::new();
        for (u, v) in &edges {
            out_adj.entry(u.clone()).or_default().push(v.clone());
            in_adj.entry(v.clone()).or_default().push(u.clone());
        }
        for vs in out_adj.values_mut() {
            vs.sort();
        }
        for vs in in_adj.values_mut() {
            vs.sort();
        }

        Graph {
            nodes,
            node_index,
            edges,
            edge_index,
            out_adj,
            in_adj,
        }
    }
}
