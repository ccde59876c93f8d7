//! Include graph over the discovered files.
//!
//! Discovery itself never loops on a cycle, since a file already in the
//! graph is not visited twice. Cycles are still worth reporting: Home
//! Assistant refuses to load a configuration that includes itself.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::prelude::*;

use super::types::{IncludeKind, IncludeReference};

/// Directed graph where nodes are file paths and edges point from the
/// including file to the included one.
pub type IncludeGraph = DiGraph<String, IncludeKind>;

pub fn build_include_graph<'a>(
    includes: impl IntoIterator<Item = &'a IncludeReference>,
) -> IncludeGraph {
    let mut graph = IncludeGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for include in includes {
        let source = node_for(&mut graph, &mut nodes, include.source_file.as_str());
        let target = node_for(&mut graph, &mut nodes, include.target_file.as_str());
        graph.add_edge(source, target, include.kind);
    }

    graph
}

fn node_for<'a>(
    graph: &mut IncludeGraph,
    nodes: &mut HashMap<&'a str, NodeIndex>,
    path: &'a str,
) -> NodeIndex {
    *nodes
        .entry(path)
        .or_insert_with(|| graph.add_node(path.to_string()))
}

/// Every group of files that include each other, directly or transitively.
/// Each cycle is sorted; cycles are ordered by their first path.
pub fn include_cycles(graph: &IncludeGraph) -> Vec<Vec<String>> {
    let mut cycles: Vec<Vec<String>> = tarjan_scc(graph)
        .into_iter()
        .filter(|component| match component.as_slice() {
            [single] => graph.contains_edge(*single, *single),
            _ => true,
        })
        .map(|component| {
            let mut paths: Vec<String> =
                component.into_iter().map(|index| graph[index].clone()).collect();
            paths.sort();
            paths
        })
        .collect();

    cycles.sort();
    cycles
}
