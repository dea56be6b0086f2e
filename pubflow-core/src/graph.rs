//! Package dependency graph analysis using petgraph.

use std::collections::BTreeMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{Error, Result};

/// Directed graph over local-package dependencies.
///
/// Edges point from a package to its local dependencies, so Tarjan's
/// strongly-connected-components pass emits components dependency-first: a
/// package's dependencies always land in an earlier (or the same) component.
///
/// Nodes are inserted in sorted name order, which makes the emitted
/// component order a function of the graph alone rather than of the caller's
/// map iteration order.
#[derive(Debug)]
pub struct PackageGraph {
    components: Vec<Vec<String>>,
}

impl PackageGraph {
    /// Builds the graph from a mapping of package name to local dependencies.
    ///
    /// Dependencies on names absent from the mapping are ignored; the head
    /// snapshot defines the iteration scope.
    pub fn new<S: AsRef<str>>(deps: &BTreeMap<String, Vec<S>>) -> Self {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut nodes: BTreeMap<&str, NodeIndex> = BTreeMap::new();

        for name in deps.keys() {
            let idx = graph.add_node(name.clone());
            nodes.insert(name, idx);
        }

        for (name, local_deps) in deps {
            let from = nodes[name.as_str()];
            for dep in local_deps {
                if let Some(&to) = nodes.get(dep.as_ref()) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        // tarjan_scc emits components in reverse topological order of the
        // condensation; with pkg -> dep edges that is dependency-first.
        let components = tarjan_scc(&graph)
            .into_iter()
            .map(|scc| scc.into_iter().map(|idx| graph[idx].clone()).collect())
            .collect();

        Self { components }
    }

    /// Strongly-connected components in dependency-first order.
    ///
    /// Components with more than one member indicate a dependency cycle;
    /// planning-only callers may inspect them without failing.
    pub fn components(&self) -> &[Vec<String>] {
        &self.components
    }

    /// Strict topological publish order (dependencies before dependents).
    ///
    /// # Errors
    ///
    /// Returns [`Error::CyclicDependency`] naming the members of the first
    /// multi-package component, since no publish order exists for a cycle.
    pub fn publish_order(&self) -> Result<Vec<String>> {
        let mut order = Vec::new();
        for component in &self.components {
            if component.len() > 1 {
                let mut members = component.clone();
                members.sort();
                return Err(Error::CyclicDependency { members });
            }
            order.extend(component.iter().cloned());
        }
        Ok(order)
    }
}
