//! Splits an instance into independent components.
//!
//! Two stations are connected in the constraint graph when at least one interference constraint
//! between them is compatible with their current domains. Stations in different connected
//! components share no constraint, so the components can be solved separately and their
//! witnesses joined by union.
use std::collections::BTreeSet;

use log::debug;
use petgraph::graphmap::UnGraphMap;
use petgraph::visit::Bfs;

use crate::basic_types::Station;
use crate::basic_types::StationPackingInstance;
use crate::data::ConstraintManager;

/// The undirected constraint graph of an instance. Every station of the instance is a node, also
/// those without neighbours.
pub type ConstraintGraph = UnGraphMap<Station, ()>;

/// The order in which components are handed to the backend. Only affects how the shared time
/// budget is spent, never the answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ComponentOrder {
    /// Solve the largest components first, while most of the budget is left.
    #[default]
    LargestFirst,
    /// Solve the smallest components first.
    SmallestFirst,
    /// Keep the order in which the components were discovered (by lowest station id).
    AsGiven,
}

pub fn constraint_graph(
    instance: &StationPackingInstance,
    constraints: &dyn ConstraintManager,
) -> ConstraintGraph {
    let mut graph = ConstraintGraph::new();

    for station in instance.stations() {
        let _ = graph.add_node(station);
    }

    for constraint in constraints.relevant_constraints(instance.domains()) {
        if constraint.source != constraint.target {
            let _ = graph.add_edge(constraint.source, constraint.target, ());
        }
    }

    graph
}

/// Partitions the stations of an instance into the connected components of its constraint graph.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConstraintGrouper {
    order: ComponentOrder,
}

impl ConstraintGrouper {
    pub fn new(order: ComponentOrder) -> ConstraintGrouper {
        ConstraintGrouper { order }
    }

    pub fn group(
        &self,
        instance: &StationPackingInstance,
        constraints: &dyn ConstraintManager,
    ) -> Vec<BTreeSet<Station>> {
        let graph = constraint_graph(instance, constraints);
        let mut components = connected_components(&graph);

        match self.order {
            ComponentOrder::LargestFirst => {
                components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)))
            }
            ComponentOrder::SmallestFirst => {
                components.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            }
            ComponentOrder::AsGiven => components.sort(),
        }

        debug!(
            "Instance {} has {} components, sizes {:?}",
            instance.name(),
            components.len(),
            components.iter().map(BTreeSet::len).collect::<Vec<_>>()
        );

        components
    }
}

pub fn connected_components(graph: &ConstraintGraph) -> Vec<BTreeSet<Station>> {
    let mut seen = BTreeSet::new();
    let mut components = Vec::new();

    for start in graph.nodes() {
        if seen.contains(&start) {
            continue;
        }

        let mut component = BTreeSet::new();
        let mut bfs = Bfs::new(graph, start);
        while let Some(station) = bfs.next(graph) {
            let _ = component.insert(station);
        }

        seen.extend(component.iter().copied());
        components.push(component);
    }

    components
}
