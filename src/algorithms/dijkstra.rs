use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use crate::types::{Address, Cost};

/// Adjacency list: node -> (neighbor, edge cost).
pub type Graph = BTreeMap<Address, Vec<(Address, Cost)>>;

#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPath {
    pub cost: Cost,
    /// Neighbor of the source the path starts through; `None` for the source.
    pub first_hop: Option<Address>,
}

/// Single-source shortest paths over `graph`. Only reachable nodes appear
/// in the result. Among equal tentative distances the smallest address is
/// settled first, and a node keeps the first hop of the first path that
/// reached it at its final cost.
pub fn shortest_paths(graph: &Graph, source: &str) -> BTreeMap<Address, ShortestPath> {
    let mut distances: BTreeMap<Address, ShortestPath> = BTreeMap::new();
    let mut visited: BTreeSet<Address> = BTreeSet::new();
    let mut heap = BinaryHeap::new();

    distances.insert(
        source.to_string(),
        ShortestPath {
            cost: 0.0,
            first_hop: None,
        },
    );
    heap.push(Reverse((OrderedFloat(0.0), source.to_string())));

    while let Some(Reverse((OrderedFloat(cost), node))) = heap.pop() {
        // Skip stale heap entries
        if !visited.insert(node.clone()) {
            continue;
        }

        let first_hop = distances.get(&node).and_then(|path| path.first_hop.clone());

        for (neighbor, edge_cost) in graph.get(&node).into_iter().flatten() {
            if visited.contains(neighbor) {
                continue;
            }
            let alt = cost + edge_cost;
            let better = distances
                .get(neighbor)
                .map_or(true, |current| alt < current.cost);
            if better {
                let hop = if node == source {
                    Some(neighbor.clone())
                } else {
                    first_hop.clone()
                };
                distances.insert(
                    neighbor.clone(),
                    ShortestPath {
                        cost: alt,
                        first_hop: hop,
                    },
                );
                heap.push(Reverse((OrderedFloat(alt), neighbor.clone())));
            }
        }
    }

    distances
}

/// Symmetric graph from an undirected edge list.
pub fn undirected<'a, I>(edges: I) -> Graph
where
    I: IntoIterator<Item = (&'a str, &'a str, Cost)>,
{
    let mut graph = Graph::new();
    for (a, b, cost) in edges {
        graph.entry(a.to_string()).or_default().push((b.to_string(), cost));
        graph.entry(b.to_string()).or_default().push((a.to_string(), cost));
    }
    graph
}
