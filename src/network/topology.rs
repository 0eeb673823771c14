use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::SimError;
use crate::types::{Address, Location, Tick};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub address: Address,
    pub x: f64,
    pub y: f64,
}

impl NodeSpec {
    pub fn location(&self) -> Location {
        Location::new(self.x, self.y)
    }
}

/// Undirected link between two addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec(pub Address, pub Address);

/// DATA packet injected on every reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSpec {
    pub source: Address,
    pub destination: Address,
    pub start: Tick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<NodeSpec>,
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub traffic: Vec<TrafficSpec>,
}

impl Topology {
    pub fn new(nodes: &[(&str, f64, f64)], links: &[(&str, &str)]) -> Self {
        Self {
            nodes: nodes
                .iter()
                .map(|&(address, x, y)| NodeSpec {
                    address: address.to_string(),
                    x,
                    y,
                })
                .collect(),
            links: links
                .iter()
                .map(|&(a, b)| LinkSpec(a.to_string(), b.to_string()))
                .collect(),
            traffic: Vec::new(),
        }
    }

    /// Fixed eight-router test network:
    ///
    /// ```text
    /// A---B   C---D
    /// |   | / | / |
    /// E   F---G---H
    /// ```
    pub fn demo() -> Self {
        Self::new(
            &[
                ("A", 0.0, 0.0),
                ("B", 1.0, 0.0),
                ("C", 2.0, 0.0),
                ("D", 3.0, 0.0),
                ("E", 0.0, 1.0),
                ("F", 1.0, 1.0),
                ("G", 2.0, 1.0),
                ("H", 3.0, 1.0),
            ],
            &[
                ("A", "B"),
                ("A", "E"),
                ("B", "F"),
                ("E", "F"),
                ("C", "D"),
                ("C", "F"),
                ("C", "G"),
                ("D", "G"),
                ("D", "H"),
                ("F", "G"),
                ("G", "H"),
            ],
        )
    }

    pub fn with_traffic(mut self, source: &str, destination: &str, start: Tick) -> Self {
        self.traffic.push(TrafficSpec {
            source: source.to_string(),
            destination: destination.to_string(),
            start,
        });
        self
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let content = fs::read_to_string(path)?;
        let topology: Topology = serde_json::from_str(&content)?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SimError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.nodes.iter().map(|node| &node.address)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let mut addresses = BTreeSet::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if !addresses.insert(node.address.as_str()) {
                return Err(SimError::DuplicateAddress(node.address.clone()));
            }
            if self.nodes[..i].iter().any(|other| other.x == node.x && other.y == node.y) {
                return Err(SimError::DuplicateLocation { x: node.x, y: node.y });
            }
        }

        let mut pairs = BTreeSet::new();
        for LinkSpec(a, b) in &self.links {
            for end in [a, b] {
                if !addresses.contains(end.as_str()) {
                    return Err(SimError::UnknownAddress(end.clone()));
                }
            }
            if a == b {
                return Err(SimError::SelfLoop(a.clone()));
            }
            let key = if a < b { (a, b) } else { (b, a) };
            if !pairs.insert(key) {
                return Err(SimError::DuplicateLink(a.clone(), b.clone()));
            }
        }

        for traffic in &self.traffic {
            for end in [&traffic.source, &traffic.destination] {
                if !addresses.contains(end.as_str()) {
                    return Err(SimError::UnknownAddress(end.clone()));
                }
            }
        }
        Ok(())
    }
}
