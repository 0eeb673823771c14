use log::info;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{Address, Cost, LinkId, Tick};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub peer: Address,
    pub last_heard: Tick,
    pub cost: Cost,
}

/// Liveness of the router's adjacencies, keyed by incident link and kept
/// fresh by HELLO packets.
#[derive(Debug, Clone)]
pub struct NeighborTable {
    neighbors: BTreeMap<LinkId, Neighbor>,
    dead_interval: Tick,
}

impl NeighborTable {
    pub fn new(dead_interval: Tick) -> Self {
        Self {
            neighbors: BTreeMap::new(),
            dead_interval,
        }
    }

    pub fn refresh(&mut self, link: LinkId, peer: Address, cost: Cost, now: Tick) {
        self.neighbors.insert(
            link,
            Neighbor {
                peer,
                last_heard: now,
                cost,
            },
        );
    }

    /// Remove every neighbor not heard from within the dead interval and
    /// return the links they were on.
    pub fn check_dead_neighbors(&mut self, now: Tick) -> Vec<LinkId> {
        let dead_interval = self.dead_interval;
        let dead: Vec<LinkId> = self
            .neighbors
            .iter()
            .filter(|(_, neighbor)| neighbor.last_heard + dead_interval <= now)
            .map(|(&link, _)| link)
            .collect();

        for link in &dead {
            if let Some(neighbor) = self.neighbors.remove(link) {
                info!(
                    "neighbor {} on {} expired (last heard at {}, now {})",
                    neighbor.peer, link, neighbor.last_heard, now
                );
            }
        }

        dead
    }

    pub fn get(&self, link: LinkId) -> Option<&Neighbor> {
        self.neighbors.get(&link)
    }

    pub fn is_alive(&self, link: LinkId) -> bool {
        self.neighbors.contains_key(&link)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkId, &Neighbor)> {
        self.neighbors.iter()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn clear(&mut self) {
        self.neighbors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_dead_interval() {
        let mut table = NeighborTable::new(20);
        table.refresh(LinkId(0), "B".into(), 1.0, 1);
        table.refresh(LinkId(1), "C".into(), 1.0, 11);

        assert!(table.check_dead_neighbors(20).is_empty());
        assert_eq!(table.check_dead_neighbors(21), vec![LinkId(0)]);
        assert!(!table.is_alive(LinkId(0)));
        assert!(table.is_alive(LinkId(1)));
        assert_eq!(table.get(LinkId(0)), None);

        table.refresh(LinkId(1), "C".into(), 1.0, 25);
        assert_eq!(table.get(LinkId(1)).map(|n| n.last_heard), Some(25));
        assert!(table.check_dead_neighbors(40).is_empty());
        assert_eq!(table.len(), 1);
    }
}
