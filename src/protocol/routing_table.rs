use log::debug;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{Address, Cost, LinkId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextHop {
    /// The router's own address.
    Local,
    Link(LinkId),
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextHop::Local => f.write_str("Self"),
            NextHop::Link(link) => write!(f, "{}", link),
        }
    }
}

impl Serialize for NextHop {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Destination -> next hop, plus destination -> path cost. A destination
/// has a route exactly when it has a cost.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingTable {
    owner: Address,
    routes: BTreeMap<Address, NextHop>,
    costs: BTreeMap<Address, Cost>,
}

impl RoutingTable {
    pub fn new(owner: Address) -> Self {
        let mut table = Self {
            owner,
            routes: BTreeMap::new(),
            costs: BTreeMap::new(),
        };
        table.reset();
        table
    }

    /// Back to the self route only.
    pub fn reset(&mut self) {
        self.routes.clear();
        self.costs.clear();
        self.routes.insert(self.owner.clone(), NextHop::Local);
        self.costs.insert(self.owner.clone(), 0.0);
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn route(&self, destination: &str) -> Option<NextHop> {
        self.routes.get(destination).copied()
    }

    pub fn cost(&self, destination: &str) -> Option<Cost> {
        self.costs.get(destination).copied()
    }

    pub fn routes(&self) -> &BTreeMap<Address, NextHop> {
        &self.routes
    }

    pub fn costs(&self) -> &BTreeMap<Address, Cost> {
        &self.costs
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn install(&mut self, destination: Address, link: LinkId, cost: Cost) {
        debug!("{} route to {} via {} cost {:.2}", self.owner, destination, link, cost);
        self.routes.insert(destination.clone(), NextHop::Link(link));
        self.costs.insert(destination, cost);
    }

    pub fn set_cost(&mut self, destination: &str, cost: Cost) {
        if let Some(entry) = self.costs.get_mut(destination) {
            *entry = cost;
        }
    }

    pub fn remove(&mut self, destination: &str) {
        if self.routes.remove(destination).is_some() {
            debug!("{} withdrawing route to {}", self.owner, destination);
        }
        self.costs.remove(destination);
    }

    /// Drop every route that leaves through `link`.
    pub fn remove_via(&mut self, link: LinkId) -> Vec<Address> {
        let cleared: Vec<Address> = self
            .routes
            .iter()
            .filter(|(_, hop)| **hop == NextHop::Link(link))
            .map(|(dest, _)| dest.clone())
            .collect();
        for dest in &cleared {
            debug!("{} clearing route to {}", self.owner, dest);
            self.routes.remove(dest);
            self.costs.remove(dest);
        }
        cleared
    }

    /// Wholesale replacement, keeping the self route.
    pub fn replace(&mut self, entries: impl IntoIterator<Item = (Address, LinkId, Cost)>) {
        self.reset();
        for (destination, link, cost) in entries {
            if destination == self.owner {
                continue;
            }
            self.routes.insert(destination.clone(), NextHop::Link(link));
            self.costs.insert(destination, cost);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_table_has_self_route_only() {
        let table = RoutingTable::new("A".into());
        assert_eq!(table.route("A"), Some(NextHop::Local));
        assert_eq!(table.cost("A"), Some(0.0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_via_clears_matching_routes() {
        let mut table = RoutingTable::new("A".into());
        table.install("B".into(), LinkId(0), 1.0);
        table.install("C".into(), LinkId(0), 2.0);
        table.install("D".into(), LinkId(1), 1.0);

        let mut cleared = table.remove_via(LinkId(0));
        cleared.sort();
        assert_eq!(cleared, vec!["B".to_string(), "C".to_string()]);
        assert_eq!(table.route("B"), None);
        assert_eq!(table.cost("C"), None);
        assert_eq!(table.route("D"), Some(NextHop::Link(LinkId(1))));
    }

    #[test]
    fn replace_keeps_self() {
        let mut table = RoutingTable::new("A".into());
        table.install("B".into(), LinkId(0), 1.0);
        table.replace(vec![("C".to_string(), LinkId(1), 3.0), ("A".to_string(), LinkId(1), 9.0)]);
        assert_eq!(table.route("A"), Some(NextHop::Local));
        assert_eq!(table.cost("A"), Some(0.0));
        assert_eq!(table.route("B"), None);
        assert_eq!(table.cost("C"), Some(3.0));
    }
}
