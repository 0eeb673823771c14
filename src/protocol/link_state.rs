use log::{debug, error, trace};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::RoutingProtocol;
use crate::algorithms::dijkstra::{self, Graph};
use crate::context::SimContext;
use crate::error::SimError;
use crate::message::{PacketKind, Payload};
use crate::router::RouterState;
use crate::types::{Address, Cost, LinkId, PacketId, Tick};

/// Most recent advertisement seen from one origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lsa {
    pub seq: u64,
    pub neighbors: Vec<(Address, Cost)>,
}

/// Flooded link-state routing with a periodic full shortest-path pass.
#[derive(Debug, Clone, Default)]
pub struct LinkState {
    lsa: BTreeMap<Address, Lsa>,
    seq: u64,
}

impl LinkState {
    pub fn database(&self) -> &BTreeMap<Address, Lsa> {
        &self.lsa
    }

    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Forget stored advertisements older than the previous local sequence
    /// number. Only this router's database is affected.
    fn clear_stale(&mut self) {
        let seq = self.seq;
        self.lsa.retain(|_, lsa| lsa.seq + 1 >= seq);
    }

    /// Store the advertisement if it is newer than the one held for
    /// `origin`. Returns whether it was stored.
    pub fn accept(
        &mut self,
        router: &Address,
        origin: &Address,
        seq: u64,
        neighbors: Option<&Vec<(Address, Cost)>>,
    ) -> Result<bool, SimError> {
        let newer = self.lsa.get(origin).map_or(true, |held| seq > held.seq);
        if !newer {
            return Ok(false);
        }
        let Some(neighbors) = neighbors else {
            error!("Malformed LSA from {} (seq {}) at {}: no neighbor info", origin, seq, router);
            return Err(SimError::MalformedAdvertisement {
                router: router.clone(),
                origin: origin.clone(),
                seq,
            });
        };
        self.lsa.insert(
            origin.clone(),
            Lsa {
                seq,
                neighbors: neighbors.clone(),
            },
        );
        Ok(true)
    }

    /// Every address reachable from `source` through the stored
    /// advertisements, in discovery order.
    fn known_nodes(&self, source: &Address) -> Vec<Address> {
        let mut nodes = vec![source.clone()];
        let mut seen: BTreeSet<Address> = nodes.iter().cloned().collect();
        let mut queue: VecDeque<Address> = nodes.iter().cloned().collect();

        while let Some(node) = queue.pop_front() {
            if let Some(lsa) = self.lsa.get(&node) {
                for (neighbor, _) in &lsa.neighbors {
                    if seen.insert(neighbor.clone()) {
                        nodes.push(neighbor.clone());
                        queue.push_back(neighbor.clone());
                    }
                }
            }
        }
        nodes
    }

    /// Rebuild `routes`/`spcost` from scratch out of the database plus the
    /// router's current adjacencies.
    pub fn recompute(&mut self, router: &mut RouterState, ctx: &SimContext) {
        let own = router.live_adjacencies(ctx);
        self.lsa.insert(
            router.address().clone(),
            Lsa {
                seq: self.seq,
                neighbors: own,
            },
        );

        let nodes = self.known_nodes(router.address());
        let graph: Graph = nodes
            .iter()
            .map(|node| {
                let edges = self
                    .lsa
                    .get(node)
                    .map(|lsa| lsa.neighbors.clone())
                    .unwrap_or_default();
                (node.clone(), edges)
            })
            .collect();

        let paths = dijkstra::shortest_paths(&graph, router.address());
        let entries: Vec<(Address, LinkId, Cost)> = paths
            .into_iter()
            .filter_map(|(dest, path)| {
                let hop = path.first_hop?;
                let link = router.node.link_to(&hop, ctx)?;
                Some((dest, link, path.cost))
            })
            .collect();

        debug!(
            "{} recomputed {} routes over {} known nodes",
            router.address(),
            entries.len(),
            nodes.len()
        );
        router.table.replace(entries);
    }
}

impl RoutingProtocol for LinkState {
    fn advertise(&mut self, router: &mut RouterState, ctx: &mut SimContext, time: Tick) {
        self.seq += 1;
        let lsa = Payload::LinkState {
            seq: self.seq,
            neighbors: Some(router.live_adjacencies(ctx)),
        };
        router.broadcast(ctx, PacketKind::Advert, &lsa, time);
        self.clear_stale();
    }

    fn process_advertisement(
        &mut self,
        router: &mut RouterState,
        ctx: &mut SimContext,
        packet: PacketId,
        _link: LinkId,
        time: Tick,
    ) -> Result<(), SimError> {
        let origin = ctx.packet(packet).source().clone();
        let stored = match ctx.packet(packet).payload() {
            Payload::LinkState { seq, neighbors } => {
                self.accept(router.address(), &origin, *seq, neighbors.as_ref())?
            }
            other => {
                error!("Malformed LSA from {} at {}: {:?}", origin, router.address(), other);
                return Err(SimError::MalformedAdvertisement {
                    router: router.address().clone(),
                    origin,
                    seq: 0,
                });
            }
        };

        if stored {
            trace!("{} flooding LSA from {}", router.address(), origin);
            router.flood(ctx, packet, time);
        }
        Ok(())
    }

    fn link_failed(&mut self, router: &mut RouterState, link: LinkId) {
        // adjacencies come from link state, not HELLO liveness
        debug!("{} neighbor on {} timed out", router.address(), link);
    }

    fn on_tick(&mut self, router: &mut RouterState, ctx: &mut SimContext, time: Tick) {
        if router.timers.midpoint_due(time) {
            self.recompute(router, ctx);
        }
    }

    fn reset(&mut self) {
        self.lsa.clear();
        self.seq = 0;
    }
}
