pub mod topology;

pub use topology::{LinkSpec, NodeSpec, Topology, TrafficSpec};

use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::algorithms::dijkstra::Graph;
use crate::config::{CostModel, SimConfig};
use crate::context::{SimContext, TrafficStats};
use crate::error::SimError;
use crate::link::{Endpoint, Link};
use crate::message::{Packet, PacketKind, Payload};
use crate::protocol::ProtocolKind;
use crate::router::{Router, RouterSnapshot};
use crate::types::{Address, LinkId, Location, MouseButton, NodeId, PacketId, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkStatus {
    pub time: Tick,
    pub pending: usize,
    pub total: u64,
}

/// A set of routers and the links between them, advanced tick by tick.
pub struct Network {
    config: SimConfig,
    kind: ProtocolKind,
    routers: Vec<Router>,
    addresses: BTreeMap<Address, NodeId>,
    ctx: SimContext,
    traffic: Vec<TrafficSpec>,
    time: Tick,
    pending: usize,
}

impl Network {
    /// Wire up one router per topology node, all running `kind`.
    pub fn build(topology: &Topology, config: &SimConfig, kind: ProtocolKind) -> Result<Self, SimError> {
        config.validate()?;
        topology.validate()?;

        let timers = config.timers();
        let mut routers = Vec::with_capacity(topology.nodes.len());
        let mut addresses = BTreeMap::new();
        for (i, spec) in topology.nodes.iter().enumerate() {
            let id = NodeId(i);
            routers.push(Router::new(id, spec.address.clone(), spec.location(), timers, kind));
            addresses.insert(spec.address.clone(), id);
        }

        let mut links = Vec::with_capacity(topology.links.len());
        for (i, LinkSpec(a, b)) in topology.links.iter().enumerate() {
            let id = LinkId(i);
            let end1 = Self::endpoint(&routers, &addresses, a)?;
            let end2 = Self::endpoint(&routers, &addresses, b)?;
            let link = match config.cost_model {
                CostModel::Euclidean => Link::euclidean(id, end1.clone(), end2.clone(), config.loss_prob),
                CostModel::Unit => Link::new(id, end1.clone(), end2.clone(), 1.0, config.loss_prob),
            };
            routers[end1.node.0].node_mut().add_link(id);
            routers[end2.node.0].node_mut().add_link(id);
            links.push(link);
        }

        info!(
            "Built {} network: {} routers, {} links",
            kind,
            routers.len(),
            links.len()
        );

        let mut network = Self {
            config: config.clone(),
            kind,
            routers,
            addresses,
            ctx: SimContext::new(links, config.seed),
            traffic: topology.traffic.clone(),
            time: 0,
            pending: 0,
        };
        network.reset();
        Ok(network)
    }

    fn endpoint(
        routers: &[Router],
        addresses: &BTreeMap<Address, NodeId>,
        address: &str,
    ) -> Result<Endpoint, SimError> {
        let id = *addresses
            .get(address)
            .ok_or_else(|| SimError::UnknownAddress(address.to_string()))?;
        Ok(Endpoint {
            node: id,
            address: address.to_string(),
            location: routers[id.0].node().location(),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn kind(&self) -> ProtocolKind {
        self.kind
    }

    pub fn time(&self) -> Tick {
        self.time
    }

    /// Packets queued on links or waiting in transmit queues after the
    /// last tick.
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn stats(&self) -> TrafficStats {
        self.ctx.stats()
    }

    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    pub fn routers(&self) -> &[Router] {
        &self.routers
    }

    pub fn router(&self, address: &str) -> Option<&Router> {
        self.addresses.get(address).map(|id| &self.routers[id.0])
    }

    pub fn links(&self) -> &[Link] {
        self.ctx.links()
    }

    pub fn link(&self, id: LinkId) -> &Link {
        self.ctx.link(id)
    }

    pub fn link_between(&self, a: &str, b: &str) -> Option<LinkId> {
        let router = self.router(a)?;
        router.node().link_to(b, &self.ctx)
    }

    pub fn packet(&self, id: PacketId) -> &Packet {
        self.ctx.packet(id)
    }

    /// Take a link down (losing whatever is queued on it) or bring it back.
    pub fn set_link_broken(&mut self, a: &str, b: &str, broken: bool) -> Result<(), SimError> {
        let link = self
            .link_between(a, b)
            .ok_or_else(|| SimError::UnknownAddress(format!("{}-{}", a, b)))?;
        self.ctx.link_mut(link).set_broken(broken);
        info!("{} now {}", self.ctx.link(link), if broken { "broken" } else { "up" });
        Ok(())
    }

    /// Clear all transient state, rewind the clock and inject the
    /// topology's traffic.
    pub fn reset(&mut self) {
        for router in &mut self.routers {
            router.reset();
        }
        self.ctx.reset();
        self.time = 0;

        let traffic = self.traffic.clone();
        for spec in traffic {
            match self.inject(&spec.source, &spec.destination, spec.start) {
                Ok(_) => info!("Created packet from {} to {}", spec.source, spec.destination),
                Err(e) => debug!("skipping traffic {:?}: {}", spec, e),
            }
        }
        self.pending = self.backlog();
    }

    /// Queue a DATA packet at `source` to leave at tick `start`.
    pub fn inject(&mut self, source: &str, destination: &str, start: Tick) -> Result<PacketId, SimError> {
        let src = *self
            .addresses
            .get(source)
            .ok_or_else(|| SimError::UnknownAddress(source.to_string()))?;
        if !self.addresses.contains_key(destination) {
            return Err(SimError::UnknownAddress(destination.to_string()));
        }
        let packet = self.ctx.make_packet(
            source.to_string(),
            destination.to_string(),
            PacketKind::Data,
            start,
            Payload::Empty,
        );
        self.routers[src.0].add_packet(packet, &self.ctx);
        Ok(packet)
    }

    /// Advance one tick. Every router pulls from its links before any
    /// router processes, so nothing sent this tick is seen before the next.
    pub fn tick(&mut self) -> Result<usize, SimError> {
        for router in &mut self.routers {
            router.phase1(&mut self.ctx);
        }
        for router in &mut self.routers {
            router.phase2(&mut self.ctx, self.time)?;
        }
        // later routers may have sent toward earlier ones, so count once all are done
        self.pending = self.backlog();
        self.time += 1;
        Ok(self.pending)
    }

    /// Everything queued on any link, either direction, plus every
    /// router's unsent packets.
    fn backlog(&self) -> usize {
        let queued: usize = self.ctx.links().iter().map(Link::backlog).sum();
        let unsent: usize = self
            .routers
            .iter()
            .map(|router| router.node().transmit_queue().len())
            .sum();
        queued + unsent
    }

    /// Advance `count` ticks; returns the pending count after the last.
    pub fn step(&mut self, count: Tick) -> Result<usize, SimError> {
        self.step_with(count, |_, _| {})
    }

    /// Like `step`, reporting `(tick, pending)` after every tick.
    pub fn step_with<F>(&mut self, count: Tick, mut observer: F) -> Result<usize, SimError>
    where
        F: FnMut(Tick, usize),
    {
        let stop_time = self.time + count;
        while self.time < stop_time {
            let tick = self.time;
            let pending = self.tick()?;
            observer(tick, pending);
        }
        Ok(self.pending)
    }

    /// Hit-test nodes, then links. A hit on a link toggles it.
    pub fn click(&mut self, pos: Location, button: MouseButton) -> bool {
        for router in &self.routers {
            if router.node().hit(pos) {
                router.on_click(button, &self.ctx);
                return true;
            }
        }
        let hit = self
            .ctx
            .links()
            .iter()
            .find(|link| link.nearby(pos, 0.1))
            .map(|link| link.id());
        if let Some(id) = hit {
            let broken = self.ctx.link_mut(id).toggle();
            info!("{} toggled {}", self.ctx.link(id), if broken { "down" } else { "up" });
            return true;
        }
        false
    }

    /// Status line of whatever is drawn under `pos`.
    pub fn describe(&self, pos: Location) -> Option<String> {
        for router in &self.routers {
            if let Some(msg) = router.node().nearby(pos, &self.ctx) {
                return Some(msg);
            }
        }
        self.ctx
            .links()
            .iter()
            .find_map(|link| link.queued_near(pos))
            .map(|packet| self.ctx.packet(packet).status())
    }

    pub fn status(&self) -> NetworkStatus {
        NetworkStatus {
            time: self.time,
            pending: self.pending,
            total: self.ctx.stats().created,
        }
    }

    /// The real topology over links that are currently up.
    pub fn graph(&self) -> Graph {
        let mut graph: Graph = self
            .routers
            .iter()
            .map(|router| (router.address().clone(), Vec::new()))
            .collect();
        for link in self.ctx.links().iter().filter(|link| !link.is_broken()) {
            let (a, b) = link.ends();
            if let Some(edges) = graph.get_mut(&a.address) {
                edges.push((b.address.clone(), link.cost()));
            }
            if let Some(edges) = graph.get_mut(&b.address) {
                edges.push((a.address.clone(), link.cost()));
            }
        }
        graph
    }

    pub fn snapshot(&self) -> Vec<RouterSnapshot> {
        self.routers.iter().map(|router| router.snapshot()).collect()
    }
}
