use log::{debug, info, trace, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write};

use crate::config::Timers;
use crate::context::{DropReason, SimContext};
use crate::error::SimError;
use crate::message::{PacketKind, Payload};
use crate::node::Node;
use crate::protocol::{Neighbor, NeighborTable, NextHop, Protocol, ProtocolKind, RoutingTable};
use crate::types::{Address, Cost, LinkId, Location, MouseButton, NodeId, PacketId, Tick};

/// Everything a router owns apart from its protocol, handed to the protocol
/// hooks.
#[derive(Debug, Clone)]
pub struct RouterState {
    pub node: Node,
    pub neighbors: NeighborTable,
    pub table: RoutingTable,
    pub timers: Timers,
}

impl RouterState {
    pub fn new(node: Node, timers: Timers) -> Self {
        let table = RoutingTable::new(node.address().clone());
        Self {
            node,
            neighbors: NeighborTable::new(timers.dead_interval()),
            table,
            timers,
        }
    }

    pub fn address(&self) -> &Address {
        self.node.address()
    }

    /// Send a freshly made packet of `kind` on every incident link, each
    /// addressed to the peer on that link.
    pub fn broadcast(&self, ctx: &mut SimContext, kind: PacketKind, payload: &Payload, time: Tick) {
        for &link in self.node.links() {
            let peer = self.node.peer(link, ctx);
            let packet = ctx.make_packet(self.address().clone(), peer, kind, time, payload.clone());
            ctx.send(link, self.node.id(), packet);
        }
    }

    /// Send a copy of `packet` on every incident link.
    pub fn flood(&self, ctx: &mut SimContext, packet: PacketId, time: Tick) {
        for &link in self.node.links() {
            let copy = ctx.duplicate_packet(packet, time);
            ctx.send(link, self.node.id(), copy);
        }
    }

    fn send_hello(&self, ctx: &mut SimContext, time: Tick) {
        self.broadcast(ctx, PacketKind::Hello, &Payload::Empty, time);
    }

    fn forward(&mut self, packet: PacketId, ctx: &mut SimContext) {
        let destination = ctx.packet(packet).destination().clone();
        match self.table.route(&destination) {
            Some(NextHop::Link(link)) => {
                trace!("{} forwarding {} on {}", self.address(), ctx.packet(packet), link);
                ctx.send(link, self.node.id(), packet);
            }
            _ => {
                warn!("No route for {} at node {}", ctx.packet(packet), self.address());
                ctx.drop_packet(packet, DropReason::NoRoute);
            }
        }
    }

    /// Deliver locally or record the hop and pass it on.
    fn deliver_or_forward(&mut self, packet: PacketId, ctx: &mut SimContext, time: Tick) {
        if ctx.packet(packet).destination() == self.address() {
            debug!("{} delivered {} at {}", self.address(), ctx.packet(packet), time);
            self.node.accept(packet, time, ctx);
        } else {
            ctx.add_hop(packet, self.address().clone(), time);
            self.forward(packet, ctx);
        }
    }

    /// Current (peer, cost) pairs over links that are not broken.
    pub fn live_adjacencies(&self, ctx: &SimContext) -> Vec<(Address, Cost)> {
        self.node
            .links()
            .iter()
            .map(|&link| ctx.link(link))
            .filter(|link| !link.is_broken())
            .map(|link| (link.peer(self.node.id()).address.clone(), link.cost()))
            .collect()
    }
}

/// A node that learns routes through a pluggable protocol and tracks its
/// neighbors with HELLO packets.
#[derive(Debug, Clone)]
pub struct Router {
    state: RouterState,
    protocol: Protocol,
}

impl Router {
    pub fn new(id: NodeId, address: Address, location: Location, timers: Timers, kind: ProtocolKind) -> Self {
        Self {
            state: RouterState::new(Node::new(id, address, location), timers),
            protocol: Protocol::new(kind),
        }
    }

    pub fn state(&self) -> &RouterState {
        &self.state
    }

    pub fn node(&self) -> &Node {
        &self.state.node
    }

    pub(crate) fn node_mut(&mut self) -> &mut Node {
        &mut self.state.node
    }

    pub fn address(&self) -> &Address {
        self.state.address()
    }

    pub fn table(&self) -> &RoutingTable {
        &self.state.table
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.state.neighbors
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn kind(&self) -> ProtocolKind {
        self.protocol.kind()
    }

    pub fn route(&self, destination: &str) -> Option<NextHop> {
        self.state.table.route(destination)
    }

    pub fn cost(&self, destination: &str) -> Option<Cost> {
        self.state.table.cost(destination)
    }

    /// Back to the state of a freshly constructed router.
    pub fn reset(&mut self) {
        self.state.node.reset();
        self.state.neighbors.clear();
        self.state.table.reset();
        self.protocol.hooks().reset();
    }

    pub fn phase1(&mut self, ctx: &mut SimContext) {
        self.state.node.phase1(ctx);
    }

    /// Handle this tick's arrivals, run timers, flush due packets.
    pub fn phase2(&mut self, ctx: &mut SimContext, time: Tick) -> Result<(), SimError> {
        for (link, packet) in self.state.node.take_arrivals() {
            self.process(packet, Some(link), ctx, time)?;
        }
        self.transmit(ctx, time)?;
        self.state.node.record_backlog(ctx);
        Ok(())
    }

    fn process(
        &mut self,
        packet: PacketId,
        link: Option<LinkId>,
        ctx: &mut SimContext,
        time: Tick,
    ) -> Result<(), SimError> {
        match (ctx.packet(packet).kind(), link) {
            (PacketKind::Hello, Some(link)) => {
                let source = ctx.packet(packet).source().clone();
                let cost = ctx.link(link).cost();
                self.state.neighbors.refresh(link, source, cost, time);
                Ok(())
            }
            (PacketKind::Advert, Some(link)) => {
                self.protocol
                    .hooks()
                    .process_advertisement(&mut self.state, ctx, packet, link, time)
            }
            _ => {
                self.state.deliver_or_forward(packet, ctx, time);
                Ok(())
            }
        }
    }

    fn transmit(&mut self, ctx: &mut SimContext, time: Tick) -> Result<(), SimError> {
        let timers = self.state.timers;
        if timers.hello_due(time) {
            self.state.send_hello(ctx, time);
            for link in self.state.neighbors.check_dead_neighbors(time) {
                self.protocol.hooks().link_failed(&mut self.state, link);
            }
        }
        if timers.advert_due(time) {
            self.protocol.hooks().advertise(&mut self.state, ctx, time);
        }
        for packet in self.state.node.take_due(time, ctx) {
            trace!("Transmitting {} at node {}", ctx.packet(packet), self.address());
            self.process(packet, None, ctx, time)?;
        }
        self.protocol.hooks().on_tick(&mut self.state, ctx, time);
        Ok(())
    }

    pub fn add_packet(&mut self, packet: PacketId, ctx: &SimContext) {
        self.state.node.add_packet(packet, ctx);
    }

    pub fn on_click(&self, button: MouseButton, ctx: &SimContext) {
        if button == MouseButton::Left {
            info!("{}", self.report(ctx));
        }
    }

    /// Neighbors, routes and (for link-state) the LSA database, as text.
    pub fn report(&self, ctx: &SimContext) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "{}", self);

        let neighbors: Vec<String> = self
            .state
            .neighbors
            .iter()
            .map(|(_, n)| format!("({}, {}, {:.2})", n.last_heard, n.peer, n.cost))
            .collect();
        let _ = writeln!(output, "  neighbors: [{}]", neighbors.join(", "));

        let _ = writeln!(output, "  routes:");
        for (destination, hop) in self.state.table.routes() {
            let via = match hop {
                NextHop::Local => "Self".to_string(),
                NextHop::Link(link) => ctx.link(*link).to_string(),
            };
            let cost = self.state.table.cost(destination).unwrap_or(Cost::INFINITY);
            let _ = writeln!(output, "    {}: {} pathcost {:.2}", destination, via, cost);
        }

        if let Some(ls) = self.protocol.as_link_state() {
            let _ = writeln!(output, "  LSA:");
            for (origin, lsa) in ls.database() {
                let _ = writeln!(output, "    {}: {} {:?}", origin, lsa.seq, lsa.neighbors);
            }
        }
        output
    }

    pub fn status(&self) -> String {
        self.to_string()
    }

    pub fn snapshot(&self) -> RouterSnapshot {
        RouterSnapshot {
            address: self.address().clone(),
            protocol: self.kind(),
            routes: self.state.table.routes().clone(),
            costs: self.state.table.costs().clone(),
            neighbors: self
                .state
                .neighbors
                .iter()
                .map(|(link, n)| (link.0, n.clone()))
                .collect(),
            lsa: self
                .protocol
                .as_link_state()
                .map(|ls| ls.database().clone()),
        }
    }
}

impl fmt::Display for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Router<{}>", self.address())
    }
}

/// Serialisable view of one router's tables.
#[derive(Debug, Clone, Serialize)]
pub struct RouterSnapshot {
    pub address: Address,
    pub protocol: ProtocolKind,
    pub routes: BTreeMap<Address, NextHop>,
    pub costs: BTreeMap<Address, Cost>,
    pub neighbors: BTreeMap<usize, Neighbor>,
    pub lsa: Option<BTreeMap<Address, crate::protocol::Lsa>>,
}
