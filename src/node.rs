use serde_json::{Map, Value};
use std::fmt;

use crate::context::SimContext;
use crate::types::{Address, LinkId, Location, NodeId, PacketId, Tick};

/// State every simulation participant has, independent of routing.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    address: Address,
    location: Location,
    links: Vec<LinkId>,
    // filled in phase 1, drained in phase 2
    arrivals: Vec<(LinkId, PacketId)>,
    // ordered by start tick
    transmit_queue: Vec<PacketId>,
    receive_queue: Vec<PacketId>,
    queue_length_sum: usize,
    queue_length_max: usize,
    properties: Map<String, Value>,
}

impl Node {
    pub fn new(id: NodeId, address: Address, location: Location) -> Self {
        Self {
            id,
            address,
            location,
            links: Vec::new(),
            arrivals: Vec::new(),
            transmit_queue: Vec::new(),
            receive_queue: Vec::new(),
            queue_length_sum: 0,
            queue_length_max: 0,
            properties: Map::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn transmit_queue(&self) -> &[PacketId] {
        &self.transmit_queue
    }

    pub fn received(&self) -> &[PacketId] {
        &self.receive_queue
    }

    pub fn queue_length_sum(&self) -> usize {
        self.queue_length_sum
    }

    pub fn queue_length_max(&self) -> usize {
        self.queue_length_max
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn set_property(&mut self, key: &str, value: Value) {
        self.properties.insert(key.to_string(), value);
    }

    pub(crate) fn add_link(&mut self, link: LinkId) {
        self.links.push(link);
    }

    pub fn reset(&mut self) {
        self.arrivals.clear();
        self.transmit_queue.clear();
        self.receive_queue.clear();
        self.queue_length_sum = 0;
        self.queue_length_max = 0;
        self.properties.clear();
    }

    /// Address on the other end of `link`.
    pub fn peer(&self, link: LinkId, ctx: &SimContext) -> Address {
        ctx.link(link).peer(self.id).address.clone()
    }

    /// Incident link whose other end is `neighbor`.
    pub fn link_to(&self, neighbor: &str, ctx: &SimContext) -> Option<LinkId> {
        if self.address == neighbor {
            return None;
        }
        self.links
            .iter()
            .copied()
            .find(|&link| ctx.link(link).peer(self.id).address == neighbor)
    }

    /// Schedule a locally originated packet, keeping start order stable.
    pub fn add_packet(&mut self, packet: PacketId, ctx: &SimContext) {
        let start = ctx.packet(packet).start();
        let index = self
            .transmit_queue
            .iter()
            .position(|&queued| start < ctx.packet(queued).start())
            .unwrap_or(self.transmit_queue.len());
        self.transmit_queue.insert(index, packet);
    }

    /// Phase 1: take at most one packet from every incident link.
    pub fn phase1(&mut self, ctx: &mut SimContext) {
        for &link in &self.links {
            if let Some(packet) = ctx.receive(link, self.id) {
                self.arrivals.push((link, packet));
            }
        }
    }

    pub(crate) fn take_arrivals(&mut self) -> Vec<(LinkId, PacketId)> {
        std::mem::take(&mut self.arrivals)
    }

    /// Locally queued packets whose start tick has arrived.
    pub(crate) fn take_due(&mut self, time: Tick, ctx: &SimContext) -> Vec<PacketId> {
        let due = self
            .transmit_queue
            .iter()
            .take_while(|&&packet| ctx.packet(packet).start() <= time)
            .count();
        self.transmit_queue.drain(..due).collect()
    }

    pub(crate) fn accept(&mut self, packet: PacketId, time: Tick, ctx: &mut SimContext) {
        ctx.deliver(packet, time);
        self.receive_queue.push(packet);
    }

    /// Fold this tick's inbound backlog into the queue-length stats.
    pub(crate) fn record_backlog(&mut self, ctx: &SimContext) -> usize {
        let inbound: usize = self
            .links
            .iter()
            .map(|&link| ctx.link(link).queue_length(self.id))
            .sum();
        self.queue_length_sum += inbound;
        self.queue_length_max = self.queue_length_max.max(inbound);
        inbound
    }

    /// Hit box of the node itself.
    pub fn hit(&self, pos: Location) -> bool {
        (self.location.x - pos.x).abs() < 0.1 && (self.location.y - pos.y).abs() < 0.1
    }

    /// Status of whatever is drawn near `pos`: the node, or the head of
    /// its unsent queue just beside it.
    pub fn nearby(&self, pos: Location, ctx: &SimContext) -> Option<String> {
        let dx = (self.location.x - pos.x).abs();
        let dy = (self.location.y - pos.y).abs();
        if dx < 0.1 && dy < 0.1 {
            return Some(self.status());
        }
        if let Some(&head) = self.transmit_queue.first() {
            if dx > 0.1 && dx < 0.2 && dy > 0.1 && dy < 0.2 {
                return Some(format!("Unsent {}", ctx.packet(head).status()));
            }
        }
        None
    }

    pub fn status(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node<{}>", self.address)
    }
}
