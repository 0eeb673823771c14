use log::trace;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::link::{Link, SendOutcome};
use crate::message::{Packet, PacketKind, Payload};
use crate::types::{Address, LinkId, NodeId, PacketId, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DropReason {
    NoRoute,
    Lost,
    LinkDown,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DropReason::NoRoute => "no route",
            DropReason::Lost => "lost on link",
            DropReason::LinkDown => "link down",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficStats {
    pub created: u64,
    pub delivered: u64,
    pub no_route: u64,
    pub lost: u64,
    pub link_down: u64,
}

/// Medium shared by all nodes of one network: the links, the packet arena
/// and the seeded generator used by lossy links. Nodes only touch it
/// through `&mut` during their own phase.
pub struct SimContext {
    links: Vec<Link>,
    packets: Vec<Packet>,
    drops: BTreeMap<PacketId, DropReason>,
    rng: Pcg64,
    seed: u64,
    stats: TrafficStats,
}

impl SimContext {
    pub fn new(links: Vec<Link>, seed: u64) -> Self {
        Self {
            links,
            packets: Vec::new(),
            drops: BTreeMap::new(),
            rng: Pcg64::seed_from_u64(seed),
            seed,
            stats: TrafficStats::default(),
        }
    }

    /// Forget every packet and restart the generator.
    pub fn reset(&mut self) {
        for link in &mut self.links {
            link.reset();
        }
        self.packets.clear();
        self.drops.clear();
        self.rng = Pcg64::seed_from_u64(self.seed);
        self.stats = TrafficStats::default();
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// # Panics
    ///
    /// If `id` was not issued by this context.
    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    pub fn get_link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    pub(crate) fn link_mut(&mut self, id: LinkId) -> &mut Link {
        &mut self.links[id.0]
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// # Panics
    ///
    /// If `id` was not issued by this context since the last reset.
    pub fn packet(&self, id: PacketId) -> &Packet {
        &self.packets[id.0]
    }

    pub fn get_packet(&self, id: PacketId) -> Option<&Packet> {
        self.packets.get(id.0)
    }

    pub fn stats(&self) -> TrafficStats {
        self.stats
    }

    pub fn drop_reason(&self, id: PacketId) -> Option<DropReason> {
        self.drops.get(&id).copied()
    }

    /// Neither delivered nor dropped yet.
    pub fn in_flight(&self, id: PacketId) -> bool {
        self.packet(id).finish().is_none() && !self.drops.contains_key(&id)
    }

    pub fn make_packet(
        &mut self,
        source: Address,
        destination: Address,
        kind: PacketKind,
        start: Tick,
        payload: Payload,
    ) -> PacketId {
        let id = PacketId(self.packets.len());
        self.packets
            .push(Packet::new(id, source, destination, kind, start, payload));
        self.stats.created += 1;
        id
    }

    pub fn duplicate_packet(&mut self, original: PacketId, now: Tick) -> PacketId {
        let id = PacketId(self.packets.len());
        let copy = self.packets[original.0].duplicate(id, now);
        self.packets.push(copy);
        self.stats.created += 1;
        id
    }

    pub fn send(&mut self, link: LinkId, from: NodeId, packet: PacketId) -> SendOutcome {
        let outcome = self.links[link.0].send(from, packet, &mut self.rng);
        match outcome {
            SendOutcome::Queued => trace!("{} queued {} on {}", from.0, self.packets[packet.0], link),
            SendOutcome::Lost => self.drop_packet(packet, DropReason::Lost),
            SendOutcome::LinkDown => self.drop_packet(packet, DropReason::LinkDown),
        }
        outcome
    }

    pub fn receive(&mut self, link: LinkId, at: NodeId) -> Option<PacketId> {
        self.links[link.0].receive(at)
    }

    pub(crate) fn add_hop(&mut self, packet: PacketId, address: Address, time: Tick) {
        self.packets[packet.0].add_hop(address, time);
    }

    pub(crate) fn deliver(&mut self, packet: PacketId, time: Tick) {
        self.packets[packet.0].set_finish(time);
        self.stats.delivered += 1;
    }

    pub(crate) fn drop_packet(&mut self, packet: PacketId, reason: DropReason) {
        match reason {
            DropReason::NoRoute => self.stats.no_route += 1,
            DropReason::Lost => self.stats.lost += 1,
            DropReason::LinkDown => self.stats.link_down += 1,
        }
        self.drops.insert(packet, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Endpoint;
    use crate::types::Location;

    fn context() -> SimContext {
        let end = |node: usize, address: &str, x: f64| Endpoint {
            node: NodeId(node),
            address: address.into(),
            location: Location::new(x, 0.0),
        };
        SimContext::new(vec![Link::euclidean(LinkId(0), end(0, "A", 0.0), end(1, "B", 1.0), 0.0)], 3)
    }

    #[test]
    fn unknown_ids_are_none() {
        let mut ctx = context();
        let packet = ctx.make_packet("A".into(), "B".into(), PacketKind::Data, 0, Payload::Empty);

        assert!(ctx.get_link(LinkId(0)).is_some());
        assert!(ctx.get_link(LinkId(1)).is_none());
        assert_eq!(ctx.get_packet(packet).map(|p| p.kind()), Some(PacketKind::Data));
        assert!(ctx.get_packet(PacketId(1)).is_none());

        ctx.reset();
        assert!(ctx.get_packet(packet).is_none());
    }

    #[test]
    fn drops_are_tallied_by_reason() {
        let mut ctx = context();
        let packet = ctx.make_packet("A".into(), "B".into(), PacketKind::Data, 0, Payload::Empty);
        assert!(ctx.in_flight(packet));

        ctx.drop_packet(packet, DropReason::NoRoute);
        assert!(!ctx.in_flight(packet));
        assert_eq!(ctx.drop_reason(packet), Some(DropReason::NoRoute));
        assert_eq!(ctx.stats().no_route, 1);
        assert_eq!(ctx.stats().created, 1);
    }
}
