use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{Address, Cost, PacketId, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PacketKind {
    Hello,
    Advert,
    Data,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketKind::Hello => "HELLO",
            PacketKind::Advert => "ADVERT",
            PacketKind::Data => "DATA",
        };
        f.write_str(name)
    }
}

/// Protocol-specific content of a packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Empty,
    /// Destination -> best known cost, as seen by the sender.
    DistanceVector(BTreeMap<Address, Cost>),
    LinkState {
        seq: u64,
        neighbors: Option<Vec<(Address, Cost)>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    id: PacketId,
    source: Address,
    destination: Address,
    kind: PacketKind,
    start: Tick,
    finish: Option<Tick>,
    route: Vec<(Address, Tick)>,
    payload: Payload,
    properties: Map<String, Value>,
}

impl Packet {
    pub(crate) fn new(
        id: PacketId,
        source: Address,
        destination: Address,
        kind: PacketKind,
        start: Tick,
        payload: Payload,
    ) -> Self {
        let mut properties = Map::new();
        match kind {
            PacketKind::Hello => {
                properties.insert("color".into(), Value::from("green"));
            }
            PacketKind::Advert => {
                properties.insert("color".into(), Value::from("red"));
            }
            PacketKind::Data => {}
        }

        Self {
            id,
            source,
            destination,
            kind,
            start,
            finish: None,
            route: Vec::new(),
            payload,
            properties,
        }
    }

    /// Fresh copy for re-sending: same addresses, type, payload and
    /// properties, new start tick, empty trace.
    pub(crate) fn duplicate(&self, id: PacketId, start: Tick) -> Self {
        Self {
            id,
            source: self.source.clone(),
            destination: self.destination.clone(),
            kind: self.kind,
            start,
            finish: None,
            route: Vec::new(),
            payload: self.payload.clone(),
            properties: self.properties.clone(),
        }
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn source(&self) -> &Address {
        &self.source
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn start(&self) -> Tick {
        self.start
    }

    pub fn finish(&self) -> Option<Tick> {
        self.finish
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Nodes that forwarded this packet, in order, with the tick they did so.
    pub fn route(&self) -> &[(Address, Tick)] {
        &self.route
    }

    /// Forwarding trace followed by the destination, once delivered.
    pub fn path(&self) -> Vec<Address> {
        let mut path: Vec<Address> = self.route.iter().map(|(addr, _)| addr.clone()).collect();
        if self.finish.is_some() {
            path.push(self.destination.clone());
        }
        path
    }

    /// Number of routers between source and destination.
    pub fn intermediate_hops(&self) -> usize {
        self.route.len().saturating_sub(1)
    }

    pub(crate) fn add_hop(&mut self, address: Address, time: Tick) {
        self.route.push((address, time));
    }

    pub(crate) fn set_finish(&mut self, time: Tick) {
        self.finish = Some(time);
    }

    pub fn status(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packet<{} to {}> type {}", self.source, self.destination, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_resets_trace_and_start() {
        let mut original = Packet::new(
            PacketId(0),
            "A".into(),
            "B".into(),
            PacketKind::Advert,
            3,
            Payload::LinkState {
                seq: 4,
                neighbors: Some(vec![("B".into(), 1.0)]),
            },
        );
        original.add_hop("A".into(), 3);

        let copy = original.duplicate(PacketId(1), 7);
        assert_eq!(copy.id(), PacketId(1));
        assert_eq!(copy.start(), 7);
        assert!(copy.route().is_empty());
        assert_eq!(copy.payload(), original.payload());
        assert_eq!(copy.property("color"), Some(&Value::from("red")));
    }

    #[test]
    fn path_includes_destination_only_when_delivered() {
        let mut packet = Packet::new(PacketId(0), "A".into(), "C".into(), PacketKind::Data, 0, Payload::Empty);
        packet.add_hop("A".into(), 0);
        packet.add_hop("B".into(), 1);
        assert_eq!(packet.path(), vec!["A".to_string(), "B".to_string()]);

        packet.set_finish(2);
        assert_eq!(packet.path(), vec!["A".to_string(), "B".to_string(), "C".to_string()]);
        assert_eq!(packet.intermediate_hops(), 1);
        assert_eq!(packet.status(), "Packet<A to C> type DATA");
    }
}
