pub mod distance_vector;
pub mod link_state;
pub mod neighbor;
pub mod routing_table;

pub use distance_vector::DistanceVector;
pub use link_state::{LinkState, Lsa};
pub use neighbor::{Neighbor, NeighborTable};
pub use routing_table::{NextHop, RoutingTable};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::context::SimContext;
use crate::error::SimError;
use crate::router::RouterState;
use crate::types::{LinkId, PacketId, Tick};

/// Hooks a routing protocol plugs into the router's timers and packet
/// dispatch. The router owns neighbor liveness and forwarding; the protocol
/// owns how `routes`/`spcost` get filled.
pub trait RoutingProtocol {
    /// Advertisement timer fired.
    fn advertise(&mut self, router: &mut RouterState, ctx: &mut SimContext, time: Tick);

    /// An ADVERT packet arrived on `link`.
    fn process_advertisement(
        &mut self,
        router: &mut RouterState,
        ctx: &mut SimContext,
        packet: PacketId,
        link: LinkId,
        time: Tick,
    ) -> Result<(), SimError>;

    /// The neighbor on `link` stopped saying HELLO.
    fn link_failed(&mut self, router: &mut RouterState, link: LinkId);

    /// Runs every tick after the router's own timers and transmissions.
    fn on_tick(&mut self, _router: &mut RouterState, _ctx: &mut SimContext, _time: Tick) {}

    /// Drop protocol state back to what a fresh router has.
    fn reset(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolKind {
    #[serde(rename = "dv")]
    DistanceVector,
    #[serde(rename = "ls")]
    LinkState,
}

impl FromStr for ProtocolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dv" | "distance-vector" => Ok(ProtocolKind::DistanceVector),
            "ls" | "link-state" => Ok(ProtocolKind::LinkState),
            other => Err(format!("unknown algorithm {} (expected dv or ls)", other)),
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolKind::DistanceVector => f.write_str("dv"),
            ProtocolKind::LinkState => f.write_str("ls"),
        }
    }
}

/// Protocol selected per router at construction.
#[derive(Debug, Clone)]
pub enum Protocol {
    DistanceVector(DistanceVector),
    LinkState(LinkState),
}

impl Protocol {
    pub fn new(kind: ProtocolKind) -> Self {
        match kind {
            ProtocolKind::DistanceVector => Protocol::DistanceVector(DistanceVector::default()),
            ProtocolKind::LinkState => Protocol::LinkState(LinkState::default()),
        }
    }

    pub fn kind(&self) -> ProtocolKind {
        match self {
            Protocol::DistanceVector(_) => ProtocolKind::DistanceVector,
            Protocol::LinkState(_) => ProtocolKind::LinkState,
        }
    }

    pub fn as_link_state(&self) -> Option<&LinkState> {
        match self {
            Protocol::LinkState(ls) => Some(ls),
            Protocol::DistanceVector(_) => None,
        }
    }

    pub(crate) fn hooks(&mut self) -> &mut dyn RoutingProtocol {
        match self {
            Protocol::DistanceVector(dv) => dv,
            Protocol::LinkState(ls) => ls,
        }
    }
}
