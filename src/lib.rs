pub mod algorithms;
pub mod config;
pub mod context;
pub mod error;
pub mod link;
pub mod message;
pub mod network;
pub mod node;
pub mod protocol;
pub mod router;
pub mod types;
pub mod verify;

pub use config::{CostModel, SimConfig, Timers};
pub use context::{DropReason, SimContext, TrafficStats};
pub use error::{SimError, VerifyError};
pub use message::{Packet, PacketKind, Payload};
pub use network::{Network, NetworkStatus, Topology};
pub use protocol::{NextHop, ProtocolKind, RoutingProtocol};
pub use router::{Router, RouterSnapshot};
pub use types::{Address, Cost, LinkId, Location, MouseButton, NodeId, PacketId, Tick};
