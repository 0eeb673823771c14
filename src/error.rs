use thiserror::Error;

use crate::types::{Address, Cost, Tick};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("malformed link-state advertisement at {router}: origin {origin} seq {seq} carries no neighbor list")]
    MalformedAdvertisement {
        router: Address,
        origin: Address,
        seq: u64,
    },

    #[error("duplicate node address {0}")]
    DuplicateAddress(Address),

    #[error("two nodes placed at ({x}, {y})")]
    DuplicateLocation { x: f64, y: f64 },

    #[error("unknown node address {0}")]
    UnknownAddress(Address),

    #[error("link from {0} to itself")]
    SelfLoop(Address),

    #[error("duplicate link between {0} and {1}")]
    DuplicateLink(Address, Address),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("{dst} is unreachable from {src} in the topology")]
    Unreachable {
        src: Address,
        dst: Address,
    },

    #[error("packet {src} -> {dst} not delivered after {ticks} ticks")]
    NotDelivered {
        src: Address,
        dst: Address,
        ticks: Tick,
    },

    #[error("packet {src} -> {dst} dropped: {reason}")]
    Dropped {
        src: Address,
        dst: Address,
        reason: String,
    },

    #[error("path {path:?} is not a walk over live links")]
    InvalidPath { path: Vec<Address> },

    #[error("path {path:?} costs {actual}, shortest is {expected}")]
    SuboptimalPath {
        path: Vec<Address>,
        expected: Cost,
        actual: Cost,
    },

    #[error(transparent)]
    Sim(#[from] SimError),
}
