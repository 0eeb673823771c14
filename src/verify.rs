use log::{debug, info};
use serde::Serialize;

use crate::algorithms::dijkstra;
use crate::config::SimConfig;
use crate::error::{SimError, VerifyError};
use crate::network::{Network, Topology};
use crate::protocol::ProtocolKind;
use crate::types::{Address, Cost, PacketId, Tick};

/// Allowed difference between a delivered path's cost and the shortest one.
pub const COST_EPSILON: Cost = 1e-9;

/// A DATA packet that made it, and the route it took.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub source: Address,
    pub destination: Address,
    pub path: Vec<Address>,
    pub cost: Cost,
    pub finish: Tick,
}

impl Delivery {
    /// Routers strictly between source and destination.
    pub fn intermediate_hops(&self) -> usize {
        self.path.len().saturating_sub(2)
    }
}

/// Step until `packet` is delivered or dropped, or the clock reaches
/// `until`. Returns the number of ticks run.
pub fn run_until_settled(network: &mut Network, packet: PacketId, until: Tick) -> Result<Tick, SimError> {
    let begin = network.time();
    while network.context().in_flight(packet) && network.time() < until {
        network.tick()?;
    }
    Ok(network.time() - begin)
}

/// Cost of walking `path` over links that are currently up, or `None` if
/// two consecutive addresses are not joined by one.
pub fn path_cost(network: &Network, path: &[Address]) -> Option<Cost> {
    let mut cost = 0.0;
    for hop in path.windows(2) {
        let link = network.link_between(&hop[0], &hop[1])?;
        let link = network.link(link);
        if link.is_broken() {
            return None;
        }
        cost += link.cost();
    }
    Some(cost)
}

/// Run `network` until `packet` settles and check it arrived over a
/// shortest path of the current topology.
pub fn verify_delivery(network: &mut Network, packet: PacketId, until: Tick) -> Result<Delivery, VerifyError> {
    let ticks = run_until_settled(network, packet, until)?;

    let pkt = network.packet(packet);
    let src = pkt.source().clone();
    let dst = pkt.destination().clone();
    if let Some(reason) = network.context().drop_reason(packet) {
        return Err(VerifyError::Dropped {
            src,
            dst,
            reason: reason.to_string(),
        });
    }
    let Some(finish) = pkt.finish() else {
        return Err(VerifyError::NotDelivered { src, dst, ticks });
    };

    let path = pkt.path();
    let walks = path.first() == Some(&src) && path.last() == Some(&dst);
    let actual = match path_cost(network, &path) {
        Some(cost) if walks => cost,
        _ => return Err(VerifyError::InvalidPath { path }),
    };

    let expected = dijkstra::shortest_paths(&network.graph(), &src)
        .get(&dst)
        .map(|shortest| shortest.cost)
        .ok_or_else(|| VerifyError::Unreachable {
            src: src.clone(),
            dst: dst.clone(),
        })?;
    if (actual - expected).abs() > COST_EPSILON {
        return Err(VerifyError::SuboptimalPath { path, expected, actual });
    }

    Ok(Delivery {
        source: src,
        destination: dst,
        path,
        cost: actual,
        finish,
    })
}

/// Fresh network, one DATA packet from `source` to `destination` leaving
/// at `config.data_start`, checked against the true shortest path.
pub fn verify_pair(
    topology: &Topology,
    config: &SimConfig,
    kind: ProtocolKind,
    source: &str,
    destination: &str,
) -> Result<Delivery, VerifyError> {
    let mut topology = topology.clone();
    topology.traffic.clear();
    let mut network = Network::build(&topology, config, kind)?;

    if !dijkstra::shortest_paths(&network.graph(), source).contains_key(destination) {
        return Err(VerifyError::Unreachable {
            src: source.to_string(),
            dst: destination.to_string(),
        });
    }

    let packet = network.inject(source, destination, config.data_start)?;
    let delivery = verify_delivery(&mut network, packet, config.sim_time)?;
    debug!(
        "{} -> {} via {:?} cost {:.3} at tick {}",
        source, destination, delivery.path, delivery.cost, delivery.finish
    );
    Ok(delivery)
}

/// `verify_pair` for every ordered pair of distinct addresses that are
/// connected in the topology. Stops at the first failure.
pub fn verify_routes(topology: &Topology, config: &SimConfig, kind: ProtocolKind) -> Result<Vec<Delivery>, VerifyError> {
    topology.validate()?;
    let graph = dijkstra::undirected(
        topology
            .links
            .iter()
            .map(|link| (link.0.as_str(), link.1.as_str(), 1.0)),
    );

    let mut deliveries = Vec::new();
    for source in topology.addresses() {
        let reachable = dijkstra::shortest_paths(&graph, source);
        for destination in topology.addresses() {
            if source == destination {
                continue;
            }
            if !reachable.contains_key(destination) {
                debug!("skipping {} -> {}: not connected", source, destination);
                continue;
            }
            deliveries.push(verify_pair(topology, config, kind, source, destination)?);
        }
    }
    info!("{}: verified {} routes", kind, deliveries.len());
    Ok(deliveries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CostModel;

    fn line() -> Topology {
        Topology::new(
            &[("A", 0.0, 0.0), ("B", 1.0, 0.0), ("C", 2.0, 0.0)],
            &[("A", "B"), ("B", "C")],
        )
    }

    #[test]
    fn line_delivers_through_middle() {
        // clear of HELLO and advert ticks so the DATA packet heads its queues
        let config = SimConfig {
            data_start: 105,
            ..SimConfig::default()
        };
        let delivery = verify_pair(&line(), &config, ProtocolKind::DistanceVector, "A", "C").unwrap();
        assert_eq!(delivery.path, vec!["A", "B", "C"]);
        assert_eq!(delivery.intermediate_hops(), 1);
        assert!((delivery.cost - 2.0).abs() < COST_EPSILON);
        // one tick per hop from the injection tick
        assert_eq!(delivery.finish, config.data_start + 2);
    }

    #[test]
    fn disconnected_pair_is_unreachable() {
        let topology = Topology::new(&[("A", 0.0, 0.0), ("B", 1.0, 0.0), ("C", 5.0, 5.0)], &[("A", "B")]);
        let err = verify_pair(&topology, &SimConfig::default(), ProtocolKind::LinkState, "A", "C").unwrap_err();
        assert!(matches!(err, VerifyError::Unreachable { .. }));

        // the connected pairs still verify
        let deliveries = verify_routes(&topology, &SimConfig::default(), ProtocolKind::LinkState).unwrap();
        assert_eq!(deliveries.len(), 2);
    }

    #[test]
    fn packet_before_convergence_is_dropped() {
        let config = SimConfig {
            data_start: 0,
            cost_model: CostModel::Unit,
            ..SimConfig::default()
        };
        let err = verify_pair(&line(), &config, ProtocolKind::DistanceVector, "A", "C").unwrap_err();
        assert!(matches!(err, VerifyError::Dropped { .. }));
    }

    #[test]
    fn path_cost_requires_live_links() {
        let mut network = Network::build(&line(), &SimConfig::default(), ProtocolKind::DistanceVector).unwrap();
        let path: Vec<Address> = vec!["A".into(), "B".into(), "C".into()];
        assert_eq!(path_cost(&network, &path), Some(2.0));
        assert_eq!(path_cost(&network, &["A".to_string(), "C".to_string()]), None);

        network.set_link_broken("B", "C", true).unwrap();
        assert_eq!(path_cost(&network, &path), None);
    }
}
