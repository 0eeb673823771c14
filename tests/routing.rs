use rstest::rstest;

use routesim::algorithms::dijkstra;
use routesim::config::{CostModel, SimConfig};
use routesim::message::{PacketKind, Payload};
use routesim::network::{Network, Topology};
use routesim::protocol::distance_vector::INFINITY;
use routesim::protocol::{NextHop, ProtocolKind};
use routesim::verify;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn assert_float_eq(x: f64, y: f64, eps: f64) {
    assert!((x - y).abs() < eps, "Values do not match: {:.15} vs {:.15}", x, y);
}

fn unit_costs() -> SimConfig {
    SimConfig {
        cost_model: CostModel::Unit,
        ..SimConfig::default()
    }
}

fn line() -> Topology {
    Topology::new(
        &[("A", 0.0, 0.0), ("B", 1.0, 0.0), ("C", 2.0, 0.0)],
        &[("A", "B"), ("B", "C")],
    )
}

#[rstest]
fn tables_match_true_shortest_paths(
    #[values(ProtocolKind::DistanceVector, ProtocolKind::LinkState)] kind: ProtocolKind,
    #[values(CostModel::Euclidean, CostModel::Unit)] cost_model: CostModel,
) {
    init_logger();
    let config = SimConfig {
        cost_model,
        ..SimConfig::default()
    };
    let mut network = Network::build(&Topology::demo(), &config, kind).unwrap();
    network.step(100).unwrap();

    let graph = network.graph();
    for router in network.routers() {
        let truth = dijkstra::shortest_paths(&graph, router.address());
        assert_eq!(router.table().len(), truth.len(), "{} table size", router);

        for (destination, shortest) in &truth {
            let cost = router.cost(destination).unwrap();
            assert_float_eq(cost, shortest.cost, 1e-9);

            match router.route(destination).unwrap() {
                NextHop::Local => assert_eq!(destination, router.address()),
                NextHop::Link(id) => {
                    // the chosen neighbor lies on some shortest path
                    let link = network.link(id);
                    let peer = &link.peer(router.node().id()).address;
                    let rest = dijkstra::shortest_paths(&graph, peer)[destination].cost;
                    assert_float_eq(link.cost() + rest, shortest.cost, 1e-9);
                }
            }
        }
    }
}

#[rstest]
fn a_to_h_takes_three_intermediate_hops(
    #[values(ProtocolKind::DistanceVector, ProtocolKind::LinkState)] kind: ProtocolKind,
) {
    init_logger();
    let config = unit_costs();
    let mut network = Network::build(&Topology::demo(), &config, kind).unwrap();
    let packet = network.inject("A", "H", config.data_start).unwrap();
    verify::run_until_settled(&mut network, packet, config.sim_time).unwrap();

    let packet = network.packet(packet);
    assert!(packet.finish().is_some());
    assert_eq!(packet.intermediate_hops(), 3);
    let path = packet.path();
    assert_eq!(path.first().map(String::as_str), Some("A"));
    assert_eq!(path.last().map(String::as_str), Some("H"));
    assert_float_eq(verify::path_cost(&network, &path).unwrap(), 4.0, 1e-9);

    let delivery = verify::verify_pair(&Topology::demo(), &config, kind, "A", "H").unwrap();
    assert_eq!(delivery.intermediate_hops(), 3);
    assert_float_eq(delivery.cost, 4.0, 1e-9);
}

#[rstest]
fn every_pair_verifies_on_demo(
    #[values(ProtocolKind::DistanceVector, ProtocolKind::LinkState)] kind: ProtocolKind,
) {
    init_logger();
    let deliveries = verify::verify_routes(&Topology::demo(), &SimConfig::default(), kind).unwrap();
    assert_eq!(deliveries.len(), 8 * 7);
}

#[rstest]
fn reset_then_step_zero_is_fresh(
    #[values(ProtocolKind::DistanceVector, ProtocolKind::LinkState)] kind: ProtocolKind,
) {
    init_logger();
    let config = SimConfig::default();
    let fresh = Network::build(&Topology::demo(), &config, kind).unwrap();

    let mut network = Network::build(&Topology::demo(), &config, kind).unwrap();
    network.step(70).unwrap();
    network.reset();
    network.step(0).unwrap();

    assert_eq!(network.time(), 0);
    for router in network.routers() {
        assert_eq!(router.table().len(), 1);
        assert_eq!(router.route(router.address()), Some(NextHop::Local));
        assert_eq!(router.cost(router.address()), Some(0.0));
    }
    assert_eq!(
        serde_json::to_value(network.snapshot()).unwrap(),
        serde_json::to_value(fresh.snapshot()).unwrap()
    );
}

#[test]
fn link_state_flood_terminates() {
    init_logger();
    let topology = Topology::demo();
    // a single advertisement round at tick 0, recompute at 100
    let config = SimConfig {
        advert_interval: 200,
        ..SimConfig::default()
    };
    let mut network = Network::build(&topology, &config, ProtocolKind::LinkState).unwrap();
    network.step(199).unwrap();

    let links = topology.links.len();
    let nodes = topology.nodes.len();
    let adverts = network
        .context()
        .packets()
        .iter()
        .filter(|packet| packet.kind() == PacketKind::Advert)
        .count();
    // every router originates one LSA per incident link, then floods each
    // origin's LSA at most once over each incident link
    assert!(adverts >= 2 * links * nodes);
    assert!(adverts <= 2 * links * (nodes + 1));

    for packet in network.context().packets() {
        if let Payload::LinkState { seq, .. } = packet.payload() {
            assert_eq!(*seq, 1);
        }
    }
    for router in network.routers() {
        let ls = router.protocol().as_link_state().unwrap();
        assert_eq!(ls.database().len(), nodes, "{}", router);
        assert_eq!(router.table().len(), nodes);
    }
    assert_eq!(network.pending(), 0);
}

#[test]
fn distance_vector_forgets_broken_next_hop() {
    init_logger();
    let mut network = Network::build(&line(), &unit_costs(), ProtocolKind::DistanceVector).unwrap();
    network.step(20).unwrap();
    let bc = network.link_between("B", "C").unwrap();
    assert_eq!(network.router("B").unwrap().route("C"), Some(NextHop::Link(bc)));

    // C was last heard at tick 11; the HELLO at 20 goes nowhere
    network.set_link_broken("B", "C", true).unwrap();
    network.step(20).unwrap();
    assert_eq!(network.router("B").unwrap().route("C"), Some(NextHop::Link(bc)));

    network.step(1).unwrap();
    let b = network.router("B").unwrap();
    assert_eq!(b.route("C"), None);
    assert_eq!(b.cost("C"), None);
    assert_eq!(b.neighbors().len(), 1);
}

#[test]
fn distance_vector_costs_stay_below_infinity() {
    init_logger();
    let mut network = Network::build(&line(), &unit_costs(), ProtocolKind::DistanceVector).unwrap();
    network.step(20).unwrap();
    network.set_link_broken("B", "C", true).unwrap();

    // A keeps offering its stale route to C, so A and B count up
    for _ in 0..600 {
        network.step(1).unwrap();
        for router in network.routers() {
            for (destination, cost) in router.table().costs() {
                assert!(*cost < INFINITY, "{} cost to {} reached {}", router, destination, cost);
            }
        }
    }
    assert_eq!(network.router("A").unwrap().route("C"), None);
}

#[test]
fn lossy_runs_repeat_for_a_seed() {
    init_logger();
    let config = SimConfig {
        loss_prob: 0.3,
        seed: 7,
        ..SimConfig::default()
    };
    let run = || {
        let mut network = Network::build(&Topology::demo(), &config, ProtocolKind::LinkState).unwrap();
        network.step(200).unwrap();
        (network.stats(), serde_json::to_value(network.snapshot()).unwrap())
    };

    let (first_stats, first_tables) = run();
    let (second_stats, second_tables) = run();
    assert!(first_stats.lost > 0);
    assert_eq!(first_stats, second_stats);
    assert_eq!(first_tables, second_tables);
}

#[test]
fn no_route_drops_are_counted() {
    init_logger();
    let topology = Topology::new(&[("A", 0.0, 0.0), ("B", 1.0, 0.0), ("C", 5.0, 5.0)], &[("A", "B")]);
    let mut network = Network::build(&topology, &SimConfig::default(), ProtocolKind::DistanceVector).unwrap();
    let packet = network.inject("A", "C", 50).unwrap();
    network.step(60).unwrap();

    assert_eq!(network.stats().no_route, 1);
    assert!(!network.context().in_flight(packet));
    assert_eq!(network.router("C").unwrap().table().len(), 1);
}

#[test]
fn left_click_report_lists_routes() {
    init_logger();
    let mut network = Network::build(&line(), &SimConfig::default(), ProtocolKind::LinkState).unwrap();
    network.step(20).unwrap();
    let report = network.router("A").unwrap().report(network.context());
    assert!(report.starts_with("Router<A>"));
    assert!(report.contains("C: link(A<-->B) (1.0) pathcost 2.00"));
    assert!(report.contains("LSA:"));
}
