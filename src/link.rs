use rand::Rng;
use std::collections::VecDeque;
use std::fmt;

use crate::types::{Address, Cost, LinkId, Location, NodeId, PacketId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    Lost,
    LinkDown,
}

/// Bidirectional channel with one FIFO per direction.
#[derive(Debug, Clone)]
pub struct Link {
    id: LinkId,
    end1: Endpoint,
    end2: Endpoint,
    cost: Cost,
    cost_repr: String,
    loss_prob: f64,
    // end1 -> end2
    q12: VecDeque<PacketId>,
    // end2 -> end1
    q21: VecDeque<PacketId>,
    broken: bool,
    lost: u64,
    dropped_down: u64,
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub node: NodeId,
    pub address: Address,
    pub location: Location,
}

impl Link {
    pub fn new(id: LinkId, end1: Endpoint, end2: Endpoint, cost: Cost, loss_prob: f64) -> Self {
        Self {
            id,
            end1,
            end2,
            cost,
            cost_repr: format_cost(cost),
            loss_prob,
            q12: VecDeque::new(),
            q21: VecDeque::new(),
            broken: false,
            lost: 0,
            dropped_down: 0,
        }
    }

    /// Cost equal to the distance between the endpoints.
    pub fn euclidean(id: LinkId, end1: Endpoint, end2: Endpoint, loss_prob: f64) -> Self {
        let dx2 = (end1.location.x - end2.location.x).powi(2);
        let dy2 = (end1.location.y - end2.location.y).powi(2);
        let cost = end1.location.distance(&end2.location);
        let mut link = Self::new(id, end1, end2, cost, loss_prob);
        if cost.fract() != 0.0 {
            link.cost_repr = format!("sqrt({})", format_cost(dx2 + dy2));
        }
        link
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn cost_repr(&self) -> &str {
        &self.cost_repr
    }

    pub fn loss_prob(&self) -> f64 {
        self.loss_prob
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn lost(&self) -> u64 {
        self.lost
    }

    pub fn dropped_while_down(&self) -> u64 {
        self.dropped_down
    }

    pub fn ends(&self) -> (&Endpoint, &Endpoint) {
        (&self.end1, &self.end2)
    }

    pub fn connects(&self, node: NodeId) -> bool {
        self.end1.node == node || self.end2.node == node
    }

    /// The endpoint opposite to `node`.
    pub fn peer(&self, node: NodeId) -> &Endpoint {
        debug_assert!(self.connects(node), "{:?} is not an end of {}", node, self.id);
        if self.end1.node == node { &self.end2 } else { &self.end1 }
    }

    /// Queue `packet` in the direction away from `from`. Broken links and
    /// lossy draws drop the packet without enqueueing it.
    pub fn send<R: Rng>(&mut self, from: NodeId, packet: PacketId, rng: &mut R) -> SendOutcome {
        if self.broken {
            self.dropped_down += 1;
            return SendOutcome::LinkDown;
        }
        // lossless links never touch the generator
        if self.loss_prob > 0.0 && rng.gen_bool(self.loss_prob) {
            self.lost += 1;
            return SendOutcome::Lost;
        }
        if from == self.end1.node {
            self.q12.push_back(packet);
        } else {
            debug_assert_eq!(from, self.end2.node);
            self.q21.push_back(packet);
        }
        SendOutcome::Queued
    }

    /// Oldest packet queued toward `at`.
    pub fn receive(&mut self, at: NodeId) -> Option<PacketId> {
        debug_assert!(self.connects(at), "{:?} is not an end of {}", at, self.id);
        if at == self.end1.node {
            self.q21.pop_front()
        } else {
            self.q12.pop_front()
        }
    }

    /// Backlog directed toward `at`.
    pub fn queue_length(&self, at: NodeId) -> usize {
        debug_assert!(self.connects(at), "{:?} is not an end of {}", at, self.id);
        if at == self.end1.node { self.q21.len() } else { self.q12.len() }
    }

    /// Packets queued in both directions.
    pub fn backlog(&self) -> usize {
        self.q12.len() + self.q21.len()
    }

    pub fn reset(&mut self) {
        self.q12.clear();
        self.q21.clear();
    }

    /// Toggle link state; going down loses everything in flight.
    pub fn set_broken(&mut self, broken: bool) {
        self.broken = broken;
        if broken {
            self.reset();
        }
    }

    pub fn toggle(&mut self) -> bool {
        self.set_broken(!self.broken);
        self.broken
    }

    /// Whether `pos` lies within `distance` of the drawn segment.
    pub fn nearby(&self, pos: Location, distance: f64) -> bool {
        segment_nearby(pos, self.end1.location, self.end2.location, distance)
    }

    /// Head packet of whichever queue is drawn under `pos`. A queue is drawn
    /// a fifth of the way along the link from the node it is heading to.
    pub fn queued_near(&self, pos: Location) -> Option<PacketId> {
        let drawn_at = |from: Location, to: Location| {
            let px = from.x + 0.2 * (to.x - from.x);
            let py = from.y + 0.2 * (to.y - from.y);
            (px - pos.x).abs() < 0.1 && (py - pos.y).abs() < 0.1
        };
        if let Some(head) = self.q21.front() {
            if drawn_at(self.end1.location, self.end2.location) {
                return Some(*head);
            }
        }
        if let Some(head) = self.q12.front() {
            if drawn_at(self.end2.location, self.end1.location) {
                return Some(*head);
            }
        }
        None
    }

    pub fn status(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "link({}<-->{}) ({:.1}){}",
            self.end1.address,
            self.end2.address,
            self.cost,
            if self.broken { " DOWN" } else { "" }
        )
    }
}

fn format_cost(cost: Cost) -> String {
    if cost.fract() == 0.0 {
        format!("{}", cost as i64)
    } else {
        format!("{}", cost)
    }
}

fn segment_nearby(pt: Location, end1: Location, end2: Location, distance: f64) -> bool {
    if end1.x == end2.x {
        if (pt.x - end1.x).abs() > distance {
            return false;
        }
        let y1 = end1.y.min(end2.y);
        let y2 = end1.y.max(end2.y);
        pt.y >= y1 - distance && pt.y <= y2 + distance
    } else if end1.y == end2.y {
        if (pt.y - end1.y).abs() > distance {
            return false;
        }
        let x1 = end1.x.min(end2.x);
        let x2 = end1.x.max(end2.x);
        pt.x >= x1 - distance && pt.x <= x2 + distance
    } else {
        // foot of the perpendicular from pt onto the segment's line
        let slope1 = (end1.y - end2.y) / (end1.x - end2.x);
        let intercept1 = end1.y - slope1 * end1.x;
        let slope2 = -1.0 / slope1;
        let intercept2 = pt.y - slope2 * pt.x;
        let xi = (intercept2 - intercept1) / (slope1 - slope2);
        if xi < end1.x.min(end2.x) || xi > end1.x.max(end2.x) {
            return false;
        }
        let dx = pt.x - xi;
        let dy = pt.y - (slope2 * xi + intercept2);
        dx * dx + dy * dy <= distance * distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn endpoint(node: usize, address: &str, x: f64, y: f64) -> Endpoint {
        Endpoint {
            node: NodeId(node),
            address: address.into(),
            location: Location::new(x, y),
        }
    }

    fn link(loss_prob: f64) -> Link {
        Link::euclidean(LinkId(0), endpoint(0, "A", 0.0, 0.0), endpoint(1, "B", 1.0, 0.0), loss_prob)
    }

    #[test]
    fn directions_are_independent() {
        let mut rng = Pcg64::seed_from_u64(1);
        let mut link = link(0.0);
        assert_eq!(link.send(NodeId(0), PacketId(1), &mut rng), SendOutcome::Queued);
        assert_eq!(link.send(NodeId(0), PacketId(2), &mut rng), SendOutcome::Queued);
        assert_eq!(link.send(NodeId(1), PacketId(3), &mut rng), SendOutcome::Queued);

        assert_eq!(link.queue_length(NodeId(1)), 2);
        assert_eq!(link.queue_length(NodeId(0)), 1);
        assert_eq!(link.receive(NodeId(1)), Some(PacketId(1)));
        assert_eq!(link.receive(NodeId(1)), Some(PacketId(2)));
        assert_eq!(link.receive(NodeId(1)), None);
        assert_eq!(link.receive(NodeId(0)), Some(PacketId(3)));
    }

    #[test]
    fn backlog_counts_both_directions() {
        let mut rng = Pcg64::seed_from_u64(1);
        let mut link = link(0.0);
        link.send(NodeId(0), PacketId(1), &mut rng);
        link.send(NodeId(1), PacketId(2), &mut rng);
        link.send(NodeId(1), PacketId(3), &mut rng);
        assert_eq!(link.backlog(), 3);
        link.receive(NodeId(0));
        assert_eq!(link.backlog(), 2);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "is not an end of")]
    fn foreign_node_cannot_receive() {
        let mut link = link(0.0);
        link.receive(NodeId(7));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "is not an end of")]
    fn foreign_node_has_no_queue() {
        link(0.0).queue_length(NodeId(7));
    }

    #[test]
    fn broken_link_drops_and_clears() {
        let mut rng = Pcg64::seed_from_u64(1);
        let mut link = link(0.0);
        link.send(NodeId(0), PacketId(1), &mut rng);
        link.set_broken(true);
        assert_eq!(link.queue_length(NodeId(1)), 0);
        assert_eq!(link.send(NodeId(0), PacketId(2), &mut rng), SendOutcome::LinkDown);
        assert_eq!(link.dropped_while_down(), 1);

        assert!(!link.toggle());
        assert_eq!(link.receive(NodeId(1)), None);
        assert_eq!(link.send(NodeId(0), PacketId(3), &mut rng), SendOutcome::Queued);
    }

    #[test]
    fn certain_loss_tallies() {
        let mut rng = Pcg64::seed_from_u64(7);
        let mut link = link(1.0);
        for i in 0..5 {
            assert_eq!(link.send(NodeId(0), PacketId(i), &mut rng), SendOutcome::Lost);
        }
        assert_eq!(link.lost(), 5);
        assert_eq!(link.queue_length(NodeId(1)), 0);
    }

    #[test]
    fn euclidean_cost_repr() {
        let diagonal = Link::euclidean(LinkId(1), endpoint(0, "C", 2.0, 0.0), endpoint(1, "F", 1.0, 1.0), 0.0);
        assert!((diagonal.cost() - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(diagonal.cost_repr(), "sqrt(2)");
        assert_eq!(link(0.0).cost_repr(), "1");
    }

    #[test]
    fn hit_test_segments() {
        let horizontal = link(0.0);
        assert!(horizontal.nearby(Location::new(0.5, 0.05), 0.1));
        assert!(!horizontal.nearby(Location::new(0.5, 0.3), 0.1));

        let diagonal = Link::euclidean(LinkId(1), endpoint(0, "C", 2.0, 0.0), endpoint(1, "F", 1.0, 1.0), 0.0);
        assert!(diagonal.nearby(Location::new(1.5, 0.5), 0.1));
        assert!(!diagonal.nearby(Location::new(1.2, 0.2), 0.1));
    }
}
