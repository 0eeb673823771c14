use log::{debug, warn};
use std::collections::BTreeMap;

use super::routing_table::{NextHop, RoutingTable};
use super::RoutingProtocol;
use crate::context::SimContext;
use crate::error::SimError;
use crate::message::{PacketKind, Payload};
use crate::router::RouterState;
use crate::types::{Address, Cost, LinkId, PacketId, Tick};

/// Cost ceiling; reaching it means unreachable.
pub const INFINITY: Cost = 32.0;

/// Bellman-Ford routing: neighbors exchange their whole cost table and each
/// router keeps, per destination, the cheapest neighbor offer.
#[derive(Debug, Clone)]
pub struct DistanceVector {
    infinity: Cost,
}

impl Default for DistanceVector {
    fn default() -> Self {
        Self { infinity: INFINITY }
    }
}

impl DistanceVector {
    pub fn infinity(&self) -> Cost {
        self.infinity
    }

    /// Fold a neighbor's vector, received over `link`, into `table`.
    /// Returns whether any route or cost changed.
    ///
    /// An offer through the link a destination is already routed over is
    /// always taken, better or worse. An offer through any other link must
    /// be strictly cheaper than what is known.
    pub fn integrate(
        &self,
        table: &mut RoutingTable,
        link: LinkId,
        link_cost: Cost,
        advertisement: &BTreeMap<Address, Cost>,
    ) -> bool {
        let mut changed = false;

        for (dest, &adv_cost) in advertisement {
            if dest == table.owner() {
                continue;
            }

            let new_cost = (link_cost + adv_cost).min(self.infinity);
            let current_cost = table.cost(dest).unwrap_or(self.infinity);

            if table.route(dest) == Some(NextHop::Link(link)) {
                if new_cost != current_cost {
                    if new_cost >= self.infinity {
                        table.remove(dest);
                    } else {
                        table.set_cost(dest, new_cost);
                    }
                    changed = true;
                }
            } else if new_cost < current_cost {
                table.install(dest.clone(), link, new_cost);
                changed = true;
            }
        }

        changed
    }
}

impl RoutingProtocol for DistanceVector {
    fn advertise(&mut self, router: &mut RouterState, ctx: &mut SimContext, time: Tick) {
        let vector = Payload::DistanceVector(router.table.costs().clone());
        router.broadcast(ctx, PacketKind::Advert, &vector, time);
    }

    fn process_advertisement(
        &mut self,
        router: &mut RouterState,
        ctx: &mut SimContext,
        packet: PacketId,
        link: LinkId,
        time: Tick,
    ) -> Result<(), SimError> {
        let advertisement = match ctx.packet(packet).payload() {
            Payload::DistanceVector(vector) => vector.clone(),
            other => {
                warn!("{} ignoring non distance-vector advert {:?}", router.address(), other);
                return Ok(());
            }
        };

        let link_cost = ctx.link(link).cost();
        if self.integrate(&mut router.table, link, link_cost, &advertisement) {
            // triggered update
            self.advertise(router, ctx, time);
        }
        Ok(())
    }

    fn link_failed(&mut self, router: &mut RouterState, link: LinkId) {
        let cleared = router.table.remove_via(link);
        debug!("{} lost {}, cleared {:?}", router.address(), link, cleared);
    }
}
