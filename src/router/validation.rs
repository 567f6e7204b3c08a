// Candidate route validation
// Checks an extended candidate against the first-hop constraint, the
// liquidity left on the first-hop channel, self loops and the fee cap

use crate::metrics::ROUTE_REJECTIONS;
use crate::router::oracle::find_channel;
use crate::router::routes::{Channel, RebalanceRequest, Route};
use std::fmt;
use tracing::debug;

/// Why a candidate route was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The extension could not close the loop
    NotExtended,
    /// A specific first hop was requested and the route uses another one
    WrongFirstHop,
    /// The first-hop channel is not one of the own channels
    UnknownFirstHop,
    /// Sending the amount would leave the first-hop channel below the minimum local ratio
    LowLocalRatio,
    /// The route leaves through the channel it is meant to rebalance
    FirstHopIsTarget,
    HighFees,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::NotExtended => "not_extended",
            Rejection::WrongFirstHop => "wrong_first_hop",
            Rejection::UnknownFirstHop => "unknown_first_hop",
            Rejection::LowLocalRatio => "low_local_ratio",
            Rejection::FirstHopIsTarget => "first_hop_is_target",
            Rejection::HighFees => "high_fees",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a candidate is checked against during one refill round
#[derive(Debug, Clone, Copy)]
pub struct RouteCheck<'a> {
    pub request: &'a RebalanceRequest,
    pub rebalance_channel: &'a Channel,
    /// Own channels as listed by the oracle for this round
    pub channels: &'a [Channel],
    pub max_fee_msat: u64,
    pub min_local_ratio: f64,
}

impl RouteCheck<'_> {
    /// `Ok(route)` if the candidate may be buffered
    pub fn check<'r>(&self, route: Option<&'r Route>) -> Result<&'r Route, Rejection> {
        let route = route.ok_or(Rejection::NotExtended)?;
        let first_hop = route.first_hop().ok_or(Rejection::NotExtended)?;

        if let Some(required) = self.request.first_hop_channel_id {
            if first_hop.chan_id != required {
                return Err(Rejection::WrongFirstHop);
            }
        }

        let channel =
            find_channel(self.channels, first_hop.chan_id).ok_or(Rejection::UnknownFirstHop)?;
        if channel.local_ratio_after_sending(self.request.amount_sat) < self.min_local_ratio {
            return Err(Rejection::LowLocalRatio);
        }

        if first_hop.chan_id == self.rebalance_channel.chan_id {
            return Err(Rejection::FirstHopIsTarget);
        }

        if route.total_fees_msat > self.max_fee_msat {
            return Err(Rejection::HighFees);
        }

        Ok(route)
    }

    /// Like `check`, logging and counting the rejection reason
    pub fn accepts(&self, route: Option<&Route>) -> bool {
        match self.check(route) {
            Ok(_) => true,
            Err(reason) => {
                ROUTE_REJECTIONS.with_label_values(&[reason.as_str()]).inc();
                debug!(
                    reason = %reason,
                    route = %route.map(Route::describe).unwrap_or_default(),
                    fees_msat = ?route.map(|r| r.total_fees_msat),
                    "rejected candidate route"
                );
                false
            }
        }
    }
}
