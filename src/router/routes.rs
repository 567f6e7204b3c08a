// Channel, hop and route types
// This file defines the passive data model shared by the selector, the
// route extension and the LND transport
//
// Amounts on channels are satoshis; everything on hops and routes is msat.

use std::hash::{Hash, Hasher};

/// Own view of one payment channel, snapshotted from the oracle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub chan_id: u64,
    pub remote_pubkey: String,
    pub local_balance: u64,
    pub remote_balance: u64,
}

impl Channel {
    /// Fraction of the channel held locally after `amount_sat` has been sent out of it
    pub fn local_ratio_after_sending(&self, amount_sat: u64) -> f64 {
        let local = self.local_balance as f64 - amount_sat as f64;
        let remote = self.remote_balance as f64 + amount_sat as f64;
        let total = local + remote;
        if total <= 0.0 {
            return 0.0;
        }
        local / total
    }
}

/// One rebalance attempt: move `amount_sat` out through the network and back
/// into `last_hop_channel_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalanceRequest {
    pub amount_sat: u64,
    /// If set, the route must leave through this channel
    pub first_hop_channel_id: Option<u64>,
    /// The channel being rebalanced
    pub last_hop_channel_id: u64,
}

impl RebalanceRequest {
    pub fn new(amount_sat: u64, last_hop_channel_id: u64) -> Self {
        Self {
            amount_sat,
            first_hop_channel_id: None,
            last_hop_channel_id,
        }
    }

    pub fn with_first_hop(mut self, chan_id: u64) -> Self {
        self.first_hop_channel_id = Some(chan_id);
        self
    }
}

/// A single channel traversal in a route
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hop {
    pub chan_id: u64,
    /// Node reached by this hop
    pub pub_key: String,
    /// Amount the node at `pub_key` forwards onwards (or receives, on the final hop)
    pub amt_to_forward_msat: u64,
    /// Fee kept by the node at `pub_key`
    pub fee_msat: u64,
    /// CLTV expiry of the HTLC the node at `pub_key` forwards onwards
    pub expiry: u32,
}

impl Hop {
    pub fn new(chan_id: u64, pub_key: impl Into<String>) -> Self {
        Self {
            chan_id,
            pub_key: pub_key.into(),
            ..Default::default()
        }
    }
}

/// Candidate payment route.
///
/// Identity is structural over the ordered channel ids and the total fee, so
/// two oracle answers describing the same path at the same price compare
/// equal even if block-height dependent expiries differ.
#[derive(Debug, Clone, Default)]
pub struct Route {
    pub hops: Vec<Hop>,
    pub total_fees_msat: u64,
    pub total_amt_msat: u64,
    pub total_time_lock: u32,
}

impl Route {
    pub fn new(hops: Vec<Hop>, total_fees_msat: u64) -> Self {
        Self {
            hops,
            total_fees_msat,
            ..Default::default()
        }
    }

    pub fn first_hop(&self) -> Option<&Hop> {
        self.hops.first()
    }

    pub fn last_hop(&self) -> Option<&Hop> {
        self.hops.last()
    }

    pub fn chan_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.hops.iter().map(|h| h.chan_id)
    }

    /// Human readable form, e.g. `"101 -> 202 -> 9"`
    pub fn describe(&self) -> String {
        self.chan_ids()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.total_fees_msat == other.total_fees_msat
            && self.hops.len() == other.hops.len()
            && self.chan_ids().eq(other.chan_ids())
    }
}

impl Eq for Route {}

impl Hash for Route {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hops.len().hash(state);
        for id in self.chan_ids() {
            id.hash(state);
        }
        self.total_fees_msat.hash(state);
    }
}

/// Forwarding policy a node advertises for one side of a channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingPolicy {
    pub fee_base_msat: u64,
    pub fee_rate_milli_msat: u64,
    pub time_lock_delta: u32,
    pub disabled: bool,
}

impl RoutingPolicy {
    /// Fee charged for forwarding `amt_msat` over the channel
    pub fn fee_for(&self, amt_msat: u64) -> u64 {
        let proportional = (amt_msat as u128 * self.fee_rate_milli_msat as u128) / 1_000_000;
        self.fee_base_msat
            .saturating_add(u64::try_from(proportional).unwrap_or(u64::MAX))
    }
}

/// Public graph edge with both endpoint policies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelEdge {
    pub channel_id: u64,
    pub node1_pub: String,
    pub node2_pub: String,
    pub node1_policy: Option<RoutingPolicy>,
    pub node2_policy: Option<RoutingPolicy>,
}

impl ChannelEdge {
    /// Policy advertised by `node` for forwarding out over this channel
    pub fn policy_of(&self, node: &str) -> Option<&RoutingPolicy> {
        if self.node1_pub == node {
            self.node1_policy.as_ref()
        } else if self.node2_pub == node {
            self.node2_policy.as_ref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub identity_pubkey: String,
    pub block_height: u32,
}
