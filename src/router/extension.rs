// Route extension - closes a candidate path through the rebalance channel
// The oracle only routes to the rebalance channel's remote peer; this file
// appends the private final hop back to the own node and recomputes
// amounts, fees and expiries from the forwarding policies in the graph

use crate::router::oracle::RoutingOracle;
use crate::router::routes::{Channel, Hop, NodeInfo, Route, RoutingPolicy};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Default CLTV delta for the final hop (LND's invoice default)
pub const DEFAULT_FINAL_CLTV_DELTA: u32 = 40;

/// Route extension trait - turns an oracle path into a closed rebalance loop
#[allow(async_fn_in_trait)]
pub trait RouteExtension: Send + Sync {
    /// Returns the augmented route, or `None` if it cannot be constructed
    async fn add_rebalance_channel(&self, route: Route) -> Result<Option<Route>>;
}

/// Extension that prices the extended route from the advertised policies
pub struct PolicyRouteExtension<O> {
    oracle: Arc<O>,
    rebalance_channel: Channel,
    amount_msat: u64,
    final_cltv_delta: u32,
    node_info: OnceCell<NodeInfo>,
}

impl<O: RoutingOracle> PolicyRouteExtension<O> {
    pub fn new(oracle: Arc<O>, rebalance_channel: Channel, amount_sat: u64) -> Self {
        Self {
            oracle,
            rebalance_channel,
            amount_msat: amount_sat.saturating_mul(1000),
            final_cltv_delta: DEFAULT_FINAL_CLTV_DELTA,
            node_info: OnceCell::new(),
        }
    }

    pub fn with_final_cltv_delta(mut self, delta: u32) -> Self {
        self.final_cltv_delta = delta;
        self
    }

    async fn node_info(&self) -> Result<&NodeInfo> {
        self.node_info
            .get_or_try_init(|| async { self.oracle.get_info().await.context("fetch node info") })
            .await
    }

    /// Enabled policy `node` advertises for forwarding over `chan_id`
    async fn forwarding_policy(&self, chan_id: u64, node: &str) -> Result<Option<RoutingPolicy>> {
        let edge = self
            .oracle
            .get_edge(chan_id)
            .await
            .with_context(|| format!("fetch graph edge {chan_id}"))?;
        Ok(edge
            .and_then(|e| e.policy_of(node).cloned())
            .filter(|p| !p.disabled))
    }
}

impl<O: RoutingOracle> RouteExtension for PolicyRouteExtension<O> {
    async fn add_rebalance_channel(&self, route: Route) -> Result<Option<Route>> {
        match route.last_hop() {
            Some(last) if last.pub_key == self.rebalance_channel.remote_pubkey => {}
            _ => {
                debug!(
                    route = %route.describe(),
                    "route does not end at the rebalance peer; cannot extend"
                );
                return Ok(None);
            }
        }

        let info = self.node_info().await?;
        let mut hops = route.hops;
        hops.push(Hop::new(
            self.rebalance_channel.chan_id,
            info.identity_pubkey.clone(),
        ));

        // Walk backwards from the final hop. `amt`/`expiry` describe the HTLC
        // carried over hop `i + 1`.
        let mut amt = self.amount_msat;
        let mut expiry = info.block_height.saturating_add(self.final_cltv_delta);
        let final_index = hops.len() - 1;
        hops[final_index].amt_to_forward_msat = amt;
        hops[final_index].fee_msat = 0;
        hops[final_index].expiry = expiry;

        for i in (0..final_index).rev() {
            let outgoing = hops[i + 1].chan_id;
            let Some(policy) = self.forwarding_policy(outgoing, &hops[i].pub_key).await? else {
                debug!(
                    chan_id = outgoing,
                    node = %hops[i].pub_key,
                    "no usable forwarding policy; cannot extend"
                );
                return Ok(None);
            };
            let fee = policy.fee_for(amt);
            let hop = &mut hops[i];
            hop.amt_to_forward_msat = amt;
            hop.fee_msat = fee;
            hop.expiry = expiry;
            amt = amt.saturating_add(fee);
            expiry = expiry.saturating_add(policy.time_lock_delta);
        }

        Ok(Some(Route {
            hops,
            total_fees_msat: amt - self.amount_msat,
            total_amt_msat: amt,
            total_time_lock: expiry,
        }))
    }
}
