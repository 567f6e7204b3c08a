// Routing oracle interface
// This file defines the contract of the node that computes candidate
// paths over the public graph, and the channel resolution helpers
// built on top of it

use crate::errors::RebalanceError;
use crate::router::routes::{Channel, ChannelEdge, NodeInfo, Route};
use anyhow::{Context, Result};

/// Routing oracle trait - the node that lists own channels and runs pathfinding
#[allow(async_fn_in_trait)]
pub trait RoutingOracle: Send + Sync {
    /// All channels of the own node, in no particular order
    async fn get_channels(&self) -> Result<Vec<Channel>>;

    /// Up to `max_routes` candidate paths to `destination` able to carry
    /// `amount_sat`. Calls with different `max_routes` may overlap.
    async fn get_routes(
        &self,
        destination: &str,
        amount_sat: u64,
        max_routes: usize,
    ) -> Result<Vec<Route>>;

    /// Own identity and current block height
    async fn get_info(&self) -> Result<NodeInfo>;

    /// Graph edge for `chan_id`, `None` if the graph does not know it
    async fn get_edge(&self, chan_id: u64) -> Result<Option<ChannelEdge>>;
}

pub fn find_channel(channels: &[Channel], chan_id: u64) -> Option<&Channel> {
    channels.iter().find(|c| c.chan_id == chan_id)
}

/// Look `chan_id` up in the oracle's current channel list.
/// A missing channel is a caller mistake and fails with `UnknownChannel`.
pub async fn resolve_channel<O: RoutingOracle>(oracle: &O, chan_id: u64) -> Result<Channel> {
    let channels = oracle.get_channels().await.context("list own channels")?;
    match find_channel(&channels, chan_id) {
        Some(channel) => Ok(channel.clone()),
        None => Err(RebalanceError::UnknownChannel(chan_id).into()),
    }
}
