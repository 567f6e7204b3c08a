// Shared fakes for the integration tests

#![allow(dead_code)]

use anyhow::Result;
use rebalance_routes::router::{
    Channel, ChannelEdge, Hop, NodeInfo, RouteExtension, Route, RoutingOracle,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const REBALANCE_CHANNEL: u64 = 9;

pub fn channel(chan_id: u64, local_balance: u64, remote_balance: u64) -> Channel {
    Channel {
        chan_id,
        remote_pubkey: format!("peer{chan_id}"),
        local_balance,
        remote_balance,
    }
}

pub fn route(chan_ids: &[u64], total_fees_msat: u64) -> Route {
    Route::new(
        chan_ids
            .iter()
            .map(|id| Hop::new(*id, format!("n{id}")))
            .collect(),
        total_fees_msat,
    )
}

/// Oracle that answers route requests either from a queue of scripted
/// batches (then with nothing), or with the top of a fixed ranking
pub struct MemoryOracle {
    channels: Vec<Channel>,
    batches: Mutex<VecDeque<Vec<Route>>>,
    ranking: Option<Vec<Route>>,
    requests: Mutex<Vec<usize>>,
}

impl MemoryOracle {
    /// Own channels 1..=5 with all liquidity local, plus the rebalance channel
    pub fn new(batches: Vec<Vec<Route>>) -> Self {
        let mut channels: Vec<Channel> = (1..=5).map(|id| channel(id, 1_000_000, 0)).collect();
        channels.push(channel(REBALANCE_CHANNEL, 10_000, 990_000));
        Self {
            channels,
            batches: Mutex::new(batches.into()),
            ranking: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn ranked(ranking: Vec<Route>) -> Self {
        Self {
            ranking: Some(ranking),
            ..Self::new(Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<usize> {
        self.requests.lock().unwrap().clone()
    }
}

impl RoutingOracle for MemoryOracle {
    async fn get_channels(&self) -> Result<Vec<Channel>> {
        Ok(self.channels.clone())
    }

    async fn get_routes(
        &self,
        _destination: &str,
        _amount_sat: u64,
        max_routes: usize,
    ) -> Result<Vec<Route>> {
        self.requests.lock().unwrap().push(max_routes);
        let batch = match &self.ranking {
            Some(ranking) => ranking.clone(),
            None => self.batches.lock().unwrap().pop_front().unwrap_or_default(),
        };
        Ok(batch.into_iter().take(max_routes).collect())
    }

    async fn get_info(&self) -> Result<NodeInfo> {
        Ok(NodeInfo {
            identity_pubkey: "me".into(),
            block_height: 800_000,
        })
    }

    async fn get_edge(&self, _chan_id: u64) -> Result<Option<ChannelEdge>> {
        Ok(None)
    }
}

/// Appends the rebalance channel as a zero-fee final hop
pub struct CloseLoop(pub u64);

impl RouteExtension for CloseLoop {
    async fn add_rebalance_channel(&self, mut route: Route) -> Result<Option<Route>> {
        if route.hops.is_empty() {
            return Ok(None);
        }
        route.hops.push(Hop::new(self.0, "me"));
        Ok(Some(route))
    }
}

/// `CloseLoop` whose first call fails
pub struct CloseLoopFailingOnce {
    inner: CloseLoop,
    failed: AtomicBool,
}

impl CloseLoopFailingOnce {
    pub fn new(chan_id: u64) -> Self {
        Self {
            inner: CloseLoop(chan_id),
            failed: AtomicBool::new(false),
        }
    }
}

impl RouteExtension for CloseLoopFailingOnce {
    async fn add_rebalance_channel(&self, route: Route) -> Result<Option<Route>> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            anyhow::bail!("edge lookup timed out");
        }
        self.inner.add_rebalance_channel(route).await
    }
}
