// In-memory oracle and extension used by the router unit tests

use crate::router::extension::RouteExtension;
use crate::router::oracle::RoutingOracle;
use crate::router::routes::{Channel, ChannelEdge, Hop, NodeInfo, Route, RoutingPolicy};
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn channel(chan_id: u64, remote: &str, local_balance: u64, remote_balance: u64) -> Channel {
    Channel {
        chan_id,
        remote_pubkey: remote.to_string(),
        local_balance,
        remote_balance,
    }
}

pub fn policy(fee_base_msat: u64, fee_rate_milli_msat: u64, time_lock_delta: u32) -> RoutingPolicy {
    RoutingPolicy {
        fee_base_msat,
        fee_rate_milli_msat,
        time_lock_delta,
        disabled: false,
    }
}

/// Route over `chan_ids`, each hop reaching node `n<chan_id>`
pub fn route(chan_ids: &[u64], total_fees_msat: u64) -> Route {
    Route::new(
        chan_ids
            .iter()
            .map(|id| Hop::new(*id, format!("n{id}")))
            .collect(),
        total_fees_msat,
    )
}

/// Oracle answering `get_routes(n)` with the first `n` of a fixed ranking
pub struct ScriptedOracle {
    info: NodeInfo,
    channels: Mutex<Vec<Channel>>,
    ranking: Mutex<Vec<Route>>,
    edges: Mutex<HashMap<u64, ChannelEdge>>,
    route_requests: Mutex<Vec<usize>>,
    channel_requests: AtomicUsize,
    fail_routes: AtomicBool,
    fail_channels: AtomicBool,
}

impl ScriptedOracle {
    pub fn new(identity: &str, block_height: u32) -> Self {
        Self {
            info: NodeInfo {
                identity_pubkey: identity.to_string(),
                block_height,
            },
            channels: Mutex::new(Vec::new()),
            ranking: Mutex::new(Vec::new()),
            edges: Mutex::new(HashMap::new()),
            route_requests: Mutex::new(Vec::new()),
            channel_requests: AtomicUsize::new(0),
            fail_routes: AtomicBool::new(false),
            fail_channels: AtomicBool::new(false),
        }
    }

    pub fn add_channel(&self, channel: Channel) {
        self.channels.lock().unwrap().push(channel);
    }

    pub fn set_ranking(&self, routes: Vec<Route>) {
        *self.ranking.lock().unwrap() = routes;
    }

    pub fn add_edge(
        &self,
        channel_id: u64,
        node1: &str,
        node2: &str,
        node1_policy: Option<RoutingPolicy>,
        node2_policy: Option<RoutingPolicy>,
    ) {
        self.edges.lock().unwrap().insert(
            channel_id,
            ChannelEdge {
                channel_id,
                node1_pub: node1.to_string(),
                node2_pub: node2.to_string(),
                node1_policy,
                node2_policy,
            },
        );
    }

    pub fn fail_routes(&self, fail: bool) {
        self.fail_routes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_channels(&self, fail: bool) {
        self.fail_channels.store(fail, Ordering::SeqCst);
    }

    pub fn route_requests(&self) -> Vec<usize> {
        self.route_requests.lock().unwrap().clone()
    }

    pub fn channel_requests(&self) -> usize {
        self.channel_requests.load(Ordering::SeqCst)
    }
}

impl RoutingOracle for ScriptedOracle {
    async fn get_channels(&self) -> Result<Vec<Channel>> {
        self.channel_requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_channels.load(Ordering::SeqCst) {
            bail!("channel list unavailable");
        }
        Ok(self.channels.lock().unwrap().clone())
    }

    async fn get_routes(
        &self,
        _destination: &str,
        _amount_sat: u64,
        max_routes: usize,
    ) -> Result<Vec<Route>> {
        if self.fail_routes.load(Ordering::SeqCst) {
            bail!("oracle unavailable");
        }
        self.route_requests.lock().unwrap().push(max_routes);
        let ranking = self.ranking.lock().unwrap();
        Ok(ranking.iter().take(max_routes).cloned().collect())
    }

    async fn get_info(&self) -> Result<NodeInfo> {
        Ok(self.info.clone())
    }

    async fn get_edge(&self, chan_id: u64) -> Result<Option<ChannelEdge>> {
        Ok(self.edges.lock().unwrap().get(&chan_id).cloned())
    }
}

/// Extension appending a zero-fee hop over `chan_id`; refuses routes whose
/// first hop is listed in `refuse_first_hops` and errors on its next
/// `failures` calls
pub struct AppendFinalHop {
    pub chan_id: u64,
    pub refuse_first_hops: Vec<u64>,
    pub failures: AtomicUsize,
}

impl AppendFinalHop {
    pub fn new(chan_id: u64) -> Self {
        Self {
            chan_id,
            refuse_first_hops: Vec::new(),
            failures: AtomicUsize::new(0),
        }
    }
}

impl RouteExtension for AppendFinalHop {
    async fn add_rebalance_channel(&self, mut route: Route) -> Result<Option<Route>> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            bail!("graph lookup failed");
        }
        match route.first_hop() {
            Some(hop) if self.refuse_first_hops.contains(&hop.chan_id) => return Ok(None),
            None => return Ok(None),
            _ => {}
        }
        route.hops.push(Hop::new(self.chan_id, "me"));
        Ok(Some(route))
    }
}
