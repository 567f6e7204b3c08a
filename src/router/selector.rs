// Route selector - lazily acquires, filters and hands out rebalance routes
// Candidates are requested from the routing oracle in growing absolute
// batches, closed through the rebalance channel by the route extension,
// validated, de-duplicated and delivered one at a time in discovery order

use crate::metrics::ROUTES_REQUESTED;
use crate::router::extension::RouteExtension;
use crate::router::oracle::{resolve_channel, RoutingOracle};
use crate::router::routes::{Channel, RebalanceRequest, Route};
use crate::router::validation::RouteCheck;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub const MAX_ROUTES_TO_REQUEST: usize = 60;
pub const ROUTE_REQUEST_INCREMENT: usize = 15;
pub const HIGH_FEES_THRESHOLD_MSAT: u64 = 3_000_000;
pub const MIN_LOCAL_RATIO: f64 = 0.5;

/// Batching and filtering thresholds of a selection session
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorLimits {
    /// Hard ceiling on the number of routes requested from the oracle
    pub max_routes: usize,
    /// Growth of the absolute batch size per refill round
    pub increment: usize,
    pub max_fee_msat: u64,
    /// Minimum local share of the first-hop channel after sending
    pub min_local_ratio: f64,
}

impl Default for SelectorLimits {
    fn default() -> Self {
        Self {
            max_routes: MAX_ROUTES_TO_REQUEST,
            increment: ROUTE_REQUEST_INCREMENT,
            max_fee_msat: HIGH_FEES_THRESHOLD_MSAT,
            min_local_ratio: MIN_LOCAL_RATIO,
        }
    }
}

/// Counters of a session, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorStats {
    pub discovered: usize,
    pub returned: usize,
    pub requested: usize,
}

/// One rebalance attempt's route source.
///
/// `has_next`/`get_next` top up the buffer before answering; a `None` from
/// `get_next` means no viable route is left, not a failure.
pub struct RouteSelector<O, E> {
    oracle: Arc<O>,
    extension: E,
    request: RebalanceRequest,
    rebalance_channel: Channel,
    limits: SelectorLimits,
    /// Validated, distinct routes in discovery order
    all_routes: Vec<Route>,
    /// Routes already handed to the caller
    returned_routes: HashSet<Route>,
    requested_count: usize,
}

impl<O: RoutingOracle, E: RouteExtension> RouteSelector<O, E> {
    /// Resolve the rebalance channel and start an empty session.
    /// `build_extension` receives the resolved channel.
    #[tracing::instrument(skip_all, fields(last_hop = request.last_hop_channel_id, amount_sat = request.amount_sat))]
    pub async fn new<F>(oracle: Arc<O>, request: RebalanceRequest, build_extension: F) -> Result<Self>
    where
        F: FnOnce(&Channel) -> E,
    {
        let rebalance_channel = resolve_channel(oracle.as_ref(), request.last_hop_channel_id)
            .await
            .context("resolve rebalance channel")?;
        let extension = build_extension(&rebalance_channel);

        debug!(
            chan_id = rebalance_channel.chan_id,
            remote = %rebalance_channel.remote_pubkey,
            local_balance = rebalance_channel.local_balance,
            remote_balance = rebalance_channel.remote_balance,
            "resolved rebalance channel"
        );

        Ok(Self {
            oracle,
            extension,
            request,
            rebalance_channel,
            limits: SelectorLimits::default(),
            all_routes: Vec::new(),
            returned_routes: HashSet::new(),
            requested_count: 0,
        })
    }

    pub fn with_limits(mut self, limits: SelectorLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn request(&self) -> &RebalanceRequest {
        &self.request
    }

    pub fn rebalance_channel(&self) -> &Channel {
        &self.rebalance_channel
    }

    pub fn limits(&self) -> &SelectorLimits {
        &self.limits
    }

    /// All validated routes discovered so far, in discovery order
    pub fn routes(&self) -> &[Route] {
        &self.all_routes
    }

    pub fn requested_count(&self) -> usize {
        self.requested_count
    }

    pub fn stats(&self) -> SelectorStats {
        SelectorStats {
            discovered: self.all_routes.len(),
            returned: self.returned_routes.len(),
            requested: self.requested_count,
        }
    }

    pub async fn has_next(&mut self) -> Result<bool> {
        self.update_routes().await?;
        Ok(self.has_undelivered())
    }

    pub async fn get_next(&mut self) -> Result<Option<Route>> {
        self.update_routes().await?;
        let next = self
            .all_routes
            .iter()
            .find(|route| !self.returned_routes.contains(*route))
            .cloned();
        if let Some(route) = &next {
            self.returned_routes.insert(route.clone());
            debug!(
                route = %route.describe(),
                fees_msat = route.total_fees_msat,
                returned = self.returned_routes.len(),
                "handing out route"
            );
        }
        Ok(next)
    }

    fn has_undelivered(&self) -> bool {
        self.all_routes
            .iter()
            .any(|route| !self.returned_routes.contains(route))
    }

    async fn update_routes(&mut self) -> Result<()> {
        let increment = self.limits.increment.max(1);
        loop {
            if self.has_undelivered() {
                return Ok(());
            }
            if self.requested_count >= self.limits.max_routes {
                return Ok(());
            }
            let num_routes = self
                .limits
                .max_routes
                .min(self.requested_count + increment);
            self.request_routes(num_routes).await?;
        }
    }

    /// Re-fetch the whole batch of `num_routes` and buffer the new valid ones.
    /// Session state is only touched once every oracle and extension call of
    /// the round has succeeded, so a failed round can be retried as is.
    async fn request_routes(&mut self, num_routes: usize) -> Result<()> {
        let candidates = self
            .oracle
            .get_routes(
                &self.rebalance_channel.remote_pubkey,
                self.request.amount_sat,
                num_routes,
            )
            .await
            .with_context(|| format!("request {num_routes} routes from oracle"))?;

        let mut channels = Vec::new();
        let mut extended = Vec::with_capacity(candidates.len());
        if !candidates.is_empty() {
            channels = self
                .oracle
                .get_channels()
                .await
                .context("list own channels")?;
            for candidate in candidates {
                extended.push(
                    self.extension
                        .add_rebalance_channel(candidate)
                        .await
                        .context("extend candidate route")?,
                );
            }
        }

        self.requested_count = num_routes;
        ROUTES_REQUESTED.inc_by(num_routes as u64);

        let before = self.all_routes.len();
        for route in extended {
            self.add_route(route, &channels);
        }

        info!(
            requested = num_routes,
            discovered = self.all_routes.len() - before,
            total = self.all_routes.len(),
            "refilled route buffer"
        );
        Ok(())
    }

    fn add_route(&mut self, route: Option<Route>, channels: &[Channel]) {
        let check = RouteCheck {
            request: &self.request,
            rebalance_channel: &self.rebalance_channel,
            channels,
            max_fee_msat: self.limits.max_fee_msat,
            min_local_ratio: self.limits.min_local_ratio,
        };
        if !check.accepts(route.as_ref()) {
            return;
        }
        if let Some(route) = route {
            if !self.all_routes.contains(&route) {
                self.all_routes.push(route);
            }
        }
    }
}
