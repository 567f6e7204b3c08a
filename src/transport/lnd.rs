// LND REST transport
// This file implements the routing oracle on top of LND's REST gateway:
// own channels, node info, graph edges and QueryRoutes
//
// Transient connection failures are retried with exponential backoff;
// HTTP and decoding errors are returned as-is.

use crate::errors::RebalanceError;
use crate::metrics::{REQ_ERRORS, REQ_LATENCY};
use crate::router::oracle::RoutingOracle;
use crate::router::routes::{Channel, ChannelEdge, Hop, NodeInfo, Route, RoutingPolicy};
use anyhow::{Context, Result};
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{Client, Certificate, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const MACAROON_HEADER: &str = "Grpc-Metadata-macaroon";
/// LND's QueryRoutes answer when pathfinding finds nothing
const NO_PATH: &str = "unable to find a path";
/// LND's GetChanInfo answer for a channel missing from the graph
const EDGE_NOT_FOUND: &str = "edge not found";

#[derive(Debug, Clone)]
pub struct LndRest {
    http: Client,
    base: Url,
    macaroon_hex: String,
    retry_window: Duration,
}

impl LndRest {
    pub fn new(
        base: Url,
        macaroon_hex: impl Into<String>,
        tls_cert_pem: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut builder = Client::builder().timeout(timeout).gzip(true);
        if let Some(pem) = tls_cert_pem {
            let cert = Certificate::from_pem(pem).context("parse LND TLS certificate")?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder.build().context("build HTTP client for LND REST")?;

        Ok(Self {
            http,
            base,
            macaroon_hex: macaroon_hex.into(),
            retry_window: Duration::from_secs(10),
        })
    }

    /// Bound the total time spent retrying transient failures of one call
    pub fn with_retry_window(mut self, window: Duration) -> Self {
        self.retry_window = window;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{}", self.base.as_str().trim_end_matches('/'), path);
        Url::parse(&raw).with_context(|| format!("build LND url {raw}"))
    }

    /// GET `url` and decode the body; `Ok(None)` on 404
    async fn get_json<T: DeserializeOwned>(
        &self,
        method: &'static str,
        url: Url,
    ) -> Result<Option<T>> {
        let _timer = REQ_LATENCY.with_label_values(&["lnd", method]).start_timer();

        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(self.retry_window),
            multiplier: 2.0,
            ..Default::default()
        };

        let outcome = retry(backoff, || self.get_once::<T>(method, url.clone())).await;
        if let Err(err) = &outcome {
            REQ_ERRORS.with_label_values(&["lnd", method]).inc();
            warn!(method = method, error = %err, "LND request failed");
        }
        Ok(outcome?)
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        method: &'static str,
        url: Url,
    ) -> Result<Option<T>, backoff::Error<RebalanceError>> {
        let resp = match self
            .http
            .get(url)
            .header(MACAROON_HEADER, &self.macaroon_hex)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                debug!(method = method, error = %e, "transient LND transport error");
                return Err(backoff::Error::transient(RebalanceError::Transport(format!(
                    "{method}: {e}"
                ))));
            }
            Err(e) => {
                return Err(backoff::Error::permanent(RebalanceError::Transport(format!(
                    "{method}: {e}"
                ))))
            }
        };

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(backoff::Error::permanent(RebalanceError::Provider(format!(
                "{method}: http {status}: {body}"
            ))));
        }

        match resp.json::<T>().await {
            Ok(value) => Ok(Some(value)),
            Err(e) => Err(backoff::Error::permanent(RebalanceError::Provider(format!(
                "{method}: decode response: {e}"
            )))),
        }
    }
}

impl RoutingOracle for LndRest {
    async fn get_channels(&self) -> Result<Vec<Channel>> {
        let url = self.url("v1/channels")?;
        let resp: ListChannelsResponse = self
            .get_json::<ListChannelsResponse>("list_channels", url)
            .await?
            .unwrap_or_default();
        Ok(resp.channels.into_iter().map(Channel::from).collect())
    }

    async fn get_routes(
        &self,
        destination: &str,
        amount_sat: u64,
        max_routes: usize,
    ) -> Result<Vec<Route>> {
        let mut url = self.url(&format!("v1/graph/routes/{destination}/{amount_sat}"))?;
        url.query_pairs_mut()
            .append_pair("num_routes", &max_routes.to_string())
            .append_pair("use_mission_control", "true");

        let resp = match self
            .get_json::<QueryRoutesResponse>("query_routes", url)
            .await
        {
            Ok(resp) => resp.unwrap_or_default(),
            Err(err) if provider_error_contains(&err, NO_PATH) => {
                debug!(destination = destination, "oracle found no path");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };
        Ok(resp.routes.into_iter().map(Route::from).collect())
    }

    async fn get_info(&self) -> Result<NodeInfo> {
        let url = self.url("v1/getinfo")?;
        let resp: GetInfoResponse = self
            .get_json::<GetInfoResponse>("get_info", url)
            .await?
            .ok_or_else(|| RebalanceError::Provider("get_info: not found".into()))?;
        Ok(NodeInfo {
            identity_pubkey: resp.identity_pubkey,
            block_height: resp.block_height,
        })
    }

    async fn get_edge(&self, chan_id: u64) -> Result<Option<ChannelEdge>> {
        let url = self.url(&format!("v1/graph/edge/{chan_id}"))?;
        match self.get_json::<LndChannelEdge>("get_chan_info", url).await {
            Ok(resp) => Ok(resp.map(ChannelEdge::from)),
            Err(err) if provider_error_contains(&err, EDGE_NOT_FOUND) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn provider_error_contains(err: &anyhow::Error, needle: &str) -> bool {
    matches!(
        err.downcast_ref::<RebalanceError>(),
        Some(RebalanceError::Provider(msg)) if msg.contains(needle)
    )
}

/// LND encodes 64-bit integers as JSON strings
fn de_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }
    match Raw::deserialize(d)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Default, Deserialize)]
struct GetInfoResponse {
    #[serde(default)]
    identity_pubkey: String,
    #[serde(default)]
    block_height: u32,
}

#[derive(Debug, Default, Deserialize)]
struct ListChannelsResponse {
    #[serde(default)]
    channels: Vec<LndChannel>,
}

#[derive(Debug, Deserialize)]
struct LndChannel {
    #[serde(default)]
    remote_pubkey: String,
    #[serde(default, deserialize_with = "de_u64")]
    chan_id: u64,
    #[serde(default, deserialize_with = "de_u64")]
    local_balance: u64,
    #[serde(default, deserialize_with = "de_u64")]
    remote_balance: u64,
}

impl From<LndChannel> for Channel {
    fn from(c: LndChannel) -> Self {
        Channel {
            chan_id: c.chan_id,
            remote_pubkey: c.remote_pubkey,
            local_balance: c.local_balance,
            remote_balance: c.remote_balance,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct QueryRoutesResponse {
    #[serde(default)]
    routes: Vec<LndRoute>,
}

#[derive(Debug, Deserialize)]
struct LndRoute {
    #[serde(default)]
    total_time_lock: u32,
    #[serde(default, deserialize_with = "de_u64")]
    total_fees_msat: u64,
    #[serde(default, deserialize_with = "de_u64")]
    total_amt_msat: u64,
    #[serde(default)]
    hops: Vec<LndHop>,
}

#[derive(Debug, Deserialize)]
struct LndHop {
    #[serde(default, deserialize_with = "de_u64")]
    chan_id: u64,
    #[serde(default)]
    pub_key: String,
    #[serde(default, deserialize_with = "de_u64")]
    amt_to_forward_msat: u64,
    #[serde(default, deserialize_with = "de_u64")]
    fee_msat: u64,
    #[serde(default)]
    expiry: u32,
}

impl From<LndRoute> for Route {
    fn from(r: LndRoute) -> Self {
        Route {
            hops: r
                .hops
                .into_iter()
                .map(|h| Hop {
                    chan_id: h.chan_id,
                    pub_key: h.pub_key,
                    amt_to_forward_msat: h.amt_to_forward_msat,
                    fee_msat: h.fee_msat,
                    expiry: h.expiry,
                })
                .collect(),
            total_fees_msat: r.total_fees_msat,
            total_amt_msat: r.total_amt_msat,
            total_time_lock: r.total_time_lock,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LndChannelEdge {
    #[serde(default, deserialize_with = "de_u64")]
    channel_id: u64,
    #[serde(default)]
    node1_pub: String,
    #[serde(default)]
    node2_pub: String,
    #[serde(default)]
    node1_policy: Option<LndRoutingPolicy>,
    #[serde(default)]
    node2_policy: Option<LndRoutingPolicy>,
}

#[derive(Debug, Deserialize)]
struct LndRoutingPolicy {
    #[serde(default)]
    time_lock_delta: u32,
    #[serde(default, deserialize_with = "de_u64")]
    fee_base_msat: u64,
    #[serde(default, deserialize_with = "de_u64")]
    fee_rate_milli_msat: u64,
    #[serde(default)]
    disabled: bool,
}

impl From<LndRoutingPolicy> for RoutingPolicy {
    fn from(p: LndRoutingPolicy) -> Self {
        RoutingPolicy {
            fee_base_msat: p.fee_base_msat,
            fee_rate_milli_msat: p.fee_rate_milli_msat,
            time_lock_delta: p.time_lock_delta,
            disabled: p.disabled,
        }
    }
}

impl From<LndChannelEdge> for ChannelEdge {
    fn from(e: LndChannelEdge) -> Self {
        ChannelEdge {
            channel_id: e.channel_id,
            node1_pub: e.node1_pub,
            node2_pub: e.node2_pub,
            node1_policy: e.node1_policy.map(RoutingPolicy::from),
            node2_policy: e.node2_policy.map(RoutingPolicy::from),
        }
    }
}
