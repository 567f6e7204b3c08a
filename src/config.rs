// Configuration management module
// This file loads the LND connection settings, the rebalance request and
// the selector thresholds from environment variables (APP__*)

use crate::errors::RebalanceError;
use crate::router::extension::DEFAULT_FINAL_CLTV_DELTA;
use crate::router::routes::RebalanceRequest;
use crate::router::selector::{
    SelectorLimits, HIGH_FEES_THRESHOLD_MSAT, MAX_ROUTES_TO_REQUEST, MIN_LOCAL_RATIO,
    ROUTE_REQUEST_INCREMENT,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// LND REST endpoint, e.g. https://localhost:8080
    pub lnd_rest_url: Url,
    /// Hex-encoded macaroon; takes precedence over `macaroon_path`
    pub macaroon_hex: Option<String>,
    /// Path to a binary macaroon file (e.g. readonly.macaroon)
    pub macaroon_path: Option<PathBuf>,
    /// PEM certificate of the node (tls.cert) for self-signed setups
    pub tls_cert_path: Option<PathBuf>,
    /// Amount to move, in satoshis
    pub amount_sat: u64,
    /// Outgoing channel the route must use (optional)
    pub first_hop_channel_id: Option<u64>,
    /// Channel to rebalance
    pub last_hop_channel_id: u64,
    #[serde(default = "default_final_cltv_delta")]
    pub final_cltv_delta: u32,
    #[serde(default = "default_max_routes")]
    pub max_routes: usize,
    #[serde(default = "default_route_increment")]
    pub route_increment: usize,
    #[serde(default = "default_max_fee_msat")]
    pub max_fee_msat: u64,
    #[serde(default = "default_min_local_ratio")]
    pub min_local_ratio: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_final_cltv_delta() -> u32 {
    DEFAULT_FINAL_CLTV_DELTA
}

fn default_max_routes() -> usize {
    MAX_ROUTES_TO_REQUEST
}

fn default_route_increment() -> usize {
    ROUTE_REQUEST_INCREMENT
}

fn default_max_fee_msat() -> u64 {
    HIGH_FEES_THRESHOLD_MSAT
}

fn default_min_local_ratio() -> f64 {
    MIN_LOCAL_RATIO
}

fn default_timeout_secs() -> u64 {
    30
}

fn invalid(msg: &str) -> Result<(), RebalanceError> {
    Err(RebalanceError::InvalidConfig(msg.to_string()))
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from `vars` instead of the process environment when given
    pub fn load_from(vars: Option<HashMap<String, String>>) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .source(vars),
            )
            .build()?;
        let cfg: Self = cfg.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), RebalanceError> {
        if self.amount_sat == 0 {
            return invalid("APP__AMOUNT_SAT must be positive");
        }
        if self.max_routes == 0 {
            return invalid("APP__MAX_ROUTES must be positive");
        }
        if self.route_increment == 0 {
            return invalid("APP__ROUTE_INCREMENT must be positive");
        }
        if !(0.0..=1.0).contains(&self.min_local_ratio) {
            return invalid("APP__MIN_LOCAL_RATIO must be within 0..=1");
        }
        if self.macaroon_hex.is_none() && self.macaroon_path.is_none() {
            return invalid("one of APP__MACAROON_HEX or APP__MACAROON_PATH is required");
        }
        if self.first_hop_channel_id == Some(self.last_hop_channel_id) {
            return invalid("first and last hop channel must differ");
        }
        Ok(())
    }

    /// Hex-encoded macaroon, read from `macaroon_path` if not given inline
    pub fn macaroon(&self) -> Result<String> {
        if let Some(hex) = &self.macaroon_hex {
            return Ok(hex.trim().to_string());
        }
        let path = self
            .macaroon_path
            .as_ref()
            .context("APP__MACAROON_PATH is required when APP__MACAROON_HEX is unset")?;
        let raw = std::fs::read(path)
            .with_context(|| format!("read macaroon {}", path.display()))?;
        Ok(hex::encode(raw))
    }

    pub fn tls_cert_pem(&self) -> Result<Option<Vec<u8>>> {
        self.tls_cert_path
            .as_ref()
            .map(|path| {
                std::fs::read(path)
                    .with_context(|| format!("read TLS certificate {}", path.display()))
            })
            .transpose()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rebalance_request(&self) -> RebalanceRequest {
        RebalanceRequest {
            amount_sat: self.amount_sat,
            first_hop_channel_id: self.first_hop_channel_id,
            last_hop_channel_id: self.last_hop_channel_id,
        }
    }

    pub fn selector_limits(&self) -> SelectorLimits {
        SelectorLimits {
            max_routes: self.max_routes,
            increment: self.route_increment,
            max_fee_msat: self.max_fee_msat,
            min_local_ratio: self.min_local_ratio,
        }
    }
}
