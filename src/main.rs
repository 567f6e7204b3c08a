use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use rebalance_routes::config::AppConfig;
use rebalance_routes::router::{PolicyRouteExtension, RouteSelector};
use rebalance_routes::transport::LndRest;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal rebalance error");
        std::process::exit(1);
    }
    Ok(())
}

/// Dry run: list every candidate route the selector would hand to a payer
async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration from environment")?;

    let macaroon = config.macaroon()?;
    let tls_cert = config.tls_cert_pem()?;
    let lnd = Arc::new(
        LndRest::new(
            config.lnd_rest_url.clone(),
            macaroon,
            tls_cert.as_deref(),
            config.timeout(),
        )
        .context("initialize LND REST client")?,
    );

    let request = config.rebalance_request();
    let amount_sat = request.amount_sat;
    let final_cltv_delta = config.final_cltv_delta;
    let extension_oracle = Arc::clone(&lnd);
    let mut selector = RouteSelector::new(Arc::clone(&lnd), request, move |channel| {
        PolicyRouteExtension::new(extension_oracle, channel.clone(), amount_sat)
            .with_final_cltv_delta(final_cltv_delta)
    })
    .await
    .with_context(|| format!("start session for channel {}", config.last_hop_channel_id))?
    .with_limits(config.selector_limits());

    let channel = selector.rebalance_channel();
    info!(
        lnd = %lnd.endpoint(),
        chan_id = channel.chan_id,
        remote = %channel.remote_pubkey,
        local_balance = channel.local_balance,
        remote_balance = channel.remote_balance,
        amount_sat = amount_sat,
        first_hop = ?config.first_hop_channel_id,
        "selecting rebalance routes"
    );

    let mut candidates = 0usize;
    loop {
        tokio::select! {
            next = selector.get_next() => {
                let Some(route) = next? else { break };
                candidates += 1;
                info!(
                    candidate = candidates,
                    route = %route.describe(),
                    fees_msat = route.total_fees_msat,
                    total_amt_msat = route.total_amt_msat,
                    time_lock = route.total_time_lock,
                    "candidate route"
                );
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    warn!(error = %err, "ctrl_c listener error");
                }
                info!("Shutdown signal received, abandoning selection");
                break;
            }
        }
    }

    let stats = selector.stats();
    if candidates == 0 {
        warn!(requested = stats.requested, "no viable route found");
    }
    info!(
        discovered = stats.discovered,
        returned = stats.returned,
        requested = stats.requested,
        "selection finished"
    );
    Ok(())
}

fn init_tracing() -> Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
