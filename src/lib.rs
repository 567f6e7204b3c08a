// Library root module for rebalance-routes
// This file defines the public API and module structure: the route
// selection engine, its LND transport, configuration and metrics

pub mod config;
pub mod errors;
pub mod metrics;
pub mod router;
pub mod transport;
