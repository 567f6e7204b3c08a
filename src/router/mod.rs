// Router module - route acquisition and selection for channel rebalancing
// This file wires the data model, the oracle and extension contracts,
// candidate validation and the selector together

pub mod extension;
pub mod oracle;
pub mod routes;
pub mod selector;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use extension::{PolicyRouteExtension, RouteExtension};
pub use oracle::{resolve_channel, RoutingOracle};
pub use routes::{Channel, ChannelEdge, Hop, NodeInfo, RebalanceRequest, Route, RoutingPolicy};
pub use selector::{RouteSelector, SelectorLimits, SelectorStats};
pub use validation::Rejection;
