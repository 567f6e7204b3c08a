// Transport layer
// Oracle client implementations talking to a Lightning node

pub mod lnd;

pub use lnd::LndRest;
