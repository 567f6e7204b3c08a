// Error types and error handling module
// This file defines the typed errors raised by route selection,
// the LND transport and configuration loading
//
// Route rejections are not errors; they are logged and counted in
// `router::validation` and never leave the selector.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RebalanceError {
    #[error("unknown channel: {0}")]
    UnknownChannel(u64),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
