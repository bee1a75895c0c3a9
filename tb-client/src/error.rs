//! Typed errors for the Rust API and their mapping onto ABI status codes.

use std::collections::TryReserveError;

use crate::address::AddressError;
use crate::status::{ClientStatus, InitStatus};

/// Client construction failed; nothing was allocated or registered.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),
    #[error("out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
    #[error("cannot start engine: {0}")]
    SystemResources(#[source] std::io::Error),
    #[error("networking is not available in this host")]
    Unsupported,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl From<&InitError> for InitStatus {
    fn from(err: &InitError) -> Self {
        match err {
            InitError::Address(AddressError::LimitExceeded { .. }) => {
                InitStatus::AddressLimitExceeded
            }
            InitError::Address(_) => InitStatus::InvalidAddress,
            InitError::OutOfMemory(_) => InitStatus::OutOfMemory,
            InitError::SystemResources(_) => InitStatus::SystemResources,
            InitError::Unsupported => InitStatus::Unsupported,
            InitError::InvalidArgument(_) => InitStatus::InvalidArgument,
        }
    }
}

/// Synchronous submit/deinit failure. The packet, if any, was not taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("client is closed")]
    Closed,
    #[error("engine has stopped")]
    EngineStopped,
}

impl From<ClientError> for ClientStatus {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Closed | ClientError::EngineStopped => ClientStatus::ClientInvalid,
        }
    }
}
