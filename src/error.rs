//! Error types.
//!
//! The lower layers (transport, RPC codec, store, discovery) report typed errors. The manager
//! folds them into [`ManagerError`] before handing them back to the caller.

use std::fmt;

use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Transport

/// Classification of a failed HTTP exchange with a TV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The request did not complete within the configured timeout.
    Timeout,
    /// No connection could be established.
    Connect,
    /// The request could not be built or sent.
    Request,
    /// The response body could not be read.
    Body,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Connect => write!(f, "connect"),
            TransportErrorKind::Request => write!(f, "request"),
            TransportErrorKind::Body => write!(f, "body"),
        }
    }
}

/// A failed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        TransportError {
            kind,
            message: message.into(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// RPC

/// Failure of a JSON-RPC call to a TV.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum RpcError {
    /// The HTTP exchange itself failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// The TV answered with an error envelope whose code is not ignored at the call site.
    #[error("device error {code}: {message}")]
    Protocol { code: i64, message: String },
    /// The TV answered with something that is not a valid response envelope.
    #[error("malformed device response: {0}")]
    DataIntegrity(String),
}

// ------------------------------------------------------------------------------------------------
// Configuration

/// Configuration problems the user can act on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ConfigurationError {
    #[error("no host configured")]
    HostEmpty,
    #[error("invalid host '{0}' (expected an IPv4 or IPv6 address)")]
    HostInvalid(String),
    #[error("source list not yet set, please repeat the setup")]
    SourceListMissing,
    #[error("application list not yet set, please update the application list")]
    ApplicationListMissing,
    #[error("remote key list not yet set, please repeat the setup")]
    RemoteKeysMissing,
    #[error("unknown input source '{0}'")]
    UnknownSource(String),
    #[error("unknown application '{0}'")]
    UnknownApplication(String),
    #[error("unknown remote key '{0}'")]
    UnknownRemoteKey(String),
    #[error("index {0} is not in the list")]
    IndexOutOfRange(i64),
}

// ------------------------------------------------------------------------------------------------
// Store and discovery

/// Failure reading or writing the persisted key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(String),
    #[error("store serialization error: {0}")]
    Serialization(String),
}

/// Failure while discovering TVs on the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum DiscoveryError {
    #[error("discovery network error: {0}")]
    Network(String),
    #[error("device description parse error: {0}")]
    Parse(String),
}

// ------------------------------------------------------------------------------------------------
// Manager

/// Errors sent from the [`SonyTvManager`](crate::SonyTvManager) back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ManagerError {
    /// An attempt to act on a received message was not possible. For example, sending a user
    /// action before the manager has been configured.
    #[error("action error: {0}")]
    Action(String),
    /// The device settings or the cached device lists do not allow the request.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// A call to the TV failed.
    #[error("device error: {0}")]
    Device(#[from] RpcError),
    /// An error occurred during discovery of Sony TVs.
    #[error("discovery error: {0}")]
    Discovery(String),
    /// The persisted store could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for ManagerError {
    fn from(error: StoreError) -> Self {
        ManagerError::Storage(error.to_string())
    }
}

impl From<DiscoveryError> for ManagerError {
    fn from(error: DiscoveryError) -> Self {
        ManagerError::Discovery(error.to_string())
    }
}

// ================================================================================================
// Tests
