//! Common error types used across the workspace.
//!
//! [`CemError`] is the base enum. Each failure kind has its own typed error
//! and converts via `#[from]`; adapters box their native errors into
//! [`TransportError`].

use std::fmt;

use crate::feature::{FeatureType, FunctionType, Role};
use crate::ski::Ski;

/// Top-level error returned by use-case operations and event handlers.
///
/// None of these are fatal to the process: they abort the single operation
/// or refresh cycle they occurred in.
#[derive(Debug, thiserror::Error)]
pub enum CemError {
    #[error("address resolution failed: {0}")]
    AddressResolution(#[from] AddressResolutionError),

    #[error("remote request failed: {0}")]
    RemoteRequest(#[from] RemoteRequestError),

    #[error("subscription to remote feature failed: {0}")]
    Subscription(#[source] TransportError),

    #[error("binding write failed: {0}")]
    BindingWrite(#[source] TransportError),

    #[error("data write failed: {0}")]
    DataWrite(#[source] TransportError),

    #[error("heartbeat activation failed: {0}")]
    Heartbeat(#[source] TransportError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// A local or remote feature address could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressResolutionError {
    #[error("no remote device known for SKI {ski}")]
    UnknownDevice { ski: Ski },

    #[error("no local {feature:?} feature with role {role:?}")]
    MissingLocalFeature { feature: FeatureType, role: Role },

    #[error("remote device {ski} has no {feature:?} feature with role {role:?}")]
    MissingRemoteFeature {
        ski: Ski,
        feature: FeatureType,
        role: Role,
    },
}

/// A request/fetch round-trip with a remote feature failed.
#[derive(Debug, thiserror::Error)]
pub enum RemoteRequestError {
    #[error("request for {function:?} was rejected: {source}")]
    Request {
        function: FunctionType,
        #[source]
        source: TransportError,
    },

    #[error("fetching the result of {function:?} failed: {source}")]
    Fetch {
        function: FunctionType,
        #[source]
        source: TransportError,
    },

    #[error("expected {expected:?} payload, got {actual}")]
    UnexpectedPayload {
        expected: FunctionType,
        actual: &'static str,
    },
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("SKI must not be empty")]
    EmptySki,

    #[error("overrun index {index} is out of range (0..{slots})")]
    OverrunIndexOutOfRange { index: usize, slots: usize },
}

/// Opaque failure reported by the transport collaborator.
pub struct TransportError(Box<dyn std::error::Error + Send + Sync>);

impl TransportError {
    /// Wrap an adapter error.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }

    /// Build an error from a plain message (timeouts, rejections, …).
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self(message.into())
    }
}

impl fmt::Debug for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransportError").field(&self.0).finish()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}
