//! Virtual transport error types.

use cem_domain::error::TransportError;
use cem_domain::feature::{FeatureAddress, FunctionType};
use cem_domain::id::CorrelationToken;
use cem_domain::ski::Ski;

/// Errors specific to the virtual transport.
#[derive(Debug, thiserror::Error)]
pub enum VirtualTransportError {
    /// The addressed device is not connected.
    #[error("no connected device owns feature {address}")]
    UnknownFeature { address: FeatureAddress },

    /// The device exists but does not serve the requested function.
    #[error("device {ski} does not serve {function:?}")]
    UnsupportedFunction { ski: Ski, function: FunctionType },

    /// The device rejected a write it cannot apply.
    #[error("device {ski} rejected a {payload} write")]
    WriteRejected { ski: Ski, payload: &'static str },

    /// No request is pending for this token.
    #[error("no pending request for token {0}")]
    UnknownToken(CorrelationToken),
}

impl From<VirtualTransportError> for TransportError {
    fn from(err: VirtualTransportError) -> Self {
        TransportError::new(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_unknown_feature_error() {
        let err = VirtualTransportError::UnknownFeature {
            address: FeatureAddress::new(Some("d:_i:x".to_owned()), vec![1], 2),
        };
        assert_eq!(err.to_string(), "no connected device owns feature d:_i:x/1#2");
    }

    #[test]
    fn should_display_unknown_token_error() {
        let err = VirtualTransportError::UnknownToken(CorrelationToken::new(7));
        assert_eq!(err.to_string(), "no pending request for token 7");
    }

    #[test]
    fn should_keep_message_when_converted_to_transport_error() {
        let err: TransportError = VirtualTransportError::UnsupportedFunction {
            ski: Ski::new("ski-1").unwrap(),
            function: FunctionType::HvacOverrunListData,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "device ski-1 does not serve HvacOverrunListData"
        );
    }
}
