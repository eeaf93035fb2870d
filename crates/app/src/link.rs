//! Address resolution between a local feature and its remote counterpart.

use std::sync::Arc;

use cem_domain::device::{PRIMARY_ENTITY, RemoteDevice};
use cem_domain::error::AddressResolutionError;
use cem_domain::feature::{FeatureAddress, FeatureType, Role};
use cem_domain::ski::Ski;

use crate::ports::Transport;

/// A resolved local/remote feature pair on one remote device.
#[derive(Debug, Clone)]
pub struct FeatureLink {
    pub device: Arc<RemoteDevice>,
    pub local: FeatureAddress,
    pub remote: FeatureAddress,
}

impl FeatureLink {
    #[must_use]
    pub fn ski(&self) -> &Ski {
        &self.device.ski
    }
}

/// Resolve our client feature and the remote server feature of `feature`
/// on the primary entity of the device behind `ski`.
///
/// # Errors
///
/// Returns the first address that could not be resolved.
pub fn client_link<T: Transport>(
    transport: &T,
    ski: &Ski,
    feature: FeatureType,
) -> Result<FeatureLink, AddressResolutionError> {
    let device = transport
        .remote_device(ski)
        .ok_or_else(|| AddressResolutionError::UnknownDevice { ski: ski.clone() })?;
    client_link_on(transport, device, feature)
}

/// Same as [`client_link`], for a device handle already at hand.
///
/// # Errors
///
/// Returns the first address that could not be resolved.
pub fn client_link_on<T: Transport>(
    transport: &T,
    device: Arc<RemoteDevice>,
    feature: FeatureType,
) -> Result<FeatureLink, AddressResolutionError> {
    link_on(transport, device, feature, Role::Client, Role::Server)
}

/// Resolve our server feature and the remote client feature of `feature`,
/// the direction used when a remote device subscribes to us.
///
/// # Errors
///
/// Returns the first address that could not be resolved.
pub fn server_link<T: Transport>(
    transport: &T,
    ski: &Ski,
    feature: FeatureType,
) -> Result<FeatureLink, AddressResolutionError> {
    let device = transport
        .remote_device(ski)
        .ok_or_else(|| AddressResolutionError::UnknownDevice { ski: ski.clone() })?;
    link_on(transport, device, feature, Role::Server, Role::Client)
}

fn link_on<T: Transport>(
    transport: &T,
    device: Arc<RemoteDevice>,
    feature: FeatureType,
    local_role: Role,
    remote_role: Role,
) -> Result<FeatureLink, AddressResolutionError> {
    let local = transport.local_feature(feature, local_role).ok_or(
        AddressResolutionError::MissingLocalFeature {
            feature,
            role: local_role,
        },
    )?;
    let remote = device
        .feature(PRIMARY_ENTITY, feature, remote_role)
        .map(|f| f.address.clone())
        .ok_or_else(|| AddressResolutionError::MissingRemoteFeature {
            ski: device.ski.clone(),
            feature,
            role: remote_role,
        })?;
    Ok(FeatureLink {
        device,
        local,
        remote,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::{FakeTransport, evse, ski};

    #[test]
    fn should_resolve_client_link_to_remote_server() {
        let transport = FakeTransport::new();
        transport.add_device(evse("ski-1"));
        transport.add_local_feature(FeatureType::Measurement, Role::Client, "Measurement Client");

        let link = client_link(&transport, &ski("ski-1"), FeatureType::Measurement).unwrap();

        assert_eq!(link.ski(), &ski("ski-1"));
        assert_eq!(link.remote.entity, vec![1]);
        assert_eq!(
            link.device
                .feature(PRIMARY_ENTITY, FeatureType::Measurement, Role::Server)
                .map(|f| &f.address),
            Some(&link.remote)
        );
    }

    #[test]
    fn should_fail_for_unknown_device() {
        let transport = FakeTransport::new();
        let err = client_link(&transport, &ski("ski-2"), FeatureType::Measurement).unwrap_err();
        assert_eq!(
            err,
            AddressResolutionError::UnknownDevice { ski: ski("ski-2") }
        );
    }

    #[test]
    fn should_fail_without_local_feature() {
        let transport = FakeTransport::new();
        transport.add_device(evse("ski-1"));
        let err = client_link(&transport, &ski("ski-1"), FeatureType::Measurement).unwrap_err();
        assert_eq!(
            err,
            AddressResolutionError::MissingLocalFeature {
                feature: FeatureType::Measurement,
                role: Role::Client,
            }
        );
    }

    #[test]
    fn should_fail_when_remote_lacks_client_feature() {
        let transport = FakeTransport::new();
        transport.add_device(evse("ski-1"));
        transport.add_local_feature(FeatureType::Hvac, Role::Server, "Hvac Server");

        let err = server_link(&transport, &ski("ski-1"), FeatureType::Hvac).unwrap_err();

        assert!(matches!(
            err,
            AddressResolutionError::MissingRemoteFeature {
                feature: FeatureType::Hvac,
                role: Role::Client,
                ..
            }
        ));
    }
}
