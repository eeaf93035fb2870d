//! Transport port — everything the core needs from the session layer.
//!
//! The transport discovers remote devices by SKI, keeps them trusted, and
//! publishes [`UseCaseEvent`](cem_domain::event::UseCaseEvent)s through an
//! [`EventPublisher`](super::EventPublisher). The core only uses the
//! request/fetch, subscribe and write primitives below.

use std::future::Future;
use std::sync::Arc;

use cem_domain::binding::BindingRequest;
use cem_domain::device::RemoteDevice;
use cem_domain::error::TransportError;
use cem_domain::event::DataPayload;
use cem_domain::feature::{FeatureAddress, FeatureType, FunctionType, Role, UseCaseSupport};
use cem_domain::id::CorrelationToken;
use cem_domain::ski::Ski;

/// Session-layer collaborator used by every use case.
pub trait Transport: Send + Sync {
    /// Resolve a connected remote device by its SKI.
    fn remote_device(&self, ski: &Ski) -> Option<Arc<RemoteDevice>>;

    /// Address of a local feature, if one with this type and role exists.
    fn local_feature(&self, feature: FeatureType, role: Role) -> Option<FeatureAddress>;

    /// Add (or return the existing) local feature on the local entity.
    fn add_local_feature(
        &self,
        feature: FeatureType,
        role: Role,
        description: &str,
    ) -> FeatureAddress;

    /// Advertise use-case support on the local entity.
    fn announce_use_case(&self, support: UseCaseSupport);

    /// Allow connections to the remote service identified by `ski`.
    fn register_remote_service(&self, ski: &Ski);

    /// Mark the remote service as trusted (or revoke trust).
    fn update_trust(&self, ski: &Ski, trusted: bool);

    /// Ask `remote` for the data of `function`.
    ///
    /// Returns the token used to [`fetch_result`](Self::fetch_result).
    fn request_data(
        &self,
        function: FunctionType,
        local: &FeatureAddress,
        remote: &FeatureAddress,
    ) -> impl Future<Output = Result<CorrelationToken, TransportError>> + Send;

    /// Wait for the answer to a previous request.
    fn fetch_result(
        &self,
        token: CorrelationToken,
        remote: &FeatureAddress,
    ) -> impl Future<Output = Result<DataPayload, TransportError>> + Send;

    /// Subscribe `local` to change notifications of `remote`.
    fn subscribe(
        &self,
        local: &FeatureAddress,
        remote: &FeatureAddress,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Write a binding request to the remote node-management feature.
    fn write_binding(
        &self,
        local: &FeatureAddress,
        node_management: &FeatureAddress,
        request: BindingRequest,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Write data to a remote server feature.
    fn write_data(
        &self,
        local: &FeatureAddress,
        remote: &FeatureAddress,
        payload: DataPayload,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Start sending heartbeats from `sender` to `destination` on `ski`.
    fn start_heartbeat(
        &self,
        ski: &Ski,
        sender: &FeatureAddress,
        destination: &FeatureAddress,
    ) -> Result<(), TransportError>;
}

impl<T: Transport> Transport for Arc<T> {
    fn remote_device(&self, ski: &Ski) -> Option<Arc<RemoteDevice>> {
        (**self).remote_device(ski)
    }

    fn local_feature(&self, feature: FeatureType, role: Role) -> Option<FeatureAddress> {
        (**self).local_feature(feature, role)
    }

    fn add_local_feature(
        &self,
        feature: FeatureType,
        role: Role,
        description: &str,
    ) -> FeatureAddress {
        (**self).add_local_feature(feature, role, description)
    }

    fn announce_use_case(&self, support: UseCaseSupport) {
        (**self).announce_use_case(support);
    }

    fn register_remote_service(&self, ski: &Ski) {
        (**self).register_remote_service(ski);
    }

    fn update_trust(&self, ski: &Ski, trusted: bool) {
        (**self).update_trust(ski, trusted);
    }

    fn request_data(
        &self,
        function: FunctionType,
        local: &FeatureAddress,
        remote: &FeatureAddress,
    ) -> impl Future<Output = Result<CorrelationToken, TransportError>> + Send {
        (**self).request_data(function, local, remote)
    }

    fn fetch_result(
        &self,
        token: CorrelationToken,
        remote: &FeatureAddress,
    ) -> impl Future<Output = Result<DataPayload, TransportError>> + Send {
        (**self).fetch_result(token, remote)
    }

    fn subscribe(
        &self,
        local: &FeatureAddress,
        remote: &FeatureAddress,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).subscribe(local, remote)
    }

    fn write_binding(
        &self,
        local: &FeatureAddress,
        node_management: &FeatureAddress,
        request: BindingRequest,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).write_binding(local, node_management, request)
    }

    fn write_data(
        &self,
        local: &FeatureAddress,
        remote: &FeatureAddress,
        payload: DataPayload,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).write_data(local, remote, payload)
    }

    fn start_heartbeat(
        &self,
        ski: &Ski,
        sender: &FeatureAddress,
        destination: &FeatureAddress,
    ) -> Result<(), TransportError> {
        (**self).start_heartbeat(ski, sender, destination)
    }
}
