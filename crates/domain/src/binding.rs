//! Binding and subscription management requests.

use serde::{Deserialize, Serialize};

use crate::feature::{FeatureAddress, FeatureType};

/// Asks a remote node-management feature to bind a local client feature to
/// one of its server features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingRequest {
    pub client_address: FeatureAddress,
    pub server_address: FeatureAddress,
    pub server_feature_type: FeatureType,
}

/// A subscription announced by (or to) a remote node-management feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_address: Option<FeatureAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_address: Option<FeatureAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_feature_type: Option<FeatureType>,
}

impl SubscriptionRequest {
    /// Whether this subscription targets a server feature of `feature` type.
    #[must_use]
    pub fn targets(&self, feature: FeatureType) -> bool {
        self.server_feature_type == Some(feature)
    }
}
