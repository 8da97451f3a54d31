//! ROUTEUPDATE payload.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    packet::NodeId,
};

/// Destinations reachable through the advertising router.
///
/// Reachability only: there is no metric. Serialized as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteUpdate {
    /// Advertised destinations
    pub destinations: Vec<NodeId>,
}

impl RouteUpdate {
    /// Advertisement for the given destinations.
    pub fn new(destinations: Vec<NodeId>) -> Self {
        Self { destinations }
    }

    /// Parse from packet payload text.
    pub fn from_payload(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| ProtocolError::InvalidPayload(e.to_string()))
    }

    /// Render as packet payload text.
    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_as_bare_array() {
        let update = RouteUpdate::new(vec!["3.3.3.3".into(), "4.4.4.4".into()]);
        assert_eq!(update.to_payload().unwrap(), r#"["3.3.3.3","4.4.4.4"]"#);
    }

    #[test]
    fn rejects_object_payload() {
        assert!(RouteUpdate::from_payload(r#"{"hosts": []}"#).is_err());
    }
}
