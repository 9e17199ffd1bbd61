//! The service registry.

use std::collections::HashMap;

use portico_protocol::ServiceId;
use thiserror::Error;

use crate::endpoint::Endpoint;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("service {0} registered more than once")]
    DuplicateService(ServiceId),
}

/// Maps service identifiers to endpoints. Built once at startup — each
/// module contributes a fragment and [`merge`](Self::merge) amalgamates
/// them — then read concurrently by every dispatch without locking.
#[derive(Debug, Default)]
pub struct ServiceMap {
    endpoints: HashMap<ServiceId, Endpoint>,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ServiceId, endpoint: Endpoint) -> Result<(), RegistryError> {
        if self.endpoints.contains_key(&id) {
            return Err(RegistryError::DuplicateService(id));
        }
        self.endpoints.insert(id, endpoint);
        Ok(())
    }

    /// Fold another module's fragment into this map. Colliding service ids
    /// are a startup error, never a silent overwrite.
    pub fn merge(&mut self, fragment: ServiceMap) -> Result<(), RegistryError> {
        for (id, endpoint) in fragment.endpoints {
            self.register(id, endpoint)?;
        }
        Ok(())
    }

    pub fn get(&self, id: ServiceId) -> Option<&Endpoint> {
        self.endpoints.get(&id)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
