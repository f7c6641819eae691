//! Destination registry: named destinations with fixed configuration.
//!
//! Destinations are registered at system configuration time and looked up
//! on every send. Registration of a taken name fails with
//! `DuplicateDestination`; lookup of an absent name fails with
//! `UnknownDestination`. Mode overrides are call-scoped (the proxy mode
//! context), never registry-scoped.

mod config;
mod destination;
mod stats;

pub use config::{BackpressurePolicy, DestinationConfig};
pub use destination::{Destination, HandlerId};
pub use stats::{DestinationStats, StatsSnapshot};

use crate::error::RegistryError;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Name-keyed map of registered destinations.
///
/// Read-mostly: writes happen at configuration time and shutdown, reads on
/// every send.
#[derive(Debug, Default)]
pub struct DestinationRegistry {
    destinations: RwLock<HashMap<String, Arc<Destination>>>,
}

impl DestinationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a destination.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateDestination`] if the name is taken.
    pub fn register(&self, destination: Arc<Destination>) -> Result<(), RegistryError> {
        let mut destinations = self.write();
        let name = destination.name().to_string();
        if destinations.contains_key(&name) {
            return Err(RegistryError::DuplicateDestination(name));
        }
        tracing::debug!(destination = %name, mode = ?destination.mode(), "destination registered");
        destinations.insert(name, destination);
        Ok(())
    }

    /// Look up a destination by name.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownDestination`] if no destination has the name.
    pub fn lookup(&self, name: &str) -> Result<Arc<Destination>, RegistryError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownDestination(name.to_string()))
    }

    /// Whether a destination with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Names of all registered destinations, unordered.
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Number of registered destinations.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Close every destination's queue. Workers drain and exit; the
    /// destinations stay registered so late lookups still resolve.
    pub fn shutdown(&self) {
        for destination in self.read().values() {
            destination.close();
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Destination>>> {
        self.destinations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Destination>>> {
        self.destinations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
