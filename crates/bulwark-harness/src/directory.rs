//! Shared key directory and seeded identities.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use bulwark_core::{DirectoryError, DirectoryRecord, Identity, KeyDirectory};
use bulwark_proto::NodeId;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Directory every simulated node shares.
///
/// Hosts register themselves when they boot, since their simulated address
/// is only known once the host is running.
#[derive(Debug, Clone, Default)]
pub struct SimDirectory {
    records: Arc<Mutex<HashMap<NodeId, DirectoryRecord>>>,
}

impl SimDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `record` under `node_id`.
    pub fn register(&self, node_id: impl Into<NodeId>, record: DirectoryRecord) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).insert(node_id.into(), record);
    }
}

#[async_trait]
impl KeyDirectory for SimDirectory {
    async fn lookup(&self, node_id: &str) -> Result<Option<DirectoryRecord>, DirectoryError> {
        Ok(self.records.lock().unwrap_or_else(PoisonError::into_inner).get(node_id).cloned())
    }
}

/// Deterministic identity for `node_id` derived from `seed`.
pub fn seeded_identity(node_id: impl Into<NodeId>, seed: u64) -> Identity {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut secret = [0u8; 32];
    rng.fill_bytes(&mut secret);
    Identity::from_secret(node_id, &secret)
}
