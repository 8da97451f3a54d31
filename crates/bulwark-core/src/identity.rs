//! Node identity and the trust store for peer keys.
//!
//! Each router signs with one Ed25519 key supplied at startup. Peer
//! verification keys come from an external [`KeyDirectory`] and are cached in
//! a [`TrustStore`] after the first successful lookup.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use bulwark_proto::NodeId;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use tracing::debug;

use crate::error::DirectoryError;

/// This node's name and signing key.
#[derive(Clone)]
pub struct Identity {
    node_id: NodeId,
    signing_key: SigningKey,
}

impl Identity {
    /// Identity for `node_id` signing with `signing_key`.
    pub fn new(node_id: impl Into<NodeId>, signing_key: SigningKey) -> Self {
        Self { node_id: node_id.into(), signing_key }
    }

    /// Identity from a raw 32-byte Ed25519 secret.
    pub fn from_secret(node_id: impl Into<NodeId>, secret: &[u8; 32]) -> Self {
        Self::new(node_id, SigningKey::from_bytes(secret))
    }

    /// This node's identifier
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Public half of the signing key
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Directory record advertising this identity
    pub fn record(&self) -> DirectoryRecord {
        DirectoryRecord { address: self.node_id.clone(), public_key: self.verifying_key() }
    }

    /// Sign a message digest.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("node_id", &self.node_id)
            .field("public_key", &self.verifying_key())
            .finish_non_exhaustive()
    }
}

/// Directory entry binding an address to its verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Address the record claims to describe
    pub address: NodeId,
    /// Ed25519 verification key
    pub public_key: VerifyingKey,
}

/// External lookup service mapping node identifiers to public keys.
///
/// Queried only on a [`TrustStore`] cache miss. Implementations return
/// `Ok(None)` when no record exists and `Err` when the directory itself
/// cannot be reached.
#[async_trait]
pub trait KeyDirectory: Send + Sync + 'static {
    /// Fetch the record stored under `node_id`.
    async fn lookup(&self, node_id: &str) -> Result<Option<DirectoryRecord>, DirectoryError>;
}

/// In-memory directory, typically built from a keyring file.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    records: HashMap<NodeId, DirectoryRecord>,
}

impl StaticDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding each record under its own address.
    pub fn from_records(records: impl IntoIterator<Item = DirectoryRecord>) -> Self {
        let mut directory = Self::new();
        for record in records {
            directory.insert(record.address.clone(), record);
        }
        directory
    }

    /// Store `record` under the lookup key `node_id`.
    ///
    /// The key and the record's declared address normally match; the
    /// [`TrustStore`] refuses records where they do not.
    pub fn insert(&mut self, node_id: impl Into<NodeId>, record: DirectoryRecord) {
        self.records.insert(node_id.into(), record);
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the directory holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl KeyDirectory for StaticDirectory {
    async fn lookup(&self, node_id: &str) -> Result<Option<DirectoryRecord>, DirectoryError> {
        Ok(self.records.get(node_id).cloned())
    }
}

/// Cache of peer verification keys backed by a [`KeyDirectory`].
///
/// Append-only: once a key is cached for a node it is never replaced.
pub struct TrustStore {
    cache: Mutex<HashMap<NodeId, VerifyingKey>>,
    directory: Arc<dyn KeyDirectory>,
}

impl TrustStore {
    /// Trust store resolving misses through `directory`.
    pub fn new(directory: Arc<dyn KeyDirectory>) -> Self {
        Self { cache: Mutex::new(HashMap::new()), directory }
    }

    /// Seed the cache with a key obtained out of band (keyring file).
    ///
    /// An existing entry wins.
    pub fn preload(&self, node_id: impl Into<NodeId>, key: VerifyingKey) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.entry(node_id.into()).or_insert(key);
    }

    /// Cached key for `node_id`, without consulting the directory.
    pub fn cached(&self, node_id: &str) -> Option<VerifyingKey> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(node_id).copied()
    }

    /// Resolve the verification key for `node_id`.
    ///
    /// Checks the cache first. On a miss, queries the directory and trusts
    /// the result only if the record's declared address equals `node_id`.
    pub async fn lookup_public_key(&self, node_id: &str) -> Result<VerifyingKey, DirectoryError> {
        if let Some(key) = self.cached(node_id) {
            return Ok(key);
        }

        let record = self
            .directory
            .lookup(node_id)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(node_id.to_string()))?;

        if record.address != node_id {
            return Err(DirectoryError::AddressMismatch {
                requested: node_id.to_string(),
                declared: record.address,
            });
        }

        debug!(node = node_id, "cached directory key");

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(*cache.entry(node_id.to_string()).or_insert(record.public_key))
    }
}

impl fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self.cache.lock().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("TrustStore").field("cached", &cached).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn identity(node_id: &str, seed: u8) -> Identity {
        Identity::from_secret(node_id, &[seed; 32])
    }

    /// Directory that counts how often it is asked.
    struct CountingDirectory {
        inner: StaticDirectory,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl KeyDirectory for CountingDirectory {
        async fn lookup(&self, node_id: &str) -> Result<Option<DirectoryRecord>, DirectoryError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(node_id).await
        }
    }

    #[tokio::test]
    async fn lookup_caches_directory_result() {
        let peer = identity("10.0.0.2", 2);
        let directory = Arc::new(CountingDirectory {
            inner: StaticDirectory::from_records([peer.record()]),
            lookups: AtomicUsize::new(0),
        });
        let store = TrustStore::new(directory.clone());

        assert_eq!(store.lookup_public_key("10.0.0.2").await.unwrap(), peer.verifying_key());
        assert_eq!(store.lookup_public_key("10.0.0.2").await.unwrap(), peer.verifying_key());
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_record_is_an_error() {
        let store = TrustStore::new(Arc::new(StaticDirectory::new()));
        assert_eq!(
            store.lookup_public_key("10.0.0.9").await,
            Err(DirectoryError::NotFound("10.0.0.9".into()))
        );
    }

    #[tokio::test]
    async fn mismatched_record_is_rejected_and_not_cached() {
        let attacker = identity("10.0.0.66", 66);
        let mut directory = StaticDirectory::new();
        directory.insert("10.0.0.2", attacker.record());
        let store = TrustStore::new(Arc::new(directory));

        assert!(matches!(
            store.lookup_public_key("10.0.0.2").await,
            Err(DirectoryError::AddressMismatch { .. })
        ));
        assert!(store.cached("10.0.0.2").is_none());
    }

    #[tokio::test]
    async fn preloaded_key_skips_directory() {
        let peer = identity("10.0.0.2", 2);
        let store = TrustStore::new(Arc::new(StaticDirectory::new()));
        store.preload("10.0.0.2", peer.verifying_key());

        assert_eq!(store.lookup_public_key("10.0.0.2").await.unwrap(), peer.verifying_key());
    }

    #[test]
    fn preload_never_replaces_cached_key() {
        let first = identity("10.0.0.2", 2);
        let second = identity("10.0.0.2", 3);
        let store = TrustStore::new(Arc::new(StaticDirectory::new()));

        store.preload("10.0.0.2", first.verifying_key());
        store.preload("10.0.0.2", second.verifying_key());
        assert_eq!(store.cached("10.0.0.2"), Some(first.verifying_key()));
    }
}
