//! Packet signing, verification and replay protection.
//!
//! # Signing
//!
//! The signed message is the SHA-256 digest of the packet's canonical
//! encoding with the signature field stripped ([`Packet::digest`]). Any
//! router on the path can verify it, and forwarding never re-signs.
//!
//! # Replay protection
//!
//! Every source numbers its packets with a strictly increasing sequence. The
//! authenticator remembers the highest sequence accepted per source and
//! rejects anything at or below it. The final check and the cache update
//! happen under one lock, so two concurrent packets carrying the same
//! sequence can never both pass.
//!
//! MASTERCONFIG packets come over the trusted configuration channel and skip
//! all of this, including the sequence cache.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use bulwark_proto::{NodeId, Packet, PacketType, ProtocolError};
use ed25519_dalek::{Signature, Verifier};
use tracing::debug;

use crate::{
    error::AuthError,
    identity::{Identity, TrustStore},
};

/// Signs outgoing packets and authenticates incoming ones.
pub struct Authenticator {
    identity: Identity,
    trust: TrustStore,
    sequences: Mutex<HashMap<NodeId, u64>>,
    next_sequence: AtomicU64,
}

impl Authenticator {
    /// Authenticator for `identity`, resolving peer keys through `trust`.
    ///
    /// Own sequence numbers start at zero.
    pub fn new(identity: Identity, trust: TrustStore) -> Self {
        Self {
            identity,
            trust,
            sequences: Mutex::new(HashMap::new()),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Start own sequence numbers at `initial` instead of zero.
    ///
    /// Peers remember the last sequence they accepted from us, so a restarted
    /// node must not reuse numbers from its previous run.
    #[must_use]
    pub fn with_initial_sequence(self, initial: u64) -> Self {
        self.next_sequence.store(initial, Ordering::SeqCst);
        self
    }

    /// This node's identity
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Peer key cache
    pub fn trust(&self) -> &TrustStore {
        &self.trust
    }

    /// Allocate the next sequence number for a packet from this node.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Highest sequence accepted so far from `source`.
    pub fn last_accepted(&self, source: &str) -> Option<u64> {
        let sequences = self.sequences.lock().unwrap_or_else(PoisonError::into_inner);
        sequences.get(source).copied()
    }

    /// Sign `packet` with this node's key.
    ///
    /// Any existing signature is ignored when hashing and then replaced.
    pub fn sign(&self, mut packet: Packet) -> Result<Packet, ProtocolError> {
        let digest = packet.digest()?;
        packet.signature = Some(self.identity.sign(&digest).to_bytes().to_vec());
        Ok(packet)
    }

    /// Authenticate `packet`, returning `false` on any failure.
    ///
    /// On success the source's sequence cache advances to the packet's
    /// sequence.
    pub async fn verify(&self, packet: &Packet) -> bool {
        match self.check(packet).await {
            Ok(()) => true,
            Err(e) => {
                debug!(source = %packet.source, sequence = packet.sequence, "rejected packet: {e}");
                false
            },
        }
    }

    /// Authenticate `packet`, naming the reason on failure.
    pub async fn check(&self, packet: &Packet) -> Result<(), AuthError> {
        if packet.packet_type == PacketType::MasterConfig {
            return Ok(());
        }

        let signature_bytes = packet
            .signature
            .as_deref()
            .ok_or_else(|| AuthError::MissingSignature(packet.source.clone()))?;

        // Cheap early exit before any key lookup; the authoritative check is
        // repeated under the lock below.
        self.ensure_fresh(&self.lock_sequences(), packet)?;

        let signature = Signature::from_slice(signature_bytes)
            .map_err(|_| AuthError::InvalidSignature(packet.source.clone()))?;
        let digest = packet.digest()?;
        let key = self.trust.lookup_public_key(&packet.source).await?;

        key.verify(&digest, &signature)
            .map_err(|_| AuthError::InvalidSignature(packet.source.clone()))?;

        let mut sequences = self.lock_sequences();
        self.ensure_fresh(&sequences, packet)?;
        sequences.insert(packet.source.clone(), packet.sequence);

        Ok(())
    }

    fn lock_sequences(&self) -> std::sync::MutexGuard<'_, HashMap<NodeId, u64>> {
        self.sequences.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_fresh(&self, sequences: &HashMap<NodeId, u64>, packet: &Packet) -> Result<(), AuthError> {
        match sequences.get(&packet.source) {
            Some(&last) if packet.sequence <= last => Err(AuthError::StaleSequence {
                node: packet.source.clone(),
                sequence: packet.sequence,
                last,
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("identity", &self.identity)
            .field("next_sequence", &self.next_sequence.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
