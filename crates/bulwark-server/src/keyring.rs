//! Keyring file loading.
//!
//! The keyring is produced by the provisioning tooling and read once at
//! startup:
//!
//! ```json
//! {
//!   "keypair": { "private": "<hex secret>", "public": "<hex key>" },
//!   "keyring": [ { "address": "10.0.0.2", "public_key": "<hex key>" } ]
//! }
//! ```
//!
//! `keypair.public` is optional; when present it must match the secret.

use std::{fs, path::Path};

use bulwark_core::{DirectoryRecord, Identity, StaticDirectory};
use bulwark_proto::NodeId;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::Deserialize;

use crate::error::ServerError;

#[derive(Deserialize)]
struct KeyringFile {
    keypair: KeypairEntry,
    #[serde(default)]
    keyring: Vec<KeyringEntry>,
}

#[derive(Deserialize)]
struct KeypairEntry {
    private: String,
    public: Option<String>,
}

#[derive(Deserialize)]
struct KeyringEntry {
    address: NodeId,
    public_key: String,
}

/// This node's signing key plus the peer keys it trusts up front.
pub struct Keyring {
    signing_key: SigningKey,
    trusted: Vec<DirectoryRecord>,
}

impl Keyring {
    /// Read and parse the keyring at `path`.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let json = fs::read_to_string(path)
            .map_err(|e| ServerError::Keyring(format!("{}: {e}", path.display())))?;
        Self::parse(&json)
    }

    /// Parse keyring JSON.
    pub fn parse(json: &str) -> Result<Self, ServerError> {
        let file: KeyringFile =
            serde_json::from_str(json).map_err(|e| ServerError::Keyring(e.to_string()))?;

        let secret: [u8; 32] = decode_hex_32(&file.keypair.private, "keypair.private")?;
        let signing_key = SigningKey::from_bytes(&secret);

        if let Some(public) = &file.keypair.public {
            let declared = decode_key(public, "keypair.public")?;
            if declared != signing_key.verifying_key() {
                return Err(ServerError::Keyring(
                    "keypair.public does not match keypair.private".into(),
                ));
            }
        }

        let trusted = file
            .keyring
            .into_iter()
            .map(|entry| {
                let public_key = decode_key(&entry.public_key, &entry.address)?;
                Ok(DirectoryRecord { address: entry.address, public_key })
            })
            .collect::<Result<Vec<_>, ServerError>>()?;

        Ok(Self { signing_key, trusted })
    }

    /// Identity signing as `node_id` with the keyring's key.
    pub fn identity(&self, node_id: impl Into<NodeId>) -> Identity {
        Identity::new(node_id, self.signing_key.clone())
    }

    /// Trusted peer records
    pub fn trusted(&self) -> &[DirectoryRecord] {
        &self.trusted
    }

    /// Directory serving the trusted records plus this node's own key under
    /// `node_id`.
    pub fn directory(&self, node_id: impl Into<NodeId>) -> StaticDirectory {
        let own = self.identity(node_id).record();
        StaticDirectory::from_records(self.trusted.iter().cloned().chain([own]))
    }
}

fn decode_hex_32(text: &str, field: &str) -> Result<[u8; 32], ServerError> {
    let bytes = hex::decode(text.trim())
        .map_err(|e| ServerError::Keyring(format!("{field}: invalid hex: {e}")))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        ServerError::Keyring(format!("{field}: expected 32 bytes, got {}", bytes.len()))
    })
}

fn decode_key(text: &str, field: &str) -> Result<VerifyingKey, ServerError> {
    let bytes = decode_hex_32(text, field)?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| ServerError::Keyring(format!("{field}: invalid public key: {e}")))
}
