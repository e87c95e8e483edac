use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::info;
use zeroize::{Zeroize, Zeroizing};

use stride_chain::ChainKeypair;
use stride_core::{ChallengeId, EscrowRecord, StrideError, TokenAddress};
use stride_store::Store;

/// The process-wide escrow master secret: 32 random bytes, base64 in the
/// environment. The AEAD key is SHA-256 of these bytes.
pub struct MasterKey([u8; 32]);

impl MasterKey {
    pub fn from_base64(encoded: &str) -> Result<Self, StrideError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| StrideError::EscrowKeyUnavailable(format!("bad base64: {e}")))?;
        if bytes.len() != 32 {
            return Err(StrideError::EscrowKeyUnavailable(format!(
                "master key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    fn cipher(&self) -> Aes256Gcm {
        let derived: Zeroizing<[u8; 32]> = Zeroizing::new(Sha256::digest(self.0).into());
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(derived.as_slice()))
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterKey(..)")
    }
}

/// Escrow wallet store: one encrypted keypair per challenge.
pub struct EscrowWallets {
    store: Arc<Store>,
    master: Option<MasterKey>,
}

impl EscrowWallets {
    pub fn new(store: Arc<Store>, master: Option<MasterKey>) -> Self {
        Self { store, master }
    }

    fn master(&self) -> Result<&MasterKey, StrideError> {
        self.master.as_ref().ok_or_else(|| {
            StrideError::EscrowKeyUnavailable("ESCROW_ENCRYPTION_KEY is not set".into())
        })
    }

    /// Generate and encrypt a keypair for `challenge_id` without persisting,
    /// so the caller can commit the record atomically with the challenge row.
    pub fn provision(&self, challenge_id: &ChallengeId) -> Result<EscrowRecord, StrideError> {
        let master = self.master()?;
        let keypair = ChainKeypair::generate();
        let seed = Zeroizing::new(keypair.seed_bytes());

        let mut nonce = [0u8; 12];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let ciphertext = master
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), seed.as_slice())
            .map_err(|_| StrideError::EscrowKeyUnavailable("seed encryption failed".into()))?;

        Ok(EscrowRecord {
            challenge_id: challenge_id.clone(),
            public_key: keypair.address(),
            secret_ciphertext: ciphertext,
            nonce,
            created_at: chrono::Utc::now(),
        })
    }

    /// Create the escrow wallet for a challenge, or return the existing
    /// address. Safe to call repeatedly.
    pub fn create(&self, challenge_id: &ChallengeId) -> Result<TokenAddress, StrideError> {
        if let Some(existing) = self.store.get_escrow(challenge_id)? {
            return Ok(existing.public_key);
        }
        let record = self.provision(challenge_id)?;
        self.store.put_escrow(&record)?;
        info!(challenge = %challenge_id, address = %record.public_key, "escrow wallet created");
        Ok(record.public_key)
    }

    /// Decrypt and return the signer for a challenge's escrow. Fails with
    /// `EscrowKeyUnavailable` when the record or the master key is missing.
    pub fn load(&self, challenge_id: &ChallengeId) -> Result<ChainKeypair, StrideError> {
        let record = self.store.get_escrow(challenge_id)?.ok_or_else(|| {
            StrideError::EscrowKeyUnavailable(format!("no escrow wallet for {challenge_id}"))
        })?;
        let master = self.master()?;

        let seed_vec = Zeroizing::new(
            master
                .cipher()
                .decrypt(
                    Nonce::from_slice(&record.nonce),
                    record.secret_ciphertext.as_slice(),
                )
                .map_err(|_| {
                    StrideError::EscrowKeyUnavailable(format!(
                        "seed decryption failed for {challenge_id} (wrong master key?)"
                    ))
                })?,
        );
        if seed_vec.len() != 32 {
            return Err(StrideError::EscrowKeyUnavailable(
                "decrypted seed has wrong length".into(),
            ));
        }
        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&seed_vec);
        Ok(ChainKeypair::from_seed(&seed))
    }
}
