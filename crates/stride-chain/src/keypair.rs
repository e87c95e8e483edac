use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use zeroize::Zeroizing;

use stride_core::{StrideError, TokenAddress};

/// An ed25519 chain keypair: escrow signers and the process-wide fee-payer.
///
/// The seed is held inside `SigningKey`, which wipes itself on drop; the
/// secret only ever leaves this type as transaction signatures.
pub struct ChainKeypair {
    signing: SigningKey,
}

impl ChainKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing: SigningKey::generate(&mut rng),
        }
    }

    /// Restore a keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// Parse the conventional 64-byte JSON array keyfile format
    /// (seed followed by public key). Accepts bare 32-byte seeds too.
    pub fn from_json(json: &str) -> Result<Self, StrideError> {
        let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
            serde_json::from_str(json)
                .map_err(|e| StrideError::FeePayerUnavailable(format!("bad keypair JSON: {e}")))?,
        );
        if bytes.len() != 64 && bytes.len() != 32 {
            return Err(StrideError::FeePayerUnavailable(format!(
                "keypair JSON must hold 32 or 64 bytes, got {}",
                bytes.len()
            )));
        }
        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&bytes[..32]);
        Ok(Self::from_seed(&seed))
    }

    /// The 32-byte seed, for encryption at rest. Callers wrap it in a
    /// zeroizing buffer immediately.
    pub fn seed_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// The on-chain address: the base-58 rendering of the public key.
    pub fn address(&self) -> TokenAddress {
        TokenAddress::from_bytes(self.signing.verifying_key().to_bytes())
    }

    /// Sign `message`, returning the 64-byte detached signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for ChainKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChainKeypair {{ address: {} }}", self.address())
    }
}
