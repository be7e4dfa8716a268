//! Start-key derivation.
//!
//! The user seed is hardened with PBKDF2-HMAC-SHA512 (fixed salt, 2048
//! rounds) and compressed to 32 bytes with SHA-256 before becoming the
//! sweep origin, so a guessable seed does not map directly to a key range.

use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256, Sha512};

use crate::error::{EngineError, Result};
use crate::secp::Scalar;

const SEED_SALT: &[u8] = b"VanitySearch";
const SEED_ROUNDS: u32 = 2048;
const SEED_DK_LEN: usize = 64;

/// Derive the 256-bit start key from a seed string.
pub fn derive_start_key(seed: &str) -> Result<Scalar> {
    let mut dk = [0u8; SEED_DK_LEN];
    pbkdf2_hmac::<Sha512>(seed.as_bytes(), SEED_SALT, SEED_ROUNDS, &mut dk);
    let digest: [u8; 32] = Sha256::digest(dk).into();
    let key = Scalar::from_bytes(&digest);
    if !key.is_valid_key() {
        return Err(EngineError::SeedDerivationFailed(
            "derived start key out of range".into(),
        ));
    }
    Ok(key)
}

/// Fresh process-local seed from OS entropy, hex-encoded.
pub fn random_seed() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
