//! Student PIN generation and hashing
//!
//! PINs are 4-digit login secrets for children, not passwords; they are
//! stored salted and hashed so a database dump does not leak them directly,
//! and shown in plaintext exactly once at generation or reset time.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a random 4-digit PIN (1000-9999, no leading zeros)
pub fn generate_pin() -> String {
    let mut rng = rand::thread_rng();
    rng.gen_range(1000..=9999).to_string()
}

/// Hash a PIN with a fresh random salt, producing `salt_hex$hash_hex`
pub fn hash_pin(pin: &str) -> String {
    let mut salt = [0u8; 8];
    rand::thread_rng().fill(&mut salt);
    let salt_hex = hex::encode(salt);
    format!("{}${}", salt_hex, digest(&salt_hex, pin))
}

/// Verify a PIN against a stored `salt_hex$hash_hex` value
pub fn verify_pin(pin: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt_hex, hash_hex)) => digest(salt_hex, pin) == hash_hex,
        None => false,
    }
}

fn digest(salt_hex: &str, pin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(pin.as_bytes());
    hex::encode(hasher.finalize())
}
