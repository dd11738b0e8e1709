// Controller key obfuscation and pool keys
//
// External callers only ever see an opaque key per controller: the
// controller id XORed with a SHA-1 derived keystream, then URL-safe
// base64. This hides ids from casual inspection and is NOT encryption.
// Pool keys are a one-way SHA-256 of that opaque key.

use std::fmt;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use sha1::{Digest as _, Sha1};
use sha2::Sha256;

use crate::error::PortalError;

/// URL-safe alphabet, padded on encode, padding optional on decode.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Inputs longer than this take 8 keystream bytes per hash round instead of 2.
const LONG_INPUT: usize = 100;

/// Obfuscate `plain` into an opaque, URL-safe key.
pub fn xor_encrypt(plain: &str, secret: &str) -> String {
    KEY_ENGINE.encode(xor(plain.as_bytes(), secret.as_bytes()))
}

/// Reverse [`xor_encrypt`].
pub fn xor_decrypt(encoded: &str, secret: &str) -> Result<String, PortalError> {
    let bytes = KEY_ENGINE
        .decode(encoded.trim())
        .map_err(|e| PortalError::validation(format!("Malformed controller key: {e}")))?;
    String::from_utf8(xor(&bytes, secret.as_bytes()))
        .map_err(|_| PortalError::validation("Malformed controller key: not valid UTF-8"))
}

fn xor(input: &[u8], secret: &[u8]) -> Vec<u8> {
    let chunk = if input.len() > LONG_INPUT { 8 } else { 2 };
    let mut keystream = Vec::with_capacity(input.len() + chunk);
    while keystream.len() < input.len() {
        let digest = Sha1::new()
            .chain_update(secret)
            .chain_update(&keystream)
            .finalize();
        keystream.extend_from_slice(&digest[..chunk]);
    }
    input.iter().zip(&keystream).map(|(b, k)| b ^ k).collect()
}

/// One-way identifier for a connection pool slot.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PoolKey(String);

impl PoolKey {
    /// Lowercase hex SHA-256 of the trimmed external key.
    pub fn derive(external_key: &str) -> Self {
        Self(hex::encode(Sha256::digest(external_key.trim().as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..12).unwrap_or(&self.0);
        write!(f, "PoolKey({short}…)")
    }
}
