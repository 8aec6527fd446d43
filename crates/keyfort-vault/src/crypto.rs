// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations.
//!
//! Every call to [`seal`] generates a fresh random 96-bit IV via the system
//! CSPRNG. Nonce reuse would be catastrophic for GCM security.
//!
//! Two framings are built on the same primitive:
//! - [`encrypt`]/[`decrypt`]: a single base64 string of `IV ‖ tag ‖
//!   ciphertext`, used for credential records.
//! - [`seal`]/[`open`]: raw parts, used by the session store's blob JSON.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use keyfort_core::KeyfortError;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// AES-GCM IV length in bytes.
pub const IV_LEN: usize = 12;
/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;
/// Master key length in bytes.
pub const KEY_LEN: usize = 32;

/// The raw output of one seal operation.
#[derive(Debug, Clone)]
pub struct SealedParts {
    pub iv: [u8; IV_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

fn make_key(key: &[u8]) -> Result<LessSafeKey, KeyfortError> {
    if key.len() != KEY_LEN {
        return Err(KeyfortError::InvalidKeyLength { actual: key.len() });
    }
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| KeyfortError::Crypto("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt plaintext with AES-256-GCM using a fresh random 96-bit IV.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<SealedParts, KeyfortError> {
    let sealing = make_key(key)?;

    let rng = SystemRandom::new();
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv)
        .map_err(|_| KeyfortError::Crypto("failed to generate random IV".to_string()))?;
    let nonce = Nonce::assume_unique_for_key(iv);

    // Seal in place: the buffer is extended with the authentication tag.
    let mut in_out = plaintext.to_vec();
    sealing
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| KeyfortError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    let tag_start = in_out.len() - TAG_LEN;
    let tag_bytes = in_out.split_off(tag_start);
    let tag: [u8; TAG_LEN] = tag_bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyfortError::Crypto("AES-256-GCM produced a malformed tag".to_string()))?;

    Ok(SealedParts {
        iv,
        tag,
        ciphertext: in_out,
    })
}

/// Decrypt AES-256-GCM output produced by [`seal`].
///
/// Returns the plaintext in a [`Zeroizing`] buffer so callers can keep its
/// lifetime short. Fails with `AuthenticationFailed` if the key is wrong or
/// the data was tampered with; no byte of the decryption buffer leaks into
/// the error.
pub fn open(
    key: &[u8],
    iv: &[u8; IV_LEN],
    tag: &[u8; TAG_LEN],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, KeyfortError> {
    let opening = make_key(key)?;
    let nonce = Nonce::assume_unique_for_key(*iv);

    // ring expects ciphertext ‖ tag contiguously.
    let mut in_out = Zeroizing::new(Vec::with_capacity(ciphertext.len() + TAG_LEN));
    in_out.extend_from_slice(ciphertext);
    in_out.extend_from_slice(tag);

    let plaintext = opening
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| KeyfortError::AuthenticationFailed)?;

    Ok(Zeroizing::new(plaintext.to_vec()))
}

/// Encrypt plaintext and frame it as base64(`IV ‖ tag ‖ ciphertext`).
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<String, KeyfortError> {
    let parts = seal(key, plaintext)?;
    let mut framed = Vec::with_capacity(IV_LEN + TAG_LEN + parts.ciphertext.len());
    framed.extend_from_slice(&parts.iv);
    framed.extend_from_slice(&parts.tag);
    framed.extend_from_slice(&parts.ciphertext);
    Ok(BASE64.encode(framed))
}

/// Decrypt a base64(`IV ‖ tag ‖ ciphertext`) blob produced by [`encrypt`].
pub fn decrypt(key: &[u8], blob: &str) -> Result<Zeroizing<Vec<u8>>, KeyfortError> {
    let framed = BASE64
        .decode(blob)
        .map_err(|e| KeyfortError::Crypto(format!("invalid base64 in encrypted blob: {e}")))?;
    if framed.len() < IV_LEN + TAG_LEN {
        return Err(KeyfortError::CiphertextTooShort {
            actual: framed.len(),
            minimum: IV_LEN + TAG_LEN,
        });
    }

    let iv: [u8; IV_LEN] = framed[..IV_LEN]
        .try_into()
        .map_err(|_| KeyfortError::Crypto("malformed IV in encrypted blob".to_string()))?;
    let tag: [u8; TAG_LEN] = framed[IV_LEN..IV_LEN + TAG_LEN]
        .try_into()
        .map_err(|_| KeyfortError::Crypto("malformed tag in encrypted blob".to_string()))?;

    open(key, &iv, &tag, &framed[IV_LEN + TAG_LEN..])
}

/// Generate a random 32-byte key suitable for AES-256-GCM.
pub fn generate_key() -> Result<Zeroizing<[u8; KEY_LEN]>, KeyfortError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    random_bytes(key.as_mut())?;
    Ok(key)
}

/// Fill a buffer with bytes from the system CSPRNG.
pub fn random_bytes(buf: &mut [u8]) -> Result<(), KeyfortError> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| KeyfortError::Crypto("system CSPRNG failure".to_string()))
}
