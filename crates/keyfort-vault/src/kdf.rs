// SPDX-FileCopyrightText: 2026 Keyfort Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! scrypt key derivation from a passphrase.
//!
//! Derives a 32-byte master key with a stored 16-byte salt. The default cost
//! (N=2^15, r=8, p=1) makes brute-forcing a short passphrase impractical on
//! a workstation; tests lower `log_n`.

use keyfort_core::KeyfortError;
use scrypt::Params;
use zeroize::Zeroizing;

use crate::crypto;

/// KDF salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derive a 32-byte key from a passphrase using scrypt.
///
/// The returned key is wrapped in [`Zeroizing`] for automatic memory zeroing
/// on drop.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
    log_n: u8,
    r: u32,
    p: u32,
) -> Result<Zeroizing<[u8; 32]>, KeyfortError> {
    let params = Params::new(log_n, r, p, 32)
        .map_err(|e| KeyfortError::Crypto(format!("invalid scrypt parameters: {e}")))?;

    let mut output = Zeroizing::new([0u8; 32]);
    scrypt::scrypt(passphrase, salt, &params, output.as_mut())
        .map_err(|e| KeyfortError::Crypto(format!("scrypt key derivation failed: {e}")))?;

    Ok(output)
}

/// Generate a random 16-byte salt.
pub fn generate_salt() -> Result<[u8; SALT_LEN], KeyfortError> {
    let mut salt = [0u8; SALT_LEN];
    crypto::random_bytes(&mut salt)?;
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low cost for fast tests.
    const TEST_LOG_N: u8 = 10;

    #[test]
    fn derive_key_is_deterministic_for_same_inputs() {
        let salt = [1u8; SALT_LEN];
        let key1 = derive_key(b"test passphrase", &salt, TEST_LOG_N, 8, 1).unwrap();
        let key2 = derive_key(b"test passphrase", &salt, TEST_LOG_N, 8, 1).unwrap();
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn different_passphrase_produces_different_key() {
        let salt = [2u8; SALT_LEN];
        let key1 = derive_key(b"passphrase one", &salt, TEST_LOG_N, 8, 1).unwrap();
        let key2 = derive_key(b"passphrase two", &salt, TEST_LOG_N, 8, 1).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn different_salt_produces_different_key() {
        let key1 = derive_key(b"same passphrase", &[1u8; SALT_LEN], TEST_LOG_N, 8, 1).unwrap();
        let key2 = derive_key(b"same passphrase", &[2u8; SALT_LEN], TEST_LOG_N, 8, 1).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn generate_salt_produces_random_values() {
        let salt1 = generate_salt().unwrap();
        let salt2 = generate_salt().unwrap();
        assert_ne!(salt1, salt2);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let salt = [0u8; SALT_LEN];
        // r = 0 is not a valid scrypt parameter.
        assert!(derive_key(b"x", &salt, TEST_LOG_N, 0, 1).is_err());
    }
}
