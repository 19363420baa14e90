//! Password hashes in the Django `pbkdf2_sha256` format
//!
//! `pbkdf2_sha256$<iterations>$<salt>$<base64(derived key)>`

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::Hmac;
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const ALGORITHM: &str = "pbkdf2_sha256";
const KEY_LEN: usize = 32;
const SALT_LEN: usize = 22;

/// Iteration count used when hashing new passwords
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Check a password against an encoded hash
///
/// Any unparsable hash is a mismatch, never an error.
pub fn verify(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.splitn(4, '$');
    let (Some(algorithm), Some(iterations), Some(salt), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    if algorithm != ALGORITHM {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let Ok(expected) = STANDARD.decode(expected) else {
        return false;
    };
    let Some(derived) = derive(password, salt, iterations) else {
        return false;
    };

    derived.ct_eq(&expected).into()
}

/// Hash a password with a random salt
pub fn hash(password: &str, iterations: u32) -> crate::Result<String> {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect();

    let derived = derive(password, &salt, iterations)
        .ok_or_else(|| crate::Error::invalid_input("password hashing failed"))?;

    Ok(format!(
        "{}${}${}${}",
        ALGORITHM,
        iterations,
        salt,
        STANDARD.encode(derived)
    ))
}

fn derive(password: &str, salt: &str, iterations: u32) -> Option<[u8; KEY_LEN]> {
    if iterations == 0 {
        return None;
    }
    let mut output = [0u8; KEY_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt.as_bytes(), iterations, &mut output)
        .ok()?;
    Some(output)
}
