//! Cancellation tokens.
//!
//! A token is the only credential a patient holds for their appointment, so
//! it must be unguessable: 32 bytes from the thread-local CSPRNG, encoded as
//! URL-safe base64 without padding (43 characters).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

const TOKEN_BYTES: usize = 32;

/// Mint a fresh cancellation token.
pub fn mint() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
