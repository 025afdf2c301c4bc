use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Default token size in bytes (256 bits of entropy).
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// Generate a random token suitable for session identifiers and CSRF tokens.
///
/// Hex encoded, drawn from the operating system's CSPRNG.
pub fn generate_token() -> String {
    generate_token_with_size(DEFAULT_TOKEN_BYTES)
}

/// Generate a random hex token from `bytes` bytes of entropy.
pub fn generate_token_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buffer);
    hex::encode(buffer)
}

/// Compare two tokens without leaking the position of the first mismatch.
pub fn tokens_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
