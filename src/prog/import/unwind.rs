//! Naming for functions recovered from unwind metadata instead of a named symbol.

use sha2::{Digest, Sha256};

/// Deterministic name derived from the function's code bytes.
pub fn hashed_name(prefix: &str, code: &[u8]) -> String {
    let digest = Sha256::digest(code);
    let mut name = String::with_capacity(prefix.len() + 17);
    name.push_str(prefix);
    name.push('_');
    for byte in &digest[..8] {
        name.push_str(&format!("{byte:02x}"));
    }
    name
}

/// Fallback when the code bytes cannot be read.
pub fn offset_name(prefix: &str, offset: u64) -> String {
    format!("{prefix}_at_{offset:x}")
}
