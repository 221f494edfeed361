use rand::{rngs::OsRng, RngCore};

/// Opaque single-use credential for password recovery: 32 bytes of OS entropy,
/// hex-encoded. Looked up by exact match; carries no structure of its own.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
