use rand::RngCore;

/// Generate a random 256-bit session identifier, hex encoded.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
