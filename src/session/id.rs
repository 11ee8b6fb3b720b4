use rand::RngCore;
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::session::SessionError;

/// Generates a session id from 16 bytes of OS randomness, laid out as a
/// version 4 UUID.
///
/// A failing random source is an error; there is no fallback generator.
pub fn generate() -> Result<String, SessionError> {
    let mut bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut bytes)?;

    let uuid: Uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
    Ok(uuid.hyphenated().to_string())
}
