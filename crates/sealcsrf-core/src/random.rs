//! Operating system randomness for secrets and one-time pads.

use rand::rngs::OsRng;
use rand::RngCore;

/// The entropy source could not produce bytes.
#[derive(Debug, thiserror::Error)]
#[error("entropy source failed: {0}")]
pub struct RandomError(#[from] rand::Error);

/// Return `n` bytes from the operating system CSPRNG.
pub fn generate(n: usize) -> Result<Vec<u8>, RandomError> {
    let mut bytes = vec![0u8; n];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(bytes)
}

/// Fill `buf` from the operating system CSPRNG.
pub fn fill(buf: &mut [u8]) -> Result<(), RandomError> {
    OsRng.try_fill_bytes(buf)?;
    Ok(())
}
