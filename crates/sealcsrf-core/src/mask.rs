//! One-time-pad masking of the secret.
//!
//! A masked token is `base64url(pad || (pad XOR secret))`. The pad is fresh
//! for every token, so the wire value changes on every response while still
//! authenticating the same secret. This keeps the secret out of reach of
//! compression-oracle attacks such as BREACH.

use crate::random::{self, RandomError};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Errors from [`mask`] and [`mask_with_pad`].
#[derive(Debug, thiserror::Error)]
pub enum MaskError {
    /// Zero-length secrets cannot be masked.
    #[error("cannot mask an empty secret")]
    EmptySecret,

    /// The pad must be exactly as long as the secret.
    #[error("pad length {actual} does not match secret length {expected}")]
    PadLength {
        /// Secret length
        expected: usize,
        /// Supplied pad length
        actual: usize,
    },

    /// No pad could be generated.
    #[error(transparent)]
    Entropy(#[from] RandomError),
}

/// Mask `secret` with a freshly generated pad.
pub fn mask(secret: &[u8]) -> Result<String, MaskError> {
    if secret.is_empty() {
        return Err(MaskError::EmptySecret);
    }

    let pad = Zeroizing::new(random::generate(secret.len())?);
    mask_with_pad(secret, &pad)
}

/// Mask `secret` with the given pad.
pub fn mask_with_pad(secret: &[u8], pad: &[u8]) -> Result<String, MaskError> {
    if secret.is_empty() {
        return Err(MaskError::EmptySecret);
    }
    if pad.len() != secret.len() {
        return Err(MaskError::PadLength {
            expected: secret.len(),
            actual: pad.len(),
        });
    }

    let mut raw = Zeroizing::new(Vec::with_capacity(secret.len() * 2));
    raw.extend_from_slice(pad);
    raw.extend(pad.iter().zip(secret).map(|(p, s)| p ^ s));

    Ok(URL_SAFE_NO_PAD.encode(raw.as_slice()))
}

/// Check that `token` unmasks to `secret`.
///
/// Any decoding problem, a wrong length or an empty secret yields `false`.
/// The final comparison runs in constant time with respect to the contents.
pub fn unmask(token: &str, secret: &[u8]) -> bool {
    if secret.is_empty() {
        return false;
    }

    let decoded = match URL_SAFE_NO_PAD.decode(token) {
        Ok(decoded) => Zeroizing::new(decoded),
        Err(_) => return false,
    };

    if decoded.len() != secret.len() * 2 {
        return false;
    }

    let (pad, masked) = decoded.split_at(secret.len());
    let candidate: Zeroizing<Vec<u8>> =
        Zeroizing::new(pad.iter().zip(masked).map(|(p, m)| p ^ m).collect());

    candidate.as_slice().ct_eq(secret).into()
}
