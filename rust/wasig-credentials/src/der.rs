//! Strict parsing of the DER ECDSA signatures authenticators return.
//!
//! ```text
//! 0x30 len | 0x02 r_len r | 0x02 s_len s
//! ```
//!
//! DER integers are minimal and signed, so a 32-byte scalar may arrive with a
//! leading zero byte (33 bytes) or with fewer than 32 bytes. Both are
//! normalized to exactly 32 bytes.

use crate::CredentialError;
use wasig_encoding::SerialReader;

const SEQUENCE_TAG: u8 = 0x30;
const INTEGER_TAG: u8 = 0x02;

/// Length of a normalized `r` or `s` scalar.
pub const SCALAR_LENGTH: usize = 32;

/// Parses a DER signature into fixed-width `(r, s)`.
///
/// # Errors
///
/// - [`CredentialError::SignatureMalformed`] if the tags or lengths are wrong,
///   bytes follow `s`, or either scalar is zero.
/// - [`CredentialError::SignatureOverflow`] if a scalar has a non-zero byte
///   beyond 32 bytes.
pub fn parse_der_signature(
    der: &[u8],
) -> Result<([u8; SCALAR_LENGTH], [u8; SCALAR_LENGTH]), CredentialError> {
    let mut reader = SerialReader::new(der);

    if reader.get_byte().ok() != Some(SEQUENCE_TAG) {
        return Err(malformed("missing DER prefix"));
    }
    let declared = reader
        .get_byte()
        .map_err(|_| malformed("missing sequence length"))?;
    if usize::from(declared) != der.len() - 2 {
        return Err(malformed("bad length"));
    }

    let r = read_scalar(&mut reader, "r")?;
    let s = read_scalar(&mut reader, "s")?;

    if !reader.is_empty() {
        return Err(malformed("trailing bytes after s"));
    }

    Ok((r, s))
}

fn read_scalar(
    reader: &mut SerialReader<'_>,
    name: &str,
) -> Result<[u8; SCALAR_LENGTH], CredentialError> {
    if reader.get_byte().ok() != Some(INTEGER_TAG) {
        return Err(malformed(&format!("bad {name} marker")));
    }
    let length = reader
        .get_byte()
        .map_err(|_| malformed(&format!("missing {name} length")))?;
    let bytes = reader
        .get_bytes_exact(usize::from(length))
        .map_err(|_| malformed(&format!("{name} runs past the end")))?;

    let scalar = fit_scalar(bytes)?;
    if scalar.iter().all(|byte| *byte == 0) {
        return Err(malformed(&format!("{name} is zero")));
    }
    Ok(scalar)
}

/// Left-pads short integers and strips leading zeros from long ones.
fn fit_scalar(bytes: &[u8]) -> Result<[u8; SCALAR_LENGTH], CredentialError> {
    let excess = bytes.len().saturating_sub(SCALAR_LENGTH);
    let (overflow, significant) = bytes.split_at(excess);
    if overflow.iter().any(|byte| *byte != 0) {
        return Err(CredentialError::SignatureOverflow);
    }

    let mut scalar = [0u8; SCALAR_LENGTH];
    scalar[SCALAR_LENGTH - significant.len()..].copy_from_slice(significant);
    Ok(scalar)
}

fn malformed(reason: &str) -> CredentialError {
    CredentialError::SignatureMalformed(format!("signature has {reason}"))
}
