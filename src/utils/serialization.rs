// src/utils/serialization.rs
//! Binary codec for health tokens.
//!
//! Layouts (all integers big-endian):
//! ```text
//! v1: [0x01][user_token:16][sig_len:1][signature:sig_len]
//! v2: [0x02][user_token:16][issued_at:8][sig_len:1][signature:sig_len]
//! ```
//! The bytes before `sig_len` are exactly the signed message. Decoding is
//! purely structural and never touches key material.
//!
//! Barcode renderers get the same bytes armoured as URL-safe, unpadded
//! base64 via [`to_transport_string`].

use crate::error::{DecodingError, EncodingError};
use crate::models::credential::{Credential, LayoutVersion, USER_TOKEN_LEN};

/// Largest signature the one-byte length prefix can describe.
pub const MAX_SIGNATURE_LEN: usize = u8::MAX as usize;

/// Serializes a credential into its versioned binary layout.
///
/// # Errors
/// `EncodingError` when the signature is empty or exceeds
/// [`MAX_SIGNATURE_LEN`]; both indicate a bug in the caller.
pub fn encode(credential: &Credential) -> Result<Vec<u8>, EncodingError> {
    let signature = credential.signature();
    if signature.is_empty() {
        return Err(EncodingError::EmptySignature);
    }
    if signature.len() > MAX_SIGNATURE_LEN {
        return Err(EncodingError::SignatureTooLong(signature.len()));
    }

    let mut out = credential.signed_message();
    out.reserve(1 + signature.len());
    out.push(signature.len() as u8);
    out.extend_from_slice(signature);
    Ok(out)
}

/// Parses a credential from its binary layout.
pub fn decode(bytes: &[u8]) -> Result<Credential, DecodingError> {
    let version_byte = *bytes.first().ok_or(DecodingError::Empty)?;
    let version =
        LayoutVersion::from_byte(version_byte).ok_or(DecodingError::UnknownVersion(version_byte))?;

    // Header plus the length prefix must be present before anything is read.
    let header_len = version.header_len();
    if bytes.len() < header_len + 1 {
        return Err(DecodingError::Truncated {
            expected: header_len + 1,
            actual: bytes.len(),
        });
    }

    let mut user_token = [0u8; USER_TOKEN_LEN];
    user_token.copy_from_slice(&bytes[1..1 + USER_TOKEN_LEN]);

    let issued_at = match version {
        LayoutVersion::V1 => None,
        LayoutVersion::V2 => {
            let mut ts = [0u8; 8];
            ts.copy_from_slice(&bytes[1 + USER_TOKEN_LEN..header_len]);
            Some(u64::from_be_bytes(ts))
        }
    };

    let sig_len = bytes[header_len] as usize;
    if sig_len == 0 {
        return Err(DecodingError::EmptySignature);
    }
    let body = &bytes[header_len + 1..];
    if body.len() < sig_len {
        return Err(DecodingError::TruncatedSignature {
            expected: sig_len,
            actual: body.len(),
        });
    }
    if body.len() > sig_len {
        return Err(DecodingError::TrailingBytes(body.len() - sig_len));
    }

    Ok(Credential::new(user_token, issued_at, body.to_vec()))
}

/// Armours encoded bytes for a 2D barcode payload.
pub fn to_transport_string(encoded: &[u8]) -> String {
    base64::encode_config(encoded, base64::URL_SAFE_NO_PAD)
}

/// Reverses [`to_transport_string`]. Surrounding whitespace from scanners is
/// ignored.
pub fn from_transport_string(armoured: &str) -> Result<Vec<u8>, DecodingError> {
    base64::decode_config(armoured.trim(), base64::URL_SAFE_NO_PAD)
        .map_err(|e| DecodingError::Armour(e.to_string()))
}

/// Encodes and armours in one step.
pub fn encode_transport(credential: &Credential) -> Result<String, EncodingError> {
    encode(credential).map(|bytes| to_transport_string(&bytes))
}

/// Removes the armour and decodes in one step.
pub fn decode_transport(armoured: &str) -> Result<Credential, DecodingError> {
    decode(&from_transport_string(armoured)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(issued_at: Option<u64>) -> Credential {
        Credential::new([0x11; USER_TOKEN_LEN], issued_at, vec![0x30, 0x02, 0xAA, 0xBB])
    }

    #[test]
    fn test_round_trip_both_layouts() {
        for credential in [sample(None), sample(Some(1_593_648_000))] {
            let bytes = encode(&credential).unwrap();
            assert_eq!(decode(&bytes).unwrap(), credential);
        }
    }

    #[test]
    fn test_v1_layout_bytes() {
        let bytes = encode(&sample(None)).unwrap();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(&bytes[1..17], &[0x11; 16]);
        assert_eq!(bytes[17], 4);
        assert_eq!(&bytes[18..], &[0x30, 0x02, 0xAA, 0xBB]);
    }

    #[test]
    fn test_encode_rejects_misuse() {
        let empty = Credential::new([0; USER_TOKEN_LEN], None, Vec::new());
        assert_eq!(encode(&empty), Err(EncodingError::EmptySignature));

        let huge = Credential::new([0; USER_TOKEN_LEN], None, vec![1; 256]);
        assert_eq!(encode(&huge), Err(EncodingError::SignatureTooLong(256)));

        // The layout is chosen from the metadata, so any signature that fits
        // the length prefix encodes under either layout.
        for issued_at in [None, Some(0), Some(u64::MAX)] {
            let widest = Credential::new([0; USER_TOKEN_LEN], issued_at, vec![1; 255]);
            let bytes = encode(&widest).unwrap();
            assert_eq!(bytes[0], widest.version().as_byte());
        }
    }

    #[test]
    fn test_decode_structural_failures() {
        let bytes = encode(&sample(None)).unwrap();

        assert_eq!(decode(&[]), Err(DecodingError::Empty));
        assert_eq!(decode(&[0x07, 0, 0]), Err(DecodingError::UnknownVersion(0x07)));
        assert!(matches!(decode(&bytes[..10]), Err(DecodingError::Truncated { .. })));
        assert_eq!(
            decode(&bytes[..bytes.len() - 1]),
            Err(DecodingError::TruncatedSignature { expected: 4, actual: 3 })
        );

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert_eq!(decode(&trailing), Err(DecodingError::TrailingBytes(1)));

        let mut zero_len = bytes[..18].to_vec();
        zero_len[17] = 0;
        assert_eq!(decode(&zero_len), Err(DecodingError::EmptySignature));
    }

    #[test]
    fn test_v2_header_truncation() {
        let bytes = encode(&sample(Some(42))).unwrap();
        // Cut inside the timestamp.
        assert!(matches!(decode(&bytes[..20]), Err(DecodingError::Truncated { .. })));
    }

    #[test]
    fn test_transport_armour() {
        let credential = sample(Some(7));
        let armoured = encode_transport(&credential).unwrap();
        assert!(armoured
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(decode_transport(&format!("  {}\n", armoured)).unwrap(), credential);
        assert!(matches!(decode_transport("not*base64"), Err(DecodingError::Armour(_))));
    }
}
