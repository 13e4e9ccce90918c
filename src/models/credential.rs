// src/models/credential.rs
//! Health token data model.
//!
//! A [`Credential`] binds a random, unlinkable user token to the issuer's
//! signature. Nothing in it names the holder: the only derived identifier is
//! the [`Cid`], a digest of the token used for revocation lookups.

use crate::utils::crypto::sha256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of the random user token (128 bits of entropy).
pub const USER_TOKEN_LEN: usize = 16;

/// Length of a credential identifier (SHA-256 output).
pub const CID_LEN: usize = 32;

/// Binary layout version of an encoded credential.
///
/// The version byte is part of the signed message, so a signature made for
/// one layout never verifies under the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutVersion {
    /// `[0x01][user_token][sig_len][signature]`
    V1,
    /// `[0x02][user_token][issued_at: u64 BE][sig_len][signature]`
    V2,
}

impl LayoutVersion {
    /// Leading byte that tags an encoded credential with this layout.
    ///
    /// # Returns
    /// `0x01` for [`LayoutVersion::V1`], `0x02` for [`LayoutVersion::V2`].
    pub fn as_byte(self) -> u8 {
        match self {
            LayoutVersion::V1 => 0x01,
            LayoutVersion::V2 => 0x02,
        }
    }

    /// Reads the layout from the leading byte of an encoded credential.
    ///
    /// # Arguments
    /// * `byte` - First byte of the payload
    ///
    /// # Returns
    /// `None` for any byte that is not a known layout tag.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(LayoutVersion::V1),
            0x02 => Some(LayoutVersion::V2),
            _ => None,
        }
    }

    /// Bytes preceding the signature length prefix.
    pub fn header_len(self) -> usize {
        match self {
            LayoutVersion::V1 => 1 + USER_TOKEN_LEN,
            LayoutVersion::V2 => 1 + USER_TOKEN_LEN + 8,
        }
    }
}

/// Credential identifier: SHA-256 of the user token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid([u8; CID_LEN]);

impl Cid {
    /// Derives the identifier of the token. Deterministic and one-way.
    pub fn from_user_token(user_token: &[u8; USER_TOKEN_LEN]) -> Self {
        Cid(sha256(user_token))
    }

    /// Wraps a digest taken from a revocation list.
    pub fn from_bytes(bytes: [u8; CID_LEN]) -> Self {
        Cid(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CID_LEN] {
        &self.0
    }

    /// Lowercase hex, the form used in revocation lists.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.to_hex())
    }
}

impl FromStr for Cid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|e| e.to_string())?;
        let bytes: [u8; CID_LEN] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| format!("expected {} bytes, got {}", CID_LEN, v.len()))?;
        Ok(Cid(bytes))
    }
}

impl Serialize for Cid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A signed health token.
///
/// Immutable once issued. `issued_at` is present exactly when the layout is
/// [`LayoutVersion::V2`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    user_token: [u8; USER_TOKEN_LEN],
    issued_at: Option<u64>,
    signature: Vec<u8>,
}

impl Credential {
    /// Assembles a credential from its parts. No signature check happens
    /// here; that belongs to the verifier.
    ///
    /// # Arguments
    /// * `user_token` - Random token held by the holder
    /// * `issued_at` - Optional issuance time in Unix seconds; selects the layout
    /// * `signature` - DER-encoded ECDSA signature over [`Credential::signed_message`]
    pub fn new(user_token: [u8; USER_TOKEN_LEN], issued_at: Option<u64>, signature: Vec<u8>) -> Self {
        Credential {
            user_token,
            issued_at,
            signature,
        }
    }

    pub fn user_token(&self) -> &[u8; USER_TOKEN_LEN] {
        &self.user_token
    }

    /// Issuance time in Unix seconds, when the issuer stamped one.
    pub fn issued_at(&self) -> Option<u64> {
        self.issued_at
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Layout this credential encodes to, derived from `issued_at`.
    pub fn version(&self) -> LayoutVersion {
        if self.issued_at.is_some() {
            LayoutVersion::V2
        } else {
            LayoutVersion::V1
        }
    }

    pub fn cid(&self) -> Cid {
        Cid::from_user_token(&self.user_token)
    }

    /// The exact bytes covered by the issuer's signature.
    pub fn signed_message(&self) -> Vec<u8> {
        signed_message(&self.user_token, self.issued_at)
    }
}

// The user token is the holder's secret; keep it out of logs and panics.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("cid", &self.cid())
            .field("issued_at", &self.issued_at)
            .field("signature_len", &self.signature.len())
            .finish()
    }
}

/// Builds the signed message: the encoded credential up to the signature
/// length prefix.
pub fn signed_message(user_token: &[u8; USER_TOKEN_LEN], issued_at: Option<u64>) -> Vec<u8> {
    let version = if issued_at.is_some() {
        LayoutVersion::V2
    } else {
        LayoutVersion::V1
    };
    let mut message = Vec::with_capacity(version.header_len());
    message.push(version.as_byte());
    message.extend_from_slice(user_token);
    if let Some(ts) = issued_at {
        message.extend_from_slice(&ts.to_be_bytes());
    }
    message
}
