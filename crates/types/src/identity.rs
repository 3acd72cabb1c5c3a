use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing a caller identity string.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IdentityError {
    #[error("identity must start with '0x'")]
    InvalidPrefix,
    #[error("identity must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("identity payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Number of raw bytes contained in an identity.
pub const IDENTITY_BYTES: usize = 20;
/// Expected string length of an encoded identity (`0x` + 40 hex chars).
pub const IDENTITY_STRING_LENGTH: usize = 2 + IDENTITY_BYTES * 2;

/// Opaque caller address supplied by the wallet for every operation.
///
/// The marketplace never authenticates identities itself; it only compares
/// them. Encoded form is `0x` followed by lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(pub [u8; IDENTITY_BYTES]);

impl Identity {
    /// Account that holds escrowed bid value. It can never take a role.
    pub const ESCROW: Identity = Identity([0u8; IDENTITY_BYTES]);

    pub const fn new(bytes: [u8; IDENTITY_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_BYTES] {
        &self.0
    }

    pub fn is_escrow(&self) -> bool {
        *self == Self::ESCROW
    }

    /// Lowercase `0x`-prefixed rendering.
    pub fn to_hex(&self) -> String {
        let mut encoded = String::with_capacity(IDENTITY_STRING_LENGTH);
        encoded.push_str("0x");
        encoded.push_str(&hex::encode(self.0));
        encoded
    }

    /// Parse a `0x`-prefixed identity; hex digits may be in either case.
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let payload = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(IdentityError::InvalidPrefix)?;

        if s.len() != IDENTITY_STRING_LENGTH {
            return Err(IdentityError::InvalidLength {
                expected: IDENTITY_STRING_LENGTH,
                actual: s.len(),
            });
        }

        let mut bytes = [0u8; IDENTITY_BYTES];
        hex::decode_to_slice(payload, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.to_hex())
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; IDENTITY_BYTES]> for Identity {
    fn from(value: [u8; IDENTITY_BYTES]) -> Self {
        Identity(value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.to_hex()
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identity::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        let id = Identity::new([0xABu8; IDENTITY_BYTES]);
        let encoded = id.to_string();
        assert!(encoded.starts_with("0x"));
        assert_eq!(encoded.len(), IDENTITY_STRING_LENGTH);
        assert_eq!(encoded.parse::<Identity>().unwrap(), id);
    }

    #[test]
    fn uppercase_hex_accepted() {
        let parsed = Identity::parse("0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD").unwrap();
        assert_eq!(parsed.0[0], 0xAB);
        assert_eq!(parsed.to_hex(), "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd");
    }

    #[test]
    fn invalid_prefix_rejected() {
        let bad = "1x".to_string() + &"00".repeat(IDENTITY_BYTES);
        assert_eq!(Identity::parse(&bad), Err(IdentityError::InvalidPrefix));
    }

    #[test]
    fn invalid_length_rejected() {
        let bad = "0x".to_string() + &"00".repeat(IDENTITY_BYTES - 1);
        assert!(matches!(
            Identity::parse(&bad),
            Err(IdentityError::InvalidLength { .. })
        ));
    }

    #[test]
    fn invalid_hex_rejected() {
        let bad = format!("0x{}", "zz".repeat(IDENTITY_BYTES));
        assert!(matches!(
            Identity::parse(&bad),
            Err(IdentityError::InvalidHex(_))
        ));
    }

    #[test]
    fn invalid_hex_reports_offending_character() {
        let bad = format!("0x{}", "zz".repeat(IDENTITY_BYTES));
        assert_eq!(
            Identity::parse(&bad),
            Err(IdentityError::InvalidHex(
                hex::FromHexError::InvalidHexCharacter { c: 'z', index: 0 }
            ))
        );
    }

    #[test]
    fn serde_uses_string_form() {
        let id = Identity::new([7u8; IDENTITY_BYTES]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn escrow_is_zero_address() {
        assert!(Identity::ESCROW.is_escrow());
        assert!(!Identity::new([1u8; IDENTITY_BYTES]).is_escrow());
    }
}
