use serde::{Deserialize, Serialize};
use std::fmt;

/// Token amount in micro-units (1 token = 1_000_000 micros, 6-decimal
/// fixed-point). u64 holds ~18.4 trillion display tokens, far beyond any
/// escrow balance this system handles.
pub type Micros = u64;

/// An instant in time. All instants are UTC; civil-day interpretation
/// happens in stride-time against the configured challenge zone.
pub type Instant = chrono::DateTime<chrono::Utc>;

// ── String-backed ids ────────────────────────────────────────────────────────

macro_rules! string_id {
    ($name:ident, $prefix:literal) => {
        /// Opaque identifier, UUID v4 under the hood.
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "({})"), &self.0)
            }
        }
    };
}

string_id!(ChallengeId, "ChallengeId");
string_id!(UserId, "UserId");
string_id!(SubmissionId, "SubmissionId");
string_id!(JobId, "JobId");

// ── TokenAddress ─────────────────────────────────────────────────────────────

/// 32-byte token-chain account address (ed25519 public key), rendered base-58.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAddress(pub [u8; 32]);

impl TokenAddress {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_b58(s: &str) -> Result<Self, crate::error::StrideError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| crate::error::StrideError::InvalidAddress(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(crate::error::StrideError::InvalidAddress(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenAddress({})", &self.to_b58()[..8.min(self.to_b58().len())])
    }
}

// ── DateKey ──────────────────────────────────────────────────────────────────

/// A civil day in the challenge timezone, encoded "YYYY-MM-DD".
///
/// Lexicographic order equals chronological order, so `DateKey` doubles as a
/// sortable sled key component. Construction always validates the encoding.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateKey(String);

impl DateKey {
    /// Parse and validate a "YYYY-MM-DD" string.
    pub fn parse(s: &str) -> Result<Self, crate::error::StrideError> {
        let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| crate::error::StrideError::InvalidDateKey(format!("{s}: {e}")))?;
        Ok(Self(date.format("%Y-%m-%d").to_string()))
    }

    pub fn from_naive(date: chrono::NaiveDate) -> Self {
        Self(date.format("%Y-%m-%d").to_string())
    }

    /// The civil date this key encodes. Infallible: keys only exist validated.
    pub fn to_naive(&self) -> chrono::NaiveDate {
        chrono::NaiveDate::parse_from_str(&self.0, "%Y-%m-%d")
            .expect("DateKey is validated at construction")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateKey({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_key_rejects_garbage() {
        assert!(DateKey::parse("2025-13-01").is_err());
        assert!(DateKey::parse("not-a-date").is_err());
        assert!(DateKey::parse("2025-02-30").is_err());
    }

    #[test]
    fn date_key_roundtrips() {
        let k = DateKey::parse("2025-06-30").unwrap();
        assert_eq!(k.as_str(), "2025-06-30");
        assert_eq!(DateKey::from_naive(k.to_naive()), k);
    }

    #[test]
    fn date_key_orders_chronologically() {
        let a = DateKey::parse("2025-09-30").unwrap();
        let b = DateKey::parse("2025-10-01").unwrap();
        assert!(a < b);
    }

    #[test]
    fn token_address_b58_roundtrip() {
        let addr = TokenAddress::from_bytes([7u8; 32]);
        let s = addr.to_b58();
        assert_eq!(TokenAddress::from_b58(&s).unwrap(), addr);
    }

    #[test]
    fn token_address_rejects_short_input() {
        assert!(TokenAddress::from_b58("abc").is_err());
    }
}
