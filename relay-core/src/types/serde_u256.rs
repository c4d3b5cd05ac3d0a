//! `U256` values travel as decimal strings because JSON numbers can't hold
//! them. Hex strings and plain JSON numbers are accepted when reading.

use ethers::types::U256;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawU256 {
    Str(String),
    Num(u64),
}

impl RawU256 {
    fn into_u256(self) -> Result<U256, String> {
        match self {
            RawU256::Num(n) => Ok(n.into()),
            RawU256::Str(s) => parse_u256(&s),
        }
    }
}

/// Parse a decimal or `0x`-prefixed hex string into a `U256`.
pub fn parse_u256(s: &str) -> Result<U256, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        U256::from_str_radix(hex, 16).map_err(|e| format!("invalid hex integer {s:?}: {e:?}"))
    } else {
        U256::from_dec_str(s).map_err(|e| format!("invalid decimal integer {s:?}: {e:?}"))
    }
}

/// Serialize as a decimal string
pub fn serialize<S>(n: &U256, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&n.to_string())
}

/// Deserialize from a decimal string, hex string or number
pub fn deserialize<'de, D>(d: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    RawU256::deserialize(d)?.into_u256().map_err(D::Error::custom)
}

/// Same as the parent module, for optional fields
pub mod option {
    use super::*;

    /// Serialize as a decimal string when present
    pub fn serialize<S>(maybe_n: &Option<U256>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if let Some(n) = maybe_n {
            return s.serialize_str(&n.to_string());
        }
        maybe_n.serialize(s)
    }

    /// Deserialize from a decimal string, hex string, number or null
    pub fn deserialize<'de, D>(d: D) -> Result<Option<U256>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<RawU256>::deserialize(d)?
            .map(RawU256::into_u256)
            .transpose()
            .map_err(D::Error::custom)
    }
}
