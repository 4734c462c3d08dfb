//! Field elements as they come off the indexer and the RPC.
//!
//! Arithmetic and the short-string codec come from `starknet`. The wrapper adds the
//! lenient serde shapes Torii returns and the padded hex forms its keys are stored under.

use crate::error::{
    Error,
    Result,
};
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
    de,
};
use starknet::core::{
    types::Felt as StarkFelt,
    utils::{
        cairo_short_string_to_felt,
        parse_cairo_short_string,
    },
};
use std::{
    fmt,
    str::FromStr,
};

const HEX_NIBBLES: usize = 64;
const MAX_DECIMAL_DIGITS: usize = 78;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Felt(StarkFelt);

impl Felt {
    pub const ZERO: Felt = Felt(StarkFelt::ZERO);

    pub fn is_zero(&self) -> bool {
        self.0 == StarkFelt::ZERO
    }

    /// Accepts `0x`-prefixed hex or plain decimal.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let invalid = || Error::Decode(format!("invalid felt {trimmed:?}"));
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(digits) => {
                let significant = digits.trim_start_matches('0');
                if digits.is_empty()
                    || significant.len() > HEX_NIBBLES
                    || !digits.bytes().all(|b| b.is_ascii_hexdigit())
                {
                    return Err(invalid());
                }
                let significant = if significant.is_empty() { "0" } else { significant };
                StarkFelt::from_hex(&format!("0x{}", significant.to_ascii_lowercase()))
            }
            None => {
                if trimmed.is_empty()
                    || trimmed.len() > MAX_DECIMAL_DIGITS
                    || !trimmed.bytes().all(|b| b.is_ascii_digit())
                {
                    return Err(invalid());
                }
                StarkFelt::from_dec_str(trimmed)
            }
        };
        parsed.map(Felt).map_err(|_| invalid())
    }

    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Felt(StarkFelt::from_bytes_be(&bytes))
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_bytes_be()
    }

    /// Canonical form: `0x` followed by lowercase hex with no leading zeros.
    pub fn to_hex(&self) -> String {
        self.0.to_hex_string()
    }

    /// Left-pads the hex digits to `nibbles`, as Torii stores keys.
    pub fn to_padded_hex(&self, nibbles: usize) -> String {
        let digits = self.to_hex();
        let digits = digits.trim_start_matches("0x");
        format!("0x{digits:0>nibbles$}")
    }

    pub fn pad_u64(&self) -> String {
        self.to_padded_hex(16)
    }

    pub fn pad_address(&self) -> String {
        self.to_padded_hex(HEX_NIBBLES)
    }

    pub fn to_u64(&self) -> Option<u64> {
        let bytes = self.to_be_bytes();
        if bytes[..24].iter().any(|b| *b != 0) {
            return None;
        }
        Some(self.low_u64())
    }

    /// The least significant 64 bits.
    pub fn low_u64(&self) -> u64 {
        let bytes = self.to_be_bytes();
        let mut low = [0u8; 8];
        low.copy_from_slice(&bytes[24..]);
        u64::from_be_bytes(low)
    }

    /// Cairo short string: up to 31 ASCII bytes.
    pub fn from_short_string(s: &str) -> Result<Self> {
        cairo_short_string_to_felt(s)
            .map(Felt)
            .map_err(|e| Error::Decode(format!("invalid short string {s:?}: {e}")))
    }

    /// Falls back to the hex form when the value is not a short string.
    pub fn decode_short_string(&self) -> String {
        parse_cairo_short_string(&self.0).unwrap_or_else(|_| self.to_hex())
    }

    pub fn into_inner(self) -> StarkFelt {
        self.0
    }
}

impl Default for Felt {
    fn default() -> Self {
        Felt::ZERO
    }
}

impl From<StarkFelt> for Felt {
    fn from(value: StarkFelt) -> Self {
        Felt(value)
    }
}

impl From<Felt> for StarkFelt {
    fn from(value: Felt) -> Self {
        value.0
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Felt(StarkFelt::from(value))
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        Felt(StarkFelt::from(value))
    }
}

impl FromStr for Felt {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Felt::parse(s)
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Felt({})", self.to_hex())
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FeltVisitor)
    }
}

struct FeltVisitor;

impl de::Visitor<'_> for FeltVisitor {
    type Value = Felt;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a felt as a number, a hex string or a decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Felt, E> {
        Ok(Felt::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Felt, E> {
        u64::try_from(v)
            .map(Felt::from)
            .map_err(|_| E::custom(format!("negative felt {v}")))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Felt, E> {
        Ok(Felt::from(u64::from(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Felt, E> {
        Felt::parse(v).map_err(E::custom)
    }
}

/// Field deserializers for the shapes Torii uses for plain scalars: JSON numbers, `0/1`
/// booleans and hex strings all show up depending on the column type.
pub mod lenient {
    use super::Felt;
    use serde::{
        Deserialize,
        Deserializer,
        de,
    };

    pub fn bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(u64),
            Str(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(b),
            Raw::Int(i) => Ok(i != 0),
            Raw::Str(s) => match s.trim() {
                "true" => Ok(true),
                "false" | "" => Ok(false),
                other => Felt::parse(other)
                    .map(|felt| !felt.is_zero())
                    .map_err(de::Error::custom),
            },
        }
    }

    pub fn u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let felt = Felt::deserialize(deserializer)?;
        felt.to_u64()
            .ok_or_else(|| de::Error::custom(format!("{felt} does not fit in u64")))
    }

    pub fn u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let value = u64(deserializer)?;
        u32::try_from(value)
            .map_err(|_| de::Error::custom(format!("{value} does not fit in u32")))
    }

    pub fn u8<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let value = u64(deserializer)?;
        u8::try_from(value)
            .map_err(|_| de::Error::custom(format!("{value} does not fit in u8")))
    }

    /// Short-string columns such as `"player_name.value"`.
    pub fn short_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<String, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match raw {
            serde_json::Value::Null => Ok(String::new()),
            serde_json::Value::String(s) if !s.starts_with("0x") && s.parse::<u128>().is_err() => {
                Ok(s)
            }
            other => Felt::deserialize(other)
                .map(|felt| felt.decode_short_string())
                .map_err(de::Error::custom),
        }
    }
}
