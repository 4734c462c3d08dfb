use crate::{
    error::{
        Error,
        Result,
    },
    felt::Felt,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

/// Identifier of a minted game-access token.
///
/// Users type these as decimal (`95048`) or hex (`0x17348`); the canonical form is
/// lowercase hex with a single `0x` prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Felt", into = "Felt")]
pub struct TokenId(u64);

impl TokenId {
    pub fn new(value: u64) -> Result<Self> {
        if value == 0 {
            return Err(Error::InvalidTokenId("0".to_string()));
        }
        Ok(TokenId(value))
    }

    /// Parses a user-supplied token id.
    pub fn normalize(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidTokenId(raw.to_string()));
        }
        let felt =
            Felt::parse(trimmed).map_err(|_| Error::InvalidTokenId(raw.to_string()))?;
        let value = felt
            .to_u64()
            .ok_or_else(|| Error::InvalidTokenId(raw.to_string()))?;
        TokenId::new(value).map_err(|_| Error::InvalidTokenId(raw.to_string()))
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Column form used by the `GameToken` table.
    pub fn padded(&self) -> String {
        Felt::from(self.0).pad_u64()
    }
}

/// String-to-string normalization for route segments.
pub fn normalize_str(raw: &str) -> Result<String> {
    TokenId::normalize(raw).map(|id| id.to_string())
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for TokenId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TokenId::normalize(s)
    }
}

impl TryFrom<Felt> for TokenId {
    type Error = Error;

    fn try_from(felt: Felt) -> Result<Self> {
        let value = felt
            .to_u64()
            .ok_or_else(|| Error::InvalidTokenId(felt.to_hex()))?;
        TokenId::new(value)
    }
}

impl From<TokenId> for Felt {
    fn from(id: TokenId) -> Self {
        Felt::from(id.0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalize__decimal_token_becomes_canonical_hex() {
        assert_eq!(normalize_str("95048").unwrap(), "0x17348");
    }

    #[test]
    fn normalize__accepts_upper_case_prefix_and_whitespace() {
        assert_eq!(normalize_str("  0X17348 ").unwrap(), "0x17348");
    }

    #[test]
    fn normalize__rejects_empty_zero_and_garbage() {
        for raw in ["", "   ", "0", "0x0", "abc", "-5", "0x1ffffffffffffffff"] {
            assert!(
                matches!(TokenId::normalize(raw), Err(Error::InvalidTokenId(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn padded__matches_game_token_column_format() {
        let id = TokenId::normalize("95048").unwrap();

        assert_eq!(id.padded(), "0x0000000000017348");
    }

    proptest! {
        #[test]
        fn normalize__is_idempotent_for_decimal_and_hex_inputs(value in 1u64..) {
            let once_dec = normalize_str(&value.to_string()).unwrap();
            let once_hex = normalize_str(&format!("{value:#x}")).unwrap();

            prop_assert_eq!(&normalize_str(&once_dec).unwrap(), &once_dec);
            prop_assert_eq!(&once_dec, &once_hex);
        }
    }
}
