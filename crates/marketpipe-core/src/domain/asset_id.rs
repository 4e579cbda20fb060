use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_ASSET_ID_LEN: usize = 64;

/// Normalized asset identifier as issued by the market data provider.
///
/// Identifiers are lowercase slugs (`bitcoin`, `matic-network`). The charset
/// check here is the only barrier between API-sourced strings and the SQL
/// identifiers derived from them, so it is strict: ASCII lowercase
/// alphanumerics plus `-` and `_`, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    /// Parse and normalize an asset id to lowercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyAssetId);
        }

        let normalized = trimmed.to_ascii_lowercase();
        let len = normalized.chars().count();
        if len > MAX_ASSET_ID_LEN {
            return Err(ValidationError::AssetIdTooLong {
                len,
                max: MAX_ASSET_ID_LEN,
            });
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_';
            if !valid {
                return Err(ValidationError::AssetIdInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for AssetId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for AssetId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<AssetId> for String {
    fn from(value: AssetId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_asset_id() {
        let parsed = AssetId::parse(" Bitcoin ").expect("asset id should parse");
        assert_eq!(parsed.as_str(), "bitcoin");
    }

    #[test]
    fn accepts_hyphenated_provider_ids() {
        let parsed = AssetId::parse("matic-network").expect("asset id should parse");
        assert_eq!(parsed.as_str(), "matic-network");
    }

    #[test]
    fn rejects_empty_input() {
        let err = AssetId::parse("   ").expect_err("must fail");
        assert!(matches!(err, ValidationError::EmptyAssetId));
    }

    #[test]
    fn rejects_sql_metacharacters() {
        let err = AssetId::parse("bitcoin'; drop table ohlc_bars; --").expect_err("must fail");
        assert!(matches!(err, ValidationError::AssetIdInvalidChar { .. }));
    }
}
