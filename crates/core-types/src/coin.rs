use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_ID_LEN: usize = 64;

/// A stable, lowercase identifier for a cryptocurrency (e.g. `bitcoin`).
///
/// Used both as the lookup key towards the market-data providers and as the
/// axis label of every matrix the engine produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CoinId(String);

impl CoinId {
    /// Normalises and validates a raw identifier.
    ///
    /// Surrounding whitespace is trimmed, the id is lowercased and inner spaces
    /// become dashes, so `" Shiba Inu "` parses as `shiba-inu`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let normalised = raw.trim().to_lowercase().replace(' ', "-");

        if normalised.is_empty() {
            return Err(CoreError::InvalidInput(
                "coin".to_string(),
                "coin id must not be empty".to_string(),
            ));
        }
        if normalised.len() > MAX_ID_LEN {
            return Err(CoreError::InvalidInput(
                "coin".to_string(),
                format!("'{normalised}' is longer than {MAX_ID_LEN} characters"),
            ));
        }
        if !normalised
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(CoreError::InvalidInput(
                "coin".to_string(),
                format!("'{normalised}' may only contain a-z, 0-9 and '-'"),
            ));
        }

        Ok(Self(normalised))
    }

    /// Parses a comma-separated list, dropping duplicates but keeping the
    /// order of first occurrence.
    pub fn parse_list(csv: &str) -> Result<Vec<Self>, CoreError> {
        let mut coins: Vec<Self> = Vec::new();
        for part in csv.split(',').filter(|p| !p.trim().is_empty()) {
            let coin = Self::parse(part)?;
            if !coins.contains(&coin) {
                coins.push(coin);
            }
        }

        if coins.is_empty() {
            return Err(CoreError::InvalidInput(
                "coins".to_string(),
                "at least one coin id is required".to_string(),
            ));
        }
        Ok(coins)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CoinId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CoinId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CoinId> for String {
    fn from(value: CoinId) -> Self {
        value.0
    }
}

impl AsRef<str> for CoinId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalises_case_and_spaces() {
        let coin = CoinId::parse("  Shiba Inu ").unwrap();
        assert_eq!(coin.as_str(), "shiba-inu");
    }

    #[test]
    fn parse_rejects_bad_characters() {
        assert!(CoinId::parse("bit$coin").is_err());
        assert!(CoinId::parse("   ").is_err());
        assert!(CoinId::parse(&"a".repeat(65)).is_err());
    }

    #[test]
    fn parse_list_dedupes_in_order() {
        let coins = CoinId::parse_list("ethereum, bitcoin,ETHEREUM,,solana").unwrap();
        let ids: Vec<&str> = coins.iter().map(CoinId::as_str).collect();
        assert_eq!(ids, vec!["ethereum", "bitcoin", "solana"]);
    }

    #[test]
    fn parse_list_requires_one_coin() {
        assert!(CoinId::parse_list(" , ,").is_err());
    }

    #[test]
    fn serde_goes_through_validation() {
        let coin: CoinId = serde_json::from_str("\"Bitcoin\"").unwrap();
        assert_eq!(coin.as_str(), "bitcoin");
        assert!(serde_json::from_str::<CoinId>("\"no way\u{1F600}\"").is_err());
        assert_eq!(serde_json::to_string(&coin).unwrap(), "\"bitcoin\"");
    }
}
