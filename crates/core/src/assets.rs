//! Asset registry
//!
//! Assets are identified inside the pool by a field element. The registry is an
//! explicitly constructed, immutable lookup table handed to the pipeline; only the
//! descriptor's `id` ever reaches a hash.

use ark_bn254::Fr;

use crate::crypto::field::{parse_decimal, to_decimal};
use crate::error::CryptoError;

/// Describes one asset the pool accepts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub id: Fr,
    pub symbol: String,
    pub name: String,
    /// Number of decimal places in the asset's base unit
    pub decimals: u32,
}

impl AssetDescriptor {
    pub fn new(id: u64, symbol: &str, name: &str, decimals: u32) -> Self {
        Self {
            id: Fr::from(id),
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
        }
    }

    /// Convert a human amount such as "1.5" into base units
    pub fn to_base_units(&self, amount: &str) -> Result<Fr, CryptoError> {
        let invalid = || CryptoError::InvalidAmount(amount.to_string());

        let trimmed = amount.trim();
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > self.decimals as usize {
            return Err(invalid());
        }

        let mut digits = String::with_capacity(whole.len() + self.decimals as usize);
        digits.push_str(if whole.is_empty() { "0" } else { whole });
        digits.push_str(fraction);
        digits.extend(std::iter::repeat('0').take(self.decimals as usize - fraction.len()));

        parse_decimal(&self.symbol, &digits)
    }

    /// Render base units as a human amount, without trailing zeros
    pub fn from_base_units(&self, amount: &Fr) -> String {
        let digits = to_decimal(amount);
        let decimals = self.decimals as usize;
        if decimals == 0 {
            return digits;
        }

        let padded = format!("{:0>width$}", digits, width = decimals + 1);
        let (whole, fraction) = padded.split_at(padded.len() - decimals);
        let fraction = fraction.trim_end_matches('0');

        if fraction.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, fraction)
        }
    }
}

/// Immutable set of known assets
#[derive(Clone, Debug, Default)]
pub struct AssetRegistry {
    assets: Vec<AssetDescriptor>,
}

impl AssetRegistry {
    /// Build a registry, rejecting duplicate ids or symbols
    pub fn new(assets: Vec<AssetDescriptor>) -> Result<Self, CryptoError> {
        for (i, asset) in assets.iter().enumerate() {
            for other in &assets[..i] {
                if other.id == asset.id || other.symbol.eq_ignore_ascii_case(&asset.symbol) {
                    return Err(CryptoError::DuplicateAsset(asset.symbol.clone()));
                }
            }
        }
        Ok(Self { assets })
    }

    /// ETH, DAI, USDC and USDT with ids 1 through 4
    pub fn well_known() -> Self {
        Self {
            assets: vec![
                AssetDescriptor::new(1, "ETH", "Ethereum", 18),
                AssetDescriptor::new(2, "DAI", "Dai Stablecoin", 18),
                AssetDescriptor::new(3, "USDC", "USD Coin", 6),
                AssetDescriptor::new(4, "USDT", "Tether USD", 6),
            ],
        }
    }

    pub fn by_symbol(&self, symbol: &str) -> Result<&AssetDescriptor, CryptoError> {
        self.assets
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| CryptoError::UnknownAsset(symbol.to_string()))
    }

    pub fn by_id(&self, id: &Fr) -> Result<&AssetDescriptor, CryptoError> {
        self.assets
            .iter()
            .find(|a| a.id == *id)
            .ok_or_else(|| CryptoError::UnknownAsset(to_decimal(id)))
    }

    pub fn contains_id(&self, id: &Fr) -> bool {
        self.assets.iter().any(|a| a.id == *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetDescriptor> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_lookup() {
        let registry = AssetRegistry::well_known();
        assert_eq!(registry.len(), 4);

        let eth = registry.by_symbol("ETH").unwrap();
        assert_eq!(eth.id, Fr::from(1u64));
        assert_eq!(registry.by_symbol("usdc").unwrap().id, Fr::from(3u64));
        assert_eq!(registry.by_id(&Fr::from(4u64)).unwrap().symbol, "USDT");

        assert!(registry.by_symbol("BTC").is_err());
        assert!(!registry.contains_id(&Fr::from(9u64)));
    }

    #[test]
    fn test_duplicates_rejected() {
        let err = AssetRegistry::new(vec![
            AssetDescriptor::new(1, "ETH", "Ethereum", 18),
            AssetDescriptor::new(1, "WETH", "Wrapped Ether", 18),
        ])
        .unwrap_err();
        assert!(matches!(err, CryptoError::DuplicateAsset(_)));

        assert!(AssetRegistry::new(vec![
            AssetDescriptor::new(1, "ETH", "Ethereum", 18),
            AssetDescriptor::new(2, "eth", "Ethereum again", 18),
        ])
        .is_err());
    }

    #[test]
    fn test_to_base_units() {
        let registry = AssetRegistry::well_known();
        let eth = registry.by_symbol("ETH").unwrap();
        let usdc = registry.by_symbol("USDC").unwrap();

        assert_eq!(eth.to_base_units("1").unwrap(), Fr::from(1_000_000_000_000_000_000u64));
        assert_eq!(usdc.to_base_units("1.5").unwrap(), Fr::from(1_500_000u64));
        assert_eq!(usdc.to_base_units(".25").unwrap(), Fr::from(250_000u64));
        assert_eq!(usdc.to_base_units("0.000001").unwrap(), Fr::from(1u64));

        assert!(usdc.to_base_units("0.0000001").is_err());
        assert!(usdc.to_base_units("1,5").is_err());
        assert!(usdc.to_base_units("-1").is_err());
        assert!(usdc.to_base_units(".").is_err());
    }

    #[test]
    fn test_from_base_units() {
        let registry = AssetRegistry::well_known();
        let eth = registry.by_symbol("ETH").unwrap();
        let usdc = registry.by_symbol("USDC").unwrap();

        assert_eq!(eth.from_base_units(&Fr::from(1_000_000_000_000_000_000u64)), "1");
        assert_eq!(usdc.from_base_units(&Fr::from(1_500_000u64)), "1.5");
        assert_eq!(usdc.from_base_units(&Fr::from(1u64)), "0.000001");
        assert_eq!(usdc.from_base_units(&Fr::from(0u64)), "0");
    }
}
