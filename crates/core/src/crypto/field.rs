//! Field element encoding
//!
//! Every domain value (secrets, identifiers, amounts, tree nodes) is an element of
//! the BN254 scalar field. Values cross the API boundary as decimal strings and are
//! rejected, not reduced, when they fall outside the canonical range.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use std::str::FromStr;

use crate::error::CryptoError;

/// A BN254 scalar field element
pub type FieldElement = Fr;

/// Parse a canonical decimal string into a field element
///
/// Leading zeros are accepted. Values greater than or equal to the field modulus
/// are an error rather than being silently reduced.
pub fn parse_decimal(name: &str, value: &str) -> Result<Fr, CryptoError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CryptoError::InvalidDecimal {
            field: name.to_string(),
            value: value.to_string(),
        });
    }

    let digits = match trimmed.trim_start_matches('0') {
        "" => "0",
        rest => rest,
    };

    let parsed = Fr::from_str(digits).map_err(|_| CryptoError::OutOfFieldRange {
        field: name.to_string(),
    })?;

    // Fr::from_str accumulates in the field, so a value above the modulus
    // only shows up as a mismatch against its canonical representation.
    if to_decimal(&parsed) != digits {
        return Err(CryptoError::OutOfFieldRange {
            field: name.to_string(),
        });
    }

    Ok(parsed)
}

/// Format a field element as its canonical decimal string
pub fn to_decimal(value: &Fr) -> String {
    value.into_bigint().to_string()
}

/// Parse a list of decimal strings, naming each element by index in errors
pub fn parse_decimal_list(name: &str, values: &[String]) -> Result<Vec<Fr>, CryptoError> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| parse_decimal(&format!("{}[{}]", name, i), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// BN254 scalar field modulus
    const MODULUS: &str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617";

    #[test]
    fn test_parse_small_values() {
        assert_eq!(parse_decimal("x", "0").unwrap(), Fr::from(0u64));
        assert_eq!(parse_decimal("x", "123").unwrap(), Fr::from(123u64));
        assert_eq!(parse_decimal("x", "000456").unwrap(), Fr::from(456u64));
        assert_eq!(
            parse_decimal("x", "1000000000000000000").unwrap(),
            Fr::from(1_000_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_decimal("x", "").is_err());
        assert!(parse_decimal("x", "-1").is_err());
        assert!(parse_decimal("x", "12a").is_err());
        assert!(parse_decimal("x", "0x10").is_err());
        assert!(parse_decimal("x", "1.5").is_err());
    }

    #[test]
    fn test_parse_rejects_modulus_and_above() {
        let err = parse_decimal("secret", MODULUS).unwrap_err();
        assert!(matches!(err, CryptoError::OutOfFieldRange { .. }));

        let above = "99999999999999999999999999999999999999999999999999999999999999999999999999999";
        assert!(parse_decimal("secret", above).is_err());
    }

    #[test]
    fn test_parse_accepts_modulus_minus_one() {
        let max = -Fr::from(1u64);
        let decimal = to_decimal(&max);
        assert_eq!(parse_decimal("x", &decimal).unwrap(), max);
    }

    #[test]
    fn test_decimal_format() {
        assert_eq!(to_decimal(&Fr::from(0u64)), "0");
        assert_eq!(to_decimal(&Fr::from(789u64)), "789");
    }

    #[test]
    fn test_parse_list_names_index() {
        let values = vec!["1".to_string(), "oops".to_string()];
        match parse_decimal_list("merklePath", &values).unwrap_err() {
            CryptoError::InvalidDecimal { field, .. } => assert_eq!(field, "merklePath[1]"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
