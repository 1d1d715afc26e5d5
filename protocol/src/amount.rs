//! # Amount Codec
//!
//! Converts between what humans type (`"1.25"`) and what the vault accounts
//! in (`1_250_000_000_000_000_000` units). Everything is integer arithmetic:
//! a `u128` intermediate holds `whole * 10^decimals + fraction`, which is
//! wide enough to detect any overflow past `u64::MAX` exactly. No float ever
//! touches an amount.

use crate::config::{DISPLAY_FRACTION_DIGITS, UNIT_DECIMALS};
use crate::error::{AmountRejection, Result, VaultError};

/// Parser and formatter for decimal amounts at a fixed unit precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AmountCodec {
    decimals: u32,
    display_digits: u32,
}

impl AmountCodec {
    /// Builds a codec. `display_digits` is clamped to `decimals`, and
    /// `decimals` to 19 (the largest power of ten a `u64` scale can hold).
    pub fn new(decimals: u32, display_digits: u32) -> Self {
        let decimals = decimals.min(19);
        Self {
            decimals,
            display_digits: display_digits.min(decimals),
        }
    }

    /// 18 decimals, 6 shown. The native asset's codec.
    pub fn ether() -> Self {
        Self::new(UNIT_DECIMALS, DISPLAY_FRACTION_DIGITS)
    }

    /// A codec whose formatting keeps every fractional digit, so that
    /// `to_decimal_string` is the exact inverse of `to_units`.
    pub fn exact(decimals: u32) -> Self {
        Self::new(decimals, decimals)
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn display_digits(&self) -> u32 {
        self.display_digits
    }

    fn scale(&self) -> u128 {
        10u128.pow(self.decimals)
    }

    /// Parses a positive decimal string into units.
    ///
    /// Surrounding whitespace is ignored. Rejects empty input, anything that
    /// is not `digits[.digits]`, signs, more fractional digits than the unit
    /// precision, zero, and anything above `u64::MAX` units.
    pub fn to_units(&self, input: &str) -> Result<u64> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VaultError::invalid_amount(input, AmountRejection::Empty));
        }
        if trimmed.starts_with('-') {
            return Err(VaultError::invalid_amount(input, AmountRejection::Negative));
        }

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction)
        {
            return Err(VaultError::invalid_amount(input, AmountRejection::Malformed));
        }
        if fraction.len() > self.decimals as usize {
            return Err(VaultError::invalid_amount(
                input,
                AmountRejection::TooManyDecimals { max: self.decimals },
            ));
        }

        // Leading zeros carry no value; beyond 20 significant digits the
        // whole part alone is already past u64::MAX.
        let significant = whole.trim_start_matches('0');
        if significant.len() > 20 {
            return Err(VaultError::invalid_amount(input, AmountRejection::OutOfRange));
        }
        let whole_value: u128 = if significant.is_empty() {
            0
        } else {
            significant
                .parse()
                .map_err(|_| VaultError::invalid_amount(input, AmountRejection::Malformed))?
        };

        let fraction_value: u128 = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", fraction, width = self.decimals as usize);
            padded
                .parse()
                .map_err(|_| VaultError::invalid_amount(input, AmountRejection::Malformed))?
        };

        let total = whole_value
            .checked_mul(self.scale())
            .and_then(|v| v.checked_add(fraction_value))
            .ok_or_else(|| VaultError::invalid_amount(input, AmountRejection::OutOfRange))?;

        if total == 0 {
            return Err(VaultError::invalid_amount(input, AmountRejection::Zero));
        }
        u64::try_from(total)
            .map_err(|_| VaultError::invalid_amount(input, AmountRejection::OutOfRange))
    }

    /// Formats units as a decimal string.
    ///
    /// The fraction is truncated (never rounded) to the display precision and
    /// trailing zeros are stripped. The integer part is always exact.
    pub fn to_decimal_string(&self, units: u64) -> String {
        let scale = self.scale();
        let units = u128::from(units);
        let whole = units / scale;
        if self.decimals == 0 {
            return whole.to_string();
        }

        let fraction = units % scale;
        let padded = format!("{:0width$}", fraction, width = self.decimals as usize);
        let shown = padded[..self.display_digits as usize].trim_end_matches('0');
        if shown.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, shown)
        }
    }
}

impl Default for AmountCodec {
    fn default() -> Self {
        Self::ether()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u64 = 1_000_000_000_000_000_000;

    fn rejection(result: Result<u64>) -> AmountRejection {
        match result {
            Err(VaultError::InvalidAmount { reason, .. }) => reason,
            other => panic!("expected InvalidAmount, got {:?}", other),
        }
    }

    #[test]
    fn parses_whole_and_fractional_amounts() {
        let codec = AmountCodec::ether();
        assert_eq!(codec.to_units("1").unwrap(), ONE);
        assert_eq!(codec.to_units("2.0").unwrap(), 2 * ONE);
        assert_eq!(codec.to_units("1.5").unwrap(), ONE + ONE / 2);
        assert_eq!(codec.to_units("0.000000000000000001").unwrap(), 1);
        assert_eq!(codec.to_units(" 0.25 ").unwrap(), ONE / 4);
        assert_eq!(codec.to_units(".5").unwrap(), ONE / 2);
        assert_eq!(codec.to_units("3.").unwrap(), 3 * ONE);
        assert_eq!(codec.to_units("007").unwrap(), 7 * ONE);
    }

    #[test]
    fn rejects_bad_input() {
        let codec = AmountCodec::ether();
        assert_eq!(rejection(codec.to_units("")), AmountRejection::Empty);
        assert_eq!(rejection(codec.to_units("   ")), AmountRejection::Empty);
        assert_eq!(rejection(codec.to_units("0")), AmountRejection::Zero);
        assert_eq!(rejection(codec.to_units("0.000")), AmountRejection::Zero);
        assert_eq!(rejection(codec.to_units("-1")), AmountRejection::Negative);
        assert_eq!(rejection(codec.to_units("abc")), AmountRejection::Malformed);
        assert_eq!(rejection(codec.to_units("1.2.3")), AmountRejection::Malformed);
        assert_eq!(rejection(codec.to_units("+1")), AmountRejection::Malformed);
        assert_eq!(rejection(codec.to_units("1e18")), AmountRejection::Malformed);
        assert_eq!(rejection(codec.to_units(".")), AmountRejection::Malformed);
        assert_eq!(
            rejection(codec.to_units("0.0000000000000000001")),
            AmountRejection::TooManyDecimals { max: 18 }
        );
    }

    #[test]
    fn u64_boundary_is_exact() {
        let codec = AmountCodec::ether();
        assert_eq!(codec.to_units("18.446744073709551615").unwrap(), u64::MAX);
        assert_eq!(
            rejection(codec.to_units("18.446744073709551616")),
            AmountRejection::OutOfRange
        );
        assert_eq!(rejection(codec.to_units("19")), AmountRejection::OutOfRange);
        assert_eq!(
            rejection(codec.to_units("100000000000000000000000000000000000000000")),
            AmountRejection::OutOfRange
        );
    }

    #[test]
    fn display_truncates_and_strips() {
        let codec = AmountCodec::ether();
        assert_eq!(codec.to_decimal_string(2 * ONE), "2");
        assert_eq!(codec.to_decimal_string(ONE + ONE / 2), "1.5");
        assert_eq!(codec.to_decimal_string(1_234_567_890_000_000_000), "1.234567");
        assert_eq!(codec.to_decimal_string(1), "0");
        assert_eq!(codec.to_decimal_string(0), "0");
        assert_eq!(codec.to_decimal_string(u64::MAX), "18.446744");
    }

    #[test]
    fn exact_codec_roundtrips_up_to_trailing_zeros() {
        let codec = AmountCodec::exact(18);
        for (input, expected) in [
            ("1", "1"),
            ("2.0", "2"),
            ("1.500", "1.5"),
            ("0.000000000000000001", "0.000000000000000001"),
            ("18.446744073709551615", "18.446744073709551615"),
            ("12.678901234567890", "12.67890123456789"),
        ] {
            let units = codec.to_units(input).unwrap();
            assert_eq!(codec.to_decimal_string(units), expected, "input {}", input);
        }
    }

    #[test]
    fn zero_decimal_codec() {
        let codec = AmountCodec::exact(0);
        assert_eq!(codec.to_units("42").unwrap(), 42);
        assert!(codec.to_units("4.2").is_err());
        assert_eq!(codec.to_decimal_string(42), "42");
    }

    #[test]
    fn display_digits_clamped_to_decimals() {
        let codec = AmountCodec::new(6, 10);
        assert_eq!(codec.display_digits(), 6);
        assert_eq!(codec.to_decimal_string(1_000_001), "1.000001");
    }
}
