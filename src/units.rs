//! Atomic-unit arithmetic and display formatting.
//!
//! All conversion runs on `u128` integer division and remainder. Binary
//! floating point is never involved, so large balances render without
//! rounding drift and `to_atomic(to_display(x)) == x` holds for every
//! representable amount.

use crate::chain::ChainParams;
use crate::error::{WalletError, WalletResult};

#[derive(Debug, Clone, Copy)]
pub struct UnitConverter {
    params: ChainParams,
}

impl UnitConverter {
    pub fn new(params: ChainParams) -> Self {
        Self { params }
    }

    fn scale(&self) -> u128 {
        10u128.pow(self.params.decimals)
    }

    /// Render an atomic amount as a fixed-point decimal string with exactly
    /// `decimals` fractional digits, e.g. `1.000000000000`.
    pub fn to_display(&self, atomic: u128) -> String {
        let whole = atomic / self.scale();
        let frac = atomic % self.scale();
        format!(
            "{}.{:0width$}",
            whole,
            frac,
            width = self.params.decimals as usize
        )
    }

    /// Parse a decimal display amount into atomic units, truncating (floor
    /// toward zero) past the `decimals`-th fractional digit.
    pub fn to_atomic(&self, display: &str) -> WalletResult<u128> {
        let s = display.trim();
        if s.is_empty() {
            return Err(WalletError::InvalidAmount("empty amount".into()));
        }
        if s.starts_with('-') {
            return Err(WalletError::InvalidAmount(format!(
                "negative amount: {s}"
            )));
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(WalletError::InvalidAmount(format!("not a number: {s}")));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(WalletError::InvalidAmount(format!("not a number: {s}")));
        }

        let overflow =
            || WalletError::InvalidAmount(format!("amount out of range: {s}"));

        let whole_atomic = if whole.is_empty() {
            0u128
        } else {
            whole
                .parse::<u128>()
                .map_err(|_| overflow())?
                .checked_mul(self.scale())
                .ok_or_else(overflow)?
        };

        // Truncate extra precision, right-pad what remains.
        let decimals = self.params.decimals as usize;
        let frac = &frac[..frac.len().min(decimals)];
        let frac_atomic = if frac.is_empty() {
            0u128
        } else {
            let padding = 10u128.pow((decimals - frac.len()) as u32);
            frac.parse::<u128>().map_err(|_| overflow())? * padding
        };

        whole_atomic.checked_add(frac_atomic).ok_or_else(overflow)
    }

    /// Human-facing rendering: thousands separators, trailing fractional
    /// zeros trimmed down to a minimum of two digits, ticker suffix.
    pub fn format(&self, atomic: u128) -> String {
        let display = self.to_display(atomic);
        let (whole, frac) = display.split_once('.').unwrap_or((&display, ""));

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        let mut frac = frac.trim_end_matches('0').to_string();
        while frac.len() < 2 {
            frac.push('0');
        }

        format!("{grouped}.{frac} {}", self.params.ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SALVIUM;

    fn sal() -> UnitConverter {
        UnitConverter::new(SALVIUM)
    }

    #[test]
    fn to_display_is_exact_fixed_point() {
        assert_eq!(sal().to_display(0), "0.000000000000");
        assert_eq!(sal().to_display(1), "0.000000000001");
        assert_eq!(sal().to_display(1_000_000_000_000), "1.000000000000");
        assert_eq!(sal().to_display(1_234_500_000_000_000), "1234.500000000000");
    }

    #[test]
    fn to_atomic_truncates_extra_precision() {
        // 13th decimal digit is dropped, not rounded
        assert_eq!(sal().to_atomic("0.0000000000019").unwrap(), 1);
        assert_eq!(sal().to_atomic("2.5").unwrap(), 2_500_000_000_000);
        assert_eq!(sal().to_atomic("7").unwrap(), 7_000_000_000_000);
        assert_eq!(sal().to_atomic(".25").unwrap(), 250_000_000_000);
    }

    #[test]
    fn to_atomic_rejects_garbage() {
        for bad in ["", "-1", "NaN", "1e3", "1.2.3", "abc", ".", "1,000"] {
            assert!(
                matches!(sal().to_atomic(bad), Err(WalletError::InvalidAmount(_))),
                "expected InvalidAmount for {bad:?}"
            );
        }
    }

    #[test]
    fn round_trip_holds_for_large_amounts() {
        for atomic in [0u128, 1, 999, 1_000_000_000_000, u64::MAX as u128 * 1000] {
            let display = sal().to_display(atomic);
            assert_eq!(sal().to_atomic(&display).unwrap(), atomic, "x={atomic}");
        }
    }

    #[test]
    fn format_groups_and_trims() {
        assert_eq!(sal().format(1_234_567_000_000_000_000), "1,234,567.00 SAL");
        assert_eq!(sal().format(1_500_000_000_000), "1.50 SAL");
        assert_eq!(sal().format(1_234_560_000_000), "1.23456 SAL");
        assert_eq!(sal().format(0), "0.00 SAL");
    }
}
