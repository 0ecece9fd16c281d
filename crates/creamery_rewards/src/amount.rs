//! # Token Amounts
//!
//! **NO FLOATING POINT NEAR A BALANCE**
//!
//! Currency payouts are expressed in base units of an 18-decimal token, the
//! same precision the currency ledger keeps. `TokenAmount` wraps the raw u128
//! base-unit count; `parse_units` turns operator-facing decimal strings such as
//! `"100"` or `"0.25"` into base units without ever touching an `f64`.

use std::fmt;

use crate::error::{RewardError, RewardResult};

/// Number of decimal places of the reward currency.
pub const TOKEN_DECIMALS: u32 = 18;

/// The multiplier for 18 decimal places.
const MULTIPLIER_18: u128 = 10u128.pow(TOKEN_DECIMALS);

/// Currency amount with 18 decimal places.
///
/// Internally stores value * 10^18 as a u128.
///
/// # Example
///
/// ```rust
/// use creamery_rewards::TokenAmount;
///
/// let hundred = TokenAmount::from_whole(100);
/// assert_eq!(hundred.base_units(), 100 * 10u128.pow(18));
/// assert_eq!(hundred.whole(), 100);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct TokenAmount(u128);

impl TokenAmount {
    /// Zero value.
    pub const ZERO: Self = Self(0);

    /// One whole token.
    pub const ONE: Self = Self(MULTIPLIER_18);

    /// Creates from a whole number of tokens.
    ///
    /// Saturates at `u128::MAX` base units.
    #[inline]
    #[must_use]
    pub const fn from_whole(whole: u128) -> Self {
        Self(whole.saturating_mul(MULTIPLIER_18))
    }

    /// Creates from raw base units (no conversion).
    #[inline]
    #[must_use]
    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// Returns the raw base-unit value.
    #[inline]
    #[must_use]
    pub const fn base_units(self) -> u128 {
        self.0
    }

    /// Returns the whole-token part.
    #[inline]
    #[must_use]
    pub const fn whole(self) -> u128 {
        self.0 / MULTIPLIER_18
    }

    /// Returns the fractional part in base units (0 to 10^18 - 1).
    #[inline]
    #[must_use]
    pub const fn fraction(self) -> u128 {
        self.0 % MULTIPLIER_18
    }

    /// Checked addition.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction.
    #[inline]
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Safe addition with error.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::ArithmeticOverflow`] on overflow.
    #[inline]
    pub fn safe_add(self, rhs: Self) -> RewardResult<Self> {
        self.checked_add(rhs).ok_or(RewardError::ArithmeticOverflow)
    }

    /// Returns true if zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenAmount({}.{:018})", self.whole(), self.fraction())
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:018}", self.whole(), self.fraction())
    }
}

/// Parses a non-negative decimal string into base units with `decimals`
/// fractional digits, e.g. `parse_units("1.5", 2) == 150`.
///
/// # Errors
///
/// Returns [`RewardError::InvalidConfiguration`] for malformed input or more
/// fractional digits than `decimals`, and [`RewardError::ArithmeticOverflow`]
/// when the value does not fit in a u128.
pub fn parse_units(text: &str, decimals: u32) -> RewardResult<u128> {
    let text = text.trim();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };

    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !is_digits(whole) || !is_digits(fraction) {
        return Err(RewardError::InvalidConfiguration(format!(
            "malformed amount '{text}'"
        )));
    }

    let fraction_len = u32::try_from(fraction.len()).unwrap_or(u32::MAX);
    if fraction_len > decimals {
        return Err(RewardError::InvalidConfiguration(format!(
            "amount '{text}' has more than {decimals} decimal places"
        )));
    }

    let scale = 10u128
        .checked_pow(decimals)
        .ok_or(RewardError::ArithmeticOverflow)?;
    let whole_units = whole
        .parse::<u128>()
        .map_err(|_| RewardError::ArithmeticOverflow)?
        .checked_mul(scale)
        .ok_or(RewardError::ArithmeticOverflow)?;

    let fraction_units = if fraction.is_empty() {
        0
    } else {
        let padding = 10u128
            .checked_pow(decimals - fraction_len)
            .ok_or(RewardError::ArithmeticOverflow)?;
        fraction
            .parse::<u128>()
            .map_err(|_| RewardError::ArithmeticOverflow)?
            .checked_mul(padding)
            .ok_or(RewardError::ArithmeticOverflow)?
    };

    whole_units
        .checked_add(fraction_units)
        .ok_or(RewardError::ArithmeticOverflow)
}
