//! # Money Module
//!
//! Provides the `Money` type for base amounts, discounts, tax amounts and
//! item totals.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  A cascade recomputes thousands of totals. Float drift would make      │
//! │  the second run differ from the first.                                  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every amount is i64 cents; the only rounding step is the tax         │
//! │    component, rounded half-up to the cent.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use taxon_core::money::Money;
//!
//! let base = Money::from_cents(10_000); // $100.00
//! let discount = Money::from_cents(1_500);
//! assert_eq!((base - discount).cents(), 8_500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Where Money is Used
/// ```text
/// Item.base_amount_cents ──┐
/// Item.discount_cents ─────┼──► compute_total ──► Item.total_amount_cents
/// TaxDescriptor ───────────┘         │
///                                    └──► TotalBreakdown.tax_amount
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use taxon_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ```rust
    /// use taxon_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero.
    ///
    /// ```rust
    /// use taxon_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(-40).clamp_non_negative(), Money::zero());
    /// assert_eq!(Money::from_cents(40).clamp_non_negative().cents(), 40);
    /// ```
    #[inline]
    pub const fn clamp_non_negative(self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            self
        }
    }

    /// Applies a percentage rate, rounding half-up to the cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`. The +5000 provides the
    /// rounding (5000/10000 = 0.5). Amounts here are never negative, so the
    /// half-up bias does not flip sign.
    ///
    /// ```rust
    /// use taxon_core::money::Money;
    /// use taxon_core::types::TaxRate;
    ///
    /// let base = Money::from_cents(1000); // $10.00
    /// let tax = base.calculate_tax(TaxRate::from_bps(825)); // 8.25%
    /// assert_eq!(tax.cents(), 83); // $0.825 → $0.83
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 so huge amounts cannot overflow
        let tax_cents = (self.0 as i128 * rate.hundredths() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Like [`Money::calculate_tax`], but `None` when the tax does not fit
    /// in an i64 of cents.
    pub fn checked_calculate_tax(&self, rate: TaxRate) -> Option<Money> {
        let tax_cents = (self.0 as i128 * rate.hundredths() as i128 + 5000) / 10000;
        i64::try_from(tax_cents).ok().map(Money::from_cents)
    }

    /// Checked addition. `None` on overflow.
    ///
    /// ```rust
    /// use taxon_core::money::Money;
    ///
    /// assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_none());
    /// assert_eq!(Money::from_cents(1).checked_add(Money::from_cents(2)), Some(Money::from_cents(3)));
    /// ```
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Checked subtraction. `None` on overflow.
    #[inline]
    pub const fn checked_sub(self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display. The request layer formats for locale.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_arithmetic() {
        let mut a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);

        a += b;
        assert_eq!(a.cents(), 1500);
        a -= b;
        assert_eq!(a.cents(), 1000);
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let near_max = Money::from_cents(i64::MAX - 10);
        assert!(near_max.checked_add(Money::from_cents(11)).is_none());
        assert_eq!(
            near_max.checked_add(Money::from_cents(10)),
            Some(Money::from_cents(i64::MAX))
        );
        assert!(Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)).is_none());

        // 100% of a near-max amount still fits; 200% does not.
        assert!(near_max.checked_calculate_tax(TaxRate::from_bps(10_000)).is_some());
        assert!(near_max.checked_calculate_tax(TaxRate::from_bps(20_000)).is_none());
    }

    #[test]
    fn test_tax_calculation_basic() {
        // $100.00 at 10% = $10.00
        let amount = Money::from_cents(10_000);
        let tax = amount.calculate_tax(TaxRate::from_bps(1000));
        assert_eq!(tax.cents(), 1000);
    }

    #[test]
    fn test_tax_calculation_rounds_half_up() {
        // $0.50 at 1% = 0.5 cents → 1 cent
        let amount = Money::from_cents(50);
        let tax = amount.calculate_tax(TaxRate::from_bps(100));
        assert_eq!(tax.cents(), 1);

        // $0.49 at 1% = 0.49 cents → 0 cents
        let amount = Money::from_cents(49);
        let tax = amount.calculate_tax(TaxRate::from_bps(100));
        assert_eq!(tax.cents(), 0);
    }

    #[test]
    fn test_clamp_non_negative() {
        assert!(Money::from_cents(-1).is_negative());
        assert!(Money::from_cents(-1).clamp_non_negative().is_zero());
        assert_eq!(Money::from_cents(7).clamp_non_negative().cents(), 7);
    }
}
