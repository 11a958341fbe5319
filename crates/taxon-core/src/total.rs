//! # Total Calculator
//!
//! Turns a base amount, a discount and a resolved tax into the item total.
//!
//! ## Formula
//! ```text
//! tax_amount   = applicable
//!                  ? (Percentage ? base × rate / 100 : rate)
//!                  : 0
//! total_amount = max(0, base - discount + tax_amount)
//! ```
//!
//! The tax amount is computed on the base amount, not on the discounted
//! amount. The result only depends on its inputs, so running it twice on the
//! same item never applies tax twice.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::tax::TaxDescriptor;
use crate::types::TaxType;

/// Result of [`compute_total`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TotalBreakdown {
    pub tax_amount: Money,
    pub total_amount: Money,
}

/// Checks the amount rules shared by item creation and update.
///
/// ## Rules
/// - `base_amount >= 0`
/// - `discount >= 0`
/// - `discount < base_amount`
pub fn validate_amounts(base_amount: Money, discount: Money) -> CoreResult<()> {
    if base_amount.is_negative() {
        return Err(CoreError::invalid_amount(format!(
            "base amount must not be negative, got {}",
            base_amount
        )));
    }

    if discount.is_negative() {
        return Err(CoreError::invalid_amount(format!(
            "discount must not be negative, got {}",
            discount
        )));
    }

    if discount >= base_amount {
        return Err(CoreError::invalid_amount(format!(
            "discount {} must be less than base amount {}",
            discount, base_amount
        )));
    }

    Ok(())
}

fn out_of_range(base_amount: Money) -> CoreError {
    CoreError::invalid_amount(format!(
        "total for base amount {} exceeds the representable range",
        base_amount
    ))
}

/// Computes the tax amount and the item total.
///
/// Inputs whose total does not fit in i64 cents are an `InvalidAmount`.
///
/// ## Example
/// ```rust
/// use taxon_core::money::Money;
/// use taxon_core::tax::TaxDescriptor;
/// use taxon_core::total::compute_total;
/// use taxon_core::types::{TaxRate, TaxType};
///
/// let tax = TaxDescriptor::applicable(TaxRate::from_bps(500), TaxType::Fixed); // $5.00
/// let totals = compute_total(Money::from_cents(5_000), Money::zero(), &tax).unwrap();
/// assert_eq!(totals.total_amount.cents(), 5_500);
/// ```
pub fn compute_total(
    base_amount: Money,
    discount: Money,
    tax: &TaxDescriptor,
) -> CoreResult<TotalBreakdown> {
    validate_amounts(base_amount, discount)?;

    let tax_amount = if tax.applicable {
        match tax.tax_type.unwrap_or(TaxType::Percentage) {
            TaxType::Percentage => base_amount
                .checked_calculate_tax(tax.rate)
                .ok_or_else(|| out_of_range(base_amount))?,
            TaxType::Fixed => tax.rate.as_fixed_amount(),
        }
    } else {
        Money::zero()
    };

    let total_amount = base_amount
        .checked_sub(discount)
        .and_then(|net| net.checked_add(tax_amount))
        .ok_or_else(|| out_of_range(base_amount))?
        .clamp_non_negative();

    Ok(TotalBreakdown {
        tax_amount,
        total_amount,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
