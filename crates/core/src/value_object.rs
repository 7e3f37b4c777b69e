//! Value objects: money, discounts and document totals.
//!
//! All amounts are integer minor units (cents). Floating point never enters the
//! arithmetic, so totals computed at the till, in projections and in reports agree
//! to the unit.

use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for immutable, compared-by-value domain objects.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Largest quantity a single stock movement or document line may carry.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Amount of money in minor units.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Line amount: unit price times quantity.
    pub fn times(self, quantity: i64) -> Self {
        Self(self.0.saturating_mul(quantity))
    }

    /// `percent`% of this amount, rounded half up to the minor unit.
    pub fn percent(self, percent: u8) -> Self {
        let scaled = (self.0 as i128) * (percent as i128);
        let rounded = if scaled >= 0 {
            (scaled + 50) / 100
        } else {
            (scaled - 50) / 100
        };
        Self(rounded as i64)
    }

    pub fn max(self, other: Money) -> Money {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Money) -> Money {
        if self <= other { self } else { other }
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        *self = *self - rhs;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Discount applied to a whole cart or purchase.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Discount {
    #[default]
    None,
    Flat(Money),
    /// Whole percent, 0..=100.
    Percent(u8),
}

impl ValueObject for Discount {}

impl Discount {
    pub fn validate(&self) -> DomainResult<()> {
        match self {
            Discount::None => Ok(()),
            Discount::Flat(m) if m.is_negative() => {
                Err(DomainError::validation("discount amount cannot be negative"))
            }
            Discount::Flat(_) => Ok(()),
            Discount::Percent(p) if *p > 100 => {
                Err(DomainError::validation("discount percent must be between 0 and 100"))
            }
            Discount::Percent(_) => Ok(()),
        }
    }

    /// Discount amount for a subtotal, never more than the subtotal itself.
    pub fn amount_on(&self, subtotal: Money) -> Money {
        if !subtotal.is_positive() {
            return Money::ZERO;
        }
        let raw = match self {
            Discount::None => Money::ZERO,
            Discount::Flat(m) => (*m).max(Money::ZERO),
            Discount::Percent(p) => subtotal.percent((*p).min(100)),
        };
        raw.min(subtotal)
    }
}

/// Totals of a sale or purchase document.
///
/// `change` is what the till hands back (the "return" amount), `due` what is still owed.
/// At most one of them is non-zero.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub paid: Money,
    pub change: Money,
    pub due: Money,
}

impl ValueObject for Totals {}

impl Totals {
    pub fn compute(subtotal: Money, discount: &Discount, paid: Money) -> Self {
        let discount = discount.amount_on(subtotal);
        let total = subtotal - discount;
        let paid = paid.max(Money::ZERO);
        Self {
            subtotal,
            discount,
            total,
            paid,
            change: (paid - total).max(Money::ZERO),
            due: (total - paid).max(Money::ZERO),
        }
    }

    /// Amount actually kept by the business (paid minus change).
    pub fn collected(&self) -> Money {
        self.paid - self.change
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(minor: i64) -> Money {
        Money::from_minor(minor)
    }

    #[test]
    fn displays_two_decimals() {
        assert_eq!(m(123456).to_string(), "1234.56");
        assert_eq!(m(5).to_string(), "0.05");
        assert_eq!(m(-250).to_string(), "-2.50");
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(m(1005).percent(10), m(101));
        assert_eq!(m(1004).percent(10), m(100));
        assert_eq!(m(999).percent(100), m(999));
    }

    #[test]
    fn flat_discount_is_capped_at_subtotal() {
        let totals = Totals::compute(m(500), &Discount::Flat(m(800)), m(0));
        assert_eq!(totals.discount, m(500));
        assert_eq!(totals.total, Money::ZERO);
        assert_eq!(totals.due, Money::ZERO);
    }

    #[test]
    fn flat_discount_amount_within_subtotal() {
        assert_eq!(Discount::Flat(m(150)).amount_on(m(1_000)), m(150));
        assert_eq!(Discount::Flat(m(-150)).amount_on(m(1_000)), Money::ZERO);
        assert_eq!(Discount::Flat(m(150)).amount_on(Money::ZERO), Money::ZERO);
    }

    #[test]
    fn overpayment_produces_change_not_due() {
        let totals = Totals::compute(m(1_000), &Discount::Percent(10), m(1_000));
        assert_eq!(totals.discount, m(100));
        assert_eq!(totals.total, m(900));
        assert_eq!(totals.change, m(100));
        assert_eq!(totals.due, Money::ZERO);
        assert_eq!(totals.collected(), m(900));
    }

    #[test]
    fn underpayment_produces_due() {
        let totals = Totals::compute(m(2_000), &Discount::None, m(1_500));
        assert_eq!(totals.change, Money::ZERO);
        assert_eq!(totals.due, m(500));
    }

    #[test]
    fn discount_validation() {
        assert!(Discount::Flat(m(-1)).validate().is_err());
        assert!(Discount::Percent(101).validate().is_err());
        assert!(Discount::Percent(100).validate().is_ok());
    }

    #[test]
    fn discount_serializes_with_kind_tag() {
        let json = serde_json::to_value(Discount::Percent(15)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "percent", "value": 15}));
        let back: Discount = serde_json::from_value(serde_json::json!({"kind": "none"})).unwrap();
        assert_eq!(back, Discount::None);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        #[test]
        fn totals_balance(
            subtotal in 0i64..10_000_000,
            flat in 0i64..10_000_000,
            percent in 0u8..=100,
            use_percent in any::<bool>(),
            paid in 0i64..20_000_000,
        ) {
            let discount = if use_percent { Discount::Percent(percent) } else { Discount::Flat(m(flat)) };
            let t = Totals::compute(m(subtotal), &discount, m(paid));

            prop_assert!(t.discount <= t.subtotal);
            prop_assert!(!t.total.is_negative());
            prop_assert_eq!(t.total + t.discount, t.subtotal);
            prop_assert!(t.change == Money::ZERO || t.due == Money::ZERO);
            prop_assert_eq!(t.paid - t.change + t.due, t.total);
        }
    }
}
