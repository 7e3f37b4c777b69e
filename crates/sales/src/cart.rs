//! Cart arithmetic for the till.
//!
//! These functions work on a plain list of lines so the same rules back both the `Sale`
//! aggregate and any client that previews a cart before sending it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use retailpos_catalog::ProductId;
use retailpos_core::{Discount, DomainError, Money, Totals};

/// What the till knows about a product when it is scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartProduct {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub sale_price: Money,
    pub cost_price: Money,
    /// Current on-hand quantity from the stock read model.
    pub available: i64,
}

/// One line of a cart. Prices are snapshotted when the product is first added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub cost_price: Money,
}

impl CartLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    pub fn line_cost(&self) -> Money {
        self.cost_price.times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),
    #[error("quantity cannot be negative")]
    NegativeQuantity,
}

impl From<CartError> for DomainError {
    fn from(value: CartError) -> Self {
        match value {
            e @ CartError::InsufficientStock { .. } => DomainError::conflict(e.to_string()),
            e => DomainError::validation(e.to_string()),
        }
    }
}

/// Scan a product: bump its line by one, or append a new line at the product's sale price.
///
/// Returns the line's quantity after the change.
pub fn add_product_to_order(lines: &mut Vec<CartLine>, product: &CartProduct) -> Result<i64, CartError> {
    let current = lines
        .iter()
        .find(|l| l.product_id == product.product_id)
        .map_or(0, |l| l.quantity);
    let requested = current + 1;
    if requested > product.available {
        return Err(CartError::InsufficientStock {
            product_id: product.product_id,
            requested,
            available: product.available,
        });
    }

    match lines.iter_mut().find(|l| l.product_id == product.product_id) {
        Some(line) => line.quantity = requested,
        None => lines.push(CartLine {
            product_id: product.product_id,
            code: product.code.clone(),
            name: product.name.clone(),
            quantity: 1,
            unit_price: product.sale_price,
            cost_price: product.cost_price,
        }),
    }
    Ok(requested)
}

/// Set a line's quantity. Zero removes the line.
pub fn update_product_quantity(
    lines: &mut Vec<CartLine>,
    product_id: ProductId,
    quantity: i64,
    available: i64,
) -> Result<(), CartError> {
    if quantity < 0 {
        return Err(CartError::NegativeQuantity);
    }
    let index = lines
        .iter()
        .position(|l| l.product_id == product_id)
        .ok_or(CartError::NotInCart(product_id))?;
    if quantity == 0 {
        lines.remove(index);
        return Ok(());
    }
    if quantity > available {
        return Err(CartError::InsufficientStock {
            product_id,
            requested: quantity,
            available,
        });
    }
    lines[index].quantity = quantity;
    Ok(())
}

pub fn remove_product(lines: &mut Vec<CartLine>, product_id: ProductId) -> Result<CartLine, CartError> {
    let index = lines
        .iter()
        .position(|l| l.product_id == product_id)
        .ok_or(CartError::NotInCart(product_id))?;
    Ok(lines.remove(index))
}

pub fn cart_totals(lines: &[CartLine], discount: &Discount, paid: Money) -> Totals {
    let subtotal = lines.iter().map(CartLine::line_total).sum();
    Totals::compute(subtotal, discount, paid)
}

/// Cost of goods in the cart at the snapshotted cost prices.
pub fn cost_total(lines: &[CartLine]) -> Money {
    lines.iter().map(CartLine::line_cost).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use retailpos_core::AggregateId;

    fn test_product(price: i64, available: i64) -> CartProduct {
        CartProduct {
            product_id: ProductId::new(AggregateId::new()),
            code: "SKU-1".into(),
            name: "Tea 500g".into(),
            sale_price: Money::from_minor(price),
            cost_price: Money::from_minor(price / 2),
            available,
        }
    }

    #[test]
    fn scanning_twice_increments_one_line() {
        let tea = test_product(450, 10);
        let mut lines = Vec::new();
        assert_eq!(add_product_to_order(&mut lines, &tea).unwrap(), 1);
        assert_eq!(add_product_to_order(&mut lines, &tea).unwrap(), 2);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_total(), Money::from_minor(900));
    }

    #[test]
    fn scanning_past_available_stock_fails() {
        let tea = test_product(450, 1);
        let mut lines = Vec::new();
        add_product_to_order(&mut lines, &tea).unwrap();
        let err = add_product_to_order(&mut lines, &tea).unwrap_err();
        assert_eq!(
            err,
            CartError::InsufficientStock {
                product_id: tea.product_id,
                requested: 2,
                available: 1
            }
        );
        assert_eq!(lines[0].quantity, 1);
    }

    #[test]
    fn out_of_stock_product_cannot_be_added() {
        let mut lines = Vec::new();
        assert!(add_product_to_order(&mut lines, &test_product(100, 0)).is_err());
        assert!(lines.is_empty());
    }

    #[test]
    fn quantity_updates() {
        let tea = test_product(450, 5);
        let mut lines = Vec::new();
        add_product_to_order(&mut lines, &tea).unwrap();

        update_product_quantity(&mut lines, tea.product_id, 4, tea.available).unwrap();
        assert_eq!(lines[0].quantity, 4);

        assert_eq!(
            update_product_quantity(&mut lines, tea.product_id, -1, tea.available),
            Err(CartError::NegativeQuantity)
        );
        assert!(matches!(
            update_product_quantity(&mut lines, tea.product_id, 6, tea.available),
            Err(CartError::InsufficientStock { .. })
        ));
        let stranger = ProductId::new(AggregateId::new());
        assert_eq!(
            update_product_quantity(&mut lines, stranger, 1, 10),
            Err(CartError::NotInCart(stranger))
        );

        update_product_quantity(&mut lines, tea.product_id, 0, tea.available).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn totals_with_discount_paid_and_return() {
        let mut lines = Vec::new();
        let tea = test_product(450, 5);
        let milk = test_product(1_000, 5);
        add_product_to_order(&mut lines, &tea).unwrap();
        add_product_to_order(&mut lines, &tea).unwrap();
        add_product_to_order(&mut lines, &milk).unwrap();

        let totals = cart_totals(&lines, &Discount::Percent(10), Money::from_minor(2_000));
        assert_eq!(totals.subtotal, Money::from_minor(1_900));
        assert_eq!(totals.discount, Money::from_minor(190));
        assert_eq!(totals.total, Money::from_minor(1_710));
        assert_eq!(totals.change, Money::from_minor(290));
        assert_eq!(totals.due, Money::ZERO);
        assert_eq!(cost_total(&lines), Money::from_minor(225 * 2 + 500));
    }

    #[test]
    fn empty_cart_totals_are_zero() {
        let totals = cart_totals(&[], &Discount::Flat(Money::from_minor(500)), Money::ZERO);
        assert_eq!(totals, Totals::default());
    }

    #[test]
    fn insufficient_stock_is_a_conflict() {
        let err: DomainError = CartError::InsufficientStock {
            product_id: ProductId::new(AggregateId::new()),
            requested: 3,
            available: 2,
        }
        .into();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            #[test]
            fn quantity_never_exceeds_available(scans in 0usize..30, available in 0i64..20) {
                let product = test_product(250, available);
                let mut lines = Vec::new();
                for _ in 0..scans {
                    let _ = add_product_to_order(&mut lines, &product);
                }
                let quantity = lines.first().map_or(0, |l| l.quantity);
                prop_assert_eq!(quantity, (scans as i64).min(available));
            }

            #[test]
            fn change_and_due_are_exclusive(
                prices in proptest::collection::vec(0i64..10_000, 0..8),
                percent in 0u8..=100,
                paid in 0i64..100_000,
            ) {
                let mut lines = Vec::new();
                for price in prices {
                    add_product_to_order(&mut lines, &test_product(price, 1)).unwrap();
                }
                let totals = cart_totals(&lines, &Discount::Percent(percent), Money::from_minor(paid));
                prop_assert!(totals.change == Money::ZERO || totals.due == Money::ZERO);
                prop_assert_eq!(totals.total + totals.change - totals.due, totals.paid);
            }
        }
    }
}
