//! Business reports computed from read models.
//!
//! Every report is a pure function of the rows it is handed, so the API can assemble
//! them from projections and tests can feed them literals. Dates are UTC calendar days
//! and ranges are inclusive.

pub mod render;

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use retailpos_catalog::ProductId;
use retailpos_core::Money;
use retailpos_hr::SalaryPeriod;
use retailpos_parties::PartyId;

use crate::projections::{
    PartyReadModel, ProductReadModel, PurchaseReadModel, SalaryCycleReadModel, SaleReadModel,
    StockReadModel,
};

pub use render::{Cell, PrintLayout, ReportDocument, ReportTable, invoice_document, render_html};

/// Top-products rows kept in the sales summary.
pub const TOP_PRODUCTS: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, ReportError> {
        if from > to {
            return Err(ReportError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }

    /// True when any day of the salary month lies in the range.
    pub fn overlaps(&self, period: SalaryPeriod) -> bool {
        let Some(first) = period.first_day() else {
            return false;
        };
        let last = first
            .checked_add_months(chrono::Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(first);
        first <= self.to && last >= self.from
    }
}

impl core::fmt::Display for DateRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} to {}", self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub sale_count: u64,
    pub net_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSales {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesSummary {
    pub range: DateRange,
    pub sale_count: u64,
    pub subtotal: Money,
    pub discounts: Money,
    pub net_total: Money,
    /// Collected at the till plus later payments.
    pub paid: Money,
    pub due: Money,
    pub days: Vec<DailySales>,
    pub top_products: Vec<ProductSales>,
}

/// Completed sales whose completion day lies in `range`.
pub fn sales_summary(sales: &[SaleReadModel], range: DateRange) -> SalesSummary {
    let mut summary = SalesSummary {
        range,
        sale_count: 0,
        subtotal: Money::ZERO,
        discounts: Money::ZERO,
        net_total: Money::ZERO,
        paid: Money::ZERO,
        due: Money::ZERO,
        days: Vec::new(),
        top_products: Vec::new(),
    };
    let mut days: BTreeMap<NaiveDate, DailySales> = BTreeMap::new();
    let mut products: BTreeMap<ProductId, ProductSales> = BTreeMap::new();

    for sale in in_range(sales, range) {
        let Some(date) = sale.completed_on() else {
            continue;
        };
        summary.sale_count += 1;
        summary.subtotal += sale.totals.subtotal;
        summary.discounts += sale.totals.discount;
        summary.net_total += sale.totals.total;
        summary.paid += sale.totals.collected() + sale.payments_total();
        summary.due += sale.outstanding;

        let day = days.entry(date).or_insert(DailySales {
            date,
            sale_count: 0,
            net_total: Money::ZERO,
        });
        day.sale_count += 1;
        day.net_total += sale.totals.total;

        for line in &sale.lines {
            let row = products.entry(line.product_id).or_insert_with(|| ProductSales {
                product_id: line.product_id,
                name: line.name.clone(),
                quantity: 0,
                revenue: Money::ZERO,
            });
            row.quantity += line.quantity;
            row.revenue += line.line_total();
        }
    }

    summary.days = days.into_values().collect();
    let mut top: Vec<ProductSales> = products.into_values().collect();
    top.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| b.revenue.cmp(&a.revenue)));
    top.truncate(TOP_PRODUCTS);
    summary.top_products = top;
    summary
}

fn in_range(sales: &[SaleReadModel], range: DateRange) -> impl Iterator<Item = &SaleReadModel> {
    sales.iter().filter(move |s| {
        s.status == retailpos_sales::SaleStatus::Completed && s.completed_on().is_some_and(|d| range.contains(d))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplierPurchases {
    pub supplier_id: PartyId,
    pub supplier_name: String,
    pub purchase_count: u64,
    pub net_total: Money,
    pub due: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseSummary {
    pub range: DateRange,
    pub purchase_count: u64,
    pub subtotal: Money,
    pub discounts: Money,
    pub net_total: Money,
    pub paid: Money,
    pub due: Money,
    pub suppliers: Vec<SupplierPurchases>,
}

/// Received purchases dated within `range`. Supplier names come from `suppliers`.
pub fn purchase_summary(
    purchases: &[PurchaseReadModel],
    suppliers: &[PartyReadModel],
    range: DateRange,
) -> PurchaseSummary {
    let mut summary = PurchaseSummary {
        range,
        purchase_count: 0,
        subtotal: Money::ZERO,
        discounts: Money::ZERO,
        net_total: Money::ZERO,
        paid: Money::ZERO,
        due: Money::ZERO,
        suppliers: Vec::new(),
    };
    let mut per_supplier: BTreeMap<PartyId, SupplierPurchases> = BTreeMap::new();

    let received = purchases.iter().filter(|p| {
        p.status == retailpos_purchasing::PurchaseStatus::Received && range.contains(p.purchase_date)
    });
    for purchase in received {
        summary.purchase_count += 1;
        summary.subtotal += purchase.totals.subtotal;
        summary.discounts += purchase.totals.discount;
        summary.net_total += purchase.totals.total;
        summary.paid += purchase.totals.collected() + purchase.payments_total();
        summary.due += purchase.outstanding;

        let row = per_supplier.entry(purchase.supplier_id).or_insert_with(|| SupplierPurchases {
            supplier_id: purchase.supplier_id,
            supplier_name: suppliers
                .iter()
                .find(|s| s.party_id == purchase.supplier_id)
                .map_or_else(|| "Unknown supplier".to_string(), |s| s.name.clone()),
            purchase_count: 0,
            net_total: Money::ZERO,
            due: Money::ZERO,
        });
        row.purchase_count += 1;
        row.net_total += purchase.totals.total;
        row.due += purchase.outstanding;
    }

    let mut rows: Vec<_> = per_supplier.into_values().collect();
    rows.sort_by(|a, b| b.net_total.cmp(&a.net_total));
    summary.suppliers = rows;
    summary
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfitLoss {
    pub range: DateRange,
    /// Net sales after discounts.
    pub revenue: Money,
    pub cost_of_goods_sold: Money,
    pub gross_profit: Money,
    pub discounts_given: Money,
    pub salary_expense: Money,
    pub net_profit: Money,
}

pub fn profit_loss(sales: &[SaleReadModel], cycles: &[SalaryCycleReadModel], range: DateRange) -> ProfitLoss {
    let (revenue, cogs, discounts) = in_range(sales, range).fold(
        (Money::ZERO, Money::ZERO, Money::ZERO),
        |(revenue, cogs, discounts), sale| {
            (
                revenue + sale.totals.total,
                cogs + sale.cost_total,
                discounts + sale.totals.discount,
            )
        },
    );
    let salary_expense = cycles
        .iter()
        .filter(|c| range.overlaps(c.period))
        .map(|c| c.total)
        .sum();
    let gross_profit = revenue - cogs;

    ProfitLoss {
        range,
        revenue,
        cost_of_goods_sold: cogs,
        gross_profit,
        discounts_given: discounts,
        salary_expense,
        net_profit: gross_profit - salary_expense,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capital {
    pub as_of: NaiveDate,
    pub stock_value: Money,
    pub receivables: Money,
    pub payables: Money,
    pub cash: Money,
    pub capital: Money,
}

/// Inputs of the capital statement, gathered from the read models.
#[derive(Debug, Clone, Copy)]
pub struct CapitalInputs<'a> {
    pub products: &'a [ProductReadModel],
    pub stock: &'a [StockReadModel],
    pub sales: &'a [SaleReadModel],
    pub purchases: &'a [PurchaseReadModel],
    pub receivables: Money,
    pub payables: Money,
    pub salaries_paid: Money,
}

/// stock value + receivables + cash − payables.
///
/// Stock is valued at current cost price; negative on-hand counts as nothing.
pub fn capital(inputs: CapitalInputs<'_>, as_of: NaiveDate) -> Capital {
    let stock_value = inputs
        .stock
        .iter()
        .filter_map(|s| {
            let product = inputs.products.iter().find(|p| p.product_id == s.product_id)?;
            Some(product.cost_price.times(s.on_hand.max(0)))
        })
        .sum();

    let sales_cash: Money = inputs
        .sales
        .iter()
        .filter(|s| s.status == retailpos_sales::SaleStatus::Completed)
        .map(|s| s.totals.collected() + s.payments_total())
        .sum();
    let purchase_cash: Money = inputs
        .purchases
        .iter()
        .filter(|p| p.status == retailpos_purchasing::PurchaseStatus::Received)
        .map(|p| p.totals.collected() + p.payments_total())
        .sum();
    let cash = sales_cash - purchase_cash - inputs.salaries_paid;

    Capital {
        as_of,
        stock_value,
        receivables: inputs.receivables,
        payables: inputs.payables,
        cash,
        capital: stock_value + inputs.receivables + cash - inputs.payables,
    }
}

/// First and last day of the month holding `date`.
pub fn month_of(date: NaiveDate) -> DateRange {
    let from = date.with_day(1).unwrap_or(date);
    let to = from
        .checked_add_months(chrono::Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(date);
    DateRange { from, to }
}
