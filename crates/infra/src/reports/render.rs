//! Printable documents.
//!
//! Reports and invoices are first turned into a neutral `ReportDocument` (title, key
//! figures, tables); `render_html` lays that out as a standalone page the front end can
//! drop into an iframe and print.

use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::Serialize;

use retailpos_core::Money;
use retailpos_sales::SaleStatus;

use super::{Capital, ProfitLoss, PurchaseSummary, SalesSummary};
use crate::projections::SaleReadModel;

/// Shop details printed on every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintLayout {
    pub shop_name: String,
    pub currency_symbol: String,
    pub footer: Option<String>,
}

impl Default for PrintLayout {
    fn default() -> Self {
        Self {
            shop_name: "RetailPOS".to_string(),
            currency_symbol: "$".to_string(),
            footer: None,
        }
    }
}

impl PrintLayout {
    pub fn money(&self, amount: Money) -> String {
        if amount.is_negative() {
            format!("-{}{}", self.currency_symbol, -amount)
        } else {
            format!("{}{}", self.currency_symbol, amount)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Text(String),
    Money(Money),
    Count(i64),
    Date(NaiveDate),
}

impl Cell {
    fn display(&self, layout: &PrintLayout) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Money(m) => layout.money(*m),
            Cell::Count(n) => n.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Cell::Money(_) | Cell::Count(_))
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<Money> for Cell {
    fn from(value: Money) -> Self {
        Cell::Money(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportTable {
    pub heading: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ReportTable {
    fn new(heading: &str, columns: &[&str]) -> Self {
        Self {
            heading: heading.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub subtitle: Option<String>,
    /// Label / value pairs printed above the tables.
    pub figures: Vec<(String, Cell)>,
    pub tables: Vec<ReportTable>,
}

impl ReportDocument {
    fn new(title: &str, subtitle: Option<String>) -> Self {
        Self {
            title: title.to_string(),
            subtitle,
            figures: Vec::new(),
            tables: Vec::new(),
        }
    }

    fn figure(mut self, label: &str, value: impl Into<Cell>) -> Self {
        self.figures.push((label.to_string(), value.into()));
        self
    }
}

impl SalesSummary {
    pub fn to_document(&self) -> ReportDocument {
        let mut doc = ReportDocument::new("Sales summary", Some(self.range.to_string()))
            .figure("Sales", Cell::Count(self.sale_count as i64))
            .figure("Subtotal", self.subtotal)
            .figure("Discounts", self.discounts)
            .figure("Net total", self.net_total)
            .figure("Paid", self.paid)
            .figure("Due", self.due);

        let mut days = ReportTable::new("By day", &["Date", "Sales", "Net total"]);
        for d in &self.days {
            days.rows
                .push(vec![d.date.into(), Cell::Count(d.sale_count as i64), d.net_total.into()]);
        }
        let mut top = ReportTable::new("Top products", &["Product", "Quantity", "Revenue"]);
        for p in &self.top_products {
            top.rows
                .push(vec![p.name.as_str().into(), Cell::Count(p.quantity), p.revenue.into()]);
        }
        doc.tables = vec![days, top];
        doc
    }
}

impl PurchaseSummary {
    pub fn to_document(&self) -> ReportDocument {
        let mut doc = ReportDocument::new("Purchase summary", Some(self.range.to_string()))
            .figure("Purchases", Cell::Count(self.purchase_count as i64))
            .figure("Subtotal", self.subtotal)
            .figure("Discounts", self.discounts)
            .figure("Net total", self.net_total)
            .figure("Paid", self.paid)
            .figure("Due", self.due);

        let mut suppliers = ReportTable::new("By supplier", &["Supplier", "Purchases", "Net total", "Due"]);
        for s in &self.suppliers {
            suppliers.rows.push(vec![
                s.supplier_name.as_str().into(),
                Cell::Count(s.purchase_count as i64),
                s.net_total.into(),
                s.due.into(),
            ]);
        }
        doc.tables = vec![suppliers];
        doc
    }
}

impl ProfitLoss {
    pub fn to_document(&self) -> ReportDocument {
        ReportDocument::new("Profit and loss", Some(self.range.to_string()))
            .figure("Revenue", self.revenue)
            .figure("Cost of goods sold", self.cost_of_goods_sold)
            .figure("Gross profit", self.gross_profit)
            .figure("Discounts given", self.discounts_given)
            .figure("Salary expense", self.salary_expense)
            .figure("Net profit", self.net_profit)
    }
}

impl Capital {
    pub fn to_document(&self) -> ReportDocument {
        ReportDocument::new("Capital", Some(format!("As of {}", self.as_of)))
            .figure("Stock value", self.stock_value)
            .figure("Receivables", self.receivables)
            .figure("Cash", self.cash)
            .figure("Payables", self.payables)
            .figure("Capital", self.capital)
    }
}

/// A completed (or in-progress) sale laid out as an invoice.
pub fn invoice_document(sale: &SaleReadModel, customer_name: Option<&str>) -> ReportDocument {
    let when = sale.completed_at.unwrap_or(sale.opened_at);
    let mut doc = ReportDocument::new(&format!("Invoice {}", sale.invoice_no), Some(when.format("%Y-%m-%d %H:%M").to_string()))
        .figure("Customer", customer_name.unwrap_or("Walk-in customer"));
    if sale.status != SaleStatus::Completed {
        doc = doc.figure("Status", format!("{:?}", sale.status).to_lowercase());
    }

    let mut items = ReportTable::new("Items", &["Code", "Item", "Qty", "Price", "Amount"]);
    for line in &sale.lines {
        items.rows.push(vec![
            line.code.as_str().into(),
            line.name.as_str().into(),
            Cell::Count(line.quantity),
            line.unit_price.into(),
            line.line_total().into(),
        ]);
    }
    doc.tables.push(items);

    let t = &sale.totals;
    doc = doc
        .figure("Subtotal", t.subtotal)
        .figure("Discount", t.discount)
        .figure("Total", t.total)
        .figure("Paid", t.paid)
        .figure("Return", t.change)
        .figure("Due", sale.outstanding);
    if let Some(method) = sale.method {
        doc = doc.figure("Payment", format!("{method:?}").to_lowercase());
    }
    doc
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

const STYLE: &str = "body{font-family:sans-serif;margin:24px;color:#222}\
header{border-bottom:2px solid #222;margin-bottom:16px}\
table{border-collapse:collapse;width:100%;margin-bottom:16px}\
th,td{border-bottom:1px solid #ccc;padding:4px 8px;text-align:left}\
td.num,th.num{text-align:right}\
@media print{body{margin:0}}";

/// Standalone HTML page for `doc`. Every piece of text is escaped.
pub fn render_html(doc: &ReportDocument, layout: &PrintLayout) -> String {
    let mut html = String::new();
    let title = escape_html(&doc.title);
    let shop = escape_html(&layout.shop_name);

    // Writing to a String cannot fail.
    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title} - {shop}</title><style>{STYLE}</style></head><body>"
    );
    let _ = write!(html, "<header><h1>{shop}</h1><h2>{title}</h2>");
    if let Some(subtitle) = &doc.subtitle {
        let _ = write!(html, "<p>{}</p>", escape_html(subtitle));
    }
    html.push_str("</header>");

    if !doc.figures.is_empty() {
        html.push_str("<table class=\"figures\">");
        for (label, value) in &doc.figures {
            let _ = write!(
                html,
                "<tr><th>{}</th><td class=\"num\">{}</td></tr>",
                escape_html(label),
                escape_html(&value.display(layout))
            );
        }
        html.push_str("</table>");
    }

    for table in &doc.tables {
        let _ = write!(html, "<h3>{}</h3><table><thead><tr>", escape_html(&table.heading));
        let numeric: Vec<bool> = (0..table.columns.len())
            .map(|i| table.rows.first().and_then(|r| r.get(i)).is_some_and(Cell::is_numeric))
            .collect();
        for (i, column) in table.columns.iter().enumerate() {
            let class = if numeric[i] { " class=\"num\"" } else { "" };
            let _ = write!(html, "<th{class}>{}</th>", escape_html(column));
        }
        html.push_str("</tr></thead><tbody>");
        if table.rows.is_empty() {
            let _ = write!(html, "<tr><td colspan=\"{}\">No records</td></tr>", table.columns.len().max(1));
        }
        for row in &table.rows {
            html.push_str("<tr>");
            for cell in row {
                let class = if cell.is_numeric() { " class=\"num\"" } else { "" };
                let _ = write!(html, "<td{class}>{}</td>", escape_html(&cell.display(layout)));
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table>");
    }

    if let Some(footer) = &layout.footer {
        let _ = write!(html, "<footer><p>{}</p></footer>", escape_html(footer));
    }
    html.push_str("</body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::DateRange;
    use chrono::{TimeZone, Utc};
    use retailpos_catalog::ProductId;
    use retailpos_core::{AggregateId, Discount, UserId};
    use retailpos_parties::CustomerRef;
    use retailpos_sales::{CartLine, PaymentMethod, SaleId, cart_totals, cost_total, invoice_number};

    fn layout() -> PrintLayout {
        PrintLayout {
            shop_name: "Corner <Shop> & Co".into(),
            currency_symbol: "Rs ".into(),
            footer: Some("Thank you!".into()),
        }
    }

    #[test]
    fn money_formatting_keeps_sign_before_symbol() {
        let l = layout();
        assert_eq!(l.money(Money::from_minor(12_345)), "Rs 123.45");
        assert_eq!(l.money(Money::from_minor(-5)), "-Rs 0.05");
    }

    #[test]
    fn report_text_is_escaped() {
        let doc = ProfitLoss {
            range: DateRange::new(
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            )
            .unwrap(),
            revenue: Money::from_minor(10_000),
            cost_of_goods_sold: Money::from_minor(6_000),
            gross_profit: Money::from_minor(4_000),
            discounts_given: Money::ZERO,
            salary_expense: Money::from_minor(5_000),
            net_profit: Money::from_minor(-1_000),
        }
        .to_document();

        let html = render_html(&doc, &layout());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Corner &lt;Shop&gt; &amp; Co"));
        assert!(!html.contains("<Shop>"));
        assert!(html.contains("-Rs 10.00"));
        assert!(html.contains("2026-01-01 to 2026-01-31"));
        assert!(html.contains("Thank you!"));
    }

    #[test]
    fn invoice_lists_lines_and_totals() {
        let sale_id = SaleId::new(AggregateId::new());
        let lines = vec![CartLine {
            product_id: ProductId::new(AggregateId::new()),
            code: "BRD".into(),
            name: "Bread <large>".into(),
            quantity: 2,
            unit_price: Money::from_minor(250),
            cost_price: Money::from_minor(150),
        }];
        let totals = cart_totals(&lines, &Discount::None, Money::from_minor(1_000));
        let when = Utc.with_ymd_and_hms(2026, 2, 2, 10, 30, 0).unwrap();
        let sale = SaleReadModel {
            sale_id,
            invoice_no: invoice_number(sale_id),
            cashier: UserId::new(),
            customer: CustomerRef::WalkIn,
            cost_total: cost_total(&lines),
            lines,
            discount: Discount::None,
            status: SaleStatus::Completed,
            totals,
            method: Some(PaymentMethod::Cash),
            payments: vec![],
            outstanding: Money::ZERO,
            hold_note: None,
            opened_at: when,
            completed_at: Some(when),
            updated_at: when,
        };

        let doc = invoice_document(&sale, None);
        assert_eq!(doc.tables[0].rows.len(), 1);
        assert!(doc.figures.contains(&("Return".to_string(), Cell::Money(Money::from_minor(500)))));

        let html = render_html(&doc, &PrintLayout::default());
        assert!(html.contains(&sale.invoice_no));
        assert!(html.contains("Bread &lt;large&gt;"));
        assert!(html.contains("Walk-in customer"));
        assert!(html.contains("$5.00"));
    }

    #[test]
    fn empty_tables_say_so() {
        let summary = crate::reports::sales_summary(
            &[],
            DateRange::new(
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
            )
            .unwrap(),
        );
        let html = render_html(&summary.to_document(), &PrintLayout::default());
        assert!(html.contains("No records"));
    }
}
