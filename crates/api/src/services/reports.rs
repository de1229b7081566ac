//! CSV rendering of the admin reports (RFC 4180).
//!
//! Free-text columns are guarded against spreadsheet formula evaluation.

use crate::models::{ProductReportRow, SalesReport};

/// Quote a field when it holds a comma, quote, or line break.
#[must_use]
pub fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Prefix free text that a spreadsheet would evaluate as a formula.
#[must_use]
pub fn text_field(value: &str) -> String {
    if value.starts_with(['=', '+', '-', '@', '\t', '\r']) {
        format!("'{value}")
    } else {
        value.to_string()
    }
}

fn push_row(out: &mut String, fields: &[String]) {
    let line = fields
        .iter()
        .map(|field| escape_field(field))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

/// Daily sales followed by a totals line.
#[must_use]
pub fn sales_csv(report: &SalesReport) -> String {
    let mut out = String::new();
    push_row(
        &mut out,
        &["date", "total_sales", "total_orders", "average_order_value"].map(String::from),
    );
    for day in &report.details {
        push_row(
            &mut out,
            &[
                day.date.to_string(),
                day.total_sales.to_string(),
                day.total_orders.to_string(),
                day.average_order_value.to_string(),
            ],
        );
    }
    let summary = &report.summary;
    push_row(
        &mut out,
        &[
            "TOTAL".to_string(),
            summary.total_sales.to_string(),
            summary.total_orders.to_string(),
            summary.average_order_value.to_string(),
        ],
    );
    out
}

/// One line per product.
#[must_use]
pub fn products_csv(rows: &[ProductReportRow]) -> String {
    let mut out = String::new();
    push_row(
        &mut out,
        &[
            "product_id",
            "name",
            "category",
            "total_sold",
            "revenue",
            "current_stock",
            "average_rating",
        ]
        .map(String::from),
    );
    for row in rows {
        push_row(
            &mut out,
            &[
                row.product_id.to_string(),
                text_field(&row.name),
                text_field(&row.category),
                row.total_sold.to_string(),
                row.revenue.to_string(),
                row.current_stock.to_string(),
                row.average_rating.to_string(),
            ],
        );
    }
    out
}

/// `Content-Disposition` value for a download named `{stem}_{date}.csv`.
#[must_use]
pub fn attachment(stem: &str, date: chrono::NaiveDate) -> String {
    format!("attachment; filename=\"{stem}_{}.csv\"", date.format("%Y%m%d"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use befit_core::ProductId;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::{SalesReportDay, SalesReportSummary};

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("Protein"), "Protein");
        assert_eq!(escape_field("Whey, Vanilla"), "\"Whey, Vanilla\"");
        assert_eq!(escape_field("6\" shaker"), "\"6\"\" shaker\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_text_field_defuses_formulas() {
        assert_eq!(text_field("=HYPERLINK(\"x\")"), "'=HYPERLINK(\"x\")");
        assert_eq!(text_field("+1"), "'+1");
        assert_eq!(text_field("-Creatine"), "'-Creatine");
        assert_eq!(text_field("@SUM(A1)"), "'@SUM(A1)");
        assert_eq!(text_field("Whey - Vanilla"), "Whey - Vanilla");
    }

    #[test]
    fn test_products_csv_keeps_negative_numbers_and_guards_names() {
        let rows = vec![ProductReportRow {
            product_id: ProductId::new(2),
            name: "=1+1".to_string(),
            category: "@pre-workout".to_string(),
            total_sold: 0,
            revenue: Decimal::new(-500, 2),
            current_stock: 0,
            average_rating: Decimal::ZERO,
        }];
        let csv = products_csv(&rows);
        assert_eq!(
            csv.split("\r\n").nth(1).unwrap(),
            "2,'=1+1,'@pre-workout,0,-5.00,0,0"
        );
    }

    #[test]
    fn test_products_csv() {
        let rows = vec![ProductReportRow {
            product_id: ProductId::new(1),
            name: "Whey, Chocolate".to_string(),
            category: "Uncategorized".to_string(),
            total_sold: 3,
            revenue: Decimal::new(26_970, 2),
            current_stock: 12,
            average_rating: Decimal::new(45, 1),
        }];
        let csv = products_csv(&rows);
        let mut lines = csv.split("\r\n");
        assert_eq!(
            lines.next().unwrap(),
            "product_id,name,category,total_sold,revenue,current_stock,average_rating"
        );
        assert_eq!(
            lines.next().unwrap(),
            "1,\"Whey, Chocolate\",Uncategorized,3,269.70,12,4.5"
        );
    }

    #[test]
    fn test_sales_csv_ends_with_totals() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let report = SalesReport {
            summary: SalesReportSummary {
                period_start: day,
                period_end: day,
                total_sales: Decimal::new(500, 0),
                total_orders: 2,
                average_order_value: Decimal::new(250, 0),
                days_in_period: 1,
            },
            details: vec![SalesReportDay {
                date: day,
                total_sales: Decimal::new(500, 0),
                total_orders: 2,
                average_order_value: Decimal::new(250, 0),
            }],
        };
        let csv = sales_csv(&report);
        assert!(csv.starts_with("date,total_sales,total_orders,average_order_value\r\n"));
        assert!(csv.contains("2026-10-01,500,2,250\r\n"));
        assert!(csv.ends_with("TOTAL,500,2,250\r\n"));
    }

    #[test]
    fn test_attachment_header() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        assert_eq!(
            attachment("sales_report", day),
            "attachment; filename=\"sales_report_20261014.csv\""
        );
    }
}
