//! Report generation commands

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use larder_core::db::Database;
use larder_core::models::{MonthlySummary, PriceHistory};
use larder_core::reports;

use super::truncate;

/// Check a YYYY-MM month argument
pub fn parse_month(month: &str) -> Result<()> {
    NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| anyhow!("Invalid month '{}' (use YYYY-MM)", month))
}

pub fn cmd_report_monthly(db: &Database, month: Option<&str>, top: usize) -> Result<()> {
    let receipts = db.list_receipts(None)?;

    let summaries = match month {
        Some(m) => {
            parse_month(m)?;
            match reports::monthly_summary(&receipts, m, top) {
                Some(summary) => vec![summary],
                None => {
                    println!("No receipts in {}", m);
                    return Ok(());
                }
            }
        }
        None => reports::monthly_summaries(&receipts, top),
    };

    if summaries.is_empty() {
        println!("No receipts yet.");
        return Ok(());
    }

    for summary in &summaries {
        print_month(summary);
    }

    Ok(())
}

fn print_month(summary: &MonthlySummary) {
    println!();
    println!("📅 {}", summary.month);
    println!("   ─────────────────────────────────────────");
    println!(
        "   Spent ${:.2} over {} visit(s), ${:.2} per visit",
        summary.total_spend, summary.visits, summary.average_per_visit
    );

    println!();
    println!("   Stores:");
    for store in &summary.stores {
        let name = if store.store.is_empty() {
            "Unknown"
        } else {
            store.store.as_str()
        };
        println!(
            "     {:<28} ${:>9.2}  ({} visits)",
            truncate(name, 28),
            store.total,
            store.visits
        );
    }

    if !summary.top_products.is_empty() {
        println!();
        println!("   Top products:");
        for (i, product) in summary.top_products.iter().enumerate() {
            println!(
                "     {}. {:<25} ${:>9.2}  × {}",
                i + 1,
                truncate(&product.name, 25),
                product.total,
                product.quantity
            );
        }
    }
}

pub fn cmd_report_prices(db: &Database, product: Option<&str>) -> Result<()> {
    let receipts = db.list_receipts(None)?;

    match product {
        Some(name) => {
            let Some(found) = db.find_product(name)? else {
                bail!("Product '{}' not found", name);
            };
            match reports::price_history(&receipts, found.id) {
                Some(history) => print_history_detail(&history),
                None => println!("No purchases of '{}' on record", found.name),
            }
        }
        None => {
            let histories = reports::price_histories(&receipts);
            if histories.is_empty() {
                println!("No purchases yet.");
                return Ok(());
            }

            println!("\n💲 Price History");
            println!("{}", "─".repeat(78));
            println!(
                "  {:<28} {:>5} {:>9} {:>9} {:>9} {:>9}",
                "Product", "Buys", "Min", "Max", "Last", "Change"
            );
            for h in &histories {
                println!(
                    "  {:<28} {:>5} {:>9} {:>9} {:>9} {:>9}",
                    truncate(&h.name, 28),
                    h.observations.len(),
                    format!("${:.2}", h.min_price),
                    format!("${:.2}", h.max_price),
                    format!("${:.2}", h.last_price),
                    format_change(h.percent_change)
                );
            }
            println!();
        }
    }

    Ok(())
}

fn print_history_detail(history: &PriceHistory) {
    println!();
    println!("💲 {}", history.name);
    println!("   ─────────────────────────────────────────");
    for obs in &history.observations {
        let store = if obs.store.is_empty() {
            "Unknown"
        } else {
            obs.store.as_str()
        };
        println!(
            "   {}  ${:>8.2} × {:<5} {}",
            obs.date.format("%Y-%m-%d"),
            obs.price,
            obs.quantity,
            truncate(store, 28)
        );
    }
    println!();
    println!(
        "   Min ${:.2}  Max ${:.2}  Avg ${:.2}",
        history.min_price, history.max_price, history.average_price
    );
    println!(
        "   First ${:.2} → Last ${:.2}  ({})",
        history.first_price,
        history.last_price,
        format_change(history.percent_change)
    );
    println!();
}

fn format_change(change: Option<f64>) -> String {
    match change {
        Some(pct) => format!("{:+.1}%", pct),
        None => "n/a".to_string(),
    }
}
