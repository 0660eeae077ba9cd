//! Receipt workflow CLI commands

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use larder_core::ai::parsing::draft_from_value;
use larder_core::ai::AIBackend;
use larder_core::db::Database;
use larder_core::models::IngestReport;
use larder_core::{LarderConfig, ReceiptIngestor};

use super::truncate;

/// Guess an image MIME type from the file extension
pub fn guess_mime(file: &Path) -> Option<&'static str> {
    let ext = file.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

/// Extract a receipt image with the vision backend and ingest it
pub async fn cmd_scan<B>(
    db: &Database,
    settings: &LarderConfig,
    ai: &B,
    file: &Path,
    mime: Option<&str>,
) -> Result<()>
where
    B: AIBackend + ?Sized,
{
    if !file.exists() {
        return Err(anyhow!("File not found: {}", file.display()));
    }

    let mime_type = match mime {
        Some(m) => m.to_string(),
        None => guess_mime(file)
            .ok_or_else(|| {
                anyhow!(
                    "Can't tell the image type of {}. Pass --mime (e.g. image/jpeg)",
                    file.display()
                )
            })?
            .to_string(),
    };

    let image_data = std::fs::read(file).context("Failed to read receipt image")?;

    println!("📷 Scanning {} ({})...", file.display(), mime_type);
    println!("   🤖 {} (model: {})", ai.host(), ai.model());

    let report = ReceiptIngestor::with_config(db, settings)
        .scan(ai, &image_data, &mime_type)
        .await
        .context("Receipt scan failed")?;

    print_report(&report);
    Ok(())
}

/// Ingest a receipt draft from a JSON file
pub fn cmd_ingest_json(db: &Database, settings: &LarderConfig, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;
    let draft = draft_from_value(&value)?;

    let report = ReceiptIngestor::with_config(db, settings).ingest(&draft)?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &IngestReport) {
    let store = if report.store_name.is_empty() {
        "Unknown store"
    } else {
        report.store_name.as_str()
    };

    println!();
    println!("✅ Receipt #{} ingested", report.receipt_id);
    println!("   Store:    {}", store);
    println!("   Date:     {}", report.scanned_at.format("%Y-%m-%d"));
    if report.total_missing {
        println!("   Total:    (not printed)");
    } else {
        println!("   Total:    ${:.2}", report.total_amount);
    }
    println!(
        "   Items:    {} ({} products, {} new)",
        report.accepted_items, report.products_touched, report.products_created
    );

    if !report.skipped.is_empty() {
        println!();
        println!("   Skipped {} line(s):", report.skipped.len());
        for line in &report.skipped {
            println!(
                "     ✗ {:<30} ${:>8.2}  ({})",
                truncate(&line.name, 30),
                line.price,
                line.reason
            );
        }
    }
}

/// List receipts, newest first
pub fn cmd_receipts_list(db: &Database, limit: i64) -> Result<()> {
    if limit < 1 {
        bail!("--limit must be at least 1");
    }

    let receipts = db.list_receipts(Some(limit))?;

    if receipts.is_empty() {
        println!("No receipts yet. Scan one with 'larder scan --file receipt.jpg'");
        return Ok(());
    }

    println!("\n🧾 Receipts ({})", receipts.len());
    println!("{}", "─".repeat(70));

    for r in &receipts {
        let store = if r.receipt.store_name.is_empty() {
            "Unknown"
        } else {
            r.receipt.store_name.as_str()
        };
        let total = if r.receipt.total_missing {
            "N/A".to_string()
        } else {
            format!("${:.2}", r.receipt.total_amount)
        };

        println!(
            "  #{:<5} {} {:<28} {:>10}  {} items",
            r.receipt.id,
            r.receipt.scanned_at.format("%Y-%m-%d"),
            truncate(store, 28),
            total,
            r.items.len()
        );
    }

    println!();
    Ok(())
}
