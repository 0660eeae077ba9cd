//! Inventory ledger commands

use anyhow::Result;
use larder_core::db::Database;
use larder_core::models::{ConsumeOutcome, InventoryLot};

use super::truncate;

pub fn cmd_inventory_list(db: &Database) -> Result<()> {
    let lots = db.list_lots()?;

    if lots.is_empty() {
        println!("Inventory is empty.");
        return Ok(());
    }

    println!("\n🥫 Inventory ({} lots)", lots.len());
    println!("{}", "─".repeat(78));
    println!(
        "  {:<5} {:<28} {:>8} {:>10} {:>10} {:>6}",
        "ID", "Item", "Qty", "Value", "Avg", "Seen"
    );

    for lot in &lots {
        println!(
            "  {:<5} {:<28} {:>8.2} {:>10} {:>10} {:>6}",
            lot.id,
            truncate(&lot.display_name, 28),
            lot.quantity,
            format!("${:.2}", lot.total_value),
            format!("${:.2}", lot.average_cost()),
            lot.frequency
        );
    }

    println!();
    Ok(())
}

pub fn cmd_inventory_add(db: &Database, name: &str, price: f64, quantity: f64) -> Result<()> {
    let lot = db.add_manual_item(name, price, quantity)?;
    println!("✅ Added {} × {} at ${:.2}", quantity, lot.display_name, price);
    print_lot(&lot);
    Ok(())
}

pub fn cmd_inventory_consume(db: &Database, id: i64, quantity: f64) -> Result<()> {
    match db.consume_lot(id, quantity)? {
        ConsumeOutcome::Updated { lot } => {
            println!("✅ Used {} of {}", quantity, lot.display_name);
            print_lot(&lot);
        }
        ConsumeOutcome::Removed { lot_id } => {
            println!("✅ Used up lot #{} (removed from inventory)", lot_id);
        }
    }
    Ok(())
}

pub fn cmd_inventory_restock(db: &Database, id: i64, quantity: f64) -> Result<()> {
    let lot = db.restock_lot(id, quantity)?;
    println!(
        "✅ Restocked {} × {} at ${:.2}",
        quantity, lot.display_name, lot.last_price
    );
    print_lot(&lot);
    Ok(())
}

pub fn cmd_inventory_rename(db: &Database, id: i64, name: &str) -> Result<()> {
    let lot = db.rename_lot(id, name)?;
    println!("✅ Lot #{} is now '{}'", lot.id, lot.display_name);
    Ok(())
}

pub fn cmd_inventory_remove(db: &Database, id: i64) -> Result<()> {
    db.delete_lot(id)?;
    println!("✅ Removed lot #{}", id);
    Ok(())
}

pub fn cmd_inventory_rebuild(db: &Database) -> Result<()> {
    println!("🔄 Rebuilding inventory from receipts...");
    let lots = db.rebuild_inventory()?;
    println!("✅ Rebuilt {} lots", lots);
    println!("   Manual adds, consumption and renames were discarded.");
    Ok(())
}

pub fn cmd_inventory_stats(db: &Database) -> Result<()> {
    let stats = db.inventory_stats()?;

    println!();
    println!("📦 Inventory");
    println!("   ─────────────────────────────");
    println!("   Lots:        {}", stats.lots);
    println!("   Units:       {:.2}", stats.total_units);
    println!("   Book value:  ${:.2}", stats.total_value);
    println!();
    Ok(())
}

fn print_lot(lot: &InventoryLot) {
    println!(
        "   #{} {}: {:.2} on hand, ${:.2} (avg ${:.2})",
        lot.id,
        lot.display_name,
        lot.quantity,
        lot.total_value,
        lot.average_cost()
    );
}
