//! # Seed Data Generator
//!
//! Populates the database with sample products and a few sales for
//! development.
//!
//! ## Usage
//! ```bash
//! # Default database path
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Data
//! - A small auto-parts catalog with retail and wholesale prices
//! - One paid-in-full sale, one partial (credit) sale and a payment
//!   against it, so the ledger has something to look at

use std::env;

use chrono::Utc;
use tally_core::checkout::Tender;
use tally_core::payment::PaymentRequest;
use tally_core::{PaymentMethod, SaleType};
use tally_db::repository::product::{generate_product_id, Product};
use tally_db::{CreateSaleRequest, Database, DbConfig, SaleLineInput};

/// Sample catalog: (sku, name, retail cents, wholesale cents, stock).
const CATALOG: &[(&str, &str, i64, i64, i64)] = &[
    ("OIL-1L", "Engine Oil 1L", 2_500, 2_100, 120),
    ("OIL-4L", "Engine Oil 4L", 9_000, 7_800, 60),
    ("GEAR-1L", "Gear Oil 1L", 3_200, 2_700, 45),
    ("FLT-OIL", "Oil Filter", 1_200, 950, 200),
    ("FLT-AIR", "Air Filter", 1_800, 1_500, 150),
    ("PLG-STD", "Spark Plug", 900, 700, 400),
    ("BRK-PAD", "Brake Pad Set", 6_500, 5_400, 80),
    ("BLT-FAN", "Fan Belt", 1_500, 1_200, 90),
    ("CLT-1L", "Coolant 1L", 1_100, 900, 130),
    ("WPR-STD", "Wiper Blade Pair", 2_200, 1_800, 75),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Seeding catalog...");

    let now = Utc::now();
    let mut product_ids = Vec::new();
    for (sku, name, retail, wholesale, stock) in CATALOG {
        let product = Product {
            id: generate_product_id(),
            sku: sku.to_string(),
            name: name.to_string(),
            price_cents: *retail,
            wholesale_price_cents: Some(*wholesale),
            stock: *stock,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await?;
        product_ids.push((product.id, *sku, name.to_string(), *retail));
    }
    println!("✓ {} products inserted", product_ids.len());

    let ledger = db.ledger();

    // Paid-in-full cash sale.
    let (oil_id, oil_sku, oil_name, oil_price) = product_ids[0].clone();
    let paid = ledger
        .create_sale(CreateSaleRequest {
            customer_id: None,
            customer_name: Some("Walk-in".to_string()),
            items: vec![SaleLineInput {
                product_id: oil_id.clone(),
                name: oil_name.clone(),
                sku: Some(oil_sku.to_string()),
                applied_price_cents: oil_price,
                quantity: 2,
                sale_type: SaleType::Retail,
            }],
            tender: Tender {
                cash_cents: oil_price * 2,
                ..Tender::default()
            },
            staff_id: "staff-demo".to_string(),
            sale_date: None,
        })
        .await?;
    println!("✓ Sale {} ({})", paid.sale.id, paid.sale.payment_summary);

    // Credit sale with a later installment.
    let (brk_id, brk_sku, brk_name, brk_price) = product_ids[6].clone();
    let credit = ledger
        .create_sale(CreateSaleRequest {
            customer_id: Some("cust-akram".to_string()),
            customer_name: Some("Akram Traders".to_string()),
            items: vec![SaleLineInput {
                product_id: brk_id,
                name: brk_name,
                sku: Some(brk_sku.to_string()),
                applied_price_cents: brk_price,
                quantity: 4,
                sale_type: SaleType::Wholesale,
            }],
            tender: Tender::default(),
            staff_id: "staff-demo".to_string(),
            sale_date: None,
        })
        .await?;
    println!(
        "✓ Sale {} ({})",
        credit.sale.id, credit.sale.payment_summary
    );

    let application = ledger
        .record_payment(
            &credit.sale.id,
            PaymentRequest {
                amount_cents: brk_price * 2,
                method: PaymentMethod::Cash,
                date: None,
                staff_id: "staff-demo".to_string(),
                notes: Some("first installment".to_string()),
                detail: None,
            },
        )
        .await?;
    println!("✓ Payment recorded ({})", application.sale.payment_summary);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
