//! # Seed Data Generator
//!
//! Populates the database with a product catalog and opening stock for
//! development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p kosh-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p kosh-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p kosh-db --bin seed -- --db ./data/kosh.db
//! ```
//!
//! ## Generated Products
//! Hardware and building supplies across categories:
//! - Building (cement, bricks, sand)
//! - Plumbing (pipes, taps, fittings)
//! - Electrical (wire, switches, MCBs)
//! - Fasteners (screws, bolts, anchors)
//! - Tools (hammers, drills, tapes)
//!
//! Each product has:
//! - Unique SKU: `{CATEGORY}-{ABBR}-{INDEX}`
//! - Price between ₹25.00 and ₹4,999.00 plus a size add-on
//! - An opening `stock_in` movement of 0 - 150 units (0 means none)

use anyhow::Context;
use chrono::Utc;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use kosh_core::{MovementKind, MovementMetadata, Product};
use kosh_db::{Database, DbConfig};

/// Product categories: (code, category name, unit, products)
const CATEGORIES: &[(&str, &str, &str, &[&str])] = &[
    (
        "BLD",
        "building",
        "bag",
        &[
            "OPC Cement",
            "PPC Cement",
            "White Cement",
            "Tile Adhesive",
            "Wall Putty",
            "Waterproofing Compound",
            "Plaster of Paris",
            "River Sand",
        ],
    ),
    (
        "PLB",
        "plumbing",
        "pcs",
        &[
            "PVC Pipe",
            "CPVC Pipe",
            "Ball Valve",
            "Pillar Tap",
            "Elbow Joint",
            "Tee Joint",
            "Ceiling Shower",
            "Teflon Tape",
        ],
    ),
    (
        "ELC",
        "electrical",
        "pcs",
        &[
            "Copper Wire",
            "Modular Switch",
            "MCB Single Pole",
            "LED Bulb",
            "Ceiling Fan",
            "Extension Board",
            "PVC Conduit",
            "Distribution Box",
        ],
    ),
    (
        "FST",
        "fasteners",
        "box",
        &[
            "Wood Screw",
            "Hex Bolt",
            "Wall Anchor",
            "Drywall Screw",
            "Wire Nail",
            "Washer Set",
        ],
    ),
    (
        "TLS",
        "tools",
        "pcs",
        &[
            "Claw Hammer",
            "Impact Drill",
            "Measuring Tape",
            "Spirit Level",
            "Hacksaw",
            "Screwdriver Set",
            "Trowel",
        ],
    ),
];

/// Size variants: (label, price add-on in paise)
const SIZES: &[(&str, i64)] = &[("Small", 0), ("Medium", 4_500), ("Large", 12_000)];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kosh=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./kosh_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1]
                        .parse()
                        .with_context(|| format!("invalid --count value '{}'", args[i + 1]))?;
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kosh Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./kosh_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding catalog");

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening database at {db_path}"))?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(
            existing,
            "Database already has products; delete the file to regenerate"
        );
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;
    let mut units = 0;

    'outer: for (category_idx, (code, category, unit, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + name_idx * 20 + size_idx;
                let product = generate_product(code, category, unit, name, size, *addon, seed);

                if let Err(e) = db.products().insert(&product).await {
                    warn!(sku = %product.sku, error = %e, "Failed to insert product");
                    continue;
                }

                let opening = (seed % 151) as i64;
                if opening > 0 {
                    let metadata = MovementMetadata {
                        unit_price_paise: Some(product.price_paise * 70 / 100),
                        supplier_name: Some("Opening balance".to_string()),
                        note: Some("seed".to_string()),
                        ..Default::default()
                    };
                    db.stock()
                        .record("seed", &product.id, MovementKind::StockIn, opening, &metadata)
                        .await
                        .with_context(|| format!("opening stock for {}", product.sku))?;
                    units += opening;
                }

                generated += 1;
                if generated % 50 == 0 {
                    info!(generated, "Seeding progress");
                }
            }
        }
    }

    let summary = db.stock().summary().await?;
    info!(
        generated,
        units,
        out_of_stock = summary.out_of_stock,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Seed complete"
    );

    db.close().await;
    Ok(())
}

/// Builds one product with deterministic pseudo-random data.
fn generate_product(
    code: &str,
    category: &str,
    unit: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    seed: usize,
) -> Product {
    let now = Utc::now();

    let abbr: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{code}-{abbr}-{seed:04}");

    // ₹25.00 .. ₹4,999.00
    let base_price = 2_500 + ((seed * 7_919) % 497_400) as i64;

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        name: format!("{name} {size}"),
        category: Some(category.to_string()),
        unit: unit.to_string(),
        price_paise: base_price + price_addon,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
