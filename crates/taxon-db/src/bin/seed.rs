//! # Seed Data Generator
//!
//! Populates the database with a sample catalog hierarchy for development.
//!
//! ## Usage
//! ```bash
//! # 10 items per subcategory (default)
//! cargo run -p taxon-db --bin seed
//!
//! # Custom amount
//! cargo run -p taxon-db --bin seed -- --items 50
//!
//! # Specify database path
//! cargo run -p taxon-db --bin seed -- --db ./data/taxon.db
//! ```
//!
//! ## Generated Hierarchy
//! Each category gets a mix of inheriting and overriding subcategories, plus
//! a few items directly under the category:
//! - Beverages (10%): Soft Drinks (inherit), Water (exempt), Energy ($0.50 fixed)
//! - Snacks (8.25%): Chips (inherit), Candy (5%)
//! - Books (exempt): Fiction (inherit), Stationery (12%)
//!
//! Totals are computed with the same resolver and calculator the cascade
//! engine uses, so a freshly seeded database is consistent.

use chrono::Utc;
use std::env;
use taxon_core::tax::resolve;
use taxon_core::total::compute_total;
use taxon_core::{Category, CategoryTax, Item, Money, SubCategory, TaxRate, TaxSettings, TaxType};
use taxon_db::{generate_id, Database, DbConfig, HierarchyStore};
use tracing_subscriber::EnvFilter;

struct SubCategorySeed {
    name: &'static str,
    tax: TaxSettings,
}

struct CategorySeed {
    name: &'static str,
    tax: CategoryTax,
    sub_categories: Vec<SubCategorySeed>,
    products: &'static [&'static str],
}

fn catalog() -> Vec<CategorySeed> {
    vec![
        CategorySeed {
            name: "Beverages",
            tax: CategoryTax::applicable(TaxRate::from_bps(1000), TaxType::Percentage),
            sub_categories: vec![
                SubCategorySeed {
                    name: "Soft Drinks",
                    tax: TaxSettings::inherit(),
                },
                SubCategorySeed {
                    name: "Water",
                    tax: TaxSettings::exempt(),
                },
                SubCategorySeed {
                    name: "Energy",
                    tax: TaxSettings::explicit(true, TaxRate::from_hundredths(50), Some(TaxType::Fixed)),
                },
            ],
            products: &["Cola", "Lemonade", "Iced Tea", "Orange Juice", "Sparkling"],
        },
        CategorySeed {
            name: "Snacks",
            tax: CategoryTax::applicable(TaxRate::from_bps(825), TaxType::Percentage),
            sub_categories: vec![
                SubCategorySeed {
                    name: "Chips",
                    tax: TaxSettings::inherit(),
                },
                SubCategorySeed {
                    name: "Candy",
                    tax: TaxSettings::explicit(true, TaxRate::from_bps(500), Some(TaxType::Percentage)),
                },
            ],
            products: &["Pretzels", "Popcorn", "Crackers", "Trail Mix"],
        },
        CategorySeed {
            name: "Books",
            tax: CategoryTax::exempt(),
            sub_categories: vec![
                SubCategorySeed {
                    name: "Fiction",
                    tax: TaxSettings::inherit(),
                },
                SubCategorySeed {
                    name: "Stationery",
                    tax: TaxSettings::explicit(true, TaxRate::from_bps(1200), Some(TaxType::Percentage)),
                },
            ],
            products: &["Notebook", "Novel", "Planner", "Atlas"],
        },
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,taxon=debug,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();

    let mut items_per_sub_category: usize = 10;
    let mut db_path = String::from("./taxon_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--items" | "-n" => {
                if i + 1 < args.len() {
                    items_per_sub_category = args[i + 1].parse().unwrap_or(10);
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
                println!("Taxon Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --items <N>    Items per subcategory (default: 10)");
                println!("  -d, --db <PATH>    Database file path (default: ./taxon_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Taxon Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Items per subcategory: {}", items_per_sub_category);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let store = db.store();

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.categories().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} categories", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0usize;

    for category_seed in catalog() {
        let now = Utc::now();
        let mut category = Category {
            id: generate_id(),
            name: category_seed.name.to_string(),
            image: format!("https://img.example/{}.png", slug(category_seed.name)),
            description: format!("{} department", category_seed.name),
            tax_applicable: false,
            tax_rate: TaxRate::zero(),
            tax_type: None,
            created_at: now,
            updated_at: now,
        };
        category.set_tax(category_seed.tax);
        store.insert_category(&category).await?;

        // A few items straight under the category.
        for (idx, product) in category_seed.products.iter().enumerate() {
            let item = build_item(&category, None, product, idx)?;
            store.insert_item(&item).await?;
            generated += 1;
        }

        for sub_seed in &category_seed.sub_categories {
            let sub_category = SubCategory {
                id: generate_id(),
                name: sub_seed.name.to_string(),
                image: format!("https://img.example/{}.png", slug(sub_seed.name)),
                description: format!("{} in {}", sub_seed.name, category_seed.name),
                category_id: category.id.clone(),
                tax: sub_seed.tax,
                created_at: now,
                updated_at: now,
            };
            store.insert_sub_category(&sub_category).await?;

            for idx in 0..items_per_sub_category {
                let product = category_seed.products[idx % category_seed.products.len()];
                let name = format!("{} {} #{}", sub_seed.name, product, idx + 1);
                let item = build_item(&category, Some(&sub_category), &name, idx)?;
                store.insert_item(&item).await?;
                generated += 1;
            }
        }

        println!(
            "  {} ({} subcategories)",
            category.name,
            category_seed.sub_categories.len()
        );
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} items in {:?}", generated, elapsed);
    println!(
        "  Stored: {} categories, {} subcategories, {} items",
        db.categories().count().await?,
        db.sub_categories().count().await?,
        db.items().count().await?
    );
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds an item with a resolved tax and computed total.
///
/// Every fifth item carries its own fixed tax so cascades have overrides to
/// skip.
fn build_item(
    category: &Category,
    sub_category: Option<&SubCategory>,
    name: &str,
    seed: usize,
) -> Result<Item, Box<dyn std::error::Error>> {
    let now = Utc::now();

    // $1.99 - $9.98
    let base_amount_cents = 199 + ((seed * 37) % 800) as i64;
    let discount_cents = if seed % 3 == 0 { 50 } else { 0 };

    let tax = if seed % 5 == 4 {
        TaxSettings::explicit(true, TaxRate::from_hundredths(25), Some(TaxType::Fixed))
    } else {
        TaxSettings::inherit()
    };

    let mut ancestors = Vec::with_capacity(2);
    if let Some(sub_category) = sub_category {
        ancestors.push(sub_category.tax);
    }
    ancestors.push(category.tax_settings());

    let descriptor = resolve(&tax, &ancestors);
    let totals = compute_total(
        Money::from_cents(base_amount_cents),
        Money::from_cents(discount_cents),
        &descriptor,
    )?;

    Ok(Item {
        id: generate_id(),
        name: name.to_string(),
        image: format!("https://img.example/{}.png", slug(name)),
        description: format!("Sample item {}", name),
        category_id: category.id.clone(),
        sub_category_id: sub_category.map(|s| s.id.clone()),
        base_amount_cents,
        discount_cents,
        tax,
        total_amount_cents: totals.total_amount.cents(),
        created_at: now,
        updated_at: now,
    })
}

fn slug(name: &str) -> String {
    name.to_lowercase().replace([' ', '#'], "-")
}
