//! # Product Repository
//!
//! Catalog access. The transaction core only reads price and the active
//! flag; writes exist for catalog seeding and price maintenance.
//!
//! Products carry no stock column. The `stock_version` column is bumped by
//! the stock ledger and is not part of [`Product`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use kosh_core::validation::{validate_price_paise, validate_sku};
use kosh_core::Product;

const PRODUCT_COLUMNS: &str =
    "id, sku, name, category, unit, price_paise, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    sku: String,
    name: String,
    category: Option<String>,
    unit: String,
    price_paise: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            category: row.category,
            unit: row.unit,
            price_paise: row.price_paise,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// repo.insert(&product).await?;
/// let product = repo.get_by_sku("CEM-50").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_in(&mut conn, id).await
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    /// Lists active products ordered by SKU.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY sku LIMIT ?1"
        );
        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Inserts a new product.
    ///
    /// ## Errors
    /// - invalid SKU or negative price → validation error
    /// - duplicate SKU → `UniqueViolation { field: "sku" }`
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        validate_sku(&product.sku)?;
        validate_price_paise(product.price_paise)?;

        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, category, unit, price_paise,
                is_active, stock_version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.unit)
        .bind(product.price_paise)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| match DbError::from(err) {
            DbError::UniqueViolation { field, .. } if field.contains("sku") => {
                DbError::duplicate("sku", &product.sku)
            }
            other => other,
        })?;

        Ok(())
    }

    /// Changes the current price. Existing orders keep their snapshots.
    pub async fn update_price(&self, id: &str, price_paise: i64) -> DbResult<()> {
        validate_price_paise(price_paise)?;

        debug!(id = %id, price_paise, "Updating product price");

        let result =
            sqlx::query("UPDATE products SET price_paise = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(price_paise)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Activates or deactivates a product. Inactive products cannot be ordered.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE products SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(active)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Fetches one product on an existing connection.
pub(crate) async fn fetch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    let row: Option<ProductRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(Product::from))
}

/// Loads the products referenced by an order, inside its transaction.
///
/// Missing IDs are simply absent from the map; pricing reports them.
pub(crate) async fn load_catalog(
    conn: &mut SqliteConnection,
    ids: &[&str],
) -> DbResult<HashMap<String, Product>> {
    let mut catalog = HashMap::with_capacity(ids.len());

    for id in ids {
        if catalog.contains_key(*id) {
            continue;
        }
        if let Some(product) = fetch_in(conn, id).await? {
            catalog.insert(product.id.clone(), product);
        }
    }

    Ok(catalog)
}
