use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{InventoryItemPatch, InventoryRepo, NewInventoryItem, RepoError},
    domain::entities::InventoryItemRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const ITEM_COLUMNS: &str = "id, sku, name, description, category, stock_quantity, \
     reserved_quantity, available_quantity, weight, dimensions, cost_price, \
     min_stock_level, max_stock_level, is_active, is_trackable, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct InventoryRow {
    id: i64,
    sku: String,
    name: String,
    description: Option<String>,
    category: Option<String>,
    stock_quantity: i32,
    reserved_quantity: i32,
    available_quantity: i32,
    weight: Option<f64>,
    dimensions: Option<String>,
    cost_price: f64,
    min_stock_level: i32,
    max_stock_level: i32,
    is_active: bool,
    is_trackable: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<InventoryRow> for InventoryItemRecord {
    fn from(row: InventoryRow) -> Self {
        Self {
            id: row.id,
            sku: row.sku,
            name: row.name,
            description: row.description,
            category: row.category,
            stock_quantity: row.stock_quantity,
            reserved_quantity: row.reserved_quantity,
            available_quantity: row.available_quantity,
            weight: row.weight,
            dimensions: row.dimensions,
            cost_price: row.cost_price,
            min_stock_level: row.min_stock_level,
            max_stock_level: row.max_stock_level,
            is_active: row.is_active,
            is_trackable: row.is_trackable,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl InventoryRepo for PostgresRepositories {
    async fn list_items(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<InventoryItemRecord>, RepoError> {
        let rows = sqlx::query_as::<_, InventoryRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory ORDER BY created_at DESC OFFSET $1 LIMIT $2"
        ))
        .bind(skip.max(0))
        .bind(limit.clamp(1, 1000))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(InventoryItemRecord::from).collect())
    }

    async fn find_item(&self, id: i64) -> Result<Option<InventoryItemRecord>, RepoError> {
        let row = sqlx::query_as::<_, InventoryRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(InventoryItemRecord::from))
    }

    async fn sku_exists(&self, sku: &str) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM inventory WHERE sku = $1)")
            .bind(sku)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn insert_item(
        &self,
        item: NewInventoryItem,
    ) -> Result<InventoryItemRecord, RepoError> {
        let row = sqlx::query_as::<_, InventoryRow>(&format!(
            "INSERT INTO inventory (sku, name, description, category, stock_quantity, \
             reserved_quantity, available_quantity, weight, dimensions, cost_price, \
             min_stock_level, max_stock_level, is_active, is_trackable) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(&item.sku)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.category)
        .bind(item.stock_quantity)
        .bind(item.reserved_quantity)
        .bind(item.available_quantity)
        .bind(item.weight)
        .bind(&item.dimensions)
        .bind(item.cost_price)
        .bind(item.min_stock_level)
        .bind(item.max_stock_level)
        .bind(item.is_active)
        .bind(item.is_trackable)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_item(
        &self,
        id: i64,
        patch: InventoryItemPatch,
    ) -> Result<Option<InventoryItemRecord>, RepoError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("UPDATE inventory SET updated_at = NOW()");

        macro_rules! push_field {
            ($field:ident) => {
                if let Some(value) = patch.$field {
                    qb.push(concat!(", ", stringify!($field), " = "));
                    qb.push_bind(value);
                }
            };
        }

        push_field!(sku);
        push_field!(name);
        push_field!(description);
        push_field!(category);
        push_field!(stock_quantity);
        push_field!(reserved_quantity);
        push_field!(available_quantity);
        push_field!(weight);
        push_field!(dimensions);
        push_field!(cost_price);
        push_field!(min_stock_level);
        push_field!(max_stock_level);
        push_field!(is_active);
        push_field!(is_trackable);

        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(format!(" RETURNING {ITEM_COLUMNS}"));

        let row = qb
            .build_query_as::<InventoryRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(InventoryItemRecord::from))
    }

    async fn delete_item(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM inventory WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_below_available(
        &self,
        threshold: i32,
    ) -> Result<Vec<InventoryItemRecord>, RepoError> {
        let rows = sqlx::query_as::<_, InventoryRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory \
             WHERE available_quantity <= $1 AND is_active = TRUE \
             ORDER BY available_quantity ASC"
        ))
        .bind(threshold)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(InventoryItemRecord::from).collect())
    }

    async fn list_active(&self) -> Result<Vec<InventoryItemRecord>, RepoError> {
        let rows = sqlx::query_as::<_, InventoryRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory WHERE is_active = TRUE"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(InventoryItemRecord::from).collect())
    }
}
