use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{NewPrice, NewPriceHistory, PriceRepo, RepoError},
    domain::entities::{PriceHistoryRecord, PriceRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

const PRICE_COLUMNS: &str = "id, inventory_id, selling_price, cost_price, discount_price, \
     currency, margin_percent, markup_percent, is_active, requires_approval, \
     effective_from, effective_until, created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, inventory_id, old_price, new_price, price_change_percent, \
     price_change_amount, change_reason, changed_by, change_type, notes, \
     external_reference, changed_at";

#[derive(sqlx::FromRow)]
struct PriceRow {
    id: i64,
    inventory_id: i64,
    selling_price: f64,
    cost_price: f64,
    discount_price: Option<f64>,
    currency: String,
    margin_percent: Option<f64>,
    markup_percent: Option<f64>,
    is_active: bool,
    requires_approval: bool,
    effective_from: OffsetDateTime,
    effective_until: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PriceRow> for PriceRecord {
    fn from(row: PriceRow) -> Self {
        Self {
            id: row.id,
            inventory_id: row.inventory_id,
            selling_price: row.selling_price,
            cost_price: row.cost_price,
            discount_price: row.discount_price,
            currency: row.currency,
            margin_percent: row.margin_percent,
            markup_percent: row.markup_percent,
            is_active: row.is_active,
            requires_approval: row.requires_approval,
            effective_from: row.effective_from,
            effective_until: row.effective_until,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    inventory_id: i64,
    old_price: f64,
    new_price: f64,
    price_change_percent: f64,
    price_change_amount: f64,
    change_reason: Option<String>,
    changed_by: Option<String>,
    change_type: Option<String>,
    notes: Option<String>,
    external_reference: Option<String>,
    changed_at: OffsetDateTime,
}

impl From<HistoryRow> for PriceHistoryRecord {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: row.id,
            inventory_id: row.inventory_id,
            old_price: row.old_price,
            new_price: row.new_price,
            price_change_percent: row.price_change_percent,
            price_change_amount: row.price_change_amount,
            change_reason: row.change_reason,
            changed_by: row.changed_by,
            change_type: row.change_type,
            notes: row.notes,
            external_reference: row.external_reference,
            changed_at: row.changed_at,
        }
    }
}

#[async_trait]
impl PriceRepo for PostgresRepositories {
    async fn list_active_prices(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<PriceRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PriceRow>(&format!(
            "SELECT {PRICE_COLUMNS} FROM prices WHERE is_active = TRUE \
             ORDER BY effective_from DESC OFFSET $1 LIMIT $2"
        ))
        .bind(skip.max(0))
        .bind(limit.clamp(1, 1000))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PriceRecord::from).collect())
    }

    async fn find_current_price(
        &self,
        item_id: i64,
        now: OffsetDateTime,
    ) -> Result<Option<PriceRecord>, RepoError> {
        let row = sqlx::query_as::<_, PriceRow>(&format!(
            "SELECT {PRICE_COLUMNS} FROM prices \
             WHERE inventory_id = $1 AND is_active = TRUE AND effective_from <= $2 \
             ORDER BY effective_from DESC, id DESC LIMIT 1"
        ))
        .bind(item_id)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PriceRecord::from))
    }

    async fn replace_current_price(
        &self,
        price: NewPrice,
        history: Option<NewPriceHistory>,
        now: OffsetDateTime,
    ) -> Result<PriceRecord, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        // Close the active window first so exactly one active row survives.
        sqlx::query(
            "UPDATE prices SET is_active = FALSE, effective_until = $2, updated_at = $2 \
             WHERE inventory_id = $1 AND is_active = TRUE",
        )
        .bind(price.inventory_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, PriceRow>(&format!(
            "INSERT INTO prices (inventory_id, selling_price, cost_price, discount_price, \
             currency, margin_percent, markup_percent, is_active, requires_approval, \
             effective_from) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $9) \
             RETURNING {PRICE_COLUMNS}"
        ))
        .bind(price.inventory_id)
        .bind(price.selling_price)
        .bind(price.cost_price)
        .bind(price.discount_price)
        .bind(&price.currency)
        .bind(price.margin_percent)
        .bind(price.markup_percent)
        .bind(price.requires_approval)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(entry) = history {
            sqlx::query(
                "INSERT INTO price_history (inventory_id, old_price, new_price, \
                 price_change_percent, price_change_amount, change_reason, changed_by, \
                 change_type, notes, changed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(entry.inventory_id)
            .bind(entry.old_price)
            .bind(entry.new_price)
            .bind(entry.price_change_percent)
            .bind(entry.price_change_amount)
            .bind(&entry.change_reason)
            .bind(&entry.changed_by)
            .bind(entry.change_type.as_str())
            .bind(&entry.notes)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn history_since(
        &self,
        item_id: i64,
        since: OffsetDateTime,
    ) -> Result<Vec<PriceHistoryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM price_history \
             WHERE inventory_id = $1 AND changed_at >= $2 \
             ORDER BY changed_at DESC"
        ))
        .bind(item_id)
        .bind(since)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PriceHistoryRecord::from).collect())
    }

    async fn significant_since(
        &self,
        threshold_percent: f64,
        since: OffsetDateTime,
    ) -> Result<Vec<PriceHistoryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM price_history \
             WHERE changed_at >= $1 AND ABS(price_change_percent) >= $2 \
             ORDER BY price_change_percent DESC"
        ))
        .bind(since)
        .bind(threshold_percent)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PriceHistoryRecord::from).collect())
    }
}
