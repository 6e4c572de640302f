//! Order repository for database operations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::{debug, instrument};

use quickbite_core::{OrderId, OrderItem, OrderStatus, UserId};

use super::RepositoryError;
use crate::models::Order;

/// Columns selected for every order query.
const ORDER_COLUMNS: &str = "id, user_id, items, amount, address, payment, status, payment_id, \
                             created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    items: Json<Vec<OrderItem>>,
    amount: Decimal,
    address: Json<serde_json::Value>,
    payment: bool,
    status: OrderStatus,
    payment_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            items: row.items.0,
            amount: row.amount,
            address: row.address.0,
            payment: row.payment,
            status: row.status,
            payment_id: row.payment_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Parameters for inserting a pending order.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub user_id: UserId,
    pub items: &'a [OrderItem],
    pub amount: Decimal,
    pub address: &'a serde_json::Value,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an unpaid order in `pending` status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, order), fields(user_id = %order.user_id, amount = %order.amount))]
    pub async fn create(&self, order: NewOrder<'_>) -> Result<Order, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO quickbite.orders (user_id, items, amount, address, payment, status)
            VALUES ($1, $2, $3, $4, false, $5)
            RETURNING {ORDER_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order.user_id)
            .bind(Json(order.items))
            .bind(order.amount)
            .bind(Json(order.address))
            .bind(OrderStatus::Pending)
            .fetch_one(self.pool)
            .await?;

        debug!(order_id = %row.id, "Inserted pending order");
        Ok(row.into())
    }

    /// Get an order by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM quickbite.orders WHERE id = $1");

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Order::from))
    }

    /// Record the checkout session created for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self))]
    pub async fn set_payment_id(&self, id: OrderId, payment_id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE quickbite.orders
            SET payment_id = $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(payment_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set the payment flag and status in one update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self))]
    pub async fn record_payment(
        &self,
        id: OrderId,
        paid: bool,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE quickbite.orders
            SET payment = $2, status = $3, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(paid)
        .bind(status)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Change an order's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE quickbite.orders
            SET status = $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM quickbite.orders \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );

        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// List all orders, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_all(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM quickbite.orders \
             WHERE ($1::quickbite.order_status IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC"
        );

        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(status)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }
}
