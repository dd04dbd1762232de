//! Order database operations.
//!
//! Orders are created by [`crate::checkout`]; this module reads them and
//! moves them through the status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, QueryBuilder};
use tracing::instrument;

use agora_core::{
    AdminUserId, CompanyId, Email, Money, OrderId, OrderProductId, OrderStatus, Phone, ProductId,
    ShopId, ShopProductId, UserId,
};

use super::{DEFAULT_PAGE_SIZE, RepositoryError, page_offset};

/// An order row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    /// Human-facing order number, e.g. `000123`.
    pub item_id: String,
    pub user_id: UserId,
    pub customer_name: String,
    pub customer_email: Email,
    pub customer_phone: Phone,
    pub comment: String,
    pub status: OrderStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot of a cart line taken at checkout.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderProduct {
    pub id: OrderProductId,
    pub order_id: OrderId,
    pub shop_product_id: Option<ShopProductId>,
    pub product_id: Option<ProductId>,
    pub shop_id: ShopId,
    pub company_id: CompanyId,
    pub item_id: String,
    pub product_name: String,
    pub product_slug: String,
    pub shop_name: String,
    pub price: Money,
    pub amount: i32,
    pub total: Money,
}

/// One status change.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderLogEntry {
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub admin_user_id: Option<AdminUserId>,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// An order with its products and status history.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub products: Vec<OrderProduct>,
    pub log: Vec<OrderLogEntry>,
    /// Statuses the order may move to next.
    pub next_statuses: Vec<OrderStatus>,
}

/// Admin order listing filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderListFilter {
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub page: u32,
}

/// Who is changing the status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderActor {
    Admin(AdminUserId),
    Customer(UserId),
}

impl OrderActor {
    /// Check whether this actor may apply `to` to an order.
    ///
    /// Admins may apply any lifecycle transition. Customers may only cancel
    /// their own orders, and only while they are pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when a customer touches someone
    /// else's order and `RepositoryError::Invalid` for disallowed moves.
    pub fn authorize(self, order: &Order, to: OrderStatus) -> Result<OrderStatus, RepositoryError> {
        if let Self::Customer(user_id) = self {
            if order.user_id != user_id {
                return Err(RepositoryError::NotFound);
            }
            if to != OrderStatus::Canceled || !order.status.can_be_canceled_by_customer() {
                return Err(RepositoryError::Invalid(
                    "the order can no longer be canceled".to_owned(),
                ));
            }
        }
        order
            .status
            .transition(to)
            .map_err(|e| RepositoryError::Invalid(e.to_string()))
    }

    const fn admin_user_id(self) -> Option<AdminUserId> {
        match self {
            Self::Admin(id) => Some(id),
            Self::Customer(_) => None,
        }
    }

    const fn user_id(self) -> Option<UserId> {
        match self {
            Self::Customer(id) => Some(id),
            Self::Admin(_) => None,
        }
    }
}

pub(crate) const ORDER_COLUMNS: &str = "id, item_id, user_id, customer_name, customer_email, \
     customer_phone, comment, status, total, created_at, updated_at";
pub(crate) const ORDER_PRODUCT_COLUMNS: &str = "id, order_id, shop_product_id, product_id, \
     shop_id, company_id, item_id, product_name, product_slug, shop_name, price, amount, total";

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

    /// List orders, newest first, optionally by status.
    ///
    /// Returns the page and the total number of matching orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, filter: &OrderListFilter) -> Result<(Vec<Order>, i64), RepositoryError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM sales.order WHERE TRUE");
        let mut select =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM sales.order WHERE TRUE"));
        if let Some(status) = filter.status {
            count.push(" AND status = ").push_bind(status);
            select.push(" AND status = ").push_bind(status);
        }
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(DEFAULT_PAGE_SIZE)
            .push(" OFFSET ")
            .push_bind(page_offset(filter.page, DEFAULT_PAGE_SIZE));

        let total = count.build_query_scalar::<i64>().fetch_one(self.pool).await?;
        let orders = select.build_query_as::<Order>().fetch_all(self.pool).await?;
        Ok((orders, total))
    }

    /// Orders of a customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM sales.order WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    /// Get an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn get(&self, id: OrderId) -> Result<Order, RepositoryError> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM sales.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Get an order with its products and status log.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn get_details(&self, id: OrderId) -> Result<OrderDetails, RepositoryError> {
        let order = self.get(id).await?;

        let products = sqlx::query_as::<_, OrderProduct>(&format!(
            "SELECT {ORDER_PRODUCT_COLUMNS} FROM sales.order_product WHERE order_id = $1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let log = sqlx::query_as::<_, OrderLogEntry>(
            "SELECT from_status, to_status, admin_user_id, user_id, created_at
             FROM sales.order_log WHERE order_id = $1 ORDER BY created_at, id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let next_statuses = order.status.next_statuses();
        Ok(OrderDetails {
            order,
            products,
            log,
            next_statuses,
        })
    }

    /// Move an order to a new status.
    ///
    /// The order row is locked for the duration of the change. Canceling
    /// returns the ordered amounts to shop stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the transition is not allowed
    /// for this actor and `RepositoryError::NotFound` if the order does not
    /// exist (or belongs to another customer).
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        id: OrderId,
        to: OrderStatus,
        actor: OrderActor,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM sales.order WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let next = actor.authorize(&current, to)?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE sales.order SET status = $2, updated_at = NOW() WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(next)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO sales.order_log (order_id, from_status, to_status, admin_user_id, user_id)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(current.status)
        .bind(next)
        .bind(actor.admin_user_id())
        .bind(actor.user_id())
        .execute(&mut *tx)
        .await?;

        if next == OrderStatus::Canceled {
            sqlx::query(
                "UPDATE catalog.shop_product sp
                 SET available = sp.available + op.amount, updated_at = NOW()
                 FROM sales.order_product op
                 WHERE op.order_id = $1 AND op.shop_product_id = sp.id",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %id,
            from = %current.status,
            to = %next,
            "Order status changed"
        );
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(status: OrderStatus, user: i32) -> Order {
        Order {
            id: OrderId::new(1),
            item_id: "000001".to_owned(),
            user_id: UserId::new(user),
            customer_name: "Ann".to_owned(),
            customer_email: Email::parse("ann@example.com").unwrap(),
            customer_phone: Phone::parse("+7 999 123 45 67").unwrap(),
            comment: String::new(),
            status,
            total: Money::from_minor(1000),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_admin_follows_lifecycle() {
        let admin = OrderActor::Admin(AdminUserId::new(1));
        assert_eq!(
            admin
                .authorize(&order(OrderStatus::Confirmed, 5), OrderStatus::Ready)
                .unwrap(),
            OrderStatus::Ready
        );
        assert!(matches!(
            admin.authorize(&order(OrderStatus::Done, 5), OrderStatus::Canceled),
            Err(RepositoryError::Invalid(_))
        ));
    }

    #[test]
    fn test_customer_cancels_own_pending_order_only() {
        let customer = OrderActor::Customer(UserId::new(5));
        assert!(customer
            .authorize(&order(OrderStatus::Pending, 5), OrderStatus::Canceled)
            .is_ok());
        assert!(matches!(
            customer.authorize(&order(OrderStatus::Pending, 6), OrderStatus::Canceled),
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            customer.authorize(&order(OrderStatus::Confirmed, 5), OrderStatus::Canceled),
            Err(RepositoryError::Invalid(_))
        ));
        assert!(customer
            .authorize(&order(OrderStatus::Pending, 5), OrderStatus::Confirmed)
            .is_err());
    }

    #[test]
    fn test_actor_log_columns() {
        let admin = OrderActor::Admin(AdminUserId::new(2));
        assert_eq!(admin.admin_user_id(), Some(AdminUserId::new(2)));
        assert_eq!(admin.user_id(), None);
    }

    #[test]
    fn test_list_filter_defaults() {
        let filter: OrderListFilter = serde_json::from_str(r#"{"status":"ready"}"#).unwrap();
        assert_eq!(filter.status, Some(OrderStatus::Ready));
        assert_eq!(filter.page, 0);
    }
}
