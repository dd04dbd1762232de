//! Cart database operations.
//!
//! Anonymous visitors get a cart whose ID lives in their session; the cart
//! is attached to the user on login or at checkout.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::instrument;

use agora_core::{
    CartId, CartProductId, CompanyId, Money, ProductId, ShopId, ShopProductId, Slug, UserId,
};

use super::{RepositoryError, map_write_error};

/// A cart row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Cart {
    pub id: CartId,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with the current product and shop data.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub id: CartProductId,
    pub shop_product_id: ShopProductId,
    pub amount: i32,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: Slug,
    pub item_id: String,
    pub product_active: bool,
    pub shop_id: ShopId,
    pub shop_name: String,
    pub company_id: CompanyId,
    pub price: Money,
    pub available: i32,
}

impl CartLine {
    /// Price times amount.
    #[must_use]
    pub fn total(&self) -> Money {
        self.price.times(self.amount.unsigned_abs())
    }

    /// Whether the line can be bought as it stands.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.product_active && self.available >= self.amount
    }
}

/// The cart as shown to the customer.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub lines: Vec<CartLine>,
    pub total: Money,
    /// Sum of line amounts.
    pub items: u32,
}

impl CartView {
    /// Build the view from its lines.
    #[must_use]
    pub fn new(id: CartId, lines: Vec<CartLine>) -> Self {
        let total = lines.iter().map(CartLine::total).sum();
        let items = lines.iter().map(|line| line.amount.unsigned_abs()).sum();
        Self {
            id,
            lines,
            total,
            items,
        }
    }

    /// Whether there is nothing to check out.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub(crate) const LINE_QUERY: &str = "SELECT cp.id, cp.shop_product_id, cp.amount,
        p.id AS product_id, p.name AS product_name, p.slug AS product_slug, p.item_id,
        p.active AS product_active,
        s.id AS shop_id, s.name AS shop_name, s.company_id,
        sp.price, sp.available
     FROM sales.cart_product cp
     JOIN catalog.shop_product sp ON sp.id = cp.shop_product_id
     JOIN catalog.product p ON p.id = sp.product_id
     JOIN catalog.shop s ON s.id = sp.shop_id
     WHERE cp.cart_id = $1
     ORDER BY cp.id";

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a cart by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let cart = sqlx::query_as::<_, Cart>(
            "SELECT id, user_id, created_at, updated_at FROM sales.cart WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(cart)
    }

    /// The most recent cart of a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_for_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let cart = sqlx::query_as::<_, Cart>(
            "SELECT id, user_id, created_at, updated_at FROM sales.cart
             WHERE user_id = $1 ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(cart)
    }

    /// Create an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, user_id: Option<UserId>) -> Result<Cart, RepositoryError> {
        let cart = sqlx::query_as::<_, Cart>(
            "INSERT INTO sales.cart (user_id) VALUES ($1)
             RETURNING id, user_id, created_at, updated_at",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(cart)
    }

    /// Resolve the cart for a request: the session cart if it still exists,
    /// else the user's latest cart, else a new one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_or_create(
        &self,
        session_cart: Option<CartId>,
        user_id: Option<UserId>,
    ) -> Result<Cart, RepositoryError> {
        if let Some(id) = session_cart
            && let Some(cart) = self.find(id).await?
        {
            return Ok(cart);
        }
        if let Some(user_id) = user_id
            && let Some(cart) = self.find_for_user(user_id).await?
        {
            return Ok(cart);
        }
        self.create(user_id).await
    }

    /// Lines of a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, CartLine>(LINE_QUERY)
            .bind(id)
            .fetch_all(self.pool)
            .await?;
        Ok(lines)
    }

    /// The cart with its lines and totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn view(&self, id: CartId) -> Result<CartView, RepositoryError> {
        Ok(CartView::new(id, self.lines(id).await?))
    }

    /// Add a shop product, merging with an existing line for it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the amount is zero or the shop
    /// product is out of stock, and `RepositoryError::NotFound` if it does
    /// not exist.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        id: CartId,
        shop_product_id: ShopProductId,
        amount: u32,
    ) -> Result<(), RepositoryError> {
        let amount = line_amount(amount)?;
        let available = sqlx::query_scalar::<_, i32>(
            "SELECT sp.available FROM catalog.shop_product sp
             JOIN catalog.product p ON p.id = sp.product_id
             WHERE sp.id = $1 AND p.active",
        )
        .bind(shop_product_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        if available <= 0 {
            return Err(RepositoryError::Invalid("product is out of stock".to_owned()));
        }

        sqlx::query(
            "INSERT INTO sales.cart_product (cart_id, shop_product_id, amount)
             VALUES ($1, $2, $3)
             ON CONFLICT (cart_id, shop_product_id)
             DO UPDATE SET amount = sales.cart_product.amount + EXCLUDED.amount",
        )
        .bind(id)
        .bind(shop_product_id)
        .bind(amount)
        .execute(self.pool)
        .await
        .map_err(|e| map_write_error(e, "cart line"))?;
        self.touch(id).await
    }

    /// Set the amount of a line. An amount of zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this cart.
    #[instrument(skip(self))]
    pub async fn update_amount(
        &self,
        id: CartId,
        line_id: CartProductId,
        amount: u32,
    ) -> Result<(), RepositoryError> {
        if amount == 0 {
            return self.remove(id, line_id).await;
        }
        let amount = line_amount(amount)?;
        let result = sqlx::query(
            "UPDATE sales.cart_product SET amount = $3 WHERE cart_id = $1 AND id = $2",
        )
        .bind(id)
        .bind(line_id)
        .bind(amount)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.touch(id).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this cart.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: CartId, line_id: CartProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM sales.cart_product WHERE cart_id = $1 AND id = $2")
            .bind(id)
            .bind(line_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.touch(id).await
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sales.cart_product WHERE cart_id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        self.touch(id).await
    }

    /// Attach an anonymous cart to a user after login.
    ///
    /// Lines from the user's previous cart are merged into this one and the
    /// previous cart is removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn attach_user(&self, id: CartId, user_id: UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, CartId>(
            "SELECT id FROM sales.cart WHERE user_id = $1 AND id <> $2",
        )
        .bind(user_id)
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for old in previous {
            sqlx::query(
                "INSERT INTO sales.cart_product (cart_id, shop_product_id, amount)
                 SELECT $1, shop_product_id, amount FROM sales.cart_product WHERE cart_id = $2
                 ON CONFLICT (cart_id, shop_product_id)
                 DO UPDATE SET amount = sales.cart_product.amount + EXCLUDED.amount",
            )
            .bind(id)
            .bind(old)
            .execute(&mut *tx)
            .await?;
            sqlx::query("DELETE FROM sales.cart WHERE id = $1")
                .bind(old)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE sales.cart SET user_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn touch(&self, id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE sales.cart SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

fn line_amount(amount: u32) -> Result<i32, RepositoryError> {
    match i32::try_from(amount) {
        Ok(amount) if amount > 0 => Ok(amount),
        Ok(_) => Err(RepositoryError::Invalid("amount must be at least 1".to_owned())),
        Err(_) => Err(RepositoryError::Invalid("amount is too large".to_owned())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn line(id: i32, price: &str, amount: i32, available: i32) -> CartLine {
        CartLine {
            id: CartProductId::new(id),
            shop_product_id: ShopProductId::new(id * 10),
            amount,
            product_id: ProductId::new(id * 100),
            product_name: format!("Product {id}"),
            product_slug: Slug::parse(&format!("product-{id}")).unwrap(),
            item_id: format!("{}", 100_000 + id),
            product_active: true,
            shop_id: ShopId::new(1),
            shop_name: "Central".to_owned(),
            company_id: CompanyId::new(1),
            price: Money::parse(price).unwrap(),
            available,
        }
    }

    #[test]
    fn test_view_totals() {
        let view = CartView::new(
            CartId::new(1),
            vec![line(1, "10.50", 2, 5), line(2, "3.99", 1, 1)],
        );
        assert_eq!(view.total.to_string(), "24.99");
        assert_eq!(view.items, 3);
        assert!(!view.is_empty());
    }

    #[test]
    fn test_line_availability() {
        assert!(line(1, "1.00", 2, 2).is_available());
        assert!(!line(1, "1.00", 3, 2).is_available());
        let mut inactive = line(1, "1.00", 1, 5);
        inactive.product_active = false;
        assert!(!inactive.is_available());
    }

    #[test]
    fn test_line_amount_bounds() {
        assert_eq!(line_amount(3).unwrap(), 3);
        assert!(line_amount(0).is_err());
        assert!(line_amount(u32::MAX).is_err());
    }
}
