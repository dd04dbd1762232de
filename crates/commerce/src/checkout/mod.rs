//! Turning a cart into an order.
//!
//! Everything between reading the cart and clearing it happens in one
//! transaction: the customer record, the order number, the order and its
//! product snapshots, the stock decrement and the first log entry. If any
//! line runs out of stock meanwhile, nothing is written.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use agora_core::{CartId, Email, Money, OrderStatus, Phone, ShopId, ShopProductId, UserId};

use crate::db::carts::{CartLine, LINE_QUERY};
use crate::db::orders::{ORDER_COLUMNS, ORDER_PRODUCT_COLUMNS, Order, OrderProduct};
use crate::db::users::find_or_create_customer;
use crate::db::{RepositoryError, ShopRepository};
use crate::notify::Notifier;

const MAX_NAME_LENGTH: usize = 200;
const MAX_COMMENT_LENGTH: usize = 2000;

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The contact form is incomplete or malformed.
    #[error("{0}")]
    Validation(String),

    #[error("the cart is empty")]
    EmptyCart,

    /// Products that are inactive or no longer in stock in the requested amount.
    #[error("not available in the requested amount: {}", .0.join(", "))]
    Unavailable(Vec<String>),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Contact details submitted at checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub comment: String,
}

/// A checkout form that passed validation.
#[derive(Debug, Clone)]
pub struct Contact {
    pub name: String,
    pub email: Email,
    pub phone: Phone,
    pub comment: String,
}

impl CheckoutForm {
    /// Validate and normalise the form.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` naming the first bad field.
    pub fn validate(&self) -> Result<Contact, CheckoutError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CheckoutError::Validation("name is required".to_owned()));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(CheckoutError::Validation("name is too long".to_owned()));
        }
        let email = Email::parse(&self.email)
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;
        let phone = Phone::parse(&self.phone)
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;
        let comment = self.comment.trim();
        if comment.chars().count() > MAX_COMMENT_LENGTH {
            return Err(CheckoutError::Validation("comment is too long".to_owned()));
        }

        Ok(Contact {
            name: name.to_owned(),
            email,
            phone,
            comment: comment.to_owned(),
        })
    }
}

/// The order as written.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub products: Vec<OrderProduct>,
}

/// Human-facing order number for a sequence value.
#[must_use]
pub fn order_number(sequence: i64) -> String {
    format!("{sequence:06}")
}

/// Shop product IDs in the order their rows are locked.
///
/// Every checkout locks ascending by ID, so two carts holding the same
/// products wait on each other instead of deadlocking.
#[must_use]
pub fn lock_order(ids: &[ShopProductId]) -> Vec<i32> {
    let mut ids: Vec<i32> = ids.iter().map(ShopProductId::as_i32).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Check every line can be bought.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyCart` or `CheckoutError::Unavailable` with
/// the names of the offending products.
pub fn check_lines(lines: &[CartLine]) -> Result<Money, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let unavailable: Vec<String> = lines
        .iter()
        .filter(|line| !line.is_available())
        .map(|line| line.product_name.clone())
        .collect();
    if !unavailable.is_empty() {
        return Err(CheckoutError::Unavailable(unavailable));
    }
    Ok(lines.iter().map(CartLine::total).sum())
}

/// Place an order for the cart.
///
/// `session_user` is the logged-in customer, if any. Otherwise the order is
/// attached to the user owning the email or phone, or to a new guest user.
/// Notifications go out after commit and never fail the order.
///
/// # Errors
///
/// See [`CheckoutError`].
#[instrument(skip(pool, notifier, form), fields(cart_id = %cart_id))]
pub async fn make_order(
    pool: &PgPool,
    notifier: &Notifier,
    cart_id: CartId,
    session_user: Option<UserId>,
    form: &CheckoutForm,
) -> Result<PlacedOrder, CheckoutError> {
    let contact = form.validate()?;

    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM sales.cart WHERE id = $1 FOR UPDATE")
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;

    // Lock the shop products so the stock check and the decrement agree.
    let shop_product_ids = sqlx::query_scalar::<_, ShopProductId>(
        "SELECT shop_product_id FROM sales.cart_product WHERE cart_id = $1",
    )
    .bind(cart_id)
    .fetch_all(&mut *tx)
    .await?;
    sqlx::query("SELECT id FROM catalog.shop_product WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(lock_order(&shop_product_ids))
        .execute(&mut *tx)
        .await?;

    let lines = sqlx::query_as::<_, CartLine>(LINE_QUERY)
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;
    let total = check_lines(&lines)?;

    let user_id = match session_user {
        Some(id) => id,
        None => {
            find_or_create_customer(&mut tx, &contact.name, &contact.email, &contact.phone)
                .await?
        }
    };

    let sequence: i64 = sqlx::query_scalar("SELECT nextval('sales.order_item_id_seq')")
        .fetch_one(&mut *tx)
        .await?;

    let order = sqlx::query_as::<_, Order>(&format!(
        "INSERT INTO sales.order
            (item_id, user_id, customer_name, customer_email, customer_phone, comment, status, total)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order_number(sequence))
    .bind(user_id)
    .bind(&contact.name)
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(&contact.comment)
    .bind(OrderStatus::Pending)
    .bind(total)
    .fetch_one(&mut *tx)
    .await?;

    let mut products = Vec::with_capacity(lines.len());
    let mut sold_out = Vec::new();
    for line in &lines {
        let updated = sqlx::query(
            "UPDATE catalog.shop_product
             SET available = available - $2, updated_at = NOW()
             WHERE id = $1 AND available >= $2",
        )
        .bind(line.shop_product_id)
        .bind(line.amount)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            sold_out.push(line.product_name.clone());
            continue;
        }

        let product = sqlx::query_as::<_, OrderProduct>(&format!(
            "INSERT INTO sales.order_product
                (order_id, shop_product_id, product_id, shop_id, company_id, item_id,
                 product_name, product_slug, shop_name, price, amount, total)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {ORDER_PRODUCT_COLUMNS}"
        ))
        .bind(order.id)
        .bind(line.shop_product_id)
        .bind(line.product_id)
        .bind(line.shop_id)
        .bind(line.company_id)
        .bind(&line.item_id)
        .bind(&line.product_name)
        .bind(&line.product_slug)
        .bind(&line.shop_name)
        .bind(line.price)
        .bind(line.amount)
        .bind(line.total())
        .fetch_one(&mut *tx)
        .await?;
        products.push(product);
    }
    if !sold_out.is_empty() {
        // Dropping the transaction rolls everything back.
        return Err(CheckoutError::Unavailable(sold_out));
    }

    sqlx::query(
        "INSERT INTO sales.order_log (order_id, from_status, to_status, user_id)
         VALUES ($1, NULL, $2, $3)",
    )
    .bind(order.id)
    .bind(OrderStatus::Pending)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM sales.cart_product WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE sales.cart SET user_id = $2, updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        item_id = %order.item_id,
        total = %order.total,
        lines = products.len(),
        "Order placed"
    );

    let shop_ids: Vec<ShopId> = products
        .iter()
        .map(|p| p.shop_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    match ShopRepository::new(pool).get_many(&shop_ids).await {
        Ok(shops) => notifier.order_placed(&order, &products, &shops).await,
        Err(e) => {
            tracing::warn!(order_id = %order.id, error = %e, "Failed to load shops for notifications");
            notifier.order_placed(&order, &products, &[]).await;
        }
    }

    Ok(PlacedOrder { order, products })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::carts::tests::line;

    fn form() -> CheckoutForm {
        CheckoutForm {
            name: "  Ann  ".to_owned(),
            email: "ann@example.com".to_owned(),
            phone: "8 (999) 123-45-67".to_owned(),
            comment: String::new(),
        }
    }

    #[test]
    fn test_valid_form_is_normalised() {
        let contact = form().validate().unwrap();
        assert_eq!(contact.name, "Ann");
        assert_eq!(contact.phone.as_str(), "+79991234567");
    }

    #[test]
    fn test_form_requires_name_email_and_phone() {
        let mut bad = form();
        bad.name = "   ".to_owned();
        assert!(matches!(bad.validate(), Err(CheckoutError::Validation(m)) if m.contains("name")));

        let mut bad = form();
        bad.email = "nope".to_owned();
        assert!(matches!(bad.validate(), Err(CheckoutError::Validation(_))));

        let mut bad = form();
        bad.phone = "12".to_owned();
        assert!(matches!(bad.validate(), Err(CheckoutError::Validation(_))));
    }

    #[test]
    fn test_lock_order_ignores_cart_order() {
        let forward = [ShopProductId::new(3), ShopProductId::new(8)];
        let backward = [ShopProductId::new(8), ShopProductId::new(3), ShopProductId::new(8)];
        assert_eq!(lock_order(&forward), vec![3, 8]);
        assert_eq!(lock_order(&backward), lock_order(&forward));
        assert!(lock_order(&[]).is_empty());
    }

    #[test]
    fn test_order_number_is_zero_padded() {
        assert_eq!(order_number(123), "000123");
        assert_eq!(order_number(1_234_567), "1234567");
    }

    #[test]
    fn test_check_lines() {
        assert!(matches!(check_lines(&[]), Err(CheckoutError::EmptyCart)));

        let total = check_lines(&[line(1, "10.00", 2, 5), line(2, "2.50", 1, 1)]).unwrap();
        assert_eq!(total, Money::parse("22.50").unwrap());

        let err = check_lines(&[line(1, "10.00", 2, 5), line(2, "2.50", 3, 1)]).unwrap_err();
        assert!(matches!(err, CheckoutError::Unavailable(names) if names == vec!["Product 2"]));
    }

    #[test]
    fn test_inactive_product_is_unavailable() {
        let mut inactive = line(1, "10.00", 1, 5);
        inactive.product_active = false;
        assert!(matches!(
            check_lines(&[inactive]),
            Err(CheckoutError::Unavailable(_))
        ));
    }
}
