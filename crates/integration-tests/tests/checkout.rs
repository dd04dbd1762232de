//! Placing orders against a migrated database.
//!
//! Requires a `PostgreSQL` database in `DATABASE_URL`.
//!
//! Run with: cargo test -p agora-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use sqlx::PgPool;

use agora_commerce::checkout::{CheckoutError, CheckoutForm, make_order};
use agora_commerce::notify::Notifier;
use agora_core::{CartId, OrderStatus};
use agora_integration_tests::{
    available, cart, cart_lines, database, product, seed_catalogue, stock, unique, unique_phone,
};

fn form() -> CheckoutForm {
    CheckoutForm {
        name: "Ann Buyer".to_owned(),
        email: format!("{}@example.com", unique("buyer")),
        phone: unique_phone(),
        comment: String::new(),
    }
}

async fn order(pool: &PgPool, cart_id: CartId) -> Result<i32, CheckoutError> {
    make_order(pool, &Notifier::default(), cart_id, None, &form())
        .await
        .map(|placed| placed.order.id.as_i32())
}

// =============================================================================
// Stock
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_order_takes_stock_and_clears_cart() {
    let pool = database().await;
    let catalogue = seed_catalogue(&pool).await;
    let [small, _, _] = catalogue.options;
    let wine = product(&pool, &catalogue, small).await;
    let offer = stock(&pool, &catalogue, wine, Decimal::new(1250, 2), 5).await;
    let cart_id = cart(&pool, &[(offer, 2)]).await;

    let placed = make_order(&pool, &Notifier::default(), cart_id, None, &form())
        .await
        .unwrap();

    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert!(placed.order.item_id.len() >= 6);
    assert_eq!(placed.order.total.to_string(), "25.00");
    assert_eq!(placed.products.len(), 1);
    assert_eq!(available(&pool, offer).await, 3);
    assert_eq!(cart_lines(&pool, cart_id).await, 0);

    let log: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales.order_log WHERE order_id = $1")
        .bind(placed.order.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(log, 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_short_stock_writes_nothing() {
    let pool = database().await;
    let catalogue = seed_catalogue(&pool).await;
    let [small, large, _] = catalogue.options;
    let plenty = stock(
        &pool,
        &catalogue,
        product(&pool, &catalogue, small).await,
        Decimal::new(900, 2),
        10,
    )
    .await;
    let scarce = stock(
        &pool,
        &catalogue,
        product(&pool, &catalogue, large).await,
        Decimal::new(1800, 2),
        1,
    )
    .await;
    let cart_id = cart(&pool, &[(plenty, 1), (scarce, 2)]).await;

    let form = form();
    let err = make_order(&pool, &Notifier::default(), cart_id, None, &form)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Unavailable(ref names) if names.len() == 1));

    assert_eq!(available(&pool, plenty).await, 10);
    assert_eq!(available(&pool, scarce).await, 1);
    assert_eq!(cart_lines(&pool, cart_id).await, 2);
    let orders: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sales.order WHERE customer_email = $1")
            .bind(&form.email)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(orders, 0);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_empty_cart_is_rejected() {
    let pool = database().await;
    let cart_id = cart(&pool, &[]).await;
    assert!(matches!(
        order(&pool, cart_id).await,
        Err(CheckoutError::EmptyCart)
    ));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_crossed_carts_race_for_last_units() {
    let pool = database().await;
    let catalogue = seed_catalogue(&pool).await;
    let [small, large, _] = catalogue.options;
    let red = stock(
        &pool,
        &catalogue,
        product(&pool, &catalogue, small).await,
        Decimal::new(1000, 2),
        1,
    )
    .await;
    let white = stock(
        &pool,
        &catalogue,
        product(&pool, &catalogue, large).await,
        Decimal::new(1100, 2),
        1,
    )
    .await;

    // Same products, opposite line order.
    let first = cart(&pool, &[(red, 1), (white, 1)]).await;
    let second = cart(&pool, &[(white, 1), (red, 1)]).await;

    let (a, b) = tokio::join!(order(&pool, first), order(&pool, second));

    let placed = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 1, "exactly one checkout wins: {a:?} / {b:?}");
    for result in [a, b] {
        if let Err(err) = result {
            assert!(matches!(err, CheckoutError::Unavailable(_)), "{err:?}");
        }
    }
    assert_eq!(available(&pool, red).await, 0);
    assert_eq!(available(&pool, white).await, 0);
}
