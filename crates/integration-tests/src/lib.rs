//! Integration tests for Agora.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p agora-integration-tests
//! DATABASE_URL=postgres://localhost/agora_test \
//!     cargo test -p agora-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `fixtures` - YAML catalogue fixtures parsed and validated end to end
//! - `order_lifecycle` - Status transitions as admins and customers see them
//! - `error_payloads` - The `{success, message}` envelope across both APIs
//! - `catalogue_integrity` - Variant connections against a real database
//! - `checkout` - Stock, rollback and lock ordering when placing orders
//!
//! The last two are `#[ignore]`d and need `DATABASE_URL`. Every run seeds
//! its own uniquely named rows, so a shared test database is fine.

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use agora_commerce::db::create_pool;
use agora_core::{AttributeId, CartId, OptionId, ProductId, RubricId, ShopId, ShopProductId};

/// Connect to `DATABASE_URL` and apply the migrations.
///
/// # Panics
///
/// Panics when the database is unreachable or a migration fails.
pub async fn database() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    let pool = create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to the test database");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("Failed to apply migrations");
    pool
}

/// A slug-safe name no other run will use.
#[must_use]
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// A phone number no other run will use.
#[must_use]
pub fn unique_phone() -> String {
    format!("+7{:010}", Uuid::new_v4().as_u128() % 10_000_000_000)
}

/// Two rubrics sharing one single-select attribute, and a shop.
pub struct Catalogue {
    pub rubric: RubricId,
    pub other_rubric: RubricId,
    pub attribute: AttributeId,
    pub options: [OptionId; 3],
    pub shop: ShopId,
}

/// Seed a fresh [`Catalogue`].
///
/// # Panics
///
/// Panics when an insert fails.
pub async fn seed_catalogue(pool: &PgPool) -> Catalogue {
    let options_group: i32 = sqlx::query_scalar(
        "INSERT INTO catalog.options_group (name) VALUES ($1) RETURNING id",
    )
    .bind(unique("volumes"))
    .fetch_one(pool)
    .await
    .expect("options group");

    let mut options = [OptionId::new(0); 3];
    for (slot, slug) in options.iter_mut().zip(["375ml", "750ml", "1500ml"]) {
        *slot = sqlx::query_scalar(
            "INSERT INTO catalog.option (options_group_id, name, slug)
             VALUES ($1, $2, $2) RETURNING id",
        )
        .bind(options_group)
        .bind(slug)
        .fetch_one(pool)
        .await
        .expect("option");
    }

    let attributes_group: i32 = sqlx::query_scalar(
        "INSERT INTO catalog.attributes_group (name) VALUES ($1) RETURNING id",
    )
    .bind(unique("bottle"))
    .fetch_one(pool)
    .await
    .expect("attributes group");

    let attribute = sqlx::query_scalar(
        "INSERT INTO catalog.attribute (attributes_group_id, name, slug, variant, options_group_id)
         VALUES ($1, 'Volume', $2, 'select', $3) RETURNING id",
    )
    .bind(attributes_group)
    .bind(unique("volume"))
    .bind(options_group)
    .fetch_one(pool)
    .await
    .expect("attribute");

    let mut rubrics = [RubricId::new(0); 2];
    for (slot, name) in rubrics.iter_mut().zip(["wine", "sparkling"]) {
        let id: RubricId = sqlx::query_scalar(
            "INSERT INTO catalog.rubric (name, slug) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(unique(name))
        .fetch_one(pool)
        .await
        .expect("rubric");
        sqlx::query(
            "INSERT INTO catalog.rubric_attributes_group (rubric_id, attributes_group_id)
             VALUES ($1, $2)",
        )
        .bind(id)
        .bind(attributes_group)
        .execute(pool)
        .await
        .expect("rubric attributes group");
        *slot = id;
    }
    let [rubric, other_rubric] = rubrics;

    let company: i32 = sqlx::query_scalar(
        "INSERT INTO catalog.company (name, slug) VALUES ('Vineyard', $1) RETURNING id",
    )
    .bind(unique("vineyard"))
    .fetch_one(pool)
    .await
    .expect("company");
    let shop = sqlx::query_scalar(
        "INSERT INTO catalog.shop (company_id, name, slug, city, address)
         VALUES ($1, 'Cellar', $2, 'Porto', 'Rua 1') RETURNING id",
    )
    .bind(company)
    .bind(unique("cellar"))
    .fetch_one(pool)
    .await
    .expect("shop");

    Catalogue {
        rubric,
        other_rubric,
        attribute,
        options,
        shop,
    }
}

/// A product in `rubric` whose volume is `option`.
///
/// # Panics
///
/// Panics when an insert fails.
pub async fn product(pool: &PgPool, catalogue: &Catalogue, option: OptionId) -> ProductId {
    let id: ProductId = sqlx::query_scalar(
        "INSERT INTO catalog.product (rubric_id, name, slug) VALUES ($1, 'Merlot', $2) RETURNING id",
    )
    .bind(catalogue.rubric)
    .bind(unique("merlot"))
    .fetch_one(pool)
    .await
    .expect("product");
    sqlx::query(
        "INSERT INTO catalog.product_attribute (product_id, attribute_id, option_ids)
         VALUES ($1, $2, $3)",
    )
    .bind(id)
    .bind(catalogue.attribute)
    .bind(vec![option.as_i32()])
    .execute(pool)
    .await
    .expect("product attribute");
    id
}

/// Put a product on sale in the catalogue's shop.
///
/// # Panics
///
/// Panics when the insert fails.
pub async fn stock(
    pool: &PgPool,
    catalogue: &Catalogue,
    product: ProductId,
    price: Decimal,
    available: i32,
) -> ShopProductId {
    sqlx::query_scalar(
        "INSERT INTO catalog.shop_product (shop_id, product_id, price, available)
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(catalogue.shop)
    .bind(product)
    .bind(price)
    .bind(available)
    .fetch_one(pool)
    .await
    .expect("shop product")
}

/// A visitor cart holding `lines` in the given order.
///
/// # Panics
///
/// Panics when an insert fails.
pub async fn cart(pool: &PgPool, lines: &[(ShopProductId, i32)]) -> CartId {
    let id: CartId = sqlx::query_scalar("INSERT INTO sales.cart DEFAULT VALUES RETURNING id")
        .fetch_one(pool)
        .await
        .expect("cart");
    for (shop_product, amount) in lines {
        sqlx::query(
            "INSERT INTO sales.cart_product (cart_id, shop_product_id, amount) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(*shop_product)
        .bind(*amount)
        .execute(pool)
        .await
        .expect("cart line");
    }
    id
}

/// Units left on a shop product.
///
/// # Panics
///
/// Panics when the query fails.
pub async fn available(pool: &PgPool, shop_product: ShopProductId) -> i32 {
    sqlx::query_scalar("SELECT available FROM catalog.shop_product WHERE id = $1")
        .bind(shop_product)
        .fetch_one(pool)
        .await
        .expect("available")
}

/// Lines left in a cart.
///
/// # Panics
///
/// Panics when the query fails.
pub async fn cart_lines(pool: &PgPool, cart: CartId) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM sales.cart_product WHERE cart_id = $1")
        .bind(cart)
        .fetch_one(pool)
        .await
        .expect("cart lines")
}
