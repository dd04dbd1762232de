//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Catalogue
//! GET  /api/rubrics                      - Rubric navigation
//! GET  /api/catalogue/{rubric}           - Catalogue page without filters
//! GET  /api/catalogue/{rubric}/{*filters} - Catalogue page with filter segments
//! GET  /api/products/{slug}              - Product card
//! GET  /api/search?q=&limit=             - Full-text product search
//!
//! # Cart
//! GET  /api/cart                         - Cart view
//! POST /api/cart/add                     - Add a shop product
//! POST /api/cart/update                  - Change a line amount
//! POST /api/cart/remove                  - Remove a line
//! POST /api/cart/clear                   - Remove every line
//!
//! # Checkout (rate limited)
//! POST /api/checkout                     - Place an order
//!
//! # Auth (rate limited)
//! POST /api/auth/register                - Create an account
//! POST /api/auth/login                   - Log in
//! POST /api/auth/logout                  - Log out
//!
//! # Account (requires auth)
//! GET  /api/account/orders               - Order history
//! POST /api/account/orders/{id}/cancel   - Cancel a pending order
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalogue;
pub mod checkout;
pub mod products;
pub mod search;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Create the catalogue routes router.
pub fn catalogue_routes() -> Router<AppState> {
    Router::new()
        .route("/{rubric}", get(catalogue::show))
        .route("/{rubric}/{*filters}", get(catalogue::show_filtered))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(account::orders))
        .route("/orders/{id}/cancel", post(account::cancel_order))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/rubrics", get(catalogue::rubrics))
        .nest("/api/catalogue", catalogue_routes())
        .route("/api/products/{slug}", get(products::show))
        .route("/api/search", get(search::search))
        .nest("/api/cart", cart_routes())
        .route(
            "/api/checkout",
            post(checkout::checkout).layer(checkout_rate_limiter()),
        )
        .nest("/api/auth", auth_routes())
        .nest("/api/account", account_routes())
}
