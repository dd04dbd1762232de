//! HTTP route handlers for admin.
//!
//! Every route needs a logged-in admin. Reads are open to every role;
//! writes check the role capability named in brackets.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /api/auth/login                                   - Log in
//! POST   /api/auth/logout                                  - Log out
//! GET    /api/auth/me                                      - Current admin
//!
//! # Tenants [manage orders]
//! GET    /api/companies                                    - List companies
//! POST   /api/companies                                    - Create company
//! GET    /api/companies/{id}                               - Company
//! PUT    /api/companies/{id}                               - Update company
//! DELETE /api/companies/{id}                               - Delete company without shops
//! GET    /api/companies/{id}/shops                         - Company shops
//! POST   /api/companies/{id}/shops                         - Create shop
//! GET    /api/shops/{id}                                   - Shop
//! PUT    /api/shops/{id}                                   - Update shop
//! DELETE /api/shops/{id}                                   - Delete shop
//!
//! # Options [edit catalogue]
//! GET    /api/options-groups                               - List groups
//! POST   /api/options-groups                               - Create group
//! GET    /api/options-groups/{id}                          - Group with options
//! PUT    /api/options-groups/{id}                          - Update group
//! DELETE /api/options-groups/{id}                          - Delete group
//! POST   /api/options-groups/{id}/options                  - Add option
//! PUT    /api/options/{id}                                 - Update option
//! DELETE /api/options/{id}                                 - Delete option
//!
//! # Attributes [edit catalogue]
//! GET    /api/attributes-groups                            - List groups
//! POST   /api/attributes-groups                            - Create group
//! GET    /api/attributes-groups/{id}                       - Group with attributes
//! PUT    /api/attributes-groups/{id}                       - Rename group
//! DELETE /api/attributes-groups/{id}                       - Delete group
//! POST   /api/attributes-groups/{id}/attributes            - Add attribute
//! GET    /api/attributes/{id}                              - Attribute
//! PUT    /api/attributes/{id}                              - Update attribute
//! DELETE /api/attributes/{id}                              - Delete attribute
//!
//! # Rubrics [edit catalogue]
//! GET    /api/rubrics                                      - List rubrics
//! POST   /api/rubrics                                      - Create rubric
//! GET    /api/rubrics/{id}                                 - Rubric with attributes groups
//! PUT    /api/rubrics/{id}                                 - Update rubric
//! DELETE /api/rubrics/{id}                                 - Delete rubric
//! POST   /api/rubrics/{id}/attributes-groups/{group_id}    - Attach group
//! DELETE /api/rubrics/{id}/attributes-groups/{group_id}    - Detach group
//!
//! # Products [edit catalogue; stock needs manage orders]
//! GET    /api/products?rubric_id=&search=&page=            - List products
//! POST   /api/products                                     - Create product
//! GET    /api/products/{id}                                - Product with attributes, stock, connections
//! PUT    /api/products/{id}                                - Update product
//! DELETE /api/products/{id}                                - Delete product
//! PUT    /api/products/{id}/attributes/{attribute_id}      - Set attribute value
//! DELETE /api/products/{id}/attributes/{attribute_id}      - Remove attribute value
//! GET    /api/products/{id}/shops                          - Shop products
//! PUT    /api/products/{id}/shops/{shop_id}                - Set price and stock
//! DELETE /api/products/{id}/shops/{shop_id}                - Withdraw from shop
//! POST   /api/products/{id}/connections                    - Start a variant connection
//! POST   /api/connections/{id}/products                    - Add product to connection
//! DELETE /api/connections/{id}/products/{product_id}       - Remove product from connection
//! POST   /api/products/{id}/uniqueness                     - Submit description for checking
//! GET    /api/products/{id}/uniqueness                     - Poll and store the result
//!
//! # Orders [manage orders]
//! GET    /api/orders?status=&page=                         - List orders
//! GET    /api/orders/{id}                                  - Order with products and log
//! POST   /api/orders/{id}/status                           - Change status
//!
//! # Admin users [super admin]
//! GET    /api/admin-users                                  - List admin users
//! POST   /api/admin-users                                  - Create admin user
//! ```

pub mod admin_users;
pub mod attributes;
pub mod auth;
pub mod companies;
pub mod options;
pub mod orders;
pub mod products;
pub mod rubrics;

use axum::{
    Router,
    routing::{get, post, put},
};
use serde::Serialize;

use agora_commerce::db::DEFAULT_PAGE_SIZE;

use crate::middleware::login_rate_limiter;
use crate::state::AppState;

/// One page of a listing.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: i64,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn new(items: Vec<T>, total: i64, page: u32) -> Self {
        Self {
            items,
            total,
            page,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login).layer(login_rate_limiter()))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

fn tenant_routes() -> Router<AppState> {
    Router::new()
        .route("/companies", get(companies::list).post(companies::create))
        .route(
            "/companies/{id}",
            get(companies::show)
                .put(companies::update)
                .delete(companies::delete),
        )
        .route(
            "/companies/{id}/shops",
            get(companies::shops).post(companies::create_shop),
        )
        .route(
            "/shops/{id}",
            get(companies::show_shop)
                .put(companies::update_shop)
                .delete(companies::delete_shop),
        )
}

fn catalogue_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/options-groups",
            get(options::list_groups).post(options::create_group),
        )
        .route(
            "/options-groups/{id}",
            get(options::show_group)
                .put(options::update_group)
                .delete(options::delete_group),
        )
        .route("/options-groups/{id}/options", post(options::add_option))
        .route(
            "/options/{id}",
            put(options::update_option).delete(options::delete_option),
        )
        .route(
            "/attributes-groups",
            get(attributes::list_groups).post(attributes::create_group),
        )
        .route(
            "/attributes-groups/{id}",
            get(attributes::show_group)
                .put(attributes::rename_group)
                .delete(attributes::delete_group),
        )
        .route(
            "/attributes-groups/{id}/attributes",
            post(attributes::add_attribute),
        )
        .route(
            "/attributes/{id}",
            get(attributes::show)
                .put(attributes::update)
                .delete(attributes::delete),
        )
        .route("/rubrics", get(rubrics::list).post(rubrics::create))
        .route(
            "/rubrics/{id}",
            get(rubrics::show).put(rubrics::update).delete(rubrics::delete),
        )
        .route(
            "/rubrics/{id}/attributes-groups/{group_id}",
            post(rubrics::attach_group).delete(rubrics::detach_group),
        )
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route(
            "/products/{id}/attributes/{attribute_id}",
            put(products::set_attribute).delete(products::remove_attribute),
        )
        .route("/products/{id}/shops", get(products::shop_products))
        .route(
            "/products/{id}/shops/{shop_id}",
            put(products::upsert_shop_product).delete(products::delete_shop_product),
        )
        .route(
            "/products/{id}/connections",
            post(products::create_connection),
        )
        .route(
            "/connections/{id}/products",
            post(products::add_to_connection),
        )
        .route(
            "/connections/{id}/products/{product_id}",
            axum::routing::delete(products::remove_from_connection),
        )
        .route(
            "/products/{id}/uniqueness",
            post(products::submit_uniqueness).get(products::poll_uniqueness),
        )
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::change_status))
}

/// Create all routes for admin.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/auth", auth_routes())
        .merge(tenant_routes())
        .merge(catalogue_routes())
        .merge(product_routes())
        .merge(order_routes())
        .route(
            "/admin-users",
            get(admin_users::list).post(admin_users::create),
        );

    Router::new().nest("/api", api)
}
