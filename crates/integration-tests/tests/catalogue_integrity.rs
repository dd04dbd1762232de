//! Variant connections against a migrated database.
//!
//! Requires a `PostgreSQL` database in `DATABASE_URL`.
//!
//! Run with: cargo test -p agora-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use agora_commerce::db::connections::RemovalOutcome;
use agora_commerce::db::products::{AttributeValue, ProductInput};
use agora_commerce::db::{ConnectionRepository, ProductRepository, RepositoryError};
use agora_core::Slug;
use agora_integration_tests::{database, product, seed_catalogue, unique};

// =============================================================================
// Membership rules
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_connection_rejects_product_from_another_rubric() {
    let pool = database().await;
    let catalogue = seed_catalogue(&pool).await;
    let [small, large, _] = catalogue.options;

    let first = product(&pool, &catalogue, small).await;
    let stranger = product(&pool, &catalogue, large).await;
    sqlx::query("UPDATE catalog.product SET rubric_id = $2 WHERE id = $1")
        .bind(stranger)
        .bind(catalogue.other_rubric)
        .execute(&pool)
        .await
        .unwrap();

    let connections = ConnectionRepository::new(&pool);
    let connection = connections.create(first, catalogue.attribute).await.unwrap();
    let err = connections
        .add_product(connection.connection.id, stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Invalid(ref m) if m.contains("same rubric")));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_connection_rejects_repeated_option() {
    let pool = database().await;
    let catalogue = seed_catalogue(&pool).await;
    let [small, _, _] = catalogue.options;

    let first = product(&pool, &catalogue, small).await;
    let twin = product(&pool, &catalogue, small).await;

    let connections = ConnectionRepository::new(&pool);
    let connection = connections.create(first, catalogue.attribute).await.unwrap();
    let err = connections
        .add_product(connection.connection.id, twin)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_connected_value_is_frozen() {
    let pool = database().await;
    let catalogue = seed_catalogue(&pool).await;
    let [small, large, _] = catalogue.options;

    let first = product(&pool, &catalogue, small).await;
    ConnectionRepository::new(&pool)
        .create(first, catalogue.attribute)
        .await
        .unwrap();

    let products = ProductRepository::new(&pool);
    let err = products
        .set_attribute(first, catalogue.attribute, AttributeValue::Options(vec![large]))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Invalid(_)));

    let err = products
        .remove_attribute(first, catalogue.attribute)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Invalid(_)));

    // Writing the same option back is allowed.
    products
        .set_attribute(first, catalogue.attribute, AttributeValue::Options(vec![small]))
        .await
        .unwrap();
}

// =============================================================================
// Cleanup
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_deleting_every_member_deletes_the_connection() {
    let pool = database().await;
    let catalogue = seed_catalogue(&pool).await;
    let [small, large, _] = catalogue.options;

    let first = product(&pool, &catalogue, small).await;
    let second = product(&pool, &catalogue, large).await;
    let connections = ConnectionRepository::new(&pool);
    let id = connections
        .create(first, catalogue.attribute)
        .await
        .unwrap()
        .connection
        .id;
    connections.add_product(id, second).await.unwrap();

    let products = ProductRepository::new(&pool);
    products.delete(first).await.unwrap();
    let remaining = connections.get(id).await.unwrap();
    assert_eq!(remaining.products.len(), 1);

    products.delete(second).await.unwrap();
    assert!(matches!(
        connections.get(id).await,
        Err(RepositoryError::NotFound)
    ));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_rubric_move_leaves_connections() {
    let pool = database().await;
    let catalogue = seed_catalogue(&pool).await;
    let [small, large, _] = catalogue.options;

    let first = product(&pool, &catalogue, small).await;
    let second = product(&pool, &catalogue, large).await;
    let connections = ConnectionRepository::new(&pool);
    let id = connections
        .create(first, catalogue.attribute)
        .await
        .unwrap()
        .connection
        .id;
    connections.add_product(id, second).await.unwrap();

    let move_to_other_rubric = ProductInput {
        rubric_id: catalogue.other_rubric,
        name: "Merlot".to_owned(),
        original_name: String::new(),
        slug: Some(Slug::parse(&unique("moved")).unwrap()),
        description: String::new(),
        active: true,
    };
    let products = ProductRepository::new(&pool);
    products.update(first, &move_to_other_rubric).await.unwrap();

    assert!(connections.for_product(first).await.unwrap().is_empty());
    let remaining = connections.get(id).await.unwrap();
    let members: Vec<_> = remaining.products.iter().map(|p| p.product_id).collect();
    assert_eq!(members, vec![second]);

    let move_second = ProductInput {
        slug: Some(Slug::parse(&unique("moved")).unwrap()),
        ..move_to_other_rubric
    };
    products.update(second, &move_second).await.unwrap();
    assert!(matches!(
        connections.get(id).await,
        Err(RepositoryError::NotFound)
    ));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_removing_last_member_reports_deletion() {
    let pool = database().await;
    let catalogue = seed_catalogue(&pool).await;
    let [small, large, _] = catalogue.options;

    let first = product(&pool, &catalogue, small).await;
    let second = product(&pool, &catalogue, large).await;
    let connections = ConnectionRepository::new(&pool);
    let id = connections
        .create(first, catalogue.attribute)
        .await
        .unwrap()
        .connection
        .id;
    connections.add_product(id, second).await.unwrap();

    assert_eq!(
        connections.remove_product(id, first).await.unwrap(),
        RemovalOutcome::Kept
    );
    assert_eq!(
        connections.remove_product(id, second).await.unwrap(),
        RemovalOutcome::Deleted
    );
}
