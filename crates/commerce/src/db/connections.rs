//! Product variant connections.
//!
//! A connection links products that are variants of each other along one
//! select attribute (the same wine in 0.375 l, 0.75 l and 1.5 l). Each
//! product in a connection has a distinct option of that attribute, and a
//! product is in at most one connection per attribute.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use agora_core::{AttributeId, AttributeVariant, ConnectionId, OptionId, ProductId, RubricId, Slug};

use super::{RepositoryError, map_write_error};

/// A variant connection.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Connection {
    pub id: ConnectionId,
    pub attribute_id: AttributeId,
    pub created_at: DateTime<Utc>,
}

/// A member of a connection with the option that distinguishes it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ConnectedProduct {
    pub product_id: ProductId,
    pub name: String,
    pub slug: Slug,
    pub active: bool,
    pub option_id: OptionId,
    pub option_name: String,
    pub option_slug: Slug,
}

/// A connection with its attribute and members ordered by option.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionWithProducts {
    #[serde(flatten)]
    pub connection: Connection,
    pub attribute_name: String,
    pub attribute_slug: Slug,
    pub products: Vec<ConnectedProduct>,
}

/// What remains after removing a product from a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalOutcome {
    /// Other products are still connected.
    Kept,
    /// The connection became empty and was deleted.
    Deleted,
}

#[derive(sqlx::FromRow)]
struct Membership {
    rubric_id: RubricId,
    variant: AttributeVariant,
    option_ids: Option<Vec<i32>>,
}

/// Repository for variant connections.
pub struct ConnectionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ConnectionRepository<'a> {
    /// Create a new connection repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a connection with its products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the connection does not exist.
    pub async fn get(&self, id: ConnectionId) -> Result<ConnectionWithProducts, RepositoryError> {
        let (connection, attribute_name, attribute_slug) = sqlx::query_as::<
            _,
            (ConnectionId, AttributeId, DateTime<Utc>, String, Slug),
        >(
            "SELECT c.id, c.attribute_id, c.created_at, a.name, a.slug
             FROM catalog.connection c
             JOIN catalog.attribute a ON a.id = c.attribute_id
             WHERE c.id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(|(id, attribute_id, created_at, name, slug)| {
            (
                Connection {
                    id,
                    attribute_id,
                    created_at,
                },
                name,
                slug,
            )
        })
        .ok_or(RepositoryError::NotFound)?;

        let products = sqlx::query_as::<_, ConnectedProduct>(
            "SELECT p.id AS product_id, p.name, p.slug, p.active,
                    o.id AS option_id, o.name AS option_name, o.slug AS option_slug
             FROM catalog.connection_product cp
             JOIN catalog.product p ON p.id = cp.product_id
             JOIN catalog.option o ON o.id = cp.option_id
             WHERE cp.connection_id = $1
             ORDER BY o.priority DESC, o.name",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(ConnectionWithProducts {
            connection,
            attribute_name,
            attribute_slug,
            products,
        })
    }

    /// All connections a product takes part in.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ConnectionWithProducts>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, ConnectionId>(
            "SELECT connection_id FROM catalog.connection_product
             WHERE product_id = $1 ORDER BY connection_id",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        let mut connections = Vec::with_capacity(ids.len());
        for id in ids {
            connections.push(self.get(id).await?);
        }
        Ok(connections)
    }

    /// Start a connection keyed by `attribute_id` with one product in it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the attribute is not a single
    /// select or the product has no value for it, and
    /// `RepositoryError::Conflict` if the product is already connected by
    /// this attribute.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        product_id: ProductId,
        attribute_id: AttributeId,
    ) -> Result<ConnectionWithProducts, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let membership = membership(&mut tx, product_id, attribute_id).await?;
        let option_id = connection_option(&membership)?;

        let id = sqlx::query_scalar::<_, ConnectionId>(
            "INSERT INTO catalog.connection (attribute_id) VALUES ($1) RETURNING id",
        )
        .bind(attribute_id)
        .fetch_one(&mut *tx)
        .await?;

        insert_member(&mut tx, id, product_id, option_id, attribute_id).await?;
        tx.commit().await?;

        tracing::info!(connection_id = %id, product_id = %product_id, "Connection created");
        self.get(id).await
    }

    /// Add a product to an existing connection.
    ///
    /// The product must be in the same rubric as the current members and
    /// carry an option not yet used in the connection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` when the product does not fit and
    /// `RepositoryError::Conflict` when its option is taken or it is already
    /// connected by this attribute.
    #[instrument(skip(self))]
    pub async fn add_product(
        &self,
        id: ConnectionId,
        product_id: ProductId,
    ) -> Result<ConnectionWithProducts, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let attribute_id = sqlx::query_scalar::<_, AttributeId>(
            "SELECT attribute_id FROM catalog.connection WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let membership = membership(&mut tx, product_id, attribute_id).await?;
        let option_id = connection_option(&membership)?;

        let other_rubric = sqlx::query_scalar::<_, RubricId>(
            "SELECT p.rubric_id FROM catalog.connection_product cp
             JOIN catalog.product p ON p.id = cp.product_id
             WHERE cp.connection_id = $1 AND p.rubric_id <> $2
             LIMIT 1",
        )
        .bind(id)
        .bind(membership.rubric_id)
        .fetch_optional(&mut *tx)
        .await?;
        if other_rubric.is_some() {
            return Err(RepositoryError::Invalid(
                "connected products must belong to the same rubric".to_owned(),
            ));
        }

        insert_member(&mut tx, id, product_id, option_id, attribute_id).await?;
        tx.commit().await?;

        self.get(id).await
    }

    /// Remove a product from a connection, deleting the connection when it
    /// becomes empty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not a member.
    #[instrument(skip(self))]
    pub async fn remove_product(
        &self,
        id: ConnectionId,
        product_id: ProductId,
    ) -> Result<RemovalOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM catalog.connection_product WHERE connection_id = $1 AND product_id = $2",
        )
        .bind(id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let outcome = removal_outcome(drop_empty_connections(&mut tx, &[id]).await?);

        tx.commit().await?;
        Ok(outcome)
    }
}

/// Delete the connections among `ids` that have no members left.
///
/// Returns how many were deleted.
pub(crate) async fn drop_empty_connections(
    tx: &mut Transaction<'_, Postgres>,
    ids: &[ConnectionId],
) -> Result<u64, RepositoryError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let ids: Vec<i32> = ids.iter().map(ConnectionId::as_i32).collect();
    let result = sqlx::query(
        "DELETE FROM catalog.connection c
         WHERE c.id = ANY($1)
           AND NOT EXISTS (
               SELECT 1 FROM catalog.connection_product cp WHERE cp.connection_id = c.id
           )",
    )
    .bind(ids)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

/// Take a product out of every connection it belongs to, dropping the
/// connections that end up empty. Returns the connections it left.
pub(crate) async fn leave_connections(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
) -> Result<Vec<ConnectionId>, RepositoryError> {
    let left = sqlx::query_scalar::<_, ConnectionId>(
        "DELETE FROM catalog.connection_product WHERE product_id = $1 RETURNING connection_id",
    )
    .bind(product_id)
    .fetch_all(&mut **tx)
    .await?;
    drop_empty_connections(tx, &left).await?;
    Ok(left)
}

const fn removal_outcome(dropped: u64) -> RemovalOutcome {
    if dropped == 0 {
        RemovalOutcome::Kept
    } else {
        RemovalOutcome::Deleted
    }
}

/// The product's rubric and its value for the attribute. The product row
/// stays locked until the transaction ends, so attribute edits on the same
/// product wait for the membership change.
async fn membership(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    attribute_id: AttributeId,
) -> Result<Membership, RepositoryError> {
    sqlx::query_as::<_, Membership>(
        "SELECT p.rubric_id, a.variant, pa.option_ids
         FROM catalog.product p
         CROSS JOIN catalog.attribute a
         LEFT JOIN catalog.product_attribute pa
           ON pa.product_id = p.id AND pa.attribute_id = a.id
         WHERE p.id = $1 AND a.id = $2
         FOR UPDATE OF p",
    )
    .bind(product_id)
    .bind(attribute_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// The option a product brings into a connection.
fn connection_option(membership: &Membership) -> Result<OptionId, RepositoryError> {
    if membership.variant != AttributeVariant::Select {
        return Err(RepositoryError::Invalid(
            "connections need a single select attribute".to_owned(),
        ));
    }
    match membership.option_ids.as_deref() {
        Some([option]) => Ok(OptionId::new(*option)),
        _ => Err(RepositoryError::Invalid(
            "product has no value for the connection attribute".to_owned(),
        )),
    }
}

async fn insert_member(
    tx: &mut Transaction<'_, Postgres>,
    id: ConnectionId,
    product_id: ProductId,
    option_id: OptionId,
    attribute_id: AttributeId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO catalog.connection_product (connection_id, product_id, option_id, attribute_id)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(product_id)
    .bind(option_id)
    .bind(attribute_id)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        map_write_error(
            e,
            "product is already connected by this attribute or its option is taken",
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(variant: AttributeVariant, option_ids: Option<Vec<i32>>) -> Membership {
        Membership {
            rubric_id: RubricId::new(1),
            variant,
            option_ids,
        }
    }

    #[test]
    fn test_connection_option_single_value() {
        let m = membership(AttributeVariant::Select, Some(vec![7]));
        assert!(matches!(connection_option(&m), Ok(id) if id == OptionId::new(7)));
    }

    #[test]
    fn test_connection_option_requires_value() {
        let missing = membership(AttributeVariant::Select, None);
        assert!(matches!(
            connection_option(&missing),
            Err(RepositoryError::Invalid(_))
        ));
        let empty = membership(AttributeVariant::Select, Some(vec![]));
        assert!(connection_option(&empty).is_err());
    }

    #[test]
    fn test_removal_outcome() {
        assert_eq!(removal_outcome(0), RemovalOutcome::Kept);
        assert_eq!(removal_outcome(1), RemovalOutcome::Deleted);
    }

    #[test]
    fn test_connection_option_requires_single_select() {
        let multi = membership(AttributeVariant::MultipleSelect, Some(vec![1]));
        assert!(connection_option(&multi).is_err());
    }
}
