//! SQL for catalogue pages.
//!
//! Every catalogue query shares one shape:
//!
//! ```sql
//! WITH offers AS (
//!     SELECT product_id, MIN(price), MAX(price), COUNT(*) FROM catalog.shop_product
//!     WHERE available > 0 [AND shop_id = ?] GROUP BY product_id
//! )
//! SELECT ... FROM catalog.product p JOIN offers o ON o.product_id = p.id [extra joins]
//! WHERE p.rubric_id = ? AND p.active [attribute filters] [price bounds]
//! ```
//!
//! Facet queries reuse it with one attribute filter (or the price bounds)
//! left out, so each facet counts what the visitor would get by changing
//! only that facet.

use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};

use agora_core::{AttributeId, Money, OptionId, ProductId, RubricId, ShopId, Slug};

use super::filters::{PriceRange, SortBy, SortDir};
use super::resolve::AttributeFilter;
use crate::db::page_offset;

/// A product tile on a catalogue page.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CatalogueProduct {
    pub id: ProductId,
    pub name: String,
    pub slug: Slug,
    pub item_id: String,
    pub views: i64,
    pub min_price: Money,
    pub max_price: Money,
    pub shops_count: i64,
}

/// Which filter a facet query leaves out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Except {
    Nothing,
    Attribute(AttributeId),
    Price,
}

/// A fully resolved catalogue request.
#[derive(Debug, Clone)]
pub struct CatalogueQuery {
    pub rubric_id: RubricId,
    pub filters: Vec<AttributeFilter>,
    pub price: Option<PriceRange>,
    pub shop_id: Option<ShopId>,
    pub sort_by: SortBy,
    pub sort_dir: SortDir,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

impl CatalogueQuery {
    /// Products of the requested page.
    #[must_use]
    pub fn products(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = self.with_offers();
        qb.push(
            "SELECT p.id, p.name, p.slug, p.item_id, p.views, \
             o.min_price, o.max_price, o.shops_count",
        );
        self.push_from_where(&mut qb, Except::Nothing, None);

        let column = match self.sort_by {
            SortBy::Price => "o.min_price",
            SortBy::Views => "p.views",
            SortBy::Created => "p.created_at",
            SortBy::Name => "p.name",
        };
        qb.push(format!(" ORDER BY {column} {}, p.id", self.sort_dir.sql()));

        let page_size = i64::from(self.page_size);
        qb.push(" LIMIT ")
            .push_bind(page_size)
            .push(" OFFSET ")
            .push_bind(page_offset(self.page, page_size));
        qb
    }

    /// Number of products matching every filter.
    #[must_use]
    pub fn count(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = self.with_offers();
        qb.push("SELECT COUNT(*)");
        self.push_from_where(&mut qb, Except::Nothing, None);
        qb
    }

    /// `(option_id, product count)` rows for one attribute, computed with
    /// that attribute's own filter left out.
    #[must_use]
    pub fn option_counts(&self, attribute_id: AttributeId) -> QueryBuilder<'static, Postgres> {
        let mut qb = self.with_offers();
        qb.push("SELECT opt.option_id, COUNT(DISTINCT p.id)");
        self.push_from_where(&mut qb, Except::Attribute(attribute_id), Some(attribute_id));
        qb.push(" GROUP BY opt.option_id");
        qb
    }

    /// `(min, max)` of the product minimum prices with the price filter left out.
    #[must_use]
    pub fn price_bounds(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = self.with_offers();
        qb.push("SELECT MIN(o.min_price), MAX(o.min_price)");
        self.push_from_where(&mut qb, Except::Price, None);
        qb
    }

    fn with_offers(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(
            "WITH offers AS (\
             SELECT sp.product_id, MIN(sp.price) AS min_price, MAX(sp.price) AS max_price, \
             COUNT(*) AS shops_count \
             FROM catalog.shop_product sp WHERE sp.available > 0",
        );
        if let Some(shop_id) = self.shop_id {
            qb.push(" AND sp.shop_id = ").push_bind(shop_id);
        }
        qb.push(" GROUP BY sp.product_id) ");
        qb
    }

    fn push_from_where(
        &self,
        qb: &mut QueryBuilder<'static, Postgres>,
        except: Except,
        unnest_attribute: Option<AttributeId>,
    ) {
        qb.push(" FROM catalog.product p JOIN offers o ON o.product_id = p.id");
        if let Some(attribute_id) = unnest_attribute {
            qb.push(
                " JOIN catalog.product_attribute fpa \
                 ON fpa.product_id = p.id AND fpa.attribute_id = ",
            )
            .push_bind(attribute_id)
            .push(" CROSS JOIN LATERAL unnest(fpa.option_ids) AS opt(option_id)");
        }

        qb.push(" WHERE p.active AND p.rubric_id = ")
            .push_bind(self.rubric_id);

        for filter in &self.filters {
            if except == Except::Attribute(filter.attribute_id) {
                continue;
            }
            let option_ids: Vec<i32> = filter.option_ids.iter().map(OptionId::as_i32).collect();
            qb.push(
                " AND EXISTS (SELECT 1 FROM catalog.product_attribute pa \
                 WHERE pa.product_id = p.id AND pa.attribute_id = ",
            )
            .push_bind(filter.attribute_id)
            .push(" AND pa.option_ids && ")
            .push_bind(option_ids)
            .push(")");
        }

        if except != Except::Price
            && let Some(price) = self.price
        {
            push_price(qb, price.min, " AND o.min_price >= ");
            push_price(qb, price.max, " AND o.min_price <= ");
        }
    }
}

fn push_price(qb: &mut QueryBuilder<'static, Postgres>, bound: Option<Money>, sql: &str) {
    if let Some(bound) = bound {
        qb.push(sql).push_bind(bound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> CatalogueQuery {
        CatalogueQuery {
            rubric_id: RubricId::new(1),
            filters: vec![
                AttributeFilter {
                    attribute_id: AttributeId::new(1),
                    option_ids: vec![OptionId::new(10), OptionId::new(11)],
                },
                AttributeFilter {
                    attribute_id: AttributeId::new(2),
                    option_ids: vec![OptionId::new(21)],
                },
            ],
            price: Some(PriceRange {
                min: Some(Money::from_minor(1000)),
                max: None,
            }),
            shop_id: None,
            sort_by: SortBy::Price,
            sort_dir: SortDir::Asc,
            page: 3,
            page_size: 30,
        }
    }

    fn count_of(sql: &str, needle: &str) -> usize {
        sql.matches(needle).count()
    }

    #[test]
    fn test_products_applies_every_filter() {
        let qb = query().products();
        let sql = qb.sql();
        assert_eq!(count_of(sql, "pa.option_ids && "), 2);
        assert!(sql.contains("o.min_price >= "));
        assert!(!sql.contains("o.min_price <= "));
        assert!(sql.contains("ORDER BY o.min_price ASC, p.id"));
        assert!(sql.contains("LIMIT "));
        assert!(!sql.contains("sp.shop_id"));
    }

    #[test]
    fn test_option_counts_leave_own_attribute_out() {
        let qb = query().option_counts(AttributeId::new(1));
        let sql = qb.sql();
        assert_eq!(count_of(sql, "pa.option_ids && "), 1);
        assert!(sql.contains("unnest(fpa.option_ids)"));
        assert!(sql.contains("GROUP BY opt.option_id"));
        assert!(sql.contains("o.min_price >= "));
    }

    #[test]
    fn test_price_bounds_leave_price_out() {
        let qb = query().price_bounds();
        let sql = qb.sql();
        assert_eq!(count_of(sql, "pa.option_ids && "), 2);
        assert!(!sql.contains("o.min_price >= "));
    }

    #[test]
    fn test_shop_restricts_offers() {
        let mut query = query();
        query.shop_id = Some(ShopId::new(4));
        let qb = query.count();
        let sql = qb.sql();
        assert!(sql.starts_with("WITH offers AS ("));
        assert!(sql.contains("AND sp.shop_id = $1"));
        assert!(sql.contains("SELECT COUNT(*)"));
    }
}
