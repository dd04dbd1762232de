//! Facet assembly from option counts.

use std::collections::HashMap;

use serde::Serialize;

use agora_core::{AttributeId, AttributeViewVariant, Money, OptionId};

use super::filters::{FilterSet, PriceRange};
use crate::db::rubrics::FilterAttribute;

/// One filterable attribute with the options a visitor can toggle.
#[derive(Debug, Clone, Serialize)]
pub struct Facet {
    pub attribute_id: AttributeId,
    pub name: String,
    pub slug: String,
    pub view_variant: AttributeViewVariant,
    pub metric: Option<String>,
    pub options: Vec<FacetOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacetOption {
    pub id: OptionId,
    pub name: String,
    pub slug: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    /// Products matching if this option were toggled on.
    pub count: i64,
    pub selected: bool,
    /// Catalogue path with this option toggled.
    pub path: String,
}

/// Price facet: the span of minimal prices under the other filters plus the
/// current selection.
#[derive(Debug, Clone, Serialize)]
pub struct PriceFacet {
    pub min: Option<Money>,
    pub max: Option<Money>,
    pub selected: Option<PriceRange>,
    /// Path without the price filter, present only when one is set.
    pub clear_path: Option<String>,
}

/// Build the facet for one attribute.
///
/// Options keep their group order. Options nobody could reach are left out
/// unless they are currently selected, so a visitor can always switch a
/// selection off again.
#[must_use]
pub fn build_facet(
    rubric_slug: &str,
    set: &FilterSet,
    attribute: &FilterAttribute,
    counts: &HashMap<OptionId, i64>,
) -> Facet {
    let slug = attribute.attribute.slug.as_str();
    let options = attribute
        .options
        .iter()
        .filter_map(|option| {
            let count = counts.get(&option.id).copied().unwrap_or(0);
            let selected = set.is_selected(slug, option.slug.as_str());
            (count > 0 || selected).then(|| FacetOption {
                id: option.id,
                name: option.name.clone(),
                slug: option.slug.as_str().to_owned(),
                color: option.color.clone(),
                icon: option.icon.clone(),
                count,
                selected,
                path: set.toggled(slug, option.slug.as_str()).path(rubric_slug),
            })
        })
        .collect();

    Facet {
        attribute_id: attribute.attribute.id,
        name: attribute.attribute.name.clone(),
        slug: slug.to_owned(),
        view_variant: attribute.attribute.view_variant,
        metric: attribute.attribute.metric.clone(),
        options,
    }
}

#[must_use]
pub fn build_price_facet(
    rubric_slug: &str,
    set: &FilterSet,
    bounds: (Option<Money>, Option<Money>),
) -> PriceFacet {
    let selected = set.price();
    PriceFacet {
        min: bounds.0,
        max: bounds.1,
        selected,
        clear_path: selected.map(|_| set.without_price().path(rubric_slug)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalogue::resolve::tests::wine_attributes;

    #[test]
    fn test_zero_count_options_are_hidden_unless_selected() {
        let set = FilterSet::parse_path("colour-rose").unwrap();
        let attributes = wine_attributes();
        let counts = HashMap::from([(OptionId::new(10), 4), (OptionId::new(11), 0)]);

        let facet = build_facet("wine", &set, &attributes[0], &counts);
        let slugs: Vec<&str> = facet.options.iter().map(|o| o.slug.as_str()).collect();
        assert_eq!(slugs, vec!["red", "rose"]);

        let rose = &facet.options[1];
        assert!(rose.selected);
        assert_eq!(rose.count, 0);
        assert_eq!(rose.path, "/catalogue/wine");
    }

    #[test]
    fn test_option_paths_toggle_and_reset_page() {
        let set = FilterSet::parse_path("colour-red/page-3").unwrap();
        let attributes = wine_attributes();
        let counts = HashMap::from([(OptionId::new(10), 4), (OptionId::new(11), 2)]);

        let facet = build_facet("wine", &set, &attributes[0], &counts);
        assert_eq!(facet.options[0].path, "/catalogue/wine");
        assert_eq!(facet.options[1].path, "/catalogue/wine/colour-red/colour-white");
        assert!(!facet.options[1].selected);
    }

    #[test]
    fn test_price_facet_clear_path() {
        let set = FilterSet::parse_path("colour-red/price-10_20").unwrap();
        let bounds = (Some(Money::from_minor(500)), Some(Money::from_minor(9000)));

        let facet = build_price_facet("wine", &set, bounds);
        assert_eq!(facet.clear_path.as_deref(), Some("/catalogue/wine/colour-red"));
        assert!(facet.selected.is_some());

        let facet = build_price_facet("wine", &FilterSet::default(), bounds);
        assert!(facet.clear_path.is_none());
        assert_eq!(facet.min, Some(Money::from_minor(500)));
    }
}
