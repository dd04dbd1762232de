//! Map filter slugs to attribute and option IDs.

use agora_core::{AttributeId, OptionId};

use super::filters::FilterSet;
use crate::db::rubrics::FilterAttribute;

/// Selected options of one attribute. Options are OR-ed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    pub attribute_id: AttributeId,
    pub option_ids: Vec<OptionId>,
}

/// Result of resolving a filter set against a rubric's attributes.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// One entry per attribute, in filter key order. Attributes are AND-ed.
    pub filters: Vec<AttributeFilter>,
    /// The input without anything that did not resolve.
    pub canonical: FilterSet,
    /// Segments that were dropped, in `key` or `key-value` form.
    pub dropped: Vec<String>,
}

/// Resolve attribute and option slugs. Unknown slugs are dropped rather
/// than failing the request, so stale links still land on a valid page.
#[must_use]
pub fn resolve(set: &FilterSet, attributes: &[FilterAttribute]) -> Resolved {
    let mut canonical = set.clone();
    let mut filters = Vec::new();
    let mut dropped = Vec::new();

    for (key, values) in set.attributes() {
        let Some(attribute) = attributes.iter().find(|a| a.attribute.slug.as_str() == key) else {
            canonical.drop_attribute(key, None);
            dropped.push(key.clone());
            continue;
        };

        let mut option_ids = Vec::with_capacity(values.len());
        for value in values {
            match attribute.options.iter().find(|o| o.slug.as_str() == value) {
                Some(option) => option_ids.push(option.id),
                None => {
                    canonical.drop_attribute(key, Some(value));
                    dropped.push(format!("{key}-{value}"));
                }
            }
        }

        if !option_ids.is_empty() {
            filters.push(AttributeFilter {
                attribute_id: attribute.attribute.id,
                option_ids,
            });
        }
    }

    Resolved {
        filters,
        canonical,
        dropped,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use agora_core::{
        AttributeVariant, AttributeViewVariant, AttributesGroupId, OptionsGroupId, Slug,
    };

    use super::*;
    use crate::db::attributes::Attribute;
    use crate::db::options::CatalogOption;

    /// `colour` (1) with red (10), white (11), rose (12) and `country` (2)
    /// with france (20), italy (21).
    pub(crate) fn wine_attributes() -> Vec<FilterAttribute> {
        let attribute = |id: i32, slug: &str| Attribute {
            id: AttributeId::new(id),
            attributes_group_id: AttributesGroupId::new(1),
            name: slug.to_owned(),
            slug: Slug::key(slug).unwrap(),
            variant: AttributeVariant::Select,
            view_variant: AttributeViewVariant::List,
            options_group_id: Some(OptionsGroupId::new(id)),
            metric: None,
            show_in_catalogue_filter: true,
            show_in_card_title: false,
            position: id,
        };
        let option = |id: i32, group: i32, slug: &str| CatalogOption {
            id: OptionId::new(id),
            options_group_id: OptionsGroupId::new(group),
            name: slug.to_uppercase(),
            slug: Slug::parse(slug).unwrap(),
            color: None,
            icon: None,
            priority: 0,
        };
        vec![
            FilterAttribute {
                attribute: attribute(1, "colour"),
                options: vec![option(10, 1, "red"), option(11, 1, "white"), option(12, 1, "rose")],
            },
            FilterAttribute {
                attribute: attribute(2, "country"),
                options: vec![option(20, 2, "france"), option(21, 2, "italy")],
            },
        ]
    }

    #[test]
    fn test_resolves_known_slugs() {
        let set = FilterSet::parse_path("colour-red/colour-white/country-italy").unwrap();
        let resolved = resolve(&set, &wine_attributes());
        assert_eq!(
            resolved.filters,
            vec![
                AttributeFilter {
                    attribute_id: AttributeId::new(1),
                    option_ids: vec![OptionId::new(10), OptionId::new(11)],
                },
                AttributeFilter {
                    attribute_id: AttributeId::new(2),
                    option_ids: vec![OptionId::new(21)],
                },
            ]
        );
        assert!(resolved.dropped.is_empty());
        assert_eq!(resolved.canonical, set);
    }

    #[test]
    fn test_unknown_slugs_are_dropped() {
        let set = FilterSet::parse_path("colour-red/colour-blue/vintage-2015/page-2").unwrap();
        let resolved = resolve(&set, &wine_attributes());
        assert_eq!(resolved.filters.len(), 1);
        assert_eq!(resolved.dropped, vec!["colour-blue", "vintage"]);
        assert_eq!(
            resolved.canonical.to_segments(),
            vec!["colour-red", "page-2"]
        );
    }

    #[test]
    fn test_attribute_with_only_unknown_options_disappears() {
        let set = FilterSet::parse_path("colour-blue").unwrap();
        let resolved = resolve(&set, &wine_attributes());
        assert!(resolved.filters.is_empty());
        assert!(resolved.canonical.is_empty());
    }
}
