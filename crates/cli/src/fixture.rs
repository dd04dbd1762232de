//! YAML catalogue fixtures.
//!
//! A fixture describes a whole catalogue by name and slug instead of by
//! database ID, so it can be written by hand and loaded into an empty
//! database:
//!
//! ```yaml
//! options_groups:
//!   - name: Wine colours
//!     variant: color
//!     options:
//!       - { name: Red, slug: red, color: "#7b1e2b" }
//! attributes_groups:
//!   - name: Wine
//!     attributes:
//!       - { name: Colour, slug: colour, variant: select, options_group: Wine colours,
//!           show_in_catalogue_filter: true }
//! rubrics:
//!   - { name: Wine, slug: wine, attributes_groups: [Wine] }
//! companies:
//!   - name: Vineyard
//!     slug: vineyard
//!     shops:
//!       - { name: Central, slug: central, city: Moscow, address: "Tverskaya 1" }
//! products:
//!   - name: Merlot 2015
//!     rubric: wine
//!     attributes: { colour: red }
//!     shops: { central: { price: "12.50", available: 10 } }
//! ```
//!
//! [`Fixture::validate`] checks every cross reference before anything is
//! written.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use agora_commerce::db::attributes::AttributeInput;
use agora_commerce::db::options::OptionInput;
use agora_commerce::db::products::ShopProductInput;
use agora_core::{
    AttributeVariant, AttributeViewVariant, Email, OptionsGroupId, OptionsGroupVariant, Phone,
    Slug,
};

/// A complete catalogue fixture.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub options_groups: Vec<OptionsGroupFixture>,
    #[serde(default)]
    pub attributes_groups: Vec<AttributesGroupFixture>,
    /// Parents must come before their children.
    #[serde(default)]
    pub rubrics: Vec<RubricFixture>,
    #[serde(default)]
    pub companies: Vec<CompanyFixture>,
    #[serde(default)]
    pub products: Vec<ProductFixture>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsGroupFixture {
    pub name: String,
    #[serde(default)]
    pub variant: OptionsGroupVariant,
    #[serde(default)]
    pub options: Vec<OptionInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributesGroupFixture {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeFixture>,
}

/// An attribute whose options group is referenced by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeFixture {
    pub name: String,
    pub slug: Slug,
    pub variant: AttributeVariant,
    #[serde(default)]
    pub view_variant: AttributeViewVariant,
    pub options_group: Option<String>,
    pub metric: Option<String>,
    #[serde(default)]
    pub show_in_catalogue_filter: bool,
    #[serde(default)]
    pub show_in_card_title: bool,
    #[serde(default)]
    pub position: i32,
}

impl AttributeFixture {
    /// The repository input once the options group has an ID.
    #[must_use]
    pub fn to_input(&self, options_group_id: Option<OptionsGroupId>) -> AttributeInput {
        AttributeInput {
            name: self.name.clone(),
            slug: self.slug.clone(),
            variant: self.variant,
            view_variant: self.view_variant,
            options_group_id,
            metric: self.metric.clone(),
            show_in_catalogue_filter: self.show_in_catalogue_filter,
            show_in_card_title: self.show_in_card_title,
            position: self.position,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RubricFixture {
    pub name: String,
    pub slug: Slug,
    /// Slug of an earlier rubric.
    pub parent: Option<Slug>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub priority: i32,
    /// Attributes group names.
    #[serde(default)]
    pub attributes_groups: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompanyFixture {
    pub name: String,
    pub slug: Slug,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
    #[serde(default)]
    pub shops: Vec<ShopFixture>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShopFixture {
    pub name: String,
    pub slug: Slug,
    pub city: String,
    pub address: String,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductFixture {
    pub name: String,
    #[serde(default)]
    pub original_name: String,
    /// Generated from the name when absent.
    pub slug: Option<Slug>,
    /// Rubric slug.
    pub rubric: Slug,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Values keyed by attribute slug.
    #[serde(default)]
    pub attributes: BTreeMap<String, FixtureValue>,
    /// Offers keyed by shop slug.
    #[serde(default)]
    pub shops: BTreeMap<String, ShopProductInput>,
}

impl ProductFixture {
    /// The explicit slug, or one derived from the name.
    ///
    /// # Errors
    ///
    /// Returns a message if the name has nothing to build a slug from.
    pub fn resolved_slug(&self) -> Result<Slug, String> {
        match &self.slug {
            Some(slug) => Ok(slug.clone()),
            None => Slug::from_name(&self.name, '-')
                .map_err(|e| format!("product '{}': {e}", self.name)),
        }
    }
}

/// A raw attribute value as written in YAML.
///
/// The attribute's variant decides how it is read: option slugs for
/// select attributes, a number for numeric ones, anything else as text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FixtureValue {
    List(Vec<String>),
    Number(Decimal),
    Text(String),
}

/// An attribute value resolved against its attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue {
    /// Option slugs within the attribute's options group.
    Options(Vec<String>),
    Text(String),
    Number(Decimal),
}

impl FixtureValue {
    /// Read the value the way `variant` expects.
    ///
    /// # Errors
    ///
    /// Returns a message when the value cannot be read as that variant.
    pub fn resolve(&self, variant: AttributeVariant) -> Result<ResolvedValue, String> {
        match (variant, self) {
            (AttributeVariant::Select, Self::Text(slug)) => {
                Ok(ResolvedValue::Options(vec![slug.clone()]))
            }
            (AttributeVariant::Select, Self::List(slugs)) if slugs.len() == 1 => {
                Ok(ResolvedValue::Options(slugs.clone()))
            }
            (AttributeVariant::Select, _) => Err("expected exactly one option".to_owned()),
            (AttributeVariant::MultipleSelect, Self::Text(slug)) => {
                Ok(ResolvedValue::Options(vec![slug.clone()]))
            }
            (AttributeVariant::MultipleSelect, Self::List(slugs)) if !slugs.is_empty() => {
                Ok(ResolvedValue::Options(slugs.clone()))
            }
            (AttributeVariant::MultipleSelect, _) => {
                Err("expected one or more options".to_owned())
            }
            (AttributeVariant::Number, Self::Number(n)) => Ok(ResolvedValue::Number(*n)),
            (AttributeVariant::Number, Self::Text(s)) => Decimal::from_str(s.trim())
                .map(ResolvedValue::Number)
                .map_err(|_| format!("'{s}' is not a number")),
            (AttributeVariant::Number, Self::List(_)) => Err("expected a number".to_owned()),
            (AttributeVariant::Text, Self::Text(s)) => Ok(ResolvedValue::Text(s.clone())),
            (AttributeVariant::Text, Self::Number(n)) => Ok(ResolvedValue::Text(n.to_string())),
            (AttributeVariant::Text, Self::List(_)) => Err("expected text".to_owned()),
        }
    }
}

const fn default_true() -> bool {
    true
}

impl Fixture {
    /// Parse a fixture from YAML.
    ///
    /// # Errors
    ///
    /// Returns the YAML error for malformed input or unknown fields.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Check every name and slug reference in the fixture.
    ///
    /// Returns one message per problem; an empty list means the fixture
    /// can be seeded.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // options group name -> option slugs
        let mut options: HashMap<&str, HashSet<String>> = HashMap::new();
        for group in &self.options_groups {
            let mut slugs = HashSet::new();
            for option in &group.options {
                match option.resolved_slug() {
                    Ok(slug) => {
                        if !slugs.insert(slug.as_str().to_owned()) {
                            errors.push(format!(
                                "options group '{}': duplicate option slug '{slug}'",
                                group.name
                            ));
                        }
                    }
                    Err(e) => errors.push(format!("options group '{}': {e}", group.name)),
                }
            }
            if options.insert(group.name.as_str(), slugs).is_some() {
                errors.push(format!("duplicate options group '{}'", group.name));
            }
        }

        // attribute slug -> (attributes group name, attribute)
        let mut attributes: HashMap<&str, (&str, &AttributeFixture)> = HashMap::new();
        let mut groups = HashSet::new();
        for group in &self.attributes_groups {
            if !groups.insert(group.name.as_str()) {
                errors.push(format!("duplicate attributes group '{}'", group.name));
            }
            for attribute in &group.attributes {
                let slug = attribute.slug.as_str();
                if attributes
                    .insert(slug, (group.name.as_str(), attribute))
                    .is_some()
                {
                    errors.push(format!("duplicate attribute slug '{slug}'"));
                }
                if let Some(name) = &attribute.options_group
                    && !options.contains_key(name.as_str())
                {
                    errors.push(format!(
                        "attribute '{slug}': unknown options group '{name}'"
                    ));
                }
                // Any ID will do: validate only checks presence.
                let placeholder = attribute
                    .options_group
                    .as_ref()
                    .map(|_| OptionsGroupId::new(0));
                if let Err(e) = attribute.to_input(placeholder).validate() {
                    errors.push(format!("attribute '{slug}': {e}"));
                }
            }
        }

        // rubric slug -> attributes group names
        let mut rubrics: HashMap<&str, &[String]> = HashMap::new();
        for rubric in &self.rubrics {
            let slug = rubric.slug.as_str();
            if let Some(parent) = &rubric.parent
                && !rubrics.contains_key(parent.as_str())
            {
                errors.push(format!(
                    "rubric '{slug}': parent '{parent}' must be listed earlier"
                ));
            }
            for name in &rubric.attributes_groups {
                if !groups.contains(name.as_str()) {
                    errors.push(format!(
                        "rubric '{slug}': unknown attributes group '{name}'"
                    ));
                }
            }
            if rubrics
                .insert(slug, rubric.attributes_groups.as_slice())
                .is_some()
            {
                errors.push(format!("duplicate rubric slug '{slug}'"));
            }
        }

        let mut shops = HashSet::new();
        let mut companies = HashSet::new();
        for company in &self.companies {
            if !companies.insert(company.slug.as_str()) {
                errors.push(format!("duplicate company slug '{}'", company.slug));
            }
            for shop in &company.shops {
                if !shops.insert(shop.slug.as_str()) {
                    errors.push(format!("duplicate shop slug '{}'", shop.slug));
                }
            }
        }

        let mut products = HashSet::new();
        for product in &self.products {
            let slug = match product.resolved_slug() {
                Ok(slug) => slug,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let label = slug.as_str().to_owned();
            if !products.insert(label.clone()) {
                errors.push(format!("duplicate product slug '{label}'"));
            }

            let Some(rubric_groups) = rubrics.get(product.rubric.as_str()) else {
                errors.push(format!(
                    "product '{label}': unknown rubric '{}'",
                    product.rubric
                ));
                continue;
            };

            for (attribute_slug, raw) in &product.attributes {
                let Some((group, attribute)) = attributes.get(attribute_slug.as_str()) else {
                    errors.push(format!(
                        "product '{label}': unknown attribute '{attribute_slug}'"
                    ));
                    continue;
                };
                if !rubric_groups.iter().any(|name| name == group) {
                    errors.push(format!(
                        "product '{label}': attribute '{attribute_slug}' is not in rubric '{}'",
                        product.rubric
                    ));
                }
                match raw.resolve(attribute.variant) {
                    Ok(ResolvedValue::Options(slugs)) => {
                        let known = attribute
                            .options_group
                            .as_deref()
                            .and_then(|name| options.get(name));
                        for option in &slugs {
                            if !known.is_some_and(|known| known.contains(option)) {
                                errors.push(format!(
                                    "product '{label}': attribute '{attribute_slug}' has no option '{option}'"
                                ));
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        errors.push(format!("product '{label}': attribute '{attribute_slug}': {e}"));
                    }
                }
            }

            for shop in product.shops.keys() {
                if !shops.contains(shop.as_str()) {
                    errors.push(format!("product '{label}': unknown shop '{shop}'"));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_select_accepts_a_single_slug() {
        let value = FixtureValue::Text("red".to_owned());
        assert_eq!(
            value.resolve(AttributeVariant::Select).unwrap(),
            ResolvedValue::Options(vec!["red".to_owned()])
        );
    }

    #[test]
    fn test_select_rejects_several_options() {
        let value = FixtureValue::List(vec!["red".to_owned(), "white".to_owned()]);
        assert!(value.resolve(AttributeVariant::Select).is_err());
        assert!(value.resolve(AttributeVariant::MultipleSelect).is_ok());
    }

    #[test]
    fn test_number_from_text() {
        let value = FixtureValue::Text(" 13.5 ".to_owned());
        assert_eq!(
            value.resolve(AttributeVariant::Number).unwrap(),
            ResolvedValue::Number(Decimal::new(135, 1))
        );
        let value = FixtureValue::Text("dry".to_owned());
        assert!(value.resolve(AttributeVariant::Number).is_err());
    }

    #[test]
    fn test_text_from_number() {
        let value = FixtureValue::Number(Decimal::new(2015, 0));
        assert_eq!(
            value.resolve(AttributeVariant::Text).unwrap(),
            ResolvedValue::Text("2015".to_owned())
        );
    }

    #[test]
    fn test_empty_fixture_is_valid() {
        assert!(Fixture::default().validate().is_empty());
    }
}
