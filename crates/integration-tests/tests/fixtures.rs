//! Integration tests for YAML catalogue fixtures.
//!
//! These parse the shipped demo fixture and hand-written broken ones, and
//! check that validation catches bad references before anything would be
//! written to the database.

#![allow(clippy::unwrap_used)]

use agora_cli::fixture::{Fixture, FixtureValue, ResolvedValue};
use agora_core::{AttributeVariant, Money};
use rust_decimal::Decimal;

const DEMO: &str = include_str!("../../../fixtures/demo.yaml");

fn errors(yaml: &str) -> Vec<String> {
    Fixture::from_yaml(yaml).unwrap().validate()
}

// =============================================================================
// Demo fixture
// =============================================================================

#[test]
fn test_demo_fixture_is_valid() {
    let fixture = Fixture::from_yaml(DEMO).unwrap();
    assert_eq!(fixture.validate(), Vec::<String>::new());
}

#[test]
fn test_demo_fixture_contents() {
    let fixture = Fixture::from_yaml(DEMO).unwrap();
    assert_eq!(fixture.options_groups.len(), 2);
    assert_eq!(fixture.attributes_groups[0].attributes.len(), 5);
    assert_eq!(fixture.rubrics.len(), 2);
    assert_eq!(fixture.companies[0].shops.len(), 2);
    assert_eq!(fixture.products.len(), 3);

    let merlot = &fixture.products[0];
    let offer = &merlot.shops["vineyard-central"];
    assert_eq!(offer.price, Money::new(Decimal::new(1250, 2)).unwrap());
    assert_eq!(offer.old_price, Some(Money::new(Decimal::new(1500, 2)).unwrap()));
    assert_eq!(offer.available, 10);
}

#[test]
fn test_demo_attribute_values_resolve() {
    let fixture = Fixture::from_yaml(DEMO).unwrap();
    let merlot = &fixture.products[0];

    assert_eq!(
        merlot.attributes["colour"].resolve(AttributeVariant::Select).unwrap(),
        ResolvedValue::Options(vec!["red".to_owned()])
    );
    assert_eq!(
        merlot.attributes["vintage"].resolve(AttributeVariant::Number).unwrap(),
        ResolvedValue::Number(Decimal::new(2015, 0))
    );
    assert_eq!(
        merlot.attributes["strength"].resolve(AttributeVariant::Number).unwrap(),
        ResolvedValue::Number(Decimal::new(135, 1))
    );
    assert_eq!(
        merlot.attributes["region"],
        FixtureValue::Text("Bordeaux".to_owned())
    );
}

#[test]
fn test_missing_product_slug_comes_from_name() {
    let fixture = Fixture::from_yaml(DEMO).unwrap();
    let blend = &fixture.products[1];
    assert!(blend.slug.is_none());
    assert_eq!(blend.resolved_slug().unwrap().as_str(), "cabernet-blend-2018");
}

// =============================================================================
// Broken fixtures
// =============================================================================

#[test]
fn test_unknown_fields_are_rejected() {
    let yaml = "rubrics:\n  - { name: Wine, slug: wine, colour: red }\n";
    assert!(Fixture::from_yaml(yaml).is_err());
}

#[test]
fn test_invalid_slug_is_rejected_while_parsing() {
    let yaml = "rubrics:\n  - { name: Wine, slug: Red Wine }\n";
    assert!(Fixture::from_yaml(yaml).is_err());
}

#[test]
fn test_parent_must_come_first() {
    let yaml = r"
rubrics:
  - { name: Red wine, slug: red-wine, parent: wine }
  - { name: Wine, slug: wine }
";
    let errors = errors(yaml);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("must be listed earlier"));
}

#[test]
fn test_select_attribute_needs_known_options_group() {
    let yaml = r"
attributes_groups:
  - name: Wine
    attributes:
      - { name: Colour, slug: colour, variant: select, options_group: Colours }
      - { name: Body, slug: body, variant: select }
";
    let errors = errors(yaml);
    assert!(errors.iter().any(|e| e.contains("unknown options group 'Colours'")));
    assert!(errors.iter().any(|e| e.starts_with("attribute 'body'")));
}

#[test]
fn test_reserved_attribute_slug() {
    let yaml = r"
attributes_groups:
  - name: Wine
    attributes:
      - { name: Price, slug: price, variant: number }
";
    let errors = errors(yaml);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("price"));
}

#[test]
fn test_product_references_are_checked() {
    let yaml = r"
options_groups:
  - name: Colours
    options:
      - { name: Red, slug: red }
attributes_groups:
  - name: Wine
    attributes:
      - { name: Colour, slug: colour, variant: select, options_group: Colours }
  - name: Beer
    attributes:
      - { name: Bitterness, slug: ibu, variant: number }
rubrics:
  - { name: Wine, slug: wine, attributes_groups: [Wine] }
products:
  - name: Mystery
    slug: mystery
    rubric: spirits
  - name: Odd wine
    slug: odd-wine
    rubric: wine
    attributes:
      colour: blue
      ibu: 40
      sweetness: dry
    shops:
      nowhere: { price: '1.00', available: 1 }
";
    let errors = errors(yaml);
    let expect = [
        "product 'mystery': unknown rubric 'spirits'",
        "product 'odd-wine': attribute 'colour' has no option 'blue'",
        "product 'odd-wine': attribute 'ibu' is not in rubric 'wine'",
        "product 'odd-wine': unknown attribute 'sweetness'",
        "product 'odd-wine': unknown shop 'nowhere'",
    ];
    for message in expect {
        assert!(
            errors.iter().any(|e| e == message),
            "missing '{message}' in {errors:?}"
        );
    }
    assert_eq!(errors.len(), expect.len());
}

#[test]
fn test_duplicate_slugs() {
    let yaml = r"
companies:
  - name: A
    slug: acme
    shops:
      - { name: One, slug: main, city: X, address: Y }
  - name: B
    slug: acme
    shops:
      - { name: Two, slug: main, city: X, address: Y }
";
    let errors = errors(yaml);
    assert!(errors.contains(&"duplicate company slug 'acme'".to_owned()));
    assert!(errors.contains(&"duplicate shop slug 'main'".to_owned()));
}
