//! URL filter segments.
//!
//! A catalogue URL looks like
//! `/catalogue/wine/colour-red/colour-white/price-10_50/sort_by-price/page-2`.
//! Every segment after the rubric is `key-value`, split at the first `-`.
//! Reserved keys control price, sorting, paging and shop; every other key is
//! an attribute slug whose value is an option slug.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use agora_core::{Money, Slug};

/// Errors produced while parsing filter segments.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("filter segment '{0}' must look like key-value")]
    MissingSeparator(String),

    #[error("filter segment '{0}' has an empty key or value")]
    Empty(String),

    #[error("'{0}' is not a valid filter key")]
    InvalidKey(String),

    #[error("'{value}' is not a valid value for '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("'{0}' may only appear once")]
    Duplicate(String),

    #[error("minimum price is greater than maximum price")]
    InvertedPrice,
}

/// Catalogue sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Price,
    #[default]
    Views,
    Created,
    Name,
}

impl SortBy {
    /// Direction used when the URL does not name one.
    #[must_use]
    pub const fn default_dir(self) -> SortDir {
        match self {
            Self::Price | Self::Name => SortDir::Asc,
            Self::Views | Self::Created => SortDir::Desc,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Views => "views",
            Self::Created => "created",
            Self::Name => "name",
        }
    }
}

impl FromStr for SortBy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(Self::Price),
            "views" => Ok(Self::Views),
            "created" => Ok(Self::Created),
            "name" => Ok(Self::Name),
            _ => Err(()),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// SQL keyword.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDir {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(()),
        }
    }
}

/// Price bounds; either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PriceRange {
    pub min: Option<Money>,
    pub max: Option<Money>,
}

impl PriceRange {
    fn parse(value: &str) -> Result<Self, FilterError> {
        let invalid = || FilterError::InvalidValue {
            key: PRICE.to_owned(),
            value: value.to_owned(),
        };
        let (min, max) = value.split_once('_').ok_or_else(invalid)?;
        let bound = |s: &str| -> Result<Option<Money>, FilterError> {
            if s.is_empty() {
                Ok(None)
            } else {
                Money::parse(s).map(Some).map_err(|_| invalid())
            }
        };
        let range = Self {
            min: bound(min)?,
            max: bound(max)?,
        };
        if let (Some(min), Some(max)) = (range.min, range.max)
            && min > max
        {
            return Err(FilterError::InvertedPrice);
        }
        Ok(range)
    }

    /// Whether neither side is bounded.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(min) = self.min {
            write!(f, "{min}")?;
        }
        f.write_str("_")?;
        if let Some(max) = self.max {
            write!(f, "{max}")?;
        }
        Ok(())
    }
}

const PRICE: &str = "price";
const SORT_BY: &str = "sort_by";
const SORT_DIR: &str = "sort_dir";
const PAGE: &str = "page";
const SHOP: &str = "shop";

/// Filter keys that can never be attribute slugs.
pub const RESERVED_KEYS: [&str; 5] = [PRICE, SORT_BY, SORT_DIR, PAGE, SHOP];

/// A parsed, normalised set of catalogue filters.
///
/// Defaults are not stored: page 1, `views` sorting and a sort field's own
/// default direction all parse to `None`, so equal filters always render to
/// the same canonical path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSet {
    attributes: BTreeMap<String, BTreeSet<String>>,
    price: Option<PriceRange>,
    sort_by: Option<SortBy>,
    sort_dir: Option<SortDir>,
    page: Option<u32>,
    shop: Option<String>,
}

impl FilterSet {
    /// Parse path segments. Empty segments (from `//` or a trailing `/`)
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`FilterError`] for the first malformed segment.
    pub fn parse<'s, I>(segments: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = &'s str>,
    {
        let mut set = Self::default();
        let mut sort_by: Option<SortBy> = None;
        let mut sort_dir: Option<SortDir> = None;

        for segment in segments.into_iter().filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('-')
                .ok_or_else(|| FilterError::MissingSeparator(segment.to_owned()))?;
            if key.is_empty() || value.is_empty() {
                return Err(FilterError::Empty(segment.to_owned()));
            }
            let invalid = || FilterError::InvalidValue {
                key: key.to_owned(),
                value: value.to_owned(),
            };

            match key {
                PRICE => set_once(&mut set.price, PriceRange::parse(value)?, key)?,
                SORT_BY => set_once(&mut sort_by, value.parse().map_err(|()| invalid())?, key)?,
                SORT_DIR => set_once(&mut sort_dir, value.parse().map_err(|()| invalid())?, key)?,
                PAGE => {
                    let page = value
                        .parse::<u32>()
                        .ok()
                        .filter(|p| *p >= 1)
                        .ok_or_else(invalid)?;
                    set_once(&mut set.page, page, key)?;
                }
                SHOP => {
                    let shop = Slug::parse(value).map_err(|_| invalid())?;
                    set_once(&mut set.shop, shop.as_str().to_owned(), key)?;
                }
                _ => {
                    Slug::key(key).map_err(|_| FilterError::InvalidKey(key.to_owned()))?;
                    Slug::parse(value).map_err(|_| invalid())?;
                    set.attributes
                        .entry(key.to_owned())
                        .or_default()
                        .insert(value.to_owned());
                }
            }
        }

        set.set_sort(sort_by, sort_dir);
        if set.page == Some(1) {
            set.page = None;
        }
        if set.price.is_some_and(|p| p.is_open()) {
            set.price = None;
        }
        Ok(set)
    }

    /// Parse the `{*filters}` tail of a catalogue path.
    ///
    /// # Errors
    ///
    /// See [`FilterSet::parse`].
    pub fn parse_path(path: &str) -> Result<Self, FilterError> {
        Self::parse(path.split('/'))
    }

    fn set_sort(&mut self, sort_by: Option<SortBy>, sort_dir: Option<SortDir>) {
        let effective = sort_by.unwrap_or_default();
        self.sort_by = sort_by.filter(|s| *s != SortBy::default());
        self.sort_dir = sort_dir.filter(|d| *d != effective.default_dir());
    }

    /// Selected option slugs per attribute slug.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.attributes
    }

    /// Whether an option of an attribute is selected.
    #[must_use]
    pub fn is_selected(&self, attribute: &str, option: &str) -> bool {
        self.attributes
            .get(attribute)
            .is_some_and(|options| options.contains(option))
    }

    /// Price bounds, if any.
    #[must_use]
    pub const fn price(&self) -> Option<PriceRange> {
        self.price
    }

    /// Effective sort field.
    #[must_use]
    pub fn sort_by(&self) -> SortBy {
        self.sort_by.unwrap_or_default()
    }

    /// Effective sort direction.
    #[must_use]
    pub fn sort_dir(&self) -> SortDir {
        self.sort_dir.unwrap_or_else(|| self.sort_by().default_dir())
    }

    /// Requested page, 1-based.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    /// Shop slug restriction, if any.
    #[must_use]
    pub fn shop(&self) -> Option<&str> {
        self.shop.as_deref()
    }

    /// Whether no filter of any kind is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The same filters with one option switched on or off and the page
    /// reset to 1.
    #[must_use]
    pub fn toggled(&self, attribute: &str, option: &str) -> Self {
        let mut next = self.clone();
        next.page = None;
        let options = next.attributes.entry(attribute.to_owned()).or_default();
        if !options.remove(option) {
            options.insert(option.to_owned());
        }
        if options.is_empty() {
            next.attributes.remove(attribute);
        }
        next
    }

    /// The same filters on another page.
    #[must_use]
    pub fn with_page(&self, page: u32) -> Self {
        let mut next = self.clone();
        next.page = Some(page).filter(|p| *p > 1);
        next
    }

    /// The same filters without the price bounds.
    #[must_use]
    pub fn without_price(&self) -> Self {
        let mut next = self.clone();
        next.price = None;
        next.page = None;
        next
    }

    /// Remove an attribute entirely, or one of its options.
    pub(crate) fn drop_attribute(&mut self, attribute: &str, option: Option<&str>) {
        match option {
            None => {
                self.attributes.remove(attribute);
            }
            Some(option) => {
                if let Some(options) = self.attributes.get_mut(attribute) {
                    options.remove(option);
                    if options.is_empty() {
                        self.attributes.remove(attribute);
                    }
                }
            }
        }
    }

    pub(crate) fn drop_shop(&mut self) {
        self.shop = None;
    }

    /// Canonical segments: attributes by key then option, followed by
    /// price, shop, sort field, sort direction and page.
    #[must_use]
    pub fn to_segments(&self) -> Vec<String> {
        let mut segments: Vec<String> = self
            .attributes
            .iter()
            .flat_map(|(key, options)| options.iter().map(move |option| format!("{key}-{option}")))
            .collect();
        if let Some(price) = self.price {
            segments.push(format!("{PRICE}-{price}"));
        }
        if let Some(shop) = &self.shop {
            segments.push(format!("{SHOP}-{shop}"));
        }
        if let Some(sort_by) = self.sort_by {
            segments.push(format!("{SORT_BY}-{}", sort_by.as_str()));
        }
        if let Some(sort_dir) = self.sort_dir {
            segments.push(format!("{SORT_DIR}-{}", sort_dir.as_str()));
        }
        if let Some(page) = self.page {
            segments.push(format!("{PAGE}-{page}"));
        }
        segments
    }

    /// Canonical catalogue path for a rubric.
    #[must_use]
    pub fn path(&self, rubric_slug: &str) -> String {
        let mut path = format!("/catalogue/{rubric_slug}");
        for segment in self.to_segments() {
            path.push('/');
            path.push_str(&segment);
        }
        path
    }
}

fn set_once<T: PartialEq>(slot: &mut Option<T>, value: T, key: &str) -> Result<(), FilterError> {
    match slot {
        Some(existing) if *existing != value => Err(FilterError::Duplicate(key.to_owned())),
        _ => {
            *slot = Some(value);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(path: &str) -> Result<FilterSet, FilterError> {
        FilterSet::parse_path(path)
    }

    #[test]
    fn test_values_group_by_attribute() {
        let set = parse("colour-red/country-france/colour-white").unwrap();
        assert_eq!(set.attributes().len(), 2);
        assert!(set.is_selected("colour", "red"));
        assert!(set.is_selected("colour", "white"));
        assert!(set.is_selected("country", "france"));
    }

    #[test]
    fn test_value_may_contain_dashes() {
        let set = parse("region-cote-de-nuits").unwrap();
        assert!(set.is_selected("region", "cote-de-nuits"));
    }

    #[test]
    fn test_duplicates_collapse() {
        let set = parse("colour-red/colour-red/page-2/page-2").unwrap();
        assert_eq!(set.to_segments(), vec!["colour-red", "page-2"]);
    }

    #[test]
    fn test_conflicting_reserved_keys_rejected() {
        assert_eq!(
            parse("page-2/page-3"),
            Err(FilterError::Duplicate("page".to_owned()))
        );
        assert_eq!(
            parse("sort_by-price/sort_by-name"),
            Err(FilterError::Duplicate("sort_by".to_owned()))
        );
    }

    #[test]
    fn test_malformed_segments() {
        assert_eq!(
            parse("colour"),
            Err(FilterError::MissingSeparator("colour".to_owned()))
        );
        assert_eq!(parse("colour-"), Err(FilterError::Empty("colour-".to_owned())));
        assert_eq!(parse("-red"), Err(FilterError::Empty("-red".to_owned())));
        assert_eq!(
            parse("Colour-red"),
            Err(FilterError::InvalidKey("Colour".to_owned()))
        );
        assert!(matches!(parse("colour-Red"), Err(FilterError::InvalidValue { .. })));
        assert!(matches!(parse("page-0"), Err(FilterError::InvalidValue { .. })));
        assert!(matches!(parse("sort_by-rating"), Err(FilterError::InvalidValue { .. })));
    }

    #[test]
    fn test_price_bounds() {
        let set = parse("price-10_").unwrap();
        let price = set.price().unwrap();
        assert_eq!(price.min, Some(Money::from_minor(1000)));
        assert_eq!(price.max, None);
        assert_eq!(set.to_segments(), vec!["price-10.00_"]);

        let set = parse("price-_99.5").unwrap();
        assert_eq!(set.to_segments(), vec!["price-_99.50"]);

        assert_eq!(parse("price-50_10"), Err(FilterError::InvertedPrice));
        assert!(parse("price-10").is_err());
        assert!(parse("price-_").unwrap().price().is_none());
    }

    #[test]
    fn test_defaults_are_not_rendered() {
        let set = parse("sort_by-views/sort_dir-desc/page-1").unwrap();
        assert!(set.is_empty());
        assert_eq!(set.sort_by(), SortBy::Views);
        assert_eq!(set.sort_dir(), SortDir::Desc);
        assert_eq!(set.page(), 1);

        let set = parse("sort_by-price/sort_dir-asc").unwrap();
        assert_eq!(set.to_segments(), vec!["sort_by-price"]);
        let set = parse("sort_by-price/sort_dir-desc").unwrap();
        assert_eq!(set.to_segments(), vec!["sort_by-price", "sort_dir-desc"]);
    }

    #[test]
    fn test_canonical_order() {
        let set = parse("page-3/sort_by-name/shop-central/price-1_2/country-italy/colour-red")
            .unwrap();
        assert_eq!(
            set.path("wine"),
            "/catalogue/wine/colour-red/country-italy/price-1.00_2.00/shop-central/sort_by-name/page-3"
        );
        assert_eq!(parse(&set.to_segments().join("/")).unwrap(), set);
    }

    #[test]
    fn test_toggle_adds_and_removes_and_resets_page() {
        let set = parse("colour-red/page-4").unwrap();
        let added = set.toggled("colour", "white");
        assert_eq!(added.to_segments(), vec!["colour-red", "colour-white"]);

        let removed = set.toggled("colour", "red");
        assert!(removed.attributes().is_empty());
        assert_eq!(removed.page(), 1);
    }

    #[test]
    fn test_trailing_slash_ignored() {
        let set = parse("colour-red/").unwrap();
        assert_eq!(set.to_segments(), vec!["colour-red"]);
        assert!(parse("").unwrap().is_empty());
    }
}
