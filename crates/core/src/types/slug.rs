//! URL slug type.
//!
//! Rubrics, products, shops and options are addressed in URLs by slug.
//! Attribute slugs double as catalogue filter keys, and the filter segment
//! separator is `-`, so those use the stricter [`Slug::key`] form.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// The input string is empty.
    #[error("slug cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside the allowed set.
    #[error("slug contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// The input starts or ends with a separator.
    #[error("slug cannot start or end with a separator")]
    EdgeSeparator,
}

/// A lowercase URL slug made of `a-z`, `0-9`, `-` and `_`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Maximum slug length.
    pub const MAX_LENGTH: usize = 120;

    /// Parse a slug.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] if the input is empty, too long, contains
    /// characters other than `a-z0-9-_`, or starts/ends with a separator.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        Self::validate(s, &['-', '_'])
    }

    /// Parse a key slug, which additionally forbids `-`.
    ///
    /// # Errors
    ///
    /// Same as [`Slug::parse`], with `-` reported as an invalid character.
    pub fn key(s: &str) -> Result<Self, SlugError> {
        Self::validate(s, &['_'])
    }

    /// Build a slug from a display name.
    ///
    /// ASCII letters and digits are kept (lowercased); every other run of
    /// characters collapses into a single `separator`.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if the name has no ASCII alphanumerics.
    pub fn from_name(name: &str, separator: char) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        let mut pending_separator = false;
        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_separator && !out.is_empty() {
                    out.push(separator);
                }
                pending_separator = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_separator = true;
            }
        }
        out.truncate(Self::MAX_LENGTH);
        let out = out.trim_end_matches(separator);
        if out.is_empty() {
            return Err(SlugError::Empty);
        }
        Ok(Self(out.to_owned()))
    }

    fn validate(s: &str, separators: &[char]) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || separators.contains(c)))
        {
            return Err(SlugError::InvalidCharacter(c));
        }
        if s.starts_with(separators) || s.ends_with(separators) {
            return Err(SlugError::EdgeSeparator);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this slug is usable as a filter key (contains no `-`).
    #[must_use]
    pub fn is_key(&self) -> bool {
        !self.0.contains('-')
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Slug {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Slug {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Slug {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_separators_inside() {
        assert_eq!(Slug::parse("red-wine_2020").unwrap().as_str(), "red-wine_2020");
    }

    #[test]
    fn test_parse_rejects_uppercase_and_edges() {
        assert_eq!(Slug::parse("Wine"), Err(SlugError::InvalidCharacter('W')));
        assert_eq!(Slug::parse("-wine"), Err(SlugError::EdgeSeparator));
        assert_eq!(Slug::parse("wine_"), Err(SlugError::EdgeSeparator));
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
    }

    #[test]
    fn test_key_forbids_dash() {
        assert!(Slug::key("wine_color").is_ok());
        assert_eq!(Slug::key("wine-color"), Err(SlugError::InvalidCharacter('-')));
        assert!(!Slug::parse("wine-color").unwrap().is_key());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            Slug::from_name("  Château Margaux 2015! ", '-').unwrap().as_str(),
            "ch-teau-margaux-2015"
        );
        assert_eq!(
            Slug::from_name("Country of Origin", '_').unwrap().as_str(),
            "country_of_origin"
        );
        assert_eq!(Slug::from_name("!!!", '-'), Err(SlugError::Empty));
    }
}
