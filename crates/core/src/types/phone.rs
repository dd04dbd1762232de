//! Phone number type.
//!
//! Phones arrive from checkout forms in every imaginable format
//! (`8 (999) 123-45-67`, `+7 999 1234567`, `79991234567`). They are stored
//! and compared in one normalised E.164-like form so that a returning guest
//! is matched to the account created for their first order.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone cannot be empty")]
    Empty,
    /// The input contains characters other than digits and separators.
    #[error("phone contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// Wrong number of digits.
    #[error("phone must have between {min} and {max} digits")]
    InvalidLength {
        /// Minimum allowed digits.
        min: usize,
        /// Maximum allowed digits.
        max: usize,
    },
}

/// A normalised phone number: `+` followed by 10 to 15 digits.
///
/// ## Examples
///
/// ```
/// use agora_core::Phone;
///
/// assert_eq!(Phone::parse("8 (999) 123-45-67").unwrap().as_str(), "+79991234567");
/// assert_eq!(Phone::parse("+44 20 7946 0958").unwrap().as_str(), "+442079460958");
/// assert!(Phone::parse("12-34").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Minimum number of digits.
    pub const MIN_DIGITS: usize = 10;
    /// Maximum number of digits (E.164).
    pub const MAX_DIGITS: usize = 15;

    /// Parse and normalise a phone number.
    ///
    /// Spaces, dashes, dots and parentheses are ignored. A leading `+` is
    /// optional. A national 11-digit number starting with `8` is rewritten
    /// to the `+7` country code.
    ///
    /// # Errors
    ///
    /// Returns a [`PhoneError`] if the input is empty, contains other
    /// characters, or has the wrong number of digits.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        let mut digits = String::with_capacity(s.len());
        for (i, c) in s.chars().enumerate() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '(' | ')' | '.' => {}
                '+' if i == 0 => {}
                other => return Err(PhoneError::InvalidCharacter(other)),
            }
        }

        if digits.len() == 11 && digits.starts_with('8') {
            digits.replace_range(0..1, "7");
        }

        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len()) {
            return Err(PhoneError::InvalidLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(format!("+{digits}")))
    }

    /// Returns the normalised phone as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the digits without the leading `+`, as SMS gateways expect.
    #[must_use]
    pub fn digits(&self) -> &str {
        self.0.trim_start_matches('+')
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Phone {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Phone {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Phone {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Phone {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Phone {
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
    fn test_national_prefix_is_rewritten() {
        let phone = Phone::parse("8 (999) 123-45-67").unwrap();
        assert_eq!(phone.as_str(), "+79991234567");
        assert_eq!(phone.digits(), "79991234567");
    }

    #[test]
    fn test_equivalent_formats_normalise_equal() {
        let a = Phone::parse("+7 999 123 45 67").unwrap();
        let b = Phone::parse("79991234567").unwrap();
        let c = Phone::parse("89991234567").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_rejects_letters_and_inner_plus() {
        assert_eq!(
            Phone::parse("+7 999 CALL ME"),
            Err(PhoneError::InvalidCharacter('C'))
        );
        assert_eq!(
            Phone::parse("7+9991234567"),
            Err(PhoneError::InvalidCharacter('+'))
        );
    }

    #[test]
    fn test_length_bounds() {
        assert!(matches!(
            Phone::parse("123456789"),
            Err(PhoneError::InvalidLength { .. })
        ));
        assert!(matches!(
            Phone::parse("1234567890123456"),
            Err(PhoneError::InvalidLength { .. })
        ));
        assert!(Phone::parse("1234567890").is_ok());
        assert_eq!(Phone::parse(""), Err(PhoneError::Empty));
    }
}
