//! Enum support for generated code
//!
//! A unified enum lists every member of every version. Reads never fail:
//! a number with no member comes back as [`EnumValue::Unrecognized`] and
//! keeps its raw value. Writes into a version check that the member exists
//! there.

use std::fmt;

use super::error::{ConversionError, ConversionResult};

/// A generated unified enum
pub trait ProtoEnum: Copy + Sized + 'static {
    /// Enum name used in error messages
    const NAME: &'static str;

    fn number(self) -> i32;

    fn from_number(number: i32) -> Option<Self>;

    /// Whether this member is declared in `version`
    fn supported_in(self, version: &str) -> bool;
}

/// Result of reading an enum-typed accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumValue<E> {
    Known(E),
    /// Raw number with no member in the unified enum
    Unrecognized(i64),
}

impl<E: ProtoEnum> EnumValue<E> {
    /// Resolve a raw number (from an enum- or integer-typed version)
    pub fn from_raw(number: i64) -> Self {
        i32::try_from(number)
            .ok()
            .and_then(E::from_number)
            .map(Self::Known)
            .unwrap_or(Self::Unrecognized(number))
    }

    pub fn number(self) -> i64 {
        match self {
            Self::Known(e) => e.number() as i64,
            Self::Unrecognized(n) => n,
        }
    }

    pub fn known(self) -> Option<E> {
        match self {
            Self::Known(e) => Some(e),
            Self::Unrecognized(_) => None,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for EnumValue<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(e) => write!(f, "{:?}", e),
            Self::Unrecognized(n) => write!(f, "<unrecognized {}>", n),
        }
    }
}

/// Number to store for `value` in an enum-typed version
pub fn member_for_version<E: ProtoEnum>(value: E, field: &str, version: &str) -> ConversionResult<i32> {
    if value.supported_in(version) {
        Ok(value.number())
    } else {
        Err(ConversionError::enum_not_supported(field, E::NAME, value.number() as i64, version))
    }
}

/// Number to store for a unified integer in an enum-typed version; the
/// number must name a member declared in that version
pub fn number_for_version<E: ProtoEnum>(number: i64, field: &str, version: &str) -> ConversionResult<i32> {
    match EnumValue::<E>::from_raw(number) {
        EnumValue::Known(e) => member_for_version(e, field, version),
        EnumValue::Unrecognized(n) => Err(ConversionError::enum_not_supported(field, E::NAME, n, version)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::error::ErrorCode;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Unit {
        Celsius,
        Fahrenheit,
        Kelvin,
    }

    impl ProtoEnum for Unit {
        const NAME: &'static str = "Unit";

        fn number(self) -> i32 {
            match self {
                Self::Celsius => 0,
                Self::Fahrenheit => 1,
                Self::Kelvin => 2,
            }
        }

        fn from_number(number: i32) -> Option<Self> {
            match number {
                0 => Some(Self::Celsius),
                1 => Some(Self::Fahrenheit),
                2 => Some(Self::Kelvin),
                _ => None,
            }
        }

        fn supported_in(self, version: &str) -> bool {
            match self {
                Self::Kelvin => version == "v2",
                _ => true,
            }
        }
    }

    #[test]
    fn test_from_raw() {
        assert_eq!(EnumValue::<Unit>::from_raw(1), EnumValue::Known(Unit::Fahrenheit));
        assert_eq!(EnumValue::<Unit>::from_raw(7), EnumValue::Unrecognized(7));
        assert_eq!(EnumValue::<Unit>::from_raw(1 << 40).number(), 1 << 40);
    }

    #[test]
    fn test_member_for_version() {
        assert_eq!(member_for_version(Unit::Kelvin, "unit", "v2").unwrap(), 2);
        let err = member_for_version(Unit::Kelvin, "unit", "v1").unwrap_err();
        assert_eq!(err.code(), ErrorCode::EnumValueNotSupported);
    }

    #[test]
    fn test_number_for_version_rejects_unknown() {
        assert_eq!(number_for_version::<Unit>(0, "unit", "v1").unwrap(), 0);
        assert!(number_for_version::<Unit>(9, "unit", "v1").is_err());
    }
}
