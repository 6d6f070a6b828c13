//! Numeric and text conversions used by generated accessors
//!
//! Every protobuf number passes through [`Numeric`], which holds any integer
//! exactly (`i128`) or any float (`f64`). Reads widen without failing;
//! writes narrow with a range check and leave the target untouched on error.

use std::fmt;
use tracing::trace;

use super::error::{ConversionError, ConversionResult};

/// Lossless intermediate for protobuf numbers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i128),
    Float(f64),
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A Rust type `prost` uses for a numeric protobuf field
pub trait ProtoNumber: Copy + fmt::Display {
    /// Rust type name used in error messages
    const TYPE_NAME: &'static str;

    fn to_numeric(self) -> Numeric;

    /// Exact conversion; `None` when out of range or not integral
    fn from_numeric(value: Numeric) -> Option<Self>;

    /// Bit-level conversion used on reads that cannot fail
    fn wrapping_from(value: Numeric) -> Self;

    /// Inclusive bounds, for error messages
    fn bounds() -> (String, String);
}

macro_rules! proto_int {
    ($($ty:ty),*) => {$(
        impl ProtoNumber for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            fn to_numeric(self) -> Numeric {
                Numeric::Int(self as i128)
            }

            fn from_numeric(value: Numeric) -> Option<Self> {
                match value {
                    Numeric::Int(v) => <$ty>::try_from(v).ok(),
                    Numeric::Float(v) if v.is_finite() && v.fract() == 0.0 => <$ty>::try_from(v as i128).ok(),
                    Numeric::Float(_) => None,
                }
            }

            fn wrapping_from(value: Numeric) -> Self {
                match value {
                    Numeric::Int(v) => v as $ty,
                    Numeric::Float(v) => v as $ty,
                }
            }

            fn bounds() -> (String, String) {
                (<$ty>::MIN.to_string(), <$ty>::MAX.to_string())
            }
        }
    )*};
}

proto_int!(i32, i64, u32, u64);

impl ProtoNumber for f32 {
    const TYPE_NAME: &'static str = "f32";

    fn to_numeric(self) -> Numeric {
        Numeric::Float(self as f64)
    }

    /// Only the magnitude is checked; in-range values round to the nearest
    /// `f32`.
    fn from_numeric(value: Numeric) -> Option<Self> {
        let v = match value {
            Numeric::Int(v) => v as f64,
            Numeric::Float(v) => v,
        };
        if v.is_finite() && v.abs() > f32::MAX as f64 {
            return None;
        }
        let rounded = v as f32;
        if v.is_finite() && rounded as f64 != v {
            trace!(value = v, stored = rounded, "Rounded to f32");
        }
        Some(rounded)
    }

    fn wrapping_from(value: Numeric) -> Self {
        match value {
            Numeric::Int(v) => v as f32,
            Numeric::Float(v) => v as f32,
        }
    }

    fn bounds() -> (String, String) {
        (f32::MIN.to_string(), f32::MAX.to_string())
    }
}

impl ProtoNumber for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn to_numeric(self) -> Numeric {
        Numeric::Float(self)
    }

    fn from_numeric(value: Numeric) -> Option<Self> {
        match value {
            Numeric::Int(v) => Some(v as f64),
            Numeric::Float(v) => Some(v),
        }
    }

    fn wrapping_from(value: Numeric) -> Self {
        match value {
            Numeric::Int(v) => v as f64,
            Numeric::Float(v) => v,
        }
    }

    fn bounds() -> (String, String) {
        (f64::MIN.to_string(), f64::MAX.to_string())
    }
}

// =============================================================================
// Reads
// =============================================================================

/// Convert a version value into the unified type.
///
/// Unsigned inputs keep their unsigned value (`0xFFFF_FFFF_u32` widens to
/// `4294967295`). A `u64` above `i64::MAX` read as `i64` keeps its bit
/// pattern.
pub fn widen<F: ProtoNumber, T: ProtoNumber>(value: F) -> T {
    let numeric = value.to_numeric();
    T::from_numeric(numeric).unwrap_or_else(|| T::wrapping_from(numeric))
}

/// Text view of a bytes field; invalid UTF-8 sequences are replaced
pub fn text_from_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Bytes view of a text field
pub fn bytes_from_text(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

// =============================================================================
// Writes
// =============================================================================

/// Convert a unified value into a version's type, failing when it does not
/// fit
pub fn narrow<F: ProtoNumber, T: ProtoNumber>(value: F, field: &str, version: &str) -> ConversionResult<T> {
    T::from_numeric(value.to_numeric()).ok_or_else(|| out_of_range::<T>(value.to_numeric(), field, version))
}

/// Range error for a value that does not fit `T`
pub fn out_of_range<T: ProtoNumber>(value: Numeric, field: &str, version: &str) -> ConversionError {
    let (min, max) = T::bounds();
    ConversionError::ValueOutOfRange {
        field: field.to_string(),
        value: value.to_string(),
        target: T::TYPE_NAME.to_string(),
        min,
        max,
        version: version.to_string(),
    }
}

/// Text stored into a bytes-typed version
pub fn encode_text(text: &str) -> Vec<u8> {
    bytes_from_text(text)
}

/// Bytes stored into a text-typed version; rejects invalid UTF-8
pub fn decode_text(bytes: &[u8], field: &str, version: &str) -> ConversionResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ConversionError::mismatch(field, version, format!("bytes are not valid UTF-8: {}", e)))
}
