//! Conflict classification
//!
//! Pure functions from the set of per-version representations of one field to
//! its [`ConflictType`] and [`UnifiedType`]. Pairs are compared in version
//! order (earlier, later) so that widening and narrowing can be told apart;
//! the worst pairwise result wins.

use crate::merged::{Cardinality, ConflictType, Repr, UnifiedType};
use crate::schema::{NumericClass, ScalarType};

/// One present version's shape of a field
#[derive(Debug, Clone, PartialEq)]
pub struct Observed<'a> {
    pub repr: &'a Repr,
    pub cardinality: Cardinality,
}

/// Result of classifying one field
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub conflict: ConflictType,
    pub unified: UnifiedType,
    pub cardinality: Cardinality,
}

/// Classify a field from its present versions (in version order).
///
/// `enum_range` returns the (min, max) member code of a merged enum.
pub fn classify(
    observed: &[Observed<'_>],
    enum_range: &dyn Fn(&str) -> Option<(i32, i32)>,
) -> Classification {
    let latest = match observed.last() {
        Some(latest) => latest,
        None => {
            return Classification {
                conflict: ConflictType::Incompatible,
                unified: UnifiedType::Single(Repr::Scalar(ScalarType::Bytes)),
                cardinality: Cardinality::Single,
            }
        }
    };

    let mut conflict = ConflictType::None;
    for (i, earlier) in observed.iter().enumerate() {
        for later in &observed[i + 1..] {
            conflict = conflict.worst(classify_pair(earlier, later, enum_range));
        }
    }

    let unified = match unify(conflict, observed) {
        Some(unified) => unified,
        None => {
            conflict = ConflictType::Incompatible;
            UnifiedType::Single(latest.repr.clone())
        }
    };

    Classification {
        conflict,
        unified,
        cardinality: latest.cardinality,
    }
}

/// Classify two versions of a field, `earlier` before `later`
pub fn classify_pair(
    earlier: &Observed<'_>,
    later: &Observed<'_>,
    enum_range: &dyn Fn(&str) -> Option<(i32, i32)>,
) -> ConflictType {
    if earlier.cardinality != later.cardinality {
        return ConflictType::Incompatible;
    }
    if earlier.repr == later.repr {
        return ConflictType::None;
    }

    match (earlier.repr, later.repr) {
        (Repr::Scalar(a), Repr::Scalar(b)) => classify_scalars(*a, *b),
        (Repr::Scalar(s), Repr::Enum(e)) | (Repr::Enum(e), Repr::Scalar(s)) => {
            if enum_fits(*s, enum_range(e)) {
                ConflictType::IntEnum
            } else {
                ConflictType::Incompatible
            }
        }
        (Repr::Scalar(_), Repr::Message(_)) | (Repr::Message(_), Repr::Scalar(_)) => {
            ConflictType::PrimitiveMessage
        }
        _ => ConflictType::Incompatible,
    }
}

/// Classify two scalar types, `a` earlier than `b`
pub fn classify_scalars(a: ScalarType, b: ScalarType) -> ConflictType {
    if a.rust_type() == b.rust_type() {
        return ConflictType::None;
    }
    if a.is_text_or_bytes() && b.is_text_or_bytes() {
        return ConflictType::StringBytes;
    }

    match (a.numeric_class(), b.numeric_class()) {
        (Some(NumericClass::Floating), Some(NumericClass::Floating)) => ConflictType::FloatDouble,
        (Some(ca), Some(cb)) if ca != NumericClass::Floating && cb != NumericClass::Floating => {
            if ca != cb {
                ConflictType::SignedUnsigned
            } else if b.bit_width() > a.bit_width() {
                ConflictType::Widening
            } else {
                ConflictType::Narrowing
            }
        }
        // 32-bit integers are exact in a double
        (Some(_), Some(NumericClass::Floating)) if a.bit_width() == 32 && b == ScalarType::Double => {
            ConflictType::Widening
        }
        (Some(NumericClass::Floating), Some(_)) if a == ScalarType::Double && b.bit_width() == 32 => {
            ConflictType::Narrowing
        }
        _ => ConflictType::Incompatible,
    }
}

/// Whether every member code of an enum is representable by an integer type
fn enum_fits(scalar: ScalarType, range: Option<(i32, i32)>) -> bool {
    match (scalar.integer_range(), range) {
        (Some((lo, hi)), Some((min, max))) => (min as i128) >= lo && (max as i128) <= hi,
        _ => false,
    }
}

fn unify(conflict: ConflictType, observed: &[Observed<'_>]) -> Option<UnifiedType> {
    let latest = observed.last()?.repr.clone();
    let scalars: Vec<ScalarType> = observed.iter().filter_map(|o| o.repr.scalar()).collect();

    let unified = match conflict {
        ConflictType::None | ConflictType::Incompatible => UnifiedType::Single(latest),
        ConflictType::Widening
        | ConflictType::Narrowing
        | ConflictType::FloatDouble
        | ConflictType::SignedUnsigned => UnifiedType::Single(Repr::Scalar(unify_numeric(&scalars)?)),
        ConflictType::IntEnum => {
            let enumeration = observed.iter().find_map(|o| match o.repr {
                Repr::Enum(path) => Some(path.clone()),
                _ => None,
            })?;
            UnifiedType::IntEnum {
                int: unify_numeric(&scalars)?,
                enumeration,
            }
        }
        ConflictType::StringBytes => UnifiedType::TextBytes,
        ConflictType::PrimitiveMessage => {
            let message = observed.iter().find_map(|o| match o.repr {
                Repr::Message(path) => Some(path.clone()),
                _ => None,
            })?;
            let scalar = if scalars.iter().all(|s| s.is_numeric()) {
                unify_numeric(&scalars)?
            } else if scalars.windows(2).all(|w| w[0] == w[1]) {
                *scalars.first()?
            } else {
                return None;
            };
            UnifiedType::ScalarOrMessage { scalar, message }
        }
    };
    Some(unified)
}

/// Common numeric type able to represent every input.
///
/// Keeps the latest exact type when all inputs share one Rust representation.
pub fn unify_numeric(scalars: &[ScalarType]) -> Option<ScalarType> {
    let last = *scalars.last()?;
    if !scalars.iter().all(|s| s.is_numeric()) {
        return None;
    }
    if scalars.iter().all(|s| s.rust_type() == last.rust_type()) {
        return Some(last);
    }

    let any = |class: NumericClass| scalars.iter().any(|s| s.numeric_class() == Some(class));
    let any_wide = |class: NumericClass| {
        scalars
            .iter()
            .any(|s| s.numeric_class() == Some(class) && s.bit_width() == 64)
    };

    let unified = if any(NumericClass::Floating) {
        if scalars.iter().all(|s| *s == ScalarType::Float) {
            ScalarType::Float
        } else {
            ScalarType::Double
        }
    } else if any(NumericClass::SignedInt) && any(NumericClass::UnsignedInt) {
        ScalarType::Int64
    } else if any(NumericClass::UnsignedInt) {
        if any_wide(NumericClass::UnsignedInt) {
            ScalarType::Uint64
        } else {
            ScalarType::Uint32
        }
    } else if any_wide(NumericClass::SignedInt) {
        ScalarType::Int64
    } else {
        ScalarType::Int32
    };
    Some(unified)
}
