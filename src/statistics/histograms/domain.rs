//! Ordered value domains histograms are built over.
//!
//! A domain knows how to step to the neighbouring representable value, how
//! far apart two values are, and how to split a span into equally wide
//! ranges. Numeric column types use [`NumericDomain`]; strings go through
//! [`StringDomain`](super::StringDomain), which maps bounded prefixes onto
//! integers.
#![forbid(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;

use crate::types::{Result, StatsError};

/// Shape of a `LIKE` pattern after parsing against a domain.
#[derive(Clone, Debug, PartialEq)]
pub enum LikePattern<V> {
    /// The pattern consists only of `%` and matches every value.
    MatchAll,
    /// The pattern has no wildcard at all.
    Exact(V),
    /// `prefix%` with a single trailing `%`.
    ///
    /// `upper` is the successor of `prefix` at the prefix's own length, or
    /// `None` when the prefix is made of the largest character only and
    /// therefore has no successor at that length.
    Prefix {
        /// Literal prefix, truncated to the domain's prefix length.
        prefix: V,
        /// Exclusive upper end of the matching range.
        upper: Option<V>,
    },
    /// Any other wildcard placement. Only the literal text before the first
    /// wildcard is usable, and only for pruning.
    Complex {
        /// Literal prefix range, absent when the pattern starts with a wildcard.
        literal_prefix: Option<(V, Option<V>)>,
    },
}

/// Totally ordered value space with successor/predecessor arithmetic.
///
/// Estimation code in this module is written once against this trait.
pub trait OrderedDomain: Clone + fmt::Debug + Send + Sync {
    /// Values stored in bins.
    type Value: Clone + PartialOrd + fmt::Debug + fmt::Display + Send + Sync;

    /// Short name of the value type, used in errors and exports.
    fn type_name(&self) -> &'static str;

    /// Maps a value onto the representative stored in bins.
    fn canonicalize(&self, value: &Self::Value) -> Self::Value {
        value.clone()
    }

    /// Rejects values the domain cannot represent.
    fn check_value(&self, value: &Self::Value, allow_wildcards: bool) -> Result<()> {
        let _ = (value, allow_wildcards);
        Ok(())
    }

    /// Smallest representable value greater than `value`.
    fn successor(&self, value: &Self::Value) -> Self::Value;

    /// Largest representable value smaller than `value`.
    fn predecessor(&self, value: &Self::Value) -> Self::Value;

    /// Width of the inclusive range `[min, max]` in interpolation units.
    fn bin_width(&self, min: &Self::Value, max: &Self::Value) -> f64;

    /// Signed distance from `from` to `to` in interpolation units.
    fn distance(&self, from: &Self::Value, to: &Self::Value) -> f64;

    /// Splits `[min, max]` into at most `max_bins` equally wide ranges.
    ///
    /// Returns the lower bound of every range together with the number of
    /// leading ranges that are one unit wider than the rest.
    fn equal_width_minima(
        &self,
        min: &Self::Value,
        max: &Self::Value,
        max_bins: usize,
    ) -> (Vec<Self::Value>, usize);

    /// Numeric representation printed in bin exports.
    fn repr(&self, value: &Self::Value) -> String {
        value.to_string()
    }

    /// Whether a stored value may stand for longer values cut down to it.
    fn is_truncated(&self, value: &Self::Value) -> bool {
        let _ = value;
        false
    }

    /// Whether `value` starts with `prefix`.
    fn has_prefix(&self, value: &Self::Value, prefix: &Self::Value) -> bool {
        let _ = (value, prefix);
        false
    }

    /// Whether `LIKE`/`NOT LIKE` can be evaluated on this domain.
    fn supports_patterns(&self) -> bool {
        false
    }

    /// Parses a `LIKE` pattern. `None` when the domain has no patterns.
    fn like_pattern(&self, pattern: &Self::Value) -> Option<LikePattern<Self::Value>> {
        let _ = pattern;
        None
    }
}

/// Domain of a primitive numeric column type.
pub struct NumericDomain<T> {
    _marker: PhantomData<T>,
}

impl<T> NumericDomain<T> {
    /// Creates the domain.
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for NumericDomain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for NumericDomain<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Copy for NumericDomain<T> {}

impl<T> fmt::Debug for NumericDomain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NumericDomain<{}>", std::any::type_name::<T>())
    }
}

macro_rules! integer_domain {
    ($ty:ty, $name:literal) => {
        impl OrderedDomain for NumericDomain<$ty> {
            type Value = $ty;

            fn type_name(&self) -> &'static str {
                $name
            }

            fn successor(&self, value: &$ty) -> $ty {
                value.saturating_add(1)
            }

            fn predecessor(&self, value: &$ty) -> $ty {
                value.saturating_sub(1)
            }

            fn bin_width(&self, min: &$ty, max: &$ty) -> f64 {
                (i128::from(*max) - i128::from(*min) + 1) as f64
            }

            fn distance(&self, from: &$ty, to: &$ty) -> f64 {
                (i128::from(*to) - i128::from(*from)) as f64
            }

            fn equal_width_minima(&self, min: &$ty, max: &$ty, max_bins: usize) -> (Vec<$ty>, usize) {
                let span = (i128::from(*max) - i128::from(*min) + 1).max(1);
                let bins = (max_bins.max(1) as i128).min(span);
                let base = span / bins;
                let larger = span % bins;
                let minima = (0..bins)
                    .map(|bin| {
                        let offset = bin * base + bin.min(larger);
                        // offset < span, so the sum stays within [min, max]
                        (i128::from(*min) + offset) as $ty
                    })
                    .collect();
                (minima, larger as usize)
            }
        }
    };
}

macro_rules! float_domain {
    ($ty:ty, $bits:ty, $name:literal) => {
        impl OrderedDomain for NumericDomain<$ty> {
            type Value = $ty;

            fn type_name(&self) -> &'static str {
                $name
            }

            fn check_value(&self, value: &$ty, _allow_wildcards: bool) -> Result<()> {
                if value.is_nan() {
                    return Err(StatsError::InvalidArgument("NaN is not comparable"));
                }
                Ok(())
            }

            fn successor(&self, value: &$ty) -> $ty {
                next_toward_infinity!(*value, $ty, $bits)
            }

            fn predecessor(&self, value: &$ty) -> $ty {
                -next_toward_infinity!(-*value, $ty, $bits)
            }

            fn bin_width(&self, min: &$ty, max: &$ty) -> f64 {
                f64::from(self.successor(&(*max - *min)))
            }

            fn distance(&self, from: &$ty, to: &$ty) -> f64 {
                f64::from(*to - *from)
            }

            fn equal_width_minima(&self, min: &$ty, max: &$ty, max_bins: usize) -> (Vec<$ty>, usize) {
                let bins = max_bins.max(1);
                let width = self.successor(&(*max - *min)) / bins as $ty;
                let mut minima: Vec<$ty> = Vec::with_capacity(bins);
                minima.push(*min);
                for bin in 1..bins {
                    let lower = *min + bin as $ty * width;
                    let previous = minima[minima.len() - 1];
                    if lower <= previous || lower > *max {
                        break;
                    }
                    minima.push(lower);
                }
                (minima, 0)
            }
        }
    };
}

macro_rules! next_toward_infinity {
    ($value:expr, $ty:ty, $bits:ty) => {{
        let value: $ty = $value;
        if value.is_nan() || value == <$ty>::INFINITY {
            value
        } else if value == 0.0 {
            <$ty>::from_bits(1)
        } else {
            let bits: $bits = value.to_bits();
            if value > 0.0 {
                <$ty>::from_bits(bits + 1)
            } else {
                <$ty>::from_bits(bits - 1)
            }
        }
    }};
}

integer_domain!(i32, "int32");
integer_domain!(i64, "int64");
float_domain!(f32, u32, "float32");
float_domain!(f64, u64, "float64");
