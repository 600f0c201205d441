//! Reducible datatypes and reduction operations.
//!
//! [`Datatype`] is a sealed trait mapping the primitive types a collective can combine
//! to their element-wise [`ReduceOp`] semantics.
//!
//! | Rust Type | Sum            | Prod           |
//! |-----------|----------------|----------------|
//! | `f64`     | `a + b`        | `a * b`        |
//! | `u64`     | wrapping add   | wrapping mul   |
//! | `i64`     | wrapping add   | wrapping mul   |
//! | `u32`     | wrapping add   | wrapping mul   |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Internal module to seal the trait.
mod sealed {
    pub trait Sealed {}
}

/// Reduction operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceOp {
    /// Sum of values
    Sum,
    /// Maximum value
    Max,
    /// Minimum value
    Min,
    /// Product of values
    Prod,
}

/// Types a collective reduction can combine.
///
/// This is a **sealed trait**. Every operation is associative and commutative, so the
/// combination order chosen by the reduction tree does not change integer results.
pub trait Datatype: sealed::Sealed + Copy + Send + Serialize + DeserializeOwned + 'static {
    /// Combine two values under `op`
    fn combine(op: ReduceOp, a: Self, b: Self) -> Self;
}

macro_rules! impl_integer_datatype {
    ($ty:ty) => {
        impl sealed::Sealed for $ty {}
        impl Datatype for $ty {
            #[inline]
            fn combine(op: ReduceOp, a: Self, b: Self) -> Self {
                match op {
                    ReduceOp::Sum => a.wrapping_add(b),
                    ReduceOp::Max => a.max(b),
                    ReduceOp::Min => a.min(b),
                    ReduceOp::Prod => a.wrapping_mul(b),
                }
            }
        }
    };
}

impl_integer_datatype!(u32);
impl_integer_datatype!(u64);
impl_integer_datatype!(i64);

impl sealed::Sealed for f64 {}
impl Datatype for f64 {
    #[inline]
    fn combine(op: ReduceOp, a: Self, b: Self) -> Self {
        match op {
            ReduceOp::Sum => a + b,
            ReduceOp::Max => a.max(b),
            ReduceOp::Min => a.min(b),
            ReduceOp::Prod => a * b,
        }
    }
}

/// Combine `incoming` into `acc` element by element
pub(crate) fn combine_into<T: Datatype>(op: ReduceOp, acc: &mut [T], incoming: &[T]) {
    for (a, b) in acc.iter_mut().zip(incoming) {
        *a = T::combine(op, *a, *b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_ops() {
        assert_eq!(u64::combine(ReduceOp::Sum, 780, 790), 1570);
        assert_eq!(u64::combine(ReduceOp::Max, 780, 790), 790);
        assert_eq!(u64::combine(ReduceOp::Min, 780, 790), 780);
        assert_eq!(i64::combine(ReduceOp::Prod, -3, 4), -12);
        assert_eq!(u32::combine(ReduceOp::Sum, u32::MAX, 1), 0);
    }

    #[test]
    fn test_float_ops() {
        assert_eq!(f64::combine(ReduceOp::Sum, 0.25, 0.5), 0.75);
        assert_eq!(f64::combine(ReduceOp::Max, -1.0, 2.0), 2.0);
        assert_eq!(f64::combine(ReduceOp::Min, -1.0, 2.0), -1.0);
        assert_eq!(f64::combine(ReduceOp::Prod, 1.5, 4.0), 6.0);
    }

    #[test]
    fn test_combine_into_elementwise() {
        let mut acc = [1u64, 10, 100];
        combine_into(ReduceOp::Sum, &mut acc, &[2, 20, 200]);
        assert_eq!(acc, [3, 30, 300]);

        combine_into(ReduceOp::Max, &mut acc, &[5, 5, 500]);
        assert_eq!(acc, [5, 30, 500]);
    }
}
