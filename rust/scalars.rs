//! Numeric kinds every storage, tensor and kernel is monomorphized over.
//!
//! This module provides:
//!
//! - [`Kind`]: runtime tag naming one of the eight supported element kinds
//! - [`Numeric`]: sealed trait implemented for `u8`, `i8`, `i16`, `i32`, `i64`, `f32`, `f64` and [`f16`]
//! - [`FloatNumeric`]: the floating-point subset used by transcendental and statistical kernels
//!
//! Integer arithmetic wraps on overflow and cross-kind conversion follows `as`-cast semantics,
//! so narrowing an `i64` into an `i8` keeps the low byte rather than saturating.
//!
//! # Example
//!
//! ```rust
//! use thtensor::{Kind, Numeric};
//!
//! assert_eq!(<i16 as Numeric>::KIND, Kind::Short);
//! assert_eq!(300_i32.cast::<u8>(), 44);
//! assert_eq!(2.75_f64.cast::<i32>(), 2);
//! ```

use core::fmt;
use std::sync::OnceLock;

use crate::vector::{self, Candidates, VectorTable};

pub use half::f16;

// region: Kind

/// Element kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Half,
}

impl Kind {
    /// Name used in tensor descriptions, e.g. `FloatTensor`.
    pub const fn name(self) -> &'static str {
        match self {
            Kind::Byte => "Byte",
            Kind::Char => "Char",
            Kind::Short => "Short",
            Kind::Int => "Int",
            Kind::Long => "Long",
            Kind::Float => "Float",
            Kind::Double => "Double",
            Kind::Half => "Half",
        }
    }

    /// Size of one element in bytes.
    pub const fn element_size(self) -> usize {
        match self {
            Kind::Byte | Kind::Char => 1,
            Kind::Short | Kind::Half => 2,
            Kind::Int | Kind::Float => 4,
            Kind::Long | Kind::Double => 8,
        }
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, Kind::Float | Kind::Double | Kind::Half)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// endregion: Kind

// region: Numeric

// Sealed trait pattern to prevent external implementations
mod private {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for i8 {}
    impl Sealed for i16 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for super::f16 {}
}

/// Element type of a storage or tensor.
///
/// This trait is sealed - users cannot implement it for their own types.
/// Arithmetic methods wrap for integer kinds; integer division by zero panics.
pub trait Numeric:
    private::Sealed
    + Copy
    + Default
    + PartialEq
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
{
    const KIND: Kind;
    const ZERO: Self;
    const ONE: Self;

    /// Wider type used when accumulating sums and products:
    /// `i64` for integer kinds, `f64` for `f32`/`f64`, `f32` for `f16`.
    type Accum: Numeric;

    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
    fn to_i64(self) -> i64;
    fn from_i64(value: i64) -> Self;

    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;
    fn div(self, rhs: Self) -> Self;
    fn neg(self) -> Self;
    fn abs(self) -> Self;

    /// Dispatched vector primitives for this kind, selected on first use.
    fn vector() -> &'static VectorTable<Self>;

    /// Candidate implementations in dispatch order, most capable first.
    fn vector_candidates() -> Candidates<Self>;

    /// Converts between kinds with `as`-cast semantics.
    #[inline]
    fn cast<U: Numeric>(self) -> U {
        if Self::KIND.is_floating() {
            U::from_f64(self.to_f64())
        } else {
            U::from_i64(self.to_i64())
        }
    }

    #[inline]
    fn to_accum(self) -> Self::Accum {
        self.cast()
    }

    #[inline]
    fn from_accum(value: Self::Accum) -> Self {
        value.cast()
    }
}

macro_rules! impl_integer {
    ($t:ident, $kind:expr, $candidates:path) => {
        impl Numeric for $t {
            const KIND: Kind = $kind;
            const ZERO: Self = 0;
            const ONE: Self = 1;
            type Accum = i64;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }
            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }
            #[inline]
            fn to_i64(self) -> i64 {
                self as i64
            }
            #[inline]
            fn from_i64(value: i64) -> Self {
                value as $t
            }
            #[inline]
            fn add(self, rhs: Self) -> Self {
                <$t>::wrapping_add(self, rhs)
            }
            #[inline]
            fn sub(self, rhs: Self) -> Self {
                <$t>::wrapping_sub(self, rhs)
            }
            #[inline]
            fn mul(self, rhs: Self) -> Self {
                <$t>::wrapping_mul(self, rhs)
            }
            #[inline]
            fn div(self, rhs: Self) -> Self {
                <$t>::wrapping_div(self, rhs)
            }
            #[inline]
            fn neg(self) -> Self {
                <$t>::wrapping_neg(self)
            }
            #[inline]
            fn abs(self) -> Self {
                integer_abs!($t, self)
            }

            fn vector() -> &'static VectorTable<Self> {
                static TABLE: OnceLock<VectorTable<$t>> = OnceLock::new();
                TABLE.get_or_init(vector::select::<$t>)
            }

            fn vector_candidates() -> Candidates<Self> {
                $candidates()
            }
        }
    };
}

macro_rules! integer_abs {
    (u8, $v:expr) => {
        $v
    };
    ($t:ident, $v:expr) => {
        <$t>::wrapping_abs($v)
    };
}

macro_rules! impl_float {
    ($t:ty, $kind:expr, $candidates:path) => {
        impl Numeric for $t {
            const KIND: Kind = $kind;
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            type Accum = f64;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }
            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }
            #[inline]
            fn to_i64(self) -> i64 {
                self as i64
            }
            #[inline]
            fn from_i64(value: i64) -> Self {
                value as $t
            }
            #[inline]
            fn add(self, rhs: Self) -> Self {
                self + rhs
            }
            #[inline]
            fn sub(self, rhs: Self) -> Self {
                self - rhs
            }
            #[inline]
            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }
            #[inline]
            fn div(self, rhs: Self) -> Self {
                self / rhs
            }
            #[inline]
            fn neg(self) -> Self {
                -self
            }
            #[inline]
            fn abs(self) -> Self {
                <$t>::abs(self)
            }

            fn vector() -> &'static VectorTable<Self> {
                static TABLE: OnceLock<VectorTable<$t>> = OnceLock::new();
                TABLE.get_or_init(vector::select::<$t>)
            }

            fn vector_candidates() -> Candidates<Self> {
                $candidates()
            }
        }
    };
}

impl_integer!(u8, Kind::Byte, vector::portable_candidates::<u8>);
impl_integer!(i8, Kind::Char, vector::portable_candidates::<i8>);
impl_integer!(i16, Kind::Short, vector::portable_candidates::<i16>);
impl_integer!(i32, Kind::Int, vector::i32_candidates);
impl_integer!(i64, Kind::Long, vector::portable_candidates::<i64>);
impl_float!(f32, Kind::Float, vector::f32_candidates);
impl_float!(f64, Kind::Double, vector::f64_candidates);

// Half-precision values round-trip through `f32` for every arithmetic step.
impl Numeric for f16 {
    const KIND: Kind = Kind::Half;
    const ZERO: Self = f16::ZERO;
    const ONE: Self = f16::ONE;
    type Accum = f32;

    #[inline]
    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }
    #[inline]
    fn from_f64(value: f64) -> Self {
        f16::from_f64(value)
    }
    #[inline]
    fn to_i64(self) -> i64 {
        f16::to_f32(self) as i64
    }
    #[inline]
    fn from_i64(value: i64) -> Self {
        f16::from_f32(value as f32)
    }
    #[inline]
    fn add(self, rhs: Self) -> Self {
        f16::from_f32(self.to_f32() + rhs.to_f32())
    }
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        f16::from_f32(self.to_f32() - rhs.to_f32())
    }
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        f16::from_f32(self.to_f32() * rhs.to_f32())
    }
    #[inline]
    fn div(self, rhs: Self) -> Self {
        f16::from_f32(self.to_f32() / rhs.to_f32())
    }
    #[inline]
    fn neg(self) -> Self {
        -self
    }
    #[inline]
    fn abs(self) -> Self {
        f16::from_bits(self.to_bits() & 0x7FFF)
    }

    fn vector() -> &'static VectorTable<Self> {
        static TABLE: OnceLock<VectorTable<f16>> = OnceLock::new();
        TABLE.get_or_init(vector::select::<f16>)
    }

    fn vector_candidates() -> Candidates<Self> {
        vector::portable_candidates::<f16>()
    }
}

// endregion: Numeric

// region: FloatNumeric

/// Floating-point kinds with full math support.
///
/// The half kind is deliberately excluded: it supports storage, geometry, copies and
/// comparisons but none of the transcendental kernels.
pub trait FloatNumeric: Numeric {
    const EPSILON: Self;
    const INFINITY: Self;
    const NEG_INFINITY: Self;

    fn sqrt(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn ln_1p(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn asin(self) -> Self;
    fn acos(self) -> Self;
    fn atan(self) -> Self;
    fn sinh(self) -> Self;
    fn cosh(self) -> Self;
    fn tanh(self) -> Self;
    fn powf(self, exponent: Self) -> Self;
    fn atan2(self, other: Self) -> Self;
    fn ceil(self) -> Self;
    fn floor(self) -> Self;
    fn round(self) -> Self;
    fn trunc(self) -> Self;
    fn fract(self) -> Self;
    fn is_nan(self) -> bool;
}

macro_rules! impl_float_math {
    ($t:ident) => {
        impl FloatNumeric for $t {
            const EPSILON: Self = $t::EPSILON;
            const INFINITY: Self = $t::INFINITY;
            const NEG_INFINITY: Self = $t::NEG_INFINITY;

            #[inline]
            fn sqrt(self) -> Self {
                $t::sqrt(self)
            }
            #[inline]
            fn exp(self) -> Self {
                $t::exp(self)
            }
            #[inline]
            fn ln(self) -> Self {
                $t::ln(self)
            }
            #[inline]
            fn ln_1p(self) -> Self {
                $t::ln_1p(self)
            }
            #[inline]
            fn sin(self) -> Self {
                $t::sin(self)
            }
            #[inline]
            fn cos(self) -> Self {
                $t::cos(self)
            }
            #[inline]
            fn tan(self) -> Self {
                $t::tan(self)
            }
            #[inline]
            fn asin(self) -> Self {
                $t::asin(self)
            }
            #[inline]
            fn acos(self) -> Self {
                $t::acos(self)
            }
            #[inline]
            fn atan(self) -> Self {
                $t::atan(self)
            }
            #[inline]
            fn sinh(self) -> Self {
                $t::sinh(self)
            }
            #[inline]
            fn cosh(self) -> Self {
                $t::cosh(self)
            }
            #[inline]
            fn tanh(self) -> Self {
                $t::tanh(self)
            }
            #[inline]
            fn powf(self, exponent: Self) -> Self {
                $t::powf(self, exponent)
            }
            #[inline]
            fn atan2(self, other: Self) -> Self {
                $t::atan2(self, other)
            }
            #[inline]
            fn ceil(self) -> Self {
                $t::ceil(self)
            }
            #[inline]
            fn floor(self) -> Self {
                $t::floor(self)
            }
            #[inline]
            fn round(self) -> Self {
                $t::round(self)
            }
            #[inline]
            fn trunc(self) -> Self {
                $t::trunc(self)
            }
            #[inline]
            fn fract(self) -> Self {
                $t::fract(self)
            }
            #[inline]
            fn is_nan(self) -> bool {
                $t::is_nan(self)
            }
        }
    };
}

impl_float_math!(f32);
impl_float_math!(f64);

// endregion: FloatNumeric

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_and_sizes() {
        assert_eq!(<u8 as Numeric>::KIND.name(), "Byte");
        assert_eq!(<f64 as Numeric>::KIND.to_string(), "Double");
        assert_eq!(Kind::Half.element_size(), 2);
        assert_eq!(Kind::Long.element_size(), 8);
        assert!(Kind::Half.is_floating());
        assert!(!Kind::Char.is_floating());
    }

    #[test]
    fn integer_casts_wrap() {
        assert_eq!(200_u8.cast::<i8>(), -56);
        assert_eq!((-1_i32).cast::<u8>(), 255);
        assert_eq!(70000_i64.cast::<i16>(), 4464);
    }

    #[test]
    fn float_casts_truncate() {
        assert_eq!((-2.9_f32).cast::<i32>(), -2);
        assert_eq!(1.5_f64.cast::<f16>(), f16::from_f32(1.5));
        assert_eq!(f16::from_f32(3.0).cast::<i64>(), 3);
    }

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(Numeric::add(250_u8, 10), 4);
        assert_eq!(Numeric::mul(i8::MAX, 2), -2);
        assert_eq!(Numeric::neg(i32::MIN), i32::MIN);
        assert_eq!(Numeric::abs(-7_i16), 7);
        assert_eq!(Numeric::abs(7_u8), 7);
    }

    #[test]
    fn half_arithmetic_goes_through_f32() {
        let a = f16::from_f32(1.5);
        let b = f16::from_f32(2.0);
        assert_eq!(Numeric::mul(a, b), f16::from_f32(3.0));
        assert_eq!(Numeric::abs(f16::from_f32(-0.5)), f16::from_f32(0.5));
    }

    #[test]
    fn accumulators_widen() {
        let x: i64 = 100_u8.to_accum();
        assert_eq!(x, 100);
        let y: f64 = 0.25_f32.to_accum();
        assert_eq!(y, 0.25);
        assert_eq!(<i8 as Numeric>::from_accum(300), 44);
    }
}
