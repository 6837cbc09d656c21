//! Scalar float arithmetic with SSE NaN rules.
//!
//! Rust float ops already round to nearest-even and keep denormals, which is
//! what SSE does with the default MXCSR. What differs is NaN selection: SSE
//! returns the first NaN operand (quieted), and an invalid operation on
//! non-NaN inputs produces the negative "default NaN".

use crate::vector::Lane;

pub trait SseFloat: Lane {
    /// The x86 default (indefinite) NaN.
    fn default_nan() -> Self;

    fn sse_add(self, rhs: Self) -> Self;
    fn sse_sub(self, rhs: Self) -> Self;
}

macro_rules! impl_sse_float {
    ($ty:ty, $quiet_bit:expr, $default_nan:expr) => {
        impl SseFloat for $ty {
            #[inline]
            fn default_nan() -> Self {
                <$ty>::from_bits($default_nan)
            }

            #[inline]
            fn sse_add(self, rhs: Self) -> Self {
                select_nan!(self, rhs, self + rhs, $quiet_bit)
            }

            #[inline]
            fn sse_sub(self, rhs: Self) -> Self {
                select_nan!(self, rhs, self - rhs, $quiet_bit)
            }
        }
    };
}

macro_rules! select_nan {
    ($a:expr, $b:expr, $result:expr, $quiet_bit:expr) => {{
        let (a, b, result) = ($a, $b, $result);
        if a.is_nan() {
            Self::from_bits(a.to_bits() | $quiet_bit)
        } else if b.is_nan() {
            Self::from_bits(b.to_bits() | $quiet_bit)
        } else if result.is_nan() {
            Self::default_nan()
        } else {
            result
        }
    }};
}

impl_sse_float!(f32, 0x0040_0000, 0xFFC0_0000);
impl_sse_float!(f64, 0x0008_0000_0000_0000, 0xFFF8_0000_0000_0000);
