//! Byte-backed vector register values.
//!
//! [`Vector`] always holds 16 bytes. 64-bit (MMX) operations use the low 8 bytes
//! and leave the high 8 zero. Every typed view decodes lanes from fixed
//! little-endian offsets, so all views observe the same underlying bytes.

use core::fmt;

/// Operand width of a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorWidth {
    /// Legacy 64-bit MMX form (no `0x66` prefix).
    Mm64,
    /// 128-bit XMM form.
    Xmm128,
}

impl VectorWidth {
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            VectorWidth::Mm64 => 8,
            VectorWidth::Xmm128 => 16,
        }
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        (self.bytes() * 8) as u32
    }

    /// Number of `T` lanes at this width.
    #[inline]
    pub const fn lanes<T: Lane>(self) -> usize {
        self.bytes() / T::BYTES
    }
}

/// A scalar type that can be viewed as a lane of a [`Vector`].
pub trait Lane: Copy {
    const BYTES: usize;

    fn read_le(bytes: &[u8]) -> Self;
    fn write_le(self, out: &mut [u8]);
}

macro_rules! impl_lane {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Lane for $ty {
                const BYTES: usize = core::mem::size_of::<$ty>();

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::BYTES]);
                    <$ty>::from_le_bytes(raw)
                }

                #[inline]
                fn write_le(self, out: &mut [u8]) {
                    out[..Self::BYTES].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_lane!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Vector {
    bytes: [u8; 16],
}

impl Vector {
    pub const ZERO: Vector = Vector { bytes: [0; 16] };

    #[inline]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    /// Build a 64-bit value; the high 8 bytes are zero.
    #[inline]
    pub fn from_mm(bytes: [u8; 8]) -> Self {
        let mut out = Self::ZERO;
        out.bytes[..8].copy_from_slice(&bytes);
        out
    }

    #[inline]
    pub const fn from_u128(value: u128) -> Self {
        Self {
            bytes: value.to_le_bytes(),
        }
    }

    #[inline]
    pub const fn from_u64(value: u64) -> Self {
        Self::from_u128(value as u128)
    }

    /// Load the first `width.bytes()` bytes of `raw`, zero-filling the rest.
    pub fn from_slice(raw: &[u8], width: VectorWidth) -> Self {
        let mut out = Self::ZERO;
        let n = width.bytes().min(raw.len());
        out.bytes[..n].copy_from_slice(&raw[..n]);
        out
    }

    /// Build a vector from a lane array (e.g. `[i16; 8]`).
    pub fn from_lanes<T: Lane, const N: usize>(lanes: [T; N]) -> Self {
        let mut out = Self::ZERO;
        for (i, lane) in lanes.into_iter().enumerate() {
            out.set_lane(i, lane);
        }
        out
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }

    #[inline]
    pub const fn to_bytes(self) -> [u8; 16] {
        self.bytes
    }

    #[inline]
    pub const fn to_u128(self) -> u128 {
        u128::from_le_bytes(self.bytes)
    }

    /// The low 8 bytes, i.e. the MMX view.
    #[inline]
    pub fn to_mm(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out.copy_from_slice(&self.bytes[..8]);
        out
    }

    /// Read lane `index` of type `T`.
    ///
    /// Panics if the lane would extend past byte 16; callers derive `index`
    /// from [`VectorWidth::lanes`].
    #[inline]
    pub fn lane<T: Lane>(&self, index: usize) -> T {
        let off = index * T::BYTES;
        T::read_le(&self.bytes[off..off + T::BYTES])
    }

    #[inline]
    pub fn set_lane<T: Lane>(&mut self, index: usize, value: T) {
        let off = index * T::BYTES;
        value.write_le(&mut self.bytes[off..off + T::BYTES]);
    }

    /// Copy out the first `N` lanes of type `T`.
    pub fn lanes<T: Lane + Default, const N: usize>(&self) -> [T; N] {
        let mut out = [T::default(); N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.lane(i);
        }
        out
    }

    /// Clear every byte at or above `width.bytes()`.
    #[inline]
    pub fn truncate(mut self, width: VectorWidth) -> Self {
        self.bytes[width.bytes()..].fill(0);
        self
    }
}

impl fmt::Debug for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector(0x{:032x})", self.to_u128())
    }
}

impl From<u128> for Vector {
    fn from(value: u128) -> Self {
        Self::from_u128(value)
    }
}

impl From<[u8; 16]> for Vector {
    fn from(bytes: [u8; 16]) -> Self {
        Self::from_bytes(bytes)
    }
}
