//! Per-mnemonic result computation.
//!
//! Every function here is pure: it reads an [`EmulationContext`] and returns
//! the value to commit. Width selects the lane count (64-bit forms use half the
//! lanes of the 128-bit forms); lanes past the width are left zero.

pub mod float;
pub mod sse3;
pub mod ssse3;
pub mod strcmp;

use crate::opcode::Mnemonic;
use crate::vector::{Lane, Vector, VectorWidth};

/// Inputs to one semantic function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulationContext {
    pub dst: Vector,
    pub src: Vector,
    /// Zero for instructions without an immediate.
    pub immediate: u8,
    pub width: VectorWidth,
}

impl EmulationContext {
    #[inline]
    pub fn lanes<T: Lane>(&self) -> usize {
        self.width.lanes::<T>()
    }
}

pub type LaneFn = fn(&EmulationContext) -> Vector;

/// How an instruction produces its result.
#[derive(Clone, Copy)]
pub enum Operation {
    /// Computes a vector that replaces the destination register.
    Lanes(LaneFn),
    /// Writes ECX or XMM0 plus RFLAGS; see [`strcmp`].
    StringCompare,
}

impl core::fmt::Debug for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Operation::Lanes(_) => f.write_str("Lanes"),
            Operation::StringCompare => f.write_str("StringCompare"),
        }
    }
}

pub fn operation(mnemonic: Mnemonic) -> Operation {
    use Mnemonic as M;

    let f: LaneFn = match mnemonic {
        M::Pshufb => ssse3::pshufb,
        M::Phaddw => ssse3::phaddw,
        M::Phaddd => ssse3::phaddd,
        M::Phaddsw => ssse3::phaddsw,
        M::Pmaddubsw => ssse3::pmaddubsw,
        M::Phsubw => ssse3::phsubw,
        M::Phsubd => ssse3::phsubd,
        M::Phsubsw => ssse3::phsubsw,
        M::Psignb => ssse3::psignb,
        M::Psignw => ssse3::psignw,
        M::Psignd => ssse3::psignd,
        M::Pmulhrsw => ssse3::pmulhrsw,
        M::Palignr => ssse3::palignr,
        M::Pabsb => ssse3::pabsb,
        M::Pabsw => ssse3::pabsw,
        M::Pabsd => ssse3::pabsd,
        M::Haddpd => sse3::haddpd,
        M::Hsubpd => sse3::hsubpd,
        M::Addsubpd => sse3::addsubpd,
        M::Haddps => sse3::haddps,
        M::Hsubps => sse3::hsubps,
        M::Addsubps => sse3::addsubps,
        M::Movddup => sse3::movddup,
        M::Lddqu => sse3::lddqu,
        M::Movsldup => sse3::movsldup,
        M::Movshdup => sse3::movshdup,
        M::Pcmpistri | M::Pcmpistrm => return Operation::StringCompare,
    };
    Operation::Lanes(f)
}

/// `out[i] = f(dst[i], src[i])` over the lanes of the context width.
pub(crate) fn map_binary<T: Lane>(ctx: &EmulationContext, f: impl Fn(T, T) -> T) -> Vector {
    let mut out = Vector::ZERO;
    for i in 0..ctx.lanes::<T>() {
        out.set_lane(i, f(ctx.dst.lane::<T>(i), ctx.src.lane::<T>(i)));
    }
    out
}

/// `out[i] = f(src[i])`.
pub(crate) fn map_unary<T: Lane>(ctx: &EmulationContext, f: impl Fn(T) -> T) -> Vector {
    let mut out = Vector::ZERO;
    for i in 0..ctx.lanes::<T>() {
        out.set_lane(i, f(ctx.src.lane::<T>(i)));
    }
    out
}

/// Pairwise reduction: the low half of the result comes from adjacent `dst`
/// lanes, the high half from adjacent `src` lanes.
pub(crate) fn horizontal<T: Lane>(ctx: &EmulationContext, f: impl Fn(T, T) -> T) -> Vector {
    let lanes = ctx.lanes::<T>();
    let half = lanes / 2;
    let mut out = Vector::ZERO;
    for i in 0..half {
        out.set_lane(i, f(ctx.dst.lane::<T>(2 * i), ctx.dst.lane::<T>(2 * i + 1)));
        out.set_lane(half + i, f(ctx.src.lane::<T>(2 * i), ctx.src.lane::<T>(2 * i + 1)));
    }
    out
}

#[cfg(test)]
pub(crate) fn ctx(dst: Vector, src: Vector, width: VectorWidth) -> EmulationContext {
    EmulationContext {
        dst,
        src,
        immediate: 0,
        width,
    }
}
