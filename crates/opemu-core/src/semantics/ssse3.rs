use super::{horizontal, map_binary, map_unary, EmulationContext};
use crate::vector::Vector;

#[inline]
fn sat16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

pub fn pshufb(ctx: &EmulationContext) -> Vector {
    let lanes = ctx.lanes::<u8>();
    // 0x0F for 128-bit, 0x07 for 64-bit.
    let index_mask = (lanes - 1) as u8;
    let mut out = Vector::ZERO;
    for i in 0..lanes {
        let sel = ctx.src.lane::<u8>(i);
        if sel & 0x80 == 0 {
            out.set_lane(i, ctx.dst.lane::<u8>((sel & index_mask) as usize));
        }
    }
    out
}

pub fn phaddw(ctx: &EmulationContext) -> Vector {
    horizontal::<i16>(ctx, i16::wrapping_add)
}

pub fn phaddd(ctx: &EmulationContext) -> Vector {
    horizontal::<i32>(ctx, i32::wrapping_add)
}

pub fn phaddsw(ctx: &EmulationContext) -> Vector {
    horizontal::<i16>(ctx, i16::saturating_add)
}

pub fn phsubw(ctx: &EmulationContext) -> Vector {
    horizontal::<i16>(ctx, i16::wrapping_sub)
}

pub fn phsubd(ctx: &EmulationContext) -> Vector {
    horizontal::<i32>(ctx, i32::wrapping_sub)
}

pub fn phsubsw(ctx: &EmulationContext) -> Vector {
    horizontal::<i16>(ctx, i16::saturating_sub)
}

/// Unsigned bytes of `dst` times signed bytes of `src`, adjacent products
/// summed with signed 16-bit saturation.
pub fn pmaddubsw(ctx: &EmulationContext) -> Vector {
    let mut out = Vector::ZERO;
    for i in 0..ctx.lanes::<i16>() {
        let a0 = ctx.dst.lane::<u8>(2 * i) as i32;
        let a1 = ctx.dst.lane::<u8>(2 * i + 1) as i32;
        let b0 = ctx.src.lane::<i8>(2 * i) as i32;
        let b1 = ctx.src.lane::<i8>(2 * i + 1) as i32;
        out.set_lane(i, sat16(a0 * b0 + a1 * b1));
    }
    out
}

macro_rules! psign {
    ($name:ident, $ty:ty) => {
        pub fn $name(ctx: &EmulationContext) -> Vector {
            map_binary::<$ty>(ctx, |d, s| match s {
                s if s < 0 => d.wrapping_neg(),
                0 => 0,
                _ => d,
            })
        }
    };
}

psign!(psignb, i8);
psign!(psignw, i16);
psign!(psignd, i32);

pub fn pmulhrsw(ctx: &EmulationContext) -> Vector {
    map_binary::<i16>(ctx, |d, s| {
        let product = d as i32 * s as i32;
        (((product >> 14) + 1) >> 1) as i16
    })
}

/// Concatenate `dst:src` (src in the low half), shift right by `imm` bytes and
/// keep the low half.
pub fn palignr(ctx: &EmulationContext) -> Vector {
    let n = ctx.width.bytes();
    let shift = ctx.immediate as usize;
    let mut concat = [0u8; 32];
    concat[..n].copy_from_slice(&ctx.src.as_bytes()[..n]);
    concat[n..2 * n].copy_from_slice(&ctx.dst.as_bytes()[..n]);

    let mut out = Vector::ZERO;
    for i in 0..n {
        if let Some(&b) = concat[..2 * n].get(i + shift) {
            out.set_lane(i, b);
        }
    }
    out
}

pub fn pabsb(ctx: &EmulationContext) -> Vector {
    map_unary::<i8>(ctx, i8::wrapping_abs)
}

pub fn pabsw(ctx: &EmulationContext) -> Vector {
    map_unary::<i16>(ctx, i16::wrapping_abs)
}

pub fn pabsd(ctx: &EmulationContext) -> Vector {
    map_unary::<i32>(ctx, i32::wrapping_abs)
}
